//! Per-run actor identity cache.
//!
//! Each actor id costs at most one resolution call per run. Concurrent
//! requests for an id that is already being resolved wait for the pending
//! call instead of issuing a duplicate. Failures resolve to
//! [`UNKNOWN_USER`] and are cached like any other name for the rest of the
//! run. The cache is created by a run and dropped with it.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures_util::future::join_all;
use pipeline::normalize::{is_top_level, UNKNOWN_USER};
use pipeline::{ActorId, IdentityResolver, RawMessage};
use tokio::sync::{Mutex, OnceCell};
use tracing::warn;

pub struct IdentityCache {
    resolver: Arc<dyn IdentityResolver>,
    names: Mutex<HashMap<ActorId, Arc<OnceCell<String>>>>,
}

impl IdentityCache {
    pub fn new(resolver: Arc<dyn IdentityResolver>) -> Self {
        Self {
            resolver,
            names: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the display name for `actor`, resolving it on first use.
    pub async fn resolve(&self, actor: &ActorId) -> String {
        let cell = {
            let mut names = self.names.lock().await;
            names.entry(actor.clone()).or_default().clone()
        };
        cell.get_or_init(|| async {
            match self.resolver.display_name(actor).await {
                Ok(name) => name,
                Err(e) => {
                    warn!(actor = %actor, error = %e, "Identity resolution failed");
                    UNKNOWN_USER.to_string()
                }
            }
        })
        .await
        .clone()
    }

    /// Fills in `display_name` on every top-level message of a page.
    ///
    /// Distinct actors are resolved concurrently; messages the normaliser
    /// will discard are left alone.
    pub async fn resolve_page(&self, messages: &mut [RawMessage]) {
        let actors: Vec<ActorId> = messages
            .iter()
            .filter(|m| is_top_level(m))
            .filter_map(|m| m.user.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let names = join_all(actors.iter().map(|a| self.resolve(a))).await;
        let resolved: HashMap<&ActorId, String> = actors.iter().zip(names).collect();

        for message in messages.iter_mut() {
            if let Some(name) = message.user.as_ref().and_then(|u| resolved.get(u)) {
                message.display_name = Some(name.clone());
            }
        }
    }

    /// Number of distinct actors seen so far.
    pub async fn len(&self) -> usize {
        self.names.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pipeline::IdentityError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct SlowResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IdentityResolver for SlowResolver {
        async fn display_name(&self, actor: &ActorId) -> Result<String, IdentityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            match actor.as_str() {
                "U404" => Err(IdentityError::NotFound(actor.clone())),
                other => Ok(format!("name-{other}")),
            }
        }
    }

    fn resolver() -> Arc<SlowResolver> {
        Arc::new(SlowResolver {
            calls: AtomicUsize::new(0),
        })
    }

    fn msg(user: &str) -> RawMessage {
        RawMessage {
            ts: "1.0".to_string(),
            user: ActorId::new(user),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_concurrent_lookups_for_one_actor_share_a_call() {
        let resolver = resolver();
        let cache = IdentityCache::new(resolver.clone());
        let actor = ActorId::new("U1").unwrap();

        let (a, b) = tokio::join!(cache.resolve(&actor), cache.resolve(&actor));
        assert_eq!(a, "name-U1");
        assert_eq!(b, "name-U1");
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_page_resolution_calls_once_per_actor() {
        let resolver = resolver();
        let cache = IdentityCache::new(resolver.clone());
        let mut page = vec![msg("U1"), msg("U2"), msg("U1"), msg("U404")];

        cache.resolve_page(&mut page).await;
        cache.resolve_page(&mut page).await;

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
        assert_eq!(page[0].display_name.as_deref(), Some("name-U1"));
        assert_eq!(page[2].display_name.as_deref(), Some("name-U1"));
        assert_eq!(page[3].display_name.as_deref(), Some(UNKNOWN_USER));
        assert_eq!(cache.len().await, 3);
    }

    #[tokio::test]
    async fn test_bot_messages_are_not_resolved() {
        let resolver = resolver();
        let cache = IdentityCache::new(resolver.clone());
        let mut page = vec![RawMessage {
            bot_id: Some("B1".to_string()),
            ..msg("U9")
        }];
        cache.resolve_page(&mut page).await;
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert!(page[0].display_name.is_none());
    }
}
