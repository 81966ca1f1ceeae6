use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pipeline::{EventSource, PipelineKind, Schedule, TriggerEvent};
use tracing::{debug, info, warn};

/// Emits a scheduled trigger for one pipeline each time its schedule fires.
///
/// Missed fire times (the process was suspended, or the previous run took
/// longer than the interval) are not replayed; the ticker simply waits for
/// the next one after "now". A fire time is emitted at most once, even when
/// the wall clock reads slightly behind the timer on wake-up.
pub struct ScheduleTicker {
    kind: PipelineKind,
    schedule: Schedule,
    last_fire: Option<DateTime<Utc>>,
}

impl ScheduleTicker {
    pub fn new(kind: PipelineKind, schedule: Schedule) -> Self {
        Self {
            kind,
            schedule,
            last_fire: None,
        }
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// The fire time most recently emitted.
    pub fn last_fire(&self) -> Option<DateTime<Utc>> {
        self.last_fire
    }

    /// The first fire time strictly after both `now` and the last emitted one.
    pub fn next_fire(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let after = self.last_fire.map_or(now, |last| last.max(now));
        self.schedule.next_after(after)
    }
}

#[async_trait]
impl EventSource for ScheduleTicker {
    async fn next_event(&mut self) -> Option<TriggerEvent> {
        let now = Utc::now();
        let Some(at) = self.next_fire(now) else {
            warn!(pipeline = %self.kind, schedule = %self.schedule, "Schedule never fires; ticker stopped");
            return None;
        };
        let wait = (at - now).to_std().unwrap_or_default();
        debug!(pipeline = %self.kind, next = %at, "Waiting for next scheduled run");
        tokio::time::sleep(wait).await;

        self.last_fire = Some(at);
        info!(pipeline = %self.kind, schedule = %self.schedule, "Schedule fired");
        Some(TriggerEvent::scheduled(self.kind))
    }
}
