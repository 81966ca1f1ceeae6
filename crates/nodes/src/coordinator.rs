//! `RunCoordinator`: accepts trigger events and starts pipeline runs.
//!
//! Each [`PipelineKind`] has one run slot. A trigger that finds its slot
//! taken is rejected immediately; it is never queued. Runs of different
//! kinds proceed in parallel. A run is never cancelled part way: shutdown
//! goes through [`RunCoordinator::drain`], which waits for runs in flight.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pipeline::{PipelineKind, PipelineRunId, TriggerEvent, TriggerOrigin};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};

use crate::executor::{PipelineExecutor, RunReport};

/// Acknowledgement sent to a command invoker before the run starts.
pub fn acknowledgement(kind: PipelineKind) -> &'static str {
    match kind {
        PipelineKind::Commits => "Generating git commit summary, please wait...",
        PipelineKind::ChannelHistory => "Generating channel summary, please wait...",
        PipelineKind::Lookup => "Doing a look up",
    }
}

fn already_running_notice(kind: PipelineKind) -> String {
    format!("A {kind} run is already in progress. Try again once it has finished.")
}

fn not_configured_notice(kind: PipelineKind) -> String {
    format!("The {kind} pipeline is not configured.")
}

// ---------------------------------------------------------------------------
// Run slots
// ---------------------------------------------------------------------------

/// Holds a pipeline kind's run slot. The slot is released on drop, so a
/// run that panics still frees its kind.
#[derive(Debug)]
pub struct RunHandle {
    kind: PipelineKind,
    run_id: PipelineRunId,
    slot: Arc<AtomicBool>,
    released: Arc<Notify>,
}

impl RunHandle {
    fn try_acquire(
        kind: PipelineKind,
        slot: &Arc<AtomicBool>,
        released: &Arc<Notify>,
    ) -> Option<Self> {
        slot.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                kind,
                run_id: PipelineRunId::new_random(),
                slot: slot.clone(),
                released: released.clone(),
            })
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    pub fn run_id(&self) -> PipelineRunId {
        self.run_id
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        self.slot.store(false, Ordering::Release);
        self.released.notify_waiters();
    }
}

/// Result of offering a trigger to the coordinator.
#[derive(Debug)]
pub enum TriggerOutcome {
    /// A run was spawned. The handle yields its report.
    Started {
        run_id: PipelineRunId,
        handle: JoinHandle<RunReport>,
    },
    /// Another run of the same kind holds the slot.
    AlreadyRunning,
    /// No pipeline of this kind is wired up.
    NotConfigured,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct RunCoordinator {
    executor: Arc<PipelineExecutor>,
    slots: Arc<HashMap<PipelineKind, Arc<AtomicBool>>>,
    released: Arc<Notify>,
}

impl RunCoordinator {
    pub fn new(executor: Arc<PipelineExecutor>) -> Self {
        let slots = PipelineKind::ALL
            .iter()
            .map(|kind| (*kind, Arc::new(AtomicBool::new(false))))
            .collect();
        Self {
            executor,
            slots: Arc::new(slots),
            released: Arc::new(Notify::new()),
        }
    }

    /// True while a run of `kind` holds its slot.
    pub fn is_running(&self, kind: PipelineKind) -> bool {
        self.slots
            .get(&kind)
            .is_some_and(|slot| slot.load(Ordering::Acquire))
    }

    fn any_running(&self) -> bool {
        PipelineKind::ALL.iter().any(|kind| self.is_running(*kind))
    }

    /// Waits until no run of any kind is in flight, for at most `grace`.
    /// Returns `false` if runs were still going when the grace period ran out.
    ///
    /// Callers stop offering triggers first; a run started while draining
    /// extends the wait.
    pub async fn drain(&self, grace: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            let released = self.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            if !self.any_running() {
                return true;
            }
            if tokio::time::timeout_at(deadline, released).await.is_err() {
                let running: Vec<&str> = PipelineKind::ALL
                    .iter()
                    .filter(|kind| self.is_running(**kind))
                    .map(|kind| kind.as_str())
                    .collect();
                warn!(running = ?running, "Grace period over with runs still in flight");
                return false;
            }
        }
    }

    /// Offers a trigger. Returns as soon as the run is spawned or rejected.
    ///
    /// Command invokers get an acknowledgement before the run starts, and a
    /// notice in their channel when the trigger is rejected.
    pub async fn trigger(&self, event: TriggerEvent) -> TriggerOutcome {
        let TriggerEvent { kind, origin } = event;
        let dispatcher = self.executor.dispatcher();

        let slot = match self.slots.get(&kind) {
            Some(slot) if self.executor.is_configured(kind) => slot,
            _ => {
                warn!(pipeline = %kind, "Trigger for unconfigured pipeline ignored");
                if let Some(reply) = origin.reply_channel() {
                    dispatcher.notify(reply, &not_configured_notice(kind)).await;
                }
                return TriggerOutcome::NotConfigured;
            }
        };

        let Some(run) = RunHandle::try_acquire(kind, slot, &self.released) else {
            info!(pipeline = %kind, "Run already in progress; trigger rejected");
            if let Some(reply) = origin.reply_channel() {
                dispatcher.notify(reply, &already_running_notice(kind)).await;
            }
            return TriggerOutcome::AlreadyRunning;
        };

        if let TriggerOrigin::Command(ctx) = &origin {
            dispatcher
                .notify(&ctx.reply_channel, acknowledgement(kind))
                .await;
        }

        let run_id = run.run_id();
        let span = info_span!("pipeline_run", run_id = %run_id, pipeline = %kind);
        let executor = self.executor.clone();
        let handle = tokio::spawn(
            async move {
                let report = executor.run(run_id, kind, &origin).await;
                drop(run);
                report
            }
            .instrument(span),
        );

        TriggerOutcome::Started { run_id, handle }
    }
}
