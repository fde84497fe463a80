//! One acquire, diff, persist, notify run
//!
//! The current state is persisted as soon as it has been diffed, before any
//! sink runs. A failed notification therefore never causes the same change
//! to be announced twice on the next run. Runs are not serialized against
//! each other: two overlapping runs sharing a store race on `save` and the
//! last write wins.

use crate::collectors::Collector;
use crate::diff::{diff, ChangeSet};
use crate::dispatch::{DispatchOutcome, FanoutDispatcher, SinkId};
use crate::error::{DispatchError, PipelineError, SnapshotError};
use crate::significance::{SelectionMode, SignificancePolicy};
use crate::sinks::{NotificationEvent, Sink};
use crate::state::StateSnapshot;
use crate::store::SnapshotStore;
use log::{debug, info, warn};
use std::sync::Arc;

/// Per-run switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// How notification targets are selected
    pub mode: SelectionMode,
    /// Start from an empty snapshot when nothing has been persisted yet
    pub allow_missing_snapshot: bool,
}

/// Summary of a successful run
#[derive(Debug)]
pub struct RunReport {
    /// Difference between the previous and the current snapshot
    pub changes: ChangeSet,
    /// Number of entities selected for notification
    pub target_count: usize,
    /// Per-sink results of the notify stage
    pub outcome: DispatchOutcome,
}

impl RunReport {
    pub fn succeeded(&self) -> &[SinkId] {
        &self.outcome.succeeded
    }
}

/// Wires a collector, a snapshot store, the significance policy and the
/// notification sinks into a single run
pub struct Pipeline {
    collector: Arc<dyn Collector>,
    store: Arc<dyn SnapshotStore>,
    policy: SignificancePolicy,
    dispatcher: FanoutDispatcher,
    sinks: Vec<Arc<dyn Sink>>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        collector: Arc<dyn Collector>,
        store: Arc<dyn SnapshotStore>,
        policy: SignificancePolicy,
        dispatcher: FanoutDispatcher,
        sinks: Vec<Arc<dyn Sink>>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            collector,
            store,
            policy,
            dispatcher,
            sinks,
            options,
        }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Execute one run
    ///
    /// # Errors
    ///
    /// * `Collection` / `SnapshotLoad` - acquisition failed; nothing was
    ///   persisted and no sink was invoked
    /// * `Persistence` - the new snapshot could not be saved; no sink was
    ///   invoked
    /// * `Notify` - at least one sink failed after all sinks settled; the
    ///   snapshot stays persisted. A misconfigured sink fails here as
    ///   `SinkError::Configuration` without holding back the other sinks.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let (previous, current) = self.acquire().await?;

        let changes = diff(&previous, &current);
        info!(
            "Diffed {} previous against {} current entries: {} added, {} removed, {} changed",
            previous.len(),
            current.len(),
            changes.added.len(),
            changes.removed.len(),
            changes.changed.len()
        );

        self.store
            .save(&current)
            .await
            .map_err(PipelineError::Persistence)?;

        let targets = self
            .policy
            .select_targets(&changes, &previous, &current, self.options.mode);
        let target_count = targets.len();
        info!("Selected {} notification targets", target_count);
        for target in &targets {
            debug!("Target '{}' ({:?})", target.entity_id, target.reason);
        }

        let event = Arc::new(NotificationEvent {
            previous,
            current,
            changes,
            targets,
            mode: self.options.mode,
        });

        let outcome = self.dispatcher.dispatch(Arc::clone(&event), &self.sinks).await;
        if !outcome.is_success() {
            return Err(DispatchError::new(outcome).into());
        }

        let changes = Arc::try_unwrap(event)
            .map(|event| event.changes)
            .unwrap_or_else(|shared| shared.changes.clone());

        Ok(RunReport {
            changes,
            target_count,
            outcome,
        })
    }

    /// Load the previous snapshot and collect the current state concurrently
    async fn acquire(&self) -> Result<(StateSnapshot, StateSnapshot), PipelineError> {
        let (previous, current) = tokio::join!(self.store.load(), self.collector.collect());

        let current = current.map_err(PipelineError::Collection)?;
        let previous = match previous {
            Ok(snapshot) => snapshot,
            Err(SnapshotError::NotFound(location)) if self.options.allow_missing_snapshot => {
                warn!(
                    "No previous snapshot at {}, starting from an empty state",
                    location
                );
                StateSnapshot::empty()
            }
            Err(e) => return Err(PipelineError::SnapshotLoad(e)),
        };

        Ok((previous, StateSnapshot::observed_now(current)))
    }
}
