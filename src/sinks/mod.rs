//! Notification sinks
//!
//! A sink is one independent notification channel. Every sink receives the
//! same [`NotificationEvent`] and decides on its own whether there is
//! anything to report. Sinks never perform I/O themselves; they hand an
//! [`OutboundRequest`] to a [`Transport`], which is either the live HTTP
//! transport or the dry-run log transport.

/// Email campaign sender
pub mod campaign;

/// Deploy hook trigger
pub mod deploy_hook;

/// Issue tracker summary and changelog sinks
pub mod issue;

/// Configurable sink for tests
pub mod mock;

/// Live, dry-run and recording transports
pub mod transport;

pub use campaign::{CampaignSettings, CampaignSink};
pub use deploy_hook::DeployHookSink;
pub use issue::{ChangelogSink, IssueSummarySink, IssueTarget};
pub use mock::MockSink;
pub use transport::{HttpTransport, LogTransport, OutboundRequest, RecordingTransport, Transport};

use crate::diff::ChangeSet;
use crate::error::{ConfigError, SinkError};
use crate::significance::{NotificationTarget, SelectionMode};
use crate::state::{StateSnapshot, Timestamp};
use std::future::Future;
use std::pin::Pin;

/// Future returned by [`Sink::notify`]
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>>;

/// Trait for notification channels
pub trait Sink: Send + Sync {
    /// Stable identifier used in dispatch outcomes and logs
    fn id(&self) -> &str;

    /// Check that the sink is able to deliver the given event
    ///
    /// Runs before any sink is invoked; a configuration error here aborts the
    /// notify stage before anything is sent.
    fn validate(&self, _event: &NotificationEvent) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Deliver the event
    fn notify<'a>(&'a self, event: &'a NotificationEvent) -> NotifyFuture<'a>;
}

/// Everything a sink may need to know about one pipeline run
///
/// Built once per run and shared read-only between all sinks.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    /// Snapshot the run compared against
    pub previous: StateSnapshot,
    /// Freshly observed state
    pub current: StateSnapshot,
    /// Raw difference between the two snapshots
    pub changes: ChangeSet,
    /// Entities selected for notification
    pub targets: Vec<NotificationTarget>,
    /// Whether targets were forced for every entry
    pub mode: SelectionMode,
}

impl NotificationEvent {
    pub fn observed_at(&self) -> Timestamp {
        self.current.observed_at()
    }

    /// Whether a meaningful change was detected (or forced)
    pub fn has_targets(&self) -> bool {
        !self.targets.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::diff::diff;
    use crate::significance::SignificancePolicy;
    use crate::state::{EntityId, Entries, Value};

    pub(crate) fn snapshot(pairs: &[(&str, Value)]) -> StateSnapshot {
        let entries: Entries = pairs
            .iter()
            .map(|(id, value)| (EntityId::from(*id), value.clone()))
            .collect();
        StateSnapshot::observed_now(entries)
    }

    /// Build the event the pipeline would build for two snapshots
    pub(crate) fn event_between(previous: StateSnapshot, current: StateSnapshot) -> NotificationEvent {
        let changes = diff(&previous, &current);
        let targets = SignificancePolicy::default().select_targets(
            &changes,
            &previous,
            &current,
            SelectionMode::SignificantChanges,
        );
        NotificationEvent {
            previous,
            current,
            changes,
            targets,
            mode: SelectionMode::SignificantChanges,
        }
    }

    pub(crate) fn unchanged_event() -> NotificationEvent {
        let state = snapshot(&[("gwt-uid-1", Value::label("Pflegekräfte"))]);
        event_between(state.clone(), state)
    }

    pub(crate) fn changed_event() -> NotificationEvent {
        event_between(
            snapshot(&[
                ("gwt-uid-a", Value::label("will be deleted")),
                ("gwt-uid-b", Value::label("Lehrer")),
            ]),
            snapshot(&[
                ("gwt-uid-b", Value::label("Lehrkräfte")),
                ("gwt-uid-c", Value::label("Polizei")),
            ]),
        )
    }
}
