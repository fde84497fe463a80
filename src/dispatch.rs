//! Concurrent fan-out of one notification event to many sinks
//!
//! Every sink runs in its own task. The dispatcher waits for all of them,
//! whatever their result, and only then reports. One failing or slow sink
//! never prevents the others from delivering.

use crate::error::{DispatchError, SinkError};
use crate::sinks::{NotificationEvent, Sink};
use log::{error, info};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Identifier of a sink, as returned by [`Sink::id`]
pub type SinkId = String;

/// A sink that did not deliver, with the error it failed with
#[derive(Debug)]
pub struct SinkFailure {
    pub sink_id: SinkId,
    pub error: SinkError,
}

/// Result of one dispatch
///
/// Only ever constructed after every sink has settled.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub succeeded: Vec<SinkId>,
    pub failed: Vec<SinkFailure>,
}

impl DispatchOutcome {
    /// Number of sinks dispatched to
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Turn partial failure into one aggregated error
    pub fn into_result(self) -> Result<Vec<SinkId>, DispatchError> {
        if self.is_success() {
            Ok(self.succeeded)
        } else {
            Err(DispatchError::new(self))
        }
    }
}

/// Delivers events to all sinks concurrently
#[derive(Debug, Clone, Default)]
pub struct FanoutDispatcher {
    sink_timeout: Option<Duration>,
}

impl FanoutDispatcher {
    /// Create a dispatcher that waits for sinks indefinitely
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dispatcher that fails sinks taking longer than `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            sink_timeout: Some(timeout),
        }
    }

    /// Invoke every sink with the event and collect every outcome
    ///
    /// Sinks are spawned before any of them is awaited, so they all run
    /// concurrently. Each task checks its own sink's configuration before
    /// notifying; configuration errors, delivery errors, timeouts and panics
    /// are recorded per sink.
    pub async fn dispatch(
        &self,
        event: Arc<NotificationEvent>,
        sinks: &[Arc<dyn Sink>],
    ) -> DispatchOutcome {
        info!("Dispatching to {} sinks", sinks.len());

        let handles: Vec<(SinkId, JoinHandle<Result<(), SinkError>>)> = sinks
            .iter()
            .map(|sink| {
                let sink_id = sink.id().to_string();
                let handle = tokio::spawn(Self::run_sink(
                    Arc::clone(sink),
                    Arc::clone(&event),
                    self.sink_timeout,
                ));
                (sink_id, handle)
            })
            .collect();

        let mut outcome = DispatchOutcome::default();
        for (sink_id, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_error) => Err(SinkError::Panicked(match join_error.try_into_panic() {
                    Ok(payload) => panic_message(payload),
                    Err(join_error) => join_error.to_string(),
                })),
            };

            match result {
                Ok(()) => {
                    info!("Sink '{}' delivered", sink_id);
                    outcome.succeeded.push(sink_id);
                }
                Err(error) => {
                    error!("Sink '{}' failed: {}", sink_id, error);
                    outcome.failed.push(SinkFailure { sink_id, error });
                }
            }
        }

        outcome
    }

    async fn run_sink(
        sink: Arc<dyn Sink>,
        event: Arc<NotificationEvent>,
        timeout: Option<Duration>,
    ) -> Result<(), SinkError> {
        sink.validate(&event)?;

        match timeout {
            Some(limit) => tokio::time::timeout(limit, sink.notify(&event))
                .await
                .unwrap_or(Err(SinkError::Timeout(limit))),
            None => sink.notify(&event).await,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::test_support::changed_event;
    use crate::sinks::{DeployHookSink, MockSink, RecordingTransport};
    use std::time::Instant;

    fn as_sinks(mocks: &[MockSink]) -> Vec<Arc<dyn Sink>> {
        mocks
            .iter()
            .map(|mock| Arc::new(mock.clone()) as Arc<dyn Sink>)
            .collect()
    }

    #[tokio::test]
    async fn test_all_sinks_succeed() {
        let mocks = [MockSink::success("a"), MockSink::success("b")];

        let outcome = FanoutDispatcher::new()
            .dispatch(Arc::new(changed_event()), &as_sinks(&mocks))
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.succeeded, vec!["a", "b"]);
        assert_eq!(outcome.into_result().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_starve_others() {
        let mocks = [
            MockSink::success("summary").with_delay(Duration::from_millis(20)),
            MockSink::failing("changelog", "rejected"),
            MockSink::success("deploy-hook").with_delay(Duration::from_millis(20)),
        ];

        let outcome = FanoutDispatcher::new()
            .dispatch(Arc::new(changed_event()), &as_sinks(&mocks))
            .await;

        // Every sink ran to completion before the outcome was produced.
        for mock in &mocks {
            assert_eq!(mock.completed_count(), 1);
        }
        assert_eq!(outcome.succeeded, vec!["summary", "deploy-hook"]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].sink_id, "changelog");
        assert!(matches!(
            outcome.failed[0].error,
            SinkError::NotificationFailed(_)
        ));
    }

    #[tokio::test]
    async fn test_aggregated_error_lists_every_failure() {
        let mocks = [
            MockSink::failing("a", "first"),
            MockSink::success("b"),
            MockSink::failing("c", "second"),
        ];

        let error = FanoutDispatcher::new()
            .dispatch(Arc::new(changed_event()), &as_sinks(&mocks))
            .await
            .into_result()
            .unwrap_err();

        let failed: Vec<&str> = error
            .failures()
            .iter()
            .map(|failure| failure.sink_id.as_str())
            .collect();
        assert_eq!(failed, vec!["a", "c"]);
        assert_eq!(error.succeeded(), ["b".to_string()]);
    }

    #[tokio::test]
    async fn test_sinks_run_concurrently() {
        let mocks: Vec<MockSink> = (0..4)
            .map(|i| MockSink::success(format!("sink-{}", i)).with_delay(Duration::from_millis(100)))
            .collect();

        let start = Instant::now();
        let outcome = FanoutDispatcher::new()
            .dispatch(Arc::new(changed_event()), &as_sinks(&mocks))
            .await;

        assert!(outcome.is_success());
        assert!(start.elapsed() < Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_timeout_is_ordinary_failure() {
        let mocks = [
            MockSink::success("slow").with_delay(Duration::from_secs(5)),
            MockSink::success("fast"),
        ];

        let outcome = FanoutDispatcher::with_timeout(Duration::from_millis(20))
            .dispatch(Arc::new(changed_event()), &as_sinks(&mocks))
            .await;

        assert_eq!(outcome.succeeded, vec!["fast"]);
        assert_eq!(outcome.failed.len(), 1);
        assert!(matches!(outcome.failed[0].error, SinkError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_panicking_sink_is_captured() {
        let mocks = [MockSink::panicking("broken", "sink exploded"), MockSink::success("ok")];

        let outcome = FanoutDispatcher::new()
            .dispatch(Arc::new(changed_event()), &as_sinks(&mocks))
            .await;

        assert_eq!(outcome.succeeded, vec!["ok"]);
        match &outcome.failed[0].error {
            SinkError::Panicked(message) => assert_eq!(message, "sink exploded"),
            other => panic!("Expected Panicked, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_sinks() {
        let outcome = FanoutDispatcher::new()
            .dispatch(Arc::new(changed_event()), &[])
            .await;

        assert_eq!(outcome.total(), 0);
        assert!(outcome.into_result().is_ok());
    }

    #[tokio::test]
    async fn test_misconfigured_sink_fails_alone() {
        let transport = Arc::new(RecordingTransport::new());
        let summary = MockSink::success("issue-summary");
        let sinks: Vec<Arc<dyn Sink>> = vec![
            Arc::new(summary.clone()),
            Arc::new(DeployHookSink::new(None, transport.clone())),
        ];

        let outcome = FanoutDispatcher::new()
            .dispatch(Arc::new(changed_event()), &sinks)
            .await;

        assert_eq!(summary.call_count(), 1);
        assert_eq!(outcome.succeeded, vec!["issue-summary"]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].sink_id, "deploy-hook");
        assert!(matches!(
            outcome.failed[0].error,
            SinkError::Configuration(_)
        ));
        assert!(transport.requests().is_empty());
    }
}
