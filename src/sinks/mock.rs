use crate::error::SinkError;
use crate::sinks::{NotificationEvent, NotifyFuture, Sink};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Behaviour of a [`MockSink`] when notified
#[derive(Debug, Clone)]
enum MockBehavior {
    Succeed,
    Fail(String),
    Panic(String),
}

/// Sink with scripted behaviour, for tests
///
/// Counters are shared through `Arc`, so clones observe the same calls.
#[derive(Debug, Clone)]
pub struct MockSink {
    id: String,
    behavior: MockBehavior,
    delay: Option<Duration>,
    call_count: Arc<AtomicUsize>,
    completed_count: Arc<AtomicUsize>,
    last_target_count: Arc<AtomicUsize>,
}

impl MockSink {
    fn with_behavior(id: impl Into<String>, behavior: MockBehavior) -> Self {
        Self {
            id: id.into(),
            behavior,
            delay: None,
            call_count: Arc::new(AtomicUsize::new(0)),
            completed_count: Arc::new(AtomicUsize::new(0)),
            last_target_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sink that always succeeds
    pub fn success(id: impl Into<String>) -> Self {
        Self::with_behavior(id, MockBehavior::Succeed)
    }

    /// Sink that always fails with the given message
    pub fn failing(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_behavior(id, MockBehavior::Fail(message.into()))
    }

    /// Sink whose task panics
    pub fn panicking(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_behavior(id, MockBehavior::Panic(message.into()))
    }

    /// Add a delay before the sink settles
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times notify() has been called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Number of notify() calls that ran to completion
    pub fn completed_count(&self) -> usize {
        self.completed_count.load(Ordering::SeqCst)
    }

    /// Number of targets in the last event received
    pub fn last_target_count(&self) -> usize {
        self.last_target_count.load(Ordering::SeqCst)
    }
}

impl Sink for MockSink {
    fn id(&self) -> &str {
        &self.id
    }

    fn notify<'a>(&'a self, event: &'a NotificationEvent) -> NotifyFuture<'a> {
        Box::pin(async move {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.last_target_count
                .store(event.targets.len(), Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.completed_count.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                MockBehavior::Succeed => Ok(()),
                MockBehavior::Fail(message) => Err(SinkError::NotificationFailed(message.clone())),
                MockBehavior::Panic(message) => panic!("{}", message),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::test_support::changed_event;

    #[tokio::test]
    async fn test_mock_sink_tracks_calls() {
        let sink = MockSink::success("summary");
        let observer = sink.clone();

        sink.notify(&changed_event()).await.unwrap();
        sink.notify(&changed_event()).await.unwrap();

        assert_eq!(observer.call_count(), 2);
        assert_eq!(observer.completed_count(), 2);
        assert_eq!(observer.last_target_count(), 3);
        assert_eq!(sink.id(), "summary");
    }

    #[tokio::test]
    async fn test_mock_sink_failure() {
        let sink = MockSink::failing("hook", "404 Not Found");

        match sink.notify(&changed_event()).await {
            Err(SinkError::NotificationFailed(msg)) => assert_eq!(msg, "404 Not Found"),
            other => panic!("Expected NotificationFailed, got {:?}", other),
        }
    }
}
