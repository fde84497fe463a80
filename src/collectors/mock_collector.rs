use crate::collectors::{CollectFuture, Collector};
use crate::error::CollectorError;
use crate::state::Entries;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Collector returning a fixed state, for tests
#[derive(Debug, Clone)]
pub struct MockCollector {
    entries: Result<Entries, String>,
    delay: Option<Duration>,
    call_count: Arc<AtomicUsize>,
}

impl MockCollector {
    /// Collector that always observes `entries`
    pub fn with_entries(entries: Entries) -> Self {
        Self {
            entries: Ok(entries),
            delay: None,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Collector that always fails with a parse error
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            entries: Err(message.into()),
            delay: None,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add a delay before the collector returns
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the number of times collect() has been called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Collector for MockCollector {
    fn collect(&self) -> CollectFuture<'_> {
        Box::pin(async move {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.entries
                .clone()
                .map_err(CollectorError::ParseError)
        })
    }
}
