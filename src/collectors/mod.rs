/// Subprocess collector running an external scraper
pub mod command_collector;

/// HTTP collector fetching a JSON mapping
pub mod http_collector;

/// Scripted collector for tests
pub mod mock_collector;

/// Parsers for scraper output
pub mod parse;

pub use command_collector::CommandCollector;
pub use http_collector::HttpCollector;
pub use mock_collector::MockCollector;
pub use parse::OutputFormat;

use crate::error::CollectorError;
use crate::state::Entries;
use std::future::Future;
use std::pin::Pin;

/// Future returned by [`Collector::collect`]
pub type CollectFuture<'a> = Pin<Box<dyn Future<Output = Result<Entries, CollectorError>> + Send + 'a>>;

/// Source of the current state
pub trait Collector: Send + Sync {
    /// Observe the current state of every monitored entity
    fn collect(&self) -> CollectFuture<'_>;
}
