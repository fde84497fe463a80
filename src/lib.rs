//! Snapshot diffing and change notification for vaccination availability
//!
//! Each run observes the current state of a monitored source, compares it
//! with the previously persisted snapshot, persists the new state and fans
//! the significant changes out to every configured notification sink.

/// Error types for the notifier
pub mod error;

/// Snapshot and value model
pub mod state;

/// Snapshot comparison
pub mod diff;

/// Significance rules and notification target selection
pub mod significance;

/// Concurrent delivery to notification sinks
pub mod dispatch;

/// Sources of the current state
pub mod collectors;

/// Snapshot persistence
pub mod store;

/// Notification sinks and their transports
pub mod sinks;

/// Configuration management
pub mod config;

/// End-to-end run orchestration
pub mod pipeline;

// Re-export commonly used types
pub use diff::{diff, Change, ChangeSet};
pub use dispatch::{DispatchOutcome, FanoutDispatcher, SinkFailure};
pub use error::{
    CollectorError, ConfigError, DispatchError, PipelineError, SinkError, SnapshotError,
};
pub use pipeline::{Pipeline, PipelineOptions, RunReport};
pub use significance::{NotificationTarget, SelectionMode, SignificancePolicy, TargetReason};
pub use state::{EntityId, StateSnapshot, Value, ValueKind};
