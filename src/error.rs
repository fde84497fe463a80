use crate::dispatch::{DispatchOutcome, SinkFailure};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while collecting the current state
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Failed to spawn collector subprocess: {0}")]
    SubprocessSpawn(String),

    #[error("Collector subprocess failed: {0}")]
    SubprocessFailed(String),

    #[error("Failed to parse collector output: {0}")]
    ParseError(String),

    #[error("Collector timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur when loading or saving a snapshot
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot not found: {0}")]
    NotFound(String),

    #[error("Unable to fetch snapshot: {0}")]
    Fetch(String),

    #[error("Failed to parse snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to write snapshot: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur when a sink delivers a notification
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to send notification: {0}")]
    NotificationFailed(String),

    #[error("Endpoint {url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sink timed out after {0:?}")]
    Timeout(Duration),

    #[error("Sink task panicked: {0}")]
    Panicked(String),

    #[error("Sink misconfigured: {0}")]
    Configuration(#[from] ConfigError),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("Missing required value: {0}")]
    MissingValue(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Aggregated failure of one dispatch
///
/// Carries the complete outcome so callers can enumerate every failed sink
/// (and see which ones succeeded) instead of only the first failure.
#[derive(Error, Debug)]
#[error("{}", describe_outcome(.outcome))]
pub struct DispatchError {
    outcome: DispatchOutcome,
}

impl DispatchError {
    pub(crate) fn new(outcome: DispatchOutcome) -> Self {
        Self { outcome }
    }

    /// Every failed sink together with its original error
    pub fn failures(&self) -> &[SinkFailure] {
        &self.outcome.failed
    }

    /// Sinks that completed successfully during the same dispatch
    pub fn succeeded(&self) -> &[String] {
        &self.outcome.succeeded
    }

    pub fn into_outcome(self) -> DispatchOutcome {
        self.outcome
    }
}

fn describe_outcome(outcome: &DispatchOutcome) -> String {
    let failures = outcome
        .failed
        .iter()
        .map(|failure| format!("[{}] {}", failure.sink_id, failure.error))
        .collect::<Vec<_>>()
        .join("; ");
    format!(
        "{} of {} notification sinks failed: {}",
        outcome.failed.len(),
        outcome.total(),
        failures
    )
}

/// Errors that abort or fail a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to collect current state: {0}")]
    Collection(#[source] CollectorError),

    #[error("Failed to load previous snapshot: {0}")]
    SnapshotLoad(#[source] SnapshotError),

    #[error("Failed to persist snapshot: {0}")]
    Persistence(#[source] SnapshotError),

    #[error("Notification failed: {0}")]
    Notify(#[from] DispatchError),
}

impl PipelineError {
    /// Whether the run failed before the new snapshot was persisted
    pub fn is_acquisition_failure(&self) -> bool {
        matches!(
            self,
            PipelineError::Collection(_) | PipelineError::SnapshotLoad(_)
        )
    }
}
