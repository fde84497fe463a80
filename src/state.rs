//! Core state types for vax-notify
//!
//! This module defines the observed-state data model shared by collectors,
//! snapshot stores, the diff engine and notification sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Observed entries keyed by entity id
pub type Entries = BTreeMap<EntityId, Value>;

/// Stable key of one monitored unit (a vaccination centre, an eligibility group)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Value observed for one entity
///
/// Counts come from the free-dates page, labels from the eligibility form.
/// Serialized untagged, so a count is a plain JSON number and a label is
/// `{"label": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Number of free appointments at a centre
    Count(u64),
    /// Human readable label of an eligibility group
    Label { label: String },
}

/// Kind of values a monitoring domain produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Count,
    Label,
}

impl Value {
    pub fn label(label: impl Into<String>) -> Self {
        Value::Label {
            label: label.into(),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Count(_) => ValueKind::Count,
            Value::Label { .. } => ValueKind::Label,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Count(count) => write!(f, "{}", count),
            Value::Label { label } => f.write_str(label),
        }
    }
}

/// Full observed state plus the time it was observed
///
/// Snapshots are immutable once constructed; a run replaces the persisted
/// snapshot as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    // Snapshots written by older deployments keyed the mapping by domain.
    #[serde(alias = "groups", alias = "dates")]
    entries: Entries,
    #[serde(rename = "lastUpdated")]
    observed_at: Timestamp,
}

impl StateSnapshot {
    pub fn new(entries: Entries, observed_at: Timestamp) -> Self {
        Self {
            entries,
            observed_at,
        }
    }

    /// Snapshot of the current state observed right now
    pub fn observed_now(entries: Entries) -> Self {
        Self::new(entries, Utc::now())
    }

    /// Snapshot without entries, used when no previous state exists yet
    pub fn empty() -> Self {
        Self::new(Entries::new(), DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn entries(&self) -> &Entries {
        &self.entries
    }

    pub fn observed_at(&self) -> Timestamp {
        self.observed_at
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to the persisted JSON layout
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse the persisted JSON layout
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
