//! Built-in significance rules
//!
//! Each rule decides, for one value kind, whether a change between the
//! previous and the current value is worth a notification.

use crate::significance::SignificanceRule;
use crate::state::{EntityId, Value};

/// Hysteresis filter for free-appointment counts
///
/// Counts at the source toggle between 0 and 2 while appointments are
/// reserved and released again. A change is only significant when it crosses
/// into "has capacity" (`new >= threshold`) from at most the threshold
/// (`old <= threshold`) and grows by at least `min_increase`. Decreases are
/// never significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityOpeningRule {
    /// Count from which a centre is considered to have capacity
    pub threshold: u64,
    /// Smallest increase that counts as a genuine opening
    pub min_increase: u64,
}

impl Default for CapacityOpeningRule {
    fn default() -> Self {
        Self::new(2, 2)
    }
}

impl CapacityOpeningRule {
    pub fn new(threshold: u64, min_increase: u64) -> Self {
        Self {
            threshold,
            min_increase,
        }
    }

    /// Apply the hysteresis condition to two raw counts
    pub fn is_opening(&self, old: u64, new: u64) -> bool {
        old <= self.threshold
            && new >= self.threshold
            && new.saturating_sub(old) >= self.min_increase
    }
}

impl SignificanceRule for CapacityOpeningRule {
    fn applies_to(&self, old: &Value, new: &Value) -> bool {
        matches!((old, new), (Value::Count(_), Value::Count(_)))
    }

    fn is_significant(&self, _entity_id: &EntityId, old: &Value, new: &Value) -> bool {
        match (old, new) {
            (Value::Count(old), Value::Count(new)) => self.is_opening(*old, *new),
            _ => false,
        }
    }

    fn name(&self) -> &'static str {
        "CapacityOpeningRule"
    }
}

/// Eligibility group labels do not fluctuate, so any change counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelChangeRule;

impl SignificanceRule for LabelChangeRule {
    fn applies_to(&self, old: &Value, new: &Value) -> bool {
        matches!((old, new), (Value::Label { .. }, Value::Label { .. }))
    }

    fn is_significant(&self, _entity_id: &EntityId, old: &Value, new: &Value) -> bool {
        old != new
    }

    fn name(&self) -> &'static str {
        "LabelChangeRule"
    }
}
