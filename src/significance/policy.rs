use crate::diff::ChangeSet;
use crate::significance::rules::{CapacityOpeningRule, LabelChangeRule};
use crate::state::{EntityId, StateSnapshot, Value};
use log::debug;
use serde::Serialize;

/// Trait for rules that decide whether a single change warrants a notification
///
/// Rules are pure predicates over the previous and the current value of one
/// entity; they must not keep state between calls.
#[cfg_attr(test, mockall::automock)]
pub trait SignificanceRule: Send + Sync {
    /// Whether this rule is responsible for the given pair of values
    fn applies_to(&self, old: &Value, new: &Value) -> bool;

    /// Whether the change from `old` to `new` is significant
    fn is_significant(&self, entity_id: &EntityId, old: &Value, new: &Value) -> bool;

    /// Get a human-readable name for this rule
    fn name(&self) -> &'static str;
}

/// Why an entity was selected for notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetReason {
    /// Entity appeared since the previous snapshot
    Added,
    /// Entity disappeared since the previous snapshot
    Removed,
    /// Entity changed significantly
    Changed,
    /// Entity selected because every entry was forced
    Override,
}

/// One entity a notification should be sent about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationTarget {
    pub entity_id: EntityId,
    pub reason: TargetReason,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// How targets are selected from a change set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionMode {
    /// Added and removed entries plus significant changes
    #[default]
    SignificantChanges,
    /// Every current entry regardless of significance, plus removed entries
    AllEntries,
}

/// Significance policy composed of value-kind specific rules
///
/// The first rule that applies to a pair of values decides. Pairs no rule
/// applies to (for example a count replaced by a label) are significant
/// whenever they differ.
pub struct SignificancePolicy {
    rules: Vec<Box<dyn SignificanceRule>>,
}

impl Default for SignificancePolicy {
    fn default() -> Self {
        Self::with_capacity_rule(CapacityOpeningRule::default())
    }
}

impl SignificancePolicy {
    /// Create a policy with no rules
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create the standard policy with a custom capacity hysteresis
    pub fn with_capacity_rule(capacity: CapacityOpeningRule) -> Self {
        let mut policy = Self::new();
        policy.add_rule(Box::new(capacity));
        policy.add_rule(Box::new(LabelChangeRule));
        policy
    }

    pub fn add_rule(&mut self, rule: Box<dyn SignificanceRule>) {
        self.rules.push(rule);
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Decide whether one changed entry is significant
    pub fn is_significant(&self, entity_id: &EntityId, old: &Value, new: &Value) -> bool {
        match self.rules.iter().find(|rule| rule.applies_to(old, new)) {
            Some(rule) => {
                let significant = rule.is_significant(entity_id, old, new);
                if !significant {
                    debug!(
                        "{} suppressed change of '{}': {} -> {}",
                        rule.name(),
                        entity_id,
                        old,
                        new
                    );
                }
                significant
            }
            None => old != new,
        }
    }

    /// Select the entities to notify about
    ///
    /// Added and removed entities are always targets. Changed entities are
    /// targets when significant. In [`SelectionMode::AllEntries`] every entry
    /// of the current snapshot is a target as well.
    pub fn select_targets(
        &self,
        changes: &ChangeSet,
        previous: &StateSnapshot,
        current: &StateSnapshot,
        mode: SelectionMode,
    ) -> Vec<NotificationTarget> {
        let mut targets = Vec::new();

        for (id, value) in current.entries() {
            let reason = if changes.added.contains(id) {
                Some(TargetReason::Added)
            } else if let Some(change) = changes.changed.get(id) {
                self.is_significant(id, &change.old, &change.new)
                    .then_some(TargetReason::Changed)
            } else {
                None
            };

            let reason = match (reason, mode) {
                (Some(reason), _) => reason,
                (None, SelectionMode::AllEntries) => TargetReason::Override,
                (None, SelectionMode::SignificantChanges) => continue,
            };

            targets.push(NotificationTarget {
                entity_id: id.clone(),
                reason,
                old: previous.get(id.as_str()).cloned(),
                new: Some(value.clone()),
            });
        }

        for id in &changes.removed {
            targets.push(NotificationTarget {
                entity_id: id.clone(),
                reason: TargetReason::Removed,
                old: previous.get(id.as_str()).cloned(),
                new: None,
            });
        }

        targets
    }
}
