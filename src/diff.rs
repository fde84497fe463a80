//! Snapshot diff engine
//!
//! Classifies every entity of two snapshots as added, removed, changed or
//! unchanged. The diff is pure and total: it never fails and every id of
//! either snapshot lands in exactly one partition (or none, if unchanged).

use crate::state::{EntityId, StateSnapshot, Value};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Old and new value of an entity present in both snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub old: Value,
    pub new: Value,
}

/// Structured difference between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub added: BTreeSet<EntityId>,
    pub removed: BTreeSet<EntityId>,
    pub changed: BTreeMap<EntityId, Change>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Total number of entities that differ
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.added.contains(id) || self.removed.contains(id) || self.changed.contains_key(id)
    }
}

/// Compute the change set that turns `previous` into `current`
pub fn diff(previous: &StateSnapshot, current: &StateSnapshot) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (id, new) in current.entries() {
        match previous.get(id.as_str()) {
            None => {
                changes.added.insert(id.clone());
            }
            Some(old) if old != new => {
                changes.changed.insert(
                    id.clone(),
                    Change {
                        old: old.clone(),
                        new: new.clone(),
                    },
                );
            }
            Some(_) => {}
        }
    }

    changes.removed = previous
        .entries()
        .keys()
        .filter(|id| current.get(id.as_str()).is_none())
        .cloned()
        .collect();

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Entries;

    pub(crate) fn snapshot(pairs: &[(&str, Value)]) -> StateSnapshot {
        let entries: Entries = pairs
            .iter()
            .map(|(id, value)| (EntityId::from(*id), value.clone()))
            .collect();
        StateSnapshot::observed_now(entries)
    }

    #[test]
    fn test_diff_classifies_all_partitions() {
        let previous = snapshot(&[
            ("A", Value::Count(1)),
            ("gone", Value::Count(4)),
            ("same", Value::Count(9)),
        ]);
        let current = snapshot(&[
            ("A", Value::Count(3)),
            ("B", Value::Count(5)),
            ("same", Value::Count(9)),
        ]);

        let changes = diff(&previous, &current);

        assert_eq!(changes.added, BTreeSet::from([EntityId::from("B")]));
        assert_eq!(changes.removed, BTreeSet::from([EntityId::from("gone")]));
        assert_eq!(changes.changed.len(), 1);
        assert_eq!(
            changes.changed.get("A"),
            Some(&Change {
                old: Value::Count(1),
                new: Value::Count(3),
            })
        );
        assert!(!changes.contains("same"));
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn test_diff_uses_structural_equality_for_labels() {
        let previous = snapshot(&[
            ("gwt-uid-1", Value::label("Pflegekräfte")),
            ("gwt-uid-2", Value::label("Lehrer")),
        ]);
        let current = snapshot(&[
            ("gwt-uid-1", Value::label("Pflegekräfte")),
            ("gwt-uid-2", Value::label("Lehrkräfte")),
        ]);

        let changes = diff(&previous, &current);

        assert!(changes.added.is_empty());
        assert!(changes.removed.is_empty());
        assert_eq!(changes.changed.len(), 1);
        assert_eq!(
            changes.changed["gwt-uid-2"].new,
            Value::label("Lehrkräfte")
        );
    }

    #[test]
    fn test_diff_against_empty_previous() {
        let current = snapshot(&[("A", Value::Count(0)), ("B", Value::Count(2))]);

        let changes = diff(&StateSnapshot::empty(), &current);

        assert_eq!(changes.added.len(), 2);
        assert!(changes.removed.is_empty());
        assert!(changes.changed.is_empty());
    }

    #[test]
    fn test_diff_ignores_timestamps() {
        let previous = snapshot(&[("A", Value::Count(1))]);
        let current = StateSnapshot::new(previous.entries().clone(), chrono::Utc::now());

        assert!(diff(&previous, &current).is_empty());
    }

    #[test]
    fn test_kind_change_counts_as_changed() {
        let previous = snapshot(&[("A", Value::Count(1))]);
        let current = snapshot(&[("A", Value::label("1"))]);

        let changes = diff(&previous, &current);
        assert!(changes.changed.contains_key("A"));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::state::Entries;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    /// Snapshot drawn from a small id space so that overlaps are frequent
    #[derive(Debug, Clone)]
    struct ArbitrarySnapshot(StateSnapshot);

    impl Arbitrary for ArbitrarySnapshot {
        fn arbitrary(g: &mut Gen) -> Self {
            let ids = ["A", "B", "C", "D", "E", "F", "G", "H"];
            let labels = ["Pflege", "Lehrer", "Polizei"];
            let mut entries = Entries::new();

            for id in ids {
                if bool::arbitrary(g) {
                    let value = if u8::arbitrary(g) % 4 == 0 {
                        Value::label(*g.choose(&labels).unwrap())
                    } else {
                        Value::Count(u64::from(u8::arbitrary(g) % 6))
                    };
                    entries.insert(EntityId::from(id), value);
                }
            }

            Self(StateSnapshot::observed_now(entries))
        }
    }

    // Every id of either snapshot is in exactly one partition, or unchanged.
    #[quickcheck]
    fn prop_diff_is_exhaustive(previous: ArbitrarySnapshot, current: ArbitrarySnapshot) -> bool {
        let (previous, current) = (previous.0, current.0);
        let changes = diff(&previous, &current);

        let all_ids: BTreeSet<&EntityId> = previous
            .entries()
            .keys()
            .chain(current.entries().keys())
            .collect();

        let exhaustive = all_ids.into_iter().all(|id| {
            let memberships = [
                changes.added.contains(id),
                changes.removed.contains(id),
                changes.changed.contains_key(id),
            ]
            .iter()
            .filter(|member| **member)
            .count();

            let unchanged = previous.get(id.as_str()).is_some()
                && previous.get(id.as_str()) == current.get(id.as_str());

            match memberships {
                0 => unchanged,
                1 => !unchanged,
                _ => false,
            }
        });
        exhaustive
    }

    #[quickcheck]
    fn prop_diff_is_symmetric(a: ArbitrarySnapshot, b: ArbitrarySnapshot) -> bool {
        let forward = diff(&a.0, &b.0);
        let backward = diff(&b.0, &a.0);

        let changed_mirrors = forward.changed.iter().all(|(id, change)| {
            backward
                .changed
                .get(id)
                .map(|reverse| reverse.old == change.new && reverse.new == change.old)
                .unwrap_or(false)
        });

        forward.added == backward.removed
            && forward.removed == backward.added
            && forward.changed.len() == backward.changed.len()
            && changed_mirrors
    }

    #[quickcheck]
    fn prop_diff_with_itself_is_empty(a: ArbitrarySnapshot) -> bool {
        diff(&a.0, &a.0).is_empty()
    }
}
