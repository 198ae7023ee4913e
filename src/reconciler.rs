//! Classifies a freshly fetched round list against the previous table.

use std::collections::HashSet;

use crate::types::{RoundId, RoundState, RoundTable};

/// Result of reconciling one fetch.
#[derive(Debug, Default, Clone)]
pub struct Reconciliation {
    /// Table built from the fetched list.
    pub table: RoundTable,
    /// Rounds that appeared, changed value, or disappeared.
    pub changed: HashSet<RoundId>,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

impl Reconciliation {
    pub fn is_unchanged(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Build the next table from `fetched` and collect the ids whose state moved.
///
/// Value-equal snapshots are left out of `changed`. If the coordinator sends
/// the same id twice the last entry wins.
pub fn reconcile(previous: &RoundTable, fetched: Vec<RoundState>) -> Reconciliation {
    let mut out = Reconciliation::default();
    out.table.reserve(fetched.len());

    for state in fetched {
        out.table.insert(state.id, state);
    }

    for (id, state) in &out.table {
        match previous.get(id) {
            None => {
                out.added += 1;
                out.changed.insert(*id);
            }
            Some(prev) if prev != state => {
                out.updated += 1;
                out.changed.insert(*id);
            }
            Some(_) => {}
        }
    }

    for id in previous.keys() {
        if !out.table.contains_key(id) {
            out.removed += 1;
            out.changed.insert(*id);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Phase;

    fn round(id: u8, phase: Phase) -> RoundState {
        let mut bytes = [0u8; 32];
        bytes[0] = id;
        RoundState::new(RoundId::new(bytes), phase)
    }

    fn table(states: &[RoundState]) -> RoundTable {
        states.iter().map(|s| (s.id, s.clone())).collect()
    }

    #[test]
    fn test_reconcile_from_empty() {
        let a = round(1, Phase::InputRegistration);
        let b = round(2, Phase::OutputRegistration);

        let result = reconcile(&RoundTable::new(), vec![a.clone(), b.clone()]);

        assert_eq!(result.table.len(), 2);
        assert_eq!(result.added, 2);
        assert!(result.changed.contains(&a.id));
        assert!(result.changed.contains(&b.id));
    }

    #[test]
    fn test_reconcile_classifies_changes() {
        let a = round(1, Phase::InputRegistration);
        let b = round(2, Phase::InputRegistration);
        let c = round(3, Phase::InputRegistration);
        let previous = table(&[a.clone(), b.clone(), c.clone()]);

        let b2 = RoundState {
            phase: Phase::ConnectionConfirmation,
            ..b.clone()
        };
        let d = round(4, Phase::InputRegistration);

        // a unchanged, b updated, c removed, d added
        let result = reconcile(&previous, vec![a.clone(), b2.clone(), d.clone()]);

        assert_eq!(result.added, 1);
        assert_eq!(result.updated, 1);
        assert_eq!(result.removed, 1);

        let expected: HashSet<RoundId> = [b.id, c.id, d.id].into_iter().collect();
        assert_eq!(result.changed, expected);

        let keys: HashSet<RoundId> = result.table.keys().copied().collect();
        let fetched: HashSet<RoundId> = [a.id, b.id, d.id].into_iter().collect();
        assert_eq!(keys, fetched);
        assert_eq!(result.table[&b.id], b2);
    }

    #[test]
    fn test_reconcile_identical_fetch_is_unchanged() {
        let a = round(1, Phase::OutputRegistration);
        let previous = table(&[a.clone()]);

        let result = reconcile(&previous, vec![a]);

        assert!(result.is_unchanged());
        assert_eq!(result.table.len(), 1);
    }

    #[test]
    fn test_reconcile_empty_fetch_removes_all() {
        let previous = table(&[round(1, Phase::Ended), round(2, Phase::Ended)]);

        let result = reconcile(&previous, Vec::new());

        assert!(result.table.is_empty());
        assert_eq!(result.removed, 2);
        assert_eq!(result.changed.len(), 2);
    }

    #[test]
    fn test_reconcile_duplicate_ids_last_wins() {
        let a = round(1, Phase::InputRegistration);
        let a2 = RoundState {
            phase: Phase::Ended,
            ..a.clone()
        };

        let result = reconcile(&RoundTable::new(), vec![a, a2.clone()]);

        assert_eq!(result.table.len(), 1);
        assert_eq!(result.table[&a2.id], a2);
    }
}
