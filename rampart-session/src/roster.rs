//! Grace-window bookkeeping and presence reconciliation planning.
//!
//! Admission and presence propagation race: a just-admitted participant is
//! in the roster before their presence record is visible, so the next
//! reconciliation pass would otherwise evict them immediately. A grace
//! entry exempts them from eviction until either their presence appears or
//! a fixed TTL elapses.
//!
//! Both pieces take an explicit `now` so the TTL behavior is provable in
//! tests without sleeping.

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use uuid::Uuid;

/// TTL-bounded eviction exemptions for freshly admitted participants.
#[derive(Debug)]
pub struct GraceTable {
    entries: HashMap<Uuid, Instant>,
    ttl: Duration,
}

impl GraceTable {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: HashMap::new(), ttl }
    }

    /// Record an admission at `now`.
    pub fn insert(&mut self, id: Uuid, now: Instant) {
        self.entries.insert(id, now);
    }

    /// Remove a participant's entry (their presence was observed).
    pub fn clear(&mut self, id: Uuid) {
        self.entries.remove(&id);
    }

    /// Drop entries older than the TTL, returning the expired ids.
    pub fn purge_expired(&mut self, now: Instant) -> Vec<Uuid> {
        let ttl = self.ttl;
        let expired: Vec<Uuid> = self
            .entries
            .iter()
            .filter(|(_, accepted)| now.duration_since(**accepted) > ttl)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            self.entries.remove(id);
        }
        expired
    }

    /// Whether a participant is inside its grace window at `now`.
    pub fn in_grace(&self, id: Uuid, now: Instant) -> bool {
        self.entries
            .get(&id)
            .is_some_and(|accepted| now.duration_since(*accepted) <= self.ttl)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reconciliation decisions for one presence sync.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Roster participants absent from the view and outside grace: mark
    /// disconnected, release resources, remove.
    pub evict: Vec<Uuid>,
    /// Roster participants visible in the view: clear grace, mark
    /// connected.
    pub reconnect: Vec<Uuid>,
}

/// Plan the host-side reconciliation of the roster against the visible
/// membership. Absence past the grace window is the sole disconnect signal;
/// no leave message is required or trusted.
pub fn plan_reconciliation(
    roster: &[Uuid],
    visible: &BTreeSet<Uuid>,
    grace: &GraceTable,
    now: Instant,
) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();
    for &id in roster {
        if visible.contains(&id) {
            plan.reconnect.push(id);
        } else if !grace.in_grace(id, now) {
            plan.evict.push(id);
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(10);

    #[test]
    fn test_grace_prevents_eviction_within_ttl() {
        let start = Instant::now();
        let mut grace = GraceTable::new(TTL);
        let id = Uuid::new_v4();
        grace.insert(id, start);

        let visible = BTreeSet::new();
        let plan = plan_reconciliation(&[id], &visible, &grace, start + Duration::from_secs(9));
        assert!(plan.evict.is_empty());
    }

    #[test]
    fn test_grace_expires_after_ttl_even_without_reconnection() {
        let start = Instant::now();
        let mut grace = GraceTable::new(TTL);
        let id = Uuid::new_v4();
        grace.insert(id, start);

        let later = start + Duration::from_secs(11);
        let expired = grace.purge_expired(later);
        assert_eq!(expired, vec![id]);
        assert!(grace.is_empty());

        let plan = plan_reconciliation(&[id], &BTreeSet::new(), &grace, later);
        assert_eq!(plan.evict, vec![id]);
    }

    #[test]
    fn test_purge_keeps_fresh_entries() {
        let start = Instant::now();
        let mut grace = GraceTable::new(TTL);
        let old = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        grace.insert(old, start);
        grace.insert(fresh, start + Duration::from_secs(8));

        let expired = grace.purge_expired(start + Duration::from_secs(11));
        assert_eq!(expired, vec![old]);
        assert_eq!(grace.len(), 1);
        assert!(grace.in_grace(fresh, start + Duration::from_secs(11)));
    }

    #[test]
    fn test_visible_participant_is_reconnected_not_evicted() {
        let now = Instant::now();
        let grace = GraceTable::new(TTL);
        let id = Uuid::new_v4();
        let visible: BTreeSet<Uuid> = [id].into_iter().collect();

        let plan = plan_reconciliation(&[id], &visible, &grace, now);
        assert_eq!(plan.reconnect, vec![id]);
        assert!(plan.evict.is_empty());
    }

    #[test]
    fn test_absent_without_grace_is_evicted() {
        let now = Instant::now();
        let grace = GraceTable::new(TTL);
        let id = Uuid::new_v4();

        let plan = plan_reconciliation(&[id], &BTreeSet::new(), &grace, now);
        assert_eq!(plan.evict, vec![id]);
    }

    #[test]
    fn test_clear_removes_entry() {
        let now = Instant::now();
        let mut grace = GraceTable::new(TTL);
        let id = Uuid::new_v4();
        grace.insert(id, now);
        grace.clear(id);
        assert!(!grace.in_grace(id, now));
    }
}
