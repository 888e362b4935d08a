//! Host election over the eventually-consistent membership view.
//!
//! The host is never negotiated: every peer derives it independently as the
//! non-spectator presence record with the minimum `(joined_at,
//! participant_id)` key. Identical views therefore always elect the same
//! host, and re-election after an outage reproduces the original ordering
//! because `joined_at` survives reconnects.
//!
//! The participant id is the explicit tie-breaker for identical `joined_at`
//! values — deterministic, no reliance on sort stability.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::protocol::PresenceRecord;

/// An edge-triggered host change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTransition {
    /// The newly computed host, `None` when the view is empty.
    pub host_id: Option<Uuid>,
    /// Whether the local participant is the new host.
    pub is_self: bool,
}

/// Derives the current host from the latest membership view.
///
/// The view is replaced wholesale on every presence sync; it is never
/// patched incrementally.
pub struct HostElection {
    local_id: Uuid,
    view: Vec<PresenceRecord>,
    host_id: Option<Uuid>,
}

impl HostElection {
    pub fn new(local_id: Uuid) -> Self {
        Self {
            local_id,
            view: Vec::new(),
            host_id: None,
        }
    }

    /// Pure election over a membership view.
    pub fn elect(view: &[PresenceRecord]) -> Option<Uuid> {
        view.iter()
            .filter(|r| !r.is_spectator)
            .min_by_key(|r| (r.joined_at, r.participant_id))
            .map(|r| r.participant_id)
    }

    /// Replace the view and recompute the host.
    ///
    /// Returns a [`HostTransition`] only when the computed host differs from
    /// the previous computation — never twice for the same `(old, new)` pair
    /// without an intervening view change.
    pub fn update_view(&mut self, view: Vec<PresenceRecord>) -> Option<HostTransition> {
        self.view = view;
        let new_host = Self::elect(&self.view);
        if new_host == self.host_id {
            return None;
        }
        log::debug!("host changed: {:?} -> {:?}", self.host_id, new_host);
        self.host_id = new_host;
        Some(HostTransition {
            host_id: new_host,
            is_self: new_host == Some(self.local_id),
        })
    }

    pub fn host_id(&self) -> Option<Uuid> {
        self.host_id
    }

    pub fn is_host(&self) -> bool {
        self.host_id == Some(self.local_id)
    }

    /// Distinct participant ids in the current view. A participant with
    /// multiple live connections appears once.
    pub fn participant_ids(&self) -> BTreeSet<Uuid> {
        self.view.iter().map(|r| r.participant_id).collect()
    }

    /// Whether a participant is visible in the current view.
    pub fn is_visible(&self, id: Uuid) -> bool {
        self.view.iter().any(|r| r.participant_id == id)
    }

    pub fn view(&self) -> &[PresenceRecord] {
        &self.view
    }
}
