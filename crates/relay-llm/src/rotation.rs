//! Per-route rotation cursors
//!
//! A cursor is keyed by `(route, scope)` so one route can rotate several
//! independent rings: its provider ring, a per-provider model ring, or a
//! node's model ring. Cursors live in process memory only; losing them on
//! restart just restarts the rotation.

use dashmap::DashMap;
use relay_catalog::{ProviderId, RouteId};

/// Which ring a cursor belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorScope {
    /// The route's eligible-provider ring (auto/all)
    Providers,
    /// A specific provider's model ring (auto modes)
    Provider(ProviderId),
    /// A node's model ring, keyed by the node's position in the route
    Node(usize),
}

/// All rotation cursors, with per-key critical sections
#[derive(Default)]
pub struct RotationState {
    cursors: DashMap<(RouteId, CursorScope), usize>,
}

impl RotationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current pick for the ring and advance the cursor by one
    ///
    /// The stored cursor wraps modulo `ring_len` at selection time, so a
    /// ring that shrank since the last call simply re-wraps; skipping an
    /// element in that case is acceptable. The map entry guard makes the
    /// read-modify-write atomic per key without any global lock.
    pub fn advance(&self, route: RouteId, scope: CursorScope, ring_len: usize) -> usize {
        debug_assert!(ring_len > 0, "rings are non-empty by construction");
        if ring_len == 0 {
            return 0;
        }

        let mut cursor = self.cursors.entry((route, scope)).or_insert(0);
        let picked = *cursor % ring_len;
        *cursor = (picked + 1) % ring_len;
        picked
    }

    /// Drop every cursor belonging to a deleted route
    pub fn forget_route(&self, route: RouteId) {
        self.cursors.retain(|(r, _), _| *r != route);
    }
}
