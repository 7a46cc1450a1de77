//! Bookkeeping for currently open client connections.

use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio_util::sync::CancellationToken;

/// All currently open client connections, keyed by a monotonically
/// increasing id that is never reused within one server instance.
///
/// Inserts happen on the accept path, removals when a connection closes
/// (either peer) or is severed during shutdown; both may race, so every
/// operation takes the registry lock and [`ConnectionRegistry::sever_all`]
/// holds it for the whole destroy sweep.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, CancellationToken>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self) -> MutexGuard<'_, HashMap<u64, CancellationToken>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Assign the next unused id and track the connection's cancellation
    /// handle under it.
    pub fn register(&self, token: CancellationToken) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live().insert(id, token);
        id
    }

    /// Remove a connection. Silently a no-op when the id is already gone:
    /// a natural close may race the forced sweep during shutdown.
    pub fn unregister(&self, id: u64) {
        self.live().remove(&id);
    }

    /// Apply `action` to every live connection, in unspecified order. The
    /// lock is held across the whole pass.
    pub fn for_each(&self, mut action: impl FnMut(u64, &CancellationToken)) {
        for (id, token) in self.live().iter() {
            action(*id, token);
        }
    }

    /// Cancel every live connection and clear the registry in one lock
    /// hold, so no close notification can interleave with the sweep.
    /// Returns how many connections were severed.
    pub fn sever_all(&self) -> usize {
        let mut live = self.live();
        for token in live.values() {
            token.cancel();
        }
        let severed = live.len();
        live.clear();
        severed
    }

    /// Number of live connections.
    pub fn count(&self) -> usize {
        self.live().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_unique() {
        let registry = ConnectionRegistry::new();
        let a = registry.register(CancellationToken::new());
        let b = registry.register(CancellationToken::new());
        registry.unregister(a);
        let c = registry.register(CancellationToken::new());
        assert!(a < b && b < c, "ids must never be reused");
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn unregister_absent_id_is_a_noop() {
        let registry = ConnectionRegistry::new();
        registry.unregister(42);
        let id = registry.register(CancellationToken::new());
        registry.unregister(id);
        registry.unregister(id);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn sever_all_cancels_and_empties() {
        let registry = ConnectionRegistry::new();
        let tokens: Vec<_> = (0..3).map(|_| CancellationToken::new()).collect();
        for token in &tokens {
            registry.register(token.clone());
        }

        assert_eq!(registry.sever_all(), 3);
        assert_eq!(registry.count(), 0);
        assert!(tokens.iter().all(|t| t.is_cancelled()));
    }

    #[test]
    fn for_each_visits_every_entry() {
        let registry = ConnectionRegistry::new();
        for _ in 0..4 {
            registry.register(CancellationToken::new());
        }
        let mut seen = Vec::new();
        registry.for_each(|id, _| seen.push(id));
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }
}
