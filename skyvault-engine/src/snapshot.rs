use std::sync::{Arc, RwLock};

use skyvault_core::{Ticket, TicketId};

#[derive(Debug)]
struct Snapshot {
    generation: u64,
    tickets: Arc<[Ticket]>,
}

/// Read replica of the live tickets for reporting and UI collaborators.
///
/// Only the lifecycle engine refreshes it, right after each commit and before
/// the operation returns. Readers get an immutable `Arc` and never trigger a
/// reload themselves.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    inner: Arc<RwLock<Snapshot>>,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Snapshot {
                generation: 0,
                tickets: Arc::from(Vec::new()),
            })),
        }
    }

    pub fn snapshot(&self) -> Arc<[Ticket]> {
        let guard = self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard.tickets)
    }

    /// Bumped on every refresh; lets readers tell whether anything changed.
    pub fn generation(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .generation
    }

    pub fn find(&self, id: TicketId) -> Option<Ticket> {
        self.snapshot().iter().find(|t| t.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn replace(&self, tickets: Vec<Ticket>) {
        let mut guard = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.generation += 1;
        guard.tickets = Arc::from(tickets);
    }
}
