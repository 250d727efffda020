use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Latest-filter-wins guard for callers that re-query on filter changes.
///
/// Every new filter takes a [`RequestTicket`]. When a response arrives, the
/// caller applies it only if its ticket is still the newest one; anything
/// older is stale and gets dropped. Queries are never cancelled.
#[derive(Debug, Clone, Default)]
pub struct LatestRequest {
    generation: Arc<AtomicU64>,
}

impl LatestRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding every earlier ticket.
    pub fn begin(&self) -> RequestTicket {
        let id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        RequestTicket {
            id,
            generation: Arc::clone(&self.generation),
        }
    }

    /// Id of the newest ticket handed out, 0 before the first.
    pub fn current(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct RequestTicket {
    id: u64,
    generation: Arc<AtomicU64>,
}

impl RequestTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.id
    }

    /// Pass the response through if this ticket is still current.
    pub fn accept<T>(&self, response: T) -> Option<T> {
        if self.is_current() {
            Some(response)
        } else {
            log::debug!(
                "discarding stale response for request {} (latest is {})",
                self.id,
                self.generation.load(Ordering::SeqCst)
            );
            None
        }
    }
}
