//! Tracks in-flight kernel request IDs for the duration of their dispatch, so a request that
//! gets interrupted mid-flight can be logged rather than silently racing its own reply, and
//! so a redelivered request ID (OSXFUSE resends the same unique ID for a request it believes
//! timed out, while the original dispatch is still running) is recognized instead of treated
//! as a second, independent request.

use std::collections::HashSet;

use parking_lot::Mutex;

#[derive(Default)]
pub struct RequestRegistry {
    in_flight: Mutex<HashSet<u64>>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `unique` as dispatched. Returns `false` if it was already in flight, meaning
    /// this is a redelivery of a request whose original dispatch hasn't replied yet; the
    /// caller should skip spawning a second worker for it rather than double-replying.
    pub fn begin(&self, unique: u64) -> bool {
        self.in_flight.lock().insert(unique)
    }

    /// Marks `unique` as no longer in flight, once its reply has been sent.
    pub fn end(&self, unique: u64) {
        self.in_flight.lock().remove(&unique);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redelivered_unique_id_is_rejected_until_the_first_completes() {
        let registry = RequestRegistry::new();
        assert!(registry.begin(42));
        assert!(!registry.begin(42), "redelivery while still in flight must be detected");
        registry.end(42);
        assert!(registry.begin(42), "once ended, the id can be dispatched again");
    }
}
