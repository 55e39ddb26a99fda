//! Single-flight interlock.
//!
//! The first caller for a key becomes the leader and gets a non-zero
//! [`Ticket`]; everyone arriving while that ticket is registered polls until
//! it disappears and then comes back as a follower. Release only succeeds
//! with the exact ticket that was registered, so a stale or duplicate release
//! can never clear a newer leader's claim.

use std::fmt;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use tracing::{debug, trace};

use tricorder_core::constants::{MAX_YIELD_MICROS, MIN_YIELD_MICROS};

/// Owner token for an interlock round.
///
/// Leaders hold a random non-zero value; [`Ticket::FOLLOWER`] (zero) marks a
/// caller that waited for someone else.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

impl Ticket {
    /// Returned to callers that waited for another leader.
    pub const FOLLOWER: Ticket = Ticket(0);

    fn generate() -> Self {
        loop {
            let value: u64 = rand::random();
            if value != 0 {
                return Ticket(value);
            }
        }
    }

    /// Returns true if this caller owns the round.
    pub fn is_leader(&self) -> bool {
        self.0 != 0
    }

    /// Raw token value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_leader() {
            write!(f, "Ticket({:#018x})", self.0)
        } else {
            f.write_str("Ticket(FOLLOWER)")
        }
    }
}

/// Per-key single-flight coordinator.
#[derive(Debug)]
pub struct Interlock {
    tickets: DashMap<String, Ticket>,
    min_yield: Duration,
    max_yield: Duration,
}

impl Interlock {
    /// Creates an interlock with the default 100–200 µs poll window.
    pub fn new() -> Self {
        Self::with_yield(
            Duration::from_micros(MIN_YIELD_MICROS),
            Duration::from_micros(MAX_YIELD_MICROS),
        )
    }

    /// Creates an interlock with a custom poll window.
    ///
    /// The bounds are swapped if given in the wrong order.
    pub fn with_yield(min_yield: Duration, max_yield: Duration) -> Self {
        let (min_yield, max_yield) = if min_yield <= max_yield {
            (min_yield, max_yield)
        } else {
            (max_yield, min_yield)
        };

        Self {
            tickets: DashMap::new(),
            min_yield,
            max_yield,
        }
    }

    /// Becomes the leader for `key`, or waits for the current one to finish.
    ///
    /// Returns a leader ticket if no round was active, otherwise suspends,
    /// rechecking after a random pause within the poll window, until the
    /// round is released and returns [`Ticket::FOLLOWER`]. There is no
    /// timeout: a leader that never releases keeps its followers waiting.
    pub async fn wait_or_start(&self, key: &str) -> Ticket {
        let ticket = Ticket::generate();

        let current = match self.tickets.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(ticket);
                None
            }
            Entry::Occupied(occupied) => Some(*occupied.get()),
        };

        let Some(current) = current else {
            debug!(key, ?ticket, "Interlock won");
            return ticket;
        };

        debug!(key, ?ticket, ?current, "Interlock held, waiting");

        let mut polls: u64 = 0;
        while self.tickets.contains_key(key) {
            let pause = self.next_pause();
            trace!(key, ?pause, "Interlock yielding");
            tokio::time::sleep(pause).await;
            polls += 1;
        }

        debug!(key, polls, "Interlock released");
        Ticket::FOLLOWER
    }

    /// Like [`wait_or_start`](Self::wait_or_start), but returns a guard that
    /// releases a leader ticket when dropped.
    pub async fn acquire(&self, key: &str) -> InterlockGuard<'_> {
        let ticket = self.wait_or_start(key).await;
        InterlockGuard {
            interlock: self,
            key: key.to_string(),
            ticket,
        }
    }

    /// Releases `key` if `ticket` is the registered owner.
    ///
    /// Anything else (a follower ticket, a stale ticket, an unknown key) is
    /// ignored. Returns true if the round was released.
    pub fn clear_wait(&self, key: &str, ticket: Ticket) -> bool {
        let cleared = self
            .tickets
            .remove_if(key, |_, current| *current == ticket)
            .is_some();

        if cleared {
            debug!(key, ?ticket, "Interlock cleared");
        } else {
            trace!(key, ?ticket, "Interlock clear ignored");
        }
        cleared
    }

    /// Returns true if a leader is active for `key`.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.tickets.contains_key(key)
    }

    /// Number of keys with an active leader.
    pub fn in_flight(&self) -> usize {
        self.tickets.len()
    }

    fn next_pause(&self) -> Duration {
        if self.min_yield == self.max_yield {
            return self.min_yield;
        }
        rand::thread_rng().gen_range(self.min_yield..=self.max_yield)
    }
}

impl Default for Interlock {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped interlock round.
///
/// Dropping the guard of a leader releases the round, on normal return, on
/// error, and when the owning future is cancelled.
#[must_use = "dropping the guard immediately releases the interlock"]
pub struct InterlockGuard<'a> {
    interlock: &'a Interlock,
    key: String,
    ticket: Ticket,
}

impl InterlockGuard<'_> {
    /// Ticket obtained for this round.
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    /// Returns true if this caller leads the round.
    pub fn is_leader(&self) -> bool {
        self.ticket.is_leader()
    }

    /// Key this guard was acquired for.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for InterlockGuard<'_> {
    fn drop(&mut self) {
        if self.ticket.is_leader() {
            self.interlock.clear_wait(&self.key, self.ticket);
        }
    }
}

impl fmt::Debug for InterlockGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterlockGuard")
            .field("key", &self.key)
            .field("ticket", &self.ticket)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_first_caller_leads() {
        let interlock = Interlock::new();

        let ticket = interlock.wait_or_start("sigA").await;

        assert!(ticket.is_leader());
        assert_ne!(ticket, Ticket::FOLLOWER);
        assert!(interlock.is_in_flight("sigA"));
        assert_eq!(interlock.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let interlock = Interlock::new();

        let a = interlock.wait_or_start("sigA").await;
        let b = timeout(Duration::from_millis(50), interlock.wait_or_start("sigB"))
            .await
            .expect("different key must not wait");

        assert!(a.is_leader());
        assert!(b.is_leader());
        assert_eq!(interlock.in_flight(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_followers_wait_for_release() {
        let interlock = Arc::new(Interlock::new());
        let leader = interlock.wait_or_start("sigA").await;

        let followers: Vec<_> = (0..16)
            .map(|_| {
                let interlock = interlock.clone();
                tokio::spawn(async move { interlock.wait_or_start("sigA").await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(followers.iter().all(|f| !f.is_finished()));
        assert_eq!(interlock.in_flight(), 1);

        assert!(interlock.clear_wait("sigA", leader));

        for follower in followers {
            let ticket = timeout(Duration::from_secs(5), follower)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(ticket, Ticket::FOLLOWER);
        }
        assert!(!interlock.is_in_flight("sigA"));
    }

    #[tokio::test]
    async fn test_mismatched_clear_is_noop() {
        let interlock = Arc::new(Interlock::new());
        let leader = interlock.wait_or_start("sigA").await;
        let stale = Ticket(leader.value().wrapping_add(1).max(1));

        assert!(!interlock.clear_wait("sigA", stale));
        assert!(!interlock.clear_wait("sigA", Ticket::FOLLOWER));
        assert!(!interlock.clear_wait("unknown", leader));
        assert!(interlock.is_in_flight("sigA"));

        // A waiting follower stays blocked
        let follower = {
            let interlock = interlock.clone();
            tokio::spawn(async move { interlock.wait_or_start("sigA").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!follower.is_finished());

        assert!(interlock.clear_wait("sigA", leader));
        assert_eq!(follower.await.unwrap(), Ticket::FOLLOWER);
    }

    #[tokio::test]
    async fn test_double_clear_does_not_release_next_leader() {
        let interlock = Interlock::new();

        let first = interlock.wait_or_start("sigA").await;
        assert!(interlock.clear_wait("sigA", first));

        let second = interlock.wait_or_start("sigA").await;
        assert!(second.is_leader());

        // Duplicate release of the first round
        assert!(!interlock.clear_wait("sigA", first));
        assert!(interlock.is_in_flight("sigA"));
    }

    #[tokio::test]
    async fn test_leadership_handoff_is_immediate() {
        let interlock = Interlock::new();

        let first = interlock.wait_or_start("sigA").await;
        interlock.clear_wait("sigA", first);

        let next = timeout(Duration::from_millis(50), interlock.wait_or_start("sigA"))
            .await
            .expect("released key must not block");
        assert!(next.is_leader());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_at_most_one_leader_at_a_time() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let interlock = Arc::new(Interlock::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let interlock = interlock.clone();
                let active = active.clone();
                let max_active = max_active.clone();
                tokio::spawn(async move {
                    let guard = interlock.acquire("sigA").await;
                    if guard.is_leader() {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max_active.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                    }
                    guard.is_leader()
                })
            })
            .collect();

        let mut leaders = 0;
        for handle in handles {
            if handle.await.unwrap() {
                leaders += 1;
            }
        }

        assert!(leaders >= 1);
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert!(!interlock.is_in_flight("sigA"));
    }

    #[tokio::test]
    async fn test_guard_releases_on_drop() {
        let interlock = Interlock::new();

        {
            let guard = interlock.acquire("sigA").await;
            assert!(guard.is_leader());
            assert_eq!(guard.key(), "sigA");
            assert!(interlock.is_in_flight("sigA"));
        }

        assert!(!interlock.is_in_flight("sigA"));
    }

    #[tokio::test]
    async fn test_guard_releases_when_cancelled() {
        let interlock = Arc::new(Interlock::new());

        let task = {
            let interlock = interlock.clone();
            tokio::spawn(async move {
                let _guard = interlock.acquire("sigA").await;
                std::future::pending::<()>().await;
            })
        };

        while !interlock.is_in_flight("sigA") {
            tokio::task::yield_now().await;
        }
        task.abort();
        let _ = task.await;

        assert!(!interlock.is_in_flight("sigA"));
    }

    #[test]
    fn test_with_yield_orders_bounds() {
        let interlock = Interlock::with_yield(Duration::from_millis(5), Duration::from_millis(1));
        for _ in 0..100 {
            let pause = interlock.next_pause();
            assert!(pause >= Duration::from_millis(1) && pause <= Duration::from_millis(5));
        }
    }

    #[test]
    fn test_generated_tickets_lead() {
        for _ in 0..1000 {
            assert!(Ticket::generate().is_leader());
        }
    }
}
