//! Expiring key-value store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error};

use super::StoreEvent;

/// Event channel capacity. Slow subscribers observe lag, never block the sweep.
const EVENT_CAPACITY: usize = 64;

/// Sweep period is TTL divided by this, floored at [`MIN_SWEEP_PERIOD`].
const SWEEP_DIVISOR: u32 = 10;

/// Practical floor for the sweep period.
const MIN_SWEEP_PERIOD: Duration = Duration::from_secs(1);

/// Insertion-ordered key-value map with optional per-entry TTL.
///
/// Re-setting a key overwrites its value and resets its expiry clock.
/// An entry whose deadline has passed is logically absent from every read
/// operation even before the sweep physically removes it.
///
/// Must be created within a Tokio runtime when a TTL is configured: the
/// sweep runs as a spawned task. The task holds only a weak reference and
/// is aborted when the store is dropped.
pub struct ExpiringStore {
    shared: Arc<Shared>,
    sweeper: Option<JoinHandle<()>>,
}

struct Shared {
    state: RwLock<State>,
    ttl: Option<Duration>,
    events: broadcast::Sender<StoreEvent>,
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    order: Vec<String>,
}

struct Entry {
    value: String,
    deadline: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }
}

impl ExpiringStore {
    /// Create a store.
    ///
    /// `ttl` of `None` (or zero) means entries never expire and no sweep
    /// task is spawned.
    pub fn new(ttl: Option<Duration>) -> Self {
        let ttl = ttl.filter(|t| !t.is_zero());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let shared = Arc::new(Shared {
            state: RwLock::new(State::default()),
            ttl,
            events,
        });

        let sweeper = ttl.map(|ttl| spawn_sweeper(&shared, ttl));

        Self { shared, sweeper }
    }

    /// Create a store whose entries never expire.
    pub fn never_expiring() -> Self {
        Self::new(None)
    }

    /// Insert or overwrite an entry, resetting its expiry clock.
    ///
    /// Overwriting a live entry keeps its insertion position; overwriting a
    /// logically expired one counts as a fresh insert at the end.
    pub fn set(&self, key: &str, value: &str) {
        let deadline = self.shared.ttl.map(|ttl| Instant::now() + ttl);
        let mut state = self.shared.state.write().unwrap();

        let stale = state
            .entries
            .get(key)
            .is_some_and(|e| e.is_expired(Instant::now()));
        if stale {
            state.entries.remove(key);
            state.order.retain(|k| k != key);
        }

        if let Some(entry) = state.entries.get_mut(key) {
            entry.value = value.to_string();
            entry.deadline = deadline;
        } else {
            state.order.push(key.to_string());
            state.entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    deadline,
                },
            );
        }
    }

    /// True iff the key is present and not expired.
    pub fn contains(&self, key: &str) -> bool {
        let state = self.shared.state.read().unwrap();
        state
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(Instant::now()))
    }

    /// The value for a key, if present and not expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let state = self.shared.state.read().unwrap();
        state
            .entries
            .get(key)
            .filter(|e| !e.is_expired(Instant::now()))
            .map(|e| e.value.clone())
    }

    /// Remove an entry. Idempotent.
    ///
    /// Returns true iff the entry was present and not already logically
    /// expired. A logically expired record is left in place for the sweep:
    /// its removal must still emit the `Expired` notification, which is
    /// what drives cleanup of the expired entry's downstream state.
    pub fn remove(&self, key: &str) -> bool {
        let mut state = self.shared.state.write().unwrap();

        let live = state
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(Instant::now()));
        if !live {
            return false;
        }

        state.entries.remove(key);
        state.order.retain(|k| k != key);
        true
    }

    /// Snapshot of (key, value) pairs in insertion order, excluding
    /// logically expired entries.
    pub fn entries(&self) -> Vec<(String, String)> {
        let state = self.shared.state.read().unwrap();
        let now = Instant::now();

        state
            .order
            .iter()
            .filter_map(|key| {
                state
                    .entries
                    .get(key)
                    .filter(|e| !e.is_expired(now))
                    .map(|e| (key.clone(), e.value.clone()))
            })
            .collect()
    }

    /// Remove all entries.
    pub fn clear(&self) {
        let mut state = self.shared.state.write().unwrap();
        state.entries.clear();
        state.order.clear();
    }

    /// Number of live (non-expired) entries.
    pub fn len(&self) -> usize {
        let state = self.shared.state.read().unwrap();
        let now = Instant::now();
        state
            .entries
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    /// True iff there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribe to sweep notifications.
    ///
    /// Events are delivered on a channel, so a handler may freely call back
    /// into the store without deadlocking.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.shared.events.subscribe()
    }
}

impl Drop for ExpiringStore {
    fn drop(&mut self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.abort();
        }
    }
}

fn spawn_sweeper(shared: &Arc<Shared>, ttl: Duration) -> JoinHandle<()> {
    let weak = Arc::downgrade(shared);
    let period = (ttl / SWEEP_DIVISOR).max(MIN_SWEEP_PERIOD);

    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match weak.upgrade() {
                Some(shared) => shared.sweep(),
                None => break,
            }
        }
    })
}

impl Shared {
    /// Remove entries whose deadline has passed and emit one `Expired`
    /// notification per removed key.
    fn sweep(&self) {
        let expired = match self.state.write() {
            Ok(mut state) => {
                let now = Instant::now();
                let expired: Vec<String> = state
                    .order
                    .iter()
                    .filter(|key| {
                        state
                            .entries
                            .get(key.as_str())
                            .is_some_and(|e| e.is_expired(now))
                    })
                    .cloned()
                    .collect();

                for key in &expired {
                    state.entries.remove(key);
                }
                state.order.retain(|k| !expired.contains(k));
                expired
            }
            Err(err) => {
                // Lock poisoned by a panicking writer. Surface it and keep
                // the sweep alive.
                error!(error = %err, "expiry sweep failed");
                let _ = self
                    .events
                    .send(StoreEvent::Fault(format!("expiry sweep failed: {err}")));
                return;
            }
        };

        for key in expired {
            debug!(key = %key, "entry expired");
            let _ = self.events.send(StoreEvent::Expired { key });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = ExpiringStore::never_expiring();

        store.set("10.0.0.1", "DROP");
        assert!(store.contains("10.0.0.1"));
        assert_eq!(store.get("10.0.0.1").as_deref(), Some("DROP"));
        assert!(!store.contains("10.0.0.2"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_overwrite_keeps_position() {
        let store = ExpiringStore::never_expiring();

        store.set("a", "ACCEPT");
        store.set("b", "DROP");
        store.set("a", "REJECT");

        assert_eq!(
            store.entries(),
            vec![
                ("a".to_string(), "REJECT".to_string()),
                ("b".to_string(), "DROP".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = ExpiringStore::never_expiring();

        store.set("a", "ACCEPT");
        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_clear() {
        let store = ExpiringStore::never_expiring();

        store.set("a", "ACCEPT");
        store.set("b", "DROP");
        store.clear();

        assert!(store.is_empty());
        assert!(store.entries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_at_read_time() {
        let store = ExpiringStore::new(Some(Duration::from_secs(30)));

        store.set("10.0.0.1", "DROP");
        assert!(store.contains("10.0.0.1"));

        // Past the deadline the entry is logically absent even if the sweep
        // has not run yet.
        time::advance(Duration::from_secs(31)).await;
        assert!(!store.contains("10.0.0.1"));
        assert!(store.get("10.0.0.1").is_none());
        assert!(store.entries().is_empty());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_resets_expiry() {
        let store = ExpiringStore::new(Some(Duration::from_secs(30)));

        store.set("10.0.0.1", "DROP");
        time::advance(Duration::from_secs(20)).await;
        store.set("10.0.0.1", "DROP");
        time::advance(Duration::from_secs(20)).await;

        // 40s after the first set, but only 20s after the refresh.
        assert!(store.contains("10.0.0.1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_emits_expired_event() {
        let store = ExpiringStore::new(Some(Duration::from_secs(30)));
        let mut events = store.subscribe();

        store.set("10.0.0.1", "DROP");
        time::advance(Duration::from_secs(35)).await;

        let event = events.recv().await.unwrap();
        match event {
            StoreEvent::Expired { key } => assert_eq!(key, "10.0.0.1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_expiring_store_keeps_entries() {
        let store = ExpiringStore::never_expiring();

        store.set("eth0", "ACCEPT");
        time::advance(Duration::from_secs(24 * 3600)).await;

        assert!(store.contains("eth0"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_means_never_expire() {
        let store = ExpiringStore::new(Some(Duration::ZERO));
        assert!(store.sweeper.is_none());

        store.set("10.0.0.1", "DROP");
        time::advance(Duration::from_secs(3600)).await;
        assert!(store.contains("10.0.0.1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_of_lapsed_entry_leaves_it_for_sweep() {
        // TTL 100s means a 10s sweep period; the entry set at t=5 lapses
        // at t=105, between the sweeps at t=100 and t=110.
        let store = ExpiringStore::new(Some(Duration::from_secs(100)));
        let mut events = store.subscribe();

        time::advance(Duration::from_secs(5)).await;
        store.set("10.0.0.1", "DROP");
        time::advance(Duration::from_secs(101)).await;

        // Lapsed but not yet swept: remove reports "unknown" and must not
        // steal the record from the sweep.
        assert!(!store.remove("10.0.0.1"));
        assert!(!store.contains("10.0.0.1"));

        // The sweep still finds the record and emits the notification.
        time::advance(Duration::from_secs(10)).await;
        let event = events.recv().await.unwrap();
        assert!(matches!(event, StoreEvent::Expired { ref key } if key == "10.0.0.1"));
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_reports_fault_on_poisoned_lock() {
        let store = ExpiringStore::new(Some(Duration::from_secs(30)));
        let mut events = store.subscribe();

        // Poison the state lock with a panicking writer.
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.shared.state.write().unwrap();
            panic!("writer died");
        }));
        assert!(result.is_err());

        time::advance(Duration::from_secs(3)).await;
        let event = events.recv().await.unwrap();
        assert!(matches!(event, StoreEvent::Fault(ref message) if message.contains("sweep")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinsert_after_expiry_moves_to_end() {
        let store = ExpiringStore::new(Some(Duration::from_secs(30)));

        store.set("a", "DROP");
        time::advance(Duration::from_secs(10)).await;
        store.set("b", "DROP");
        time::advance(Duration::from_secs(25)).await;

        // "a" lapsed, "b" is still live; re-adding "a" is a fresh insert.
        store.set("a", "ACCEPT");
        let keys: Vec<String> = store.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
    }
}
