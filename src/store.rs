use crate::snapshot::AccountSnapshot;
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
    atomic::{
        AtomicI64,
        Ordering,
    },
};

/// Source of wall-clock time in milliseconds since the epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(now_ms)),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A snapshot paired with the time its successful response arrived.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RefreshState {
    pub snapshot: AccountSnapshot,
    pub fetched_at_ms: i64,
}

impl RefreshState {
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.fetched_at_ms
    }
}

/// Shared owner of the current [`RefreshState`].
///
/// Handles are cheap to clone; every clone sees the same state. Writers
/// replace the whole state at once, so readers never observe a snapshot paired
/// with another snapshot's timestamp. Concurrent writers are last-write-wins.
#[derive(Clone, Debug, Default)]
pub struct StateStore {
    state: Arc<Mutex<RefreshState>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_state(snapshot: AccountSnapshot, fetched_at_ms: i64) -> Self {
        Self {
            state: Arc::new(Mutex::new(RefreshState {
                snapshot,
                fetched_at_ms,
            })),
        }
    }

    pub fn current(&self) -> RefreshState {
        self.lock().clone()
    }

    pub fn replace(&self, snapshot: AccountSnapshot, fetched_at_ms: i64) {
        *self.lock() = RefreshState {
            snapshot,
            fetched_at_ms,
        };
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        // state is always replaced whole, so a poisoned guard still holds a valid value
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
