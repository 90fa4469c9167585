use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{watch, RwLock};

use crate::{ActiveKey, BoundedCache, EngineConfig, FormStatus};

/// State shapes that can live inside a [`SliceCell`]. `Default` is the
/// reset target; `Clone + PartialEq` power the equality gate.
pub trait SliceState: Clone + Default + PartialEq + Send + Sync + 'static {}

impl<T: Clone + Default + PartialEq + Send + Sync + 'static> SliceState for T {}

/// Slice states that carry a current active key, enabling stale-response
/// rejection via [`SliceCell::commit_if_current`].
pub trait Keyed {
    fn active_key(&self) -> &ActiveKey;
}

/// Slice states that carry a [`FormStatus`], for the step pipeline.
pub trait HasStatus<A> {
    fn status(&self) -> &FormStatus<A>;
    fn status_mut(&mut self) -> &mut FormStatus<A>;
}

/// Form slices: a current key plus user-entered values, updated together
/// on every input change.
pub trait FormState<A>: Keyed + HasStatus<A> {
    type Values: Clone + PartialEq + Send;

    fn set_active_key(&mut self, key: ActiveKey);
    fn set_values(&mut self, values: Self::Values);
}

/// What a gated write did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Commit {
    /// The write changed the stored state and subscribers were notified.
    Committed,
    /// The write equalled the stored state and was dropped by the gate.
    Unchanged,
    /// The result's key no longer matched the current one; discarded.
    Stale,
}

impl Commit {
    pub fn is_stale(&self) -> bool {
        matches!(self, Commit::Stale)
    }
}

/// Container for one feature's slice state.
///
/// Every write goes through the equality gate: a write whose outcome equals
/// the stored value is dropped before it bumps the mutation counter or
/// notifies subscribers, so callers can re-commit freely without causing
/// re-render or refetch storms downstream.
pub struct SliceCell<S> {
    state: RwLock<S>,
    mutations: AtomicU64,
    notify: watch::Sender<u64>,
    cache_collapse_threshold: usize,
}

impl<S: SliceState> Default for SliceCell<S> {
    fn default() -> Self {
        SliceCell::new(&EngineConfig::default())
    }
}

impl<S: SliceState> SliceCell<S> {
    pub fn new(config: &EngineConfig) -> Self {
        let (notify, _) = watch::channel(0);
        SliceCell {
            state: RwLock::new(S::default()),
            mutations: AtomicU64::new(0),
            notify,
            cache_collapse_threshold: config.cache_collapse_threshold,
        }
    }

    /// Collapse threshold for this cell's per-key result caches, for
    /// writes performed inside [`SliceCell::update`] closures.
    pub fn cache_threshold(&self) -> usize {
        self.cache_collapse_threshold
    }

    /// Clone of the current state.
    pub async fn snapshot(&self) -> S {
        self.state.read().await.clone()
    }

    /// Read a projection of the current state.
    pub async fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&*self.state.read().await)
    }

    /// Count of writes that actually changed state since creation.
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::Relaxed)
    }

    /// Change notifications: the channel carries the mutation count and
    /// only ticks when a write passes the equality gate.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }

    fn bump(&self) {
        let count = self.mutations.fetch_add(1, Ordering::Relaxed) + 1;
        let _ = self.notify.send(count);
    }

    /// Commit one field, skipped when the new value equals the stored one.
    pub async fn set_by_key<T, F>(&self, field: F, value: T) -> Commit
    where
        T: PartialEq,
        F: FnOnce(&mut S) -> &mut T,
    {
        let mut guard = self.state.write().await;
        let slot = field(&mut *guard);
        if *slot == value {
            return Commit::Unchanged;
        }
        *slot = value;
        drop(guard);
        self.bump();
        Commit::Committed
    }

    /// Commit one entry of a per-key result cache, bounded by the
    /// configured collapse threshold.
    pub async fn set_by_active_key<T, F>(&self, field: F, key: ActiveKey, value: T) -> Commit
    where
        T: Clone + PartialEq,
        F: FnOnce(&mut S) -> &mut BoundedCache<T>,
    {
        let mut guard = self.state.write().await;
        let cache = field(&mut *guard);
        if cache.get(&key) == Some(&value) {
            return Commit::Unchanged;
        }
        cache.insert(self.cache_collapse_threshold, key, value);
        drop(guard);
        self.bump();
        Commit::Committed
    }

    /// Apply an arbitrary mutation; the gate compares the whole slice.
    pub async fn update<R>(&self, apply: impl FnOnce(&mut S) -> R) -> R {
        self.update_with(apply).await.0
    }

    /// Commit several fields at once (one lock, one notification).
    pub async fn set_by_keys(&self, apply: impl FnOnce(&mut S)) -> Commit {
        match self.update_with(apply).await.1 {
            true => Commit::Committed,
            false => Commit::Unchanged,
        }
    }

    async fn update_with<R>(&self, apply: impl FnOnce(&mut S) -> R) -> (R, bool) {
        let mut guard = self.state.write().await;
        let before = guard.clone();
        let result = apply(&mut *guard);
        let changed = *guard != before;
        drop(guard);
        if changed {
            self.bump();
        }
        (result, changed)
    }

    /// Replace the slice with a fresh default state.
    pub async fn reset(&self) -> Commit {
        self.set_by_keys(|state| *state = S::default()).await
    }
}

impl<S: SliceState + Keyed> SliceCell<S> {
    pub async fn current_key(&self) -> ActiveKey {
        self.state.read().await.active_key().clone()
    }

    /// Apply `commit` only while `key` is still the slice's current active
    /// key at write time. A mismatch discards the result silently; this is
    /// the stale-response rejection rule, and the lock that serializes all
    /// writes makes the check-and-commit atomic.
    pub async fn commit_if_current(&self, key: &ActiveKey, commit: impl FnOnce(&mut S)) -> Commit {
        let mut guard = self.state.write().await;
        if guard.active_key() != key {
            tracing::debug!(stale = %key, current = %guard.active_key(), "discarding stale result");
            return Commit::Stale;
        }
        let before = guard.clone();
        commit(&mut *guard);
        let changed = *guard != before;
        drop(guard);
        if changed {
            self.bump();
            Commit::Committed
        } else {
            Commit::Unchanged
        }
    }
}

impl<S: SliceState> SliceCell<S> {
    /// Optimistic commit of an input change: the recomputed key, the merged
    /// values, and a transient-reset status land together, synchronously,
    /// before any network call is issued.
    pub async fn apply_input<A>(&self, key: ActiveKey, values: S::Values) -> Commit
    where
        S: FormState<A>,
        A: Copy,
    {
        self.set_by_keys(|state| {
            state.set_active_key(key);
            state.set_values(values);
            let status = state.status().reset_transient();
            *state.status_mut() = status;
        })
        .await
    }
}
