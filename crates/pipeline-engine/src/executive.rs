//! Per-node cache controller
//!
//! Pull-based validity tracking: instead of pushing dirty flags downstream,
//! each executive records the upstream tokens, the node's own modification
//! time and the served request at the moment it executed. On the next update
//! it compares those against the current values and recomputes only when
//! something differs.
//!
//! # States
//!
//! - `Unexecuted`: never produced output
//! - `Valid`: cached output is consistent with params and all upstream tokens
//! - `Stale`: something changed, or the last attempt failed

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};

use crate::data::DataObject;
use crate::information::UpdateRequest;
use crate::version::Version;

/// Cache state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutiveState {
    Unexecuted,
    Valid,
    Stale,
}

/// Counters describing an executive's history
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutiveStats {
    /// Number of successful executions
    pub executions: u64,
    /// Number of updates served from cache
    pub cache_hits: u64,
    /// Number of failed executions
    pub failures: u64,
    /// Current validity token
    pub token: Option<Version>,
}

#[derive(Default)]
struct CacheEntry {
    outputs: Vec<DataObject>,
    output_versions: Vec<Version>,
    /// Token stored at the last successful execution
    token: Option<Version>,
    /// Node modification time the outputs were computed for
    computed_for: Version,
    /// Upstream output tokens the outputs were computed from
    input_tokens: Vec<Vec<Version>>,
    /// Request after time snapping
    served: UpdateRequest,
    /// Request before snapping
    requested: UpdateRequest,
    /// Request received from downstream, before the node's own override
    inherited: UpdateRequest,
    failed: bool,
}

/// Validity token, cached outputs and update lock for one node
pub struct Executive {
    update_lock: Mutex<()>,
    cache: RwLock<CacheEntry>,
    executions: AtomicU64,
    cache_hits: AtomicU64,
    failures: AtomicU64,
}

impl Executive {
    pub(crate) fn new() -> Self {
        Self {
            update_lock: Mutex::new(()),
            cache: RwLock::new(CacheEntry::default()),
            executions: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Serialize updates of this node; held across the whole update
    pub(crate) fn lock_update(&self) -> MutexGuard<'_, ()> {
        self.update_lock.lock()
    }

    /// Token of the last successful execution
    pub fn token(&self) -> Option<Version> {
        self.cache.read().token
    }

    /// Token of one output port
    pub fn output_version(&self, index: usize) -> Option<Version> {
        self.cache.read().output_versions.get(index).copied()
    }

    /// Cached output of one port (shallow, read-only)
    pub fn output(&self, index: usize) -> Option<DataObject> {
        self.cache.read().outputs.get(index).cloned()
    }

    /// Number of successful executions
    pub fn execution_count(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> ExecutiveStats {
        ExecutiveStats {
            executions: self.executions.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            token: self.token(),
        }
    }

    /// State judged only from local information
    ///
    /// Upstream staleness is folded in by the owning node, which knows its
    /// connections.
    pub(crate) fn local_state(&self, modified: Version) -> ExecutiveState {
        let cache = self.cache.read();
        match cache.token {
            None if cache.failed => ExecutiveState::Stale,
            None => ExecutiveState::Unexecuted,
            Some(_) if cache.failed || modified > cache.computed_for => ExecutiveState::Stale,
            Some(_) => ExecutiveState::Valid,
        }
    }

    pub(crate) fn recorded_input_tokens(&self) -> Vec<Vec<Version>> {
        self.cache.read().input_tokens.clone()
    }

    pub(crate) fn served_request(&self) -> UpdateRequest {
        self.cache.read().served
    }

    pub(crate) fn requested(&self) -> UpdateRequest {
        self.cache.read().requested
    }

    pub(crate) fn inherited(&self) -> UpdateRequest {
        self.cache.read().inherited
    }

    /// Whether cached outputs can be reused as-is
    pub(crate) fn is_current(
        &self,
        modified: Version,
        input_tokens: &[Vec<Version>],
        served: &UpdateRequest,
    ) -> bool {
        let cache = self.cache.read();
        cache.token.is_some()
            && !cache.failed
            && modified <= cache.computed_for
            && cache.input_tokens == input_tokens
            && cache.served.same_as(served)
    }

    /// Record a cache hit; refreshes the raw requests so equivalent requests stay hits
    pub(crate) fn record_hit(&self, requested: UpdateRequest, inherited: UpdateRequest) {
        let mut cache = self.cache.write();
        cache.requested = requested;
        cache.inherited = inherited;
        drop(cache);
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Swap in new outputs and take a fresh token
    pub(crate) fn store(
        &self,
        outputs: Vec<DataObject>,
        computed_for: Version,
        input_tokens: Vec<Vec<Version>>,
        requested: UpdateRequest,
        inherited: UpdateRequest,
        served: UpdateRequest,
    ) -> Version {
        let token = Version::next();
        let mut cache = self.cache.write();
        cache.output_versions = vec![token; outputs.len()];
        cache.outputs = outputs;
        cache.token = Some(token);
        cache.computed_for = computed_for;
        cache.input_tokens = input_tokens;
        cache.requested = requested;
        cache.inherited = inherited;
        cache.served = served;
        cache.failed = false;
        drop(cache);
        self.executions.fetch_add(1, Ordering::Relaxed);
        token
    }

    /// Leave the node stale so the next update retries
    pub(crate) fn mark_failed(&self) {
        self.mark_stale();
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Force a retry on the next update without counting a failure
    pub(crate) fn mark_stale(&self) {
        self.cache.write().failed = true;
    }
}

impl Default for Executive {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let executive = Executive::new();
        assert_eq!(executive.local_state(Version::ZERO), ExecutiveState::Unexecuted);
        assert!(executive.token().is_none());
        assert!(!executive.is_current(Version::ZERO, &[], &UpdateRequest::default()));
    }

    #[test]
    fn test_store_makes_valid() {
        let executive = Executive::new();
        let modified = Version::next();
        let upstream = Version::next();
        let token = executive.store(
            vec![DataObject::empty(), DataObject::empty()],
            modified,
            vec![vec![upstream]],
            UpdateRequest::default(),
            UpdateRequest::default(),
            UpdateRequest::default(),
        );

        assert!(token > modified && token > upstream);
        assert_eq!(executive.local_state(modified), ExecutiveState::Valid);
        assert_eq!(executive.output_version(1), Some(token));
        assert!(executive.is_current(modified, &[vec![upstream]], &UpdateRequest::default()));
        assert!(!executive.is_current(modified, &[vec![Version::next()]], &UpdateRequest::default()));
        assert!(!executive.is_current(modified, &[vec![upstream]], &UpdateRequest::at_time(1.0)));
    }

    #[test]
    fn test_local_modification_makes_stale() {
        let executive = Executive::new();
        let modified = Version::next();
        executive.store(
            vec![],
            modified,
            vec![],
            UpdateRequest::default(),
            UpdateRequest::default(),
            UpdateRequest::default(),
        );
        assert_eq!(executive.local_state(Version::next()), ExecutiveState::Stale);
    }

    #[test]
    fn test_failure_makes_stale() {
        let executive = Executive::new();
        executive.mark_failed();
        assert_eq!(executive.local_state(Version::ZERO), ExecutiveState::Stale);

        let modified = Version::next();
        executive.store(
            vec![],
            modified,
            vec![],
            UpdateRequest::default(),
            UpdateRequest::default(),
            UpdateRequest::default(),
        );
        assert_eq!(executive.local_state(modified), ExecutiveState::Valid);
        executive.mark_failed();
        assert_eq!(executive.local_state(modified), ExecutiveState::Stale);
        assert_eq!(executive.stats().failures, 2);
        assert_eq!(executive.stats().executions, 1);
    }

    #[test]
    fn test_mark_stale_counts_no_failure() {
        let executive = Executive::new();
        let modified = Version::next();
        executive.store(
            vec![],
            modified,
            vec![],
            UpdateRequest::default(),
            UpdateRequest::at_time(1.0),
            UpdateRequest::default(),
        );
        assert_eq!(executive.inherited(), UpdateRequest::at_time(1.0));

        executive.mark_stale();
        assert_eq!(executive.local_state(modified), ExecutiveState::Stale);
        assert_eq!(executive.stats().failures, 0);
    }
}
