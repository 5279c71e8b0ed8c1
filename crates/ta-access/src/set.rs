// set.rs — The heterogeneous permission set.
//
// A PermissionSet groups permissions of many kinds, one collection per
// kind, and answers a single unified implies query. Collections are created
// lazily on the first add of their kind; racing first insertions of the
// same new kind converge on one shared collection. Once a catch-all grant
// is added, every query short-circuits to true without touching the map.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::collection::PermissionCollection;
use crate::error::AccessError;
use crate::kinds::{CollectionStrategy, KindRegistry};
use crate::permission::{Kind, Permission, SharedPermission};

/// A kind-indexed set of permission collections with one unified `implies`.
#[derive(Debug)]
pub struct PermissionSet {
    kinds: Arc<KindRegistry>,
    collections: DashMap<Kind, Arc<dyn PermissionCollection>>,
    all_granted: AtomicBool,
    sealed: AtomicBool,
}

impl PermissionSet {
    pub fn new(kinds: Arc<KindRegistry>) -> Self {
        Self {
            kinds,
            collections: DashMap::new(),
            all_granted: AtomicBool::new(false),
            sealed: AtomicBool::new(false),
        }
    }

    /// Add a permission, creating its kind's collection on first use.
    pub fn add(&self, permission: SharedPermission) -> Result<(), AccessError> {
        if self.is_sealed() {
            return Err(AccessError::ReadOnlyViolation);
        }
        let kind = permission.kind();
        let strategy = self.kinds.strategy(kind);
        let collection = self
            .collections
            .entry(kind)
            .or_insert_with(|| strategy.build(kind))
            .clone();
        collection.add(permission)?;
        if matches!(strategy, CollectionStrategy::CatchAll) {
            self.all_granted.store(true, Ordering::Release);
        }
        Ok(())
    }

    /// Whether any held grant covers the candidate.
    ///
    /// Short-circuits to true once a catch-all grant was added; otherwise
    /// delegates to the candidate kind's collection. A kind with no
    /// collection is simply not implied.
    pub fn implies(&self, candidate: &dyn Permission) -> bool {
        if self.grants_all() {
            return true;
        }
        match self.collections.get(&candidate.kind()) {
            Some(collection) => collection.implies(candidate),
            None => false,
        }
    }

    /// Whether a catch-all grant has been added.
    pub fn grants_all(&self) -> bool {
        self.all_granted.load(Ordering::Acquire)
    }

    /// Snapshot of every held permission across all kinds.
    pub fn permissions(&self) -> Vec<SharedPermission> {
        self.collections
            .iter()
            .flat_map(|entry| entry.value().permissions())
            .collect()
    }

    /// Seal the set and every collection it holds. One-way and idempotent.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
        for entry in self.collections.iter() {
            entry.value().seal();
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// The registry this set resolves strategies against.
    pub fn kind_registry(&self) -> &Arc<KindRegistry> {
        &self.kinds
    }
}
