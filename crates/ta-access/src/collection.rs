// collection.rs — Permission collection strategies.
//
// A collection owns permissions of exactly one kind and answers implication
// queries against them. Three strategies exist: a catch-all collection that
// only remembers whether anything was granted, a wildcard-name collection
// that resolves hierarchical names by walking dot segments upward, and a
// generic hash-based set for kinds with no preferred strategy.
//
// Collections are mutated and queried concurrently without a global lock.
// Readers never observe a partially-added permission, and sealing a
// collection read-only is a one-way transition visible to all threads.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use dashmap::DashMap;

use crate::error::AccessError;
use crate::name::HierarchicalName;
use crate::permission::{Kind, Permission, PermissionKey, SharedPermission};

/// A mutable, append-only (until sealed) set of permissions of one kind.
pub trait PermissionCollection: fmt::Debug + Send + Sync {
    /// Add a permission. Fails with [`AccessError::ReadOnlyViolation`] after
    /// [`seal`](Self::seal), and with [`AccessError::KindMismatch`] when the
    /// permission's kind is not the collection's bound kind.
    fn add(&self, permission: SharedPermission) -> Result<(), AccessError>;

    /// Whether any held grant covers the candidate. Wrong-kind candidates
    /// evaluate to false, never an error.
    fn implies(&self, candidate: &dyn Permission) -> bool;

    /// Snapshot of the held permissions, in no particular order.
    fn permissions(&self) -> Vec<SharedPermission>;

    /// Seal the collection read-only. One-way and idempotent.
    fn seal(&self);

    fn is_sealed(&self) -> bool;
}

/// One-way read-only flag shared by the collection strategies.
#[derive(Debug, Default)]
struct SealFlag(AtomicBool);

impl SealFlag {
    fn seal(&self) {
        self.0.store(true, Ordering::Release);
    }

    fn is_sealed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn ensure_mutable(&self) -> Result<(), AccessError> {
        if self.is_sealed() {
            Err(AccessError::ReadOnlyViolation)
        } else {
            Ok(())
        }
    }
}

fn ensure_kind(bound: Kind, permission: &dyn Permission) -> Result<(), AccessError> {
    if permission.kind() != bound {
        return Err(AccessError::KindMismatch {
            expected: bound,
            actual: permission.kind(),
        });
    }
    Ok(())
}

/// Catch-all strategy: records only whether at least one grant was added,
/// after which every candidate is implied.
#[derive(Debug)]
pub struct CatchAllCollection {
    kind: Kind,
    grant: OnceLock<SharedPermission>,
    sealed: SealFlag,
}

impl CatchAllCollection {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            grant: OnceLock::new(),
            sealed: SealFlag::default(),
        }
    }
}

impl PermissionCollection for CatchAllCollection {
    fn add(&self, permission: SharedPermission) -> Result<(), AccessError> {
        self.sealed.ensure_mutable()?;
        ensure_kind(self.kind, permission.as_ref())?;
        let _ = self.grant.set(permission);
        Ok(())
    }

    fn implies(&self, _candidate: &dyn Permission) -> bool {
        self.grant.get().is_some()
    }

    fn permissions(&self) -> Vec<SharedPermission> {
        self.grant.get().cloned().into_iter().collect()
    }

    fn seal(&self) {
        self.sealed.seal();
    }

    fn is_sealed(&self) -> bool {
        self.sealed.is_sealed()
    }
}

/// Wildcard-name strategy: grants keyed by canonical name in a concurrent
/// map.
///
/// `implies` short-circuits on a stored `*` grant, then tries an exact-name
/// lookup, then walks the candidate's path upward one dot segment at a time
/// testing `<prefix>.*` at each level. The upward walk makes lookup cost
/// proportional to name depth, not grant count.
#[derive(Debug)]
pub struct WildcardNameCollection {
    kind: Kind,
    grants: DashMap<String, SharedPermission>,
    all_names: AtomicBool,
    sealed: SealFlag,
}

impl WildcardNameCollection {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            grants: DashMap::new(),
            all_names: AtomicBool::new(false),
            sealed: SealFlag::default(),
        }
    }
}

impl PermissionCollection for WildcardNameCollection {
    fn add(&self, permission: SharedPermission) -> Result<(), AccessError> {
        self.sealed.ensure_mutable()?;
        ensure_kind(self.kind, permission.as_ref())?;
        let parsed = HierarchicalName::parse(permission.name())?;
        if parsed.is_wildcard() && parsed.path().is_empty() {
            self.all_names.store(true, Ordering::Release);
        }
        self.grants.insert(parsed.canonical(), permission);
        Ok(())
    }

    fn implies(&self, candidate: &dyn Permission) -> bool {
        if candidate.kind() != self.kind {
            return false;
        }
        if self.all_names.load(Ordering::Acquire) {
            return true;
        }
        let Ok(parsed) = HierarchicalName::parse(candidate.name()) else {
            return false;
        };
        let key = parsed.canonical();
        if let Some(grant) = self.grants.get(&key) {
            if grant.implies(candidate) {
                return true;
            }
        }
        // Walk upward: for "a.b.c", probe "a.b.*" then "a.*". The lone "*"
        // has no dot and is covered by the all_names flag above.
        let mut end = key.len();
        while let Some(dot) = key[..end].rfind('.') {
            let probe = format!("{}*", &key[..=dot]);
            if let Some(grant) = self.grants.get(&probe) {
                if grant.implies(candidate) {
                    return true;
                }
            }
            end = dot;
        }
        false
    }

    fn permissions(&self) -> Vec<SharedPermission> {
        self.grants.iter().map(|entry| entry.value().clone()).collect()
    }

    fn seal(&self) {
        self.sealed.seal();
    }

    fn is_sealed(&self) -> bool {
        self.sealed.is_sealed()
    }
}

/// Generic fallback strategy: permissions keyed by their own identity
/// (kind + name + actions).
///
/// `implies` tries an exact-identity lookup first, then falls back to a
/// linear scan delegating to each grant's pairwise `implies`. Re-adding an
/// equal permission replaces the existing entry, so the collection holds one
/// logical entry per identity.
#[derive(Debug)]
pub struct GenericSetCollection {
    kind: Kind,
    grants: DashMap<PermissionKey, SharedPermission>,
    sealed: SealFlag,
}

impl GenericSetCollection {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            grants: DashMap::new(),
            sealed: SealFlag::default(),
        }
    }
}

impl PermissionCollection for GenericSetCollection {
    fn add(&self, permission: SharedPermission) -> Result<(), AccessError> {
        self.sealed.ensure_mutable()?;
        ensure_kind(self.kind, permission.as_ref())?;
        self.grants
            .insert(PermissionKey::of(permission.as_ref()), permission);
        Ok(())
    }

    fn implies(&self, candidate: &dyn Permission) -> bool {
        if candidate.kind() != self.kind {
            return false;
        }
        let key = PermissionKey::of(candidate);
        if let Some(grant) = self.grants.get(&key) {
            if grant.implies(candidate) {
                return true;
            }
        }
        self.grants
            .iter()
            .any(|entry| entry.value().implies(candidate))
    }

    fn permissions(&self) -> Vec<SharedPermission> {
        self.grants.iter().map(|entry| entry.value().clone()).collect()
    }

    fn seal(&self) {
        self.sealed.seal();
    }

    fn is_sealed(&self) -> bool {
        self.sealed.is_sealed()
    }
}
