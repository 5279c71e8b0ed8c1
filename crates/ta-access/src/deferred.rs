// deferred.rs — Deferred permissions and their registry.
//
// A grant can reference a permission kind that is not registered at policy
// load time. Such grants are recorded as placeholders, bucketed by the
// intended kind's tag, and resolved later against a certificate context
// once the kind becomes available. Until then a placeholder implies
// nothing. Resolution is fail-closed: a placeholder that cannot be
// constructed is dropped silently rather than surfaced or retried.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::cert::{contains_all, Certificate};
use crate::kinds::KindRegistry;
use crate::permission::{Kind, SharedPermission};

/// A placeholder for a permission whose kind was unavailable when the
/// grant was recorded.
///
/// `signer_certs` are the certificates the grant was conditioned on; every
/// one of them must be present in the resolving context for the placeholder
/// to resolve. An empty set matches any context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredPermission {
    pub kind_name: String,
    pub name: Option<String>,
    pub actions: Option<String>,
    #[serde(default)]
    pub signer_certs: Vec<Certificate>,
}

/// Placeholders grouped by intended kind tag.
///
/// Each bucket has its own lock so registration and resolution of
/// unrelated kinds never serialize against each other.
#[derive(Debug, Default)]
pub struct DeferredPermissionRegistry {
    buckets: DashMap<String, Mutex<Vec<DeferredPermission>>>,
}

impl DeferredPermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a placeholder under its intended kind tag.
    pub fn register(&self, deferred: DeferredPermission) {
        self.buckets
            .entry(deferred.kind_name.clone())
            .or_default()
            .lock()
            .push(deferred);
    }

    /// Resolve every placeholder registered for `kind` against a
    /// certificate context.
    ///
    /// A placeholder whose recorded certificates are all present in
    /// `resolving_certs` is consumed: it either becomes a concrete
    /// permission via the kind's constructor table, or, when construction
    /// fails, is dropped without surfacing an error. Placeholders whose
    /// certificates do not match stay registered for a later context.
    /// An unregistered kind resolves nothing.
    pub fn resolve(
        &self,
        kind: Kind,
        kinds: &KindRegistry,
        resolving_certs: &[Certificate],
    ) -> Vec<SharedPermission> {
        let Some(constructors) = kinds.constructors(kind) else {
            return Vec::new();
        };
        let Some(bucket) = self.buckets.get(kind.as_str()) else {
            return Vec::new();
        };

        let mut resolved = Vec::new();
        bucket.lock().retain(|deferred| {
            if !contains_all(resolving_certs, &deferred.signer_certs) {
                return true;
            }
            match constructors.construct(
                kind,
                deferred.name.as_deref(),
                deferred.actions.as_deref(),
            ) {
                Ok(permission) => resolved.push(permission),
                Err(error) => {
                    tracing::debug!(
                        "dropping deferred '{}' permission: {}",
                        deferred.kind_name,
                        error
                    );
                }
            }
            false
        });
        resolved
    }

    /// Snapshot of the placeholders still registered under a kind tag.
    pub fn pending(&self, kind_name: &str) -> Vec<DeferredPermission> {
        self.buckets
            .get(kind_name)
            .map(|bucket| bucket.lock().clone())
            .unwrap_or_default()
    }

    /// Total placeholders still registered across all kinds.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
