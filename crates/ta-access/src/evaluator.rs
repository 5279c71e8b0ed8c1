// evaluator.rs — The top-level access evaluator.
//
// An evaluator answers one question: is this permission implied for this
// code origin and these principals. It combines a statically granted
// permission set with an injected policy collaborator. The ordering is
// fixed: a static catch-all short-circuits before any policy lookup, but
// the policy is consulted before the rest of the static set, so dynamic
// grants are never masked by a narrower static baseline.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::origin::CodeOrigin;
use crate::permission::{Permission, PermissionKey, SharedPermission};
use crate::set::PermissionSet;

/// An identity attached to the executing context alongside its origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub kind: String,
    pub name: String,
}

impl Principal {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// What a policy decision is made about: an origin plus its principals.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub origin: CodeOrigin,
    pub principals: Vec<Principal>,
}

impl EvaluationContext {
    pub fn new(origin: CodeOrigin, principals: Vec<Principal>) -> Self {
        Self { origin, principals }
    }
}

/// The external decision source for dynamically computed grants.
///
/// Handles are injected into evaluators explicitly; there is no process
/// global. `permissions_for` exists for diagnostics and merging only and
/// never participates in an implication decision.
pub trait Policy: Send + Sync {
    /// Whether the policy grants the permission to the given context.
    fn implies(&self, context: &EvaluationContext, permission: &dyn Permission) -> bool;

    /// The grants the policy would extend to the context, for listing.
    fn permissions_for(&self, context: &EvaluationContext) -> Vec<SharedPermission> {
        let _ = context;
        Vec::new()
    }
}

/// Combines static and policy-provided grants into one `implies` answer
/// for a single evaluation context.
///
/// The static set is sealed at construction; its catch-all state is
/// captured once and short-circuits every subsequent query.
pub struct AccessEvaluator {
    context: EvaluationContext,
    static_permissions: Option<PermissionSet>,
    static_only: bool,
    policy: Option<Arc<dyn Policy>>,
    all_granted: bool,
}

impl AccessEvaluator {
    /// An evaluator that consults only its static permission set.
    pub fn static_only(
        context: EvaluationContext,
        static_permissions: Option<PermissionSet>,
    ) -> Self {
        Self::build(context, static_permissions, true, None)
    }

    /// An evaluator that consults the injected policy before falling back
    /// to its static set.
    pub fn with_policy(
        context: EvaluationContext,
        static_permissions: Option<PermissionSet>,
        policy: Arc<dyn Policy>,
    ) -> Self {
        Self::build(context, static_permissions, false, Some(policy))
    }

    fn build(
        context: EvaluationContext,
        static_permissions: Option<PermissionSet>,
        static_only: bool,
        policy: Option<Arc<dyn Policy>>,
    ) -> Self {
        if let Some(set) = &static_permissions {
            set.seal();
        }
        let all_granted = static_permissions
            .as_ref()
            .is_some_and(PermissionSet::grants_all);
        Self {
            context,
            static_permissions,
            static_only,
            policy,
            all_granted,
        }
    }

    pub fn context(&self) -> &EvaluationContext {
        &self.context
    }

    pub fn static_permissions(&self) -> Option<&PermissionSet> {
        self.static_permissions.as_ref()
    }

    pub fn is_static_only(&self) -> bool {
        self.static_only
    }

    /// Answer one access-control query.
    pub fn implies(&self, candidate: &dyn Permission) -> bool {
        if self.all_granted {
            tracing::debug!(
                "implies({}:{}) -> true via static catch-all",
                candidate.kind(),
                candidate.name()
            );
            return true;
        }
        if !self.static_only {
            if let Some(policy) = &self.policy {
                if policy.implies(&self.context, candidate) {
                    tracing::debug!(
                        "implies({}:{}) -> true via policy",
                        candidate.kind(),
                        candidate.name()
                    );
                    return true;
                }
            }
        }
        match &self.static_permissions {
            Some(set) => set.implies(candidate),
            None => false,
        }
    }

    /// The union of policy and static grants for this context, with
    /// duplicates (same kind, name, and actions) suppressed. Diagnostic
    /// listing only; `implies` never consults it.
    pub fn merged_permissions(&self) -> Vec<SharedPermission> {
        let mut seen: HashSet<PermissionKey> = HashSet::new();
        let mut merged = Vec::new();

        if !self.static_only {
            if let Some(policy) = &self.policy {
                for permission in policy.permissions_for(&self.context) {
                    if seen.insert(PermissionKey::of(permission.as_ref())) {
                        merged.push(permission);
                    }
                }
            }
        }
        if let Some(set) = &self.static_permissions {
            for permission in set.permissions() {
                if seen.insert(PermissionKey::of(permission.as_ref())) {
                    merged.push(permission);
                }
            }
        }
        merged
    }
}

impl fmt::Debug for AccessEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessEvaluator")
            .field("context", &self.context)
            .field("static_permissions", &self.static_permissions)
            .field("static_only", &self.static_only)
            .field("has_policy", &self.policy.is_some())
            .field("all_granted", &self.all_granted)
            .finish()
    }
}
