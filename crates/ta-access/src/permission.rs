// permission.rs — The permission object model.
//
// A permission is identified by a kind (a stable type tag), a name, and an
// optional actions string. Permissions are immutable once constructed and
// are compared for implication, never structural equality, when making
// access decisions. Implication is an intra-kind operation: a permission of
// one kind never implies a permission of another. The one exception is the
// universal catch-all kind, which implies everything by definition.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::error::AccessError;
use crate::name::HierarchicalName;

/// A stable type tag identifying a permission kind.
///
/// Kinds are compared by tag string, so two `Kind` values made from the same
/// tag are the same kind. Tags use dotted lowercase by convention
/// (`"access.scope"`, `"plugin.registry"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Kind(&'static str);

impl Kind {
    pub const fn new(tag: &'static str) -> Self {
        Self(tag)
    }

    pub fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A grantable capability.
///
/// Implementations must be immutable and cheap to query. `implies` answers
/// whether this (granted) permission covers the candidate; implementations
/// are expected to return false for candidates of a different kind.
pub trait Permission: fmt::Debug + Send + Sync {
    /// The concrete kind of this permission.
    fn kind(&self) -> Kind;

    /// The permission name.
    fn name(&self) -> &str;

    /// The actions string, for kinds that carry one.
    fn actions(&self) -> Option<&str> {
        None
    }

    /// Whether this granted permission covers the candidate.
    fn implies(&self, candidate: &dyn Permission) -> bool;
}

/// Hash/equality identity of a permission: kind + name + actions.
///
/// Used as the key of the generic set strategy and for duplicate
/// suppression when merging static and policy grants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionKey {
    kind: Kind,
    name: String,
    actions: Option<String>,
}

impl PermissionKey {
    pub fn of(permission: &dyn Permission) -> Self {
        Self {
            kind: permission.kind(),
            name: permission.name().to_string(),
            actions: permission.actions().map(str::to_string),
        }
    }
}

/// The universal catch-all permission. Implies every permission of every
/// kind; granting it makes the holding set imply everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllPermission;

impl AllPermission {
    pub const KIND: Kind = Kind::new("access.all");

    pub fn new() -> Self {
        Self
    }
}

impl Permission for AllPermission {
    fn kind(&self) -> Kind {
        Self::KIND
    }

    fn name(&self) -> &str {
        "<all>"
    }

    fn implies(&self, _candidate: &dyn Permission) -> bool {
        true
    }
}

/// A hierarchical, wildcard-capable named permission with no actions.
///
/// Names form a dot hierarchy ("runtime.shutdown", "agent.spawn.worker");
/// a grant of "agent.*" covers every name below "agent". This kind uses the
/// wildcard-name collection strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopePermission {
    name: String,
    parsed: HierarchicalName,
}

impl ScopePermission {
    pub const KIND: Kind = Kind::new("access.scope");

    pub fn new(name: impl Into<String>) -> Result<Self, AccessError> {
        let name = name.into();
        let parsed = HierarchicalName::parse(&name)?;
        Ok(Self { name, parsed })
    }

    pub fn hierarchical_name(&self) -> &HierarchicalName {
        &self.parsed
    }
}

impl Permission for ScopePermission {
    fn kind(&self) -> Kind {
        Self::KIND
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn implies(&self, candidate: &dyn Permission) -> bool {
        if candidate.kind() != Self::KIND {
            return false;
        }
        match HierarchicalName::parse(candidate.name()) {
            Ok(candidate_name) => self.parsed.implies(&candidate_name),
            Err(_) => false,
        }
    }
}

/// A named resource permission carrying a comma-separated action set.
///
/// Implication requires an exact name match and the candidate's actions to
/// be a subset of the granted actions. This kind has no preferred collection
/// strategy and lands in the generic set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePermission {
    name: String,
    actions: BTreeSet<String>,
    actions_canonical: String,
}

impl ResourcePermission {
    pub const KIND: Kind = Kind::new("access.resource");

    pub fn new(name: impl Into<String>, actions: &str) -> Result<Self, AccessError> {
        let name = name.into();
        if name.is_empty() {
            return Err(AccessError::InvalidName {
                name,
                reason: "name must not be empty".to_string(),
            });
        }
        let actions = parse_actions(actions);
        let actions_canonical = actions.iter().cloned().collect::<Vec<_>>().join(",");
        Ok(Self {
            name,
            actions,
            actions_canonical,
        })
    }
}

impl Permission for ResourcePermission {
    fn kind(&self) -> Kind {
        Self::KIND
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn actions(&self) -> Option<&str> {
        if self.actions_canonical.is_empty() {
            None
        } else {
            Some(&self.actions_canonical)
        }
    }

    fn implies(&self, candidate: &dyn Permission) -> bool {
        if candidate.kind() != Self::KIND || candidate.name() != self.name {
            return false;
        }
        parse_actions(candidate.actions().unwrap_or(""))
            .iter()
            .all(|action| self.actions.contains(action))
    }
}

fn parse_actions(actions: &str) -> BTreeSet<String> {
    actions
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

/// Convenience alias for the shared trait-object form permissions take in
/// collections and evaluation results.
pub type SharedPermission = Arc<dyn Permission>;
