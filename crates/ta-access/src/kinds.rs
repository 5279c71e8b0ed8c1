// kinds.rs — The kind registry: collection strategies and constructors.
//
// Every permission kind resolves to a collection strategy (decided once, at
// first insertion into a heterogeneous set) and to a constructor table used
// when a deferred permission of that kind is finally resolved. Both live in
// a closed lookup table keyed on the kind tag; the Custom strategy arm keeps
// the table extensible without open-ended virtual dispatch.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::collection::{
    CatchAllCollection, GenericSetCollection, PermissionCollection, WildcardNameCollection,
};
use crate::error::AccessError;
use crate::permission::{
    AllPermission, Kind, ResourcePermission, ScopePermission, SharedPermission,
};

/// Result of invoking one of a kind's constructors.
pub type ConstructorResult = Result<SharedPermission, AccessError>;

/// Factory for the `Custom` strategy arm.
pub type CollectionFactory = Arc<dyn Fn(Kind) -> Arc<dyn PermissionCollection> + Send + Sync>;

/// How permissions of a kind are grouped and matched.
#[derive(Clone)]
pub enum CollectionStrategy {
    /// One grant makes the collection imply everything.
    CatchAll,
    /// Hierarchical names with wildcard-prefix matching.
    WildcardName,
    /// Identity-keyed set with pairwise-implies fallback.
    GenericSet,
    /// A caller-supplied collection implementation.
    Custom(CollectionFactory),
}

impl CollectionStrategy {
    pub(crate) fn build(&self, kind: Kind) -> Arc<dyn PermissionCollection> {
        match self {
            CollectionStrategy::CatchAll => Arc::new(CatchAllCollection::new(kind)),
            CollectionStrategy::WildcardName => Arc::new(WildcardNameCollection::new(kind)),
            CollectionStrategy::GenericSet => Arc::new(GenericSetCollection::new(kind)),
            CollectionStrategy::Custom(factory) => factory(kind),
        }
    }
}

impl fmt::Debug for CollectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionStrategy::CatchAll => f.write_str("CatchAll"),
            CollectionStrategy::WildcardName => f.write_str("WildcardName"),
            CollectionStrategy::GenericSet => f.write_str("GenericSet"),
            CollectionStrategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// The constructor forms a kind supports.
///
/// [`construct`](Self::construct) tries the forms in a fixed order:
/// zero-argument, then name-only, then name-plus-actions. The first form
/// present in the table wins; the order is part of the contract because
/// some kinds support only a subset of the forms.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstructorTable {
    pub zero_arg: Option<fn() -> ConstructorResult>,
    pub name_only: Option<fn(&str) -> ConstructorResult>,
    pub name_actions: Option<fn(&str, Option<&str>) -> ConstructorResult>,
}

impl ConstructorTable {
    /// Build a permission from the first available constructor form.
    pub fn construct(
        &self,
        kind: Kind,
        name: Option<&str>,
        actions: Option<&str>,
    ) -> ConstructorResult {
        if let Some(build) = self.zero_arg {
            return build();
        }
        if let Some(build) = self.name_only {
            if let Some(name) = name {
                return build(name);
            }
        }
        if let Some(build) = self.name_actions {
            if let Some(name) = name {
                return build(name, actions);
            }
        }
        Err(AccessError::MissingConstructor { kind })
    }
}

/// A kind's registration: its collection strategy and constructor table.
#[derive(Debug, Clone)]
pub struct KindBinding {
    pub strategy: CollectionStrategy,
    pub constructors: ConstructorTable,
}

/// Lookup table mapping kind tags to their bindings.
///
/// Doubles as the resolution collaborator for deferred permissions: a kind
/// counts as "available" once it is registered here. Unregistered kinds get
/// the generic set strategy and no constructors.
#[derive(Debug, Default)]
pub struct KindRegistry {
    bindings: DashMap<&'static str, KindBinding>,
}

impl KindRegistry {
    /// An empty registry with no kinds.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the crate's built-in kinds.
    pub fn with_builtins() -> Self {
        let registry = Self::new();

        registry.register(
            AllPermission::KIND,
            KindBinding {
                strategy: CollectionStrategy::CatchAll,
                constructors: ConstructorTable {
                    zero_arg: Some(|| Ok(Arc::new(AllPermission::new()) as SharedPermission)),
                    ..ConstructorTable::default()
                },
            },
        );

        registry.register(
            ScopePermission::KIND,
            KindBinding {
                strategy: CollectionStrategy::WildcardName,
                constructors: ConstructorTable {
                    name_only: Some(|name| {
                        Ok(Arc::new(ScopePermission::new(name)?) as SharedPermission)
                    }),
                    ..ConstructorTable::default()
                },
            },
        );

        registry.register(
            ResourcePermission::KIND,
            KindBinding {
                strategy: CollectionStrategy::GenericSet,
                constructors: ConstructorTable {
                    name_actions: Some(|name, actions| {
                        Ok(Arc::new(ResourcePermission::new(name, actions.unwrap_or(""))?)
                            as SharedPermission)
                    }),
                    ..ConstructorTable::default()
                },
            },
        );

        registry
    }

    /// Register (or replace) a kind's binding.
    pub fn register(&self, kind: Kind, binding: KindBinding) {
        self.bindings.insert(kind.as_str(), binding);
    }

    /// The collection strategy for a kind; unregistered kinds fall back to
    /// the generic set.
    pub fn strategy(&self, kind: Kind) -> CollectionStrategy {
        self.bindings
            .get(kind.as_str())
            .map(|binding| binding.strategy.clone())
            .unwrap_or(CollectionStrategy::GenericSet)
    }

    /// The constructor table for a kind, if the kind is registered.
    pub fn constructors(&self, kind: Kind) -> Option<ConstructorTable> {
        self.bindings
            .get(kind.as_str())
            .map(|binding| binding.constructors)
    }

    /// Look a kind up by its tag string, as spelled in grant files.
    pub fn lookup(&self, tag: &str) -> Option<Kind> {
        self.bindings.get(tag).map(|entry| Kind::new(*entry.key()))
    }

    /// Whether the registry knows this tag.
    pub fn is_registered(&self, tag: &str) -> bool {
        self.bindings.contains_key(tag)
    }
}
