// name.rs — Hierarchical permission name matching.
//
// Permission names form a dot-separated hierarchy. A name ending in ".*"
// (or the lone name "*") is a wildcard prefix that covers every name below
// it; anything else matches exactly. Implication is evaluated between two
// parsed names of the same permission kind.

use crate::error::AccessError;

/// The one legacy alias in the naming scheme: the literal name `exitVM`
/// behaves as the wildcard `exitVM.*` when compared, while keeping its
/// original spelling everywhere it is displayed or stored.
const LEGACY_EXIT_ALIAS: &str = "exitVM";

/// A permission name parsed into exact or wildcard-prefix form.
///
/// For a wildcard, `path` is the name with the trailing `*` stripped and the
/// dot kept (`"a.b.*"` parses to path `"a.b."`), so prefix tests line up on
/// segment boundaries. The lone wildcard `"*"` has an empty path and covers
/// every name of its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HierarchicalName {
    wildcard: bool,
    path: String,
}

impl HierarchicalName {
    /// Parse a permission name.
    ///
    /// Fails with [`AccessError::InvalidName`] on an empty name. The legacy
    /// `exitVM` alias canonicalizes to wildcard form here, as a single
    /// isolated step; no other name receives alias treatment.
    pub fn parse(name: &str) -> Result<Self, AccessError> {
        if name.is_empty() {
            return Err(AccessError::InvalidName {
                name: name.to_string(),
                reason: "name must not be empty".to_string(),
            });
        }

        // Legacy alias, canonicalized for comparison purposes only.
        if name == LEGACY_EXIT_ALIAS {
            return Ok(Self {
                wildcard: true,
                path: format!("{LEGACY_EXIT_ALIAS}."),
            });
        }

        if name == "*" {
            return Ok(Self {
                wildcard: true,
                path: String::new(),
            });
        }

        if let Some(stem) = name.strip_suffix(".*") {
            // Keep the trailing dot so prefix tests stop on segment
            // boundaries ("a.b." is a prefix of "a.b.c" but not of "a.bc").
            return Ok(Self {
                wildcard: true,
                path: format!("{stem}."),
            });
        }

        Ok(Self {
            wildcard: false,
            path: name.to_string(),
        })
    }

    /// Whether this name is a wildcard prefix.
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// The name with any trailing wildcard marker stripped.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The canonical spelling of this name: `path` plus a trailing `*` for
    /// wildcards, `path` verbatim otherwise. Used as the lookup key in the
    /// wildcard-name collection strategy.
    pub fn canonical(&self) -> String {
        if self.wildcard {
            format!("{}*", self.path)
        } else {
            self.path.clone()
        }
    }

    /// Whether this (granted) name covers the candidate name.
    ///
    /// Kind identity is not checked here; callers compare kinds before
    /// delegating to the name test.
    pub fn implies(&self, candidate: &HierarchicalName) -> bool {
        if self.wildcard {
            if candidate.wildcard {
                candidate.path.starts_with(&self.path)
            } else {
                // A wildcard covers strictly longer exact names only:
                // "a.b.*" implies "a.b.c" but not "a.b".
                candidate.path.len() > self.path.len() && candidate.path.starts_with(&self.path)
            }
        } else if candidate.wildcard {
            false
        } else {
            self.path == candidate.path
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> HierarchicalName {
        HierarchicalName::parse(s).unwrap()
    }

    #[test]
    fn empty_name_is_rejected() {
        match HierarchicalName::parse("") {
            Err(AccessError::InvalidName { .. }) => {}
            other => panic!("expected InvalidName, got {:?}", other),
        }
    }

    #[test]
    fn exact_name_parses_verbatim() {
        let n = name("fs.read");
        assert!(!n.is_wildcard());
        assert_eq!(n.path(), "fs.read");
        assert_eq!(n.canonical(), "fs.read");
    }

    #[test]
    fn wildcard_keeps_trailing_dot_in_path() {
        let n = name("fs.read.*");
        assert!(n.is_wildcard());
        assert_eq!(n.path(), "fs.read.");
        assert_eq!(n.canonical(), "fs.read.*");
    }

    #[test]
    fn lone_star_has_empty_path() {
        let n = name("*");
        assert!(n.is_wildcard());
        assert_eq!(n.path(), "");
    }

    #[test]
    fn star_without_dot_separator_is_exact() {
        // Only ".*" (or the lone "*") marks a wildcard.
        let n = name("fs*");
        assert!(!n.is_wildcard());
        assert_eq!(n.path(), "fs*");
    }

    #[test]
    fn wildcard_implies_longer_names() {
        let g = name("fs.read.*");
        assert!(g.implies(&name("fs.read.config")));
        assert!(g.implies(&name("fs.read.config.secrets")));
    }

    #[test]
    fn wildcard_does_not_imply_its_own_stem() {
        let g = name("fs.read.*");
        assert!(!g.implies(&name("fs.read")));
    }

    #[test]
    fn wildcard_implies_narrower_wildcard() {
        let g = name("fs.*");
        assert!(g.implies(&name("fs.read.*")));
        assert!(!g.implies(&name("net.*")));
    }

    #[test]
    fn exact_never_implies_wildcard() {
        let g = name("fs.read");
        assert!(!g.implies(&name("fs.read.*")));
        assert!(!g.implies(&name("*")));
    }

    #[test]
    fn exact_implication_is_reflexive() {
        let g = name("fs.read");
        assert!(g.implies(&name("fs.read")));
        assert!(!g.implies(&name("fs.write")));
    }

    #[test]
    fn lone_star_implies_everything() {
        let g = name("*");
        assert!(g.implies(&name("fs")));
        assert!(g.implies(&name("fs.read.config")));
        assert!(g.implies(&name("net.*")));
    }

    #[test]
    fn prefix_match_respects_segment_boundaries() {
        let g = name("fs.re.*");
        assert!(g.implies(&name("fs.re.x")));
        assert!(!g.implies(&name("fs.read")));
    }

    #[test]
    fn legacy_exit_alias_is_a_known_irregularity() {
        // "exitVM" alone is grandfathered in as the wildcard "exitVM.*".
        // This is a deliberate, isolated compatibility case, not a general
        // aliasing mechanism.
        let alias = name("exitVM");
        assert!(alias.is_wildcard());
        assert_eq!(alias.path(), "exitVM.");
        assert!(alias.implies(&name("exitVM.host")));
        assert!(alias.implies(&name("exitVM.*")));

        // No other bare name gets the treatment.
        let plain = name("exit");
        assert!(!plain.is_wildcard());
    }
}
