// policy.rs — Grants-file backed policy provider.
//
// A grants file is a YAML document with a certificate directory and a list
// of grant entries. Each entry scopes a set of permissions to a code
// origin, optional signer names, and optional principals. Loading is
// fail-closed at entry granularity: an entry naming an unknown signer or
// an unparseable origin is skipped with a warning, a permission of an
// unregistered kind becomes a deferred placeholder, and a permission that
// fails to construct is dropped. The rest of the file always loads.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::cert::Certificate;
use crate::deferred::{DeferredPermission, DeferredPermissionRegistry};
use crate::error::GrantsError;
use crate::evaluator::{EvaluationContext, Policy, Principal};
use crate::kinds::KindRegistry;
use crate::location::OriginUrl;
use crate::origin::CodeOrigin;
use crate::permission::{Kind, Permission, PermissionKey, SharedPermission};
use crate::set::PermissionSet;

/// The on-disk shape of a grants file.
///
/// ```yaml
/// certificates:
///   vendor-a:
///     subject: "CN=Vendor A"
///     issuer: "CN=Root"
///     data: "dmVuZG9yLWE="
/// grants:
///   - origin: "https://plugins.example.com/approved/*"
///     signed_by: [vendor-a]
///     permissions:
///       - kind: access.scope
///         name: "fs.read.*"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrantsConfig {
    #[serde(default)]
    pub certificates: BTreeMap<String, CertificateEntry>,
    #[serde(default)]
    pub grants: Vec<GrantEntry>,
}

/// One named certificate in the directory; `data` is base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateEntry {
    pub subject: String,
    pub issuer: String,
    pub data: String,
}

/// One grant entry: a scope (origin, signers, principals) and the
/// permissions extended to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrantEntry {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub signed_by: Vec<String>,
    #[serde(default)]
    pub principals: Vec<Principal>,
    #[serde(default)]
    pub permissions: Vec<PermissionEntry>,
}

/// One permission inside a grant entry, spelled by kind tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionEntry {
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub actions: Option<String>,
}

/// A loaded grant entry: its origin scope and its permission set, plus the
/// placeholders recorded for kinds that were unknown at load time.
#[derive(Debug)]
struct PolicyEntry {
    origin: CodeOrigin,
    principals: Vec<Principal>,
    permissions: PermissionSet,
    deferred: DeferredPermissionRegistry,
}

impl PolicyEntry {
    fn applies_to(&self, context: &EvaluationContext) -> bool {
        self.origin.implies(&context.origin)
            && self
                .principals
                .iter()
                .all(|principal| context.principals.contains(principal))
    }
}

/// Policy provider backed by a grants file.
#[derive(Debug)]
pub struct GrantsPolicy {
    kinds: Arc<KindRegistry>,
    entries: Vec<PolicyEntry>,
}

impl GrantsPolicy {
    /// Load a grants file from disk.
    pub fn from_path(path: impl AsRef<Path>, kinds: Arc<KindRegistry>) -> Result<Self, GrantsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| GrantsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: GrantsConfig =
            serde_yaml::from_str(&raw).map_err(|source| GrantsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_config(config, kinds)
    }

    /// Build a policy from an already-parsed config.
    pub fn from_config(config: GrantsConfig, kinds: Arc<KindRegistry>) -> Result<Self, GrantsError> {
        let directory = decode_certificates(&config.certificates)?;

        let mut entries = Vec::new();
        for (index, entry) in config.grants.iter().enumerate() {
            match build_entry(entry, &directory, &kinds) {
                Some(built) => entries.push(built),
                None => {
                    tracing::warn!("ignoring grant entry {index}: unresolvable scope");
                }
            }
        }
        Ok(Self { kinds, entries })
    }

    /// Fold placeholders for a now-registered kind into every entry whose
    /// recorded certificates match `resolving_certs`. Returns how many
    /// concrete permissions were added.
    pub fn resolve_deferred(&self, kind: Kind, resolving_certs: &[Certificate]) -> usize {
        let mut added = 0;
        for entry in &self.entries {
            for permission in entry.deferred.resolve(kind, &self.kinds, resolving_certs) {
                if entry.permissions.add(permission).is_ok() {
                    added += 1;
                }
            }
        }
        added
    }

    /// Placeholders still waiting across all entries.
    pub fn pending_deferred(&self) -> usize {
        self.entries.iter().map(|entry| entry.deferred.len()).sum()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl Policy for GrantsPolicy {
    fn implies(&self, context: &EvaluationContext, permission: &dyn Permission) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.applies_to(context) && entry.permissions.implies(permission))
    }

    fn permissions_for(&self, context: &EvaluationContext) -> Vec<SharedPermission> {
        let mut seen = std::collections::HashSet::new();
        let mut granted = Vec::new();
        for entry in self.entries.iter().filter(|entry| entry.applies_to(context)) {
            for permission in entry.permissions.permissions() {
                if seen.insert(PermissionKey::of(permission.as_ref())) {
                    granted.push(permission);
                }
            }
        }
        granted
    }
}

fn decode_certificates(
    raw: &BTreeMap<String, CertificateEntry>,
) -> Result<BTreeMap<String, Certificate>, GrantsError> {
    let mut directory = BTreeMap::new();
    for (name, entry) in raw {
        let encoded = base64::engine::general_purpose::STANDARD
            .decode(&entry.data)
            .map_err(|source| GrantsError::InvalidCertificate {
                signer: name.clone(),
                source,
            })?;
        directory.insert(
            name.clone(),
            Certificate::new(entry.subject.clone(), entry.issuer.clone(), encoded),
        );
    }
    Ok(directory)
}

/// Build one policy entry, or None when its scope cannot be resolved
/// (unknown signer name, unparseable origin).
fn build_entry(
    entry: &GrantEntry,
    directory: &BTreeMap<String, Certificate>,
    kinds: &Arc<KindRegistry>,
) -> Option<PolicyEntry> {
    let location = match &entry.origin {
        Some(origin) => match OriginUrl::parse(origin) {
            Ok(url) => Some(url),
            Err(error) => {
                tracing::warn!("unparseable origin '{origin}': {error}");
                return None;
            }
        },
        None => None,
    };

    let mut signer_certs = Vec::new();
    for signer in &entry.signed_by {
        match directory.get(signer) {
            Some(cert) => signer_certs.push(cert.clone()),
            None => {
                tracing::warn!("unknown signer '{signer}'");
                return None;
            }
        }
    }

    let origin = if signer_certs.is_empty() {
        CodeOrigin::unsigned(location)
    } else {
        CodeOrigin::with_certificates(location, signer_certs.clone())
    };

    let permissions = PermissionSet::new(Arc::clone(kinds));
    let deferred = DeferredPermissionRegistry::new();

    for permission in &entry.permissions {
        match kinds.lookup(&permission.kind) {
            Some(kind) => {
                // The constructor table exists whenever lookup succeeds.
                let Some(constructors) = kinds.constructors(kind) else {
                    continue;
                };
                match constructors.construct(
                    kind,
                    permission.name.as_deref(),
                    permission.actions.as_deref(),
                ) {
                    Ok(built) => {
                        if let Err(error) = permissions.add(built) {
                            tracing::warn!(
                                "dropping '{}' permission: {}",
                                permission.kind,
                                error
                            );
                        }
                    }
                    Err(error) => {
                        tracing::warn!(
                            "dropping '{}' permission: {}",
                            permission.kind,
                            error
                        );
                    }
                }
            }
            None => {
                deferred.register(DeferredPermission {
                    kind_name: permission.kind.clone(),
                    name: permission.name.clone(),
                    actions: permission.actions.clone(),
                    signer_certs: signer_certs.clone(),
                });
            }
        }
    }

    Some(PolicyEntry {
        origin,
        principals: entry.principals.clone(),
        permissions,
        deferred,
    })
}
