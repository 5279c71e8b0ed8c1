// grant_flow.rs — End-to-end integration test for the access engine.
//
// This test exercises the complete flow:
//
//   1. Write a grants file: an origin-scoped entry, a signed entry whose
//      permission kind is not yet registered, and a catch-all entry.
//   2. Load it into a GrantsPolicy (unknown kind becomes a placeholder).
//   3. Evaluate through AccessEvaluator for matching and non-matching
//      origins.
//   4. Register the missing kind and resolve the placeholder against the
//      right and wrong certificate contexts.
//   5. Prove the static catch-all short-circuit never consults the policy.
//
// VERIFY:
//   - Origin-scoped grants apply only inside their origin.
//   - The deferred grant implies nothing until resolved, then applies.
//   - Resolution is gated on the entry's signer certificates.
//   - A static catch-all answers without a policy round trip.
//   - Merged listings suppress duplicate grants.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::NamedTempFile;

use ta_access::{
    AccessEvaluator, AllPermission, Certificate, CodeOrigin, CollectionStrategy, ConstructorTable,
    EvaluationContext, GrantsPolicy, HierarchicalName, Kind, KindBinding, KindRegistry, OriginUrl,
    Permission, PermissionSet, Policy, ScopePermission, SharedPermission,
};

const GRANTS_YAML: &str = r#"
certificates:
  vendor-a:
    subject: "CN=Vendor A"
    issuer: "CN=Trusted Autonomy Root"
    data: "dmVuZG9yLWEtY2VydA=="
grants:
  - origin: "https://plugins.example.com/approved/*"
    permissions:
      - kind: access.scope
        name: "fs.read.*"
      - kind: access.resource
        name: "db/main"
        actions: "read"
  - signed_by: [vendor-a]
    permissions:
      - kind: plugin.registry
        name: "publish.*"
  - origin: "file:/workspace/trusted/-"
    permissions:
      - kind: access.all
"#;

/// The certificate bytes behind the base64 blob in GRANTS_YAML.
const VENDOR_A_DATA: &[u8] = b"vendor-a-cert";

fn context_at(origin: &str) -> EvaluationContext {
    EvaluationContext::new(
        CodeOrigin::unsigned(Some(OriginUrl::parse(origin).unwrap())),
        Vec::new(),
    )
}

fn scope(name: &str) -> ScopePermission {
    ScopePermission::new(name).unwrap()
}

/// A permission kind that is not registered when the grants file loads.
#[derive(Debug, Clone)]
struct PluginPermission {
    name: String,
    parsed: HierarchicalName,
}

impl PluginPermission {
    const KIND: Kind = Kind::new("plugin.registry");

    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parsed: HierarchicalName::parse(name).unwrap(),
        }
    }
}

impl Permission for PluginPermission {
    fn kind(&self) -> Kind {
        Self::KIND
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn implies(&self, candidate: &dyn Permission) -> bool {
        candidate.kind() == Self::KIND
            && HierarchicalName::parse(candidate.name())
                .map(|parsed| self.parsed.implies(&parsed))
                .unwrap_or(false)
    }
}

/// Policy stub that panics when consulted; proves short-circuits hold.
struct UntouchablePolicy {
    calls: AtomicUsize,
}

impl UntouchablePolicy {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl Policy for UntouchablePolicy {
    fn implies(&self, _context: &EvaluationContext, _permission: &dyn Permission) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("policy must not be consulted past a static catch-all");
    }
}

#[test]
fn full_grant_flow_load_defer_resolve_evaluate() {
    // =========================================================
    // SETUP: grants file on disk, registry with built-in kinds
    // =========================================================
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(GRANTS_YAML.as_bytes()).unwrap();

    let kinds = Arc::new(KindRegistry::with_builtins());
    let policy = Arc::new(GrantsPolicy::from_path(file.path(), Arc::clone(&kinds)).unwrap());

    // All three entries loaded; the plugin.registry grant is deferred.
    assert_eq!(policy.entry_count(), 3);
    assert_eq!(policy.pending_deferred(), 1);

    // =========================================================
    // STEP 1: origin-scoped grants through an evaluator
    // =========================================================
    let inside = AccessEvaluator::with_policy(
        context_at("https://plugins.example.com/approved/core.wasm"),
        None,
        policy.clone() as Arc<dyn Policy>,
    );
    assert!(inside.implies(&scope("fs.read.config")));
    assert!(!inside.implies(&scope("fs.write")));

    let outside = AccessEvaluator::with_policy(
        context_at("https://elsewhere.example.com/core.wasm"),
        None,
        policy.clone() as Arc<dyn Policy>,
    );
    assert!(!outside.implies(&scope("fs.read.config")));

    // The catch-all entry covers its own subtree only.
    let trusted = AccessEvaluator::with_policy(
        context_at("file:/workspace/trusted/tool.wasm"),
        None,
        policy.clone() as Arc<dyn Policy>,
    );
    assert!(trusted.implies(&scope("absolutely.anything")));

    // =========================================================
    // STEP 2: the deferred grant implies nothing before resolution
    // =========================================================
    let vendor_cert = Certificate::new(
        "CN=Vendor A",
        "CN=Trusted Autonomy Root",
        VENDOR_A_DATA.to_vec(),
    );
    let signed = AccessEvaluator::with_policy(
        EvaluationContext::new(
            CodeOrigin::with_certificates(None, vec![vendor_cert.clone()]),
            Vec::new(),
        ),
        None,
        policy.clone() as Arc<dyn Policy>,
    );
    assert!(!signed.implies(&PluginPermission::new("publish.core")));

    // =========================================================
    // STEP 3: register the kind, resolve against certificate contexts
    // =========================================================
    kinds.register(
        PluginPermission::KIND,
        KindBinding {
            strategy: CollectionStrategy::WildcardName,
            constructors: ConstructorTable {
                name_only: Some(|name| {
                    Ok(Arc::new(PluginPermission {
                        name: name.to_string(),
                        parsed: HierarchicalName::parse(name)?,
                    }) as SharedPermission)
                }),
                ..ConstructorTable::default()
            },
        },
    );

    // Wrong certificate context: nothing resolves, placeholder survives.
    let stranger = Certificate::new("CN=Stranger", "CN=Elsewhere", b"stranger".to_vec());
    assert_eq!(policy.resolve_deferred(PluginPermission::KIND, &[stranger]), 0);
    assert_eq!(policy.pending_deferred(), 1);
    assert!(!signed.implies(&PluginPermission::new("publish.core")));

    // Matching context consumes the placeholder.
    assert_eq!(
        policy.resolve_deferred(PluginPermission::KIND, &[vendor_cert]),
        1
    );
    assert_eq!(policy.pending_deferred(), 0);
    assert!(signed.implies(&PluginPermission::new("publish.core")));
    assert!(signed.implies(&PluginPermission::new("publish.core.nightly")));
    assert!(!signed.implies(&PluginPermission::new("publish")));

    // An unsigned context still gets nothing from the signed entry.
    let unsigned = AccessEvaluator::with_policy(
        EvaluationContext::new(CodeOrigin::unsigned(None), Vec::new()),
        None,
        policy.clone() as Arc<dyn Policy>,
    );
    assert!(!unsigned.implies(&PluginPermission::new("publish.core")));
}

#[test]
fn static_catch_all_never_touches_the_policy() {
    let kinds = Arc::new(KindRegistry::with_builtins());
    let statics = PermissionSet::new(kinds);
    statics.add(Arc::new(AllPermission::new())).unwrap();

    let untouchable = Arc::new(UntouchablePolicy::new());
    let evaluator = AccessEvaluator::with_policy(
        EvaluationContext::new(CodeOrigin::unsigned(None), Vec::new()),
        Some(statics),
        untouchable.clone() as Arc<dyn Policy>,
    );

    assert!(evaluator.implies(&scope("any.name.at.all")));
    assert!(evaluator.implies(&PluginPermission::new("publish.core")));
    assert_eq!(untouchable.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn merged_listing_unions_static_and_policy_grants() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(GRANTS_YAML.as_bytes()).unwrap();

    let kinds = Arc::new(KindRegistry::with_builtins());
    let policy = Arc::new(GrantsPolicy::from_path(file.path(), Arc::clone(&kinds)).unwrap());

    // Static set repeats one of the policy's grants.
    let statics = PermissionSet::new(Arc::clone(&kinds));
    statics.add(Arc::new(scope("fs.read.*"))).unwrap();
    statics.add(Arc::new(scope("net.connect"))).unwrap();

    let evaluator = AccessEvaluator::with_policy(
        context_at("https://plugins.example.com/approved/core.wasm"),
        Some(statics),
        policy as Arc<dyn Policy>,
    );

    let merged = evaluator.merged_permissions();
    let mut names: Vec<String> = merged
        .iter()
        .map(|p| format!("{}:{}", p.kind(), p.name()))
        .collect();
    names.sort();
    // fs.read.* appears in both sources but is listed once.
    assert_eq!(
        names,
        vec![
            "access.resource:db/main".to_string(),
            "access.scope:fs.read.*".to_string(),
            "access.scope:net.connect".to_string(),
        ]
    );
}
