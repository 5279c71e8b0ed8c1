// cert.rs — Certificate identities and signer chains.
//
// The engine treats certificates as opaque identities: equality is decided
// by the encoded bytes alone, and no cryptographic validation happens here.
// A signer identity is an ordered certificate chain, leaf first, root last.
// The chain segmentation helper regroups a flat certificate list into
// per-signer chains by issuer-to-subject linkage. It is a grouping
// convenience only and must never feed a trust decision.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An opaque certificate identity.
///
/// `subject` and `issuer` are distinguished-name strings used for chain
/// grouping; `encoded` is the certificate's encoded form and is the sole
/// input to equality and hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    subject: String,
    issuer: String,
    encoded: Vec<u8>,
}

impl Certificate {
    pub fn new(
        subject: impl Into<String>,
        issuer: impl Into<String>,
        encoded: Vec<u8>,
    ) -> Self {
        Self {
            subject: subject.into(),
            issuer: issuer.into(),
            encoded,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    pub fn is_self_signed(&self) -> bool {
        self.subject == self.issuer
    }

    /// Lowercase hex SHA-256 of the encoded form.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.encoded);
        format!("{:x}", hasher.finalize())
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for Certificate {}

impl std::hash::Hash for Certificate {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.encoded.hash(state);
    }
}

/// An ordered certificate chain asserting one signer, leaf first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignerIdentity {
    chain: Vec<Certificate>,
}

impl SignerIdentity {
    pub fn new(chain: Vec<Certificate>) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &[Certificate] {
        &self.chain
    }

    /// The leaf certificate, the signer itself.
    pub fn signer(&self) -> Option<&Certificate> {
        self.chain.first()
    }
}

/// Whether every certificate in `required` appears somewhere in `present`.
///
/// Order-independent; duplicates are irrelevant. An empty `required` set
/// matches unconditionally.
pub fn contains_all(present: &[Certificate], required: &[Certificate]) -> bool {
    required.iter().all(|cert| present.contains(cert))
}

/// Regroup a flat, leaf-first certificate list into per-signer chains.
///
/// A chain extends while each certificate's issuer equals the next
/// certificate's subject; the first certificate that breaks the linkage
/// starts a new signer. Best-effort reconstruction with no validation.
pub fn group_chains(certs: &[Certificate]) -> Vec<SignerIdentity> {
    let mut signers = Vec::new();
    let mut i = 0;
    while i < certs.len() {
        let start = i;
        while i + 1 < certs.len() && certs[i].issuer() == certs[i + 1].subject() {
            i += 1;
        }
        signers.push(SignerIdentity::new(certs[start..=i].to_vec()));
        i += 1;
    }
    signers
}

/// The leaf certificate of every reconstructed chain.
pub fn signer_certificates(certs: &[Certificate]) -> Vec<Certificate> {
    group_chains(certs)
        .into_iter()
        .filter_map(|signer| signer.signer().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cert(subject: &str, issuer: &str) -> Certificate {
        Certificate::new(subject, issuer, format!("{subject}|{issuer}").into_bytes())
    }

    #[test]
    fn equality_is_by_encoded_bytes() {
        let a = Certificate::new("CN=A", "CN=Root", vec![1, 2, 3]);
        let b = Certificate::new("CN=Other", "CN=Elsewhere", vec![1, 2, 3]);
        let c = Certificate::new("CN=A", "CN=Root", vec![9]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = cert("CN=A", "CN=Root").fingerprint();
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn contains_all_is_order_independent() {
        let a = cert("CN=A", "CN=Root");
        let b = cert("CN=B", "CN=Root");
        let c = cert("CN=C", "CN=Root");
        assert!(contains_all(&[b.clone(), a.clone(), c.clone()], &[a.clone(), b.clone()]));
        assert!(!contains_all(&[a.clone(), b], &[c]));
        assert!(contains_all(&[], &[]));
        assert!(contains_all(&[a], &[]));
    }

    #[test]
    fn chains_split_on_broken_linkage() {
        // leaf-a -> intermediate -> root, then an unrelated leaf-b chain.
        let leaf_a = cert("CN=LeafA", "CN=Intermediate");
        let intermediate = cert("CN=Intermediate", "CN=Root");
        let root = cert("CN=Root", "CN=Root");
        let leaf_b = cert("CN=LeafB", "CN=OtherRoot");

        let signers = group_chains(&[
            leaf_a.clone(),
            intermediate.clone(),
            root.clone(),
            leaf_b.clone(),
        ]);
        assert_eq!(signers.len(), 2);
        assert_eq!(signers[0].chain().len(), 3);
        assert_eq!(signers[0].signer(), Some(&leaf_a));
        assert_eq!(signers[1].chain().len(), 1);
        assert_eq!(signers[1].signer(), Some(&leaf_b));
    }

    #[test]
    fn signer_certificates_returns_leaves_only() {
        let leaf_a = cert("CN=LeafA", "CN=Root");
        let root = cert("CN=Root", "CN=Root");
        let leaf_b = cert("CN=LeafB", "CN=OtherRoot");

        let leaves = signer_certificates(&[leaf_a.clone(), root, leaf_b.clone()]);
        assert_eq!(leaves, vec![leaf_a, leaf_b]);
    }

    #[test]
    fn empty_list_groups_to_no_signers() {
        assert!(group_chains(&[]).is_empty());
    }
}
