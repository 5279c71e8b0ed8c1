// origin.rs — Code origins and origin implication.
//
// A code origin attributes code to a location and to the signers that
// vouch for it. Signers are carried either as ordered certificate chains
// or, in already-resolved form, as a flat certificate list. An origin with
// no location and no signer identities is universal: it implies every
// other origin.

use serde::{Deserialize, Serialize};

use crate::cert::{signer_certificates, Certificate, SignerIdentity};
use crate::location::OriginUrl;

/// Certificate comparison mode for [`CodeOrigin::match_certs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertMatch {
    /// Equal cardinality and one-to-one presence. Used for origin equality.
    Strict,
    /// Every granted certificate present somewhere in the candidate's set.
    /// Used for implication.
    Subset,
}

/// A location plus the signer identities attributed to code from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeOrigin {
    location: Option<OriginUrl>,
    signers: Option<Vec<SignerIdentity>>,
    certs: Option<Vec<Certificate>>,
}

impl CodeOrigin {
    /// An origin with no signer identities at all. With a `None` location
    /// this is the universal origin.
    pub fn unsigned(location: Option<OriginUrl>) -> Self {
        Self {
            location,
            signers: None,
            certs: None,
        }
    }

    /// An origin carrying a flat, already-resolved certificate list.
    pub fn with_certificates(location: Option<OriginUrl>, certs: Vec<Certificate>) -> Self {
        Self {
            location,
            signers: None,
            certs: Some(certs),
        }
    }

    /// An origin carrying per-signer certificate chains.
    pub fn with_signers(location: Option<OriginUrl>, signers: Vec<SignerIdentity>) -> Self {
        Self {
            location,
            signers: Some(signers),
            certs: None,
        }
    }

    pub fn location(&self) -> Option<&OriginUrl> {
        self.location.as_ref()
    }

    pub fn certificates(&self) -> Option<&[Certificate]> {
        self.certs.as_deref()
    }

    pub fn signers(&self) -> Option<&[SignerIdentity]> {
        self.signers.as_deref()
    }

    /// The leaf certificate of each signer attributed to this origin,
    /// reconstructing chains from the flat form when needed.
    pub fn signer_leaf_certificates(&self) -> Vec<Certificate> {
        if let Some(signers) = &self.signers {
            return signers
                .iter()
                .filter_map(|signer| signer.signer().cloned())
                .collect();
        }
        if let Some(certs) = &self.certs {
            return signer_certificates(certs);
        }
        Vec::new()
    }

    /// Compare signer identities with the candidate.
    ///
    /// An origin with neither certificates nor signer chains matches any
    /// key: under `Subset` it matches every candidate, under `Strict` only
    /// candidates that are equally unsigned. Otherwise both sides must
    /// carry the same shape (chains against chains, flat against flat);
    /// comparison is unordered and duplicate-insensitive.
    pub fn match_certs(&self, candidate: &CodeOrigin, mode: CertMatch) -> bool {
        if self.certs.is_none() && self.signers.is_none() {
            return match mode {
                CertMatch::Strict => candidate.certs.is_none() && candidate.signers.is_none(),
                CertMatch::Subset => true,
            };
        }

        if let (Some(granted), Some(candidate)) = (&self.signers, &candidate.signers) {
            if mode == CertMatch::Strict && granted.len() != candidate.len() {
                return false;
            }
            return granted.iter().all(|signer| candidate.contains(signer));
        }

        if let (Some(granted), Some(candidate)) = (&self.certs, &candidate.certs) {
            if mode == CertMatch::Strict && granted.len() != candidate.len() {
                return false;
            }
            return granted.iter().all(|cert| candidate.contains(cert));
        }

        false
    }

    /// Whether every capability attributed to the candidate origin is
    /// already covered by this (granted) origin: its signers subsume the
    /// candidate's and, when this origin pins a location, the candidate's
    /// location is contained in it.
    pub fn implies(&self, candidate: &CodeOrigin) -> bool {
        self.match_certs(candidate, CertMatch::Subset) && self.match_location(candidate)
    }

    fn match_location(&self, candidate: &CodeOrigin) -> bool {
        match &self.location {
            None => true,
            Some(granted) => match &candidate.location {
                None => false,
                Some(candidate) => granted.implies(candidate),
            },
        }
    }
}
