// error.rs — Error types for the access-control engine.

use std::path::PathBuf;

use thiserror::Error;

use crate::permission::Kind;

/// Errors surfaced by permission construction and collection mutation.
///
/// Implication queries never produce these: an absent kind, an empty
/// collection, or an unresolved placeholder all evaluate to "not implied".
#[derive(Debug, Error)]
pub enum AccessError {
    /// The permission name is empty or otherwise malformed.
    #[error("invalid permission name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// A code-origin location string could not be parsed.
    #[error("invalid origin location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    /// A permission of the wrong kind was added to a bound collection.
    #[error("cannot add a '{actual}' permission to a collection bound to '{expected}'")]
    KindMismatch { expected: Kind, actual: Kind },

    /// Mutation was attempted after the collection was sealed read-only.
    #[error("collection is sealed read-only")]
    ReadOnlyViolation,

    /// The kind's constructor table has no form compatible with the
    /// given arguments.
    #[error("kind '{kind}' has no constructor accepting the given arguments")]
    MissingConstructor { kind: Kind },
}

/// Errors raised while loading a grants file.
///
/// Per-entry problems (unknown signer names, unparseable origins, permission
/// construction failures) are not errors: those entries are skipped with a
/// warning and the rest of the file still loads.
#[derive(Debug, Error)]
pub enum GrantsError {
    /// The grants file could not be read.
    #[error("failed to read grants file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The grants file is not valid YAML or does not match the schema.
    #[error("failed to parse grants file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A certificate in the directory carries data that is not valid base64.
    #[error("certificate for signer '{signer}' is not valid base64")]
    InvalidCertificate {
        signer: String,
        #[source]
        source: base64::DecodeError,
    },
}
