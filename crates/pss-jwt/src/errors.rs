//! Error types for token and key operations

use std::path::PathBuf;

use thiserror::Error;

use crate::audience::Rejection;

/// Errors produced while minting, parsing, signing or loading keys
///
/// Signature verification never produces an error: a bad signature is an
/// ordinary `false` from [`crate::Audience::is_valid`].
#[derive(Debug, Error)]
pub enum JwtError {
    /// The token string is not three base64url segments with a claim body
    #[error("Invalid JWT string: {reason}")]
    CannotParse {
        /// What was wrong with the input
        reason: String,
    },

    /// A claim holds a value that cannot be interpreted
    #[error("Malformed claim '{claim}': {value:?}")]
    MalformedClaim {
        /// Claim name as it appears on the wire
        claim: &'static str,
        /// The raw claim value
        value: String,
    },

    /// Canonical encoding of a header, body or token failed
    #[error("Serialization failed: {reason}")]
    Serialization {
        /// Underlying encoder message
        reason: String,
    },

    /// Key generation or signing failed
    #[error("Cryptographic operation failed: {reason}")]
    Cryptographic {
        /// Underlying crypto message
        reason: String,
    },

    /// A key could not be marshaled to or parsed from PKCS#1 DER
    #[error("Invalid key encoding: {reason}")]
    KeyEncoding {
        /// Underlying DER message
        reason: String,
    },

    /// Reading or writing a key file failed
    #[error("Key file I/O failed for {}: {source}", path.display())]
    KeyIo {
        /// Key file location
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Fetching a public key over the network failed
    #[error("Failed to fetch public key from {url}: {reason}")]
    KeyFetch {
        /// Requested URL
        url: String,
        /// Transport or status failure
        reason: String,
    },

    /// A role configuration is not usable
    #[error("Invalid configuration: {reason}")]
    Configuration {
        /// What is missing or invalid
        reason: String,
    },

    /// A token parsed correctly but failed audience checks
    #[error("Token rejected: {0}")]
    Rejected(#[from] Rejection),

    /// Internal failure unrelated to the input
    #[error("Internal error: {reason}")]
    Internal {
        /// Description of the failure
        reason: String,
    },
}

impl JwtError {
    pub(crate) fn cannot_parse(reason: impl Into<String>) -> Self {
        Self::CannotParse {
            reason: reason.into(),
        }
    }

    pub(crate) fn key_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::KeyIo {
            path: path.into(),
            source,
        }
    }
}
