//! Token audience (verifier)
//!
//! An [`Audience`] trusts exactly one public key and accepts only tokens
//! addressed to its own name. Checks run in a fixed order and stop at the
//! first failure:
//!
//! 1. the `aud` claim equals the audience name
//! 2. the token is not expired
//! 3. the signature over `canonical(header) ++ canonical(body)` verifies

use std::fmt;

use rsa::RsaPublicKey;
use thiserror::Error;
use tracing::{debug, warn};

use crate::Result;
use crate::signature;
use crate::types::Token;

/// Why a parsed token was not accepted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Token was issued for a different audience
    #[error("audience mismatch: expected '{expected}', token is for '{actual}'")]
    AudienceMismatch {
        /// This audience's name
        expected: String,
        /// The token's `aud` claim
        actual: String,
    },

    /// Token is past its `exp`
    #[error("token expired at {expired_at}")]
    Expired {
        /// The `exp` claim in Unix seconds
        expired_at: i64,
    },

    /// The `exp` claim is not a usable timestamp
    #[error("malformed expiration {value:?}")]
    MalformedExpiration {
        /// The raw `exp` claim
        value: String,
    },

    /// Signature does not match the trusted key
    #[error("invalid signature")]
    InvalidSignature,
}

/// Verifier role
pub struct Audience {
    public_key: RsaPublicKey,
    name: String,
}

impl Audience {
    /// Create an audience named `name` trusting `public_key`
    pub fn new(public_key: RsaPublicKey, name: impl Into<String>) -> Self {
        Self {
            public_key,
            name: name.into(),
        }
    }

    /// Name matched against the `aud` claim
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The trusted public key
    #[must_use]
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Whether `token` is addressed here, fresh and authentic
    #[must_use]
    pub fn is_valid(&self, token: &Token) -> bool {
        self.check(token).is_ok()
    }

    /// Run all checks, reporting the first one that failed
    ///
    /// # Errors
    /// Returns the [`Rejection`] for the first failed check.
    pub fn check(&self, token: &Token) -> std::result::Result<(), Rejection> {
        match self.first_failure(token) {
            None => {
                debug!(audience = %self.name, jti = %token.body.token_id, "Token accepted");
                Ok(())
            }
            Some(rejection) => {
                warn!(
                    audience = %self.name,
                    jti = %token.body.token_id,
                    reason = %rejection,
                    "Token rejected"
                );
                Err(rejection)
            }
        }
    }

    /// Parse a token string and run [`Self::check`] on it
    ///
    /// # Errors
    /// Returns [`crate::JwtError::CannotParse`] for a malformed string and
    /// [`crate::JwtError::Rejected`] when a check fails.
    pub fn parse_and_verify(&self, jwt: &str) -> Result<Token> {
        let token: Token = jwt.parse()?;
        self.check(&token)?;
        Ok(token)
    }

    fn first_failure(&self, token: &Token) -> Option<Rejection> {
        if token.body.audience != self.name {
            return Some(Rejection::AudienceMismatch {
                expected: self.name.clone(),
                actual: token.body.audience.clone(),
            });
        }

        let Ok(expires_at) = token.expires_at() else {
            return Some(Rejection::MalformedExpiration {
                value: token.body.expiration.clone(),
            });
        };
        if chrono::Utc::now() > expires_at {
            return Some(Rejection::Expired {
                expired_at: expires_at.timestamp(),
            });
        }

        // Canonical encoding of a parsed body cannot fail; treat it as a
        // signature mismatch if it ever does.
        match token.signing_input() {
            Ok(bytes) if signature::verify(&bytes, &token.signature, &self.public_key) => None,
            _ => Some(Rejection::InvalidSignature),
        }
    }
}

impl fmt::Debug for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Audience")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
