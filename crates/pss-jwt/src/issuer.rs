//! Token issuer
//!
//! The [`Issuer`] owns a private key and an identity. It mints unsigned
//! [`Token`]s and signs them when turning them into their wire string.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::debug;

use crate::Result;
use crate::signature;
use crate::types::{Body, Token, new_token_id};

/// Signer role
pub struct Issuer {
    private_key: RsaPrivateKey,
    name: String,
}

impl Issuer {
    /// Create an issuer that signs as `name`
    pub fn new(private_key: RsaPrivateKey, name: impl Into<String>) -> Self {
        Self {
            private_key,
            name: name.into(),
        }
    }

    /// Identity written into the `iss` claim
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Public half of the signing key, for distribution to audiences
    #[must_use]
    pub fn public_key(&self) -> RsaPublicKey {
        self.private_key.to_public_key()
    }

    /// Mint an unsigned token for `subject`, addressed to `audience`
    ///
    /// Expires `lifetime` from now (negative lifetimes give an already
    /// expired token, out-of-range ones saturate). The signature is left
    /// empty; use [`Self::stringify`].
    #[must_use]
    pub fn mint_token(&self, subject: &str, audience: &str, lifetime: Duration) -> Token {
        let expiration = Utc::now()
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
            .timestamp();

        let token = Token::new(Body {
            subject: subject.to_string(),
            audience: audience.to_string(),
            issuer: self.name.clone(),
            expiration: expiration.to_string(),
            token_id: new_token_id(),
        });

        debug!(
            issuer = %self.name,
            audience = %audience,
            jti = %token.body.token_id,
            exp = expiration,
            "Minted token"
        );

        token
    }

    /// Sign `token` and encode it as `header.body.signature`
    ///
    /// Every call produces a different signature for the same token; all of
    /// them verify. The token's own `signature` field is ignored.
    ///
    /// # Errors
    /// Returns [`crate::JwtError::Serialization`] or
    /// [`crate::JwtError::Cryptographic`] if encoding or signing fails.
    pub fn stringify(&self, token: &Token) -> Result<String> {
        let signing_input = token.signing_input()?;
        let signature = signature::sign(&signing_input, &self.private_key)?;
        let (header, body) = signing_input.split_at(token.header.to_bytes()?.len());

        debug!(
            issuer = %self.name,
            jti = %token.body.token_id,
            "Signed token"
        );

        Ok([
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(body),
            URL_SAFE_NO_PAD.encode(signature),
        ]
        .join("."))
    }
}

impl fmt::Debug for Issuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Issuer")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
