//! # pss-jwt
//!
//! Compact signed tokens in the JWT wire shape, signed with RSA-PSS over
//! SHA-256. Two roles share a key pair:
//!
//! - an [`Issuer`] owns the private key, mints tokens for a subject and an
//!   audience, and signs them into `b64url(header).b64url(body).b64url(sig)`
//! - an [`Audience`] trusts one public key and accepts a token only if it is
//!   addressed to it, not expired, and carries a valid signature
//!
//! Keys are 2048-bit RSA stored as PKCS#1 DER. A [`KeyManager`] loads key
//! files, creating them on first use, and caches their bytes per path.
//!
//! ## Architecture
//!
//! - `types` - Header, claims and token, canonical encoding and parsing
//! - `signature` - RSA-PSS/SHA-256 sign and verify
//! - `keys` - Key generation, PKCS#1 marshaling, key files and key fetch
//! - `issuer` / `audience` - The two roles
//! - `config` - Serializable role configuration
//! - `errors` - Error types
//!
//! ## Example
//!
//! ```no_run
//! use pss_jwt::{Audience, Issuer, KeyManager};
//!
//! # async fn run() -> pss_jwt::Result<()> {
//! let keys = KeyManager::new();
//! let private_key = keys.load_private_key("auth.der").await?;
//!
//! let issuer = Issuer::new(private_key, "auth");
//! let audience = Audience::new(issuer.public_key(), "inventory");
//!
//! let token = issuer.mint_token("alice", "inventory", chrono::Duration::minutes(5));
//! let jwt = issuer.stringify(&token)?;
//!
//! let verified = audience.parse_and_verify(&jwt)?;
//! assert_eq!(verified.body.subject, "alice");
//! # Ok(())
//! # }
//! ```
//!
//! Note that the header is fixed: parsing never reads `alg` or `typ` from the
//! wire, and `alg` is written as `RS256` even though the scheme is PSS.
//! Standard JWT libraries expecting PKCS#1 v1.5 for `RS256` will not verify
//! these tokens.

pub mod audience;
pub mod config;
pub mod errors;
pub mod issuer;
pub mod keys;
pub mod signature;
pub mod types;

pub use audience::{Audience, Rejection};
pub use config::{AudienceConfig, IssuerConfig, PublicKeySource};
pub use errors::JwtError;
pub use issuer::Issuer;
pub use keys::{
    DEFAULT_FETCH_TIMEOUT, KeyManager, RSA_KEY_BITS, fetch_public_key, generate_private_key,
    marshal_private_key, marshal_public_key, parse_private_key, parse_public_key, save_bytes,
};
pub use types::{Body, Header, Token};

/// Crate result type
pub type Result<T> = std::result::Result<T, JwtError>;

/// Value of the `alg` header field
pub const ALGORITHM: &str = "RS256";

/// Value of the `typ` header field
pub const TOKEN_TYPE: &str = "JWT";
