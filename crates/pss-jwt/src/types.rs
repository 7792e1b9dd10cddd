//! Token data model
//!
//! [`Header`], [`Body`] and [`Token`], their canonical JSON bytes, and the
//! parser for the three-part wire form. The canonical bytes of header and
//! body are what gets signed, so their encoding must be byte-for-byte
//! reproducible: fields are emitted in declaration order with no
//! whitespace, and strings are escaped the way Go's `encoding/json` escapes
//! them (`<`, `>`, `&`, U+2028 and U+2029 become `\uXXXX`), so tokens signed
//! by Go issuers re-encode to the bytes they signed.

use std::fmt;
use std::io;
use std::str::FromStr;

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::ser::Formatter;

use crate::{ALGORITHM, JwtError, Result, TOKEN_TYPE};

/// Number of random bytes in a token id
pub const TOKEN_ID_BYTES: usize = 16;

/// JWT header
///
/// Always the single supported `{"alg":"RS256","typ":"JWT"}` pair. The
/// fields are private so no other pair can be built, and parsing never
/// reads a header from the wire: trusting wire header fields would open the
/// door to algorithm confusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Header {
    #[serde(rename = "alg")]
    algorithm: &'static str,

    #[serde(rename = "typ")]
    token_type: &'static str,
}

impl Header {
    /// The constant header
    #[must_use]
    pub const fn new() -> Self {
        Self {
            algorithm: ALGORITHM,
            token_type: TOKEN_TYPE,
        }
    }

    /// Algorithm identifier (`alg`)
    #[must_use]
    pub fn algorithm(&self) -> &'static str {
        self.algorithm
    }

    /// Token type identifier (`typ`)
    #[must_use]
    pub fn token_type(&self) -> &'static str {
        self.token_type
    }

    /// Canonical JSON bytes
    ///
    /// # Errors
    /// Returns [`JwtError::Serialization`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        to_canonical_bytes(self, "header")
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

/// Token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    /// Subject the token was issued to
    #[serde(rename = "sub")]
    pub subject: String,

    /// Intended recipient
    #[serde(rename = "aud")]
    pub audience: String,

    /// Signer identity
    #[serde(rename = "iss")]
    pub issuer: String,

    /// Expiration as decimal Unix seconds
    #[serde(rename = "exp")]
    pub expiration: String,

    /// Unique token id (32 uppercase hex characters)
    #[serde(rename = "jti")]
    pub token_id: String,
}

impl Body {
    /// Canonical JSON bytes
    ///
    /// # Errors
    /// Returns [`JwtError::Serialization`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        to_canonical_bytes(self, "body")
    }
}

/// Header, claims and signature
///
/// A freshly minted token has an empty signature; the signature only
/// exists in the string produced by [`crate::Issuer::stringify`]. A parsed
/// token carries the wire signature but has not been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Token {
    /// Constant header
    pub header: Header,

    /// Claims
    pub body: Body,

    /// Raw signature bytes
    #[serde(serialize_with = "serialize_signature")]
    pub signature: Vec<u8>,
}

impl Token {
    /// Unsigned token with the constant header
    #[must_use]
    pub fn new(body: Body) -> Self {
        Self {
            header: Header::new(),
            body,
            signature: Vec::new(),
        }
    }

    /// Canonical JSON bytes of the whole token, signature as standard base64
    ///
    /// # Errors
    /// Returns [`JwtError::Serialization`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        to_canonical_bytes(self, "token")
    }

    /// The bytes covered by the signature: `canonical(header) ++ canonical(body)`
    ///
    /// # Errors
    /// Returns [`JwtError::Serialization`] if encoding fails.
    pub fn signing_input(&self) -> Result<Vec<u8>> {
        let mut bytes = self.header.to_bytes()?;
        bytes.extend_from_slice(&self.body.to_bytes()?);
        Ok(bytes)
    }

    /// Expiration time from the `exp` claim
    ///
    /// # Errors
    /// Returns [`JwtError::MalformedClaim`] if `exp` is not an integer or is
    /// outside the representable time range.
    pub fn expires_at(&self) -> Result<DateTime<Utc>> {
        let malformed = || JwtError::MalformedClaim {
            claim: "exp",
            value: self.body.expiration.clone(),
        };

        let seconds: i64 = self.body.expiration.parse().map_err(|_| malformed())?;
        DateTime::from_timestamp(seconds, 0).ok_or_else(malformed)
    }

    /// Whether the current time is strictly after the expiration
    ///
    /// # Errors
    /// Returns [`JwtError::MalformedClaim`] if `exp` cannot be read; such a
    /// token must be treated as unusable.
    pub fn expired(&self) -> Result<bool> {
        Ok(Utc::now() > self.expires_at()?)
    }
}

impl FromStr for Token {
    type Err = JwtError;

    /// Parse `header.body.signature` without verifying it
    ///
    /// The header segment is ignored and the constant [`Header`] is used.
    /// Body and signature must be unpadded base64url, and the body must hold
    /// all five claims.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        let [_header, body, signature] = parts.as_slice() else {
            return Err(JwtError::cannot_parse(format!(
                "expected 3 parts, got {}",
                parts.len()
            )));
        };

        let body = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|e| JwtError::cannot_parse(format!("body is not base64url: {e}")))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| JwtError::cannot_parse(format!("signature is not base64url: {e}")))?;

        let body: Body = serde_json::from_slice(&body)
            .map_err(|e| JwtError::cannot_parse(format!("invalid claims: {e}")))?;

        Ok(Self {
            header: Header::new(),
            body,
            signature,
        })
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.algorithm, self.token_type)
    }
}

/// Fresh token id: 16 bytes from the OS RNG as uppercase hex
#[must_use]
pub fn new_token_id() -> String {
    let mut bytes = [0u8; TOKEN_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode_upper(bytes)
}

fn to_canonical_bytes<T: Serialize>(value: &T, what: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(128);
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut bytes, GoCompatibleFormatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| JwtError::Serialization {
            reason: format!("Failed to serialize {what}: {e}"),
        })?;
    Ok(bytes)
}

/// Compact JSON with the extra string escapes applied by Go's `json.Marshal`
struct GoCompatibleFormatter;

impl Formatter for GoCompatibleFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (index, ch) in fragment.char_indices() {
            let escape = match ch {
                '<' => "\\u003c",
                '>' => "\\u003e",
                '&' => "\\u0026",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };
            writer.write_all(&fragment.as_bytes()[start..index])?;
            writer.write_all(escape.as_bytes())?;
            start = index + ch.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}

fn serialize_signature<S: Serializer>(
    signature: &[u8],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(signature))
}
