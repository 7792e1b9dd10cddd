//! RSA-PSS over SHA-256
//!
//! Stateless primitives shared by [`crate::Issuer`] and [`crate::Audience`].
//! The message is hashed once with SHA-256 and the 32-byte digest is what the
//! PSS padding is applied to.
//!
//! Signatures use the largest salt the modulus allows (222 bytes for a
//! 2048-bit key), which is what Go's `rsa.SignPSS` produces with default
//! options. Verification accepts that salt length and the digest-length salt
//! used by JWA `PS256` signers.

use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Pss, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::{JwtError, Result};

/// SHA-256 output size in bytes
pub const DIGEST_LEN: usize = 32;

/// Largest PSS salt for a modulus of `modulus_bits` bits
///
/// `emLen - hLen - 2` where `emLen = ceil((modBits - 1) / 8)`.
#[must_use]
pub fn max_salt_len(modulus_bits: usize) -> usize {
    modulus_bits
        .saturating_sub(1)
        .div_ceil(8)
        .saturating_sub(DIGEST_LEN + 2)
}

/// SHA-256 of `bytes`
#[must_use]
pub fn digest(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Sign `bytes` with RSA-PSS/SHA-256 and a maximal salt
///
/// Randomized: signing the same bytes twice yields different signatures,
/// both of which verify.
///
/// # Errors
/// Returns [`JwtError::Cryptographic`] if the key is unusable for signing.
pub fn sign(bytes: &[u8], private_key: &RsaPrivateKey) -> Result<Vec<u8>> {
    let salt_len = max_salt_len(private_key.n().bits());
    private_key
        .sign_with_rng(
            &mut OsRng,
            Pss::new_with_salt::<Sha256>(salt_len),
            &digest(bytes),
        )
        .map_err(|e| JwtError::Cryptographic {
            reason: format!("RSA-PSS signing failed: {e}"),
        })
}

/// Check an RSA-PSS/SHA-256 signature over `bytes`
///
/// Accepts a maximal salt or a digest-length salt. Any failure (wrong key,
/// truncated or altered signature, altered bytes) is `false`.
#[must_use]
pub fn verify(bytes: &[u8], signature: &[u8], public_key: &RsaPublicKey) -> bool {
    let hashed = digest(bytes);
    let max_salt = max_salt_len(public_key.n().bits());

    [max_salt, DIGEST_LEN].into_iter().any(|salt_len| {
        public_key
            .verify(Pss::new_with_salt::<Sha256>(salt_len), &hashed, signature)
            .is_ok()
    })
}
