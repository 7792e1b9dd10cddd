//! RSA key management
//!
//! This module provides key generation, PKCS#1 DER marshaling and the
//! [`KeyManager`], which loads key files (creating them on first use) and
//! caches their raw bytes per path for the lifetime of the manager.

use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use rsa::pkcs1::{
    DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey,
};
use rsa::{RsaPrivateKey, RsaPublicKey};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, error, info, warn};

use crate::{JwtError, Result};

/// Modulus size of generated keys
pub const RSA_KEY_BITS: usize = 2048;

/// Timeout used by configuration when none is given for a key fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Generate a fresh 2048-bit RSA private key
///
/// CPU bound; async callers should run it on the blocking pool, as
/// [`KeyManager::load_key_bytes`] does.
///
/// # Errors
/// Returns [`JwtError::Cryptographic`] if generation fails (e.g. the OS
/// entropy source is unavailable).
pub fn generate_private_key() -> Result<RsaPrivateKey> {
    RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS).map_err(|e| JwtError::Cryptographic {
        reason: format!("Failed to generate RSA key: {e}"),
    })
}

/// Encode a private key as PKCS#1 DER
///
/// # Errors
/// Returns [`JwtError::KeyEncoding`] if the key cannot be encoded.
pub fn marshal_private_key(key: &RsaPrivateKey) -> Result<Vec<u8>> {
    key.to_pkcs1_der()
        .map(|der| der.as_bytes().to_vec())
        .map_err(|e| JwtError::KeyEncoding {
            reason: format!("Failed to encode RSA private key: {e}"),
        })
}

/// Decode a PKCS#1 DER private key
///
/// # Errors
/// Returns [`JwtError::KeyEncoding`] if `bytes` is not a PKCS#1 DER key.
pub fn parse_private_key(bytes: &[u8]) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs1_der(bytes).map_err(|e| JwtError::KeyEncoding {
        reason: format!("Invalid PKCS#1 private key: {e}"),
    })
}

/// Encode a public key as PKCS#1 DER
///
/// # Errors
/// Returns [`JwtError::KeyEncoding`] if the key cannot be encoded.
pub fn marshal_public_key(key: &RsaPublicKey) -> Result<Vec<u8>> {
    key.to_pkcs1_der()
        .map(|der| der.as_bytes().to_vec())
        .map_err(|e| JwtError::KeyEncoding {
            reason: format!("Failed to encode RSA public key: {e}"),
        })
}

/// Decode a PKCS#1 DER public key
///
/// # Errors
/// Returns [`JwtError::KeyEncoding`] if `bytes` is not a PKCS#1 DER key.
pub fn parse_public_key(bytes: &[u8]) -> Result<RsaPublicKey> {
    RsaPublicKey::from_pkcs1_der(bytes).map_err(|e| JwtError::KeyEncoding {
        reason: format!("Invalid PKCS#1 public key: {e}"),
    })
}

/// Write `bytes` to a new file at `path`
///
/// The bytes go to a temporary file in the same directory which is then
/// moved into place without replacing anything, so `path` either does not
/// exist or holds the complete contents. A failed write leaves no file
/// behind.
///
/// # Errors
/// Never overwrites: if the file already exists this fails with a
/// [`JwtError::KeyIo`] whose source kind is [`ErrorKind::AlreadyExists`].
/// Other I/O failures are also [`JwtError::KeyIo`].
pub async fn save_bytes(bytes: &[u8], path: impl AsRef<Path>) -> Result<()> {
    let bytes = bytes.to_vec();
    let path = path.as_ref().to_path_buf();

    tokio::task::spawn_blocking(move || write_new_file(&bytes, &path))
        .await
        .map_err(|e| JwtError::Internal {
            reason: format!("Key file write task failed: {e}"),
        })?
}

fn write_new_file(bytes: &[u8], path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // Dropping the temp file on any early return removes it.
    let mut file = tempfile::Builder::new()
        .prefix(".key-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| JwtError::key_io(path, e))?;
    file.write_all(bytes).map_err(|e| JwtError::key_io(path, e))?;
    file.as_file()
        .sync_all()
        .map_err(|e| JwtError::key_io(path, e))?;

    file.persist_noclobber(path)
        .map_err(|e| JwtError::key_io(path, e.error))?;
    Ok(())
}

/// Fetch a PKCS#1 DER public key with a single GET request
///
/// No caching and no retry. The response body is trusted only as far as the
/// transport is; key provenance must be established out of band.
///
/// # Errors
/// Returns [`JwtError::KeyFetch`] on transport failure, timeout or a
/// non-success status, and [`JwtError::KeyEncoding`] if the body is not a
/// public key.
pub async fn fetch_public_key(url: &str, timeout: Duration) -> Result<RsaPublicKey> {
    if !url.starts_with("https://") {
        warn!(url = %url, "Fetching public key without TLS");
    }

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| JwtError::KeyFetch {
            url: url.to_string(),
            reason: format!("Failed to create HTTP client: {e}"),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        error!(url = %url, error = %e, "Failed to fetch public key");
        JwtError::KeyFetch {
            url: url.to_string(),
            reason: e.to_string(),
        }
    })?;

    if !response.status().is_success() {
        error!(
            url = %url,
            status = %response.status(),
            "Key endpoint returned error status"
        );
        return Err(JwtError::KeyFetch {
            url: url.to_string(),
            reason: format!("status {}", response.status()),
        });
    }

    let body = response.bytes().await.map_err(|e| JwtError::KeyFetch {
        url: url.to_string(),
        reason: format!("Failed to read response body: {e}"),
    })?;

    let key = parse_public_key(&body)?;
    debug!(url = %url, "Fetched public key");
    Ok(key)
}

/// Loads key files and caches their bytes
///
/// Each path is initialised at most once per manager: concurrent first
/// loads of the same path wait on a single load-or-create, so exactly one
/// key is generated and written. Entries are never evicted. Construct one
/// manager at startup and share it by reference (or `Arc`).
#[derive(Debug, Default)]
pub struct KeyManager {
    cache: RwLock<HashMap<PathBuf, Arc<OnceCell<Vec<u8>>>>>,
}

impl KeyManager {
    /// Create a manager with an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw key bytes for `path`, creating a new private key file if none exists
    ///
    /// Cache first. On a miss, an absent file gets a freshly generated
    /// PKCS#1 DER private key which is persisted and then read back from
    /// disk; an existing file is read as is. The bytes are not parsed.
    ///
    /// A failed load leaves the path uncached, so a later call tries again.
    ///
    /// # Errors
    /// Returns [`JwtError::KeyIo`] if the file cannot be read or created.
    pub async fn load_key_bytes(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = path.as_ref();
        let cell = self.cell_for(path).await;

        if let Some(bytes) = cell.get() {
            debug!(path = %path.display(), "Using cached key bytes");
            return Ok(bytes.clone());
        }

        let bytes = cell.get_or_try_init(|| load_or_create(path)).await?;
        Ok(bytes.clone())
    }

    /// Load (or create) the private key stored at `path`
    ///
    /// # Errors
    /// Returns the [`Self::load_key_bytes`] error, or
    /// [`JwtError::KeyEncoding`] if the file is not a private key.
    pub async fn load_private_key(&self, path: impl AsRef<Path>) -> Result<RsaPrivateKey> {
        parse_private_key(&self.load_key_bytes(path).await?)
    }

    /// Public half of the private key stored at `path`
    ///
    /// # Errors
    /// Same as [`Self::load_private_key`].
    pub async fn load_public_key(&self, path: impl AsRef<Path>) -> Result<RsaPublicKey> {
        Ok(self.load_private_key(path).await?.to_public_key())
    }

    /// Whether bytes for `path` are already cached
    pub async fn is_cached(&self, path: impl AsRef<Path>) -> bool {
        self.cache
            .read()
            .await
            .get(path.as_ref())
            .is_some_and(|cell| cell.initialized())
    }

    async fn cell_for(&self, path: &Path) -> Arc<OnceCell<Vec<u8>>> {
        {
            let cache = self.cache.read().await;
            if let Some(cell) = cache.get(path) {
                return Arc::clone(cell);
            }
        }

        let mut cache = self.cache.write().await;
        Arc::clone(cache.entry(path.to_path_buf()).or_default())
    }
}

async fn load_or_create(path: &Path) -> Result<Vec<u8>> {
    let exists = tokio::fs::try_exists(path)
        .await
        .map_err(|e| JwtError::key_io(path, e))?;

    if !exists {
        let der = tokio::task::spawn_blocking(|| {
            let key = generate_private_key()?;
            marshal_private_key(&key)
        })
        .await
        .map_err(|e| JwtError::Internal {
            reason: format!("Key generation task failed: {e}"),
        })??;

        match save_bytes(&der, path).await {
            Ok(()) => info!(
                path = %path.display(),
                bits = RSA_KEY_BITS,
                "Generated new RSA key file"
            ),
            // Another process created it first; its file is complete, use it.
            Err(JwtError::KeyIo { source, .. }) if source.kind() == ErrorKind::AlreadyExists => {
                warn!(
                    path = %path.display(),
                    "Key file appeared during creation, keeping existing file"
                );
            }
            Err(e) => return Err(e),
        }
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| JwtError::key_io(path, e))?;

    debug!(path = %path.display(), len = bytes.len(), "Loaded key bytes");
    Ok(bytes)
}
