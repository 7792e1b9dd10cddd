//! Role configuration
//!
//! Serializable descriptions of an [`Issuer`] or an [`Audience`], turned into
//! the live role through a shared [`KeyManager`].

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audience::Audience;
use crate::issuer::Issuer;
use crate::keys::{DEFAULT_FETCH_TIMEOUT, KeyManager, fetch_public_key, parse_public_key};
use crate::{JwtError, Result};

/// Issuer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerConfig {
    /// Value written into the `iss` claim
    pub name: String,
    /// Private key file, created on first use if missing
    pub key_path: PathBuf,
}

impl IssuerConfig {
    /// Load the signing key and build the issuer
    ///
    /// # Errors
    /// Returns [`JwtError::Configuration`] for an empty name, or the key
    /// manager's error if the key cannot be loaded.
    pub async fn build(&self, keys: &KeyManager) -> Result<Issuer> {
        require_name(&self.name, "issuer")?;

        let private_key = keys.load_private_key(&self.key_path).await?;
        info!(
            issuer = %self.name,
            key_path = %self.key_path.display(),
            "Issuer ready"
        );

        Ok(Issuer::new(private_key, &self.name))
    }
}

/// Where an audience gets the key it trusts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PublicKeySource {
    /// Public half of an issuer's private key file
    PrivateKeyFile {
        /// Path to the PKCS#1 DER private key
        path: PathBuf,
    },
    /// PKCS#1 DER public key on disk
    PublicKeyFile {
        /// Path to the key
        path: PathBuf,
    },
    /// PKCS#1 DER public key served over HTTP(S)
    Url {
        /// Key endpoint
        url: String,
    },
}

/// Audience configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceConfig {
    /// Name matched against the `aud` claim
    pub name: String,
    /// Trusted key
    pub public_key: PublicKeySource,
    /// Timeout for [`PublicKeySource::Url`]
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: Duration,
}

fn default_fetch_timeout() -> Duration {
    DEFAULT_FETCH_TIMEOUT
}

impl AudienceConfig {
    /// Resolve the trusted key and build the audience
    ///
    /// # Errors
    /// Returns [`JwtError::Configuration`] for an empty name, or the load or
    /// fetch error for the configured key source.
    pub async fn build(&self, keys: &KeyManager) -> Result<Audience> {
        require_name(&self.name, "audience")?;

        let public_key = match &self.public_key {
            PublicKeySource::PrivateKeyFile { path } => keys.load_public_key(path).await?,
            PublicKeySource::PublicKeyFile { path } => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| JwtError::key_io(path, e))?;
                parse_public_key(&bytes)?
            }
            PublicKeySource::Url { url } => fetch_public_key(url, self.fetch_timeout).await?,
        };

        info!(audience = %self.name, "Audience ready");
        Ok(Audience::new(public_key, &self.name))
    }
}

fn require_name(name: &str, role: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(JwtError::Configuration {
            reason: format!("{role} name must not be empty"),
        });
    }
    Ok(())
}
