//! Common test utilities for integration tests
//!
//! Shared keys, role helpers and a mock key server.

#![allow(dead_code)]

use std::sync::OnceLock;
use std::time::Duration;

use pss_jwt::{Audience, Issuer, marshal_public_key};
use rsa::RsaPrivateKey;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

/// Path served by [`MockKeyServer`]
pub const KEY_PATH: &str = "/keys/auth.der";

/// Key shared by every test in a binary; generation is slow
pub fn shared_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| pss_jwt::generate_private_key().expect("key generation"))
}

/// Issuer named `auth` signing with [`shared_key`]
pub fn issuer() -> Issuer {
    Issuer::new(shared_key().clone(), "auth")
}

/// Audience named `name` trusting [`shared_key`]
pub fn audience(name: &str) -> Audience {
    Audience::new(shared_key().to_public_key(), name)
}

/// Mint and sign a token from [`issuer`]
pub fn signed_jwt(subject: &str, audience: &str, lifetime: chrono::Duration) -> String {
    let issuer = issuer();
    let token = issuer.mint_token(subject, audience, lifetime);
    issuer.stringify(&token).expect("stringify")
}

/// Mock endpoint serving public keys
pub struct MockKeyServer {
    pub server: MockServer,
    pub key_url: String,
}

impl MockKeyServer {
    /// Start a mock server with nothing mounted
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let key_url = format!("{}{}", server.uri(), KEY_PATH);
        Self { server, key_url }
    }

    /// Serve the public half of [`shared_key`]
    pub async fn mock_public_key(&self) {
        let der = marshal_public_key(&shared_key().to_public_key()).expect("marshal");
        self.mock_response(ResponseTemplate::new(200).set_body_bytes(der))
            .await;
    }

    /// Respond to the key path with `status` and an empty body
    pub async fn mock_status(&self, status: u16) {
        self.mock_response(ResponseTemplate::new(status)).await;
    }

    /// Respond to the key path with bytes that are not a key
    pub async fn mock_garbage(&self) {
        let body = b"-----BEGIN nothing".to_vec();
        self.mock_response(ResponseTemplate::new(200).set_body_bytes(body))
            .await;
    }

    /// Respond to the key path only after `delay`
    pub async fn mock_slow(&self, delay: Duration) {
        let der = marshal_public_key(&shared_key().to_public_key()).expect("marshal");
        self.mock_response(
            ResponseTemplate::new(200)
                .set_body_bytes(der)
                .set_delay(delay),
        )
        .await;
    }

    async fn mock_response(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(KEY_PATH))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }
}
