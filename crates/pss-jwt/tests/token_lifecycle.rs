//! Token lifecycle integration tests
//!
//! Mint, sign, parse and verify across the issuer and audience roles,
//! including expiry and tampering.

mod common;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Duration;
use pretty_assertions::assert_eq;
use pss_jwt::signature::digest;
use pss_jwt::{JwtError, Rejection, Token};
use rand::rngs::OsRng;
use rsa::Pss;
use sha2::Sha256;

use common::{audience, issuer, shared_key, signed_jwt};

/// Flip one bit of segment `index` after decoding it, re-encoding the result
fn flip_bit(jwt: &str, index: usize, byte: usize) -> String {
    let mut parts: Vec<String> = jwt.split('.').map(str::to_string).collect();
    let mut bytes = URL_SAFE_NO_PAD.decode(&parts[index]).unwrap();
    bytes[byte] ^= 0x01;
    parts[index] = URL_SAFE_NO_PAD.encode(bytes);
    parts.join(".")
}

#[test]
fn test_round_trip() {
    // GIVEN: An issuer and the audience it addresses
    let issuer = issuer();
    let audience = audience("inventory");

    // WHEN: A token is minted, signed and parsed back
    let token = issuer.mint_token("alice", "inventory", Duration::minutes(10));
    let jwt = issuer.stringify(&token).unwrap();
    let parsed: Token = jwt.parse().unwrap();

    // THEN: The claims survive and the audience accepts it
    assert_eq!(parsed.body, token.body);
    assert_eq!(parsed.header, token.header);
    assert!(audience.is_valid(&parsed));
    assert_eq!(parsed.body.issuer, "auth");
}

#[test]
fn test_stringify_is_randomized() {
    let issuer = issuer();
    let audience = audience("inventory");
    let token = issuer.mint_token("alice", "inventory", Duration::minutes(10));

    let first = issuer.stringify(&token).unwrap();
    let second = issuer.stringify(&token).unwrap();

    // Same header and body, different signatures
    let (first_signed, first_sig) = first.rsplit_once('.').unwrap();
    let (second_signed, second_sig) = second.rsplit_once('.').unwrap();
    assert_eq!(first_signed, second_signed);
    assert_ne!(first_sig, second_sig);

    assert!(audience.parse_and_verify(&first).is_ok());
    assert!(audience.parse_and_verify(&second).is_ok());
}

#[test]
fn test_expired_token_rejected_despite_valid_signature() {
    let audience = audience("inventory");
    let jwt = signed_jwt("alice", "inventory", Duration::seconds(-1));
    let token: Token = jwt.parse().unwrap();

    assert!(!audience.is_valid(&token));
    assert!(matches!(
        audience.check(&token),
        Err(Rejection::Expired { .. })
    ));
}

#[test]
fn test_audience_mismatch() {
    let jwt = signed_jwt("alice", "inventory", Duration::minutes(10));

    let err = audience("billing").parse_and_verify(&jwt).unwrap_err();
    assert!(matches!(
        err,
        JwtError::Rejected(Rejection::AudienceMismatch { ref expected, ref actual })
            if expected == "billing" && actual == "inventory"
    ));
}

#[test]
fn test_signature_bit_flips_rejected() {
    let audience = audience("inventory");
    let jwt = signed_jwt("alice", "inventory", Duration::minutes(10));

    for byte in [0, 1, 127, 255] {
        let tampered = flip_bit(&jwt, 2, byte);
        let token: Token = tampered.parse().unwrap();
        assert_eq!(
            audience.check(&token),
            Err(Rejection::InvalidSignature),
            "flipped signature byte {byte}"
        );
    }
}

#[test]
fn test_body_tampering_rejected() {
    let audience = audience("inventory");
    let jwt = signed_jwt("alice", "inventory", Duration::minutes(10));

    // Bit flips inside the JSON either break parsing or the signature
    let body_len = URL_SAFE_NO_PAD.decode(jwt.split('.').nth(1).unwrap()).unwrap().len();
    for byte in 0..body_len {
        let tampered = flip_bit(&jwt, 1, byte);
        assert!(
            audience.parse_and_verify(&tampered).is_err(),
            "flipped body byte {byte}"
        );
    }
}

#[test]
fn test_reencoded_claims_rejected() {
    let audience = audience("inventory");
    let jwt = signed_jwt("alice", "inventory", Duration::minutes(10));
    let parts: Vec<&str> = jwt.split('.').collect();

    let mut token: Token = jwt.parse().unwrap();
    token.body.subject = "mallory".to_string();
    let forged_body = URL_SAFE_NO_PAD.encode(token.body.to_bytes().unwrap());
    let forged = format!("{}.{}.{}", parts[0], forged_body, parts[2]);

    assert!(matches!(
        audience.parse_and_verify(&forged),
        Err(JwtError::Rejected(Rejection::InvalidSignature))
    ));
}

#[test]
fn test_wire_header_is_not_trusted() {
    let audience = audience("inventory");
    let jwt = signed_jwt("alice", "inventory", Duration::minutes(10));
    let (_, rest) = jwt.split_once('.').unwrap();
    let none_header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);

    // Signature still covers the constant header, so this verifies
    let token = audience
        .parse_and_verify(&format!("{none_header}.{rest}"))
        .unwrap();
    assert_eq!(token.header.algorithm(), "RS256");

    // Stripping the signature does not downgrade anything
    let (signed_part, _) = jwt.rsplit_once('.').unwrap();
    assert!(matches!(
        audience.parse_and_verify(&format!("{signed_part}.")),
        Err(JwtError::Rejected(Rejection::InvalidSignature))
    ));
}

#[test]
fn test_accepts_token_signed_with_go_default_salt() {
    // GIVEN: A token signed like Go's rsa.SignPSS(.., nil): 222-byte salt
    let token = issuer().mint_token("alice", "inventory", Duration::minutes(10));
    let header = token.header.to_bytes().unwrap();
    let body = token.body.to_bytes().unwrap();
    let signature = shared_key()
        .sign_with_rng(
            &mut OsRng,
            Pss::new_with_salt::<Sha256>(222),
            &digest(&token.signing_input().unwrap()),
        )
        .unwrap();
    let jwt = format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header),
        URL_SAFE_NO_PAD.encode(body),
        URL_SAFE_NO_PAD.encode(signature)
    );

    // WHEN / THEN: The audience accepts it
    let verified = audience("inventory").parse_and_verify(&jwt).unwrap();
    assert_eq!(verified.body, token.body);
}

#[test]
fn test_claims_with_html_characters_round_trip() {
    let issuer = issuer();
    let audience = audience("a&b");
    let token = issuer.mint_token("<alice>\u{2028}", "a&b", Duration::minutes(10));
    let jwt = issuer.stringify(&token).unwrap();

    let body_json = URL_SAFE_NO_PAD.decode(jwt.split('.').nth(1).unwrap()).unwrap();
    let body_json = String::from_utf8(body_json).unwrap();
    assert!(body_json.contains(r#""sub":"\u003calice\u003e\u2028""#));
    assert!(body_json.contains(r#""aud":"a\u0026b""#));

    let verified = audience.parse_and_verify(&jwt).unwrap();
    assert_eq!(verified.body.subject, "<alice>\u{2028}");
}
