//! Token minting and PKCE primitives.
//!
//! - Random credentials (codes, access and refresh tokens) from the thread CSPRNG
//! - PKCE challenge derivation and verification (RFC 7636)
//! - Constant-time comparison for secret values

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::types::CodeChallengeMethod;

/// Entropy of every minted credential, in bytes (256 bits).
pub const CREDENTIAL_BYTES: usize = 32;

/// Generate a random token (URL-safe base64 encoded, no padding).
///
/// # Arguments
///
/// * `byte_length` - Number of random bytes (token will be ~4/3 this length after encoding)
pub fn generate_token(byte_length: usize) -> String {
    let mut bytes = vec![0u8; byte_length];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Generate an authorization code.
pub fn generate_authorization_code() -> String {
    generate_token(CREDENTIAL_BYTES)
}

/// Generate an access token.
pub fn generate_access_token() -> String {
    generate_token(CREDENTIAL_BYTES)
}

/// Generate a refresh token.
pub fn generate_refresh_token() -> String {
    generate_token(CREDENTIAL_BYTES)
}

/// Derive the S256 code challenge: `BASE64URL(SHA256(code_verifier))`.
pub fn code_challenge_s256(code_verifier: &str) -> String {
    let digest = Sha256::digest(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Verify a PKCE code verifier against the challenge recorded at authorization.
///
/// Returns `true` if the verifier matches the challenge under `method`.
pub fn verify_pkce(code_verifier: &str, code_challenge: &str, method: CodeChallengeMethod) -> bool {
    match method {
        CodeChallengeMethod::S256 => {
            constant_time_eq(&code_challenge_s256(code_verifier), code_challenge)
        }
        CodeChallengeMethod::Plain => constant_time_eq(code_verifier, code_challenge),
    }
}

/// Constant-time string comparison.
///
/// Length differences are revealed, content differences are not.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
