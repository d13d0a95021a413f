//! Random tokens from the OS CSPRNG
//!
//! Both the state nonce and the PKCE verifier come from here. Bytes are drawn
//! straight from the operating system (`getrandom`), so a broken entropy
//! source surfaces as an error instead of a panic.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::error::{Error, Result};

/// Draw `byte_len` random bytes and encode them as URL-safe base64.
///
/// The encoded length is `ceil(byte_len * 4 / 3)`; nothing is truncated.
pub fn random_token(byte_len: usize) -> Result<String> {
    let mut bytes = vec![0u8; byte_len];
    getrandom::fill(&mut bytes).map_err(|e| Error::EntropyUnavailable(e.to_string()))?;
    Ok(encode_url_safe(&bytes))
}

/// Base64 with `-` and `_` in place of `+` and `/`, padding stripped.
pub fn encode_url_safe(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}
