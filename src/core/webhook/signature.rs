use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Why a webhook signature did not verify.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is missing")]
    Missing,

    #[error("signature is not valid hex: {0}")]
    Malformed(String),

    #[error("signature does not match payload")]
    Mismatch,

    #[error("webhook secret is empty")]
    EmptySecret,
}

/// Verify an HMAC-SHA256 signature of `body`.
///
/// `signature` may be `sha256=<hex>` or bare hex. The comparison is
/// constant-time.
pub fn verify_signature(
    secret: &str,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::EmptySecret);
    }
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(SignatureError::Missing)?;
    let digest_hex = signature.strip_prefix("sha256=").unwrap_or(signature);
    let expected = hex::decode(digest_hex).map_err(|e| SignatureError::Malformed(e.to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::EmptySecret)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

/// Hex HMAC-SHA256 of `body`, prefixed with `sha256=`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::EmptySecret)?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}
