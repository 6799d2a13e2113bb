//! GitHub webhook signature verification (`X-Hub-Signature-256`)

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";
const SIGNATURE_PREFIX: &str = "sha256=";

/// Result of checking a request signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Ok,
    MissingHeader,
    MissingBody,
    LengthMismatch,
    Mismatch,
}

impl Verification {
    pub fn is_ok(self) -> bool {
        self == Verification::Ok
    }

    /// Short reason code used in log lines.
    pub fn reason(self) -> &'static str {
        match self {
            Verification::Ok => "ok",
            Verification::MissingHeader => "missing-header",
            Verification::MissingBody => "missing-body",
            Verification::LengthMismatch => "length-mismatch",
            Verification::Mismatch => "mismatch",
        }
    }
}

/// Computes the header value GitHub would send for `payload`.
pub fn sign(payload: &[u8], secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(format!(
        "{}{}",
        SIGNATURE_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Checks `signature_header` against the HMAC-SHA256 of the raw request bytes.
///
/// Only the `sha256=` scheme is accepted. The header is compared with the
/// expected value in constant time once both have the same length.
pub fn check(payload: &[u8], signature_header: Option<&str>, secret: &str) -> Verification {
    let Some(provided) = signature_header else {
        return Verification::MissingHeader;
    };
    if payload.is_empty() {
        return Verification::MissingBody;
    }

    let Some(expected) = sign(payload, secret) else {
        return Verification::Mismatch;
    };
    if provided.len() != expected.len() {
        return Verification::LengthMismatch;
    }

    if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        Verification::Ok
    } else {
        Verification::Mismatch
    }
}

/// Boolean form of [`check`].
pub fn verify(payload: &[u8], signature_header: Option<&str>, secret: &str) -> bool {
    check(payload, signature_header, secret).is_ok()
}
