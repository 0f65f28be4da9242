//! Signature blob decoding and ed25519 signature validation.
//!
//! A catalog descriptor may carry a base64 signature blob: a JSON payload
//! holding the publisher certificate record and a detached ed25519
//! signature over the artifact's SHA-256 digest. The declared signer key
//! identifier is the hex-encoded verifying key, so a signature produced by
//! any other signer simply fails to verify.

use crate::models::CertificateRecord;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};

/// Decoded contents of a descriptor's signature blob.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignatureBlob {
    pub certificate: CertificateRecord,
    /// Base64-encoded detached ed25519 signature over the artifact digest.
    pub signature: String,
}

/// Result of validating a signature blob against an artifact digest.
#[derive(Debug, Clone)]
pub enum SignatureCheck {
    Valid(CertificateRecord),
    /// Chain, format or signer mismatch; carries a human-readable reason.
    Invalid(String),
    Revoked(CertificateRecord),
    Expired(CertificateRecord),
}

/// Decodes the base64/JSON envelope without validating anything inside it.
pub fn decode_blob(blob_b64: &str) -> Result<SignatureBlob, String> {
    let raw = BASE64
        .decode(blob_b64.trim())
        .map_err(|e| format!("signature blob is not valid base64: {}", e))?;
    serde_json::from_slice(&raw).map_err(|e| format!("signature blob does not parse: {}", e))
}

/// Validates a signature blob: certificate revocation and validity window
/// first, then the ed25519 signature over `digest` against the declared
/// signer key.
pub fn check_signature(
    blob_b64: &str,
    signer_key_hex: &str,
    digest: &[u8],
    now: DateTime<Utc>,
) -> SignatureCheck {
    let blob = match decode_blob(blob_b64) {
        Ok(blob) => blob,
        Err(reason) => return SignatureCheck::Invalid(reason),
    };
    let cert = blob.certificate;

    if cert.revoked {
        log::warn!("Signer certificate '{}' is revoked", cert.subject);
        return SignatureCheck::Revoked(cert);
    }
    if now > cert.valid_to {
        log::warn!(
            "Signer certificate '{}' expired at {}",
            cert.subject,
            cert.valid_to
        );
        return SignatureCheck::Expired(cert);
    }
    if now < cert.valid_from {
        return SignatureCheck::Invalid(format!(
            "certificate '{}' is not valid before {}",
            cert.subject, cert.valid_from
        ));
    }

    let key_bytes = match decode_hex(signer_key_hex) {
        Some(bytes) => bytes,
        None => return SignatureCheck::Invalid("signer key identifier is not valid hex".into()),
    };
    let key_bytes: [u8; 32] = match key_bytes.try_into() {
        Ok(bytes) => bytes,
        Err(_) => return SignatureCheck::Invalid("signer key must be 32 bytes".into()),
    };
    let verifying_key = match VerifyingKey::from_bytes(&key_bytes) {
        Ok(key) => key,
        Err(e) => return SignatureCheck::Invalid(format!("signer key is malformed: {}", e)),
    };

    let sig_bytes = match BASE64.decode(blob.signature.trim()) {
        Ok(bytes) => bytes,
        Err(e) => return SignatureCheck::Invalid(format!("signature is not valid base64: {}", e)),
    };
    let signature = match Signature::from_slice(&sig_bytes) {
        Ok(sig) => sig,
        Err(e) => return SignatureCheck::Invalid(format!("signature is malformed: {}", e)),
    };

    match verifying_key.verify_strict(digest, &signature) {
        Ok(()) => SignatureCheck::Valid(cert),
        Err(_) => SignatureCheck::Invalid(
            "signature does not verify against the declared signer key".into(),
        ),
    }
}

/// Lower-hex rendering of raw bytes.
pub(crate) fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Strict hex decoding; `None` on odd length or non-hex characters.
pub(crate) fn decode_hex(s: &str) -> Option<Vec<u8>> {
    let s = s.trim();
    if !s.is_ascii() || s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

/// Constant-time equality over byte slices of equal length. Differing
/// lengths return early; only the length is learnable from timing.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
