//! Artifact verification: domain allow-list, content hash, then signature.
//!
//! The checks run cheapest-first and short-circuit on the first failure.
//! An artifact that fails the hash comparison never reaches signature
//! validation, and nothing short of a Valid outcome authorizes execution.

use crate::models::{AppDescriptor, VerificationOutcome, VerificationStatus};
use crate::signing::{self, SignatureCheck};
use chrono::Utc;
use sha2::{Digest, Sha256};

const HASH_ALGORITHM: &str = "SHA-256";

/// Stateless verification pipeline. One instance can be shared freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct Verifier;

impl Verifier {
    pub fn new() -> Self {
        Self
    }

    /// Verifies `artifact` against `descriptor`, given the domain the
    /// transport actually fetched it from. Fail-closed throughout: an
    /// unparseable domain or a malformed expected hash never passes.
    pub fn verify(
        &self,
        descriptor: &AppDescriptor,
        artifact: &[u8],
        source_domain: &str,
    ) -> VerificationOutcome {
        let now = Utc::now();

        // 1. Domain allow-list. Only enforced when the descriptor declares one.
        if !descriptor.is_trusted_domain(source_domain) {
            log::warn!(
                "Rejecting '{}': source domain '{}' is not allow-listed",
                descriptor.identifier,
                source_domain
            );
            return outcome(
                VerificationStatus::Untrusted,
                None,
                Some(format!(
                    "source domain '{}' is not on the allow-list",
                    source_domain
                )),
            );
        }

        // 2. Content hash, compared in constant time against the descriptor.
        let digest = Sha256::digest(artifact);
        let digest_hex = signing::encode_hex(&digest);
        let expected = descriptor.expected_hash.trim().to_lowercase();
        if !signing::constant_time_eq(digest_hex.as_bytes(), expected.as_bytes()) {
            log::warn!(
                "Rejecting '{}': content hash mismatch (computed {})",
                descriptor.identifier,
                digest_hex
            );
            return outcome(
                VerificationStatus::Invalid,
                None,
                Some("artifact digest does not match the expected content hash".into()),
            );
        }

        // 3. Signature, only when the descriptor requires it.
        if descriptor.requires_signature_verification() {
            let blob = descriptor.signature.as_deref().unwrap_or_default();
            let signer_key = descriptor.signer_key_id.as_deref().unwrap_or_default();
            if blob.trim().is_empty() {
                return outcome(
                    VerificationStatus::Unsigned,
                    None,
                    Some("descriptor requires a signature but the artifact is unsigned".into()),
                );
            }

            return match signing::check_signature(blob, signer_key, &digest, now) {
                SignatureCheck::Valid(cert) => {
                    log::info!(
                        "Artifact for '{}' verified (signed by {})",
                        descriptor.identifier,
                        cert.subject
                    );
                    VerificationOutcome {
                        status: VerificationStatus::Valid,
                        certificate: Some(cert),
                        verified_at: Some(now),
                        hash_algorithm: Some(HASH_ALGORITHM.into()),
                        detail: None,
                    }
                }
                SignatureCheck::Invalid(reason) => {
                    log::warn!(
                        "Rejecting '{}': signature invalid: {}",
                        descriptor.identifier,
                        reason
                    );
                    outcome(VerificationStatus::Invalid, None, Some(reason))
                }
                SignatureCheck::Revoked(cert) => outcome(
                    VerificationStatus::Revoked,
                    Some(cert),
                    Some("signer certificate has been revoked".into()),
                ),
                SignatureCheck::Expired(cert) => outcome(
                    VerificationStatus::Expired,
                    Some(cert),
                    Some("signer certificate validity window has passed".into()),
                ),
            };
        }

        log::info!(
            "Artifact for '{}' verified (domain and content hash)",
            descriptor.identifier
        );
        VerificationOutcome {
            status: VerificationStatus::Valid,
            certificate: None,
            verified_at: Some(now),
            hash_algorithm: Some(HASH_ALGORITHM.into()),
            detail: None,
        }
    }
}

fn outcome(
    status: VerificationStatus,
    certificate: Option<crate::models::CertificateRecord>,
    detail: Option<String>,
) -> VerificationOutcome {
    VerificationOutcome {
        status,
        certificate,
        verified_at: Some(Utc::now()),
        hash_algorithm: Some(HASH_ALGORITHM.into()),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CertificateRecord, InstallerKind};
    use crate::signing::SignatureBlob;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use chrono::{DateTime, Duration};
    use ed25519_dalek::{Signer, SigningKey};

    fn descriptor(artifact: &[u8]) -> AppDescriptor {
        AppDescriptor {
            identifier: "demo".into(),
            display_name: "Demo".into(),
            version: "1.0.0".into(),
            source_uri: "https://example.com/demo.exe".into(),
            expected_hash: signing::encode_hex(&Sha256::digest(artifact)),
            installer_kind: InstallerKind::Exe,
            trusted_domains: vec!["example.com".into()],
            signature: None,
            signer_key_id: None,
            dependencies: vec![],
            silent_args: vec![],
            uninstall_command: None,
            tags: vec![],
            description: String::new(),
            installed: false,
        }
    }

    fn certificate(now: DateTime<chrono::Utc>) -> CertificateRecord {
        CertificateRecord {
            subject: "CN=Example Publisher".into(),
            issuer: "CN=Example Root CA".into(),
            serial: "01".into(),
            thumbprint: "aa:bb:cc".into(),
            valid_from: now - Duration::days(30),
            valid_to: now + Duration::days(30),
            revoked: false,
        }
    }

    fn sign_descriptor(d: &mut AppDescriptor, key: &SigningKey, artifact: &[u8]) {
        let digest = Sha256::digest(artifact);
        let blob = SignatureBlob {
            certificate: certificate(Utc::now()),
            signature: BASE64.encode(key.sign(&digest).to_bytes()),
        };
        d.signature = Some(BASE64.encode(serde_json::to_vec(&blob).unwrap()));
        d.signer_key_id = Some(signing::encode_hex(key.verifying_key().as_bytes()));
    }

    #[test]
    fn unsigned_descriptor_passes_on_domain_and_hash_alone() {
        let artifact = b"installer payload";
        let result = Verifier::new().verify(&descriptor(artifact), artifact, "example.com");
        assert_eq!(result.status, VerificationStatus::Valid);
        assert!(result.authorizes_execution());
        assert_eq!(result.hash_algorithm.as_deref(), Some("SHA-256"));
        assert!(result.certificate.is_none());
    }

    #[test]
    fn domain_outside_allow_list_is_untrusted() {
        let artifact = b"installer payload";
        let result = Verifier::new().verify(&descriptor(artifact), artifact, "evil.com");
        assert_eq!(result.status, VerificationStatus::Untrusted);
        assert!(!result.authorizes_execution());
    }

    #[test]
    fn hash_mismatch_is_invalid_even_with_a_valid_signature() {
        let artifact = b"installer payload";
        let tampered = b"tampered payload!";
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let mut d = descriptor(artifact);
        // Signature is genuinely valid for the tampered bytes; the hash
        // check must still reject before the signature is ever consulted.
        sign_descriptor(&mut d, &key, tampered);
        let result = Verifier::new().verify(&d, tampered, "example.com");
        assert_eq!(result.status, VerificationStatus::Invalid);
    }

    #[test]
    fn signed_descriptor_with_good_signature_is_valid() {
        let artifact = b"installer payload";
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let mut d = descriptor(artifact);
        sign_descriptor(&mut d, &key, artifact);
        let result = Verifier::new().verify(&d, artifact, "example.com");
        assert_eq!(result.status, VerificationStatus::Valid);
        assert!(result.certificate.is_some());
    }

    #[test]
    fn signed_descriptor_with_wrong_key_is_invalid() {
        let artifact = b"installer payload";
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let mut d = descriptor(artifact);
        sign_descriptor(&mut d, &key, artifact);
        let other = SigningKey::from_bytes(&[9u8; 32]);
        d.signer_key_id = Some(signing::encode_hex(other.verifying_key().as_bytes()));
        let result = Verifier::new().verify(&d, artifact, "example.com");
        assert_eq!(result.status, VerificationStatus::Invalid);
    }

    #[test]
    fn required_signature_missing_at_verify_time_is_unsigned() {
        let artifact = b"installer payload";
        let mut d = descriptor(artifact);
        d.signature = Some("   ".into());
        d.signer_key_id = Some("ab".into());
        let result = Verifier::new().verify(&d, artifact, "example.com");
        assert_eq!(result.status, VerificationStatus::Unsigned);
    }

    #[test]
    fn expired_certificate_is_reported_as_expired() {
        let artifact = b"installer payload";
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let digest = Sha256::digest(artifact);
        let mut cert = certificate(Utc::now());
        cert.valid_to = Utc::now() - Duration::days(1);
        let blob = SignatureBlob {
            certificate: cert,
            signature: BASE64.encode(key.sign(&digest).to_bytes()),
        };
        let mut d = descriptor(artifact);
        d.signature = Some(BASE64.encode(serde_json::to_vec(&blob).unwrap()));
        d.signer_key_id = Some(signing::encode_hex(key.verifying_key().as_bytes()));
        let result = Verifier::new().verify(&d, artifact, "example.com");
        assert_eq!(result.status, VerificationStatus::Expired);
    }

    #[test]
    fn expected_hash_comparison_ignores_case() {
        let artifact = b"installer payload";
        let mut d = descriptor(artifact);
        d.expected_hash = d.expected_hash.to_uppercase();
        let result = Verifier::new().verify(&d, artifact, "example.com");
        assert_eq!(result.status, VerificationStatus::Valid);
    }
}
