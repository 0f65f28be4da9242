// Central data model definitions shared across the catalog, planner,
// verifier, executor and state store. The catalog file and the persisted
// state file both deserialize into these types, so they live in a single
// module to keep the on-disk schemas in one place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

// -----------------------------------------------------------------------------
// InstallerKind
// -----------------------------------------------------------------------------
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstallerKind {
    Msi,
    Exe,
    #[serde(rename = "archive")]
    PackageArchive,
}

// -----------------------------------------------------------------------------
// AppDescriptor
// -----------------------------------------------------------------------------
/// A single vetted application entry from the catalog.
///
/// Descriptors are immutable once the catalog has loaded; the planner and
/// executor only ever read them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AppDescriptor {
    /// Unique key within the catalog.
    pub identifier: String,
    pub display_name: String,
    pub version: String,
    /// Where the installer artifact is fetched from.
    pub source_uri: String,
    /// Hex-encoded SHA-256 digest the artifact must match.
    pub expected_hash: String,
    pub installer_kind: InstallerKind,
    /// Allow-listed source domains. An empty list means no domain policy.
    #[serde(default)]
    pub trusted_domains: Vec<String>,
    /// Base64-encoded signature blob, if the publisher signs artifacts.
    #[serde(default)]
    pub signature: Option<String>,
    /// Hex-encoded public key the signature must verify against.
    #[serde(default)]
    pub signer_key_id: Option<String>,
    /// Direct dependencies only; the planner computes the closure.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Arguments for an unattended install.
    #[serde(default)]
    pub silent_args: Vec<String>,
    #[serde(default)]
    pub uninstall_command: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
    /// Locally observed install state at catalog-authoring time.
    #[serde(default)]
    pub installed: bool,
}

impl AppDescriptor {
    /// Signature verification is required only when the descriptor carries
    /// both a signature blob and the key it must verify against.
    pub fn requires_signature_verification(&self) -> bool {
        self.signature.is_some() && self.signer_key_id.is_some()
    }

    /// The lowercased host of `source_uri`, or `None` when the URI has no
    /// parseable host.
    pub fn source_domain(&self) -> Option<String> {
        Url::parse(&self.source_uri)
            .ok()
            .and_then(|url| url.host_str().map(|host| host.to_lowercase()))
    }

    /// Whether `domain` is acceptable under this descriptor's allow-list.
    /// An empty allow-list declares no domain policy and accepts anything.
    pub fn is_trusted_domain(&self, domain: &str) -> bool {
        if self.trusted_domains.is_empty() {
            return true;
        }
        self.trusted_domains
            .iter()
            .any(|entry| entry.eq_ignore_ascii_case(domain.trim()))
    }
}

// -----------------------------------------------------------------------------
// Plan Types
// -----------------------------------------------------------------------------
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    Install,
    Skip,
    Blocked,
}

/// One resolved entry of an installation plan, in dependency order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub identifier: String,
    pub display_name: String,
    pub version: String,
    /// Direct dependencies as declared by the descriptor.
    pub dependencies: Vec<String>,
    /// Install state observed at plan-build time.
    pub already_installed: bool,
    pub action: PlanAction,
    /// Free-text explanation, set for Blocked steps.
    pub notes: Option<String>,
}

/// Ordered, classified installation plan for one target application.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Plan {
    pub target: String,
    pub steps: Vec<PlanStep>,
    pub warnings: Vec<String>,
}

impl Plan {
    pub fn has_blocked_steps(&self) -> bool {
        self.steps.iter().any(|s| s.action == PlanAction::Blocked)
    }

    pub fn install_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.action == PlanAction::Install)
            .count()
    }

    pub fn skip_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.action == PlanAction::Skip)
            .count()
    }

    pub fn blocked_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.action == PlanAction::Blocked)
            .count()
    }

    /// One-line summary suitable for a confirmation prompt.
    pub fn summary(&self) -> String {
        format!(
            "Plan for {}: {} to install, {} already installed, {} blocked",
            self.target,
            self.install_count(),
            self.skip_count(),
            self.blocked_count()
        )
    }
}

// -----------------------------------------------------------------------------
// Verification Types
// -----------------------------------------------------------------------------
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    Valid,
    Invalid,
    Unsigned,
    Revoked,
    Expired,
    Untrusted,
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VerificationStatus::Valid => "valid",
            VerificationStatus::Invalid => "invalid",
            VerificationStatus::Unsigned => "unsigned",
            VerificationStatus::Revoked => "revoked",
            VerificationStatus::Expired => "expired",
            VerificationStatus::Untrusted => "untrusted",
        };
        f.write_str(name)
    }
}

/// Certificate metadata carried inside a signature blob.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub thumbprint: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    #[serde(default)]
    pub revoked: bool,
}

/// The result of verifying one artifact against its descriptor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub status: VerificationStatus,
    pub certificate: Option<CertificateRecord>,
    pub verified_at: Option<DateTime<Utc>>,
    pub hash_algorithm: Option<String>,
    pub detail: Option<String>,
}

impl VerificationOutcome {
    /// Only a Valid outcome authorizes execution.
    pub fn authorizes_execution(&self) -> bool {
        self.status == VerificationStatus::Valid
    }
}

// -----------------------------------------------------------------------------
// InstallRecord
// -----------------------------------------------------------------------------
/// Durable record of one installed application, keyed by identifier in the
/// state file. Created on first successful install, updated on re-install;
/// never silently deleted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InstallRecord {
    pub identifier: String,
    pub version: String,
    pub installed: bool,
    pub installed_at: DateTime<Utc>,
    /// Path of the installer artifact that was executed.
    pub artifact_path: String,
    /// Dependencies confirmed installed at record time.
    pub dependencies: Vec<String>,
}

// -----------------------------------------------------------------------------
// ExecutionResult
// -----------------------------------------------------------------------------
/// Captured result of one installer process launch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// The exact command line that was invoked.
    pub command_line: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(trusted: &[&str]) -> AppDescriptor {
        AppDescriptor {
            identifier: "demo".into(),
            display_name: "Demo".into(),
            version: "1.0.0".into(),
            source_uri: "https://Example.com/demo.exe".into(),
            expected_hash: String::new(),
            installer_kind: InstallerKind::Exe,
            trusted_domains: trusted.iter().map(|s| s.to_string()).collect(),
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

    #[test]
    fn source_domain_is_lowercased() {
        assert_eq!(
            descriptor(&[]).source_domain().as_deref(),
            Some("example.com")
        );
    }

    #[test]
    fn empty_allow_list_trusts_any_domain() {
        assert!(descriptor(&[]).is_trusted_domain("anywhere.net"));
    }

    #[test]
    fn allow_list_match_is_case_insensitive() {
        let d = descriptor(&["Example.COM"]);
        assert!(d.is_trusted_domain("example.com"));
        assert!(!d.is_trusted_domain("evil.com"));
    }

    #[test]
    fn signature_verification_requires_blob_and_key() {
        let mut d = descriptor(&[]);
        assert!(!d.requires_signature_verification());
        d.signature = Some("c2ln".into());
        assert!(!d.requires_signature_verification());
        d.signer_key_id = Some("abcd".into());
        assert!(d.requires_signature_verification());
    }

    #[test]
    fn plan_counts_and_blocked_detection() {
        let step = |action| PlanStep {
            identifier: "x".into(),
            display_name: "X".into(),
            version: "1".into(),
            dependencies: vec![],
            already_installed: false,
            action,
            notes: None,
        };
        let plan = Plan {
            target: "x".into(),
            steps: vec![
                step(PlanAction::Install),
                step(PlanAction::Skip),
                step(PlanAction::Blocked),
            ],
            warnings: vec![],
        };
        assert!(plan.has_blocked_steps());
        assert_eq!(plan.install_count(), 1);
        assert_eq!(plan.skip_count(), 1);
        assert_eq!(plan.blocked_count(), 1);
    }
}
