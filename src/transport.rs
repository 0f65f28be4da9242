//! Artifact transport seam.
//!
//! The core never speaks HTTP itself; a collaborator hands it the fetched
//! bytes plus the on-disk path the installer will be launched from. Retry
//! and backoff policy live entirely on the collaborator's side.

use async_trait::async_trait;
use std::path::PathBuf;
use url::Url;

/// A fetched installer artifact: the raw bytes for verification and the
/// local path the installer process is launched from.
#[derive(Debug, Clone)]
pub struct FetchedArtifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Downloads installer artifacts on behalf of the executor.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Fetches the artifact at `uri`. The error string is surfaced to the
    /// caller attributed to the application being installed.
    async fn fetch(&self, uri: &str) -> Result<FetchedArtifact, String>;

    /// The lowercased host the artifact would be fetched from, used for
    /// the verifier's domain check. `None` when the URI has no host.
    fn source_domain_of(&self, uri: &str) -> Option<String> {
        Url::parse(uri)
            .ok()
            .and_then(|url| url.host_str().map(|host| host.to_lowercase()))
    }
}
