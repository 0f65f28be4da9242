//! Immutable, validated view of the vetted application catalog.
//!
//! Loading performs a validating parse: duplicate identifiers, empty
//! identifiers and dangling dependency references are catalog-authoring
//! defects and fail the whole load, so the planner never has to cope with
//! an internally inconsistent catalog at run time.

use crate::error::AppVetError;
use crate::models::AppDescriptor;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Read-only collection of application descriptors, keyed by identifier.
#[derive(Debug)]
pub struct Catalog {
    entries: HashMap<String, AppDescriptor>,
}

impl Catalog {
    /// Builds a catalog from already-deserialized descriptors, running the
    /// full set of load-time validations.
    pub fn from_descriptors(descriptors: Vec<AppDescriptor>) -> Result<Self, AppVetError> {
        let mut entries: HashMap<String, AppDescriptor> = HashMap::with_capacity(descriptors.len());

        for descriptor in descriptors {
            if descriptor.identifier.trim().is_empty() {
                return Err(AppVetError::InvalidCatalog {
                    reason: format!(
                        "descriptor '{}' has an empty identifier",
                        descriptor.display_name
                    ),
                });
            }
            if let Some(previous) = entries.insert(descriptor.identifier.clone(), descriptor) {
                return Err(AppVetError::InvalidCatalog {
                    reason: format!("duplicate identifier '{}'", previous.identifier),
                });
            }
        }

        // Every declared dependency must resolve inside the same catalog.
        for descriptor in entries.values() {
            for dep in &descriptor.dependencies {
                if !entries.contains_key(dep) {
                    return Err(AppVetError::InvalidCatalog {
                        reason: format!(
                            "'{}' depends on unknown application '{}'",
                            descriptor.identifier, dep
                        ),
                    });
                }
            }
        }

        log::info!("Catalog loaded with {} descriptors", entries.len());
        Ok(Self { entries })
    }

    /// Parses a catalog from its JSON representation (an array of
    /// descriptors) and validates it.
    pub fn from_json(raw: &str) -> Result<Self, AppVetError> {
        let descriptors: Vec<AppDescriptor> =
            serde_json::from_str(raw).map_err(|e| AppVetError::InvalidCatalog {
                reason: format!("catalog JSON does not parse: {}", e),
            })?;
        Self::from_descriptors(descriptors)
    }

    /// Reads and validates a catalog file from disk.
    pub fn from_file(path: &Path) -> Result<Self, AppVetError> {
        log::info!("Loading catalog from {}", path.display());
        let raw = fs::read_to_string(path).map_err(|e| AppVetError::InvalidCatalog {
            reason: format!("cannot read catalog file {}: {}", path.display(), e),
        })?;
        Self::from_json(&raw)
    }

    pub fn lookup(&self, id: &str) -> Option<&AppDescriptor> {
        self.entries.get(id)
    }

    /// Direct dependencies of `id`, in declaration order. `None` when the
    /// identifier is unknown.
    pub fn dependencies_of(&self, id: &str) -> Option<&[String]> {
        self.entries.get(id).map(|d| d.dependencies.as_slice())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive search over identifier, display name, description
    /// and tags, for catalog browsing in a UI or CLI.
    pub fn search(&self, term: &str) -> Vec<&AppDescriptor> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<&AppDescriptor> = self
            .entries
            .values()
            .filter(|d| {
                d.identifier.to_lowercase().contains(&needle)
                    || d.display_name.to_lowercase().contains(&needle)
                    || d.description.to_lowercase().contains(&needle)
                    || d.tags.iter().any(|t| t.to_lowercase().contains(&needle))
            })
            .collect();

        hits.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        log::debug!("Catalog search for '{}' matched {} entries", term, hits.len());
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InstallerKind;

    fn descriptor(id: &str, deps: &[&str]) -> AppDescriptor {
        AppDescriptor {
            identifier: id.into(),
            display_name: id.to_uppercase(),
            version: "1.0.0".into(),
            source_uri: format!("https://example.com/{}.exe", id),
            expected_hash: String::new(),
            installer_kind: InstallerKind::Exe,
            trusted_domains: vec![],
            signature: None,
            signer_key_id: None,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            silent_args: vec![],
            uninstall_command: None,
            tags: vec!["editor".into()],
            description: format!("The {} application", id),
            installed: false,
        }
    }

    #[test]
    fn load_accepts_resolvable_dependencies() {
        let catalog =
            Catalog::from_descriptors(vec![descriptor("a", &[]), descriptor("b", &["a"])])
                .unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.dependencies_of("b").unwrap(), &["a".to_string()]);
        assert!(catalog.lookup("a").is_some());
        assert!(catalog.lookup("missing").is_none());
    }

    #[test]
    fn load_rejects_duplicate_identifiers() {
        let err =
            Catalog::from_descriptors(vec![descriptor("a", &[]), descriptor("a", &[])])
                .unwrap_err();
        assert!(matches!(err, AppVetError::InvalidCatalog { .. }));
    }

    #[test]
    fn load_rejects_dangling_dependency() {
        let err = Catalog::from_descriptors(vec![descriptor("b", &["ghost"])]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ghost"), "unexpected message: {}", msg);
    }

    #[test]
    fn load_rejects_empty_identifier() {
        let err = Catalog::from_descriptors(vec![descriptor("  ", &[])]).unwrap_err();
        assert!(matches!(err, AppVetError::InvalidCatalog { .. }));
    }

    #[test]
    fn from_json_rejects_missing_required_fields() {
        // No `version` field: the validating parse must refuse it up front
        // instead of surfacing a mismatch later during planning.
        let raw = r#"[{"identifier": "a", "display_name": "A",
                       "source_uri": "https://example.com/a.exe",
                       "expected_hash": "", "installer_kind": "exe"}]"#;
        let err = Catalog::from_json(raw).unwrap_err();
        assert!(matches!(err, AppVetError::InvalidCatalog { .. }));
    }

    #[test]
    fn search_matches_name_description_and_tags() {
        let catalog =
            Catalog::from_descriptors(vec![descriptor("vim", &[]), descriptor("git", &[])])
                .unwrap();
        assert_eq!(catalog.search("VIM").len(), 1);
        // Both descriptors carry the "editor" tag.
        assert_eq!(catalog.search("editor").len(), 2);
        assert!(catalog.search("").is_empty());
    }
}
