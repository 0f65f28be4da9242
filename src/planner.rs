//! Dependency resolution of a requested application into an ordered,
//! deduplicated installation plan.
//!
//! Resolution is a post-order traversal over the catalog's dependency
//! graph, driven by an explicit stack so a pathological dependency depth
//! cannot overflow the call stack. Cycles and untrusted sources never
//! abort the whole plan; the affected nodes come back Blocked so the
//! caller still sees the complete picture.

use crate::catalog::Catalog;
use crate::models::{AppDescriptor, Plan, PlanAction, PlanStep};
use crate::state::StateStore;
use std::collections::{HashMap, HashSet};

/// Builds installation plans from a catalog and the current install state.
/// Planning is pure: it reads the catalog and state store and mutates
/// neither.
pub struct Planner<'a> {
    catalog: &'a Catalog,
    state: &'a StateStore,
}

/// Traversal frames: a node is entered before its dependencies and exited
/// (classified, appended to the plan) after all of them.
enum Frame<'a> {
    Enter(&'a str),
    Exit(&'a str),
}

impl<'a> Planner<'a> {
    pub fn new(catalog: &'a Catalog, state: &'a StateStore) -> Self {
        Self { catalog, state }
    }

    /// Resolves `target_id` and its dependency closure into a plan whose
    /// steps are ordered leaves-first: executing them left to right never
    /// installs an application before a dependency it requires. Each node
    /// appears exactly once, even under diamond dependencies.
    pub fn build_plan(&self, target_id: &str) -> Plan {
        let mut plan = Plan {
            target: target_id.to_string(),
            ..Default::default()
        };

        let root = match self.catalog.lookup(target_id) {
            Some(descriptor) => descriptor,
            None => {
                log::warn!("Plan requested for unknown application '{}'", target_id);
                plan.warnings
                    .push(format!("'{}' was not found in the catalog", target_id));
                return plan;
            }
        };

        // Action per fully resolved node; doubles as the visited set.
        let mut actions: HashMap<&str, PlanAction> = HashMap::new();
        // Cycle participants, discovered when an in-progress node is
        // re-entered. Mapped to the note they will carry.
        let mut cycle_members: HashMap<&str, String> = HashMap::new();
        // The current traversal path, as both an ordered list and a set.
        let mut path: Vec<&str> = Vec::new();
        let mut on_path: HashSet<&str> = HashSet::new();

        let mut stack: Vec<Frame> = vec![Frame::Enter(root.identifier.as_str())];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(id) => {
                    if actions.contains_key(id) {
                        // Already resolved via another path (diamond).
                        continue;
                    }
                    if on_path.contains(id) {
                        // Re-entered a node whose dependencies are still
                        // being resolved: everything on the path from its
                        // first occurrence onward is part of the cycle.
                        log::warn!("Circular dependency detected at '{}'", id);
                        let start = path.iter().position(|n| *n == id).unwrap_or(0);
                        for member in &path[start..] {
                            cycle_members.entry(*member).or_insert_with(|| {
                                format!("circular dependency involving '{}'", id)
                            });
                        }
                        continue;
                    }

                    let descriptor = match self.catalog.lookup(id) {
                        Some(descriptor) => descriptor,
                        None => {
                            // A validated catalog cannot produce this;
                            // contain it to the node rather than crash.
                            plan.warnings.push(format!(
                                "dependency '{}' is missing from the catalog",
                                id
                            ));
                            plan.steps.push(PlanStep {
                                identifier: id.to_string(),
                                display_name: id.to_string(),
                                version: String::new(),
                                dependencies: vec![],
                                already_installed: false,
                                action: PlanAction::Blocked,
                                notes: Some("missing from the catalog".into()),
                            });
                            actions.insert(id, PlanAction::Blocked);
                            continue;
                        }
                    };

                    path.push(id);
                    on_path.insert(id);
                    stack.push(Frame::Exit(id));
                    // Reversed so the first declared dependency is resolved
                    // first.
                    for dep in descriptor.dependencies.iter().rev() {
                        stack.push(Frame::Enter(dep.as_str()));
                    }
                }
                Frame::Exit(id) => {
                    path.pop();
                    on_path.remove(id);

                    let descriptor = match self.catalog.lookup(id) {
                        Some(descriptor) => descriptor,
                        None => continue,
                    };

                    let installed = self.state.is_installed(id, &descriptor.version);
                    let (action, notes) = self.classify(
                        id,
                        descriptor,
                        installed,
                        &actions,
                        &cycle_members,
                    );

                    log::debug!("Resolved '{}' as {:?}", id, action);
                    plan.steps.push(PlanStep {
                        identifier: descriptor.identifier.clone(),
                        display_name: descriptor.display_name.clone(),
                        version: descriptor.version.clone(),
                        dependencies: descriptor.dependencies.clone(),
                        already_installed: installed,
                        action,
                        notes,
                    });
                    actions.insert(id, action);
                }
            }
        }

        log::info!("{}", plan.summary());
        plan
    }

    /// Per-node classification: cycle membership, then already-installed,
    /// then blocked dependencies, then the descriptor's own domain policy.
    fn classify(
        &self,
        id: &str,
        descriptor: &AppDescriptor,
        installed: bool,
        actions: &HashMap<&str, PlanAction>,
        cycle_members: &HashMap<&str, String>,
    ) -> (PlanAction, Option<String>) {
        if let Some(note) = cycle_members.get(id) {
            return (PlanAction::Blocked, Some(note.clone()));
        }

        if installed {
            return (PlanAction::Skip, None);
        }

        // A dependency with no recorded action at this point is an
        // unresolved cycle member; both read as blocked.
        let blocked_dep = descriptor.dependencies.iter().find(|dep| {
            matches!(
                actions.get(dep.as_str()),
                Some(PlanAction::Blocked) | None
            )
        });
        if let Some(dep) = blocked_dep {
            return (
                PlanAction::Blocked,
                Some(format!("unresolvable dependency '{}'", dep)),
            );
        }

        // Planning-time domain policy, so the caller sees the block before
        // any network fetch. The verifier re-checks at artifact time.
        if !descriptor.trusted_domains.is_empty() {
            match descriptor.source_domain() {
                Some(domain) if descriptor.is_trusted_domain(&domain) => {}
                Some(domain) => {
                    return (
                        PlanAction::Blocked,
                        Some(format!("untrusted source '{}'", domain)),
                    );
                }
                None => {
                    return (
                        PlanAction::Blocked,
                        Some("untrusted source: source URI has no parseable host".into()),
                    );
                }
            }
        }

        (PlanAction::Install, None)
    }
}
