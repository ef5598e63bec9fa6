//! Resolved dependency configurations.
//!
//! A [`Configuration`] is the validated output of dependency resolution: one
//! [`ResolvedModule`] per module of a deployment unit, each carrying its descriptor
//! and the concrete read edges resolution produced. Configurations form the same
//! parent DAG as the layers later defined from them; an edge records which
//! configuration satisfied it so the graph builder can locate the right layer.
//!
//! The builder treats a configuration as already validated: a dangling edge found
//! during module definition is a fatal [`crate::Error::GraphError`], never a
//! recoverable per-module condition.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use crate::{module::descriptor::ModuleDescriptor, Error, Result};

/// Which configuration satisfied a resolved read edge.
#[derive(Clone)]
pub enum EdgeOrigin {
    /// The edge points at a module of the same configuration.
    Local,
    /// The edge was satisfied by a (transitive) parent configuration.
    Parent(Weak<Configuration>),
}

/// One resolved static dependency edge.
#[derive(Clone)]
pub struct ReadEdge {
    /// Name of the read module.
    pub name: Arc<str>,
    /// The configuration the edge resolves into.
    pub origin: EdgeOrigin,
}

/// A module together with the dependency edges resolution assigned to it.
pub struct ResolvedModule {
    /// The declared metadata.
    pub descriptor: Arc<ModuleDescriptor>,
    /// Origin location hint, if any.
    pub location: Option<String>,
    /// Resolved static read edges.
    pub reads: Vec<ReadEdge>,
}

/// A resolved set of modules, with zero or more parent configurations.
pub struct Configuration {
    parents: Vec<Arc<Configuration>>,
    modules: HashMap<Arc<str>, Arc<ResolvedModule>>,
}

impl Configuration {
    /// The empty root configuration.
    #[must_use]
    pub fn empty() -> Arc<Configuration> {
        Arc::new(Configuration {
            parents: Vec::new(),
            modules: HashMap::new(),
        })
    }

    /// Resolve `descriptors` against each other and the given parents.
    ///
    /// Every `requires` entry must name a module of this batch or of a (transitive)
    /// parent configuration. Automatic modules additionally receive read edges to
    /// every other module of the batch - they can name no dependencies of their own.
    ///
    /// # Arguments
    /// * `descriptors` - Declarations of the modules to resolve together
    /// * `parents`     - Already resolved parent configurations
    ///
    /// # Errors
    /// [`Error::GraphError`] if two descriptors share a name or a `requires` entry
    /// resolves nowhere.
    pub fn resolve(
        descriptors: Vec<Arc<ModuleDescriptor>>,
        parents: Vec<Arc<Configuration>>,
    ) -> Result<Arc<Configuration>> {
        let mut names: HashMap<Arc<str>, Arc<ModuleDescriptor>> = HashMap::new();
        for descriptor in &descriptors {
            if names
                .insert(descriptor.name.clone(), descriptor.clone())
                .is_some()
            {
                return Err(Error::GraphError(format!(
                    "duplicate module name '{}' in configuration",
                    descriptor.name
                )));
            }
        }

        let mut modules = HashMap::new();
        for descriptor in &descriptors {
            let mut reads = Vec::new();

            for required in &descriptor.requires {
                if names.contains_key(required.as_str()) {
                    reads.push(ReadEdge {
                        name: Arc::from(required.as_str()),
                        origin: EdgeOrigin::Local,
                    });
                } else if let Some(satisfier) = find_in_parents(&parents, required) {
                    reads.push(ReadEdge {
                        name: Arc::from(required.as_str()),
                        origin: EdgeOrigin::Parent(Arc::downgrade(&satisfier)),
                    });
                } else {
                    return Err(Error::GraphError(format!(
                        "module '{}' requires '{}', which resolves nowhere",
                        descriptor.name, required
                    )));
                }
            }

            if descriptor.is_automatic() {
                for other in names.keys() {
                    if **other != *descriptor.name {
                        reads.push(ReadEdge {
                            name: other.clone(),
                            origin: EdgeOrigin::Local,
                        });
                    }
                }
            }

            modules.insert(
                descriptor.name.clone(),
                Arc::new(ResolvedModule {
                    descriptor: descriptor.clone(),
                    location: None,
                    reads,
                }),
            );
        }

        Ok(Arc::new(Configuration { parents, modules }))
    }

    /// Parent configurations.
    #[must_use]
    pub fn parents(&self) -> &[Arc<Configuration>] {
        &self.parents
    }

    /// The resolved modules, keyed by name.
    #[must_use]
    pub fn modules(&self) -> &HashMap<Arc<str>, Arc<ResolvedModule>> {
        &self.modules
    }

    /// Look up a resolved module of this configuration by name.
    #[must_use]
    pub fn module(&self, name: &str) -> Option<&Arc<ResolvedModule>> {
        self.modules.get(name)
    }
}

/// Depth-first search through parent configurations, returning the configuration
/// that contains `name`.
fn find_in_parents(parents: &[Arc<Configuration>], name: &str) -> Option<Arc<Configuration>> {
    for parent in parents {
        if parent.modules.contains_key(name) {
            return Some(parent.clone());
        }
        if let Some(found) = find_in_parents(&parent.parents, name) {
            return Some(found);
        }
    }
    None
}
