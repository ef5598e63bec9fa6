//! Layers of defined modules.
//!
//! A [`Layer`] holds the modules defined together from one [`Configuration`], plus
//! parent pointers forming an explicit DAG. Name resolution across the hierarchy is
//! an explicit ordered search, never implicit dispatch: a layer answers for its own
//! modules first, then asks its parents depth-first.

use std::sync::Arc;

use crossbeam_skiplist::SkipMap;

use crate::{graph::config::Configuration, module::identity::ModuleRc};

/// A set of modules resolved and defined together, with zero or more parents.
pub struct Layer {
    parents: Vec<Arc<Layer>>,
    configuration: Arc<Configuration>,
    modules: SkipMap<Arc<str>, ModuleRc>,
    order: boxcar::Vec<ModuleRc>,
}

impl Layer {
    /// The empty root layer.
    #[must_use]
    pub fn empty() -> Arc<Layer> {
        Arc::new(Layer {
            parents: Vec::new(),
            configuration: Configuration::empty(),
            modules: SkipMap::new(),
            order: boxcar::Vec::new(),
        })
    }

    /// Create a not-yet-populated layer over `configuration`.
    ///
    /// The layer is populated by [`crate::ModuleGraphBuilder::define_modules`].
    #[must_use]
    pub fn new(configuration: Arc<Configuration>, parents: Vec<Arc<Layer>>) -> Arc<Layer> {
        Arc::new(Layer {
            parents,
            configuration,
            modules: SkipMap::new(),
            order: boxcar::Vec::new(),
        })
    }

    /// Parent layers.
    #[must_use]
    pub fn parents(&self) -> &[Arc<Layer>] {
        &self.parents
    }

    /// The configuration this layer was defined from.
    #[must_use]
    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.configuration
    }

    /// A module of this layer (parents not consulted).
    #[must_use]
    pub fn module(&self, name: &str) -> Option<ModuleRc> {
        self.modules.get(name).map(|entry| entry.value().clone())
    }

    /// A module of this layer or any ancestor, searched depth-first.
    #[must_use]
    pub fn find_module(&self, name: &str) -> Option<ModuleRc> {
        if let Some(module) = self.module(name) {
            return Some(module);
        }
        self.parents
            .iter()
            .find_map(|parent| parent.find_module(name))
    }

    /// The layer in this ancestry whose configuration is `configuration`.
    ///
    /// Comparison is by configuration identity; the search recurses through the
    /// whole ancestor DAG, not just immediate parents.
    #[must_use]
    pub fn layer_for_configuration(
        self: &Arc<Self>,
        configuration: &Arc<Configuration>,
    ) -> Option<Arc<Layer>> {
        if Arc::ptr_eq(&self.configuration, configuration) {
            return Some(self.clone());
        }
        self.parents
            .iter()
            .find_map(|parent| parent.layer_for_configuration(configuration))
    }

    /// True if no ancestor carries any module - the layer being defined is the
    /// process's foundational one.
    #[must_use]
    pub fn is_foundational(&self) -> bool {
        self.parents
            .iter()
            .all(|parent| parent.is_empty() && parent.is_foundational())
    }

    /// Modules of this layer in definition order.
    #[must_use]
    pub fn modules(&self) -> &boxcar::Vec<ModuleRc> {
        &self.order
    }

    /// Number of modules defined into this layer, unnamed ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.count()
    }

    /// True if no modules have been defined into this layer.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.count() == 0
    }

    /// Publish a freshly defined module into this layer.
    pub(crate) fn insert(&self, module: ModuleRc) {
        if let Some(name) = module.name() {
            self.modules.insert(Arc::from(name), module.clone());
        }
        self.order.push(module);
    }
}
