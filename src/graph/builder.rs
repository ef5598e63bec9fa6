//! Batch definition of a layer's modules.
//!
//! [`ModuleGraphBuilder`] runs once per deployment layer: it instantiates a
//! [`crate::ModuleRecord`] for every module of a resolved [`Configuration`], wires
//! their static reads, materializes the static export/open tables from the declared
//! directives, and performs the collaborator bookkeeping (service catalog
//! registration, loader-to-layer binding). The enforcement hook is notified of each
//! definition and read edge before the corresponding local state appears.
//!
//! The input configuration is expected to be fully resolved; any edge that cannot
//! be mapped to a concrete module record is a fatal [`Error::GraphError`], because
//! continuing would publish a partial graph.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{
    graph::{
        config::{Configuration, EdgeOrigin},
        layer::Layer,
    },
    hooks::{
        enforcement, LoaderRegistry, NullLoaderRegistry, NullServiceCatalog, ServiceCatalog,
    },
    module::{
        descriptor::PackageGrant,
        identity::{ByIdentity, LoaderId, ModuleRc, ModuleSet},
        record::{GrantTable, ModuleRecord},
        sentinels::sentinels,
    },
    Error, Result,
};

/// Maps module names to the identity of the loader each module is defined into.
///
/// Only recognized built-in mappers may assign modules to the boot or platform
/// loader; the builder rejects privileged assignments from any other mapper. This
/// guards against accidentally defining user modules into the privileged loaders.
pub trait LoaderMapper {
    /// The loader identity for the named module.
    fn loader_for(&self, module_name: &str) -> LoaderId;

    /// Whether this mapper is a recognized built-in one, allowed to use the
    /// privileged loader identities.
    fn is_builtin(&self) -> bool {
        false
    }
}

/// Mapper assigning every module to one named application loader.
pub struct NamedLoaderMapper;

impl LoaderMapper for NamedLoaderMapper {
    fn loader_for(&self, _module_name: &str) -> LoaderId {
        LoaderId::named("app")
    }
}

/// The built-in mapper used while defining the foundational layers.
///
/// Modules listed in `platform` go to the platform loader, everything else to the
/// boot loader.
pub struct BuiltinLoaderMapper {
    /// Names of the modules assigned to the platform loader.
    pub platform: HashSet<String>,
}

impl BuiltinLoaderMapper {
    /// A mapper assigning every module to the boot loader.
    #[must_use]
    pub fn boot_only() -> Self {
        BuiltinLoaderMapper {
            platform: HashSet::new(),
        }
    }
}

impl LoaderMapper for BuiltinLoaderMapper {
    fn loader_for(&self, module_name: &str) -> LoaderId {
        if self.platform.contains(module_name) {
            LoaderId::Platform
        } else {
            LoaderId::Boot
        }
    }

    fn is_builtin(&self) -> bool {
        true
    }
}

/// Batch algorithm instantiating and wiring all modules of one layer.
///
/// # Examples
///
/// ```rust
/// use modscope::prelude::*;
///
/// let dep = ModuleDescriptor::builder("dep")
///     .package("dep.api")
///     .exports("dep.api")
///     .build()?;
/// let user = ModuleDescriptor::builder("user").requires("dep").build()?;
///
/// let cfg = Configuration::resolve(vec![dep, user], vec![])?;
/// let layer = Layer::new(cfg.clone(), vec![]);
/// let modules = ModuleGraphBuilder::new().define_modules(&cfg, &NamedLoaderMapper, &layer)?;
///
/// let dep = modules.get("dep").unwrap();
/// let user = modules.get("user").unwrap();
/// assert!(user.can_read(dep));
/// assert!(dep.is_exported_to_all("dep.api"));
/// # Ok::<(), modscope::Error>(())
/// ```
pub struct ModuleGraphBuilder {
    catalog: Arc<dyn ServiceCatalog>,
    registry: Arc<dyn LoaderRegistry>,
    bootstrap: Option<ModuleRc>,
}

impl ModuleGraphBuilder {
    /// Create a builder with no-op collaborators.
    #[must_use]
    pub fn new() -> Self {
        ModuleGraphBuilder {
            catalog: Arc::new(NullServiceCatalog),
            registry: Arc::new(NullLoaderRegistry),
            bootstrap: None,
        }
    }

    /// Use `catalog` for registering privileged service providers.
    #[must_use]
    pub fn with_service_catalog(mut self, catalog: Arc<dyn ServiceCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Use `registry` for loader-to-layer bookkeeping.
    #[must_use]
    pub fn with_loader_registry(mut self, registry: Arc<dyn LoaderRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Reuse an already-existing record for the foundational module instead of
    /// instantiating a fresh one when its name appears in the configuration.
    #[must_use]
    pub fn with_bootstrap_module(mut self, module: ModuleRc) -> Self {
        self.bootstrap = Some(module);
        self
    }

    /// Instantiate and wire all modules of `configuration` into `layer`.
    ///
    /// Returns the name-to-record map for the freshly defined batch.
    ///
    /// # Arguments
    /// * `configuration` - The resolved configuration to define
    /// * `mapper`        - Module-name-to-loader mapping
    /// * `layer`         - The layer the modules belong to
    ///
    /// # Errors
    /// [`Error::IllegalArgument`] if a non-builtin mapper assigns a module to a
    /// privileged loader; [`Error::EnforcementRejected`] if the enforcement hook
    /// refuses a definition or edge; [`Error::GraphError`] if a resolved edge
    /// cannot be mapped to a module in this batch or any ancestor layer.
    pub fn define_modules(
        &self,
        configuration: &Arc<Configuration>,
        mapper: &dyn LoaderMapper,
        layer: &Arc<Layer>,
    ) -> Result<HashMap<Arc<str>, ModuleRc>> {
        let hook = enforcement();

        // Pass zero: loader identities, with the privileged-assignment guard.
        let mut loaders: HashMap<Arc<str>, LoaderId> = HashMap::new();
        for name in configuration.modules().keys() {
            let loader = mapper.loader_for(name);
            if loader.is_privileged() && !mapper.is_builtin() {
                return Err(illegal_argument!(
                    "loader mapping assigns module '{name}' to the privileged {loader} loader"
                ));
            }
            loaders.insert(name.clone(), loader);
        }

        // First pass: instantiate one record per resolved module.
        let mut modules: HashMap<Arc<str>, ModuleRc> = HashMap::new();
        for (name, resolved) in configuration.modules() {
            let reused = self
                .bootstrap
                .as_ref()
                .filter(|bootstrap| bootstrap.name() == Some(name.as_ref()))
                .cloned();

            let module = match reused {
                Some(bootstrap) => bootstrap,
                None => {
                    let descriptor = resolved.descriptor.clone();
                    let module = ModuleRecord::named(
                        descriptor.clone(),
                        loaders[name].clone(),
                        resolved.location.clone(),
                    );
                    let packages: Vec<&str> =
                        descriptor.packages.iter().map(String::as_str).collect();
                    hook.define_module(
                        &module,
                        descriptor.is_open(),
                        descriptor.version.as_deref(),
                        resolved.location.as_deref(),
                        &packages,
                    )?;
                    module
                }
            };

            module.attach_layer(layer);
            layer.insert(module.clone());
            modules.insert(name.clone(), module);
        }

        // Second pass: wire static reads. Targets read through a parent-layer edge
        // are remembered per module; they take precedence when qualified grant
        // targets are resolved below.
        let mut parent_reads: HashMap<Arc<str>, HashMap<Arc<str>, ModuleRc>> = HashMap::new();
        for (name, resolved) in configuration.modules() {
            let module = &modules[name];
            let mut reads = ModuleSet::new();
            let mut from_parents = HashMap::new();

            for edge in &resolved.reads {
                let target = self.resolve_edge(edge.name.as_ref(), &edge.origin, &modules, layer)?;
                if !matches!(edge.origin, EdgeOrigin::Local) {
                    from_parents.insert(edge.name.clone(), target.clone());
                }
                hook.add_reads(module, Some(&target))?;
                reads.insert(ByIdentity(target));
            }

            if resolved.descriptor.is_automatic() {
                hook.add_reads(module, None)?;
                reads.insert(ByIdentity(sentinels().all_unnamed().clone()));
            }

            module.init_reads(reads);
            parent_reads.insert(name.clone(), from_parents);
        }

        // Third pass: materialize the static export/open tables. The foundational
        // layer commonly declares no opens at all; in that case only exports need
        // materializing.
        let any_opens = configuration
            .modules()
            .values()
            .any(|resolved| !resolved.descriptor.opens.is_empty());
        let exports_only = layer.is_foundational() && !any_opens;

        for (name, resolved) in configuration.modules() {
            let module = &modules[name];
            let descriptor = &resolved.descriptor;
            if descriptor.is_open() || descriptor.is_automatic() {
                // Blanket grant is derived from the flag; no tables to build.
                continue;
            }
            let empty = HashMap::new();
            let from_parents = parent_reads.get(name).unwrap_or(&empty);

            let opens = if exports_only {
                GrantTable::new()
            } else {
                self.materialize_grants(&descriptor.opens, from_parents, &modules, layer)
            };
            let exports = self.materialize_exports(
                &descriptor.exports,
                &opens,
                from_parents,
                &modules,
                layer,
            );

            if !opens.is_empty() {
                module.publish_opens(Some(Arc::new(opens)));
            }
            if !exports.is_empty() {
                module.publish_exports(Some(Arc::new(exports)));
            }
        }

        // Collaborator bookkeeping: privileged providers land in the service
        // catalog, non-privileged loaders are bound to this layer.
        for (name, resolved) in configuration.modules() {
            if loaders[name].is_privileged() && !resolved.descriptor.provides.is_empty() {
                self.catalog.register(&modules[name]);
            }
        }
        let mut bound: HashSet<LoaderId> = HashSet::new();
        for loader in loaders.values() {
            if !loader.is_privileged() && bound.insert(loader.clone()) {
                self.registry.bind_to_layer(loader, layer);
            }
        }

        Ok(modules)
    }

    /// Map one resolved read edge to a concrete module record.
    fn resolve_edge(
        &self,
        name: &str,
        origin: &EdgeOrigin,
        batch: &HashMap<Arc<str>, ModuleRc>,
        layer: &Arc<Layer>,
    ) -> Result<ModuleRc> {
        match origin {
            EdgeOrigin::Local => batch.get(name).cloned().ok_or_else(|| {
                Error::GraphError(format!("read edge to '{name}' missing from this batch"))
            }),
            EdgeOrigin::Parent(satisfier) => {
                let satisfier = satisfier.upgrade().ok_or_else(|| {
                    Error::GraphError(format!(
                        "configuration satisfying read edge to '{name}' no longer exists"
                    ))
                })?;
                let parent_layer = layer
                    .parents()
                    .iter()
                    .find_map(|parent| parent.layer_for_configuration(&satisfier))
                    .ok_or_else(|| {
                        Error::GraphError(format!(
                            "no ancestor layer matches the configuration of read edge to '{name}'"
                        ))
                    })?;
                parent_layer.module(name).ok_or_else(|| {
                    Error::GraphError(format!(
                        "read edge to '{name}' missing from its ancestor layer"
                    ))
                })
            }
        }
    }

    /// Materialize declared opens (or any grant list) into a static table.
    ///
    /// Unqualified grants target the everyone sentinel. Qualified target names that
    /// resolve nowhere are silently dropped from that grant; target modules are
    /// optional best-effort hints, not build preconditions.
    fn materialize_grants(
        &self,
        grants: &[PackageGrant],
        from_parents: &HashMap<Arc<str>, ModuleRc>,
        batch: &HashMap<Arc<str>, ModuleRc>,
        layer: &Arc<Layer>,
    ) -> GrantTable {
        let mut table = GrantTable::new();
        for grant in grants {
            let targets = table.entry(grant.package.clone()).or_default();
            if grant.is_qualified() {
                for target_name in &grant.targets {
                    if let Some(target) =
                        self.resolve_target(target_name, from_parents, batch, layer)
                    {
                        targets.insert(ByIdentity(target));
                    }
                }
                if targets.is_empty() {
                    table.remove(&grant.package);
                }
            } else {
                targets.insert(ByIdentity(sentinels().everyone().clone()));
            }
        }
        table
    }

    /// Materialize declared exports, skipping every (package, target) pair already
    /// covered by an open grant to the same target - opens subsume exports, and an
    /// unqualified open suppresses all exports of its package.
    fn materialize_exports(
        &self,
        grants: &[PackageGrant],
        opens: &GrantTable,
        from_parents: &HashMap<Arc<str>, ModuleRc>,
        batch: &HashMap<Arc<str>, ModuleRc>,
        layer: &Arc<Layer>,
    ) -> GrantTable {
        let everyone = ByIdentity(sentinels().everyone().clone());
        let mut table = GrantTable::new();

        for grant in grants {
            let open_targets = opens.get(&grant.package);
            if open_targets.is_some_and(|targets| targets.contains(&everyone)) {
                continue;
            }

            let mut resolved: ModuleSet = ModuleSet::new();
            if grant.is_qualified() {
                for target_name in &grant.targets {
                    if let Some(target) =
                        self.resolve_target(target_name, from_parents, batch, layer)
                    {
                        resolved.insert(ByIdentity(target));
                    }
                }
            } else {
                resolved.insert(everyone.clone());
            }

            // Identity comparison: a target opened by another layer's record of the
            // same name is still an export target here.
            if let Some(open_targets) = open_targets {
                resolved.retain(|target| !open_targets.contains(target));
            }
            if !resolved.is_empty() {
                table.entry(grant.package.clone()).or_default().extend(resolved);
            }
        }
        table
    }

    /// Resolve a qualified grant target name, preferring a module already read via
    /// a parent-layer edge, then this batch, then any ancestor layer by direct
    /// name search.
    fn resolve_target(
        &self,
        name: &str,
        from_parents: &HashMap<Arc<str>, ModuleRc>,
        batch: &HashMap<Arc<str>, ModuleRc>,
        layer: &Arc<Layer>,
    ) -> Option<ModuleRc> {
        if let Some(target) = from_parents.get(name) {
            return Some(target.clone());
        }
        if let Some(target) = batch.get(name) {
            return Some(target.clone());
        }
        layer
            .parents()
            .iter()
            .find_map(|parent| parent.find_module(name))
    }
}

impl Default for ModuleGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
