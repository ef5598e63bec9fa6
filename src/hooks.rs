//! External collaborator interfaces.
//!
//! The access-control core does not enforce anything itself and does not know how the
//! surrounding runtime launches processes, loads annotations or publishes services. It
//! talks to those concerns through the narrow traits in this module. All of them have
//! no-op defaults so the core is usable standalone (and in tests).
//!
//! # Ordering contract
//!
//! Every [`EnforcementHook`] notification fires *before* the corresponding local state
//! change. If the hook returns an error the mutation is abandoned with the local graph
//! untouched - the enforcement layer is updated first, just in case it fails.

use std::sync::{Arc, OnceLock, RwLock};

use crate::{
    graph::layer::Layer,
    module::identity::{LoaderId, ModuleRc, ServiceRc},
    Result,
};

/// Notifications to the lower enforcement layer.
///
/// Implementations keep an out-of-scope enforcement mechanism synchronized with the
/// in-memory graph. Calls are synchronous; a returned error vetoes the mutation that
/// triggered the notification.
pub trait EnforcementHook: Send + Sync {
    /// A module has been instantiated for a layer.
    ///
    /// # Arguments
    /// * `module`   - The freshly created module
    /// * `is_open`  - Whether the module was declared open
    /// * `version`  - Declared version, if any
    /// * `location` - Origin location, if any
    /// * `packages` - The packages contained in the module
    ///
    /// # Errors
    /// An error aborts the layer build before the module is published.
    fn define_module(
        &self,
        module: &ModuleRc,
        is_open: bool,
        version: Option<&str>,
        location: Option<&str>,
        packages: &[&str],
    ) -> Result<()>;

    /// A reads edge is about to be recorded.
    ///
    /// # Arguments
    /// * `from` - The reading module
    /// * `to`   - The read module, or `None` meaning "all unnamed modules"
    ///
    /// # Errors
    /// An error vetoes the edge; no local state changes.
    fn add_reads(&self, from: &ModuleRc, to: Option<&ModuleRc>) -> Result<()>;

    /// A package is about to be exported or opened to one specific module.
    ///
    /// # Errors
    /// An error vetoes the grant; no local state changes.
    fn add_exports(&self, from: &ModuleRc, package: &str, to: &ModuleRc) -> Result<()>;

    /// A package is about to be exported or opened to every module.
    ///
    /// # Errors
    /// An error vetoes the grant; no local state changes.
    fn add_exports_to_all(&self, from: &ModuleRc, package: &str) -> Result<()>;

    /// A package is about to be exported or opened to all unnamed modules.
    ///
    /// # Errors
    /// An error vetoes the grant; no local state changes.
    fn add_exports_to_all_unnamed(&self, from: &ModuleRc, package: &str) -> Result<()>;
}

/// Enforcement hook that accepts everything and does nothing.
pub struct NullEnforcement;

impl EnforcementHook for NullEnforcement {
    fn define_module(
        &self,
        _module: &ModuleRc,
        _is_open: bool,
        _version: Option<&str>,
        _location: Option<&str>,
        _packages: &[&str],
    ) -> Result<()> {
        Ok(())
    }

    fn add_reads(&self, _from: &ModuleRc, _to: Option<&ModuleRc>) -> Result<()> {
        Ok(())
    }

    fn add_exports(&self, _from: &ModuleRc, _package: &str, _to: &ModuleRc) -> Result<()> {
        Ok(())
    }

    fn add_exports_to_all(&self, _from: &ModuleRc, _package: &str) -> Result<()> {
        Ok(())
    }

    fn add_exports_to_all_unnamed(&self, _from: &ModuleRc, _package: &str) -> Result<()> {
        Ok(())
    }
}

static ENFORCEMENT: RwLock<Option<Arc<dyn EnforcementHook>>> = RwLock::new(None);
static NULL_HOOK: OnceLock<Arc<dyn EnforcementHook>> = OnceLock::new();

fn null_hook() -> Arc<dyn EnforcementHook> {
    NULL_HOOK.get_or_init(|| Arc::new(NullEnforcement)).clone()
}

/// Install the process-wide enforcement hook.
///
/// Replaces any previously installed hook. Mutations in flight keep the hook they
/// already resolved.
pub fn set_enforcement_hook(hook: Arc<dyn EnforcementHook>) {
    if let Ok(mut slot) = ENFORCEMENT.write() {
        *slot = Some(hook);
    }
}

/// The currently installed enforcement hook, or the shared no-op stand-in.
#[must_use]
pub fn enforcement() -> Arc<dyn EnforcementHook> {
    match ENFORCEMENT.read() {
        Ok(slot) => match slot.as_ref() {
            Some(hook) => hook.clone(),
            None => null_hook(),
        },
        Err(_) => null_hook(),
    }
}

/// Service catalog registration for boot- and platform-loaded providers.
pub trait ServiceCatalog: Send + Sync {
    /// Register the providers declared by `module`.
    fn register(&self, module: &ModuleRc);
}

/// Catalog that ignores registrations.
pub struct NullServiceCatalog;

impl ServiceCatalog for NullServiceCatalog {
    fn register(&self, _module: &ModuleRc) {}
}

/// Bookkeeping for which layer a non-privileged loader has defined modules into.
pub trait LoaderRegistry: Send + Sync {
    /// Record that `loader` now has modules in `layer`.
    fn bind_to_layer(&self, loader: &LoaderId, layer: &Arc<Layer>);
}

/// Registry that ignores bindings.
pub struct NullLoaderRegistry;

impl LoaderRegistry for NullLoaderRegistry {
    fn bind_to_layer(&self, _loader: &LoaderId, _layer: &Arc<Layer>) {}
}

/// Loads the declared-annotations-bearing representative type for a module.
pub trait AnnotationLoader: Send + Sync {
    /// The canonical type carrying `module`'s declared annotations, or `None`.
    fn declared_annotations_type(&self, module: &ModuleRc) -> Option<ServiceRc>;
}

/// Decides whether a resource name is subject to package encapsulation.
///
/// Consulted by [`crate::ModuleRecord::is_resource_open`]: resources the policy
/// classifies as not encapsulatable (metadata files, directories, class files in the
/// original system) bypass the per-package open check entirely.
pub trait ResourcePolicy: Send + Sync {
    /// Returns true if access to `resource_name` must honor package opens.
    fn is_encapsulated(&self, resource_name: &str) -> bool;
}
