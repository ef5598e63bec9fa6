//! The runtime representation of one module.
//!
//! A [`ModuleRecord`] is a long-lived runtime object, named or unnamed, carrying its
//! declared descriptor, the static grant tables computed when its layer was defined,
//! and mutation entry points for the reflective overlay. Records are handled through
//! [`ModuleRc`] and compared by reference identity throughout.
//!
//! # Static state vs. reflective overlay
//!
//! `reads`, `exported_packages` and `open_packages` are populated once by the graph
//! builder before the record is published, and thereafter act as immutable snapshots
//! (a snapshot may be wholesale-replaced through a single atomic publish, never
//! mutated in place while visible). Everything granted after construction lives in
//! the process-wide [`WeakPairMap`] overlays, which do not keep either endpoint
//! alive. Queries combine both halves; see [`crate::module::access`].
//!
//! # Caller restriction
//!
//! The mutation methods are caller-sensitive: the runtime boundary that knows the
//! call stack passes the invoking module explicitly, and the core rejects callers
//! other than the module being mutated (for opens, also any caller the package is
//! already open to) with [`Error::IllegalCaller`].

use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, OnceLock, RwLock, Weak,
    },
};

use dashmap::DashMap;

use crate::{
    graph::layer::Layer,
    hooks::enforcement,
    module::{
        descriptor::ModuleDescriptor,
        identity::{ByIdentity, LoaderId, ModuleRc, ModuleSet, ServiceRc, ServiceType},
        sentinels::sentinels,
    },
    weak::WeakPairMap,
    Error, Result,
};

/// Static grant table: package name to the set of target modules the package is
/// exported or opened to. Target sets may contain the "everyone" or "all unnamed"
/// sentinel to mean the corresponding wildcard.
pub type GrantTable = HashMap<String, ModuleSet>;

/// Per-pair reflective grant map: package name to "is open" (as opposed to merely
/// exported).
pub(crate) type ReflectiveGrants = Arc<DashMap<String, bool>>;

/// The process-wide reflective overlay tables.
///
/// Three independent relations share the weak pair-map design: reads edges
/// (marker value), export/open grants (per-pair package map) and service uses
/// (marker value). None of them retains a module that is otherwise unreachable.
pub(crate) struct ReflectionTables {
    pub reads: WeakPairMap<ModuleRecord, ModuleRecord, ()>,
    pub exports: WeakPairMap<ModuleRecord, ModuleRecord, ReflectiveGrants>,
    pub uses: WeakPairMap<ModuleRecord, ServiceType, ()>,
}

static REFLECTION: OnceLock<ReflectionTables> = OnceLock::new();

/// The process-wide reflective overlay.
pub(crate) fn reflection() -> &'static ReflectionTables {
    REFLECTION.get_or_init(|| ReflectionTables {
        reads: WeakPairMap::new(),
        exports: WeakPairMap::new(),
        uses: WeakPairMap::new(),
    })
}

/// One runtime module, named or unnamed.
///
/// Unnamed modules carry no descriptor, trivially read every module and export and
/// open every package; two unnamed modules are never equal except by reference
/// identity. Named modules answer queries from their descriptor flags, the static
/// tables their layer's build produced, and the reflective overlay.
pub struct ModuleRecord {
    /// Name, absent for unnamed modules.
    name: Option<Arc<str>>,
    /// Declared metadata, present iff named.
    descriptor: Option<Arc<ModuleDescriptor>>,
    /// Identity of the loader the module was defined into.
    loader: LoaderId,
    /// Origin location hint, if any.
    location: Option<String>,
    /// Layer the module belongs to; unset for unnamed modules and sentinels.
    layer: OnceLock<Weak<Layer>>,
    /// Modules this module statically reads; unset until the builder computes it,
    /// immutable afterwards. Self-reads and unnamed-reads-all are axioms and are
    /// never stored here.
    reads: OnceLock<ModuleSet>,
    /// Static per-package export targets; `None` while no targeted grants exist.
    exported_packages: RwLock<Option<Arc<GrantTable>>>,
    /// Static per-package open targets; `None` while no targeted grants exist.
    /// Never populated for open or automatic modules - their blanket grant is
    /// derived from the descriptor flag.
    open_packages: RwLock<Option<Arc<GrantTable>>>,
    /// Capability flag independent of the export graph.
    enable_native_access: AtomicBool,
}

impl ModuleRecord {
    /// Create a named module from its declaration.
    ///
    /// Modules defined into the boot or platform loader receive the native-access
    /// capability immediately.
    ///
    /// # Arguments
    /// * `descriptor` - The declared metadata
    /// * `loader`     - Identity of the defining loader
    /// * `location`   - Origin location hint, if any
    #[must_use]
    pub fn named(
        descriptor: Arc<ModuleDescriptor>,
        loader: LoaderId,
        location: Option<String>,
    ) -> ModuleRc {
        let native = loader.is_privileged();
        Arc::new(ModuleRecord {
            name: Some(descriptor.name.clone()),
            descriptor: Some(descriptor),
            loader,
            location,
            layer: OnceLock::new(),
            reads: OnceLock::new(),
            exported_packages: RwLock::new(None),
            open_packages: RwLock::new(None),
            enable_native_access: AtomicBool::new(native),
        })
    }

    /// Create an unnamed module for the given loader.
    #[must_use]
    pub fn unnamed(loader: LoaderId) -> ModuleRc {
        Arc::new(ModuleRecord {
            name: None,
            descriptor: None,
            loader,
            location: None,
            layer: OnceLock::new(),
            reads: OnceLock::new(),
            exported_packages: RwLock::new(None),
            open_packages: RwLock::new(None),
            enable_native_access: AtomicBool::new(false),
        })
    }

    /// The module name, or `None` for unnamed modules.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns true if the module has a name.
    #[must_use]
    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }

    /// The declared metadata; present iff the module is named.
    #[must_use]
    pub fn descriptor(&self) -> Option<&Arc<ModuleDescriptor>> {
        self.descriptor.as_ref()
    }

    /// Identity of the loader the module was defined into.
    #[must_use]
    pub fn loader(&self) -> &LoaderId {
        &self.loader
    }

    /// Origin location hint, if any.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// The layer the module was defined into, if still alive.
    #[must_use]
    pub fn layer(&self) -> Option<Arc<Layer>> {
        self.layer.get().and_then(Weak::upgrade)
    }

    /// Returns true if `package` is contained in the module.
    #[must_use]
    pub fn contains_package(&self, package: &str) -> bool {
        self.descriptor
            .as_ref()
            .is_some_and(|d| d.contains_package(package))
    }

    /// Returns true if the module holds the native-access capability.
    #[must_use]
    pub fn is_native_access_enabled(&self) -> bool {
        self.enable_native_access.load(Ordering::Acquire)
    }

    /// Grant the native-access capability. One-way; never revoked.
    pub fn enable_native_access(&self) {
        self.enable_native_access.store(true, Ordering::Release);
    }

    // ---------------------------------------------------------------------------------
    // Mutation surface. Every method notifies the enforcement hook before touching any
    // local state, and leaves the graph unchanged when the hook refuses.
    // ---------------------------------------------------------------------------------

    /// Add a reflective reads edge from this module to `other`.
    ///
    /// No-op if this module is unnamed (it already reads everything), if `other` is
    /// this module itself (a module always reads itself), or if the edge already
    /// exists - in those cases the enforcement hook is not notified. Static reads
    /// computed during the layer build are not extended; the edge lands in the
    /// reflective overlay, which queries consult as a superset.
    ///
    /// # Arguments
    /// * `caller` - The module on whose behalf the mutation runs
    /// * `other`  - The module to read
    ///
    /// # Errors
    /// [`Error::IllegalCaller`] if `caller` is not this module;
    /// [`Error::EnforcementRejected`] if the enforcement hook refuses.
    pub fn add_reads(self: &Arc<Self>, caller: &ModuleRc, other: &ModuleRc) -> Result<()> {
        if !Arc::ptr_eq(caller, self) {
            return Err(Error::IllegalCaller);
        }
        if !self.is_named() || Arc::ptr_eq(other, self) || self.can_read(other) {
            return Ok(());
        }

        let to = if Arc::ptr_eq(other, sentinels().all_unnamed()) {
            None
        } else {
            Some(other)
        };
        enforcement().add_reads(self, to)?;

        reflection().reads.put_if_absent(self, other, ());
        Ok(())
    }

    /// Reflectively export `package` to `other`.
    ///
    /// No-op for unnamed, open and automatic modules (everything is already
    /// exported) and when the package is already exported - or opened, which is
    /// stronger - to `other`.
    ///
    /// # Arguments
    /// * `caller`  - The module on whose behalf the mutation runs
    /// * `package` - Name of the package to export
    /// * `other`   - Target module; may be a wildcard sentinel
    ///
    /// # Errors
    /// [`Error::IllegalCaller`] if `caller` is not this module;
    /// [`Error::IllegalArgument`] if `package` is not contained in this module;
    /// [`Error::EnforcementRejected`] if the enforcement hook refuses.
    pub fn add_exports(
        self: &Arc<Self>,
        caller: &ModuleRc,
        package: &str,
        other: &ModuleRc,
    ) -> Result<()> {
        if !Arc::ptr_eq(caller, self) {
            return Err(Error::IllegalCaller);
        }
        self.add_exports_or_opens(package, other, false)
    }

    /// Reflectively open `package` to `other`.
    ///
    /// Opening promotes an existing exported-only reflective entry; exporting never
    /// downgrades an open one. The caller must be this module, or a module the
    /// package is already open to.
    ///
    /// # Arguments
    /// * `caller`  - The module on whose behalf the mutation runs
    /// * `package` - Name of the package to open
    /// * `other`   - Target module; may be a wildcard sentinel
    ///
    /// # Errors
    /// [`Error::IllegalCaller`] if `caller` is neither this module nor one the
    /// package is already open to; [`Error::IllegalArgument`] if `package` is not
    /// contained in this module; [`Error::EnforcementRejected`] if the enforcement
    /// hook refuses.
    pub fn add_opens(
        self: &Arc<Self>,
        caller: &ModuleRc,
        package: &str,
        other: &ModuleRc,
    ) -> Result<()> {
        if !Arc::ptr_eq(caller, self) && !self.is_open(package, caller) {
            return Err(Error::IllegalCaller);
        }
        self.add_exports_or_opens(package, other, true)
    }

    fn add_exports_or_opens(
        self: &Arc<Self>,
        package: &str,
        other: &ModuleRc,
        open: bool,
    ) -> Result<()> {
        let Some(descriptor) = self.descriptor.as_ref() else {
            // Unnamed modules already export and open everything.
            return Ok(());
        };
        if descriptor.is_open() || descriptor.is_automatic() {
            return Ok(());
        }
        if !descriptor.contains_package(package) {
            return Err(illegal_argument!(
                "package '{}' is not contained in module '{}'",
                package,
                descriptor.name
            ));
        }

        let already = if open {
            self.is_open(package, other)
        } else {
            self.is_exported(package, other)
        };
        if already {
            return Ok(());
        }

        let s = sentinels();
        let hook = enforcement();
        if Arc::ptr_eq(other, s.everyone()) {
            hook.add_exports_to_all(self, package)?;
        } else if Arc::ptr_eq(other, s.all_unnamed()) {
            hook.add_exports_to_all_unnamed(self, package)?;
        } else {
            hook.add_exports(self, package, other)?;
        }

        let grants = reflection()
            .exports
            .compute_if_absent(self, other, || Arc::new(DashMap::new()));
        grants
            .entry(package.to_string())
            .and_modify(|is_open| *is_open |= open)
            .or_insert(open);
        Ok(())
    }

    /// Record that this module uses the given service type.
    ///
    /// No-op for unnamed and automatic modules (they trivially use everything) and
    /// when the use is already declared or already recorded reflectively.
    ///
    /// # Arguments
    /// * `caller`  - The module on whose behalf the mutation runs
    /// * `service` - Canonical handle of the service interface
    ///
    /// # Errors
    /// [`Error::IllegalCaller`] if `caller` is not this module.
    pub fn add_uses(self: &Arc<Self>, caller: &ModuleRc, service: &ServiceRc) -> Result<()> {
        if !Arc::ptr_eq(caller, self) {
            return Err(Error::IllegalCaller);
        }
        let Some(descriptor) = self.descriptor.as_ref() else {
            return Ok(());
        };
        if descriptor.is_automatic() || self.can_use(service) {
            return Ok(());
        }

        reflection().uses.put_if_absent(self, service, ());
        Ok(())
    }

    /// Open the listed contained packages to all unnamed modules.
    ///
    /// The startup-time bulk grant: notifies the enforcement hook per package, then
    /// replaces the static open snapshot with one carrying the all-unnamed sentinel
    /// target for each listed package. A single atomic publish; concurrent readers
    /// see either the old or the new snapshot, never a partial one.
    ///
    /// # Arguments
    /// * `packages` - Names of the packages to open
    ///
    /// # Errors
    /// [`Error::IllegalArgument`] if a listed package is not contained in this
    /// module; [`Error::EnforcementRejected`] if the enforcement hook refuses;
    /// [`Error::LockError`] if the snapshot lock is poisoned.
    pub fn open_packages_to_all_unnamed(self: &Arc<Self>, packages: &[&str]) -> Result<()> {
        let Some(descriptor) = self.descriptor.as_ref() else {
            return Ok(());
        };
        if descriptor.is_open() || descriptor.is_automatic() {
            return Ok(());
        }
        for package in packages {
            if !descriptor.contains_package(package) {
                return Err(illegal_argument!(
                    "package '{}' is not contained in module '{}'",
                    package,
                    descriptor.name
                ));
            }
        }

        let hook = enforcement();
        for package in packages {
            hook.add_exports_to_all_unnamed(self, package)?;
        }

        let all_unnamed = sentinels().all_unnamed().clone();
        let mut slot = self.open_packages.write().map_err(|_| Error::LockError)?;
        let mut table = match slot.as_ref() {
            Some(current) => GrantTable::clone(current),
            None => GrantTable::new(),
        };
        for package in packages {
            table
                .entry((*package).to_string())
                .or_default()
                .insert(ByIdentity(all_unnamed.clone()));
        }
        *slot = Some(Arc::new(table));
        Ok(())
    }

    // ---------------------------------------------------------------------------------
    // Build-time wiring, used by the graph builder before the record is published.
    // ---------------------------------------------------------------------------------

    /// Attach the record to its layer. One-shot; later calls are ignored.
    pub(crate) fn attach_layer(&self, layer: &Arc<Layer>) {
        let _ = self.layer.set(Arc::downgrade(layer));
    }

    /// Install the computed static reads set. One-shot; returns false if a set was
    /// already installed (a reused bootstrap module keeps its original wiring).
    pub(crate) fn init_reads(&self, reads: ModuleSet) -> bool {
        self.reads.set(reads).is_ok()
    }

    /// The static reads set, if computed.
    pub(crate) fn static_reads(&self) -> Option<&ModuleSet> {
        self.reads.get()
    }

    /// Publish the static export table snapshot.
    pub(crate) fn publish_exports(&self, table: Option<Arc<GrantTable>>) {
        if let Ok(mut slot) = self.exported_packages.write() {
            *slot = table;
        }
    }

    /// Publish the static open table snapshot.
    pub(crate) fn publish_opens(&self, table: Option<Arc<GrantTable>>) {
        if let Ok(mut slot) = self.open_packages.write() {
            *slot = table;
        }
    }

    /// Current static export snapshot.
    pub(crate) fn exported_snapshot(&self) -> Option<Arc<GrantTable>> {
        self.exported_packages.read().ok().and_then(|s| s.clone())
    }

    /// Current static open snapshot.
    pub(crate) fn open_snapshot(&self) -> Option<Arc<GrantTable>> {
        self.open_packages.read().ok().and_then(|s| s.clone())
    }
}

impl fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "module {name}"),
            None => write!(f, "unnamed module @{:p}", self as *const ModuleRecord),
        }
    }
}
