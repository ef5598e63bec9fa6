//! Reference-identity handles for modules, loaders and service types.
//!
//! Modules are long-lived runtime objects compared by identity, never by name: two
//! unnamed modules with identical state are still distinct, and two layers may hold
//! distinct records for conceptually related names. This module provides the shared
//! handle aliases, an identity-keyed set wrapper, and the loader/service identities
//! the rest of the crate hangs access decisions on.

use std::{
    collections::HashSet,
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, Weak},
};

use crate::module::record::ModuleRecord;

/// A reference counted [`ModuleRecord`].
pub type ModuleRc = Arc<ModuleRecord>;

/// A weak handle to a [`ModuleRecord`].
pub type ModuleWeak = Weak<ModuleRecord>;

/// A [`ModuleRc`] wrapper that hashes and compares by reference identity.
///
/// Used as the element type of every target set in the static grant tables, where the
/// spec'd comparison is "by module identity, not by name".
#[derive(Clone)]
pub struct ByIdentity(pub ModuleRc);

impl ByIdentity {
    /// The wrapped module handle.
    #[must_use]
    pub fn module(&self) -> &ModuleRc {
        &self.0
    }
}

impl PartialEq for ByIdentity {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ByIdentity {}

impl Hash for ByIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for ByIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByIdentity({:?})", self.0.name())
    }
}

/// An identity-keyed set of modules.
pub type ModuleSet = HashSet<ByIdentity>;

/// Convenience check for membership of `module` in an identity set.
#[must_use]
pub fn set_contains(set: &ModuleSet, module: &ModuleRc) -> bool {
    set.contains(&ByIdentity(module.clone()))
}

/// The identity of the class loader a module was defined into.
///
/// The two privileged identities exist before any layer is built and carry special
/// meaning: modules defined into them receive the native-access capability, and only
/// recognized built-in loader mappers may assign user modules to them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LoaderId {
    /// The bootstrap loader, owner of the foundational module.
    Boot,
    /// The platform loader for privileged non-foundational modules.
    Platform,
    /// An application or custom loader, identified by name.
    Named(Arc<str>),
}

impl LoaderId {
    /// Create a named (non-privileged) loader identity.
    #[must_use]
    pub fn named(name: &str) -> Self {
        LoaderId::Named(Arc::from(name))
    }

    /// Returns true for the boot and platform identities.
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        matches!(self, LoaderId::Boot | LoaderId::Platform)
    }
}

impl fmt::Display for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderId::Boot => write!(f, "boot"),
            LoaderId::Platform => write!(f, "platform"),
            LoaderId::Named(name) => write!(f, "{name}"),
        }
    }
}

/// A canonical service-type handle.
///
/// Service types are interned by the runtime that owns this crate; the access-control
/// core compares them by reference identity, exactly like modules. The carried name is
/// only used to match against a descriptor's declared `uses` entries.
pub struct ServiceType {
    /// Fully qualified name of the service interface.
    pub name: Arc<str>,
}

impl ServiceType {
    /// Create a new canonical service-type handle.
    #[must_use]
    pub fn new(name: &str) -> ServiceRc {
        Arc::new(ServiceType {
            name: Arc::from(name),
        })
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceType({})", self.name)
    }
}

/// A reference counted [`ServiceType`].
pub type ServiceRc = Arc<ServiceType>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::record::ModuleRecord;

    #[test]
    fn identity_set_distinguishes_equal_looking_modules() {
        let first = ModuleRecord::unnamed(LoaderId::named("app"));
        let second = ModuleRecord::unnamed(LoaderId::named("app"));

        let mut set = ModuleSet::new();
        set.insert(ByIdentity(first.clone()));

        assert!(set_contains(&set, &first));
        assert!(!set_contains(&set, &second));
    }

    #[test]
    fn loader_privilege() {
        assert!(LoaderId::Boot.is_privileged());
        assert!(LoaderId::Platform.is_privileged());
        assert!(!LoaderId::named("app").is_privileged());
    }
}
