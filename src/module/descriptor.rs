//! Declared module metadata.
//!
//! A [`ModuleDescriptor`] is the immutable declaration a named module is built from:
//! its contained packages, static export/open directives, service uses/provides and
//! modifier flags. Descriptors are produced by the runtime's metadata reader (out of
//! scope here) or, mostly in tests, through [`DescriptorBuilder`]. Once attached to a
//! [`crate::ModuleRecord`] a descriptor is never mutated; all later grants go through
//! the record's reflective overlay.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bitflags::bitflags;

use crate::Result;

bitflags! {
    /// Modifier flags of a module declaration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModuleFlags: u8 {
        /// Every contained package is open to every module; nothing further to declare.
        const OPEN = 0x01;
        /// The module was derived without an explicit declaration. Automatic modules
        /// export and open everything and read all unnamed modules.
        const AUTOMATIC = 0x02;
        /// The declaration was generated rather than written by hand.
        const SYNTHETIC = 0x04;
        /// The declaration is implicitly mandated by the runtime.
        const MANDATED = 0x08;
    }
}

/// One declared export or open directive.
///
/// An empty target set means the grant is unqualified (directed at everyone); a
/// non-empty set restricts the grant to the named modules. Target names are resolved
/// to concrete module records only when a layer is defined, and names that resolve
/// nowhere are silently dropped from the materialized grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageGrant {
    /// Name of the package the grant covers.
    pub package: String,
    /// Names of the target modules; empty for an unqualified grant.
    pub targets: HashSet<String>,
}

impl PackageGrant {
    /// Returns true if this grant is restricted to named targets.
    #[must_use]
    pub fn is_qualified(&self) -> bool {
        !self.targets.is_empty()
    }
}

/// The immutable declared metadata of a named module.
///
/// Field layout mirrors what the declaration carries; derived facts (an open module
/// opens everything, an automatic module exports everything) are intentionally not
/// materialized here - queries derive them from [`ModuleFlags`] instead.
#[derive(Debug)]
pub struct ModuleDescriptor {
    /// Name of the module.
    pub name: Arc<str>,
    /// Declared version, if any.
    pub version: Option<String>,
    /// All packages contained in the module.
    pub packages: HashSet<String>,
    /// Names of the modules this module statically requires.
    pub requires: Vec<String>,
    /// Declared export directives.
    pub exports: Vec<PackageGrant>,
    /// Declared open directives.
    pub opens: Vec<PackageGrant>,
    /// Fully qualified names of the service interfaces this module uses.
    pub uses: HashSet<String>,
    /// Service interface name to provider type names.
    pub provides: HashMap<String, Vec<String>>,
    /// Modifier flags.
    pub flags: ModuleFlags,
}

impl ModuleDescriptor {
    /// Start building a descriptor for a module of the given name.
    #[must_use]
    pub fn builder(name: &str) -> DescriptorBuilder {
        DescriptorBuilder::new(name)
    }

    /// Returns true if the module was declared open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.flags.contains(ModuleFlags::OPEN)
    }

    /// Returns true if the module is automatic.
    #[must_use]
    pub fn is_automatic(&self) -> bool {
        self.flags.contains(ModuleFlags::AUTOMATIC)
    }

    /// Returns true if `package` is contained in the module.
    #[must_use]
    pub fn contains_package(&self, package: &str) -> bool {
        self.packages.contains(package)
    }
}

/// Owned builder for [`ModuleDescriptor`].
///
/// Collects directives and validates their structural invariants in [`build`]:
/// exported and opened packages must be contained, automatic modules carry no
/// directives of their own, and an open module has nothing left to open.
///
/// [`build`]: DescriptorBuilder::build
///
/// # Examples
///
/// ```rust
/// use modscope::ModuleDescriptor;
///
/// let descriptor = ModuleDescriptor::builder("web.server")
///     .package("web.server.core")
///     .package("web.server.spi")
///     .requires("web.common")
///     .exports("web.server.spi")
///     .opens_to("web.server.core", &["web.inject"])
///     .uses("web.server.spi.Handler")
///     .build()?;
///
/// assert!(descriptor.contains_package("web.server.spi"));
/// # Ok::<(), modscope::Error>(())
/// ```
pub struct DescriptorBuilder {
    name: Arc<str>,
    version: Option<String>,
    packages: HashSet<String>,
    requires: Vec<String>,
    exports: Vec<PackageGrant>,
    opens: Vec<PackageGrant>,
    uses: HashSet<String>,
    provides: HashMap<String, Vec<String>>,
    flags: ModuleFlags,
}

impl DescriptorBuilder {
    fn new(name: &str) -> Self {
        DescriptorBuilder {
            name: Arc::from(name),
            version: None,
            packages: HashSet::new(),
            requires: Vec::new(),
            exports: Vec::new(),
            opens: Vec::new(),
            uses: HashSet::new(),
            provides: HashMap::new(),
            flags: ModuleFlags::empty(),
        }
    }

    /// Set the declared version.
    #[must_use]
    pub fn version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Add a contained package.
    #[must_use]
    pub fn package(mut self, package: &str) -> Self {
        self.packages.insert(package.to_string());
        self
    }

    /// Add a static dependency on the named module.
    #[must_use]
    pub fn requires(mut self, module: &str) -> Self {
        self.requires.push(module.to_string());
        self
    }

    /// Add an unqualified export of `package`.
    #[must_use]
    pub fn exports(mut self, package: &str) -> Self {
        self.exports.push(PackageGrant {
            package: package.to_string(),
            targets: HashSet::new(),
        });
        self
    }

    /// Add a qualified export of `package` to the named `targets`.
    #[must_use]
    pub fn exports_to(mut self, package: &str, targets: &[&str]) -> Self {
        self.exports.push(PackageGrant {
            package: package.to_string(),
            targets: targets.iter().map(|t| (*t).to_string()).collect(),
        });
        self
    }

    /// Add an unqualified open of `package`.
    #[must_use]
    pub fn opens(mut self, package: &str) -> Self {
        self.opens.push(PackageGrant {
            package: package.to_string(),
            targets: HashSet::new(),
        });
        self
    }

    /// Add a qualified open of `package` to the named `targets`.
    #[must_use]
    pub fn opens_to(mut self, package: &str, targets: &[&str]) -> Self {
        self.opens.push(PackageGrant {
            package: package.to_string(),
            targets: targets.iter().map(|t| (*t).to_string()).collect(),
        });
        self
    }

    /// Declare use of the named service interface.
    #[must_use]
    pub fn uses(mut self, service: &str) -> Self {
        self.uses.insert(service.to_string());
        self
    }

    /// Declare providers for the named service interface.
    #[must_use]
    pub fn provides(mut self, service: &str, providers: &[&str]) -> Self {
        self.provides.insert(
            service.to_string(),
            providers.iter().map(|p| (*p).to_string()).collect(),
        );
        self
    }

    /// Mark the module open.
    #[must_use]
    pub fn open(mut self) -> Self {
        self.flags |= ModuleFlags::OPEN;
        self
    }

    /// Mark the module automatic.
    #[must_use]
    pub fn automatic(mut self) -> Self {
        self.flags |= ModuleFlags::AUTOMATIC;
        self
    }

    /// Finish building, validating structural invariants.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::IllegalArgument`] if an export or open directive names a
    /// package that is not contained in the module, if an automatic module declares
    /// requires/exports/opens, or if an open module declares opens.
    pub fn build(self) -> Result<Arc<ModuleDescriptor>> {
        if self.flags.contains(ModuleFlags::AUTOMATIC)
            && (!self.requires.is_empty() || !self.exports.is_empty() || !self.opens.is_empty())
        {
            return Err(illegal_argument!(
                "automatic module '{}' must not declare requires, exports or opens",
                self.name
            ));
        }
        if self.flags.contains(ModuleFlags::OPEN) && !self.opens.is_empty() {
            return Err(illegal_argument!(
                "open module '{}' must not declare opens",
                self.name
            ));
        }
        for grant in self.exports.iter().chain(self.opens.iter()) {
            if !self.packages.contains(&grant.package) {
                return Err(illegal_argument!(
                    "package '{}' is not contained in module '{}'",
                    grant.package,
                    self.name
                ));
            }
        }

        Ok(Arc::new(ModuleDescriptor {
            name: self.name,
            version: self.version,
            packages: self.packages,
            requires: self.requires,
            exports: self.exports,
            opens: self.opens,
            uses: self.uses,
            provides: self.provides,
            flags: self.flags,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_directives() {
        let descriptor = ModuleDescriptor::builder("m")
            .version("1.2")
            .package("a.b")
            .package("a.c")
            .requires("dep")
            .exports("a.b")
            .opens_to("a.c", &["friend"])
            .uses("svc.Api")
            .provides("svc.Api", &["a.b.Impl"])
            .build()
            .unwrap();

        assert_eq!(&*descriptor.name, "m");
        assert_eq!(descriptor.version.as_deref(), Some("1.2"));
        assert!(descriptor.contains_package("a.b"));
        assert_eq!(descriptor.requires, vec!["dep".to_string()]);
        assert!(!descriptor.exports[0].is_qualified());
        assert!(descriptor.opens[0].is_qualified());
        assert!(descriptor.uses.contains("svc.Api"));
        assert_eq!(descriptor.provides["svc.Api"], vec!["a.b.Impl".to_string()]);
    }

    #[test]
    fn export_of_uncontained_package_is_rejected() {
        let result = ModuleDescriptor::builder("m").exports("missing").build();
        assert!(matches!(
            result,
            Err(crate::Error::IllegalArgument { .. })
        ));
    }

    #[test]
    fn automatic_module_declares_nothing() {
        let result = ModuleDescriptor::builder("m")
            .automatic()
            .package("a.b")
            .exports("a.b")
            .build();
        assert!(matches!(
            result,
            Err(crate::Error::IllegalArgument { .. })
        ));

        let descriptor = ModuleDescriptor::builder("m")
            .automatic()
            .package("a.b")
            .build()
            .unwrap();
        assert!(descriptor.is_automatic());
    }

    #[test]
    fn open_module_declares_no_opens() {
        let result = ModuleDescriptor::builder("m")
            .open()
            .package("a.b")
            .opens("a.b")
            .build();
        assert!(matches!(
            result,
            Err(crate::Error::IllegalArgument { .. })
        ));
    }
}
