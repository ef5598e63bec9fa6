//! The read-only access query surface.
//!
//! Every cross-module reflective or resource access consults these queries. They
//! combine four sources - the axioms (a module reads itself, an unnamed module
//! reads and exports everything), descriptor flags (open/automatic blanket
//! grants), the static tables computed at layer-definition time, and the
//! reflective overlay - with any-true-source-wins semantics: the sources are
//! independent ORs, not an ordered precedence chain.
//!
//! Queries never mutate and never consult the native-access capability flag.

use std::sync::Arc;

use crate::{
    hooks::{AnnotationLoader, ResourcePolicy},
    module::{
        identity::{set_contains, ModuleRc, ModuleSet, ServiceRc},
        record::{reflection, ModuleRecord},
        sentinels::sentinels,
    },
};

/// True if `target` is covered by a static target set, honoring the wildcard
/// sentinels: a set mentioning "everyone" covers any target, and one mentioning
/// "all unnamed" covers any unnamed target.
fn target_matches(targets: &ModuleSet, target: &ModuleRc) -> bool {
    let s = sentinels();
    set_contains(targets, target)
        || set_contains(targets, s.everyone())
        || (!target.is_named() && set_contains(targets, s.all_unnamed()))
}

impl ModuleRecord {
    /// Can this module read `other`?
    ///
    /// True if this module is unnamed, if `other` is this module itself, if the
    /// static reads set contains `other`, or if a reflective reads edge exists.
    /// In both the static set and the overlay, the all-unnamed wildcard edge
    /// covers any unnamed `other`.
    #[must_use]
    pub fn can_read(self: &Arc<Self>, other: &ModuleRc) -> bool {
        if !self.is_named() {
            return true;
        }
        if Arc::ptr_eq(other, self) {
            return true;
        }
        if let Some(reads) = self.static_reads() {
            if set_contains(reads, other) {
                return true;
            }
            // The all-unnamed wildcard may live in the static set too (automatic
            // modules get it at definition time).
            if !other.is_named() && set_contains(reads, sentinels().all_unnamed()) {
                return true;
            }
        }

        let tables = reflection();
        if tables.reads.contains_pair(self, other) {
            return true;
        }
        if !other.is_named() && tables.reads.contains_pair(self, sentinels().all_unnamed()) {
            return true;
        }
        false
    }

    /// Is `package` exported to `target`?
    ///
    /// Open implies export: an open grant from any source satisfies an export
    /// query.
    #[must_use]
    pub fn is_exported(self: &Arc<Self>, package: &str, target: &ModuleRc) -> bool {
        self.is_exported_or_open(package, target, false)
    }

    /// Is `package` open to `target`?
    #[must_use]
    pub fn is_open(self: &Arc<Self>, package: &str, target: &ModuleRc) -> bool {
        self.is_exported_or_open(package, target, true)
    }

    /// Is `package` exported unconditionally (to everyone)?
    #[must_use]
    pub fn is_exported_to_all(self: &Arc<Self>, package: &str) -> bool {
        self.is_exported(package, sentinels().everyone())
    }

    /// Is `package` open unconditionally (to everyone)?
    #[must_use]
    pub fn is_open_to_all(self: &Arc<Self>, package: &str) -> bool {
        self.is_open(package, sentinels().everyone())
    }

    fn is_exported_or_open(self: &Arc<Self>, package: &str, target: &ModuleRc, open: bool) -> bool {
        // Unnamed modules export and open every package.
        if !self.is_named() {
            return true;
        }
        // A module always has full access to its own packages.
        if Arc::ptr_eq(target, self) && self.contains_package(package) {
            return true;
        }
        if let Some(descriptor) = self.descriptor() {
            if (descriptor.is_open() || descriptor.is_automatic())
                && descriptor.contains_package(package)
            {
                return true;
            }
        }

        // Static tables. An open grant satisfies both query kinds.
        if let Some(opens) = self.open_snapshot() {
            if let Some(targets) = opens.get(package) {
                if target_matches(targets, target) {
                    return true;
                }
            }
        }
        if !open {
            if let Some(exports) = self.exported_snapshot() {
                if let Some(targets) = exports.get(package) {
                    if target_matches(targets, target) {
                        return true;
                    }
                }
            }
        }

        // Reflective overlay, keyed by the concrete target and by the wildcards
        // that cover it.
        let s = sentinels();
        let exports = &reflection().exports;
        let mut keys: Vec<&ModuleRc> = vec![target, s.everyone()];
        if !target.is_named() {
            keys.push(s.all_unnamed());
        }
        for key in keys {
            if let Some(grants) = exports.get(self, key) {
                if let Some(entry) = grants.get(package) {
                    if *entry || !open {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Can this module use the given service type?
    ///
    /// True for unnamed and automatic modules, for declared uses (matched by
    /// service name), and for reflectively recorded uses (matched by identity).
    #[must_use]
    pub fn can_use(self: &Arc<Self>, service: &ServiceRc) -> bool {
        let Some(descriptor) = self.descriptor() else {
            return true;
        };
        if descriptor.is_automatic() {
            return true;
        }
        if descriptor.uses.contains(&*service.name) {
            return true;
        }
        reflection().uses.contains_pair(self, service)
    }

    /// Is the named resource reachable by `caller` despite package encapsulation?
    ///
    /// Resources the policy classifies as not encapsulatable bypass the check, as
    /// do resources outside any contained package; everything else requires the
    /// containing package to be open to `caller`.
    #[must_use]
    pub fn is_resource_open(
        self: &Arc<Self>,
        resource_name: &str,
        caller: &ModuleRc,
        policy: &dyn ResourcePolicy,
    ) -> bool {
        if !self.is_named() {
            return true;
        }
        if !policy.is_encapsulated(resource_name) {
            return true;
        }
        let Some(package) = resource_package(resource_name) else {
            return true;
        };
        if !self.contains_package(&package) {
            return true;
        }
        self.is_open(&package, caller)
    }

    /// The canonical type carrying this module's declared annotations, if the
    /// annotation collaborator knows one.
    #[must_use]
    pub fn declared_annotations_type(
        self: &Arc<Self>,
        loader: &dyn AnnotationLoader,
    ) -> Option<ServiceRc> {
        loader.declared_annotations_type(self)
    }
}

/// The package a resource name falls into, or `None` for root resources.
///
/// `"a/b/c.props"` maps to package `"a.b"`.
fn resource_package(resource_name: &str) -> Option<String> {
    let trimmed = resource_name.trim_start_matches('/');
    let (dir, _file) = trimmed.rsplit_once('/')?;
    if dir.is_empty() {
        return None;
    }
    Some(dir.replace('/', "."))
}
