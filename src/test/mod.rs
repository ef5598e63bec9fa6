use std::sync::Arc;

use crate::module::{
    descriptor::ModuleDescriptor,
    identity::{LoaderId, ModuleRc},
    record::ModuleRecord,
};

// Helper function to create a named module containing the given packages
pub fn create_named(name: &str, packages: &[&str]) -> ModuleRc {
    let mut builder = ModuleDescriptor::builder(name);
    for package in packages {
        builder = builder.package(package);
    }
    ModuleRecord::named(builder.build().unwrap(), LoaderId::named("app"), None)
}

// Helper function to create the usual two-module test fixture: "m1" containing
// package "a.b" and an unrelated "m2"
pub fn create_pair() -> (ModuleRc, ModuleRc) {
    (create_named("m1", &["a.b"]), create_named("m2", &[]))
}

// Helper function to create a named module from a prebuilt descriptor
pub fn create_from_descriptor(descriptor: Arc<ModuleDescriptor>) -> ModuleRc {
    ModuleRecord::named(descriptor, LoaderId::named("app"), None)
}
