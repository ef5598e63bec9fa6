//! Reflective grants must never keep either endpoint alive.

use std::sync::Arc;

use modscope::prelude::*;

fn named(name: &str, packages: &[&str]) -> ModuleRc {
    let mut builder = ModuleDescriptor::builder(name);
    for package in packages {
        builder = builder.package(package);
    }
    ModuleRecord::named(builder.build().unwrap(), LoaderId::named("app"), None)
}

#[test]
fn grant_targets_are_not_retained() {
    let keeper = named("keeper", &["a.b"]);
    let transient = named("transient", &[]);
    let witness = Arc::downgrade(&transient);

    keeper.add_exports(&keeper, "a.b", &transient).unwrap();
    keeper.add_reads(&keeper, &transient).unwrap();
    assert!(keeper.is_exported("a.b", &transient));
    assert!(keeper.can_read(&transient));

    drop(transient);
    assert!(witness.upgrade().is_none());
}

#[test]
fn granting_module_is_not_retained_by_its_own_grants() {
    let target = named("target", &[]);
    let source = named("source", &["p.q"]);
    let witness = Arc::downgrade(&source);

    source.add_exports(&source, "p.q", &target).unwrap();
    source.add_reads(&source, &target).unwrap();

    drop(source);
    assert!(witness.upgrade().is_none());
}

#[test]
fn recorded_service_uses_do_not_retain_the_service_type() {
    let module = named("consumer", &[]);
    let service = ServiceType::new("svc.Short.Lived");
    let witness = Arc::downgrade(&service);

    module.add_uses(&module, &service).unwrap();
    assert!(module.can_use(&service));

    drop(service);
    assert!(witness.upgrade().is_none());
}
