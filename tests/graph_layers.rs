//! Layer definition: static wiring, cross-layer resolution and collaborator
//! bookkeeping.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use modscope::prelude::*;

fn define_layer(
    descriptors: Vec<Arc<ModuleDescriptor>>,
    parents: Vec<Arc<Layer>>,
) -> (Arc<Layer>, HashMap<Arc<str>, ModuleRc>) {
    let parent_cfgs = parents
        .iter()
        .map(|layer| layer.configuration().clone())
        .collect();
    let cfg = Configuration::resolve(descriptors, parent_cfgs).unwrap();
    let layer = Layer::new(cfg.clone(), parents);
    let modules = ModuleGraphBuilder::new()
        .define_modules(&cfg, &NamedLoaderMapper, &layer)
        .unwrap();
    (layer, modules)
}

#[test]
fn static_reads_within_one_layer() {
    let api = ModuleDescriptor::builder("api").build().unwrap();
    let app = ModuleDescriptor::builder("app").requires("api").build().unwrap();
    let (_layer, modules) = define_layer(vec![api, app], vec![]);

    assert!(modules["app"].can_read(&modules["api"]));
    assert!(!modules["api"].can_read(&modules["app"]));
}

#[test]
fn reads_resolve_into_parent_layers() {
    let base = ModuleDescriptor::builder("base").build().unwrap();
    let (parent, parent_modules) = define_layer(vec![base], vec![]);

    let user = ModuleDescriptor::builder("user").requires("base").build().unwrap();
    let (_child, child_modules) = define_layer(vec![user], vec![parent]);

    assert!(child_modules["user"].can_read(&parent_modules["base"]));
}

#[test]
fn reads_resolve_through_grandparent_layers() {
    let base = ModuleDescriptor::builder("base").build().unwrap();
    let (grandparent, grandparent_modules) = define_layer(vec![base], vec![]);

    let middle_descriptor = ModuleDescriptor::builder("middle").build().unwrap();
    let (parent, _) = define_layer(vec![middle_descriptor], vec![grandparent]);

    let user = ModuleDescriptor::builder("user").requires("base").build().unwrap();
    let (_child, child_modules) = define_layer(vec![user], vec![parent]);

    assert!(child_modules["user"].can_read(&grandparent_modules["base"]));
}

#[test]
fn missing_ancestor_layer_is_fatal() {
    let base = ModuleDescriptor::builder("base").build().unwrap();
    let parent_cfg = Configuration::resolve(vec![base], vec![]).unwrap();

    let user = ModuleDescriptor::builder("user").requires("base").build().unwrap();
    let cfg = Configuration::resolve(vec![user], vec![parent_cfg]).unwrap();

    // The layer is built without the parent layer the configuration promises.
    let layer = Layer::new(cfg.clone(), vec![]);
    let result = ModuleGraphBuilder::new().define_modules(&cfg, &NamedLoaderMapper, &layer);
    assert!(matches!(result, Err(Error::GraphError(_))));
}

#[test]
fn absent_qualified_export_target_is_dropped() {
    // The declared target "X" exists neither in this batch nor in any parent.
    let m = ModuleDescriptor::builder("m")
        .package("a.b")
        .exports_to("a.b", &["X"])
        .build()
        .unwrap();
    let (_layer, modules) = define_layer(vec![m], vec![]);

    let stranger = ModuleRecord::named(
        ModuleDescriptor::builder("stranger").build().unwrap(),
        LoaderId::named("app"),
        None,
    );
    assert!(!modules["m"].is_exported_to_all("a.b"));
    assert!(!modules["m"].is_exported("a.b", &stranger));
}

#[test]
fn automatic_module_reads_all_unnamed_after_define() {
    let auto = ModuleDescriptor::builder("auto").automatic().build().unwrap();
    let t = ModuleDescriptor::builder("t").build().unwrap();
    let (_layer, modules) = define_layer(vec![auto, t], vec![]);

    let auto = &modules["auto"];
    assert!(auto.can_read(sentinels().all_unnamed()));
    assert!(auto.can_read(&ModuleRecord::unnamed(LoaderId::named("app"))));
    assert!(auto.can_read(&modules["t"]));
}

#[test]
fn qualified_open_to_parent_layer_module() {
    let inject = ModuleDescriptor::builder("inject").build().unwrap();
    let (parent, parent_modules) = define_layer(vec![inject], vec![]);

    let component = ModuleDescriptor::builder("component")
        .package("component.impl")
        .requires("inject")
        .opens_to("component.impl", &["inject"])
        .build()
        .unwrap();
    let (_child, child_modules) = define_layer(vec![component], vec![parent]);

    let component = &child_modules["component"];
    let inject = &parent_modules["inject"];
    assert!(component.is_open("component.impl", inject));
    assert!(!component.is_open_to_all("component.impl"));
}

#[test]
fn layer_name_lookup() {
    let api = ModuleDescriptor::builder("api").build().unwrap();
    let (parent, _) = define_layer(vec![api], vec![]);

    let app = ModuleDescriptor::builder("app").build().unwrap();
    let (child, _) = define_layer(vec![app], vec![parent.clone()]);

    assert!(child.module("app").is_some());
    assert!(child.module("api").is_none());
    assert!(child.find_module("api").is_some());
    assert!(Arc::ptr_eq(
        &child.find_module("api").unwrap(),
        &parent.module("api").unwrap()
    ));
}

#[test]
fn privileged_providers_land_in_service_catalog() {
    #[derive(Default)]
    struct RecordingCatalog {
        registered: Mutex<Vec<String>>,
    }
    impl ServiceCatalog for RecordingCatalog {
        fn register(&self, module: &ModuleRc) {
            self.registered
                .lock()
                .unwrap()
                .push(module.name().unwrap_or_default().to_string());
        }
    }

    let provider = ModuleDescriptor::builder("provider")
        .package("p.impl")
        .provides("svc.Api", &["p.impl.Impl"])
        .build()
        .unwrap();
    let plain = ModuleDescriptor::builder("plain").build().unwrap();

    let cfg = Configuration::resolve(vec![provider, plain], vec![]).unwrap();
    let layer = Layer::new(cfg.clone(), vec![]);
    let catalog = Arc::new(RecordingCatalog::default());
    ModuleGraphBuilder::new()
        .with_service_catalog(catalog.clone())
        .define_modules(&cfg, &BuiltinLoaderMapper::boot_only(), &layer)
        .unwrap();

    let registered = catalog.registered.lock().unwrap();
    assert_eq!(&*registered, &["provider".to_string()]);
}

#[test]
fn non_privileged_loaders_are_bound_to_their_layer() {
    #[derive(Default)]
    struct RecordingRegistry {
        bindings: Mutex<Vec<String>>,
    }
    impl LoaderRegistry for RecordingRegistry {
        fn bind_to_layer(&self, loader: &LoaderId, _layer: &Arc<Layer>) {
            self.bindings.lock().unwrap().push(loader.to_string());
        }
    }

    let a = ModuleDescriptor::builder("a").build().unwrap();
    let b = ModuleDescriptor::builder("b").build().unwrap();

    let cfg = Configuration::resolve(vec![a, b], vec![]).unwrap();
    let layer = Layer::new(cfg.clone(), vec![]);
    let registry = Arc::new(RecordingRegistry::default());
    ModuleGraphBuilder::new()
        .with_loader_registry(registry.clone())
        .define_modules(&cfg, &NamedLoaderMapper, &layer)
        .unwrap();

    // One shared app loader, bound exactly once.
    let bindings = registry.bindings.lock().unwrap();
    assert_eq!(&*bindings, &["app".to_string()]);
}

#[test]
fn bulk_open_to_all_unnamed_after_define() {
    let m = ModuleDescriptor::builder("m")
        .package("a.b")
        .package("a.c")
        .build()
        .unwrap();
    let (_layer, modules) = define_layer(vec![m], vec![]);
    let m = &modules["m"];

    let unnamed = ModuleRecord::unnamed(LoaderId::named("app"));
    assert!(!m.is_open("a.b", &unnamed));

    m.open_packages_to_all_unnamed(&["a.b", "a.c"]).unwrap();
    assert!(m.is_open("a.b", &unnamed));
    assert!(m.is_open("a.c", &unnamed));

    let named = ModuleRecord::named(
        ModuleDescriptor::builder("n").build().unwrap(),
        LoaderId::named("app"),
        None,
    );
    assert!(!m.is_open("a.b", &named));
}
