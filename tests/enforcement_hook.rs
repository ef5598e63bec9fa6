//! Ordering and veto behavior of the process-wide enforcement hook.
//!
//! The hook slot is process global, so this binary holds exactly one test
//! function and runs the whole installation sequence on a single thread.

use std::sync::{Arc, Mutex};

use modscope::{hooks::NullEnforcement, prelude::*};

#[derive(Default)]
struct RecordingHook {
    events: Mutex<Vec<String>>,
}

impl RecordingHook {
    fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl EnforcementHook for RecordingHook {
    fn define_module(
        &self,
        module: &ModuleRc,
        _is_open: bool,
        _version: Option<&str>,
        _location: Option<&str>,
        _packages: &[&str],
    ) -> Result<()> {
        self.push(format!("define {}", module.name().unwrap_or("?")));
        Ok(())
    }

    fn add_reads(&self, from: &ModuleRc, to: Option<&ModuleRc>) -> Result<()> {
        let to = to.and_then(|m| m.name()).unwrap_or("<all-unnamed>");
        self.push(format!("reads {} -> {}", from.name().unwrap_or("?"), to));
        Ok(())
    }

    fn add_exports(&self, from: &ModuleRc, package: &str, to: &ModuleRc) -> Result<()> {
        self.push(format!(
            "exports {}/{} -> {}",
            from.name().unwrap_or("?"),
            package,
            to.name().unwrap_or("?")
        ));
        Ok(())
    }

    fn add_exports_to_all(&self, from: &ModuleRc, package: &str) -> Result<()> {
        self.push(format!(
            "exports {}/{} -> <everyone>",
            from.name().unwrap_or("?"),
            package
        ));
        Ok(())
    }

    fn add_exports_to_all_unnamed(&self, from: &ModuleRc, package: &str) -> Result<()> {
        self.push(format!(
            "exports {}/{} -> <all-unnamed>",
            from.name().unwrap_or("?"),
            package
        ));
        Ok(())
    }
}

struct RejectingHook;

impl EnforcementHook for RejectingHook {
    fn define_module(
        &self,
        _module: &ModuleRc,
        _is_open: bool,
        _version: Option<&str>,
        _location: Option<&str>,
        _packages: &[&str],
    ) -> Result<()> {
        Err(Error::EnforcementRejected("define refused".to_string()))
    }

    fn add_reads(&self, _from: &ModuleRc, _to: Option<&ModuleRc>) -> Result<()> {
        Err(Error::EnforcementRejected("reads refused".to_string()))
    }

    fn add_exports(&self, _from: &ModuleRc, _package: &str, _to: &ModuleRc) -> Result<()> {
        Err(Error::EnforcementRejected("exports refused".to_string()))
    }

    fn add_exports_to_all(&self, _from: &ModuleRc, _package: &str) -> Result<()> {
        Err(Error::EnforcementRejected("exports refused".to_string()))
    }

    fn add_exports_to_all_unnamed(&self, _from: &ModuleRc, _package: &str) -> Result<()> {
        Err(Error::EnforcementRejected("exports refused".to_string()))
    }
}

fn named(name: &str, packages: &[&str]) -> ModuleRc {
    let mut builder = ModuleDescriptor::builder(name);
    for package in packages {
        builder = builder.package(package);
    }
    ModuleRecord::named(builder.build().unwrap(), LoaderId::named("app"), None)
}

#[test]
fn hook_is_notified_before_mutation_and_can_veto() {
    let recorder = Arc::new(RecordingHook::default());
    set_enforcement_hook(recorder.clone());

    let m1 = named("hooked.one", &["h.a", "h.b", "h.c"]);
    let m2 = named("hooked.two", &[]);

    // Each wildcard target maps to its own notification.
    m1.add_exports(&m1, "h.a", &m2).unwrap();
    m1.add_exports(&m1, "h.b", sentinels().everyone()).unwrap();
    m1.add_opens(&m1, "h.c", sentinels().all_unnamed()).unwrap();
    m1.add_reads(&m1, &m2).unwrap();
    m1.add_reads(&m1, sentinels().all_unnamed()).unwrap();
    assert_eq!(
        recorder.drain(),
        vec![
            "exports hooked.one/h.a -> hooked.two".to_string(),
            "exports hooked.one/h.b -> <everyone>".to_string(),
            "exports hooked.one/h.c -> <all-unnamed>".to_string(),
            "reads hooked.one -> hooked.two".to_string(),
            "reads hooked.one -> <all-unnamed>".to_string(),
        ]
    );

    // Re-granting is a no-op and never reaches the hook.
    m1.add_exports(&m1, "h.a", &m2).unwrap();
    m1.add_reads(&m1, &m2).unwrap();
    assert_eq!(recorder.drain(), Vec::<String>::new());

    // Layer definition notifies per defined module.
    let descriptor = ModuleDescriptor::builder("hooked.layered").build().unwrap();
    let cfg = Configuration::resolve(vec![descriptor], vec![]).unwrap();
    let layer = Layer::new(cfg.clone(), vec![]);
    ModuleGraphBuilder::new()
        .define_modules(&cfg, &NamedLoaderMapper, &layer)
        .unwrap();
    assert_eq!(recorder.drain(), vec!["define hooked.layered".to_string()]);

    // A rejecting hook vetoes every mutation and leaves the graph unchanged.
    set_enforcement_hook(Arc::new(RejectingHook));
    let r1 = named("rejected.one", &["r.a"]);
    let r2 = named("rejected.two", &[]);

    assert!(matches!(
        r1.add_exports(&r1, "r.a", &r2),
        Err(Error::EnforcementRejected(_))
    ));
    assert!(!r1.is_exported("r.a", &r2));

    assert!(matches!(
        r1.add_opens(&r1, "r.a", sentinels().everyone()),
        Err(Error::EnforcementRejected(_))
    ));
    assert!(!r1.is_open_to_all("r.a"));

    assert!(matches!(
        r1.add_reads(&r1, &r2),
        Err(Error::EnforcementRejected(_))
    ));
    assert!(!r1.can_read(&r2));

    assert!(matches!(
        r1.open_packages_to_all_unnamed(&["r.a"]),
        Err(Error::EnforcementRejected(_))
    ));
    assert!(!r1.is_open("r.a", &ModuleRecord::unnamed(LoaderId::named("app"))));

    // Definition aborts before the module is published into the layer.
    let descriptor = ModuleDescriptor::builder("rejected.layered").build().unwrap();
    let cfg = Configuration::resolve(vec![descriptor], vec![]).unwrap();
    let layer = Layer::new(cfg.clone(), vec![]);
    let result = ModuleGraphBuilder::new().define_modules(&cfg, &NamedLoaderMapper, &layer);
    assert!(matches!(result, Err(Error::EnforcementRejected(_))));
    assert!(layer.module("rejected.layered").is_none());

    set_enforcement_hook(Arc::new(NullEnforcement));
    assert!(r1.add_reads(&r1, &r2).is_ok());
    assert!(r1.can_read(&r2));
}
