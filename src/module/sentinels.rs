//! Process-wide wildcard sentinel modules.
//!
//! Two synthetic unnamed modules act as wildcard keys across the whole graph:
//! "all unnamed modules" and "everyone". They exist before any layer is defined,
//! are constructed at most once per process, and are never destroyed. A runtime
//! resuming from a pre-initialized snapshot can install a [`SentinelBootstrap`]
//! provider to restore previously persisted sentinels instead of constructing
//! fresh ones; the provider is consulted exactly once, on first access.

use std::sync::{Arc, OnceLock, RwLock};

use crate::module::{
    identity::{ByIdentity, LoaderId, ModuleRc, ModuleSet},
    record::ModuleRecord,
};

/// Restore-or-construct source for the sentinel modules.
pub trait SentinelBootstrap: Send + Sync {
    /// A previously persisted sentinel snapshot, or `None` to construct fresh ones.
    fn restore(&self) -> Option<SentinelSnapshot>;
}

/// A pre-built pair of sentinel modules, as restored from a process snapshot.
pub struct SentinelSnapshot {
    /// The restored "all unnamed modules" sentinel.
    pub all_unnamed: ModuleRc,
    /// The restored "everyone" sentinel.
    pub everyone: ModuleRc,
}

/// The two process-wide sentinel modules and their singleton sets.
pub struct Sentinels {
    all_unnamed: ModuleRc,
    everyone: ModuleRc,
    all_unnamed_set: ModuleSet,
    everyone_set: ModuleSet,
}

impl Sentinels {
    fn from_modules(all_unnamed: ModuleRc, everyone: ModuleRc) -> Self {
        let mut all_unnamed_set = ModuleSet::new();
        all_unnamed_set.insert(ByIdentity(all_unnamed.clone()));
        let mut everyone_set = ModuleSet::new();
        everyone_set.insert(ByIdentity(everyone.clone()));

        Sentinels {
            all_unnamed,
            everyone,
            all_unnamed_set,
            everyone_set,
        }
    }

    /// The unnamed module standing in for "every unnamed module".
    #[must_use]
    pub fn all_unnamed(&self) -> &ModuleRc {
        &self.all_unnamed
    }

    /// The unnamed module standing in for "every module, named or not".
    #[must_use]
    pub fn everyone(&self) -> &ModuleRc {
        &self.everyone
    }

    /// Singleton set holding only the all-unnamed sentinel.
    #[must_use]
    pub fn all_unnamed_set(&self) -> &ModuleSet {
        &self.all_unnamed_set
    }

    /// Singleton set holding only the everyone sentinel.
    #[must_use]
    pub fn everyone_set(&self) -> &ModuleSet {
        &self.everyone_set
    }
}

static BOOTSTRAP: RwLock<Option<Arc<dyn SentinelBootstrap>>> = RwLock::new(None);
static SENTINELS: OnceLock<Sentinels> = OnceLock::new();

/// Install a snapshot provider consulted on first sentinel access.
///
/// Has no effect once the sentinels have been constructed; install the provider
/// during runtime bootstrap, before any module work.
pub fn install_sentinel_bootstrap(provider: Arc<dyn SentinelBootstrap>) {
    if let Ok(mut slot) = BOOTSTRAP.write() {
        *slot = Some(provider);
    }
}

/// The process-wide sentinels, constructing (or restoring) them on first access.
///
/// Safe under concurrent first use: exactly one caller runs the initializer, every
/// other caller blocks until the sentinels are published.
#[must_use]
pub fn sentinels() -> &'static Sentinels {
    SENTINELS.get_or_init(|| {
        let restored = BOOTSTRAP
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().and_then(|provider| provider.restore()));

        match restored {
            Some(snapshot) => Sentinels::from_modules(snapshot.all_unnamed, snapshot.everyone),
            None => Sentinels::from_modules(
                ModuleRecord::unnamed(LoaderId::Boot),
                ModuleRecord::unnamed(LoaderId::Boot),
            ),
        }
    })
}
