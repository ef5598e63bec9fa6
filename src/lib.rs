// Copyright 2025 modscope contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # modscope
//!
//! A concurrency-safe access-control graph for layered runtime module systems.
//! `modscope` tracks which modules read each other, which packages are exported or
//! opened to whom (qualified and unqualified, declared and dynamically added), and
//! which service types a module may use - and answers those questions on every
//! cross-module reflective or resource access.
//!
//! ## Features
//!
//! - **Layered module graphs** - resolve configurations, define layers, and wire
//!   static reads and export/open tables in one batch per deployment unit
//! - **Reflective overlay** - runtime-added grants recorded in weakly-keyed pair
//!   maps that never keep an unloaded module (or its loader) alive
//! - **Wildcard sentinels** - process-wide "all unnamed" / "everyone" modules with
//!   race-safe one-time initialization and snapshot restore
//! - **Caller-sensitive mutation** - the runtime boundary passes the invoking
//!   module explicitly; illegal callers are rejected with the graph untouched
//! - **Enforcement-first ordering** - a lower enforcement layer is notified before
//!   any local state changes, so a refusal leaves both sides consistent
//!
//! ## Quick Start
//!
//! Add `modscope` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! modscope = "0.2"
//! ```
//!
//! ### Using the Prelude
//!
//! ```rust
//! use modscope::prelude::*;
//!
//! let api = ModuleDescriptor::builder("api")
//!     .package("api.core")
//!     .exports("api.core")
//!     .build()?;
//! let app = ModuleDescriptor::builder("app").requires("api").build()?;
//!
//! let cfg = Configuration::resolve(vec![api, app], vec![])?;
//! let layer = Layer::new(cfg.clone(), vec![]);
//! let modules = ModuleGraphBuilder::new().define_modules(&cfg, &NamedLoaderMapper, &layer)?;
//!
//! let api = modules.get("api").unwrap();
//! let app = modules.get("app").unwrap();
//! assert!(app.can_read(api));
//! assert!(api.is_exported("api.core", app));
//! # Ok::<(), modscope::Error>(())
//! ```
//!
//! ### Reflective Grants
//!
//! Everything granted after a layer is defined lands in a weak overlay - recording
//! a grant about two modules never extends either module's lifetime:
//!
//! ```rust
//! use modscope::prelude::*;
//!
//! let internals = ModuleDescriptor::builder("internals")
//!     .package("internals.impl")
//!     .build()?;
//! let internals = ModuleRecord::named(internals, LoaderId::named("app"), None);
//! let test_harness = ModuleRecord::unnamed(LoaderId::named("test"));
//!
//! assert!(!internals.is_open("internals.impl", &test_harness));
//! internals.add_opens(&internals, "internals.impl", &test_harness)?;
//! assert!(internals.is_open("internals.impl", &test_harness));
//! # Ok::<(), modscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `modscope` is organized into several key modules:
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`module`] - Module records, descriptors, sentinels and the query surface
//! - [`graph`] - Configurations, layers and the batch graph builder
//! - [`weak`] - The weakly-keyed pair map backing the reflective overlay
//! - [`hooks`] - External collaborator interfaces (enforcement, services, policy)
//! - [`Error`] and [`Result`] - Comprehensive error handling

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// This module provides a curated selection of the most frequently used types
/// from across the modscope library, allowing for convenient glob imports.
///
/// # Example
///
/// ```rust
/// use modscope::prelude::*;
///
/// let unnamed = ModuleRecord::unnamed(LoaderId::named("app"));
/// assert!(unnamed.can_read(&unnamed));
/// ```
pub mod prelude;

/// External collaborator interfaces consumed by the access-control core.
///
/// The core never enforces anything itself; it notifies an [`hooks::EnforcementHook`]
/// before each local mutation and consults the service catalog, loader registry,
/// annotation and resource-policy collaborators where queries need them.
pub mod hooks;

/// Layered module graphs: configurations, layers and the batch builder.
///
/// [`graph::builder::ModuleGraphBuilder::define_modules`] is the single entry point
/// for instantiating a new layer's modules from a resolved configuration.
pub mod graph;

/// Runtime modules: records, declared metadata, sentinels and the query surface.
///
/// The mutation surface lives on [`module::record::ModuleRecord`]; the read-only
/// queries combining static tables with the reflective overlay are in
/// [`module::access`].
pub mod module;

/// Weakly-keyed pair-associative storage backing the reflective overlay.
pub mod weak;

/// Central result type of this crate, used to stream-line error handling.
pub type Result<T> = std::result::Result<T, Error>;

pub use error::Error;

/// One runtime module, named or unnamed.
///
/// See [`module::record::ModuleRecord`] for the mutation surface and
/// [`module::access`] for the query surface.
pub use module::record::ModuleRecord;

/// Declared module metadata and its builder.
pub use module::descriptor::{DescriptorBuilder, ModuleDescriptor, ModuleFlags, PackageGrant};

/// Reference-identity handles and identities.
pub use module::identity::{ByIdentity, LoaderId, ModuleRc, ModuleSet, ServiceRc, ServiceType};

/// Process-wide wildcard sentinel modules.
pub use module::sentinels::{
    install_sentinel_bootstrap, sentinels, SentinelBootstrap, SentinelSnapshot, Sentinels,
};

/// Layered graph types and the batch builder.
pub use graph::{
    builder::{BuiltinLoaderMapper, LoaderMapper, ModuleGraphBuilder, NamedLoaderMapper},
    config::{Configuration, EdgeOrigin, ReadEdge, ResolvedModule},
    layer::Layer,
};

/// The weakly-keyed pair map.
pub use weak::WeakPairMap;
