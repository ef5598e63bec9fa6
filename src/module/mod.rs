//! Runtime modules: records, declared metadata, sentinels and the query surface.
//!
//! The types in this module make up the entity half of the access-control graph:
//!
//! - [`record::ModuleRecord`] - one runtime module, named or unnamed, with its
//!   static tables and the reflective mutation surface
//! - [`descriptor::ModuleDescriptor`] - the immutable declared metadata of a
//!   named module
//! - [`identity`] - reference-identity handles, loader identities and canonical
//!   service types
//! - [`sentinels`] - the process-wide "all unnamed" / "everyone" wildcard modules
//! - [`access`] - the read-only query surface combining static state and the
//!   reflective overlay

pub mod access;
pub mod descriptor;
pub mod identity;
pub mod record;
pub mod sentinels;
