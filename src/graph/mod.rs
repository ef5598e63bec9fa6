//! Layered module graphs: configurations, layers and the batch builder.
//!
//! - [`config::Configuration`] - a resolved set of modules with parent
//!   configurations
//! - [`layer::Layer`] - the modules defined together from one configuration,
//!   with explicit parent pointers
//! - [`builder::ModuleGraphBuilder`] - the once-per-layer batch algorithm that
//!   instantiates records, wires static reads and materializes export/open
//!   tables

pub mod builder;
pub mod config;
pub mod layer;
