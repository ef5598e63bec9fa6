//! # modscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the modscope library. Import this module to get quick access to the essential
//! types for working with module access-control graphs.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all modscope operations
pub use crate::Error;

/// The result type used throughout modscope
pub use crate::Result;

// ================================================================================================
// Modules and Declared Metadata
// ================================================================================================

/// The runtime representation of one module
pub use crate::ModuleRecord;

/// Reference counted module handle
pub use crate::ModuleRc;

/// Declared module metadata, its builder and modifier flags
pub use crate::{DescriptorBuilder, ModuleDescriptor, ModuleFlags, PackageGrant};

/// Identity helpers: identity-keyed sets, loader identities, canonical service types
pub use crate::{ByIdentity, LoaderId, ModuleSet, ServiceRc, ServiceType};

/// Process-wide wildcard sentinel modules
pub use crate::{sentinels, Sentinels};

// ================================================================================================
// Layered Graphs
// ================================================================================================

/// Resolved dependency configurations
pub use crate::Configuration;

/// Layers of defined modules
pub use crate::Layer;

/// The batch graph builder and loader mapping
pub use crate::{BuiltinLoaderMapper, LoaderMapper, ModuleGraphBuilder, NamedLoaderMapper};

// ================================================================================================
// Collaborator Interfaces
// ================================================================================================

/// External collaborator traits and the enforcement hook slot
pub use crate::hooks::{
    enforcement, set_enforcement_hook, AnnotationLoader, EnforcementHook, LoaderRegistry,
    ResourcePolicy, ServiceCatalog,
};

// ================================================================================================
// Reflective Overlay Storage
// ================================================================================================

/// The weakly-keyed pair map backing reflective grants
pub use crate::WeakPairMap;
