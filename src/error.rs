use thiserror::Error;

macro_rules! illegal_argument {
    // Single string version
    ($msg:expr) => {
        crate::Error::IllegalArgument {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::IllegalArgument {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers all possible error conditions that can occur while mutating or constructing
/// the module access-control graph. Each variant provides specific context about the failure
/// mode to enable appropriate error handling.
///
/// # Error Categories
///
/// ## Authorization Errors
/// - [`Error::IllegalCaller`] - A mutation was attempted on behalf of the wrong module
///
/// ## Structural Errors
/// - [`Error::IllegalArgument`] - A grant names a package the module does not contain, or a
///   loader-mapping invariant was violated during graph construction
/// - [`Error::GraphError`] - A fatal inconsistency was detected while building a module graph
///
/// ## Collaborator Errors
/// - [`Error::EnforcementRejected`] - The lower enforcement layer refused a notification
/// - [`Error::LockError`] - Thread synchronization failure
///
/// # Examples
///
/// ```rust
/// use modscope::{Error, prelude::*};
///
/// let alpha = ModuleDescriptor::builder("alpha").package("a.b").build()?;
/// let cfg = Configuration::resolve(vec![alpha], vec![])?;
/// let layer = Layer::new(cfg.clone(), vec![]);
/// let modules = ModuleGraphBuilder::new().define_modules(&cfg, &NamedLoaderMapper, &layer)?;
///
/// let alpha = modules.get("alpha").unwrap();
/// let stranger = ModuleRecord::unnamed(LoaderId::named("app"));
///
/// // Only `alpha` itself may extend what `alpha` exports.
/// match alpha.add_exports(&stranger, "a.b", &stranger) {
///     Err(Error::IllegalCaller) => {}
///     other => panic!("expected IllegalCaller, got {:?}", other.is_ok()),
/// }
/// # Ok::<(), modscope::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A mutation method was invoked on behalf of a module other than the one it mutates.
    ///
    /// `add_reads`, `add_exports` and `add_uses` require the calling module to be the module
    /// being mutated; `add_opens` additionally accepts any caller the package is already open
    /// to. This error is always surfaced to the caller and never retried internally; the
    /// module graph is left completely unchanged.
    #[error("Caller is not permitted to mutate this module")]
    IllegalCaller,

    /// A structural precondition of the requested operation was violated.
    ///
    /// This error occurs when a qualified export or open names a package that is not
    /// contained in the module, or when a loader-mapping invariant is violated during
    /// graph construction (a non-builtin mapper assigning modules to a privileged
    /// loader). The error includes the source location where the violation was
    /// detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of the violated precondition
    /// * `file` - Source file in which the error was detected
    /// * `line` - Source line in which the error was detected
    #[error("IllegalArgument - {file}:{line}: {message}")]
    IllegalArgument {
        /// The message to be printed for the IllegalArgument error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The lower enforcement layer rejected a notification.
    ///
    /// Enforcement hooks are notified before any local state changes ("update the
    /// enforcement layer first, just in case it fails"). When the hook refuses, the
    /// requested grant is abandoned with the local graph untouched.
    #[error("Enforcement layer rejected the operation - {0}")]
    EnforcementRejected(String),

    /// Failed to lock target.
    ///
    /// This error occurs when thread synchronization fails, typically when trying to
    /// acquire a rwlock whose holder panicked.
    #[error("Failed to lock target")]
    LockError,

    /// Module graph construction error.
    ///
    /// A fatal inconsistency was detected while defining a layer's modules, such as a
    /// resolved dependency edge pointing at a module that cannot be found in the batch
    /// or in any ancestor layer. This indicates the configuration handed to the builder
    /// was not properly resolved; construction is aborted rather than continued with a
    /// partial graph.
    #[error("{0}")]
    GraphError(String),
}
