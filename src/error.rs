//! Exposes the frame graph error type

use thiserror::Error;

/// Error type that the frame graph can return.
#[derive(Error, Debug)]
pub enum Error {
    /// A handle was used that is uninitialized, belongs to another frame, or was superseded by a write.
    #[error("Resource handle is invalid or uninitialized {{id={index}, version={version}}}")]
    InvalidHandle {
        /// Index of the offending handle.
        index: u32,
        /// Version of the offending handle.
        version: u32,
    },
    /// Requested usage is not part of the fixed usage mask of an imported resource.
    #[error("Requested usage {requested} not available on imported resource `{name}` with usage {available}")]
    UsageViolation {
        /// Name of the imported resource.
        name: String,
        /// The usage that was requested.
        requested: String,
        /// The usage the resource was imported with.
        available: String,
    },
    /// A pass tried to access a resource it never declared a read or write on.
    #[error("Pass `{pass}` didn't declare any access to resource `{resource}`")]
    UndeclaredResource {
        /// Name of the pass.
        pass: String,
        /// Name of the resource.
        resource: String,
    },
    /// The concrete resource was requested before it was instantiated, or after it was destroyed.
    #[error("Resource `{0}` has no concrete resource at this point of the frame")]
    NotDevirtualized(String),
    /// A handle was used with a resource of a different kind. Generally this should not happen.
    #[error("Resource `{0}` is of a different kind than the handle used to access it")]
    ResourceKindMismatch(String),
    /// `execute()` was called on a graph that was never compiled.
    #[error("Frame graph must be compiled before it is executed.")]
    NotCompiled,
    /// No render target with this id was declared by the pass.
    #[error("No render target with id `{0}` declared by this pass")]
    RenderTargetNotFound(u32),
    /// The resource allocator failed to create a concrete resource.
    #[error("Failed to allocate concrete resource `{0}`")]
    AllocationFailed(String),
}
