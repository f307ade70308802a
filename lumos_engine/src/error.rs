//! Error types for the Lumos engine
//!
//! State-machine misuse never reaches this type: it is reported through
//! `engine_assert!` and terminates. Everything here is either a native
//! backend failure or a resource the caller may choose to replace.

use std::fmt;

/// Result type for Lumos engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lumos engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (Vulkan, OpenGL)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (texture, framebuffer, shader, etc.)
    InvalidResource(String),

    /// Initialization failed (engine, device, renderer)
    InitializationFailed(String),

    /// A configuration value the backend cannot honour
    UnsupportedConfiguration(String),

    /// A file-backed resource could not be read or decoded
    ResourceLoadFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::UnsupportedConfiguration(msg) => write!(f, "Unsupported configuration: {}", msg),
            Error::ResourceLoadFailed(msg) => write!(f, "Resource load failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
