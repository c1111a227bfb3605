//! Error types for the Nova3D rendering core
//!
//! Recoverable failures (resource creation, shader compile/link, malformed mesh
//! streams, stage-graph configuration) are reported through [`Error`].
//! Programmer errors (buffer overflow on `update_data`, missing POSITION element,
//! unsupported primitive/index combinations) are assertions, not errors.

use std::fmt;

/// Result type for Nova3D operations
pub type Result<T> = std::result::Result<T, Error>;

/// Nova3D errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (GL driver, mock renderer, lock poisoning, ...)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid or missing resource (texture, frame buffer, shader program, ...)
    InvalidResource(String),

    /// Initialization failed (render path, stage graph, shadow maps)
    InitializationFailed(String),

    /// Malformed binary stream (mesh serialization)
    InvalidFormat(String),

    /// Underlying stream I/O failure
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

// ===== ERROR MACROS =====

/// Log an ERROR entry and build an `Error::BackendError` with the same message
///
/// # Example
///
/// ```ignore
/// let fb = pool.frame_buffer(name)
///     .ok_or_else(|| engine_err!("nova3d::RenderPass", "Frame buffer '{}' not registered", name))?;
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::nova3d::Error::BackendError(message)
    }};
}

/// Log an ERROR entry and return early with an `Error::BackendError`
///
/// # Example
///
/// ```ignore
/// if stages.is_empty() {
///     engine_bail!("nova3d::RenderPath", "Stage list is empty");
/// }
/// ```
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
