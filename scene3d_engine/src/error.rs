//! Error types for the Scene3D engine
//!
//! Configuration problems (bad viewport, unbound slot, duplicate producer)
//! surface at construction time. GPU allocation failures propagate out of
//! `Scene::render()`.

use std::fmt;

/// Result type for Scene3D engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Scene3D engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Device-specific error reported by the graphics backend
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (texture, buffer, program, model data)
    InvalidResource(String),

    /// Initialization failed (scene, pipeline, stage setup)
    InitializationFailed(String),

    /// Invalid configuration (viewport, slot wiring, scene settings)
    InvalidConfiguration(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an error with file:line and build an `Error::BackendError` from it
///
/// The variant can be given explicitly as the first argument:
///
/// ```ignore
/// let e = engine_err!("scene3d::Scene", "Mesh has no LODs");
/// let e = engine_err!(InvalidConfiguration, "scene3d::Scene", "bad viewport {}x{}", w, h);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($variant:ident, $source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::scene3d::Error::$variant(message)
    }};
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::scene3d::Error::BackendError(message)
    }};
}

/// Log an error and return early with it (see `engine_err!`)
#[macro_export]
macro_rules! engine_bail {
    ($variant:ident, $source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($variant, $source, $($arg)*))
    };
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
