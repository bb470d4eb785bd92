use thiserror::Error;

/// Errors raised by the framework.
///
/// Uniforms or attributes a program does not declare are skipped at draw
/// time, and shader compile or link failures go to the log.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameworkError {
    /// Construction-time data violation, e.g. attributes with different vertex counts.
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("cycle detected: {0}")]
    Cycle(String),
    #[error("scene holds {count} lights but the shader light array has {max} slots")]
    TooManyLights { count: usize, max: usize },
    #[error("{count} items do not fit the shader array {name}[{capacity}]")]
    ArrayOverflow {
        name: String,
        count: usize,
        capacity: usize,
    },
    #[error("graphics device error: {0}")]
    Device(String),
    #[error("invalid scene description: {0}")]
    Description(String),
}

impl FrameworkError {
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }
}

pub type Result<T, E = FrameworkError> = std::result::Result<T, E>;
