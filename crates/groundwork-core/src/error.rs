use thiserror::Error;

/// Errors for a malformed desired state.
///
/// These always surface before any provider call is made.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("failed to read stack file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid stack file: {0}")]
    InvalidConfig(String),

    #[error("unknown resource kind: {0}")]
    UnknownKind(String),

    #[error("duplicate resource id: {0}")]
    DuplicateId(String),

    #[error("resource '{id}' depends on unknown resource '{dependency}'")]
    UnknownDependency { id: String, dependency: String },

    #[error("dependency cycle detected among: {0}")]
    Cycle(String),
}

pub type Result<T> = std::result::Result<T, SpecError>;
