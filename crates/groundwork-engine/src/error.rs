use groundwork_cloud::StateStoreError;
use groundwork_core::SpecError;
use thiserror::Error;

/// Engine errors.
///
/// Provider failures during apply are not errors at this level: they are
/// reported per-resource in the [`ApplyReport`](crate::ApplyReport).
/// State persistence failures are fatal because continuing would mean
/// guessing at what was applied.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    State(#[from] StateStoreError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
