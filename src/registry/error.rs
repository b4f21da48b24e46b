use thiserror::Error;

/// Failure modes of a registry backend.
///
/// `NotFound` is semantic, not transient: it is the sentinel the listener
/// relies on to detect "no task ready" and is never retried. Everything else
/// is assumed transient and is retried by the [`RegistryHandle`] wrapper.
///
/// [`RegistryHandle`]: super::adapter::RegistryHandle
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("not found")]
    NotFound,

    #[error("registry unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound)
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
