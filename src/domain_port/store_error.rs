/// Failure reported by a persistence adapter.
///
/// `Unavailable` is transient and safe to retry; everything else is not.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("duplicate key")]
    Duplicate,
    #[error("store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
