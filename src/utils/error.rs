use thiserror::Error;

/// Errors raised across one renewal invocation.
///
/// All variants are local to a single invocation of the engine; nothing here
/// is retried in-process. Retry is a counted re-invocation governed by the
/// attempt ceiling.
#[derive(Debug, Error)]
pub enum RenewalError {
    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("navigation error: {0}")]
    Navigation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("submission error: {0}")]
    Submission(String),

    /// The portal refuses to save a vehicle while any other certificate is
    /// still expired; surfacing this here is more actionable than the
    /// server-side rejection would be.
    #[error("cannot save: {0}")]
    OtherExpiredCertificate(String),

    #[error("automation timed out after {0} seconds")]
    Timeout(u64),

    #[error("maximum automation attempts exceeded ({attempts} > {ceiling})")]
    MaxAttemptsExceeded { attempts: u32, ceiling: u32 },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}
