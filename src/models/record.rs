use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle states of a certificate record.
///
/// `Pending` and `Failed` are retryable; the remaining states are terminal
/// and make the record eligible for deletion by the owning collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Pending,
    Sent,
    Failed,
    FailedMaxAttempts,
    FailedOtherExpired,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::Pending => "pending",
            CertificateStatus::Sent => "sent",
            CertificateStatus::Failed => "failed",
            CertificateStatus::FailedMaxAttempts => "failed_max_attempts",
            CertificateStatus::FailedOtherExpired => "failed_other_expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CertificateStatus::Sent
                | CertificateStatus::FailedMaxAttempts
                | CertificateStatus::FailedOtherExpired
        )
    }

    pub fn is_retryable(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The unit of work: one scanned certificate waiting to be renewed on the
/// portal for one vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub id: u64,
    /// Alphanumeric plate used as the portal lookup key.
    pub vehicle_plate: String,
    /// Human-readable certificate type (e.g. "CIPP"); matched as a
    /// case-insensitive substring against portal-displayed titles.
    pub certificate_name: String,
    /// Path to the scanned document to extract data from and upload.
    pub source_file: PathBuf,
    pub status: CertificateStatus,
    /// Incremented once per invocation; never decremented.
    pub attempt_count: u32,
    /// Last failure detail; set only on failure paths.
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CertificateRecord {
    pub fn new(
        id: u64,
        vehicle_plate: impl Into<String>,
        certificate_name: impl Into<String>,
        source_file: impl Into<PathBuf>,
    ) -> Self {
        let now = Utc::now();
        CertificateRecord {
            id,
            vehicle_plate: vehicle_plate.into(),
            certificate_name: certificate_name.into(),
            source_file: source_file.into(),
            status: CertificateStatus::Pending,
            attempt_count: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the record into `status`, replacing the error message and
    /// touching the update timestamp.
    pub fn transition(&mut self, status: CertificateStatus, error_message: Option<String>) {
        self.status = status;
        self.error_message = error_message;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&CertificateStatus::FailedMaxAttempts).unwrap();
        assert_eq!(json, "\"failed_max_attempts\"");
        let back: CertificateStatus = serde_json::from_str("\"failed_other_expired\"").unwrap();
        assert_eq!(back, CertificateStatus::FailedOtherExpired);
    }

    #[test]
    fn test_terminal_states() {
        assert!(CertificateStatus::Sent.is_terminal());
        assert!(CertificateStatus::FailedMaxAttempts.is_terminal());
        assert!(CertificateStatus::FailedOtherExpired.is_terminal());
        assert!(CertificateStatus::Pending.is_retryable());
        assert!(CertificateStatus::Failed.is_retryable());
    }

    #[test]
    fn test_transition_sets_message_and_timestamp() {
        let mut record = CertificateRecord::new(1, "ABC1234", "CIPP", "/tmp/cert.pdf");
        let before = record.updated_at;
        record.transition(CertificateStatus::Failed, Some("boom".to_string()));
        assert_eq!(record.status, CertificateStatus::Failed);
        assert_eq!(record.error_message.as_deref(), Some("boom"));
        assert!(record.updated_at >= before);
    }
}
