pub mod fields;
pub mod record;

pub use fields::{CertificateBlock, ExtractedFields};
pub use record::{CertificateRecord, CertificateStatus};
