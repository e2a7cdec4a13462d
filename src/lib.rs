//! Automated renewal of vehicle-inspection certificates on the operator
//! portal: OCR field extraction from the scanned certificate, then a headless
//! browser workflow that locates the vehicle, submits the extracted fields
//! plus the file, and records the attempt outcome.

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod extraction;
pub mod models;
pub mod portal;
pub mod storage;
pub mod utils;

pub use config::Config;
pub use engine::RenewalEngine;
pub use utils::RenewalError;
