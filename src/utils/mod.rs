pub mod error;

pub use error::RenewalError;
