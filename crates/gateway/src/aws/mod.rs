//! AWS SDK client initialisation.
//!
//! Only Secrets Manager is used: it holds the field encryption key and the
//! database credentials.

pub mod clients;

pub use clients::AwsClients;
