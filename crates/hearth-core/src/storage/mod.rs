//! # Hearth Core Storage
//!
//! Configuration storage for the host: the [`HostConfig`](config::HostConfig)
//! structure, the formats it can be read from ([`ConfigFormat`](config::ConfigFormat)),
//! and the storage error type.
pub mod config;
pub mod error;

pub use config::{ConfigFormat, HostConfig};
pub use error::StorageSystemError;
