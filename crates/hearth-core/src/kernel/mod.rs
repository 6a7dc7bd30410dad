//! # Hearth Core Kernel
//!
//! The `kernel` module ties the host together.
//!
//! - **Application Bootstrapping**: [`Application`](bootstrap::Application) owns the
//!   configuration and the plugin host, and drives the two-phase boot
//!   (pre-world plugins, world ready, post-world plugins).
//! - **Core Constants**: resource names, defaults and sentinels in `constants`.
//! - **Error Handling**: the aggregated [`Error`](error::Error) type and the
//!   `Result` alias in `error`.
pub mod bootstrap;
pub mod constants;
pub mod error;

pub use bootstrap::Application;
pub use error::{Error, Result};
