pub mod kernel;
pub mod plugin_system;
pub mod storage;
pub mod utils;

// Re-export key public types/traits for easier use by the binary and plugins
pub use kernel::Application;
pub use kernel::error::Error as KernelError;
pub use plugin_system::{
    DefaultPluginManager, LoaderState, PackageBuilder, Plugin, PluginError, PluginManager, PluginRegistry,
};
pub use storage::HostConfig;
