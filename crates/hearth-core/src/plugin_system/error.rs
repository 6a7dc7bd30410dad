//! # Hearth Plugin System Errors
//!
//! Defines error types specific to the plugin system.
//!
//! [`PluginSystemError`] covers every failure the loader can report: opening a
//! package, parsing its descriptor or manifest, resolving its entry point,
//! activating it, registering it, and calling loader operations in the wrong
//! state. [`PluginSystemErrorSource`] wraps the lower-level causes.
use std::path::PathBuf;

use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::loader::LoaderState;
use crate::plugin_system::traits::PluginError;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("Plugin loading failed for '{plugin_id}': {source}")]
    LoadingError {
        plugin_id: String,
        path: Option<PathBuf>,
        #[source]
        source: Box<PluginSystemErrorSource>,
    },

    #[error("FFI error in plugin '{plugin_id}' during operation '{operation}': {message}")]
    FfiError {
        plugin_id: String,
        operation: String,
        message: String,
    },

    #[error("Descriptor error for '{path}': {message}")]
    DescriptorError {
        path: PathBuf,
        message: String,
    },

    #[error("Manifest error for '{plugin_id}': {message}")]
    ManifestError {
        plugin_id: String,
        message: String,
        #[source]
        source: Option<Box<PluginSystemErrorSource>>,
    },

    #[error("Entry point '{entry_point}' of plugin '{plugin_id}' could not be resolved: {message}")]
    EntryPointError {
        plugin_id: String,
        entry_point: String,
        message: String,
    },

    #[error("Plugin activation error for '{plugin_id}': {source}")]
    ActivationError {
        plugin_id: String,
        #[source]
        source: PluginError,
    },

    #[error("Plugin registration error for '{plugin_id}': {message}")]
    RegistrationError {
        plugin_id: String,
        message: String,
    },

    #[error("Plugin '{0}' not found")]
    PluginNotFound(String),

    #[error("Plugin '{plugin_id}' failed during '{operation}': {source}")]
    LifecycleError {
        plugin_id: String,
        operation: String,
        #[source]
        source: PluginError,
    },

    #[error("Cannot {operation} while loader is in state {state}")]
    InvalidLoaderState {
        operation: String,
        state: LoaderState,
    },

    #[error("Plugin directory '{path}' is not accessible: {message}")]
    DirectoryError {
        path: PathBuf,
        message: String,
    },

    #[error("Dependency resolution failed for the {stage} stage: {source}")]
    StageResolution {
        stage: String,
        #[source]
        source: DependencyError,
    },

    #[error("Internal plugin system error: {0}")]
    InternalError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemErrorSource {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Archive(#[from] zip::result::ZipError),
    #[error("libloading error: {0}")]
    Library(#[from] libloading::Error),
    #[error("Other: {0}")]
    Other(String),
}
