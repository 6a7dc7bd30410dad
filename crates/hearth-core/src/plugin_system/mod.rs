//! # Hearth Core Plugin System
//!
//! Discovers, orders, isolates and activates extension packages.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`dependency`]**: Generic dependency graph with an iterative topological
//!   sort and exact cycle reporting.
//! - **[`descriptor`]**: Parses the `CANARY.INF` package descriptor (mount point
//!   and dependencies).
//! - **[`manifest`]**: Reads the archive component manifest and its `Entry-Point`.
//! - **[`context`]**: One isolated [`CodeLoadingContext`] per package archive.
//! - **[`scanner`]**: Enumerates the plugins directory and classifies packages
//!   into the pre stage, the post stage or the no-load set.
//! - **[`entry_point`]** / **[`native`]**: Turn an entry-point name into a live
//!   [`Plugin`], either from a constructor linked into the host or from the
//!   package's native library.
//! - **[`activator`]**: Instantiates, enables and registers one package.
//! - **[`loader`]**: The [`StagedLoader`] state machine (scan, pre-load, post-load).
//! - **[`registry`]**: The concurrency-safe [`PluginRegistry`].
//! - **[`manager`]**: The administrative [`PluginManager`] facade.
//! - **[`package`]**: Writes package archives.
//! - **[`traits`]**: The [`Plugin`] trait and the native ABI.
//! - **[`error`]**: [`PluginSystemError`].
pub mod activator;
pub mod context;
pub mod dependency;
pub mod descriptor;
pub mod entry_point;
pub mod error;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod native;
pub mod package;
pub mod registry;
pub mod scanner;
pub mod traits;

pub use activator::Activator;
pub use context::{CodeLoadingContext, ResourceLocation};
pub use dependency::{DependencyError, DependencyGraph, DependencyMap, resolve_order};
pub use descriptor::{MountPoint, PackageDescriptor};
pub use entry_point::{ChainedEntryPoints, EntryPointResolver, StaticEntryPoints};
pub use error::PluginSystemError;
pub use loader::{LoaderState, ScanSummary, StageReport, StagedLoader};
pub use manager::{DefaultPluginManager, PluginManager};
pub use manifest::ComponentManifest;
pub use native::NativeEntryPoints;
pub use package::PackageBuilder;
pub use registry::{LoadedPlugin, PluginRegistry};
pub use scanner::{PackageScanner, ScanReport};
pub use traits::{FfiResult, Plugin, PluginEntryFn, PluginError, PluginVTable};
// Test module declaration
#[cfg(test)]
mod tests;
