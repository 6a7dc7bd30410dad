use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::kernel::error::Result;
use crate::plugin_system::activator::Activator;
use crate::plugin_system::entry_point::EntryPointResolver;
use crate::plugin_system::loader::{LoaderState, ScanSummary, StageReport, StagedLoader};
use crate::plugin_system::registry::{LoadedPlugin, PluginRegistry};
use crate::plugin_system::scanner::PackageScanner;

/// Administrative surface of the plugin host
#[async_trait]
pub trait PluginManager: Send + Sync {
    /// Discover packages and resolve both stage orders
    async fn scan(&self) -> Result<ScanSummary>;

    /// Activate the pre-world (`true`) or post-world (`false`) stage
    async fn load_stage(&self, pre: bool) -> Result<StageReport>;

    async fn state(&self) -> LoaderState;

    /// Case-insensitive lookup
    async fn get_plugin(&self, name: &str) -> Option<Arc<LoadedPlugin>>;

    async fn plugin_names(&self) -> Vec<String>;

    async fn readable_plugin_list(&self) -> String;

    async fn enable_plugin(&self, name: &str) -> Result<()>;

    async fn disable_plugin(&self, name: &str) -> Result<()>;

    /// Disable and drop every plugin, newest first. Returns how many were removed.
    async fn shutdown(&self) -> usize;
}

/// Default implementation of plugin manager
#[derive(Clone)]
pub struct DefaultPluginManager {
    name: &'static str,
    loader: Arc<Mutex<StagedLoader>>,
    registry: Arc<PluginRegistry>,
}

impl DefaultPluginManager {
    pub fn new(scanner: PackageScanner, resolver: Arc<dyn EntryPointResolver>) -> Self {
        let registry = Arc::new(PluginRegistry::new());
        let loader = StagedLoader::new(scanner, Activator::new(resolver), Arc::clone(&registry));
        Self {
            name: "DefaultPluginManager",
            loader: Arc::new(Mutex::new(loader)),
            registry,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get reference to the shared plugin registry
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }
}

impl Debug for DefaultPluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultPluginManager")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PluginManager for DefaultPluginManager {
    async fn scan(&self) -> Result<ScanSummary> {
        let mut loader = self.loader.lock().await;
        Ok(loader.scan()?)
    }

    async fn load_stage(&self, pre: bool) -> Result<StageReport> {
        let mut loader = self.loader.lock().await;
        Ok(loader.load_stage(pre).await?)
    }

    async fn state(&self) -> LoaderState {
        self.loader.lock().await.state()
    }

    async fn get_plugin(&self, name: &str) -> Option<Arc<LoadedPlugin>> {
        self.registry.get(name).await
    }

    async fn plugin_names(&self) -> Vec<String> {
        self.registry.names().await
    }

    async fn readable_plugin_list(&self) -> String {
        self.registry.readable_list().await
    }

    async fn enable_plugin(&self, name: &str) -> Result<()> {
        Ok(self.registry.enable(name).await?)
    }

    async fn disable_plugin(&self, name: &str) -> Result<()> {
        Ok(self.registry.disable(name).await?)
    }

    async fn shutdown(&self) -> usize {
        let removed = self.registry.shutdown_all().await;
        log::info!("Plugin manager shut down; {} plugin(s) removed", removed);
        removed
    }
}
