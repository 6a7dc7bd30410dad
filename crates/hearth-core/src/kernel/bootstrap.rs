use std::sync::Arc;

use crate::kernel::constants;
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::plugin_system::entry_point::{ChainedEntryPoints, EntryPointResolver, StaticEntryPoints};
use crate::plugin_system::loader::{ScanSummary, StageReport};
use crate::plugin_system::manager::{DefaultPluginManager, PluginManager};
use crate::plugin_system::native::NativeEntryPoints;
use crate::plugin_system::scanner::PackageScanner;
use crate::storage::config::HostConfig;

/// What happened during [`Application::boot`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootReport {
    pub scan: ScanSummary,
    pub pre_world: StageReport,
    pub post_world: StageReport,
}

/// Main application struct: owns the host configuration and the plugin manager
pub struct Application {
    config: HostConfig,
    plugin_manager: Arc<DefaultPluginManager>,
    booted: bool,
    shut_down: bool,
}

impl Application {
    /// Creates an application that loads entry points from native package libraries.
    pub fn new(config: HostConfig) -> Self {
        Self::with_resolver(config, Arc::new(NativeEntryPoints::new()))
    }

    /// Creates an application that tries `builtins` first and falls back to
    /// the package's native library for entry points it does not know.
    pub fn with_builtin_entry_points(config: HostConfig, builtins: StaticEntryPoints) -> Self {
        let resolver = ChainedEntryPoints::new()
            .with(Arc::new(builtins))
            .with(Arc::new(NativeEntryPoints::new()));
        Self::with_resolver(config, Arc::new(resolver))
    }

    /// Creates an application with a custom entry-point resolver
    pub fn with_resolver(config: HostConfig, resolver: Arc<dyn EntryPointResolver>) -> Self {
        log::info!("Initializing {} v{}", constants::APP_NAME, constants::APP_VERSION);
        let scanner = PackageScanner::from_config(&config);
        let plugin_manager = Arc::new(DefaultPluginManager::new(scanner, resolver));
        Self {
            config,
            plugin_manager,
            booted: false,
            shut_down: false,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn plugin_manager(&self) -> Arc<DefaultPluginManager> {
        Arc::clone(&self.plugin_manager)
    }

    pub fn is_booted(&self) -> bool {
        self.booted
    }

    /// Scan, activate the pre-world stage, mark the world ready, activate the post-world stage.
    pub async fn boot(&mut self) -> Result<BootReport> {
        if self.booted {
            return Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::Bootstrap,
                message: "Application already booted".to_string(),
                source: None,
            });
        }
        log::info!("Using plugins directory: {}", self.config.plugins_dir.display());

        let scan = self
            .plugin_manager
            .scan()
            .await
            .map_err(|e| lifecycle_error(KernelLifecyclePhase::Bootstrap, "plugin scan failed", e))?;
        let pre_world = self
            .plugin_manager
            .load_stage(true)
            .await
            .map_err(|e| lifecycle_error(KernelLifecyclePhase::PreWorld, "pre-world stage failed", e))?;

        self.world_ready();

        let post_world = self
            .plugin_manager
            .load_stage(false)
            .await
            .map_err(|e| lifecycle_error(KernelLifecyclePhase::PostWorld, "post-world stage failed", e))?;

        self.booted = true;
        log::info!(
            "{} ready with plugins: {}",
            constants::APP_NAME,
            self.plugin_manager.readable_plugin_list().await
        );
        Ok(BootReport {
            scan,
            pre_world,
            post_world,
        })
    }

    /// Disable every plugin, newest first. Safe to call more than once.
    pub async fn shutdown(&mut self) -> Result<usize> {
        if self.shut_down {
            return Ok(0);
        }
        log::info!("Shutting down {}", constants::APP_NAME);
        let removed = self.plugin_manager.shutdown().await;
        self.shut_down = true;
        Ok(removed)
    }

    fn world_ready(&self) {
        log::info!("World ready; continuing with post-world plugins");
    }
}

fn lifecycle_error(phase: KernelLifecyclePhase, message: &str, source: Error) -> Error {
    Error::KernelLifecycleError {
        phase,
        message: message.to_string(),
        source: Some(Box::new(source)),
    }
}
