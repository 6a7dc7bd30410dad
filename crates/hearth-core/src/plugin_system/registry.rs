use std::fmt;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::kernel::constants;
use crate::plugin_system::context::CodeLoadingContext;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::traits::{Plugin, PluginError};
use crate::utils::panic_message;

/// An activated plugin together with the context its code was loaded from.
pub struct LoadedPlugin {
    name: String,
    key: String,
    package: String,
    enabled: AtomicBool,
    // Declared before `context`: the instance must be dropped while its
    // context (and any extracted library) is still alive.
    instance: Box<dyn Plugin>,
    context: std::sync::Mutex<CodeLoadingContext>,
}

impl fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("name", &self.name)
            .field("package", &self.package)
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

impl LoadedPlugin {
    /// Wrap a fresh instance. The plugin is named after its package.
    pub fn new(package: &str, instance: Box<dyn Plugin>, context: CodeLoadingContext) -> Self {
        Self {
            name: package.to_string(),
            key: package.to_lowercase(),
            package: context.path().display().to_string(),
            enabled: AtomicBool::new(false),
            instance,
            context: std::sync::Mutex::new(context),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-folded name the registry matches on
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Archive path the plugin was loaded from
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Name reported by the entry-point instance itself
    pub fn instance_name(&self) -> &str {
        self.instance.name()
    }

    pub fn instance(&self) -> &dyn Plugin {
        self.instance.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Invoke the plugin's `enable` hook. Panics are caught and reported as errors.
    pub fn enable(&self) -> Result<(), PluginError> {
        self.invoke("enable", |plugin| plugin.enable())?;
        self.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Invoke the plugin's `disable` hook. The plugin counts as disabled even if the hook fails.
    pub fn disable(&self) -> Result<(), PluginError> {
        let result = self.invoke("disable", |plugin| plugin.disable());
        self.enabled.store(false, Ordering::SeqCst);
        result
    }

    /// Read a resource bundled in this plugin's own package.
    pub fn resource(&self, entry: &str) -> Result<Vec<u8>, PluginSystemError> {
        let mut context = self
            .context
            .lock()
            .map_err(|_| PluginSystemError::InternalError(format!("context of '{}' is poisoned", self.name)))?;
        let location = context.find_resource(entry).ok_or_else(|| PluginSystemError::LoadingError {
            plugin_id: self.name.clone(),
            path: Some(context.path().to_path_buf()),
            source: Box::new(crate::plugin_system::error::PluginSystemErrorSource::Other(format!(
                "no resource '{}'",
                entry
            ))),
        })?;
        context.read_resource(&location)
    }

    fn invoke<F>(&self, operation: &str, hook: F) -> Result<(), PluginError>
    where
        F: FnOnce(&dyn Plugin) -> Result<(), PluginError>,
    {
        let instance = self.instance.as_ref();
        match panic::catch_unwind(panic::AssertUnwindSafe(|| hook(instance))) {
            Ok(result) => result,
            Err(panic_obj) => Err(PluginError::ExecutionError(format!(
                "'{}' panicked during {}: {}",
                self.name,
                operation,
                panic_message(panic_obj.as_ref())
            ))),
        }
    }
}

/// Thread-safe collection of activated plugins, in activation order.
///
/// One lock guards the list. It is never held while a plugin hook runs, so
/// hooks may call back into the registry.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Mutex<Vec<Arc<LoadedPlugin>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin, rejecting a second plugin with the same case-insensitive name
    pub async fn register(&self, plugin: Arc<LoadedPlugin>) -> Result<(), PluginSystemError> {
        let mut plugins = self.plugins.lock().await;
        if plugins.iter().any(|p| p.key() == plugin.key()) {
            return Err(PluginSystemError::RegistrationError {
                plugin_id: plugin.name().to_string(),
                message: "a plugin with this name is already registered".to_string(),
            });
        }
        log::debug!("Registered plugin '{}'", plugin.name());
        plugins.push(plugin);
        Ok(())
    }

    /// Case-insensitive lookup
    pub async fn get(&self, name: &str) -> Option<Arc<LoadedPlugin>> {
        let key = name.to_lowercase();
        let plugins = self.plugins.lock().await;
        plugins.iter().find(|p| p.key() == key).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.get(name).await.is_some()
    }

    /// Snapshot of registered names in activation order
    pub async fn names(&self) -> Vec<String> {
        let plugins = self.plugins.lock().await;
        plugins.iter().map(|p| p.name().to_string()).collect()
    }

    pub async fn len(&self) -> usize {
        self.plugins.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.plugins.lock().await.is_empty()
    }

    /// Names joined with ", ", or "Empty" when nothing is registered
    pub async fn readable_list(&self) -> String {
        let names = self.names().await;
        if names.is_empty() {
            constants::EMPTY_PLUGIN_LIST.to_string()
        } else {
            names.join(", ")
        }
    }

    pub async fn enable(&self, name: &str) -> Result<(), PluginSystemError> {
        let plugin = self
            .get(name)
            .await
            .ok_or_else(|| PluginSystemError::PluginNotFound(name.to_string()))?;
        plugin.enable().map_err(|source| PluginSystemError::LifecycleError {
            plugin_id: plugin.name().to_string(),
            operation: "enable".to_string(),
            source,
        })?;
        log::info!("Enabled plugin '{}'", plugin.name());
        Ok(())
    }

    pub async fn disable(&self, name: &str) -> Result<(), PluginSystemError> {
        let plugin = self
            .get(name)
            .await
            .ok_or_else(|| PluginSystemError::PluginNotFound(name.to_string()))?;
        plugin.disable().map_err(|source| PluginSystemError::LifecycleError {
            plugin_id: plugin.name().to_string(),
            operation: "disable".to_string(),
            source,
        })?;
        log::info!("Disabled plugin '{}'", plugin.name());
        Ok(())
    }

    /// Remove every plugin, disabling the enabled ones in reverse activation order.
    /// Hook failures are logged and do not stop the shutdown.
    pub async fn shutdown_all(&self) -> usize {
        let drained: Vec<Arc<LoadedPlugin>> = {
            let mut plugins = self.plugins.lock().await;
            plugins.drain(..).collect()
        };
        let count = drained.len();
        for plugin in drained.into_iter().rev() {
            if plugin.is_enabled() {
                match plugin.disable() {
                    Ok(()) => log::info!("Disabled plugin '{}'", plugin.name()),
                    Err(e) => log::error!("Error disabling plugin '{}' during shutdown: {}", plugin.name(), e),
                }
            }
            drop(plugin);
        }
        count
    }
}
