use std::sync::Arc;

use crate::kernel::constants;
use crate::plugin_system::context::CodeLoadingContext;
use crate::plugin_system::entry_point::EntryPointResolver;
use crate::plugin_system::error::{PluginSystemError, PluginSystemErrorSource};
use crate::plugin_system::manifest::ComponentManifest;
use crate::plugin_system::registry::{LoadedPlugin, PluginRegistry};

/// Activates one package: reads its manifest, instantiates its entry point
/// inside the package's own context, enables it and registers it.
#[derive(Clone)]
pub struct Activator {
    resolver: Arc<dyn EntryPointResolver>,
}

impl std::fmt::Debug for Activator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Activator").finish_non_exhaustive()
    }
}

impl Activator {
    pub fn new(resolver: Arc<dyn EntryPointResolver>) -> Self {
        Self { resolver }
    }

    /// Read the component manifest sitting at the root of the package archive,
    /// next to the descriptor found during the scan.
    pub fn read_manifest(&self, context: &mut CodeLoadingContext) -> Result<ComponentManifest, PluginSystemError> {
        let package = context.package().to_string();
        let location = context
            .descriptor_location()
            .map(|descriptor| descriptor.at_archive_root(constants::MANIFEST_RESOURCE))
            .ok_or_else(|| PluginSystemError::ManifestError {
                plugin_id: package.clone(),
                message: "package was not scanned: descriptor location unknown".to_string(),
                source: None,
            })?;
        let content = context
            .read_to_string(&location)
            .map_err(|e| PluginSystemError::ManifestError {
                plugin_id: package.clone(),
                message: format!("cannot read {}", location),
                source: Some(Box::new(PluginSystemErrorSource::Other(e.to_string()))),
            })?;
        ComponentManifest::parse(&content).map_err(|message| PluginSystemError::ManifestError {
            plugin_id: package,
            message,
            source: None,
        })
    }

    /// Activate the package `name` from its scanned context.
    ///
    /// Every failure is returned for this package alone; on a registry
    /// rejection the fresh instance is disabled before it is dropped.
    pub async fn activate(
        &self,
        name: &str,
        mut context: CodeLoadingContext,
        registry: &PluginRegistry,
    ) -> Result<Arc<LoadedPlugin>, PluginSystemError> {
        let manifest = self.read_manifest(&mut context)?;
        let entry_point = manifest
            .entry_point()
            .ok_or_else(|| PluginSystemError::ManifestError {
                plugin_id: name.to_string(),
                message: format!("missing {} attribute", constants::ENTRY_POINT_ATTRIBUTE),
                source: None,
            })?
            .to_string();

        log::debug!("Instantiating entry point '{}' of '{}'", entry_point, name);
        let instance = self.resolver.instantiate(&mut context, &manifest, &entry_point)?;
        let plugin = Arc::new(LoadedPlugin::new(name, instance, context));

        plugin.enable().map_err(|source| PluginSystemError::ActivationError {
            plugin_id: name.to_string(),
            source,
        })?;

        if let Err(e) = registry.register(Arc::clone(&plugin)).await {
            if let Err(disable_err) = plugin.disable() {
                log::warn!("Disabling rejected plugin '{}' failed: {}", name, disable_err);
            }
            return Err(e);
        }

        log::info!("Activated plugin '{}'", name);
        Ok(plugin)
    }
}
