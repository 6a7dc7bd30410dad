use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::plugin_system::context::CodeLoadingContext;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::manifest::ComponentManifest;
use crate::plugin_system::traits::Plugin;

/// No-argument constructor registered under an entry-point name
pub type PluginConstructor = Arc<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// Turns a package's declared entry point into a live plugin instance.
///
/// Implementations must resolve `entry_point` through `context` only, never
/// through another package's context.
pub trait EntryPointResolver: Send + Sync {
    fn instantiate(
        &self,
        context: &mut CodeLoadingContext,
        manifest: &ComponentManifest,
        entry_point: &str,
    ) -> Result<Box<dyn Plugin>, PluginSystemError>;
}

/// Entry points linked into the host binary, keyed by entry-point name.
#[derive(Clone, Default)]
pub struct StaticEntryPoints {
    constructors: HashMap<String, PluginConstructor>,
}

impl fmt::Debug for StaticEntryPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.constructors.keys().collect();
        names.sort();
        f.debug_struct("StaticEntryPoints").field("entry_points", &names).finish()
    }
}

impl StaticEntryPoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor, replacing any previous one with the same name
    pub fn register<F>(&mut self, entry_point: &str, constructor: F)
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        self.constructors.insert(entry_point.to_string(), Arc::new(constructor));
    }

    pub fn with<F>(mut self, entry_point: &str, constructor: F) -> Self
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        self.register(entry_point, constructor);
        self
    }

    pub fn contains(&self, entry_point: &str) -> bool {
        self.constructors.contains_key(entry_point)
    }
}

impl EntryPointResolver for StaticEntryPoints {
    fn instantiate(
        &self,
        context: &mut CodeLoadingContext,
        _manifest: &ComponentManifest,
        entry_point: &str,
    ) -> Result<Box<dyn Plugin>, PluginSystemError> {
        let constructor = self
            .constructors
            .get(entry_point)
            .ok_or_else(|| PluginSystemError::EntryPointError {
                plugin_id: context.package().to_string(),
                entry_point: entry_point.to_string(),
                message: "no built-in entry point registered under this name".to_string(),
            })?;
        let constructor = Arc::clone(constructor);
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || constructor())).map_err(|panic_obj| {
            PluginSystemError::EntryPointError {
                plugin_id: context.package().to_string(),
                entry_point: entry_point.to_string(),
                message: format!("constructor panicked: {}", crate::utils::panic_message(panic_obj.as_ref())),
            }
        })
    }
}

/// Tries each resolver in turn, returning the first instance produced.
///
/// Only `EntryPointError`s fall through to the next resolver; any other
/// failure is reported as-is.
#[derive(Clone, Default)]
pub struct ChainedEntryPoints {
    resolvers: Vec<Arc<dyn EntryPointResolver>>,
}

impl ChainedEntryPoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: Arc<dyn EntryPointResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }
}

impl EntryPointResolver for ChainedEntryPoints {
    fn instantiate(
        &self,
        context: &mut CodeLoadingContext,
        manifest: &ComponentManifest,
        entry_point: &str,
    ) -> Result<Box<dyn Plugin>, PluginSystemError> {
        let mut last_error = None;
        for resolver in &self.resolvers {
            match resolver.instantiate(context, manifest, entry_point) {
                Ok(plugin) => return Ok(plugin),
                Err(e @ PluginSystemError::EntryPointError { .. }) => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| PluginSystemError::EntryPointError {
            plugin_id: context.package().to_string(),
            entry_point: entry_point.to_string(),
            message: "no entry-point resolvers configured".to_string(),
        }))
    }
}
