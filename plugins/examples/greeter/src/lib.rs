use std::sync::atomic::{AtomicUsize, Ordering};

use hearth_core::plugin_system::{Plugin, PluginError};
use log::info;

const PLUGIN_NAME: &str = "Greeter";

/// Minimal plugin that logs a greeting on every enable and a farewell on disable.
#[derive(Debug, Default)]
pub struct Greeter {
    greetings: AtomicUsize,
}

impl Greeter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for Greeter {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn enable(&self) -> Result<(), PluginError> {
        let count = self.greetings.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Hello from {} (enabled {} time(s))", PLUGIN_NAME, count);
        Ok(())
    }

    fn disable(&self) -> Result<(), PluginError> {
        info!("Goodbye from {}", PLUGIN_NAME);
        Ok(())
    }
}

hearth_core::export_plugin!(greeter_entry, Greeter, Greeter::new());
