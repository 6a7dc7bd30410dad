//! Shared fixtures: recording mock plugins and on-disk packages.
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use crate::kernel::constants;
use crate::plugin_system::context::CodeLoadingContext;
use crate::plugin_system::descriptor::MountPoint;
use crate::plugin_system::entry_point::StaticEntryPoints;
use crate::plugin_system::package::PackageBuilder;
use crate::plugin_system::registry::LoadedPlugin;
use crate::plugin_system::traits::{Plugin, PluginError};

pub type Tracker = Arc<StdMutex<Vec<String>>>;

pub fn tracker() -> Tracker {
    Arc::new(StdMutex::new(Vec::new()))
}

pub fn events(tracker: &Tracker) -> Vec<String> {
    tracker.lock().unwrap().clone()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Normal,
    FailEnable,
    PanicEnable,
    FailDisable,
}

pub struct MockPlugin {
    name: String,
    tracker: Tracker,
    behaviour: Behaviour,
}

impl MockPlugin {
    pub fn new(name: &str, tracker: Tracker, behaviour: Behaviour) -> Self {
        Self {
            name: name.to_string(),
            tracker,
            behaviour,
        }
    }
}

impl Plugin for MockPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn enable(&self) -> Result<(), PluginError> {
        match self.behaviour {
            Behaviour::FailEnable => Err(PluginError::EnableError(format!("{} refused", self.name))),
            Behaviour::PanicEnable => panic!("{} exploded", self.name),
            _ => {
                self.tracker.lock().unwrap().push(format!("enable:{}", self.name));
                Ok(())
            }
        }
    }

    fn disable(&self) -> Result<(), PluginError> {
        self.tracker.lock().unwrap().push(format!("disable:{}", self.name));
        match self.behaviour {
            Behaviour::FailDisable => Err(PluginError::DisableError(format!("{} refused", self.name))),
            _ => Ok(()),
        }
    }
}

/// Entry-point name the fixtures use for a package
pub fn entry_for(name: &str) -> String {
    format!("test.{}", name.to_lowercase())
}

/// Static entry points for `names`, all recording into `tracker`
pub fn entry_points(names: &[&str], tracker: &Tracker) -> StaticEntryPoints {
    entry_points_with(names.iter().map(|n| (*n, Behaviour::Normal)).collect::<Vec<_>>().as_slice(), tracker)
}

pub fn entry_points_with(plugins: &[(&str, Behaviour)], tracker: &Tracker) -> StaticEntryPoints {
    let mut entry_points = StaticEntryPoints::new();
    for (name, behaviour) in plugins {
        let name = name.to_string();
        let behaviour = *behaviour;
        let tracker = Arc::clone(tracker);
        entry_points.register(&entry_for(&name), move || {
            Box::new(MockPlugin::new(&name, Arc::clone(&tracker), behaviour)) as Box<dyn Plugin>
        });
    }
    entry_points
}

/// Write `<dir>/<name>.hpk` with a generated descriptor and manifest
pub fn write_package(dir: &Path, name: &str, mount_point: MountPoint, dependencies: &[&str]) -> PathBuf {
    PackageBuilder::new(name)
        .mount_point(mount_point)
        .dependencies(dependencies)
        .entry_point(&entry_for(name))
        .write_to_dir(dir, "hpk")
        .unwrap()
}

/// A LoadedPlugin backed by a real package archive in `dir`
pub fn loaded_plugin(dir: &Path, name: &str, tracker: &Tracker, behaviour: Behaviour) -> Arc<LoadedPlugin> {
    let path = write_package(dir, name, MountPoint::Post, &[]);
    let mut context = CodeLoadingContext::open(name, &path, None).unwrap();
    context.read_descriptor(constants::DESCRIPTOR_RESOURCE).unwrap();
    let instance = Box::new(MockPlugin::new(name, Arc::clone(tracker), behaviour));
    Arc::new(LoadedPlugin::new(name, instance, context))
}
