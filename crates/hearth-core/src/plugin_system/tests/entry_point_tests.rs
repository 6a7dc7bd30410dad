use std::path::Path;
use std::sync::Arc;

use tempfile::tempdir;

use super::common::{Behaviour, entry_points_with, tracker};
use crate::kernel::constants;
use crate::plugin_system::context::CodeLoadingContext;
use crate::plugin_system::entry_point::{ChainedEntryPoints, EntryPointResolver, StaticEntryPoints};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::manifest::ComponentManifest;
use crate::plugin_system::native::NativeEntryPoints;
use crate::plugin_system::package::PackageBuilder;
use crate::plugin_system::traits::{Plugin, PluginError};

struct Named(&'static str);

impl Plugin for Named {
    fn name(&self) -> &str {
        self.0
    }
    fn enable(&self) -> Result<(), PluginError> {
        Ok(())
    }
    fn disable(&self) -> Result<(), PluginError> {
        Ok(())
    }
}

fn open(builder: PackageBuilder, dir: &Path) -> (CodeLoadingContext, ComponentManifest) {
    let path = builder.write_to_dir(dir, "hpk").unwrap();
    let mut context = CodeLoadingContext::open("Chained", &path, Some(&dir.join("extract"))).unwrap();
    context.read_descriptor(constants::DESCRIPTOR_RESOURCE).unwrap();
    let location = context.find_resource(constants::MANIFEST_RESOURCE).unwrap();
    let manifest = ComponentManifest::parse(&context.read_to_string(&location).unwrap()).unwrap();
    (context, manifest)
}

fn named(entry: &str, name: &'static str) -> Arc<dyn EntryPointResolver> {
    Arc::new(StaticEntryPoints::new().with(entry, move || Box::new(Named(name)) as Box<dyn Plugin>))
}

#[test]
fn test_static_entry_points_lookup_and_constructor_panic() {
    let dir = tempdir().unwrap();
    let t = tracker();
    let (mut context, manifest) = open(PackageBuilder::new("Chained").entry_point("test.boom"), dir.path());
    let statics = entry_points_with(&[("Good", Behaviour::Normal)], &t).with("test.boom", || -> Box<dyn Plugin> {
        panic!("constructor exploded")
    });
    assert!(statics.contains("test.good"));

    let plugin = statics.instantiate(&mut context, &manifest, "test.good").unwrap();
    assert_eq!(plugin.name(), "Good");

    match statics.instantiate(&mut context, &manifest, "test.boom") {
        Err(PluginSystemError::EntryPointError { message, .. }) => assert!(message.contains("constructor exploded")),
        Err(other) => panic!("expected entry point error, got {:?}", other),
        Ok(_) => panic!("expected entry point error, got a plugin"),
    }
}

#[test]
fn test_chain_falls_through_unknown_entry_points() {
    let dir = tempdir().unwrap();
    let (mut context, manifest) = open(PackageBuilder::new("Chained").entry_point("chained_entry"), dir.path());

    let chain = ChainedEntryPoints::new()
        .with(named("other_entry", "First"))
        .with(named("chained_entry", "Second"))
        .with(named("chained_entry", "Third"));
    let plugin = chain.instantiate(&mut context, &manifest, "chained_entry").unwrap();
    assert_eq!(plugin.name(), "Second");
}

#[test]
fn test_chain_falls_through_from_native_without_library() {
    let dir = tempdir().unwrap();
    let (mut context, manifest) = open(PackageBuilder::new("Chained").entry_point("chained_entry"), dir.path());

    let chain = ChainedEntryPoints::new()
        .with(Arc::new(NativeEntryPoints::new()))
        .with(named("chained_entry", "Builtin"));
    let plugin = chain.instantiate(&mut context, &manifest, "chained_entry").unwrap();
    assert_eq!(plugin.name(), "Builtin");
}

#[test]
fn test_chain_stops_at_loading_errors() {
    let dir = tempdir().unwrap();
    let library = format!("libbroken.{}", std::env::consts::DLL_EXTENSION);
    let (mut context, manifest) = open(
        PackageBuilder::new("Chained")
            .entry_point("chained_entry")
            .native_library(&library, b"not a shared object".to_vec()),
        dir.path(),
    );

    let chain = ChainedEntryPoints::new()
        .with(Arc::new(NativeEntryPoints::new()))
        .with(named("chained_entry", "Builtin"));
    match chain.instantiate(&mut context, &manifest, "chained_entry") {
        Err(PluginSystemError::LoadingError { plugin_id, .. }) => assert_eq!(plugin_id, "Chained"),
        Err(other) => panic!("expected loading error, got {:?}", other),
        Ok(plugin) => panic!("broken library fell through to '{}'", plugin.name()),
    }
}

#[test]
fn test_chain_reports_last_entry_point_error() {
    let dir = tempdir().unwrap();
    let (mut context, manifest) = open(PackageBuilder::new("Chained").entry_point("chained_entry"), dir.path());

    match ChainedEntryPoints::new().instantiate(&mut context, &manifest, "chained_entry") {
        Err(PluginSystemError::EntryPointError { message, .. }) => assert!(message.contains("no entry-point resolvers")),
        Err(other) => panic!("expected entry point error, got {:?}", other),
        Ok(_) => panic!("expected entry point error, got a plugin"),
    }

    let chain = ChainedEntryPoints::new()
        .with(named("first_entry", "First"))
        .with(Arc::new(NativeEntryPoints::new()));
    match chain.instantiate(&mut context, &manifest, "chained_entry") {
        Err(PluginSystemError::EntryPointError { entry_point, message, .. }) => {
            assert_eq!(entry_point, "chained_entry");
            assert!(message.contains("library"), "unexpected message: {}", message);
        }
        Err(other) => panic!("expected entry point error, got {:?}", other),
        Ok(_) => panic!("expected entry point error, got a plugin"),
    }
}
