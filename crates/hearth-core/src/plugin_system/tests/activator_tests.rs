use std::sync::Arc;

use tempfile::tempdir;

use super::common::{Behaviour, entry_for, entry_points, entry_points_with, events, tracker, write_package};
use crate::kernel::constants;
use crate::plugin_system::activator::Activator;
use crate::plugin_system::context::CodeLoadingContext;
use crate::plugin_system::descriptor::MountPoint;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::package::PackageBuilder;
use crate::plugin_system::registry::PluginRegistry;

fn scanned_context(path: &std::path::Path, name: &str) -> CodeLoadingContext {
    let mut context = CodeLoadingContext::open(name, path, None).unwrap();
    context.read_descriptor(constants::DESCRIPTOR_RESOURCE).unwrap();
    context
}

#[tokio::test]
async fn test_activate_enables_and_registers() {
    let dir = tempdir().unwrap();
    let t = tracker();
    let path = write_package(dir.path(), "Core", MountPoint::Post, &[]);
    let activator = Activator::new(Arc::new(entry_points(&["Core"], &t)));
    let registry = PluginRegistry::new();

    let plugin = activator
        .activate("Core", scanned_context(&path, "Core"), &registry)
        .await
        .unwrap();
    assert!(plugin.is_enabled());
    assert_eq!(events(&t), vec!["enable:Core"]);
    assert_eq!(registry.names().await, vec!["Core"]);
}

#[tokio::test]
async fn test_manifest_is_found_next_to_descriptor() {
    let dir = tempdir().unwrap();
    let path = PackageBuilder::new("Core")
        .entry_point("test.core")
        .write_to_dir(dir.path(), "hpk")
        .unwrap();
    let activator = Activator::new(Arc::new(entry_points(&[], &tracker())));

    let mut context = scanned_context(&path, "Core");
    let manifest = activator.read_manifest(&mut context).unwrap();
    assert_eq!(manifest.entry_point(), Some("test.core"));
}

#[tokio::test]
async fn test_unscanned_context_has_no_manifest_location() {
    let dir = tempdir().unwrap();
    let path = write_package(dir.path(), "Core", MountPoint::Post, &[]);
    let activator = Activator::new(Arc::new(entry_points(&["Core"], &tracker())));

    let mut context = CodeLoadingContext::open("Core", &path, None).unwrap();
    assert!(matches!(
        activator.read_manifest(&mut context),
        Err(PluginSystemError::ManifestError { .. })
    ));
}

#[tokio::test]
async fn test_missing_manifest_or_entry_point_fails() {
    let dir = tempdir().unwrap();
    let t = tracker();
    let activator = Activator::new(Arc::new(entry_points(&["NoManifest", "NoEntry"], &t)));
    let registry = PluginRegistry::new();

    let no_manifest = PackageBuilder::new("NoManifest")
        .without_manifest()
        .write_to_dir(dir.path(), "hpk")
        .unwrap();
    let err = activator
        .activate("NoManifest", scanned_context(&no_manifest, "NoManifest"), &registry)
        .await
        .unwrap_err();
    assert!(matches!(err, PluginSystemError::ManifestError { .. }));

    let no_entry = PackageBuilder::new("NoEntry").write_to_dir(dir.path(), "hpk").unwrap();
    match activator
        .activate("NoEntry", scanned_context(&no_entry, "NoEntry"), &registry)
        .await
    {
        Err(PluginSystemError::ManifestError { message, .. }) => assert!(message.contains("Entry-Point")),
        other => panic!("expected manifest error, got {:?}", other),
    }

    assert!(events(&t).is_empty());
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_unknown_entry_point_fails() {
    let dir = tempdir().unwrap();
    let path = write_package(dir.path(), "Stranger", MountPoint::Post, &[]);
    let activator = Activator::new(Arc::new(entry_points(&["Core"], &tracker())));
    let registry = PluginRegistry::new();

    match activator
        .activate("Stranger", scanned_context(&path, "Stranger"), &registry)
        .await
    {
        Err(PluginSystemError::EntryPointError { plugin_id, entry_point, .. }) => {
            assert_eq!(plugin_id, "Stranger");
            assert_eq!(entry_point, entry_for("Stranger"));
        }
        other => panic!("expected entry point error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failing_or_panicking_enable_is_contained() {
    let dir = tempdir().unwrap();
    let t = tracker();
    let activator = Activator::new(Arc::new(entry_points_with(
        &[("Grumpy", Behaviour::FailEnable), ("Boom", Behaviour::PanicEnable)],
        &t,
    )));
    let registry = PluginRegistry::new();

    for name in ["Grumpy", "Boom"] {
        let path = write_package(dir.path(), name, MountPoint::Post, &[]);
        match activator.activate(name, scanned_context(&path, name), &registry).await {
            Err(PluginSystemError::ActivationError { plugin_id, .. }) => assert_eq!(plugin_id, name),
            other => panic!("expected activation error for {}, got {:?}", name, other),
        }
    }
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_constructor_panic_is_contained() {
    let dir = tempdir().unwrap();
    let path = write_package(dir.path(), "Fragile", MountPoint::Post, &[]);
    let mut entry_points = crate::plugin_system::entry_point::StaticEntryPoints::new();
    entry_points.register(&entry_for("Fragile"), || panic!("cannot construct"));
    let activator = Activator::new(Arc::new(entry_points));
    let registry = PluginRegistry::new();

    match activator
        .activate("Fragile", scanned_context(&path, "Fragile"), &registry)
        .await
    {
        Err(PluginSystemError::EntryPointError { message, .. }) => assert!(message.contains("cannot construct")),
        other => panic!("expected entry point error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_registry_rejection_disables_instance() {
    let dir = tempdir().unwrap();
    let other_dir = tempdir().unwrap();
    let t = tracker();
    let activator = Activator::new(Arc::new(entry_points(&["Core"], &t)));
    let registry = PluginRegistry::new();

    let first = write_package(dir.path(), "Core", MountPoint::Post, &[]);
    let second = write_package(other_dir.path(), "Core", MountPoint::Post, &[]);
    activator
        .activate("Core", scanned_context(&first, "Core"), &registry)
        .await
        .unwrap();
    let err = activator
        .activate("core", scanned_context(&second, "core"), &registry)
        .await
        .unwrap_err();

    assert!(matches!(err, PluginSystemError::RegistrationError { .. }));
    assert_eq!(events(&t), vec!["enable:Core", "enable:Core", "disable:Core"]);
    assert_eq!(registry.len().await, 1);
}
