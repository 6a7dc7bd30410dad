use std::sync::Arc;

use tempfile::tempdir;

use super::common::{Behaviour, events, loaded_plugin, tracker};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::registry::PluginRegistry;

#[tokio::test]
async fn test_empty_registry() {
    let registry = PluginRegistry::new();
    assert!(registry.is_empty().await);
    assert_eq!(registry.readable_list().await, "Empty");
    assert!(registry.names().await.is_empty());
    assert!(registry.get("anything").await.is_none());
}

#[tokio::test]
async fn test_register_and_case_insensitive_lookup() {
    let dir = tempdir().unwrap();
    let t = tracker();
    let registry = PluginRegistry::new();
    let foo = loaded_plugin(dir.path(), "Foo", &t, Behaviour::Normal);
    registry.register(Arc::clone(&foo)).await.unwrap();

    let upper = registry.get("Foo").await.unwrap();
    let lower = registry.get("foo").await.unwrap();
    assert!(Arc::ptr_eq(&upper, &lower));
    assert!(Arc::ptr_eq(&upper, &foo));
    assert!(registry.get("missing").await.is_none());
    assert!(registry.contains("FOO").await);
    assert_eq!(registry.readable_list().await, "Foo");
}

#[tokio::test]
async fn test_lookup_folds_non_ascii_names() {
    let dir = tempdir().unwrap();
    let other_dir = tempdir().unwrap();
    let t = tracker();
    let registry = PluginRegistry::new();
    let plugin = loaded_plugin(dir.path(), "Ärger", &t, Behaviour::Normal);
    assert_eq!(plugin.key(), "ärger");
    registry.register(Arc::clone(&plugin)).await.unwrap();

    let exact = registry.get("Ärger").await.unwrap();
    let folded = registry.get("ärger").await.unwrap();
    assert!(Arc::ptr_eq(&exact, &folded));
    assert!(registry.contains("ÄRGER").await);
    assert!(registry.enable("ärger").await.is_ok());

    let duplicate = loaded_plugin(other_dir.path(), "ÄRGER", &t, Behaviour::Normal);
    assert!(matches!(
        registry.register(duplicate).await,
        Err(PluginSystemError::RegistrationError { .. })
    ));
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let dir = tempdir().unwrap();
    let other_dir = tempdir().unwrap();
    let t = tracker();
    let registry = PluginRegistry::new();
    registry
        .register(loaded_plugin(dir.path(), "Core", &t, Behaviour::Normal))
        .await
        .unwrap();

    let duplicate = loaded_plugin(other_dir.path(), "CORE", &t, Behaviour::Normal);
    match registry.register(duplicate).await {
        Err(PluginSystemError::RegistrationError { plugin_id, .. }) => assert_eq!(plugin_id, "CORE"),
        other => panic!("expected registration error, got {:?}", other),
    }
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn test_names_and_readable_list_keep_activation_order() {
    let dir = tempdir().unwrap();
    let t = tracker();
    let registry = PluginRegistry::new();
    for name in ["Core", "Addon", "Util"] {
        registry
            .register(loaded_plugin(dir.path(), name, &t, Behaviour::Normal))
            .await
            .unwrap();
    }
    assert_eq!(registry.names().await, vec!["Core", "Addon", "Util"]);
    assert_eq!(registry.readable_list().await, "Core, Addon, Util");
}

#[tokio::test]
async fn test_enable_disable_invoke_hooks() {
    let dir = tempdir().unwrap();
    let t = tracker();
    let registry = PluginRegistry::new();
    let plugin = loaded_plugin(dir.path(), "Core", &t, Behaviour::Normal);
    registry.register(Arc::clone(&plugin)).await.unwrap();

    assert!(!plugin.is_enabled());
    registry.enable("core").await.unwrap();
    assert!(plugin.is_enabled());
    registry.disable("CORE").await.unwrap();
    assert!(!plugin.is_enabled());
    // hooks run every time they are requested
    registry.disable("core").await.unwrap();

    assert_eq!(events(&t), vec!["enable:Core", "disable:Core", "disable:Core"]);
}

#[tokio::test]
async fn test_enable_unknown_plugin_is_not_found() {
    let registry = PluginRegistry::new();
    assert!(matches!(
        registry.enable("ghost").await,
        Err(PluginSystemError::PluginNotFound(name)) if name == "ghost"
    ));
    assert!(matches!(
        registry.disable("ghost").await,
        Err(PluginSystemError::PluginNotFound(_))
    ));
}

#[tokio::test]
async fn test_hook_failures_and_panics_are_contained() {
    let dir = tempdir().unwrap();
    let t = tracker();
    let registry = PluginRegistry::new();
    registry
        .register(loaded_plugin(dir.path(), "Grumpy", &t, Behaviour::FailEnable))
        .await
        .unwrap();
    registry
        .register(loaded_plugin(dir.path(), "Boom", &t, Behaviour::PanicEnable))
        .await
        .unwrap();

    match registry.enable("grumpy").await {
        Err(PluginSystemError::LifecycleError { operation, .. }) => assert_eq!(operation, "enable"),
        other => panic!("expected lifecycle error, got {:?}", other),
    }
    let err = registry.enable("boom").await.unwrap_err();
    assert!(err.to_string().contains("panicked during enable"));
    assert!(!registry.get("boom").await.unwrap().is_enabled());
}

#[tokio::test]
async fn test_hooks_may_reenter_registry() {
    // a hook that queries the registry must not deadlock
    use crate::plugin_system::traits::{Plugin, PluginError};
    use crate::plugin_system::context::CodeLoadingContext;
    use crate::plugin_system::registry::LoadedPlugin;
    use crate::kernel::constants;

    struct Reentrant {
        registry: Arc<PluginRegistry>,
        seen: Arc<std::sync::Mutex<Option<String>>>,
    }

    impl Plugin for Reentrant {
        fn name(&self) -> &str {
            "Reentrant"
        }
        fn enable(&self) -> Result<(), PluginError> {
            let registry = Arc::clone(&self.registry);
            let list = std::thread::spawn(move || {
                tokio::runtime::Builder::new_current_thread()
                    .build()
                    .unwrap()
                    .block_on(registry.readable_list())
            })
            .join()
            .unwrap();
            *self.seen.lock().unwrap() = Some(list);
            Ok(())
        }
        fn disable(&self) -> Result<(), PluginError> {
            Ok(())
        }
    }

    let dir = tempdir().unwrap();
    let registry = Arc::new(PluginRegistry::new());
    let seen = Arc::new(std::sync::Mutex::new(None));
    let path = super::common::write_package(
        dir.path(),
        "Reentrant",
        crate::plugin_system::descriptor::MountPoint::Post,
        &[],
    );
    let mut context = CodeLoadingContext::open("Reentrant", &path, None).unwrap();
    context.read_descriptor(constants::DESCRIPTOR_RESOURCE).unwrap();
    let plugin = Arc::new(LoadedPlugin::new(
        "Reentrant",
        Box::new(Reentrant {
            registry: Arc::clone(&registry),
            seen: Arc::clone(&seen),
        }),
        context,
    ));
    registry.register(plugin).await.unwrap();

    registry.enable("reentrant").await.unwrap();
    assert_eq!(seen.lock().unwrap().as_deref(), Some("Reentrant"));
}

#[tokio::test]
async fn test_shutdown_all_disables_in_reverse_order() {
    let dir = tempdir().unwrap();
    let t = tracker();
    let registry = PluginRegistry::new();
    for (name, behaviour) in [
        ("Core", Behaviour::Normal),
        ("Addon", Behaviour::FailDisable),
        ("Dormant", Behaviour::Normal),
        ("Util", Behaviour::Normal),
    ] {
        let plugin = loaded_plugin(dir.path(), name, &t, behaviour);
        if name != "Dormant" {
            plugin.enable().unwrap();
        }
        registry.register(plugin).await.unwrap();
    }
    t.lock().unwrap().clear();

    assert_eq!(registry.shutdown_all().await, 4);
    assert_eq!(events(&t), vec!["disable:Util", "disable:Addon", "disable:Core"]);
    assert!(registry.is_empty().await);
    assert_eq!(registry.readable_list().await, "Empty");
}

#[tokio::test]
async fn test_loaded_plugin_reads_own_resources() {
    let dir = tempdir().unwrap();
    let t = tracker();
    let plugin = loaded_plugin(dir.path(), "Core", &t, Behaviour::Normal);
    let descriptor = plugin.resource("CANARY.INF").unwrap();
    assert!(String::from_utf8(descriptor).unwrap().contains("mount-point=after"));
    assert!(plugin.resource("nothing/here").is_err());
    assert_eq!(plugin.instance_name(), "Core");
    assert!(plugin.package().ends_with("Core.hpk"));
}
