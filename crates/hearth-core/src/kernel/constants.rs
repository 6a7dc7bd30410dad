/// Application name
pub const APP_NAME: &str = "Hearth";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default plugins directory
pub const DEFAULT_PLUGINS_DIR: &str = "plugins";

/// File extension of package archives (compared case-insensitively)
pub const PACKAGE_EXTENSION: &str = "hpk";

/// Metadata descriptor resource, at the root of every package archive
pub const DESCRIPTOR_RESOURCE: &str = "CANARY.INF";

/// Archive-level component manifest
pub const MANIFEST_RESOURCE: &str = "META-INF/MANIFEST.MF";

/// Manifest attribute naming the entry point
pub const ENTRY_POINT_ATTRIBUTE: &str = "Entry-Point";

/// Manifest attribute naming the native library entry inside the archive
pub const NATIVE_LIBRARY_ATTRIBUTE: &str = "Native-Library";

/// Descriptor key selecting the load stage
pub const MOUNT_POINT_KEY: &str = "mount-point";

/// Descriptor key listing load-time dependencies
pub const DEPENDENCIES_KEY: &str = "dependencies";

/// Mount point assumed when the descriptor does not declare one
pub const DEFAULT_MOUNT_POINT: &str = "after";

/// Readable plugin list when nothing is loaded
pub const EMPTY_PLUGIN_LIST: &str = "Empty";
