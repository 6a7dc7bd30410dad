//! Package metadata descriptor (`CANARY.INF`).
//!
//! The descriptor is a newline-delimited list of `key=value` (or `key: value`)
//! pairs. Blank lines and lines starting with `#` or `!` are ignored. Keys are
//! case-insensitive.
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::kernel::constants;
use crate::plugin_system::error::PluginSystemError;

/// Load stage a package declares for itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountPoint {
    /// Activated before the world is ready
    Pre,
    /// Activated after the world is ready
    Post,
    /// Never activated
    None,
}

impl MountPoint {
    /// Parse a mount-point value like "before" or "no-load" (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "before" | "pre" => Some(MountPoint::Pre),
            "after" | "post" => Some(MountPoint::Post),
            "no-load" | "none" => Some(MountPoint::None),
            _ => None,
        }
    }
}

impl fmt::Display for MountPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountPoint::Pre => write!(f, "pre"),
            MountPoint::Post => write!(f, "post"),
            MountPoint::None => write!(f, "no-load"),
        }
    }
}

/// Parsed package descriptor. Immutable once scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    name: String,
    mount_point: MountPoint,
    dependencies: Vec<String>,
}

impl PackageDescriptor {
    pub fn new(name: &str, mount_point: MountPoint, dependencies: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            mount_point,
            dependencies: normalize_dependencies(dependencies.iter().copied()),
        }
    }

    /// Parse descriptor content for the package `name` found at `path`.
    pub fn parse(name: &str, content: &str, path: &Path) -> Result<Self, PluginSystemError> {
        let properties = parse_properties(content).map_err(|message| PluginSystemError::DescriptorError {
            path: path.to_path_buf(),
            message,
        })?;

        let mount = properties
            .get(constants::MOUNT_POINT_KEY)
            .map(String::as_str)
            .unwrap_or(constants::DEFAULT_MOUNT_POINT);
        let mount_point = MountPoint::parse(mount).ok_or_else(|| PluginSystemError::DescriptorError {
            path: path.to_path_buf(),
            message: format!("invalid {} '{}'", constants::MOUNT_POINT_KEY, mount.trim()),
        })?;

        let dependencies = properties
            .get(constants::DEPENDENCIES_KEY)
            .map(|raw| normalize_dependencies(raw.split([',', ';'])))
            .unwrap_or_default();

        Ok(Self {
            name: name.to_string(),
            mount_point,
            dependencies,
        })
    }

    /// Package name as found on disk
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-folded name used as the package key
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn mount_point(&self) -> MountPoint {
        self.mount_point
    }

    /// Declared dependencies: trimmed, lowercased, deduplicated, in declaration order
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

fn normalize_dependencies<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut dependencies: Vec<String> = Vec::new();
    for token in raw {
        let dependency = token.trim().to_lowercase();
        if dependency.is_empty() || dependencies.contains(&dependency) {
            continue;
        }
        dependencies.push(dependency);
    }
    dependencies
}

/// Parse `key=value` / `key: value` lines into a map with lowercase keys.
pub(crate) fn parse_properties(content: &str) -> Result<HashMap<String, String>, String> {
    let mut properties = HashMap::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some(split_at) = line.find(['=', ':']) else {
            return Err(format!("line {}: expected 'key=value', found '{}'", number + 1, line));
        };
        let key = line[..split_at].trim().to_lowercase();
        if key.is_empty() {
            return Err(format!("line {}: empty key", number + 1));
        }
        let value = line[split_at + 1..].trim().to_string();
        properties.insert(key, value);
    }
    Ok(properties)
}
