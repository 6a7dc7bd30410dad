//! Package discovery.
//!
//! [`PackageScanner::scan`] walks the plugins directory (non-recursively, in
//! file-name order), opens each package archive as its own
//! [`CodeLoadingContext`], parses the descriptor, and sorts the package into
//! the pre stage, the post stage or the no-load set. Broken packages are
//! logged and skipped; only an inaccessible directory fails the scan.
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::kernel::constants;
use crate::plugin_system::context::CodeLoadingContext;
use crate::plugin_system::dependency::DependencyMap;
use crate::plugin_system::descriptor::{MountPoint, PackageDescriptor};
use crate::plugin_system::error::PluginSystemError;
use crate::storage::config::HostConfig;
use crate::utils::error_chain;
use crate::utils::fs::{list_files_with_extension, package_stem};

/// A package that passed the scan, with the context its code will load from
#[derive(Debug)]
pub struct ScannedPackage {
    pub descriptor: PackageDescriptor,
    pub context: CodeLoadingContext,
}

/// A package file the scan could not use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPackage {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of scanning the plugins directory. Maps are keyed by lowercase package name.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub pre: DependencyMap,
    pub post: DependencyMap,
    /// Lowercase name -> package name as found on disk
    pub no_load: BTreeMap<String, String>,
    /// Lowercase name -> file name on disk
    pub cased_names: HashMap<String, String>,
    pub packages: HashMap<String, ScannedPackage>,
    pub skipped: Vec<SkippedPackage>,
}

impl ScanReport {
    /// Take the context of a scanned package out of the report
    pub fn take_package(&mut self, key: &str) -> Option<ScannedPackage> {
        self.packages.remove(key)
    }

    /// Name as declared by its file, falling back to the lowercase key
    pub fn display_name(&self, key: &str) -> String {
        self.packages
            .get(key)
            .map(|p| p.descriptor.name().to_string())
            .unwrap_or_else(|| key.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct PackageScanner {
    plugin_dir: PathBuf,
    extension: String,
    enforce_pre_dependencies: bool,
    extraction_root: Option<PathBuf>,
}

impl PackageScanner {
    pub fn new(plugin_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            extension: constants::PACKAGE_EXTENSION.to_string(),
            enforce_pre_dependencies: false,
            extraction_root: None,
        }
    }

    pub fn from_config(config: &HostConfig) -> Self {
        Self {
            plugin_dir: config.plugins_dir.clone(),
            extension: config.package_extension.clone(),
            enforce_pre_dependencies: config.enforce_pre_dependencies,
            extraction_root: config.extraction_dir.clone(),
        }
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.to_string();
        self
    }

    pub fn with_enforced_pre_dependencies(mut self, enforce: bool) -> Self {
        self.enforce_pre_dependencies = enforce;
        self
    }

    pub fn with_extraction_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.extraction_root = Some(root.into());
        self
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    pub fn scan(&self) -> Result<ScanReport, PluginSystemError> {
        let files = list_files_with_extension(&self.plugin_dir, &self.extension).map_err(|e| {
            PluginSystemError::DirectoryError {
                path: self.plugin_dir.clone(),
                message: e.to_string(),
            }
        })?;
        log::info!("Scanning {} package(s) in {}", files.len(), self.plugin_dir.display());

        let mut report = ScanReport::default();
        for path in files {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let Some(name) = package_stem(&path) else {
                skip(&mut report, &path, "file name has no package name".to_string());
                continue;
            };
            let key = name.to_lowercase();

            if let Some(existing) = report.cased_names.get(&key) {
                let reason = format!("duplicate package name '{}', already provided by {}", name, existing);
                log::warn!("Rejecting {}: {}", path.display(), reason);
                report.skipped.push(SkippedPackage { path, reason });
                continue;
            }

            let (descriptor, context) = match self.open_package(&name, &path) {
                Ok(opened) => opened,
                Err(e) => {
                    skip(&mut report, &path, error_chain(&e));
                    continue;
                }
            };

            report.cased_names.insert(key.clone(), file_name);
            match descriptor.mount_point() {
                MountPoint::None => {
                    log::info!("Package '{}' is marked no-load", name);
                    report.no_load.insert(key, name);
                    drop(context);
                    continue;
                }
                MountPoint::Pre => {
                    let dependencies = if self.enforce_pre_dependencies {
                        descriptor.dependencies().iter().cloned().collect()
                    } else {
                        BTreeSet::new()
                    };
                    report.pre.insert(key.clone(), dependencies);
                }
                MountPoint::Post => {
                    report
                        .post
                        .insert(key.clone(), descriptor.dependencies().iter().cloned().collect());
                }
            }
            log::debug!(
                "Package '{}' mounts {} with dependencies {:?}",
                name,
                descriptor.mount_point(),
                descriptor.dependencies()
            );
            report.packages.insert(key, ScannedPackage { descriptor, context });
        }
        Ok(report)
    }

    fn open_package(&self, name: &str, path: &Path) -> Result<(PackageDescriptor, CodeLoadingContext), PluginSystemError> {
        let mut context = CodeLoadingContext::open(name, path, self.extraction_root.as_deref())?;
        let content = context.read_descriptor(constants::DESCRIPTOR_RESOURCE)?;
        let descriptor = PackageDescriptor::parse(name, &content, path)?;
        Ok((descriptor, context))
    }
}

fn skip(report: &mut ScanReport, path: &Path, reason: String) {
    log::error!("Skipping package {}: {}", path.display(), reason);
    report.skipped.push(SkippedPackage {
        path: path.to_path_buf(),
        reason,
    });
}
