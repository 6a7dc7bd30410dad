use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::kernel::constants;
use crate::plugin_system::descriptor::MountPoint;
use crate::plugin_system::error::{PluginSystemError, PluginSystemErrorSource};
use crate::plugin_system::manifest::ComponentManifest;

/// Writes package archives: descriptor, component manifest and optional
/// native library or extra resources.
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    name: String,
    mount_point: Option<MountPoint>,
    dependencies: Vec<String>,
    entry_point: Option<String>,
    library: Option<(String, Vec<u8>)>,
    resources: Vec<(String, Vec<u8>)>,
    raw_descriptor: Option<String>,
    include_manifest: bool,
}

impl PackageBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mount_point: None,
            dependencies: Vec::new(),
            entry_point: None,
            library: None,
            resources: Vec::new(),
            raw_descriptor: None,
            include_manifest: true,
        }
    }

    pub fn mount_point(mut self, mount_point: MountPoint) -> Self {
        self.mount_point = Some(mount_point);
        self
    }

    pub fn dependency(mut self, dependency: &str) -> Self {
        self.dependencies.push(dependency.to_string());
        self
    }

    pub fn dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(|d| d.as_ref().to_string()));
        self
    }

    pub fn entry_point(mut self, entry_point: &str) -> Self {
        self.entry_point = Some(entry_point.to_string());
        self
    }

    /// Bundle a native library under `entry` and name it in the manifest
    pub fn native_library(mut self, entry: &str, data: Vec<u8>) -> Self {
        self.library = Some((entry.to_string(), data));
        self
    }

    pub fn resource(mut self, entry: &str, data: impl Into<Vec<u8>>) -> Self {
        self.resources.push((entry.to_string(), data.into()));
        self
    }

    /// Write this text as the descriptor instead of generating one
    pub fn raw_descriptor(mut self, content: &str) -> Self {
        self.raw_descriptor = Some(content.to_string());
        self
    }

    /// Leave out `META-INF/MANIFEST.MF`
    pub fn without_manifest(mut self) -> Self {
        self.include_manifest = false;
        self
    }

    pub fn descriptor_text(&self) -> String {
        if let Some(raw) = &self.raw_descriptor {
            return raw.clone();
        }
        let mut out = format!("# {} package descriptor\n", self.name);
        if let Some(mount_point) = self.mount_point {
            let value = match mount_point {
                MountPoint::Pre => "before",
                MountPoint::Post => "after",
                MountPoint::None => "no-load",
            };
            out.push_str(&format!("{}={}\n", constants::MOUNT_POINT_KEY, value));
        }
        if !self.dependencies.is_empty() {
            out.push_str(&format!("{}={}\n", constants::DEPENDENCIES_KEY, self.dependencies.join(", ")));
        }
        out
    }

    pub fn manifest(&self) -> ComponentManifest {
        let mut manifest = ComponentManifest::new();
        if let Some(entry_point) = &self.entry_point {
            manifest = manifest.with_attribute(constants::ENTRY_POINT_ATTRIBUTE, entry_point);
        }
        if let Some((entry, _)) = &self.library {
            manifest = manifest.with_attribute(constants::NATIVE_LIBRARY_ATTRIBUTE, entry);
        }
        manifest
    }

    /// Write `<dir>/<name>.<extension>` and return its path
    pub fn write_to_dir(&self, dir: &Path, extension: &str) -> Result<PathBuf, PluginSystemError> {
        let path = dir.join(format!("{}.{}", self.name, extension.trim_start_matches('.')));
        self.write(&path)?;
        Ok(path)
    }

    pub fn write(&self, path: &Path) -> Result<(), PluginSystemError> {
        let file = File::create(path).map_err(|e| self.error(path, e.into()))?;
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut entries: Vec<(&str, Vec<u8>)> =
            vec![(constants::DESCRIPTOR_RESOURCE, self.descriptor_text().into_bytes())];
        if self.include_manifest {
            entries.push((constants::MANIFEST_RESOURCE, self.manifest().render().into_bytes()));
        }
        if let Some((entry, data)) = &self.library {
            entries.push((entry.as_str(), data.clone()));
        }
        for (entry, data) in &self.resources {
            entries.push((entry.as_str(), data.clone()));
        }

        for (entry, data) in entries {
            writer
                .start_file(entry, options)
                .map_err(|e| self.error(path, e.into()))?;
            writer.write_all(&data).map_err(|e| self.error(path, e.into()))?;
        }
        writer.finish().map_err(|e| self.error(path, e.into()))?;
        log::debug!("Wrote package '{}' to {}", self.name, path.display());
        Ok(())
    }

    fn error(&self, path: &Path, source: PluginSystemErrorSource) -> PluginSystemError {
        PluginSystemError::LoadingError {
            plugin_id: self.name.clone(),
            path: Some(path.to_path_buf()),
            source: Box::new(source),
        }
    }
}
