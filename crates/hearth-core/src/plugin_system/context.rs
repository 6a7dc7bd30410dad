//! Isolated code-loading contexts.
//!
//! A [`CodeLoadingContext`] is bound to exactly one package archive. Every
//! resource lookup and every library extraction goes through the context of
//! the package that asked for it, so two packages never see each other's
//! code. Isolation is namespace separation only.
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zip::ZipArchive;

use crate::plugin_system::error::{PluginSystemError, PluginSystemErrorSource};

/// Location of a resource inside a package archive
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceLocation {
    archive: PathBuf,
    entry: String,
}

impl ResourceLocation {
    pub fn new(archive: impl Into<PathBuf>, entry: impl Into<String>) -> Self {
        Self {
            archive: archive.into(),
            entry: entry.into(),
        }
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Location of another resource at the root of the same archive.
    pub fn at_archive_root(&self, entry: &str) -> Self {
        Self {
            archive: self.archive.clone(),
            entry: entry.trim_start_matches('/').to_string(),
        }
    }
}

impl fmt::Display for ResourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!/{}", self.archive.display(), self.entry)
    }
}

/// Code-loading context owning one package's archive handle and its private
/// extraction directory.
pub struct CodeLoadingContext {
    package: String,
    path: PathBuf,
    archive: ZipArchive<File>,
    descriptor: Option<ResourceLocation>,
    extraction_root: Option<PathBuf>,
    extraction_dir: Option<TempDir>,
}

impl fmt::Debug for CodeLoadingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeLoadingContext")
            .field("package", &self.package)
            .field("path", &self.path)
            .field("entries", &self.archive.len())
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

impl CodeLoadingContext {
    /// Open the archive at `path` as the context of `package`.
    ///
    /// Extracted libraries go to a fresh directory under `extraction_root`, or
    /// under the system temp dir when no root is given.
    pub fn open(package: &str, path: &Path, extraction_root: Option<&Path>) -> Result<Self, PluginSystemError> {
        let file = File::open(path).map_err(|e| loading_error(package, path, e.into()))?;
        let archive = ZipArchive::new(file).map_err(|e| loading_error(package, path, e.into()))?;
        log::debug!("Opened code-loading context for '{}' ({} entries)", package, archive.len());
        Ok(Self {
            package: package.to_string(),
            path: path.to_path_buf(),
            archive,
            descriptor: None,
            extraction_root: extraction_root.map(Path::to_path_buf),
            extraction_dir: None,
        })
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the descriptor was found, once [`read_descriptor`](Self::read_descriptor) succeeded
    pub fn descriptor_location(&self) -> Option<&ResourceLocation> {
        self.descriptor.as_ref()
    }

    /// Locate a resource in this archive only.
    pub fn find_resource(&self, entry: &str) -> Option<ResourceLocation> {
        let entry = entry.trim_start_matches('/');
        self.archive
            .index_for_name(entry)
            .map(|_| ResourceLocation::new(&self.path, entry))
    }

    /// Names of every entry in the archive
    pub fn resource_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    /// Read the descriptor resource and remember where it was found.
    pub fn read_descriptor(&mut self, entry: &str) -> Result<String, PluginSystemError> {
        let location = self.find_resource(entry).ok_or_else(|| PluginSystemError::DescriptorError {
            path: self.path.clone(),
            message: format!("missing {}", entry),
        })?;
        let content = self.read_to_string(&location)?;
        self.descriptor = Some(location);
        Ok(content)
    }

    pub fn read_resource(&mut self, location: &ResourceLocation) -> Result<Vec<u8>, PluginSystemError> {
        if location.archive() != self.path {
            return Err(loading_error(
                &self.package,
                &self.path,
                PluginSystemErrorSource::Other(format!("{} is outside this package", location)),
            ));
        }
        let mut file = self
            .archive
            .by_name(location.entry())
            .map_err(|e| loading_error(&self.package, &self.path, e.into()))?;
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)
            .map_err(|e| loading_error(&self.package, &self.path, e.into()))?;
        Ok(data)
    }

    pub fn read_to_string(&mut self, location: &ResourceLocation) -> Result<String, PluginSystemError> {
        let data = self.read_resource(location)?;
        String::from_utf8(data).map_err(|e| {
            loading_error(
                &self.package,
                &self.path,
                PluginSystemErrorSource::Other(format!("{} is not valid UTF-8: {}", location, e)),
            )
        })
    }

    /// Copy an archive entry into this context's private directory and return the file path.
    pub fn extract(&mut self, entry: &str) -> Result<PathBuf, PluginSystemError> {
        let location = self.find_resource(entry).ok_or_else(|| {
            loading_error(
                &self.package,
                &self.path,
                PluginSystemErrorSource::Other(format!("no entry '{}' in archive", entry)),
            )
        })?;
        let data = self.read_resource(&location)?;
        let file_name = Path::new(location.entry())
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| {
                loading_error(
                    &self.package,
                    &self.path,
                    PluginSystemErrorSource::Other(format!("entry '{}' is not a file", entry)),
                )
            })?;
        let target = self.extraction_dir()?.join(file_name);
        std::fs::write(&target, data).map_err(|e| loading_error(&self.package, &self.path, e.into()))?;
        log::debug!("Extracted {} to {}", location, target.display());
        Ok(target)
    }

    fn extraction_dir(&mut self) -> Result<&Path, PluginSystemError> {
        if self.extraction_dir.is_none() {
            let mut builder = tempfile::Builder::new();
            builder.prefix("hearth-");
            let dir = match &self.extraction_root {
                Some(root) => {
                    std::fs::create_dir_all(root).map_err(|e| loading_error(&self.package, &self.path, e.into()))?;
                    builder.tempdir_in(root)
                }
                None => builder.tempdir(),
            }
            .map_err(|e| loading_error(&self.package, &self.path, e.into()))?;
            self.extraction_dir = Some(dir);
        }
        match &self.extraction_dir {
            Some(dir) => Ok(dir.path()),
            None => Err(PluginSystemError::InternalError("extraction directory missing".to_string())),
        }
    }
}

fn loading_error(package: &str, path: &Path, source: PluginSystemErrorSource) -> PluginSystemError {
    PluginSystemError::LoadingError {
        plugin_id: package.to_string(),
        path: Some(path.to_path_buf()),
        source: Box::new(source),
    }
}
