use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// List the regular files directly inside `dir` whose extension matches
/// `extension` (case-insensitive), sorted by file name. Subdirectories are
/// not descended into.
pub fn list_files_with_extension<P: AsRef<Path>>(dir: P, extension: &str) -> io::Result<Vec<PathBuf>> {
    let extension_lower = extension.trim_start_matches('.').to_lowercase();
    let mut result = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let entry_path = entry.path();
        if !entry_path.is_file() {
            continue;
        }
        let matches = match entry_path.extension() {
            Some(ext) => ext.to_string_lossy().to_lowercase() == extension_lower,
            None => false,
        };
        if matches {
            result.push(entry_path);
        }
    }

    result.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(result)
}

/// File name up to its first `.`, e.g. `Core.v2.hpk` -> `Core`
pub fn package_stem(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let stem = match file_name.find('.') {
        Some(idx) => &file_name[..idx],
        None => file_name,
    };
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}
