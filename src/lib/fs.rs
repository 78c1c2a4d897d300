//! Small file helpers for tool outputs.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};

use crate::lib::errors::GisError;

/// List files in `dir` whose extension matches one of `extensions`, sorted by name.
pub fn list_files_with_extensions(
    dir: &Path,
    extensions: &[&str],
) -> Result<Vec<PathBuf>, GisError> {
    let entries = fs::read_dir(dir).map_err(|err| GisError::io(dir, err))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| GisError::io(dir, err))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.iter().any(|want| ext.eq_ignore_ascii_case(want)))
            .unwrap_or(false);
        if matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Default output stem such as `output_20250101_120000`.
pub fn timestamped_stem(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{prefix}_{}", now.format("%Y%m%d_%H%M%S"))
}

/// Write UTF-8 text, mapping failures to `GisError::Io`.
pub fn write_text(path: &Path, contents: &str) -> Result<(), GisError> {
    fs::write(path, contents.as_bytes()).map_err(|err| GisError::io(path, err))
}

/// Read UTF-8 text, mapping failures to `GisError::Io`.
pub fn read_text(path: &Path) -> Result<String, GisError> {
    fs::read_to_string(path).map_err(|err| GisError::io(path, err))
}

/// Replace the extension of `path`, keeping the stem.
pub fn with_extension(path: &Path, extension: &str) -> PathBuf {
    let mut out = path.to_path_buf();
    out.set_extension(extension);
    out
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn listing_is_sorted_and_filtered() {
        let dir = tempdir().expect("can create temporary directory");
        for name in ["b.tif", "a.TIF", "c.txt"] {
            fs::write(dir.path().join(name), b"x").expect("can write file");
        }
        fs::create_dir(dir.path().join("d.tif")).expect("can create directory");

        let files = list_files_with_extensions(dir.path(), &["tif", "tiff"]).expect("lists");
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["a.TIF", "b.tif"]);
    }

    #[test]
    fn timestamped_stem_uses_compact_utc_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).single().expect("valid time");
        assert_eq!(timestamped_stem("output", now), "output_20240309_070501");
    }
}
