//! Path normalization shared by every tool that touches the filesystem.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::lib::errors::GisError;

const HOME_ENV: &str = "HOME";

/// Strip stray backticks and surrounding whitespace that LLM callers often add.
pub fn clean_arg(raw: &str) -> String {
    raw.replace('`', "").trim().to_string()
}

/// Clean a user-supplied path and expand a leading `~`.
pub fn clean_path(raw: &str) -> PathBuf {
    let cleaned = clean_arg(raw);
    expand_home(&cleaned, env::var_os(HOME_ENV).map(PathBuf::from))
}

fn expand_home(cleaned: &str, home: Option<PathBuf>) -> PathBuf {
    match (cleaned.strip_prefix('~'), home) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            home.join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(cleaned),
    }
}

/// True for inputs GDAL should read over HTTP.
pub fn is_remote(raw: &str) -> bool {
    let cleaned = clean_arg(raw);
    cleaned.starts_with("http://") || cleaned.starts_with("https://")
}

/// Clean an input path and make sure it exists.
pub fn existing_input(raw: &str) -> Result<PathBuf, GisError> {
    let path = clean_path(raw);
    if path.exists() {
        Ok(path)
    } else {
        Err(GisError::FileNotFound { path })
    }
}

/// Resolve an output path under `root` when relative and create its parent directories.
pub fn resolve_output_path(root: &Path, raw: &str) -> Result<PathBuf, GisError> {
    let cleaned = clean_path(raw);
    if cleaned.as_os_str().is_empty() {
        return Err(GisError::invalid_input("output path must not be empty"));
    }
    let resolved = if cleaned.is_absolute() {
        cleaned
    } else {
        root.join(cleaned)
    };
    if let Some(parent) = resolved.parent() {
        fs::create_dir_all(parent).map_err(|err| GisError::io(parent, err))?;
    }
    Ok(resolved)
}

/// Resolve a directory under `root` when relative and create it.
pub fn resolve_output_dir(root: &Path, raw: &str) -> Result<PathBuf, GisError> {
    let cleaned = clean_path(raw);
    let resolved = if cleaned.is_absolute() {
        cleaned
    } else {
        root.join(cleaned)
    };
    fs::create_dir_all(&resolved).map_err(|err| GisError::io(&resolved, err))?;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn backticks_are_stripped() {
        assert_eq!(clean_arg("  `data/roads.shp` "), "data/roads.shp");
    }

    #[test]
    fn tilde_expands_against_home() {
        let expanded = expand_home("~/maps/a.tif", Some(PathBuf::from("/home/gis")));
        assert_eq!(expanded, PathBuf::from("/home/gis/maps/a.tif"));
        let untouched = expand_home("~other/a.tif", Some(PathBuf::from("/home/gis")));
        assert_eq!(untouched, PathBuf::from("~other/a.tif"));
    }

    #[test]
    fn relative_outputs_land_under_root_with_parents_created() {
        let root = tempdir().expect("can create temporary directory");
        let resolved =
            resolve_output_path(root.path(), "nested/dir/out.tif").expect("resolves output");
        assert_eq!(resolved, root.path().join("nested/dir/out.tif"));
        assert!(root.path().join("nested/dir").is_dir());
    }

    #[test]
    fn missing_input_is_reported() {
        let err = existing_input("/definitely/not/here.shp").expect_err("missing input");
        assert!(matches!(err, GisError::FileNotFound { .. }));
    }

    #[test]
    fn urls_are_detected() {
        assert!(is_remote("https://example.com/dem.tif"));
        assert!(!is_remote("/data/dem.tif"));
    }
}
