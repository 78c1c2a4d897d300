use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::lib::errors::ConfigError;

pub const DEFAULT_STORAGE_ROOT: &str = "outputs";

/// Where tools write their outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSection {
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Default)]
pub struct RawStorageSection {
    pub root: Option<PathBuf>,
}

/// Parse `[storage]`, anchoring a relative root at `cwd`.
pub fn parse_storage_section(
    raw: Option<RawStorageSection>,
    env_override: Option<String>,
    cwd: &Path,
    path: &Path,
) -> Result<StorageSection, ConfigError> {
    let root = env_override
        .filter(|value| !value.trim().is_empty())
        .map(|value| PathBuf::from(value.trim()))
        .or(raw.unwrap_or_default().root)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_ROOT));

    if root.as_os_str().is_empty() {
        return Err(ConfigError::InvalidField {
            path: path.to_path_buf(),
            field: "storage.root",
            message: "Storage root must not be empty".into(),
        });
    }

    let root = if root.is_absolute() {
        root
    } else {
        cwd.join(root)
    };
    Ok(StorageSection { root })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_root_is_anchored_at_cwd() {
        let section = parse_storage_section(
            Some(RawStorageSection {
                root: Some(PathBuf::from("results")),
            }),
            None,
            Path::new("/srv/gis"),
            Path::new("config.toml"),
        )
        .expect("parses");
        assert_eq!(section.root, PathBuf::from("/srv/gis/results"));
    }

    #[test]
    fn env_override_wins_over_file_value() {
        let section = parse_storage_section(
            Some(RawStorageSection {
                root: Some(PathBuf::from("results")),
            }),
            Some("/data/out".into()),
            Path::new("/srv/gis"),
            Path::new("config.toml"),
        )
        .expect("parses");
        assert_eq!(section.root, PathBuf::from("/data/out"));
    }
}
