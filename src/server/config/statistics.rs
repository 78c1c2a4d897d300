use std::path::Path;

use serde::Deserialize;

use crate::lib::errors::ConfigError;

pub const DEFAULT_PERMUTATIONS: u32 = 999;
pub const MAX_PERMUTATIONS: u32 = 99_999;
/// Metres per degree used when a distance threshold meets EPSG:4326.
pub const DEFAULT_METERS_PER_DEGREE: f64 = 111_000.0;

/// Settings for permutation inference in the spatial statistics tools.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsSection {
    pub permutations: u32,
    pub seed: Option<u64>,
    pub meters_per_degree: f64,
}

impl Default for StatisticsSection {
    fn default() -> Self {
        Self {
            permutations: DEFAULT_PERMUTATIONS,
            seed: None,
            meters_per_degree: DEFAULT_METERS_PER_DEGREE,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RawStatisticsSection {
    pub permutations: Option<u32>,
    pub seed: Option<u64>,
    pub meters_per_degree: Option<f64>,
}

pub fn parse_statistics_section(
    raw: Option<RawStatisticsSection>,
    path: &Path,
) -> Result<StatisticsSection, ConfigError> {
    let raw = raw.unwrap_or_default();
    let permutations = raw.permutations.unwrap_or(DEFAULT_PERMUTATIONS);
    if permutations > MAX_PERMUTATIONS {
        return Err(ConfigError::InvalidField {
            path: path.to_path_buf(),
            field: "statistics.permutations",
            message: format!("Use at most {MAX_PERMUTATIONS} permutations"),
        });
    }
    let meters_per_degree = raw.meters_per_degree.unwrap_or(DEFAULT_METERS_PER_DEGREE);
    if !(meters_per_degree.is_finite() && meters_per_degree > 0.0) {
        return Err(ConfigError::InvalidField {
            path: path.to_path_buf(),
            field: "statistics.meters_per_degree",
            message: "Must be a positive number".into(),
        });
    }
    Ok(StatisticsSection {
        permutations,
        seed: raw.seed,
        meters_per_degree,
    })
}
