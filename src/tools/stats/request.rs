//! Arguments and responses of the spatial statistics tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::lib::paths::clean_arg;

fn default_dependent_var() -> String {
    "LAND_USE".to_string()
}

fn default_target_crs() -> String {
    "EPSG:4326".to_string()
}

fn default_distance_threshold() -> f64 {
    100_000.0
}

fn default_eps() -> f64 {
    0.1
}

fn default_min_samples() -> usize {
    5
}

fn default_queen() -> String {
    "queen".to_string()
}

fn default_true() -> bool {
    true
}

fn default_row_transform() -> String {
    "r".to_string()
}

fn default_weights_output() -> String {
    "weights.gal".to_string()
}

fn default_gal() -> String {
    "gal".to_string()
}

fn default_markov_classes() -> usize {
    5
}

fn default_rose_sectors() -> usize {
    8
}

fn default_rose_permutations() -> u32 {
    99
}

fn default_two_sided() -> String {
    "two.sided".to_string()
}

fn default_w_lags() -> usize {
    1
}

/// Column names as a comma-separated string or a list.
#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ColumnList {
    Joined(String),
    List(Vec<String>),
}

impl ColumnList {
    pub fn names(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            Self::Joined(joined) => joined.split(',').collect(),
            Self::List(list) => list.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(clean_arg)
            .filter(|name| !name.is_empty())
            .collect()
    }
}

/// Shared arguments of the distance-band ESDA statistics.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct EsdaRequest {
    pub shapefile_path: String,
    #[serde(default = "default_dependent_var")]
    pub dependent_var: String,
    #[serde(default = "default_target_crs")]
    pub target_crs: String,
    /// Metres; divided into degrees when the target CRS is EPSG:4326.
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f64,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AdbscanRequest {
    pub shapefile_path: String,
    /// Carried into the preview when given; clustering uses coordinates only.
    #[serde(default)]
    pub dependent_var: Option<String>,
    #[serde(default = "default_target_crs")]
    pub target_crs: String,
    #[serde(default = "default_eps")]
    pub eps: f64,
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ContiguityWeightsRequest {
    pub shapefile_path: String,
    /// `queen` or `rook`.
    #[serde(default = "default_queen")]
    pub contiguity: String,
    #[serde(default)]
    pub id_field: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DistanceBandWeightsRequest {
    pub data_path: String,
    /// In layer units.
    pub threshold: f64,
    /// Binary links, otherwise inverse distance.
    #[serde(default = "default_true")]
    pub binary: bool,
    #[serde(default)]
    pub id_field: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct KnnWeightsRequest {
    pub data_path: String,
    pub k: usize,
    #[serde(default)]
    pub id_field: Option<String>,
}

/// How to build a weights object from a layer.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WeightsMethodArgs {
    pub data_path: String,
    /// `queen`, `rook`, `distance_band` or `knn`.
    #[serde(default = "default_queen")]
    pub method: String,
    #[serde(default)]
    pub id_field: Option<String>,
    /// Required by `distance_band`.
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Required by `knn`.
    #[serde(default)]
    pub k: Option<usize>,
    #[serde(default = "default_true")]
    pub binary: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BuildWeightsRequest {
    #[serde(flatten)]
    pub weights: WeightsMethodArgs,
    /// `r`, `v`, `b`, `o` or `d`.
    #[serde(default = "default_row_transform")]
    pub transform_type: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SaveWeightsRequest {
    #[serde(flatten)]
    pub weights: WeightsMethodArgs,
    #[serde(default)]
    pub transform_type: Option<String>,
    /// The format extension is appended when missing.
    #[serde(default = "default_weights_output")]
    pub output_path: String,
    /// `gal` or `gwt`.
    #[serde(default = "default_gal")]
    pub format: String,
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct OlsRequest {
    pub data_path: String,
    pub y_field: String,
    pub x_fields: ColumnList,
    /// Existing `.gal` or `.gwt` file; otherwise weights are built with `weights_method`.
    #[serde(default)]
    pub weights_path: Option<String>,
    #[serde(default = "default_queen")]
    pub weights_method: String,
    #[serde(default)]
    pub id_field: Option<String>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub k: Option<usize>,
    #[serde(default = "default_true")]
    pub binary: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SpatialMarkovRequest {
    pub shapefile_path: String,
    /// Time-ordered columns, oldest first.
    pub value_columns: ColumnList,
    #[serde(default = "default_target_crs")]
    pub target_crs: String,
    /// `queen`, `rook` or `distance`.
    #[serde(default = "default_queen")]
    pub weights_method: String,
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f64,
    #[serde(default = "default_markov_classes")]
    pub k: usize,
    #[serde(default = "default_markov_classes")]
    pub m: usize,
    /// Pool quantiles across all periods.
    #[serde(default = "default_true")]
    pub fixed: bool,
    #[serde(default)]
    pub permutations: u32,
    /// Divide each period by its mean.
    #[serde(default = "default_true")]
    pub relative: bool,
    #[serde(default = "default_true")]
    pub drop_na: bool,
    /// Empty classes become self-absorbing.
    #[serde(default = "default_true")]
    pub fill_empty_classes: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DynamicLisaRequest {
    pub shapefile_path: String,
    /// Exactly two columns: start and end period.
    pub value_columns: ColumnList,
    #[serde(default = "default_target_crs")]
    pub target_crs: String,
    #[serde(default = "default_queen")]
    pub weights_method: String,
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f64,
    #[serde(default = "default_rose_sectors")]
    pub k: usize,
    #[serde(default = "default_rose_permutations")]
    pub permutations: u32,
    /// `two.sided`, `positive` or `negative`.
    #[serde(default = "default_two_sided")]
    pub alternative: String,
    #[serde(default = "default_true")]
    pub relative: bool,
    #[serde(default = "default_true")]
    pub drop_na: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GmLagRequest {
    pub shapefile_path: String,
    pub y_col: String,
    /// Exogenous regressors, without the constant.
    pub x_cols: ColumnList,
    #[serde(default = "default_target_crs")]
    pub target_crs: String,
    #[serde(default = "default_queen")]
    pub weights_method: String,
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f64,
    /// Orders of spatial lags used as instruments.
    #[serde(default = "default_w_lags")]
    pub w_lags: usize,
    #[serde(default = "default_true")]
    pub lag_q: bool,
    #[serde(default)]
    pub yend_cols: Option<ColumnList>,
    #[serde(default)]
    pub q_cols: Option<ColumnList>,
    /// `none` or `white`.
    #[serde(default)]
    pub robust: Option<String>,
    #[serde(default = "default_true")]
    pub spat_diag: bool,
    #[serde(default)]
    pub sig2n_k: bool,
    #[serde(default = "default_true")]
    pub drop_na: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct StatsResponse {
    pub status: String,
    pub message: String,
    pub result: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct WeightsResponse {
    pub status: String,
    pub message: String,
    pub result: Map<String, Value>,
    /// Same content as `result`.
    pub weights_info: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RegressionResponse {
    pub status: String,
    pub message: String,
    pub result: Map<String, Value>,
    /// Same content as `result`.
    pub regression_results: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn column_lists_accept_strings_and_arrays() {
        let joined: ColumnList =
            serde_json::from_value(json!("pop_2000, `pop_2010`,,")).expect("joined");
        assert_eq!(joined.names(), vec!["pop_2000", "pop_2010"]);
        let list: ColumnList = serde_json::from_value(json!(["a", " b "])).expect("list");
        assert_eq!(list.names(), vec!["a", "b"]);
    }

    #[test]
    fn esda_defaults_match_the_tool_contract() {
        let request: EsdaRequest =
            serde_json::from_value(json!({"shapefile_path": "x.shp"})).expect("request");
        assert_eq!(request.dependent_var, "LAND_USE");
        assert_eq!(request.target_crs, "EPSG:4326");
        assert_eq!(request.distance_threshold, 100_000.0);
    }

    #[test]
    fn flattened_weights_arguments() {
        let request: SaveWeightsRequest = serde_json::from_value(json!({
            "data_path": "pts.shp",
            "method": "knn",
            "k": 3
        }))
        .expect("request");
        assert_eq!(request.weights.k, Some(3));
        assert!(request.weights.binary);
        assert_eq!(request.output_path, "weights.gal");
        assert!(request.transform_type.is_none());
    }
}
