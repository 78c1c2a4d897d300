//! Arguments and responses of the feature-table tools.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_overlay_how() -> String {
    "intersection".to_string()
}

fn default_inner() -> String {
    "inner".to_string()
}

fn default_left() -> String {
    "left".to_string()
}

fn default_predicate() -> String {
    "intersects".to_string()
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReadFileRequest {
    /// Shapefile (.shp) or GeoJSON (.geojson / .json).
    pub file_path: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CombineFilesRequest {
    pub shapefile1_path: String,
    pub shapefile2_path: String,
    pub output_path: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct OverlayLayersRequest {
    pub gdf1_path: String,
    pub gdf2_path: String,
    /// intersection, union, identity, symmetric_difference or difference.
    #[serde(default = "default_overlay_how")]
    pub how: String,
    #[serde(default)]
    pub output_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DissolveRequest {
    pub gdf_path: String,
    /// Column to group by; all features are merged when omitted.
    #[serde(default)]
    pub by: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExplodeRequest {
    pub gdf_path: String,
    #[serde(default)]
    pub output_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ClipVectorRequest {
    pub gdf_path: String,
    pub clip_path: String,
    #[serde(default)]
    pub output_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SpatialJoinRequest {
    pub left_path: String,
    pub right_path: String,
    /// inner, left or right.
    #[serde(default = "default_inner")]
    pub how: String,
    /// intersects, within, contains, touches, crosses, overlaps, covers or covered_by.
    #[serde(default = "default_predicate")]
    pub predicate: String,
    #[serde(default)]
    pub output_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct NearestJoinRequest {
    pub left_path: String,
    pub right_path: String,
    #[serde(default = "default_left")]
    pub how: String,
    /// Matches further than this, in layer units, are dropped.
    #[serde(default)]
    pub max_distance: Option<f64>,
    #[serde(default)]
    pub output_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PointInPolygonRequest {
    pub points_path: String,
    pub polygons_path: String,
    #[serde(default)]
    pub output_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WriteFileRequest {
    pub gdf_path: String,
    pub output_path: String,
    /// "ESRI Shapefile" or "GeoJSON"; inferred from the extension when omitted.
    #[serde(default)]
    pub driver: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ReadFileResponse {
    pub status: String,
    pub columns: Vec<String>,
    pub column_types: BTreeMap<String, String>,
    pub num_rows: usize,
    pub num_columns: usize,
    pub crs: String,
    /// [minx, miny, maxx, maxy]
    pub bounds: Option<[f64; 4]>,
    pub preview: Vec<Value>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CombineInfo {
    pub output_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_type: Option<String>,
    pub num_features: usize,
    pub crs: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CombineFilesResponse {
    pub status: String,
    pub message: String,
    pub info: CombineInfo,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct LayerResponse {
    pub status: String,
    pub message: String,
    pub num_features: usize,
    pub crs: String,
    pub columns: Vec<String>,
    pub preview: Vec<Value>,
    pub output_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct WriteFileResponse {
    pub status: String,
    pub message: String,
    pub output_path: String,
    pub crs: String,
    pub num_features: usize,
    pub columns: Vec<String>,
}
