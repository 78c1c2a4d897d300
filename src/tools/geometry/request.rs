//! Arguments and responses of the geometry tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single WKT argument.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GeometryRequest {
    /// Geometry as WKT.
    pub geometry: String,
}

/// Two WKT arguments for overlays.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GeometryPairRequest {
    pub geometry1: String,
    pub geometry2: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BufferRequest {
    pub geometry: String,
    /// Buffer distance in the geometry's units; negative shrinks polygons.
    pub distance: f64,
    /// Segments per quarter circle.
    #[serde(default = "default_resolution")]
    pub resolution: u32,
    /// 1 round, 2 mitre, 3 bevel.
    #[serde(default = "default_join_style")]
    pub join_style: u8,
    #[serde(default = "default_mitre_limit")]
    pub mitre_limit: f64,
    #[serde(default)]
    pub single_sided: bool,
}

fn default_resolution() -> u32 {
    16
}

fn default_join_style() -> u8 {
    1
}

fn default_mitre_limit() -> f64 {
    5.0
}

fn default_origin() -> String {
    "center".to_string()
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RotateRequest {
    pub geometry: String,
    /// Counter-clockwise angle.
    pub angle: f64,
    /// "center", "centroid" or "x,y".
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default)]
    pub use_radians: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ScaleRequest {
    pub geometry: String,
    pub xfact: f64,
    pub yfact: f64,
    #[serde(default = "default_origin")]
    pub origin: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TranslateRequest {
    pub geometry: String,
    pub xoff: f64,
    pub yoff: f64,
    /// Accepted for compatibility; geometries are two-dimensional.
    #[serde(default)]
    pub zoff: f64,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UnaryUnionRequest {
    /// Geometries as WKT.
    pub geometries: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SimplifyRequest {
    pub geometry: String,
    pub tolerance: f64,
    #[serde(default = "default_true")]
    pub preserve_topology: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SnapRequest {
    pub geometry1: String,
    pub geometry2: String,
    pub tolerance: f64,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GeoJsonRequest {
    /// GeoJSON geometry or feature, as an object or a JSON string.
    pub geojson: Value,
}

/// Result carrying one WKT geometry.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GeometryResponse {
    pub status: String,
    pub geometry: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GeometriesResponse {
    pub status: String,
    pub geometries: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct BoundsResponse {
    pub status: String,
    /// [minx, miny, maxx, maxy]
    pub bounds: [f64; 4],
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CoordinatesResponse {
    pub status: String,
    pub coordinates: Vec<[f64; 2]>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GeometryTypeResponse {
    pub status: String,
    #[serde(rename = "type")]
    pub geometry_type: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct LengthResponse {
    pub status: String,
    pub length: f64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct AreaResponse {
    pub status: String,
    pub area: f64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ValidityResponse {
    pub status: String,
    pub is_valid: bool,
    pub reason: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct NearestPointResponse {
    pub status: String,
    pub nearest_point: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GeoJsonResponse {
    pub status: String,
    pub geojson: Value,
    pub message: String,
}
