//! Arguments and responses of the CRS and geodesy tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{catalog::CrsEntry, projection::CrsDescription};

fn default_ellps() -> String {
    "WGS84".to_string()
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TransformCoordinatesRequest {
    /// [x, y]; geographic CRSs take [lon, lat].
    pub coordinates: Vec<f64>,
    pub source_crs: String,
    pub target_crs: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ProjectGeometryRequest {
    /// Geometry as WKT.
    pub geometry: String,
    pub source_crs: String,
    pub target_crs: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CrsRequest {
    /// Authority code such as "EPSG:4326", a PROJ string or WKT.
    pub crs: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GeodInfoRequest {
    #[serde(default = "default_ellps")]
    pub ellps: String,
    /// Semi-major axis for a custom ellipsoid.
    #[serde(default)]
    pub a: Option<f64>,
    #[serde(default)]
    pub b: Option<f64>,
    #[serde(default)]
    pub f: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GeodeticDistanceRequest {
    /// [lon, lat]
    pub point1: Vec<f64>,
    /// [lon, lat]
    pub point2: Vec<f64>,
    #[serde(default = "default_ellps")]
    pub ellps: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GeodeticPointRequest {
    /// [lon, lat]
    pub start_point: Vec<f64>,
    /// Degrees clockwise from north.
    pub azimuth: f64,
    /// Metres.
    pub distance: f64,
    #[serde(default = "default_ellps")]
    pub ellps: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GeodeticAreaRequest {
    /// Polygon WKT in lon/lat.
    pub geometry: String,
    #[serde(default = "default_ellps")]
    pub ellps: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LonLatRequest {
    /// [lon, lat]
    pub coordinates: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TransformCoordinatesResponse {
    pub status: String,
    pub coordinates: [f64; 2],
    pub source_crs: String,
    pub target_crs: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ProjectGeometryResponse {
    pub status: String,
    pub geometry: String,
    pub source_crs: String,
    pub target_crs: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CrsInfoResponse {
    pub status: String,
    #[serde(flatten)]
    pub info: CrsDescription,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct AvailableCrsResponse {
    pub status: String,
    pub crs_list: Vec<CrsEntry>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GeodInfoResponse {
    pub status: String,
    pub ellps: String,
    pub a: f64,
    pub b: f64,
    pub f: f64,
    pub es: f64,
    pub e: f64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GeodeticDistanceResponse {
    pub status: String,
    pub distance: f64,
    pub forward_azimuth: f64,
    pub back_azimuth: f64,
    pub unit: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GeodeticPointResponse {
    pub status: String,
    /// [lon, lat]
    pub point: [f64; 2],
    pub back_azimuth: f64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GeodeticAreaResponse {
    pub status: String,
    pub area: f64,
    pub unit: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct UtmZoneResponse {
    pub status: String,
    pub zone: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CrsCodeResponse {
    pub status: String,
    pub crs: String,
    pub message: String,
}
