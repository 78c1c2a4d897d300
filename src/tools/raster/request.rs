//! Arguments and responses of the raster tools.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_bins() -> usize {
    256
}

fn default_band_index() -> usize {
    1
}

fn default_nearest() -> String {
    "nearest".to_string()
}

fn default_focal_size() -> usize {
    3
}

fn default_azimuth() -> f64 {
    315.0
}

fn default_altitude() -> f64 {
    45.0
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RasterPathRequest {
    /// Local path or http(s) URL.
    pub path_or_url: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RasterSourceRequest {
    pub source: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExtractBandRequest {
    pub source: String,
    /// 1-based band index.
    pub band_index: usize,
    pub destination: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct HistogramRequest {
    pub source: String,
    #[serde(default = "default_bins")]
    pub bins: usize,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TileRasterRequest {
    pub source: String,
    /// Tile edge in pixels.
    pub tile_size: usize,
    pub destination_dir: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct NdviRequest {
    pub source: String,
    pub red_band_index: usize,
    pub nir_band_index: usize,
    pub destination: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RasterAlgebraRequest {
    pub raster1: String,
    pub raster2: String,
    #[serde(default = "default_band_index")]
    pub band_index: usize,
    /// add or subtract.
    pub operation: String,
    pub destination: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ConcatBandsRequest {
    /// Folder with single-band `.tif` files, stacked in name order.
    pub folder_path: String,
    pub destination: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WeightedBandSumRequest {
    pub source: String,
    /// One weight per band; the weights must sum to 1.
    pub weights: Vec<f64>,
    pub destination: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ResampleRasterRequest {
    pub source: String,
    /// Multiplier for width and height, e.g. 0.5 halves the resolution.
    pub scale_factor: f64,
    /// nearest or bilinear.
    #[serde(default = "default_nearest")]
    pub resampling: String,
    pub destination: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReprojectRasterRequest {
    pub source: String,
    pub target_crs: String,
    pub destination: String,
    #[serde(default = "default_nearest")]
    pub resampling: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ClipRasterRequest {
    pub raster_path_or_url: String,
    pub shapefile_path: String,
    pub destination: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ZonalStatisticsRequest {
    pub raster_path: String,
    pub vector_path: String,
    /// Any of mean, min, max, std, count, sum, median. Defaults to mean, min, max, std.
    #[serde(default)]
    pub stats: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReclassifyRasterRequest {
    pub raster_path: String,
    /// Old value to new value, e.g. `{"1": 10, "2": 20}`.
    pub reclass_map: BTreeMap<String, f64>,
    pub output_path: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FocalStatisticsRequest {
    pub raster_path: String,
    /// mean, min, max, std or median.
    pub statistic: String,
    #[serde(default = "default_focal_size")]
    pub size: usize,
    #[serde(default)]
    pub output_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct HillshadeRequest {
    pub raster_path: String,
    #[serde(default = "default_azimuth")]
    pub azimuth: f64,
    #[serde(default = "default_altitude")]
    pub angle_altitude: f64,
    #[serde(default)]
    pub output_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WriteRasterRequest {
    /// 2D `[row][col]` or 3D `[band][row][col]` array matching the reference grid.
    pub array: Value,
    pub reference_raster: String,
    pub output_path: String,
    /// Output type; float32 when omitted.
    #[serde(default)]
    pub dtype: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema, PartialEq)]
pub struct RasterBounds {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RasterMetadata {
    pub name: String,
    pub driver: String,
    pub width: usize,
    pub height: usize,
    pub count: usize,
    pub bounds: RasterBounds,
    /// Band number to type name.
    pub band_dtypes: BTreeMap<usize, String>,
    pub no_data: Vec<Option<f64>>,
    pub crs: Option<String>,
    /// Affine coefficients `a, b, c, d, e, f`.
    pub transform: [f64; 6],
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct MetadataResponse {
    pub status: String,
    pub metadata: RasterMetadata,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RasterCrs {
    pub wkt: String,
    /// PROJ.4 parameters, flags map to `true`.
    pub proj4: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RasterCrsResponse {
    pub status: String,
    pub crs: RasterCrs,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DestinationResponse {
    pub status: String,
    pub destination: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema, PartialEq)]
pub struct BandStatistics {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct BandStatisticsResponse {
    pub status: String,
    pub statistics: BTreeMap<String, BandStatistics>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct BandHistogram {
    pub histogram: Vec<u64>,
    pub bin_edges: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct HistogramResponse {
    pub status: String,
    pub histograms: BTreeMap<String, BandHistogram>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TileRasterResponse {
    pub status: String,
    pub tiles_created: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ZonalStatisticsResponse {
    pub status: String,
    pub message: String,
    /// One object per feature: `index` plus each requested statistic.
    pub results: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RasterOutputResponse {
    pub status: String,
    pub message: String,
    pub output_path: Option<String>,
}
