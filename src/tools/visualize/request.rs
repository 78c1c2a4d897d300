//! Arguments and responses of the map tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_true() -> bool {
    true
}

fn default_map_filename() -> String {
    "map".to_string()
}

fn default_filetype() -> String {
    "png".to_string()
}

fn default_web_filename() -> String {
    "map.html".to_string()
}

fn default_web_title() -> Option<String> {
    Some("My Map".to_string())
}

fn default_output_dir() -> String {
    "outputs".to_string()
}

fn default_basemap() -> String {
    "OpenStreetMap".to_string()
}

/// How one layer is drawn.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct LayerStyle {
    /// Legend entry for the layer.
    #[serde(default)]
    pub label: Option<String>,
    /// Named color (`blue`, `darkgreen`, ...) or `#rrggbb`.
    #[serde(default)]
    pub color: Option<String>,
    /// Attribute that colors each feature: numeric columns get a ramp, others one color per value.
    #[serde(default)]
    pub column: Option<String>,
    /// Palette for `column`: tab10, tab20, viridis, greys.
    #[serde(default)]
    pub cmap: Option<String>,
    /// Fill opacity in `[0, 1]`.
    #[serde(default)]
    pub alpha: Option<f64>,
    /// Outline and line width in pixels.
    #[serde(default)]
    pub linewidth: Option<f64>,
    /// Point radius in pixels.
    #[serde(default)]
    pub markersize: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MapLayer {
    /// A .shp/.geojson path, a .tif path (static maps only), a WKT string, or a
    /// list of `[x, y]` pairs (one pair is a point, two a line, more a polygon).
    pub data: Value,
    #[serde(default)]
    pub style: LayerStyle,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateMapRequest {
    pub layers: Vec<MapLayer>,
    /// Output name without extension.
    #[serde(default = "default_map_filename")]
    pub filename: String,
    /// png, jpg, bmp or svg.
    #[serde(default = "default_filetype")]
    pub filetype: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_true")]
    pub show_grid: bool,
    #[serde(default = "default_true")]
    pub add_legend: bool,
    /// Relative folders resolve under the storage root.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateWebMapRequest {
    pub layers: Vec<MapLayer>,
    /// HTML file name; `.html` is added when missing.
    #[serde(default = "default_web_filename")]
    pub filename: String,
    #[serde(default = "default_web_title")]
    pub title: Option<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Click-to-show coordinates and a scale bar.
    #[serde(default = "default_true")]
    pub show_grid: bool,
    #[serde(default = "default_true")]
    pub add_legend: bool,
    /// OpenStreetMap, CartoDB positron, CartoDB dark_matter, OpenTopoMap, or an
    /// `{z}/{x}/{y}` tile URL template.
    #[serde(default = "default_basemap")]
    pub basemap: String,
    #[serde(default = "default_true")]
    pub add_minimap: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct MapResponse {
    pub status: String,
    pub message: String,
    pub output_path: String,
    pub layer_count: usize,
}
