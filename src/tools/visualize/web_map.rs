//! `create_web_map`: a standalone Leaflet page with the layers embedded as GeoJSON.

use std::path::Path;

use geojson::feature::Id;
use serde::Serialize;
use serde_json::{json, Value};
use tera::{Context, Tera};

use super::{
    load_layer, output_file,
    request::{CreateWebMapRequest, MapLayer, MapResponse},
    style::{column_colors, layer_color, parse_color},
    LayerData,
};
use crate::{
    lib::{errors::GisError, fs},
    tools::{
        vector::{json::to_collection, FeatureTable},
        SUCCESS,
    },
};

const WEB_CRS: &str = "EPSG:4326";
const OSM_ATTRIBUTION: &str = "&copy; OpenStreetMap contributors";

const TEMPLATE_NAME: &str = "web_map.html";
const TEMPLATE: &str = include_str!("web_map.html.tera");

const MINIMAP_CDN: &str = "https://cdnjs.cloudflare.com/ajax/libs/leaflet-minimap/3.6.1";

/// Tile URL template and attribution for a named basemap or a custom template.
fn basemap(raw: &str) -> Result<(String, String), GisError> {
    let raw = raw.trim();
    if raw.contains("{z}") {
        return Ok((raw.to_string(), String::new()));
    }
    let key: String = raw
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();
    let (url, attribution) = match key.as_str() {
        "openstreetmap" | "osm" => (
            "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
            OSM_ATTRIBUTION.to_string(),
        ),
        "cartodbpositron" => (
            "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png",
            format!("{OSM_ATTRIBUTION} &copy; CARTO"),
        ),
        "cartodbdarkmatter" => (
            "https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png",
            format!("{OSM_ATTRIBUTION} &copy; CARTO"),
        ),
        "opentopomap" => (
            "https://{s}.tile.opentopomap.org/{z}/{x}/{y}.png",
            format!("{OSM_ATTRIBUTION}, SRTM | &copy; OpenTopoMap (CC-BY-SA)"),
        ),
        _ => {
            return Err(GisError::invalid_input(format!(
                "unknown basemap '{raw}'; use OpenStreetMap, CartoDB positron, \
                 CartoDB dark_matter, OpenTopoMap or a {{z}}/{{x}}/{{y}} URL template"
            )))
        }
    };
    Ok((url.to_string(), attribution))
}

fn geographic(table: FeatureTable) -> Result<FeatureTable, GisError> {
    match &table.crs {
        Some(crs) if crs != WEB_CRS => table.to_crs(WEB_CRS),
        _ => Ok(table),
    }
}

/// Embedded layer settings plus the legend rows it contributes.
fn web_layer(
    table: &FeatureTable,
    layer: &MapLayer,
    index: usize,
) -> Result<(Value, Vec<LegendRow>), GisError> {
    let style = &layer.style;
    let name = style
        .label
        .clone()
        .unwrap_or_else(|| format!("Layer {}", index + 1));
    let base = match &style.color {
        Some(color) => parse_color(color)?,
        None => layer_color(index),
    };

    let mut collection = to_collection(table);
    for (at, feature) in collection.features.iter_mut().enumerate() {
        feature.id = Some(Id::Number(at.into()));
    }

    let (colors, legend) = match &style.column {
        Some(column) => {
            let colored = column_colors(table, column, style.cmap.as_deref())?;
            let colors: Vec<Value> = colored
                .colors
                .iter()
                .map(|color| color.map(|rgb| Value::String(rgb.hex())).unwrap_or(Value::Null))
                .collect();
            let legend = colored
                .legend
                .into_iter()
                .map(|(label, rgb)| LegendRow {
                    label: format!("{name}: {label}"),
                    color: rgb.hex(),
                })
                .collect();
            (Value::Array(colors), legend)
        }
        None => (
            Value::Null,
            vec![LegendRow {
                label: name.clone(),
                color: base.hex(),
            }],
        ),
    };

    let settings = json!({
        "name": name,
        "data": collection,
        "color": base.hex(),
        "colors": colors,
        "fields": table.columns,
        "weight": style.linewidth.unwrap_or(2.0),
        "fillOpacity": style.alpha.unwrap_or(0.5).clamp(0.0, 1.0),
        "radius": style.markersize.unwrap_or(6.0),
    });
    Ok((settings, legend))
}

#[derive(Debug, Serialize)]
struct LegendRow {
    label: String,
    color: String,
}

/// Render the page; the `.html` template name turns on escaping of title and legend text.
fn render_page(
    title: Option<&str>,
    legend: &[LegendRow],
    add_minimap: bool,
    config: &str,
) -> Result<String, GisError> {
    let mut tera = Tera::default();
    tera.add_raw_template(TEMPLATE_NAME, TEMPLATE)
        .map_err(|err| GisError::render(err.to_string()))?;
    let mut context = Context::new();
    context.insert("title", title.unwrap_or_default());
    context.insert("legend", legend);
    context.insert("add_minimap", &add_minimap);
    context.insert("minimap_cdn", MINIMAP_CDN);
    context.insert("config", config);
    tera.render(TEMPLATE_NAME, &context)
        .map_err(|err| GisError::render(err.to_string()))
}

/// Write a Leaflet page with every layer reprojected to WGS 84.
pub fn create_web_map(request: CreateWebMapRequest, root: &Path) -> Result<MapResponse, GisError> {
    if request.layers.is_empty() {
        return Err(GisError::invalid_input("at least one layer is required"));
    }
    let (tile_url, attribution) = basemap(&request.basemap)?;

    let mut layers = Vec::with_capacity(request.layers.len());
    let mut legend = Vec::new();
    for (index, layer) in request.layers.iter().enumerate() {
        let LayerData::Vector(table) = load_layer(&layer.data, false)? else {
            return Err(GisError::invalid_input("web maps only draw vector layers"));
        };
        let (settings, rows) = web_layer(&geographic(table)?, layer, index)?;
        layers.push(settings);
        legend.extend(rows);
    }

    let config = json!({
        "tiles": { "url": tile_url, "attribution": attribution },
        "layers": layers,
        "showGrid": request.show_grid,
        "addMinimap": request.add_minimap,
    });
    let config = serde_json::to_string(&config)
        .map_err(|err| GisError::render(format!("cannot embed layers: {err}")))?
        .replace("</", "<\\/");

    let legend = if request.add_legend { legend } else { Vec::new() };
    let page = render_page(request.title.as_deref(), &legend, request.add_minimap, &config)?;

    let path = output_file(root, &request.output_dir, &request.filename, "html")?;
    fs::write_text(&path, &page)?;
    tracing::info!(
        target: "gis_mcp::tools",
        path = %path.display(),
        layers = layers.len(),
        "Web map written"
    );
    Ok(MapResponse {
        status: SUCCESS.to_string(),
        message: format!("Web map saved to {}", path.display()),
        output_path: path.to_string_lossy().into_owned(),
        layer_count: layers.len(),
    })
}
