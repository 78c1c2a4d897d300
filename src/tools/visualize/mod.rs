//! Map output: static images drawn with plotters and Leaflet web maps.

pub mod request;
mod router;
mod static_map;
mod style;
mod web_map;

use std::path::{Path, PathBuf};

use geo::{coord, Coord, Geometry, LineString, Point, Polygon};
use serde_json::Value;

use crate::{
    lib::{
        errors::GisError,
        paths::{clean_arg, resolve_output_dir},
    },
    tools::{
        geometry::codec,
        raster::{self, Raster},
        vector::{self, FeatureTable},
    },
};

pub use request::*;
pub(crate) use router::router;
pub use static_map::create_map;
pub use web_map::create_web_map;

/// CRS assumed for WKT and coordinate-list layers.
const LITERAL_CRS: &str = "EPSG:4326";

/// A layer's data once read.
#[derive(Debug)]
pub(crate) enum LayerData {
    Vector(FeatureTable),
    Raster(Raster),
}

fn extension(raw: &str) -> String {
    Path::new(raw)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

fn literal_table(geometry: Geometry<f64>) -> FeatureTable {
    let mut table = FeatureTable::new(Vec::new(), Some(LITERAL_CRS.to_string()));
    table.push(Some(geometry), Vec::new());
    table
}

fn as_pair(value: &Value) -> Option<Coord<f64>> {
    match value.as_array()?.as_slice() {
        [x, y] => Some(coord! { x: x.as_f64()?, y: y.as_f64()? }),
        _ => None,
    }
}

/// One pair is a point, two a line, three or more a polygon.
fn coordinate_geometry(value: &Value) -> Result<Geometry<f64>, GisError> {
    if let Some(single) = as_pair(value) {
        return Ok(Geometry::Point(Point(single)));
    }
    let items = value.as_array().map(Vec::as_slice).unwrap_or_default();
    let coords = items
        .iter()
        .map(|item| {
            as_pair(item).ok_or_else(|| {
                GisError::invalid_input(format!("expected an [x, y] pair, got {item}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    match coords.len() {
        0 => Err(GisError::invalid_input("coordinate list is empty")),
        1 => Ok(Geometry::Point(Point(coords[0]))),
        2 => Ok(Geometry::LineString(LineString::from(coords))),
        _ => Ok(Geometry::Polygon(Polygon::new(LineString::from(coords), Vec::new()))),
    }
}

/// Read a layer from a file path, WKT text or a coordinate list.
pub(crate) fn load_layer(data: &Value, allow_raster: bool) -> Result<LayerData, GisError> {
    match data {
        Value::String(raw) => {
            let cleaned = clean_arg(raw);
            match extension(&cleaned).as_str() {
                "shp" | "geojson" | "json" => Ok(LayerData::Vector(vector::read_input(&cleaned)?)),
                "tif" | "tiff" if allow_raster => {
                    Ok(LayerData::Raster(raster::io::read(&cleaned)?))
                }
                "tif" | "tiff" => Err(GisError::UnsupportedFormat {
                    format: extension(&cleaned),
                }),
                _ => Ok(LayerData::Vector(literal_table(codec::parse_wkt(&cleaned)?))),
            }
        }
        Value::Array(_) => Ok(LayerData::Vector(literal_table(coordinate_geometry(data)?))),
        other => Err(GisError::invalid_input(format!(
            "layer data must be a path, WKT string or coordinate list, got {other}"
        ))),
    }
}

/// `dir/name`, with `extension` added when `name` has none.
fn output_file(root: &Path, dir: &str, name: &str, extension: &str) -> Result<PathBuf, GisError> {
    let name = clean_arg(name);
    if name.is_empty() {
        return Err(GisError::invalid_input("filename must not be empty"));
    }
    let folder = resolve_output_dir(root, dir)?;
    let mut path = folder.join(name);
    if path.extension().is_none() {
        path.set_extension(extension);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn coordinate_lists_pick_the_shape_by_length() {
        let point = coordinate_geometry(&json!([3.0, 4.0])).expect("point");
        assert!(matches!(point, Geometry::Point(_)));
        let single = coordinate_geometry(&json!([[3.0, 4.0]])).expect("point");
        assert!(matches!(single, Geometry::Point(_)));
        let line = coordinate_geometry(&json!([[0.0, 0.0], [1.0, 1.0]])).expect("line");
        assert!(matches!(line, Geometry::LineString(_)));
        let Geometry::Polygon(polygon) =
            coordinate_geometry(&json!([[0, 0], [1, 0], [1, 1]])).expect("polygon")
        else {
            panic!("expected a polygon");
        };
        assert!(polygon.exterior().is_closed());
        assert!(coordinate_geometry(&json!([[0.0, "a"]])).is_err());
        assert!(coordinate_geometry(&json!([])).is_err());
    }

    #[test]
    fn wkt_layers_are_geographic() {
        let LayerData::Vector(table) = load_layer(&json!("POINT (1 2)"), true).expect("loads")
        else {
            panic!("expected a vector layer");
        };
        assert_eq!(table.len(), 1);
        assert_eq!(table.crs.as_deref(), Some("EPSG:4326"));
        assert!(load_layer(&json!(42), true).is_err());
    }

    #[test]
    fn rasters_can_be_refused() {
        let err = load_layer(&json!("/data/dem.tif"), false).unwrap_err();
        assert!(matches!(err, GisError::UnsupportedFormat { .. }));
    }

    #[test]
    fn output_names_gain_the_default_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = output_file(dir.path(), "maps", "parks", "png").expect("path");
        assert_eq!(path, dir.path().join("maps").join("parks.png"));
        let kept = output_file(dir.path(), "maps", "parks.svg", "png").expect("path");
        assert!(kept.ends_with("maps/parks.svg"));
        assert!(output_file(dir.path(), "maps", " ", "png").is_err());
    }
}
