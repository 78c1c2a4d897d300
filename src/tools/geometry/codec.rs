//! WKT and GeoJSON conversion for tool arguments and results.

use geo::Geometry;
use serde_json::Value;
use wkt::{ToWkt, TryFromWkt};

use crate::lib::errors::GisError;

/// Parse a WKT argument, stripping stray whitespace and backticks.
pub fn parse_wkt(raw: &str) -> Result<Geometry<f64>, GisError> {
    let cleaned = raw.trim().trim_matches('`').trim();
    if cleaned.is_empty() {
        return Err(GisError::invalid_geometry("geometry WKT is empty"));
    }
    Geometry::<f64>::try_from_wkt_str(cleaned)
        .map_err(|err| GisError::invalid_geometry(format!("{err}: {cleaned}")))
}

/// Parse a list of WKT arguments, naming the failing index.
pub fn parse_wkt_list(raw: &[String]) -> Result<Vec<Geometry<f64>>, GisError> {
    raw.iter()
        .enumerate()
        .map(|(index, wkt)| {
            parse_wkt(wkt).map_err(|err| {
                GisError::invalid_geometry(format!("geometries[{index}]: {err}"))
            })
        })
        .collect()
}

pub fn to_wkt(geometry: &Geometry<f64>) -> String {
    geometry.wkt_string()
}

/// Simple-features type name, folding geo-only variants onto their OGC equivalents.
pub fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) | Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
    }
}

pub fn geojson_geometry(geometry: &Geometry<f64>) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(geometry))
}

pub fn from_geojson_geometry(geometry: geojson::Geometry) -> Result<Geometry<f64>, GisError> {
    Geometry::<f64>::try_from(geometry)
        .map_err(|err| GisError::invalid_geometry(format!("unsupported GeoJSON geometry: {err}")))
}

pub fn to_geojson(geometry: &Geometry<f64>) -> Result<Value, GisError> {
    serde_json::to_value(geojson_geometry(geometry))
        .map_err(|err| GisError::invalid_geometry(format!("cannot encode GeoJSON: {err}")))
}

/// Accept a GeoJSON geometry or feature, either as an object or as a JSON string.
pub fn from_geojson(value: Value) -> Result<Geometry<f64>, GisError> {
    let value = match value {
        Value::String(text) => serde_json::from_str::<Value>(&text)
            .map_err(|err| GisError::invalid_geometry(format!("GeoJSON is not JSON: {err}")))?,
        other => other,
    };
    let document: geojson::GeoJson = serde_json::from_value(value)
        .map_err(|err| GisError::invalid_geometry(format!("invalid GeoJSON: {err}")))?;
    let geometry = match document {
        geojson::GeoJson::Geometry(geometry) => geometry,
        geojson::GeoJson::Feature(feature) => feature
            .geometry
            .ok_or_else(|| GisError::invalid_geometry("GeoJSON feature has no geometry"))?,
        geojson::GeoJson::FeatureCollection(_) => {
            return Err(GisError::invalid_geometry(
                "expected a GeoJSON geometry or feature, got a FeatureCollection",
            ))
        }
    };
    from_geojson_geometry(geometry)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn wkt_with_backticks_parses() {
        let geometry = parse_wkt("`POINT (1 2)`").expect("parses");
        assert_eq!(geometry_type_name(&geometry), "Point");
    }

    #[test]
    fn bad_wkt_is_an_invalid_geometry() {
        let err = parse_wkt("POINT (1").expect_err("rejects");
        assert!(matches!(err, GisError::InvalidGeometry { .. }));
    }

    #[test]
    fn list_errors_name_the_index() {
        let err = parse_wkt_list(&["POINT (0 0)".into(), "nope".into()]).expect_err("rejects");
        assert!(err.to_string().contains("geometries[1]"));
    }

    #[test]
    fn geojson_feature_is_unwrapped() {
        let feature = json!({
            "type": "Feature",
            "properties": {},
            "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]] }
        });
        let geometry = from_geojson(feature).expect("converts");
        assert_eq!(geometry_type_name(&geometry), "LineString");
    }

    #[test]
    fn geojson_string_is_accepted() {
        let text = r#"{"type":"Point","coordinates":[3.0,4.0]}"#;
        let geometry = from_geojson(Value::String(text.into())).expect("converts");
        let encoded = to_geojson(&geometry).expect("encodes");
        assert_eq!(encoded["type"], "Point");
        assert_eq!(encoded["coordinates"], json!([3.0, 4.0]));
    }
}
