//! GeoJSON feature collections.

use std::path::Path;

use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use serde_json::{json, Value};

use super::table::FeatureTable;
use crate::{
    lib::{errors::GisError, fs},
    tools::geometry::codec,
};

const DEFAULT_CRS: &str = "EPSG:4326";

fn malformed(path: &Path, message: impl std::fmt::Display) -> GisError {
    GisError::vector(format!("{}: {message}", path.display()))
}

/// CRS named by a legacy `crs` foreign member; RFC 7946 files are WGS 84.
fn crs_member(foreign_members: Option<&JsonObject>) -> String {
    let name = foreign_members
        .and_then(|members| members.get("crs"))
        .and_then(|crs| crs.get("properties"))
        .and_then(|properties| properties.get("name"))
        .and_then(Value::as_str);
    match name {
        Some(name) if name.ends_with("CRS84") => DEFAULT_CRS.to_string(),
        Some(name) => match name.rsplit_once("::") {
            Some((prefix, code)) if prefix.contains("EPSG") => format!("EPSG:{code}"),
            _ => name.to_string(),
        },
        None => DEFAULT_CRS.to_string(),
    }
}

fn crs_object(crs: &str) -> Value {
    let name = match crs.split_once(':') {
        Some(("EPSG", code)) => format!("urn:ogc:def:crs:EPSG::{code}"),
        _ => crs.to_string(),
    };
    json!({ "type": "name", "properties": { "name": name } })
}

pub fn read(path: &Path) -> Result<FeatureTable, GisError> {
    let document: GeoJson = fs::read_text(path)?
        .parse()
        .map_err(|err| malformed(path, format!("not valid GeoJSON: {err}")))?;

    let (features, crs) = match document {
        GeoJson::FeatureCollection(collection) => {
            let crs = crs_member(collection.foreign_members.as_ref());
            (collection.features, crs)
        }
        GeoJson::Feature(feature) => {
            let crs = crs_member(feature.foreign_members.as_ref());
            (vec![feature], crs)
        }
        GeoJson::Geometry(geometry) => (vec![Feature::from(geometry)], DEFAULT_CRS.to_string()),
    };

    let mut columns: Vec<String> = Vec::new();
    for properties in features.iter().filter_map(|f| f.properties.as_ref()) {
        for key in properties.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let mut table = FeatureTable::new(columns, Some(crs));
    for (index, feature) in features.into_iter().enumerate() {
        let values = table
            .columns
            .iter()
            .map(|column| feature.property(column).cloned().unwrap_or(Value::Null))
            .collect();
        let geometry = feature
            .geometry
            .map(codec::from_geojson_geometry)
            .transpose()
            .map_err(|err| malformed(path, format!("feature {index}: {err}")))?;
        table.push(geometry, values);
    }
    Ok(table)
}

/// The table as a collection; non-WGS 84 layers carry a legacy `crs` member.
pub fn to_collection(table: &FeatureTable) -> FeatureCollection {
    let features = table
        .features
        .iter()
        .map(|feature| Feature {
            bbox: None,
            geometry: feature.geometry.as_ref().map(codec::geojson_geometry),
            id: None,
            properties: Some(
                table
                    .columns
                    .iter()
                    .cloned()
                    .zip(feature.values.iter().cloned())
                    .collect(),
            ),
            foreign_members: None,
        })
        .collect();

    let foreign_members = table
        .crs
        .as_deref()
        .filter(|crs| *crs != DEFAULT_CRS)
        .map(|crs| JsonObject::from_iter([("crs".to_string(), crs_object(crs))]));
    FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    }
}

pub fn write(table: &FeatureTable, path: &Path) -> Result<(), GisError> {
    let text = serde_json::to_string_pretty(&to_collection(table))
        .map_err(|err| malformed(path, format!("cannot serialise: {err}")))?;
    fs::write_text(path, &text)
}

#[cfg(test)]
mod tests {
    use geo::{point, Geometry};
    use tempfile::tempdir;

    use super::*;

    fn write_json(dir: &Path, name: &str, document: Value) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, document.to_string()).expect("can write file");
        path
    }

    #[test]
    fn legacy_crs_member_is_honoured() {
        let dir = tempdir().expect("can create temporary directory");
        let path = write_json(
            dir.path(),
            "projected.geojson",
            json!({
                "type": "FeatureCollection",
                "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::3857" } },
                "features": []
            }),
        );
        assert_eq!(read(&path).expect("reads").crs.as_deref(), Some("EPSG:3857"));
        assert_eq!(crs_member(None), "EPSG:4326");
    }

    #[test]
    fn properties_become_columns_in_first_seen_order() {
        let dir = tempdir().expect("can create temporary directory");
        let path = write_json(
            dir.path(),
            "pts.geojson",
            json!({
                "type": "FeatureCollection",
                "features": [
                    { "type": "Feature", "properties": { "name": "a" },
                      "geometry": { "type": "Point", "coordinates": [1.0, 2.0] } },
                    { "type": "Feature", "properties": { "name": "b", "pop": 3 },
                      "geometry": null }
                ]
            }),
        );

        let table = read(&path).expect("reads");
        assert_eq!(table.columns, vec!["name", "pop"]);
        assert_eq!(table.value(0, 1), &Value::Null);
        assert!(table.features[1].geometry.is_none());
        assert_eq!(table.crs.as_deref(), Some("EPSG:4326"));
    }

    #[test]
    fn bare_geometry_becomes_a_single_feature() {
        let dir = tempdir().expect("can create temporary directory");
        let path = write_json(
            dir.path(),
            "line.geojson",
            json!({ "type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]] }),
        );
        let table = read(&path).expect("reads");
        assert_eq!(table.len(), 1);
        assert!(table.columns.is_empty());
        assert!(matches!(table.features[0].geometry, Some(Geometry::LineString(_))));
    }

    #[test]
    fn non_geojson_json_is_rejected() {
        let dir = tempdir().expect("can create temporary directory");
        let path = write_json(dir.path(), "bad.geojson", json!({ "type": "Circle" }));
        let err = read(&path).unwrap_err();
        assert!(err.to_string().contains("not valid GeoJSON"), "{err}");
    }

    #[test]
    fn projected_tables_round_trip_their_crs_member() {
        let dir = tempdir().expect("can create temporary directory");
        let mut table = FeatureTable::new(vec!["id".into()], Some("EPSG:32633".into()));
        table.push(Some(Geometry::Point(point!(x: 500000.0, y: 0.0))), vec![json!(1)]);
        let document = serde_json::to_value(to_collection(&table)).expect("serialises");
        assert_eq!(
            document["crs"]["properties"]["name"],
            "urn:ogc:def:crs:EPSG::32633"
        );
        assert_eq!(document["features"][0]["properties"]["id"], 1);

        let path = dir.path().join("utm.geojson");
        write(&table, &path).expect("writes");
        let back = read(&path).expect("reads");
        assert_eq!(back.crs.as_deref(), Some("EPSG:32633"));
        assert_eq!(back.value(0, 0), &json!(1));
    }
}
