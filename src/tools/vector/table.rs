//! In-memory feature table: ordered attribute columns plus one geometry per row.

use std::collections::BTreeMap;

use geo::{BoundingRect, CoordsIter, Geometry, Rect};
use serde_json::{Map, Number, Value};

use crate::{
    lib::errors::GisError,
    tools::{crs::Transformer, geometry::codec},
};

/// Name of the geometry column as it appears in listings and previews.
pub const GEOMETRY: &str = "geometry";

const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Option<Geometry<f64>>,
    /// One value per table column, in column order.
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    pub columns: Vec<String>,
    pub features: Vec<Feature>,
    /// `AUTH:CODE` when identifiable, otherwise the WKT definition.
    pub crs: Option<String>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>, crs: Option<String>) -> Self {
        Self {
            columns,
            features: Vec::new(),
            crs,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Index of a column that must exist.
    pub fn require_column(&self, name: &str) -> Result<usize, GisError> {
        self.column_index(name)
            .ok_or_else(|| GisError::MissingColumns {
                columns: vec![name.to_string()],
            })
    }

    pub fn push(&mut self, geometry: Option<Geometry<f64>>, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.columns.len());
        self.features.push(Feature { geometry, values });
    }

    pub fn value(&self, row: usize, column: usize) -> &Value {
        &self.features[row].values[column]
    }

    /// Column names followed by `geometry`, as reported to callers.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = self.columns.clone();
        names.push(GEOMETRY.to_string());
        names
    }

    /// Printable CRS, `None` when the source carried no definition.
    pub fn crs_label(&self) -> String {
        self.crs.clone().unwrap_or_else(|| "None".to_string())
    }

    /// Column dtypes in the usual dataframe vocabulary.
    pub fn column_types(&self) -> BTreeMap<String, String> {
        let mut types: BTreeMap<String, String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), self.infer_type(index).to_string()))
            .collect();
        types.insert(GEOMETRY.to_string(), GEOMETRY.to_string());
        types
    }

    fn infer_type(&self, column: usize) -> &'static str {
        let mut seen_int = false;
        let mut seen_float = false;
        let mut seen_bool = false;
        let mut seen_null = false;
        for feature in &self.features {
            match &feature.values[column] {
                Value::Null => seen_null = true,
                Value::Bool(_) => seen_bool = true,
                Value::Number(n) if n.is_i64() || n.is_u64() => seen_int = true,
                Value::Number(_) => seen_float = true,
                _ => return "object",
            }
        }
        match (seen_bool, seen_int, seen_float) {
            (true, false, false) if !seen_null => "bool",
            (false, true, false) if !seen_null => "int64",
            (false, _, _) if seen_int || seen_float => "float64",
            _ => "object",
        }
    }

    /// Numeric values of a column, `None` where missing or non-numeric.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<Option<f64>>, GisError> {
        let index = self.require_column(name)?;
        Ok(self
            .features
            .iter()
            .map(|feature| as_f64(&feature.values[index]))
            .collect())
    }

    /// `[minx, miny, maxx, maxy]` over all geometries.
    pub fn total_bounds(&self) -> Option<[f64; 4]> {
        self.features
            .iter()
            .filter_map(|feature| feature.geometry.as_ref())
            .filter_map(|geometry| geometry.bounding_rect())
            .reduce(merge_rects)
            .map(|rect| [rect.min().x, rect.min().y, rect.max().x, rect.max().y])
    }

    /// First rows as JSON objects with the geometry rendered as WKT.
    pub fn preview(&self) -> Vec<Value> {
        self.features
            .iter()
            .take(PREVIEW_ROWS)
            .map(|feature| self.row_object(feature))
            .collect()
    }

    pub fn row_object(&self, feature: &Feature) -> Value {
        let mut row = Map::new();
        for (name, value) in self.columns.iter().zip(&feature.values) {
            row.insert(name.clone(), value.clone());
        }
        row.insert(
            GEOMETRY.to_string(),
            feature
                .geometry
                .as_ref()
                .map(|geometry| Value::String(codec::to_wkt(geometry)))
                .unwrap_or(Value::Null),
        );
        Value::Object(row)
    }

    /// Reproject every geometry; tables without a CRS cannot be reprojected.
    pub fn to_crs(&self, target: &str) -> Result<FeatureTable, GisError> {
        let Some(source) = &self.crs else {
            return Err(GisError::crs(
                "cannot reproject a layer without a CRS definition",
            ));
        };
        let transformer = Transformer::new(source, target)?;
        let mut out = self.clone();
        out.crs = Some(transformer.target.clone());
        if transformer.is_identity() {
            return Ok(out);
        }
        for feature in &mut out.features {
            if let Some(geometry) = &feature.geometry {
                feature.geometry = Some(transformer.geometry(geometry)?);
            }
        }
        Ok(out)
    }

    /// Bring `other` into this table's CRS when both are known and differ.
    pub fn align(&self, other: FeatureTable) -> Result<FeatureTable, GisError> {
        match (&self.crs, &other.crs) {
            (Some(ours), Some(theirs)) if ours != theirs => {
                tracing::warn!(
                    target: "gis_mcp::tools",
                    left = %ours,
                    right = %theirs,
                    "CRS mismatch, reprojecting the second layer"
                );
                other.to_crs(ours)
            }
            _ => Ok(other),
        }
    }

    /// Geometries of every row; rows without one are rejected.
    pub fn geometries(&self) -> Result<Vec<&Geometry<f64>>, GisError> {
        self.features
            .iter()
            .enumerate()
            .map(|(row, feature)| {
                feature
                    .geometry
                    .as_ref()
                    .ok_or_else(|| GisError::vector(format!("row {row} has no geometry")))
            })
            .collect()
    }
}

fn merge_rects(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        geo::coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
        geo::coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
    )
}

pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// JSON number from a float; non-finite values become null.
pub fn number(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Stable key for grouping and equality joins, so `1` and `1.0` compare equal.
pub fn join_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Number(n) => n.as_f64().map(|v| format!("n:{v}")),
        Value::String(s) => Some(format!("s:{s}")),
        Value::Bool(b) => Some(format!("b:{b}")),
        other => Some(format!("j:{other}")),
    }
}

pub fn is_empty_geometry(geometry: &Geometry<f64>) -> bool {
    geometry.coords_count() == 0
}

/// Build an output column list from two inputs, suffixing names present in both.
pub fn combine_columns(
    left: &[String],
    right: &[String],
    suffixes: (&str, &str),
) -> Vec<String> {
    let collides = |name: &String, others: &[String]| others.iter().any(|o| o == name);
    let mut columns: Vec<String> = left
        .iter()
        .map(|name| {
            if collides(name, right) {
                format!("{name}{}", suffixes.0)
            } else {
                name.clone()
            }
        })
        .collect();
    columns.extend(right.iter().map(|name| {
        if collides(name, left) {
            format!("{name}{}", suffixes.1)
        } else {
            name.clone()
        }
    }));
    columns
}

#[cfg(test)]
mod tests {
    use geo::{point, polygon};
    use serde_json::json;

    use super::*;

    fn sample() -> FeatureTable {
        let mut table = FeatureTable::new(
            vec!["id".into(), "name".into(), "score".into()],
            Some("EPSG:4326".into()),
        );
        table.push(
            Some(Geometry::Point(point!(x: 1.0, y: 2.0))),
            vec![json!(1), json!("a"), json!(0.5)],
        );
        table.push(
            Some(Geometry::Polygon(polygon![
                (x: 0.0, y: 0.0),
                (x: 4.0, y: 0.0),
                (x: 4.0, y: 3.0),
                (x: 0.0, y: 0.0),
            ])),
            vec![json!(2), json!("b"), json!(1)],
        );
        table
    }

    #[test]
    fn types_follow_dataframe_names() {
        let types = sample().column_types();
        assert_eq!(types["id"], "int64");
        assert_eq!(types["name"], "object");
        assert_eq!(types["score"], "float64");
        assert_eq!(types["geometry"], "geometry");
    }

    #[test]
    fn bounds_cover_every_geometry() {
        assert_eq!(sample().total_bounds(), Some([0.0, 0.0, 4.0, 3.0]));
    }

    #[test]
    fn preview_renders_wkt() {
        let preview = sample().preview();
        assert_eq!(preview.len(), 2);
        let wkt = preview[0]["geometry"].as_str().expect("wkt string");
        assert_eq!(
            codec::parse_wkt(wkt).expect("parses"),
            Geometry::Point(point!(x: 1.0, y: 2.0))
        );
        assert_eq!(preview[0]["name"], "a");
    }

    #[test]
    fn colliding_columns_are_suffixed() {
        let columns = combine_columns(
            &["id".into(), "a".into()],
            &["id".into(), "b".into()],
            ("_1", "_2"),
        );
        assert_eq!(columns, vec!["id_1", "a", "id_2", "b"]);
    }

    #[test]
    fn integer_and_float_keys_match() {
        assert_eq!(join_key(&json!(1)), join_key(&json!(1.0)));
        assert_ne!(join_key(&json!("1")), join_key(&json!(1)));
        assert_eq!(join_key(&Value::Null), None);
    }

    #[test]
    fn missing_column_is_reported_by_name() {
        let err = sample().require_column("pop").expect_err("missing");
        assert!(matches!(err, GisError::MissingColumns { columns } if columns == vec!["pop"]));
    }
}
