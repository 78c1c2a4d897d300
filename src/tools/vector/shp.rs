//! ESRI Shapefile reading and writing (`.shp`, `.shx`, `.dbf`, `.prj`).

use std::{collections::HashSet, path::Path};

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde_json::Value;
use shapefile::{
    dbase::{self, FieldName, FieldValue, TableWriterBuilder},
    Multipoint, PolygonRing, Polyline, Shape,
};

use super::table::{as_f64, number, FeatureTable};
use crate::{
    lib::{errors::GisError, fs},
    tools::crs::projection,
};

const REQUIRED_COMPONENTS: [&str; 3] = ["shp", "shx", "dbf"];
const DBF_NAME_LIMIT: usize = 10;

fn shapefile_error(path: &Path, err: impl std::fmt::Display) -> GisError {
    GisError::vector(format!("{}: {err}", path.display()))
}

pub fn read(path: &Path) -> Result<FeatureTable, GisError> {
    let missing: Vec<String> = REQUIRED_COMPONENTS
        .iter()
        .filter(|ext| !fs::with_extension(path, ext).exists())
        .map(|ext| format!(".{ext}"))
        .collect();
    if !missing.is_empty() {
        return Err(GisError::vector(format!(
            "{} is missing component files: {}",
            path.display(),
            missing.join(", ")
        )));
    }

    let columns = dbf_columns(&fs::with_extension(path, "dbf"))?;
    let prj = fs::with_extension(path, "prj");
    let crs = if prj.exists() {
        Some(projection::identify_crs(&fs::read_text(&prj)?))
    } else {
        None
    };

    let mut reader =
        shapefile::Reader::from_path(path).map_err(|err| shapefile_error(path, err))?;
    let mut table = FeatureTable::new(columns, crs);
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result.map_err(|err| shapefile_error(path, err))?;
        let values = table
            .columns
            .iter()
            .map(|name| record.get(name).map(field_to_json).unwrap_or(Value::Null))
            .collect();
        table.push(shape_to_geometry(shape)?, values);
    }
    Ok(table)
}

fn dbf_columns(dbf: &Path) -> Result<Vec<String>, GisError> {
    let reader = dbase::Reader::from_path(dbf).map_err(|err| shapefile_error(dbf, err))?;
    Ok(reader
        .fields()
        .iter()
        .map(|field| field.name().to_string())
        .filter(|name| name != "DeletionFlag")
        .collect())
}

fn field_to_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Character(Some(text)) | FieldValue::Memo(text) => {
            Value::String(text.trim_end().to_string())
        }
        FieldValue::Numeric(Some(n)) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
            Value::from(*n as i64)
        }
        FieldValue::Numeric(Some(n)) | FieldValue::Double(n) | FieldValue::Currency(n) => {
            number(*n)
        }
        FieldValue::Float(Some(f)) => number(*f as f64),
        FieldValue::Integer(i) => Value::from(*i),
        FieldValue::Logical(Some(b)) => Value::Bool(*b),
        FieldValue::Date(Some(date)) => Value::String(format!(
            "{:04}-{:02}-{:02}",
            date.year(),
            date.month(),
            date.day()
        )),
        FieldValue::DateTime(stamp) => {
            let date = stamp.date();
            Value::String(format!(
                "{:04}-{:02}-{:02}",
                date.year(),
                date.month(),
                date.day()
            ))
        }
        _ => Value::Null,
    }
}

trait Xy {
    fn xy(&self) -> Coord<f64>;
}

impl Xy for shapefile::Point {
    fn xy(&self) -> Coord<f64> {
        Coord { x: self.x, y: self.y }
    }
}

impl Xy for shapefile::PointM {
    fn xy(&self) -> Coord<f64> {
        Coord { x: self.x, y: self.y }
    }
}

impl Xy for shapefile::PointZ {
    fn xy(&self) -> Coord<f64> {
        Coord { x: self.x, y: self.y }
    }
}

fn line<P: Xy>(points: &[P]) -> LineString<f64> {
    LineString::new(points.iter().map(Xy::xy).collect())
}

fn lines<P: Xy>(parts: &[Vec<P>]) -> Geometry<f64> {
    let mut lines: Vec<LineString<f64>> = parts.iter().map(|part| line(part)).collect();
    if lines.len() == 1 {
        Geometry::LineString(lines.remove(0))
    } else {
        Geometry::MultiLineString(MultiLineString::new(lines))
    }
}

/// Outer rings start a polygon; inner rings attach to the preceding outer ring.
fn polygons<P: Xy>(rings: &[PolygonRing<P>]) -> Geometry<f64> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => polygons.push(Polygon::new(line(points), Vec::new())),
            PolygonRing::Inner(points) => match polygons.last_mut() {
                Some(polygon) => polygon.interiors_push(line(points)),
                None => polygons.push(Polygon::new(line(points), Vec::new())),
            },
        }
    }
    if polygons.len() == 1 {
        Geometry::Polygon(polygons.remove(0))
    } else {
        Geometry::MultiPolygon(MultiPolygon::new(polygons))
    }
}

fn points<P: Xy>(points: &[P]) -> Geometry<f64> {
    Geometry::MultiPoint(MultiPoint::new(
        points.iter().map(|p| Point::from(p.xy())).collect(),
    ))
}

fn shape_to_geometry(shape: Shape) -> Result<Option<Geometry<f64>>, GisError> {
    Ok(Some(match shape {
        Shape::NullShape => return Ok(None),
        Shape::Point(p) => Geometry::Point(Point::from(p.xy())),
        Shape::PointM(p) => Geometry::Point(Point::from(p.xy())),
        Shape::PointZ(p) => Geometry::Point(Point::from(p.xy())),
        Shape::Polyline(shape) => lines(shape.parts()),
        Shape::PolylineM(shape) => lines(shape.parts()),
        Shape::PolylineZ(shape) => lines(shape.parts()),
        Shape::Polygon(shape) => polygons(shape.rings()),
        Shape::PolygonM(shape) => polygons(shape.rings()),
        Shape::PolygonZ(shape) => polygons(shape.rings()),
        Shape::Multipoint(shape) => points(shape.points()),
        Shape::MultipointM(shape) => points(shape.points()),
        Shape::MultipointZ(shape) => points(shape.points()),
        Shape::Multipatch(_) => {
            return Err(GisError::unsupported_geometry(
                "multipatch shapes are not supported",
            ))
        }
    }))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ShapeFamily {
    Point,
    MultiPoint,
    Line,
    Polygon,
}

fn family(geometry: &Geometry<f64>) -> Result<ShapeFamily, GisError> {
    Ok(match geometry {
        Geometry::Point(_) => ShapeFamily::Point,
        Geometry::MultiPoint(_) => ShapeFamily::MultiPoint,
        Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
            ShapeFamily::Line
        }
        Geometry::Polygon(_)
        | Geometry::MultiPolygon(_)
        | Geometry::Rect(_)
        | Geometry::Triangle(_) => ShapeFamily::Polygon,
        Geometry::GeometryCollection(_) => {
            return Err(GisError::unsupported_geometry(
                "geometry collections cannot be stored in a shapefile",
            ))
        }
    })
}

/// The shape type of the file: points and multipoints share the multipoint type.
fn layer_family(table: &FeatureTable) -> Result<ShapeFamily, GisError> {
    let mut found: Option<ShapeFamily> = None;
    for geometry in table.geometries()? {
        let next = family(geometry)?;
        found = Some(match (found, next) {
            (None, next) => next,
            (Some(a), b) if a == b => a,
            (Some(ShapeFamily::Point), ShapeFamily::MultiPoint)
            | (Some(ShapeFamily::MultiPoint), ShapeFamily::Point) => ShapeFamily::MultiPoint,
            (Some(a), b) => {
                return Err(GisError::vector(format!(
                    "a shapefile holds one geometry type, found {a:?} and {b:?}"
                )))
            }
        });
    }
    found.ok_or_else(|| GisError::vector("cannot write a shapefile with no features"))
}

fn shp_point(coord: Coord<f64>) -> shapefile::Point {
    shapefile::Point::new(coord.x, coord.y)
}

fn shp_points(line: &LineString<f64>) -> Vec<shapefile::Point> {
    line.coords().copied().map(shp_point).collect()
}

fn to_polyline(geometry: &Geometry<f64>) -> Polyline {
    let parts = match geometry {
        Geometry::Line(l) => vec![vec![shp_point(l.start), shp_point(l.end)]],
        Geometry::LineString(l) => vec![shp_points(l)],
        Geometry::MultiLineString(m) => m.0.iter().map(shp_points).collect(),
        _ => Vec::new(),
    };
    Polyline::with_parts(parts)
}

fn to_polygon(geometry: &Geometry<f64>) -> shapefile::Polygon {
    let multi = crate::tools::geometry::ops::as_multi_polygon(geometry)
        .unwrap_or_else(|| MultiPolygon::new(Vec::new()));
    let mut rings = Vec::new();
    for polygon in &multi.0 {
        rings.push(PolygonRing::Outer(shp_points(polygon.exterior())));
        for interior in polygon.interiors() {
            rings.push(PolygonRing::Inner(shp_points(interior)));
        }
    }
    shapefile::Polygon::with_rings(rings)
}

fn to_multipoint(geometry: &Geometry<f64>) -> Multipoint {
    let points = match geometry {
        Geometry::Point(p) => vec![shp_point(p.0)],
        Geometry::MultiPoint(m) => m.0.iter().map(|p| shp_point(p.0)).collect(),
        _ => Vec::new(),
    };
    Multipoint::new(points)
}

#[derive(Debug, Clone, Copy)]
enum FieldKind {
    Integer,
    Real,
    Logical,
    Text,
}

fn field_kind(table: &FeatureTable, column: usize) -> FieldKind {
    let types = table.column_types();
    match types.get(&table.columns[column]).map(String::as_str) {
        Some("int64") => FieldKind::Integer,
        Some("float64") => FieldKind::Real,
        Some("bool") => FieldKind::Logical,
        _ => FieldKind::Text,
    }
}

/// dBase names are limited to ten characters; truncated names are de-duplicated.
fn dbf_names(columns: &[String]) -> Vec<String> {
    let mut used = HashSet::new();
    columns
        .iter()
        .map(|column| {
            let base: String = column.chars().take(DBF_NAME_LIMIT).collect();
            let mut candidate = base.clone();
            let mut counter = 1;
            while !used.insert(candidate.to_ascii_lowercase()) {
                let suffix = format!("_{counter}");
                let keep = DBF_NAME_LIMIT.saturating_sub(suffix.len());
                candidate = format!("{}{suffix}", base.chars().take(keep).collect::<String>());
                counter += 1;
            }
            candidate
        })
        .collect()
}

fn field_name(name: &str) -> Result<FieldName, GisError> {
    FieldName::try_from(name)
        .map_err(|err| GisError::vector(format!("invalid dBase field name {name:?}: {err:?}")))
}

fn text_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn write(table: &FeatureTable, path: &Path) -> Result<(), GisError> {
    let layer = layer_family(table)?;
    let names = dbf_names(&table.columns);
    let kinds: Vec<FieldKind> = (0..table.columns.len())
        .map(|column| field_kind(table, column))
        .collect();

    let mut builder = TableWriterBuilder::new();
    for (name, kind) in names.iter().zip(&kinds) {
        let field = field_name(name)?;
        builder = match kind {
            FieldKind::Integer => builder.add_numeric_field(field, 18, 0),
            FieldKind::Real => builder.add_numeric_field(field, 24, 15),
            FieldKind::Logical => builder.add_logical_field(field),
            FieldKind::Text => builder.add_character_field(field, 254),
        };
    }

    let mut writer =
        shapefile::Writer::from_path(path, builder).map_err(|err| shapefile_error(path, err))?;
    for feature in &table.features {
        let mut record = dbase::Record::default();
        for ((name, kind), value) in names.iter().zip(&kinds).zip(&feature.values) {
            let field = match kind {
                FieldKind::Integer | FieldKind::Real => FieldValue::Numeric(as_f64(value)),
                FieldKind::Logical => FieldValue::Logical(value.as_bool()),
                FieldKind::Text => FieldValue::Character(
                    Some(text_value(value)).filter(|_| !value.is_null()),
                ),
            };
            record.insert(name.clone(), field);
        }
        let geometry = feature
            .geometry
            .as_ref()
            .ok_or_else(|| GisError::vector("shapefile features need a geometry"))?;
        let written = match layer {
            ShapeFamily::Point => match geometry {
                Geometry::Point(p) => writer.write_shape_and_record(&shp_point(p.0), &record),
                _ => writer.write_shape_and_record(&to_multipoint(geometry), &record),
            },
            ShapeFamily::MultiPoint => {
                writer.write_shape_and_record(&to_multipoint(geometry), &record)
            }
            ShapeFamily::Line => writer.write_shape_and_record(&to_polyline(geometry), &record),
            ShapeFamily::Polygon => writer.write_shape_and_record(&to_polygon(geometry), &record),
        };
        written.map_err(|err| shapefile_error(path, err))?;
    }
    drop(writer);

    if let Some(crs) = &table.crs {
        let wkt = if crs.trim_start().starts_with(['P', 'G', 'C']) && crs.contains('[') {
            crs.clone()
        } else {
            projection::crs_wkt(crs)?
        };
        fs::write_text(&fs::with_extension(path, "prj"), &wkt)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use geo::polygon;
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn long_names_are_truncated_uniquely() {
        let names = dbf_names(&[
            "population_2020".into(),
            "population_2021".into(),
            "id".into(),
        ]);
        assert_eq!(names, vec!["population", "populati_1", "id"]);
    }

    #[test]
    fn mixed_geometry_types_are_rejected() {
        let mut table = FeatureTable::new(Vec::new(), None);
        table.push(Some(Geometry::Point(Point::new(0.0, 0.0))), Vec::new());
        table.push(
            Some(Geometry::LineString(LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]))),
            Vec::new(),
        );
        let err = layer_family(&table).expect_err("mixed");
        assert!(matches!(err, GisError::Vector { .. }));
    }

    #[test]
    fn polygons_round_trip_through_disk() {
        let dir = tempdir().expect("can create temporary directory");
        let path = dir.path().join("zones.shp");
        let mut table = FeatureTable::new(vec!["name".into(), "pop".into()], None);
        table.push(
            Some(Geometry::Polygon(polygon![
                (x: 0.0, y: 0.0),
                (x: 0.0, y: 2.0),
                (x: 2.0, y: 2.0),
                (x: 2.0, y: 0.0),
                (x: 0.0, y: 0.0),
            ])),
            vec![json!("north"), json!(120)],
        );

        write(&table, &path).expect("writes");
        let back = read(&path).expect("reads");
        assert_eq!(back.columns, vec!["name", "pop"]);
        assert_eq!(back.len(), 1);
        assert_eq!(back.value(0, 0), &json!("north"));
        assert_eq!(back.value(0, 1), &json!(120));
        assert_eq!(back.total_bounds(), Some([0.0, 0.0, 2.0, 2.0]));
    }
}
