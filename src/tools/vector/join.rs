//! Attribute and spatial joins between feature tables.

use std::collections::HashMap;

use geo::{BoundingRect, Distance, Euclidean, Geometry, Intersects, Relate};
use rstar::{
    primitives::{GeomWithData, Rectangle},
    RTree, AABB,
};
use serde_json::Value;

use super::table::{combine_columns, join_key, number, FeatureTable};
use crate::lib::errors::GisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinHow {
    Inner,
    Left,
    Right,
}

impl JoinHow {
    pub fn parse(raw: &str) -> Result<Self, GisError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "inner" => Ok(Self::Inner),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(GisError::invalid_input(format!(
                "how must be one of inner, left, right; got {other:?}"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Inner => "inner",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Intersects,
    Within,
    Contains,
    Touches,
    Crosses,
    Overlaps,
    Covers,
    CoveredBy,
}

impl Predicate {
    pub fn parse(raw: &str) -> Result<Self, GisError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "intersects" => Ok(Self::Intersects),
            "within" => Ok(Self::Within),
            "contains" => Ok(Self::Contains),
            "touches" => Ok(Self::Touches),
            "crosses" => Ok(Self::Crosses),
            "overlaps" => Ok(Self::Overlaps),
            "covers" => Ok(Self::Covers),
            "covered_by" => Ok(Self::CoveredBy),
            other => Err(GisError::invalid_input(format!(
                "unsupported predicate {other:?}; expected intersects, within, contains, \
                 touches, crosses, overlaps, covers or covered_by"
            ))),
        }
    }

    /// Whether `a <predicate> b` holds.
    pub fn holds(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
        if *self == Self::Intersects {
            return a.intersects(b);
        }
        let matrix = a.relate(b);
        match self {
            Self::Intersects => matrix.is_intersects(),
            Self::Within => matrix.is_within(),
            Self::Contains => matrix.is_contains(),
            Self::Touches => matrix.is_touches(),
            Self::Crosses => matrix.is_crosses(),
            Self::Overlaps => matrix.is_overlaps(),
            Self::Covers => matrix.is_covers(),
            Self::CoveredBy => matrix.is_coveredby(),
        }
    }
}

type Envelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Bounding-box index over the rows of a table that have geometries.
fn envelope_index(table: &FeatureTable) -> RTree<Envelope> {
    let envelopes = table
        .features
        .iter()
        .enumerate()
        .filter_map(|(row, feature)| {
            let rect = feature.geometry.as_ref()?.bounding_rect()?;
            Some(GeomWithData::new(
                Rectangle::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
                row,
            ))
        })
        .collect();
    RTree::bulk_load(envelopes)
}

/// Rows of `right` whose geometry satisfies `predicate` against each row of `left`.
fn predicate_matches(
    left: &FeatureTable,
    right: &FeatureTable,
    predicate: Predicate,
) -> Vec<Vec<usize>> {
    let index = envelope_index(right);
    left.features
        .iter()
        .map(|feature| {
            let Some(geometry) = &feature.geometry else {
                return Vec::new();
            };
            let Some(rect) = geometry.bounding_rect() else {
                return Vec::new();
            };
            let query =
                AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
            let mut rows: Vec<usize> = index
                .locate_in_envelope_intersecting(&query)
                .map(|candidate| candidate.data)
                .filter(|&row| {
                    right.features[row]
                        .geometry
                        .as_ref()
                        .is_some_and(|other| predicate.holds(geometry, other))
                })
                .collect();
            rows.sort_unstable();
            rows
        })
        .collect()
}

/// Lay out joined rows: the driving table's matches become `index_<other>` plus the other table's
/// columns.
fn assemble(
    left: &FeatureTable,
    right: &FeatureTable,
    how: JoinHow,
    matches: &[Vec<(usize, Option<f64>)>],
    with_distance: bool,
) -> FeatureTable {
    let (driver, other) = match how {
        JoinHow::Right => (right, left),
        _ => (left, right),
    };
    let mut extra = match how {
        JoinHow::Right => vec!["index_left".to_string()],
        _ => vec!["index_right".to_string()],
    };
    let mut columns = match how {
        JoinHow::Right => {
            extra.extend(left.columns.iter().cloned());
            combine_columns(&extra, &right.columns, ("_left", "_right"))
        }
        _ => {
            extra.extend(right.columns.iter().cloned());
            combine_columns(&left.columns, &extra, ("_left", "_right"))
        }
    };
    if with_distance {
        columns.push("distance".to_string());
    }

    let mut out = FeatureTable::new(columns, left.crs.clone());
    for (row, feature) in driver.features.iter().enumerate() {
        let found = &matches[row];
        if found.is_empty() {
            if how == JoinHow::Inner {
                continue;
            }
            let mut values = Vec::new();
            let blanks = vec![Value::Null; other.columns.len() + 1];
            match how {
                JoinHow::Right => {
                    values.extend(blanks);
                    values.extend(feature.values.iter().cloned());
                }
                _ => {
                    values.extend(feature.values.iter().cloned());
                    values.extend(blanks);
                }
            }
            if with_distance {
                values.push(Value::Null);
            }
            out.push(feature.geometry.clone(), values);
            continue;
        }
        for (other_row, distance) in found {
            let mut values = Vec::new();
            let partner = &other.features[*other_row];
            match how {
                JoinHow::Right => {
                    values.push(Value::from(*other_row));
                    values.extend(partner.values.iter().cloned());
                    values.extend(feature.values.iter().cloned());
                }
                _ => {
                    values.extend(feature.values.iter().cloned());
                    values.push(Value::from(*other_row));
                    values.extend(partner.values.iter().cloned());
                }
            }
            if with_distance {
                values.push(distance.map(number).unwrap_or(Value::Null));
            }
            out.push(feature.geometry.clone(), values);
        }
    }
    out
}

/// Spatial join; `predicate` is always evaluated as `left <predicate> right`.
pub fn sjoin(
    left: &FeatureTable,
    right: &FeatureTable,
    how: JoinHow,
    predicate: Predicate,
) -> FeatureTable {
    let forward = predicate_matches(left, right, predicate);
    let matches: Vec<Vec<(usize, Option<f64>)>> = match how {
        JoinHow::Right => {
            let mut by_right: Vec<Vec<(usize, Option<f64>)>> = vec![Vec::new(); right.len()];
            for (left_row, rows) in forward.iter().enumerate() {
                for &right_row in rows {
                    by_right[right_row].push((left_row, None));
                }
            }
            by_right
        }
        _ => forward
            .into_iter()
            .map(|rows| rows.into_iter().map(|row| (row, None)).collect())
            .collect(),
    };
    assemble(left, right, how, &matches, false)
}

/// Nearest-neighbour join with a `distance` column; ties are all kept.
pub fn sjoin_nearest(
    left: &FeatureTable,
    right: &FeatureTable,
    how: JoinHow,
    max_distance: Option<f64>,
) -> Result<FeatureTable, GisError> {
    if let Some(limit) = max_distance {
        if !(limit.is_finite() && limit >= 0.0) {
            return Err(GisError::invalid_input(
                "max_distance must be a non-negative number",
            ));
        }
    }
    let (driver, other) = match how {
        JoinHow::Right => (right, left),
        _ => (left, right),
    };
    let matches: Vec<Vec<(usize, Option<f64>)>> = driver
        .features
        .iter()
        .map(|feature| {
            let Some(geometry) = &feature.geometry else {
                return Vec::new();
            };
            let distances: Vec<(usize, f64)> = other
                .features
                .iter()
                .enumerate()
                .filter_map(|(row, f)| {
                    let candidate = f.geometry.as_ref()?;
                    Some((row, Euclidean.distance(geometry, candidate)))
                })
                .filter(|(_, d)| max_distance.map_or(true, |limit| *d <= limit))
                .collect();
            let best = distances
                .iter()
                .map(|(_, d)| *d)
                .fold(f64::INFINITY, f64::min);
            distances
                .into_iter()
                .filter(|(_, d)| *d == best)
                .map(|(row, d)| (row, Some(d)))
                .collect()
        })
        .collect();
    Ok(assemble(left, right, how, &matches, true))
}

/// Inner attribute join on every non-geometry column the two tables share.
pub fn merge(left: &FeatureTable, right: &FeatureTable) -> Result<FeatureTable, GisError> {
    let keys: Vec<(usize, usize)> = left
        .columns
        .iter()
        .enumerate()
        .filter_map(|(li, name)| right.column_index(name).map(|ri| (li, ri)))
        .collect();
    if keys.is_empty() {
        return Err(GisError::invalid_input(
            "the two layers share no attribute columns to merge on",
        ));
    }
    let right_rest: Vec<usize> = (0..right.columns.len())
        .filter(|ri| !keys.iter().any(|(_, k)| k == ri))
        .collect();
    let rest_names: Vec<String> = right_rest.iter().map(|&ri| right.columns[ri].clone()).collect();
    let mut columns = left.columns.clone();
    columns.extend(combine_columns(&[], &rest_names, ("_left", "_right")));

    let key_of = |values: &[Value], positions: &mut dyn Iterator<Item = usize>| {
        positions
            .map(|p| join_key(&values[p]))
            .collect::<Option<Vec<String>>>()
    };
    let mut lookup: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
    for (row, feature) in right.features.iter().enumerate() {
        if let Some(key) = key_of(&feature.values, &mut keys.iter().map(|(_, ri)| *ri)) {
            lookup.entry(key).or_default().push(row);
        }
    }

    let mut out = FeatureTable::new(columns, left.crs.clone());
    for feature in &left.features {
        let Some(key) = key_of(&feature.values, &mut keys.iter().map(|(li, _)| *li)) else {
            continue;
        };
        for &row in lookup.get(&key).map(Vec::as_slice).unwrap_or(&[]) {
            let mut values = feature.values.clone();
            values.extend(right_rest.iter().map(|&ri| right.features[row].values[ri].clone()));
            out.push(feature.geometry.clone(), values);
        }
    }
    Ok(out)
}

/// Stack two tables; the column set is the union, missing values are null.
pub fn append(first: &FeatureTable, second: &FeatureTable) -> FeatureTable {
    let mut columns = first.columns.clone();
    for name in &second.columns {
        if !columns.contains(name) {
            columns.push(name.clone());
        }
    }
    let mut out = FeatureTable::new(columns.clone(), first.crs.clone());
    for table in [first, second] {
        let positions: Vec<Option<usize>> =
            columns.iter().map(|name| table.column_index(name)).collect();
        for feature in &table.features {
            let values = positions
                .iter()
                .map(|p| p.map(|i| feature.values[i].clone()).unwrap_or(Value::Null))
                .collect();
            out.push(feature.geometry.clone(), values);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use geo::{point, polygon};
    use serde_json::json;

    use super::*;

    fn points() -> FeatureTable {
        let mut table = FeatureTable::new(vec!["name".into()], Some("EPSG:4326".into()));
        table.push(Some(Geometry::Point(point!(x: 0.5, y: 0.5))), vec![json!("inside")]);
        table.push(Some(Geometry::Point(point!(x: 5.0, y: 5.0))), vec![json!("outside")]);
        table
    }

    fn zones() -> FeatureTable {
        let mut table = FeatureTable::new(
            vec!["name".into(), "zone".into()],
            Some("EPSG:4326".into()),
        );
        table.push(
            Some(Geometry::Polygon(polygon![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 0.0),
                (x: 1.0, y: 1.0),
                (x: 0.0, y: 1.0),
                (x: 0.0, y: 0.0),
            ])),
            vec![json!("unit"), json!("A")],
        );
        table
    }

    #[test]
    fn left_within_join_keeps_unmatched_points() {
        let out = sjoin(&points(), &zones(), JoinHow::Left, Predicate::Within);
        assert_eq!(
            out.columns,
            vec!["name_left", "index_right", "name_right", "zone"]
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out.value(0, 1), &json!(0));
        assert_eq!(out.value(0, 3), &json!("A"));
        assert_eq!(out.value(1, 1), &Value::Null);
    }

    #[test]
    fn inner_join_drops_unmatched_rows() {
        let out = sjoin(&points(), &zones(), JoinHow::Inner, Predicate::Intersects);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn right_join_drives_from_the_right_table() {
        let out = sjoin(&points(), &zones(), JoinHow::Right, Predicate::Within);
        assert_eq!(out.columns[0], "index_left");
        assert_eq!(out.len(), 1);
        assert!(matches!(out.features[0].geometry, Some(Geometry::Polygon(_))));
    }

    #[test]
    fn contains_is_directional() {
        let out = sjoin(&zones(), &points(), JoinHow::Inner, Predicate::Contains);
        assert_eq!(out.len(), 1);
        let out = sjoin(&points(), &zones(), JoinHow::Inner, Predicate::Contains);
        assert_eq!(out.len(), 0);
    }

    #[test]
    fn nearest_join_reports_distance_and_respects_limit() {
        let out = sjoin_nearest(&points(), &zones(), JoinHow::Left, None).expect("joins");
        let distance_col = out.column_index("distance").expect("distance column");
        assert_eq!(out.value(0, distance_col), &json!(0.0));
        let far = out.value(1, distance_col).as_f64().expect("number");
        assert!((far - (32.0_f64).sqrt()).abs() < 1e-9);

        let limited = sjoin_nearest(&points(), &zones(), JoinHow::Left, Some(1.0)).expect("joins");
        assert_eq!(limited.value(1, distance_col), &Value::Null);
        assert!(sjoin_nearest(&points(), &zones(), JoinHow::Left, Some(-1.0)).is_err());
    }

    #[test]
    fn merge_joins_on_shared_columns() {
        let mut right = FeatureTable::new(vec!["name".into(), "pop".into()], None);
        right.push(None, vec![json!("inside"), json!(10)]);
        right.push(None, vec![json!("elsewhere"), json!(3)]);
        let out = merge(&points(), &right).expect("merges");
        assert_eq!(out.columns, vec!["name", "pop"]);
        assert_eq!(out.len(), 1);
        assert_eq!(out.value(0, 1), &json!(10));
        assert!(out.features[0].geometry.is_some());
    }

    #[test]
    fn merge_without_shared_columns_fails() {
        let right = FeatureTable::new(vec!["other".into()], None);
        assert!(merge(&points(), &right).is_err());
    }

    #[test]
    fn append_unions_columns() {
        let out = append(&points(), &zones());
        assert_eq!(out.columns, vec!["name", "zone"]);
        assert_eq!(out.len(), 3);
        assert_eq!(out.value(0, 1), &Value::Null);
        assert_eq!(out.value(2, 1), &json!("A"));
    }

    #[test]
    fn predicates_parse_by_name() {
        assert_eq!(Predicate::parse("covered_by").expect("ok"), Predicate::CoveredBy);
        assert!(Predicate::parse("near").is_err());
    }
}
