//! Table-level overlay, clip, dissolve and explode.

use std::cmp::Ordering;

use geo::{BoundingRect, Geometry, Intersects};
use serde_json::Value;

use super::table::{combine_columns, is_empty_geometry, join_key, FeatureTable};
use crate::{
    lib::errors::GisError,
    tools::geometry::ops::{self, Overlay},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayHow {
    Intersection,
    Union,
    Identity,
    SymmetricDifference,
    Difference,
}

impl OverlayHow {
    pub fn parse(raw: &str) -> Result<Self, GisError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "intersection" => Ok(Self::Intersection),
            "union" => Ok(Self::Union),
            "identity" => Ok(Self::Identity),
            "symmetric_difference" => Ok(Self::SymmetricDifference),
            "difference" => Ok(Self::Difference),
            other => Err(GisError::invalid_input(format!(
                "how must be one of intersection, union, identity, \
                 symmetric_difference, difference; got {other:?}"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Intersection => "intersection",
            Self::Union => "union",
            Self::Identity => "identity",
            Self::SymmetricDifference => "symmetric_difference",
            Self::Difference => "difference",
        }
    }
}

fn boxes_touch(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    match (a.bounding_rect(), b.bounding_rect()) {
        (Some(ra), Some(rb)) => ra.intersects(&rb),
        _ => false,
    }
}

fn nulls(count: usize) -> Vec<Value> {
    vec![Value::Null; count]
}

/// Pairwise intersections with attributes from both sides.
fn intersections(
    left: &FeatureTable,
    right: &FeatureTable,
    out: &mut FeatureTable,
) -> Result<(), GisError> {
    for a in &left.features {
        let Some(ga) = &a.geometry else { continue };
        for b in &right.features {
            let Some(gb) = &b.geometry else { continue };
            if !boxes_touch(ga, gb) || !ga.intersects(gb) {
                continue;
            }
            let piece = ops::overlay(ga, gb, Overlay::Intersection)?;
            if is_empty_geometry(&piece) {
                continue;
            }
            let mut values = a.values.clone();
            values.extend(b.values.iter().cloned());
            out.push(Some(piece), values);
        }
    }
    Ok(())
}

/// What remains of each `source` feature once every overlapping `other` geometry is removed.
fn remainders(
    source: &FeatureTable,
    other: &FeatureTable,
) -> Result<Vec<(usize, Geometry<f64>)>, GisError> {
    let mut kept = Vec::new();
    for (index, feature) in source.features.iter().enumerate() {
        let Some(geometry) = &feature.geometry else { continue };
        let mut rest = geometry.clone();
        for cutter in other.features.iter().filter_map(|f| f.geometry.as_ref()) {
            if is_empty_geometry(&rest) {
                break;
            }
            if boxes_touch(&rest, cutter) && rest.intersects(cutter) {
                rest = ops::overlay(&rest, cutter, Overlay::Difference)?;
            }
        }
        if !is_empty_geometry(&rest) {
            kept.push((index, rest));
        }
    }
    Ok(kept)
}

pub fn overlay(
    left: &FeatureTable,
    right: &FeatureTable,
    how: OverlayHow,
) -> Result<FeatureTable, GisError> {
    if how == OverlayHow::Difference {
        let mut out = FeatureTable::new(left.columns.clone(), left.crs.clone());
        for (index, geometry) in remainders(left, right)? {
            out.push(Some(geometry), left.features[index].values.clone());
        }
        return Ok(out);
    }

    let columns = combine_columns(&left.columns, &right.columns, ("_1", "_2"));
    let mut out = FeatureTable::new(columns, left.crs.clone());
    if matches!(
        how,
        OverlayHow::Intersection | OverlayHow::Union | OverlayHow::Identity
    ) {
        intersections(left, right, &mut out)?;
    }
    if matches!(
        how,
        OverlayHow::Union | OverlayHow::Identity | OverlayHow::SymmetricDifference
    ) {
        for (index, geometry) in remainders(left, right)? {
            let mut values = left.features[index].values.clone();
            values.extend(nulls(right.columns.len()));
            out.push(Some(geometry), values);
        }
    }
    if matches!(how, OverlayHow::Union | OverlayHow::SymmetricDifference) {
        for (index, geometry) in remainders(right, left)? {
            let mut values = nulls(left.columns.len());
            values.extend(right.features[index].values.iter().cloned());
            out.push(Some(geometry), values);
        }
    }
    Ok(out)
}

/// Keep the part of every feature inside the union of `mask`.
pub fn clip(table: &FeatureTable, mask: &FeatureTable) -> Result<FeatureTable, GisError> {
    let mask_geometries: Vec<Geometry<f64>> = mask
        .features
        .iter()
        .filter_map(|f| f.geometry.clone())
        .collect();
    let mask_geometry = ops::unary_union_all(&mask_geometries)
        .map_err(|_| GisError::vector("the clip layer has no geometries"))?;

    let mut out = FeatureTable::new(table.columns.clone(), table.crs.clone());
    for feature in &table.features {
        let Some(geometry) = &feature.geometry else { continue };
        if !boxes_touch(geometry, &mask_geometry) || !geometry.intersects(&mask_geometry) {
            continue;
        }
        let clipped = ops::overlay(geometry, &mask_geometry, Overlay::Intersection)?;
        if !is_empty_geometry(&clipped) {
            out.push(Some(clipped), feature.values.clone());
        }
    }
    Ok(out)
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(f64::NAN)
            .total_cmp(&y.as_f64().unwrap_or(f64::NAN)),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Union geometries per value of `by` (or all together); other columns keep the first value.
pub fn dissolve(table: &FeatureTable, by: Option<&str>) -> Result<FeatureTable, GisError> {
    let by_index = by.map(|name| table.require_column(name)).transpose()?;

    // (key value, member rows), ordered by first appearance until sorted below
    let mut groups: Vec<(Value, Vec<usize>)> = Vec::new();
    for (row, feature) in table.features.iter().enumerate() {
        let key = match by_index {
            Some(index) => feature.values[index].clone(),
            None => Value::from(0),
        };
        let Some(wanted) = join_key(&key) else { continue };
        match groups
            .iter_mut()
            .find(|(existing, _)| join_key(existing).as_deref() == Some(wanted.as_str()))
        {
            Some((_, rows)) => rows.push(row),
            None => groups.push((key, vec![row])),
        }
    }
    groups.sort_by(|(a, _), (b, _)| compare_values(a, b));

    let other_columns: Vec<usize> = (0..table.columns.len())
        .filter(|index| Some(*index) != by_index)
        .collect();
    let mut columns: Vec<String> = by_index
        .map(|index| vec![table.columns[index].clone()])
        .unwrap_or_default();
    columns.extend(other_columns.iter().map(|&index| table.columns[index].clone()));

    let mut out = FeatureTable::new(columns, table.crs.clone());
    for (key, rows) in groups {
        let members: Vec<Geometry<f64>> = rows
            .iter()
            .filter_map(|&row| table.features[row].geometry.clone())
            .collect();
        let geometry = if members.is_empty() {
            None
        } else {
            Some(ops::unary_union_all(&members)?)
        };
        let first = &table.features[rows[0]];
        let mut values = Vec::with_capacity(other_columns.len() + 1);
        if by_index.is_some() {
            values.push(key);
        }
        values.extend(other_columns.iter().map(|&index| first.values[index].clone()));
        out.push(geometry, values);
    }
    Ok(out)
}

fn parts(geometry: &Geometry<f64>) -> Vec<Geometry<f64>> {
    match geometry {
        Geometry::MultiPoint(multi) => multi.0.iter().copied().map(Geometry::Point).collect(),
        Geometry::MultiLineString(multi) => {
            multi.0.iter().cloned().map(Geometry::LineString).collect()
        }
        Geometry::MultiPolygon(multi) => multi.0.iter().cloned().map(Geometry::Polygon).collect(),
        Geometry::GeometryCollection(collection) => collection.0.iter().flat_map(parts).collect(),
        single => vec![single.clone()],
    }
}

/// One row per single-part geometry; attributes are repeated.
pub fn explode(table: &FeatureTable) -> FeatureTable {
    let mut out = FeatureTable::new(table.columns.clone(), table.crs.clone());
    for feature in &table.features {
        match &feature.geometry {
            Some(geometry) => {
                for part in parts(geometry) {
                    out.push(Some(part), feature.values.clone());
                }
            }
            None => out.push(None, feature.values.clone()),
        }
    }
    out
}
