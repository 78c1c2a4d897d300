//! Spatial weights: neighbour lists with one weight per link.

use std::collections::{BTreeSet, HashMap};

use geo::{Centroid, CoordsIter, Geometry, Line, LinesIter};
use rstar::{primitives::GeomWithData, RTree};
use serde_json::{json, Map, Value};

use crate::{
    lib::errors::GisError,
    tools::vector::{table::number, FeatureTable},
};

const PREVIEW_IDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contiguity {
    Queen,
    Rook,
}

impl Contiguity {
    pub fn parse(raw: &str) -> Result<Self, GisError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queen" => Ok(Self::Queen),
            "rook" => Ok(Self::Rook),
            other => Err(GisError::invalid_input(format!(
                "Unsupported contiguity: {other}. Use 'queen' or 'rook'."
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Queen => "queen",
            Self::Rook => "rook",
        }
    }
}

/// Weight transformations, named by their one-letter codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Weights as built.
    Original,
    Binary,
    /// Each row sums to one.
    Row,
    /// Every weight divided by the total.
    Double,
    /// Variance stabilizing.
    Variance,
}

impl Transform {
    pub fn parse(raw: &str) -> Result<Self, GisError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "o" => Ok(Self::Original),
            "b" => Ok(Self::Binary),
            "r" => Ok(Self::Row),
            "d" => Ok(Self::Double),
            "v" => Ok(Self::Variance),
            other => Err(GisError::invalid_input(format!(
                "Invalid transform type: {other}"
            ))),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Original => "o",
            Self::Binary => "b",
            Self::Row => "r",
            Self::Double => "d",
            Self::Variance => "v",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    /// Observation ids in row order.
    pub ids: Vec<Value>,
    /// Neighbour row indices per observation, ascending.
    pub neighbors: Vec<Vec<usize>>,
    /// Current weights, parallel to `neighbors`.
    pub weights: Vec<Vec<f64>>,
    original: Vec<Vec<f64>>,
    transform: Transform,
}

impl Weights {
    pub fn new(
        ids: Vec<Value>,
        neighbors: Vec<Vec<usize>>,
        weights: Vec<Vec<f64>>,
    ) -> Result<Self, GisError> {
        let n = ids.len();
        if neighbors.len() != n || weights.len() != n {
            return Err(GisError::statistics(
                "ids, neighbours and weights differ in length",
            ));
        }
        for (row, (links, values)) in neighbors.iter().zip(&weights).enumerate() {
            if links.len() != values.len() {
                return Err(GisError::statistics(format!(
                    "observation {row} has {} neighbours but {} weights",
                    links.len(),
                    values.len()
                )));
            }
            if let Some(bad) = links.iter().find(|&&j| j >= n) {
                return Err(GisError::statistics(format!(
                    "observation {row} links to unknown row {bad}"
                )));
            }
        }
        Ok(Self {
            ids,
            neighbors,
            original: weights.clone(),
            weights,
            transform: Transform::Original,
        })
    }

    /// Binary weights from neighbour lists.
    pub fn binary(ids: Vec<Value>, neighbors: Vec<Vec<usize>>) -> Result<Self, GisError> {
        let weights = neighbors.iter().map(|links| vec![1.0; links.len()]).collect();
        Self::new(ids, neighbors, weights)
    }

    pub fn n(&self) -> usize {
        self.ids.len()
    }

    pub fn cardinality(&self, row: usize) -> usize {
        self.neighbors[row].len()
    }

    /// Rows without neighbours.
    pub fn islands(&self) -> Vec<usize> {
        (0..self.n()).filter(|&row| self.neighbors[row].is_empty()).collect()
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Sum of all weights.
    pub fn s0(&self) -> f64 {
        self.weights.iter().flatten().sum()
    }

    /// Recompute the weights from the originals.
    pub fn set_transform(&mut self, transform: Transform) {
        self.weights = match transform {
            Transform::Original => self.original.clone(),
            Transform::Binary => self
                .original
                .iter()
                .map(|row| vec![1.0; row.len()])
                .collect(),
            Transform::Row => self
                .original
                .iter()
                .map(|row| {
                    let total: f64 = row.iter().sum();
                    if total == 0.0 {
                        row.clone()
                    } else {
                        row.iter().map(|w| w / total).collect()
                    }
                })
                .collect(),
            Transform::Double => {
                let total: f64 = self.original.iter().flatten().sum();
                self.original
                    .iter()
                    .map(|row| {
                        if total == 0.0 {
                            row.clone()
                        } else {
                            row.iter().map(|w| w / total).collect()
                        }
                    })
                    .collect()
            }
            Transform::Variance => {
                let scaled: Vec<Vec<f64>> = self
                    .original
                    .iter()
                    .map(|row| {
                        let q = row.iter().map(|w| w * w).sum::<f64>().sqrt();
                        if q == 0.0 {
                            row.clone()
                        } else {
                            row.iter().map(|w| w / q).collect()
                        }
                    })
                    .collect();
                let total: f64 = scaled.iter().flatten().sum();
                let factor = if total == 0.0 {
                    1.0
                } else {
                    self.n() as f64 / total
                };
                scaled
                    .into_iter()
                    .map(|row| row.into_iter().map(|w| w * factor).collect())
                    .collect()
            }
        };
        self.transform = transform;
    }

    /// Spatial lag `W·y`.
    pub fn lag(&self, values: &[f64]) -> Vec<f64> {
        self.neighbors
            .iter()
            .zip(&self.weights)
            .map(|(links, weights)| {
                links
                    .iter()
                    .zip(weights)
                    .map(|(&j, w)| w * values[j])
                    .sum()
            })
            .collect()
    }

    /// `Wᵀ·y`.
    pub fn lag_transposed(&self, values: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.n()];
        for (i, (links, weights)) in self.neighbors.iter().zip(&self.weights).enumerate() {
            for (&j, w) in links.iter().zip(weights) {
                out[j] += w * values[i];
            }
        }
        out
    }

    /// Weight of the link `i → j`, zero when absent.
    pub fn weight(&self, i: usize, j: usize) -> f64 {
        self.neighbors[i]
            .iter()
            .position(|&k| k == j)
            .map_or(0.0, |pos| self.weights[i][pos])
    }

    /// `tr(WᵀW + WW)`.
    pub fn trace_wtw_ww(&self) -> f64 {
        let mut total = 0.0;
        for (i, (links, weights)) in self.neighbors.iter().zip(&self.weights).enumerate() {
            for (&j, w) in links.iter().zip(weights) {
                total += w * w + w * self.weight(j, i);
            }
        }
        total
    }

    /// Weights restricted to `keep`, with rows renumbered.
    pub fn subset(&self, keep: &[usize]) -> Result<Self, GisError> {
        let position: HashMap<usize, usize> =
            keep.iter().enumerate().map(|(new, &old)| (old, new)).collect();
        let mut neighbors = Vec::with_capacity(keep.len());
        let mut weights = Vec::with_capacity(keep.len());
        for &old in keep {
            let (links, values): (Vec<usize>, Vec<f64>) = self.neighbors[old]
                .iter()
                .zip(&self.original[old])
                .filter_map(|(j, w)| position.get(j).map(|&new| (new, *w)))
                .unzip();
            neighbors.push(links);
            weights.push(values);
        }
        let ids = keep.iter().map(|&old| self.ids[old].clone()).collect();
        let mut out = Self::new(ids, neighbors, weights)?;
        out.set_transform(self.transform);
        Ok(out)
    }

    /// Summary shared by every weights tool.
    pub fn describe(&self) -> Map<String, Value> {
        let counts: Vec<usize> = (0..self.n()).map(|row| self.cardinality(row)).collect();
        let mean = if counts.is_empty() {
            0.0
        } else {
            counts.iter().sum::<usize>() as f64 / counts.len() as f64
        };
        let mut neighbors_preview = Map::new();
        let mut weights_preview = Map::new();
        for row in 0..self.n().min(PREVIEW_IDS) {
            let key = id_label(&self.ids[row]);
            neighbors_preview.insert(
                key.clone(),
                Value::Array(
                    self.neighbors[row]
                        .iter()
                        .map(|&j| self.ids[j].clone())
                        .collect(),
                ),
            );
            weights_preview.insert(
                key,
                Value::Array(self.weights[row].iter().map(|&w| number(w)).collect()),
            );
        }
        let mut info = Map::new();
        info.insert("n".into(), json!(self.n()));
        info.insert("id_count".into(), json!(self.ids.len()));
        info.insert(
            "neighbors_stats".into(),
            json!({
                "min": counts.iter().min().copied().unwrap_or(0),
                "max": counts.iter().max().copied().unwrap_or(0),
                "mean": mean,
            }),
        );
        info.insert(
            "islands".into(),
            Value::Array(
                self.islands()
                    .into_iter()
                    .map(|row| self.ids[row].clone())
                    .collect(),
            ),
        );
        info.insert("neighbors_preview".into(), Value::Object(neighbors_preview));
        info.insert("weights_preview".into(), Value::Object(weights_preview));
        info
    }
}

/// Printable form of an observation id.
pub fn id_label(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Row ids: the values of `id_field`, or 0..n.
pub fn table_ids(table: &FeatureTable, id_field: Option<&str>) -> Result<Vec<Value>, GisError> {
    match id_field.filter(|field| !field.trim().is_empty()) {
        Some(field) => {
            let column = table.require_column(field)?;
            let ids: Vec<Value> = table
                .features
                .iter()
                .map(|feature| feature.values[column].clone())
                .collect();
            let unique: BTreeSet<String> = ids.iter().map(id_label).collect();
            if unique.len() != ids.len() {
                return Err(GisError::invalid_input(format!(
                    "id_field '{field}' has duplicate values"
                )));
            }
            Ok(ids)
        }
        None => Ok((0..table.len()).map(Value::from).collect()),
    }
}

/// A point per row: the point itself, otherwise the centroid.
pub fn representative_points(table: &FeatureTable) -> Result<Vec<[f64; 2]>, GisError> {
    table
        .geometries()?
        .into_iter()
        .enumerate()
        .map(|(row, geometry)| match geometry {
            Geometry::Point(point) => Ok([point.x(), point.y()]),
            other => other
                .centroid()
                .map(|point| [point.x(), point.y()])
                .ok_or_else(|| {
                    GisError::invalid_geometry(format!("row {row} has an empty geometry"))
                }),
        })
        .collect()
}

fn vertex_key(x: f64, y: f64) -> (u64, u64) {
    // -0.0 and 0.0 must share a key.
    ((x + 0.0).to_bits(), (y + 0.0).to_bits())
}

/// Polygons sharing a vertex (queen) or an edge (rook).
pub fn contiguity(
    geometries: &[&Geometry<f64>],
    kind: Contiguity,
    ids: Vec<Value>,
) -> Result<Weights, GisError> {
    let mut owners: HashMap<((u64, u64), (u64, u64)), Vec<usize>> = HashMap::new();
    for (row, geometry) in geometries.iter().enumerate() {
        if !matches!(geometry, Geometry::Polygon(_) | Geometry::MultiPolygon(_)) {
            return Err(GisError::unsupported_geometry(format!(
                "{} contiguity needs polygons; row {row} is not a polygon",
                kind.name()
            )));
        }
        let mut keys = BTreeSet::new();
        match kind {
            Contiguity::Queen => {
                for coord in geometry.coords_iter() {
                    let key = vertex_key(coord.x, coord.y);
                    keys.insert((key, key));
                }
            }
            Contiguity::Rook => {
                let lines: Vec<Line<f64>> = match geometry {
                    Geometry::Polygon(polygon) => polygon.lines_iter().collect(),
                    Geometry::MultiPolygon(polygons) => polygons.lines_iter().collect(),
                    _ => Vec::new(),
                };
                for line in lines {
                    let a = vertex_key(line.start.x, line.start.y);
                    let b = vertex_key(line.end.x, line.end.y);
                    if a != b {
                        keys.insert((a.min(b), a.max(b)));
                    }
                }
            }
        }
        for key in keys {
            owners.entry(key).or_default().push(row);
        }
    }
    let mut sets = vec![BTreeSet::new(); geometries.len()];
    for rows in owners.values() {
        for &a in rows {
            for &b in rows {
                if a != b {
                    sets[a].insert(b);
                }
            }
        }
    }
    Weights::binary(ids, sets.into_iter().map(|set| set.into_iter().collect()).collect())
}

fn point_tree(points: &[[f64; 2]]) -> RTree<GeomWithData<[f64; 2], usize>> {
    RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(row, point)| GeomWithData::new(*point, row))
            .collect(),
    )
}

/// Neighbours within `threshold`; inverse distance unless `binary`. Coincident points are not
/// linked.
pub fn distance_band(
    points: &[[f64; 2]],
    threshold: f64,
    binary: bool,
    ids: Vec<Value>,
) -> Result<Weights, GisError> {
    if !(threshold.is_finite() && threshold > 0.0) {
        return Err(GisError::invalid_input(
            "distance threshold must be a positive number",
        ));
    }
    let tree = point_tree(points);
    let mut neighbors = Vec::with_capacity(points.len());
    let mut weights = Vec::with_capacity(points.len());
    for (row, point) in points.iter().enumerate() {
        let mut links: Vec<(usize, f64)> = tree
            .locate_within_distance(*point, threshold * threshold)
            .filter(|candidate| candidate.data != row)
            .map(|candidate| {
                let [x, y] = *candidate.geom();
                (candidate.data, (x - point[0]).hypot(y - point[1]))
            })
            .filter(|(_, distance)| *distance > 0.0)
            .collect();
        links.sort_by_key(|(j, _)| *j);
        neighbors.push(links.iter().map(|(j, _)| *j).collect());
        weights.push(
            links
                .iter()
                .map(|(_, d)| if binary { 1.0 } else { 1.0 / d })
                .collect(),
        );
    }
    Weights::new(ids, neighbors, weights)
}

/// The `k` nearest other points; ties resolve to the lower row.
pub fn knn(points: &[[f64; 2]], k: usize, ids: Vec<Value>) -> Result<Weights, GisError> {
    if k == 0 {
        return Err(GisError::invalid_input("k must be at least 1"));
    }
    if k >= points.len() {
        return Err(GisError::invalid_input(format!(
            "k must be smaller than the number of observations ({})",
            points.len()
        )));
    }
    let tree = point_tree(points);
    let mut neighbors = Vec::with_capacity(points.len());
    for (row, point) in points.iter().enumerate() {
        let mut found: Vec<(f64, usize)> = Vec::with_capacity(k + 1);
        for (candidate, d2) in tree.nearest_neighbor_iter_with_distance_2(point) {
            if candidate.data == row {
                continue;
            }
            if found.len() >= k && d2 > found[k - 1].0 {
                break;
            }
            found.push((d2, candidate.data));
        }
        found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        found.truncate(k);
        let mut links: Vec<usize> = found.into_iter().map(|(_, j)| j).collect();
        links.sort_unstable();
        neighbors.push(links);
    }
    Weights::binary(ids, neighbors)
}

#[cfg(test)]
pub(crate) mod tests {
    use geo::polygon;

    use super::*;

    /// 3×3 unit squares, row-major from the bottom left.
    pub(crate) fn grid_polygons() -> Vec<Geometry<f64>> {
        let mut cells = Vec::new();
        for row in 0..3 {
            for col in 0..3 {
                let (x, y) = (col as f64, row as f64);
                cells.push(
                    polygon![
                        (x: x, y: y),
                        (x: x + 1.0, y: y),
                        (x: x + 1.0, y: y + 1.0),
                        (x: x, y: y + 1.0),
                    ]
                    .into(),
                );
            }
        }
        cells
    }

    fn default_ids(n: usize) -> Vec<Value> {
        (0..n).map(Value::from).collect()
    }

    #[test]
    fn queen_links_corners_and_rook_does_not() {
        let cells = grid_polygons();
        let refs: Vec<&Geometry<f64>> = cells.iter().collect();
        let queen = contiguity(&refs, Contiguity::Queen, default_ids(9)).expect("queen");
        let rook = contiguity(&refs, Contiguity::Rook, default_ids(9)).expect("rook");
        assert_eq!(queen.neighbors[4], vec![0, 1, 2, 3, 5, 6, 7, 8]);
        assert_eq!(rook.neighbors[4], vec![1, 3, 5, 7]);
        assert_eq!(queen.neighbors[0], vec![1, 3, 4]);
        assert_eq!(rook.neighbors[0], vec![1, 3]);
    }

    #[test]
    fn distance_band_weights_by_inverse_distance() {
        let points = [[0.0, 0.0], [1.0, 0.0], [3.0, 0.0], [10.0, 0.0]];
        let w = distance_band(&points, 2.5, false, default_ids(4)).expect("band");
        assert_eq!(w.neighbors[0], vec![1]);
        assert_eq!(w.neighbors[1], vec![0, 2]);
        assert_eq!(w.weights[1], vec![1.0, 0.5]);
        assert_eq!(w.islands(), vec![3]);
    }

    #[test]
    fn knn_breaks_ties_towards_lower_rows() {
        let points = [[0.0, 0.0], [1.0, 0.0], [-1.0, 0.0], [5.0, 0.0]];
        let w = knn(&points, 1, default_ids(4)).expect("knn");
        assert_eq!(w.neighbors[0], vec![1]);
        assert_eq!(w.neighbors[3], vec![1]);
        assert!(knn(&points, 4, default_ids(4)).is_err());
    }

    #[test]
    fn transforms_are_recomputed_from_the_original_weights() {
        let points = [[0.0, 0.0], [1.0, 0.0], [3.0, 0.0]];
        let mut w = distance_band(&points, 2.5, false, default_ids(3)).expect("band");
        w.set_transform(Transform::Row);
        let sums: Vec<f64> = w.weights.iter().map(|row| row.iter().sum()).collect();
        for sum in sums {
            assert!((sum - 1.0).abs() < 1e-12);
        }
        w.set_transform(Transform::Binary);
        assert_eq!(w.weights[1], vec![1.0, 1.0]);
        w.set_transform(Transform::Double);
        assert!((w.s0() - 1.0).abs() < 1e-12);
        w.set_transform(Transform::Variance);
        assert!((w.s0() - 3.0).abs() < 1e-12);
        w.set_transform(Transform::Original);
        assert_eq!(w.weights[1], vec![1.0, 0.5]);
    }

    #[test]
    fn describe_previews_by_id() {
        let cells = grid_polygons();
        let refs: Vec<&Geometry<f64>> = cells.iter().collect();
        let ids: Vec<Value> = (0..9).map(|i| Value::from(format!("c{i}"))).collect();
        let w = contiguity(&refs, Contiguity::Rook, ids).expect("rook");
        let info = w.describe();
        assert_eq!(info["n"], json!(9));
        assert_eq!(info["neighbors_stats"]["min"], json!(2));
        assert_eq!(info["neighbors_stats"]["max"], json!(4));
        assert_eq!(info["neighbors_preview"]["c0"], json!(["c1", "c3"]));
        assert_eq!(info["islands"], json!([]));
    }

    #[test]
    fn subsets_renumber_rows() {
        let points = [[0.0, 0.0], [1.0, 0.0], [50.0, 0.0], [2.0, 0.0]];
        let w = distance_band(&points, 1.5, true, default_ids(4)).expect("band");
        let kept = w.subset(&[0, 1, 3]).expect("subset");
        assert_eq!(kept.neighbors, vec![vec![1], vec![0, 2], vec![1]]);
        assert_eq!(kept.ids, vec![json!(0), json!(1), json!(3)]);
    }
}
