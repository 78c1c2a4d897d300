//! Density-based clustering of point coordinates.

use rstar::{primitives::GeomWithData, RTree};

use crate::lib::errors::GisError;

pub const NOISE: i64 = -1;

#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Cluster per point, `-1` for noise.
    pub labels: Vec<i64>,
    pub core_sample_indices: Vec<usize>,
    /// Coordinates of the core samples.
    pub components: Vec<[f64; 2]>,
}

/// DBSCAN: a point is core when at least `min_samples` points, itself included,
/// lie within `eps`. Clusters are numbered in order of their first core point.
pub fn dbscan(points: &[[f64; 2]], eps: f64, min_samples: usize) -> Result<Clustering, GisError> {
    if !(eps.is_finite() && eps > 0.0) {
        return Err(GisError::invalid_input("eps must be a positive number"));
    }
    if min_samples == 0 {
        return Err(GisError::invalid_input("min_samples must be at least 1"));
    }
    let tree: RTree<GeomWithData<[f64; 2], usize>> = RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(row, point)| GeomWithData::new(*point, row))
            .collect(),
    );
    let neighbourhoods: Vec<Vec<usize>> = points
        .iter()
        .map(|point| {
            let mut rows: Vec<usize> = tree
                .locate_within_distance(*point, eps * eps)
                .map(|candidate| candidate.data)
                .collect();
            rows.sort_unstable();
            rows
        })
        .collect();
    let core: Vec<bool> = neighbourhoods
        .iter()
        .map(|rows| rows.len() >= min_samples)
        .collect();

    let mut labels = vec![NOISE; points.len()];
    let mut next = 0;
    for start in 0..points.len() {
        if !core[start] || labels[start] != NOISE {
            continue;
        }
        labels[start] = next;
        let mut stack = vec![start];
        while let Some(row) = stack.pop() {
            for &neighbour in &neighbourhoods[row] {
                if labels[neighbour] != NOISE {
                    continue;
                }
                labels[neighbour] = next;
                if core[neighbour] {
                    stack.push(neighbour);
                }
            }
        }
        next += 1;
    }

    let core_sample_indices: Vec<usize> = (0..points.len()).filter(|&row| core[row]).collect();
    let components = core_sample_indices.iter().map(|&row| points[row]).collect();
    Ok(Clustering {
        labels,
        core_sample_indices,
        components,
    })
}
