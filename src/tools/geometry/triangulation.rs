//! Delaunay triangles and Voronoi cells of a geometry's vertices.

use geo::{BoundingRect, Coord, CoordsIter, Geometry, LineString, Polygon};
use spade::{DelaunayTriangulation, Point2, Triangulation};

use crate::lib::errors::GisError;

fn distinct_vertices(geometry: &Geometry<f64>) -> Vec<Point2<f64>> {
    let mut coords: Vec<Coord<f64>> = geometry.coords_iter().collect();
    coords.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    coords.dedup();
    coords.into_iter().map(|c| Point2::new(c.x, c.y)).collect()
}

fn triangulate_vertices(
    vertices: Vec<Point2<f64>>,
) -> Result<DelaunayTriangulation<Point2<f64>>, GisError> {
    DelaunayTriangulation::<Point2<f64>>::bulk_load(vertices)
        .map_err(|err| GisError::invalid_geometry(format!("cannot triangulate vertices: {err:?}")))
}

/// Delaunay triangles over the distinct vertices of `geometry`.
pub fn delaunay_triangles(geometry: &Geometry<f64>) -> Result<Vec<Polygon<f64>>, GisError> {
    let triangulation = triangulate_vertices(distinct_vertices(geometry))?;
    Ok(triangulation
        .inner_faces()
        .map(|face| {
            let [a, b, c] = face.vertices().map(|vertex| {
                let position = vertex.position();
                Coord {
                    x: position.x,
                    y: position.y,
                }
            });
            Polygon::new(LineString::from(vec![a, b, c, a]), Vec::new())
        })
        .collect())
}

/// Voronoi cells clipped to the envelope grown by its larger side on every edge.
pub fn voronoi_cells(geometry: &Geometry<f64>) -> Result<Vec<Polygon<f64>>, GisError> {
    let vertices = distinct_vertices(geometry);
    if vertices.len() < 2 {
        return Err(GisError::invalid_input(
            "voronoi needs at least two distinct vertices",
        ));
    }
    let rect = geometry
        .bounding_rect()
        .ok_or_else(|| GisError::invalid_input("voronoi needs a non-empty geometry"))?;
    let margin = rect.width().max(rect.height());
    let (min, max) = (rect.min(), rect.max());
    let frame = vec![
        Coord { x: min.x - margin, y: min.y - margin },
        Coord { x: max.x + margin, y: min.y - margin },
        Coord { x: max.x + margin, y: max.y + margin },
        Coord { x: min.x - margin, y: max.y + margin },
    ];

    let triangulation = triangulate_vertices(vertices)?;
    let mut cells = Vec::new();
    for vertex in triangulation.vertices() {
        let site = vertex.position();
        let mut cell = frame.clone();
        for edge in vertex.out_edges() {
            let neighbour = edge.to().position();
            cell = clip_half_plane(
                &cell,
                Coord { x: site.x, y: site.y },
                Coord {
                    x: neighbour.x,
                    y: neighbour.y,
                },
            );
            if cell.is_empty() {
                break;
            }
        }
        if cell.len() >= 3 {
            let mut ring = cell;
            ring.push(ring[0]);
            cells.push(Polygon::new(LineString::from(ring), Vec::new()));
        }
    }
    Ok(cells)
}

/// Keep the part of a convex polygon nearer to `site` than to `other`.
fn clip_half_plane(polygon: &[Coord<f64>], site: Coord<f64>, other: Coord<f64>) -> Vec<Coord<f64>> {
    let normal = Coord {
        x: other.x - site.x,
        y: other.y - site.y,
    };
    let mid = Coord {
        x: (site.x + other.x) / 2.0,
        y: (site.y + other.y) / 2.0,
    };
    let side = |p: Coord<f64>| (p.x - mid.x) * normal.x + (p.y - mid.y) * normal.y;

    let mut out = Vec::with_capacity(polygon.len() + 1);
    for (index, current) in polygon.iter().enumerate() {
        let next = polygon[(index + 1) % polygon.len()];
        let (a, b) = (side(*current), side(next));
        if a <= 0.0 {
            out.push(*current);
        }
        if (a < 0.0 && b > 0.0) || (a > 0.0 && b < 0.0) {
            let t = a / (a - b);
            out.push(Coord {
                x: current.x + t * (next.x - current.x),
                y: current.y + t * (next.y - current.y),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use geo::{Area, MultiPoint};

    use super::*;

    fn square_corners() -> Geometry<f64> {
        Geometry::MultiPoint(MultiPoint::from(vec![
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
        ]))
    }

    #[test]
    fn square_splits_into_two_triangles() {
        let triangles = delaunay_triangles(&square_corners()).expect("triangulates");
        assert_eq!(triangles.len(), 2);
        let total: f64 = triangles.iter().map(|t| t.unsigned_area()).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn collinear_points_have_no_triangles() {
        let line = Geometry::LineString(LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]));
        assert!(delaunay_triangles(&line).expect("triangulates").is_empty());
    }

    #[test]
    fn voronoi_cells_tile_the_frame() {
        let cells = voronoi_cells(&square_corners()).expect("voronoi");
        assert_eq!(cells.len(), 4);
        // Frame is the unit square grown by 1 on every side.
        let total: f64 = cells.iter().map(|c| c.unsigned_area()).sum();
        assert!((total - 9.0).abs() < 1e-9);
    }

    #[test]
    fn single_point_voronoi_is_rejected() {
        let point = Geometry::Point(geo::Point::new(0.0, 0.0));
        assert!(voronoi_cells(&point).is_err());
    }
}
