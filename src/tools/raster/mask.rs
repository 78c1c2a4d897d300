//! Masking raster pixels with vector shapes.

use geo::{BoundingRect, Geometry, Intersects, Point, Rect};

use crate::lib::errors::GisError;

use super::grid::{Raster, Window};

/// Pixel window covering world `bounds`, clipped to the raster; `None` when disjoint.
pub fn window_for_bounds(raster: &Raster, bounds: Rect<f64>) -> Result<Option<Window>, GisError> {
    let (min, max) = (bounds.min(), bounds.max());
    let mut cols = (f64::INFINITY, f64::NEG_INFINITY);
    let mut rows = (f64::INFINITY, f64::NEG_INFINITY);
    for (x, y) in [(min.x, min.y), (min.x, max.y), (max.x, min.y), (max.x, max.y)] {
        let (col, row) = raster.world_to_pixel(x, y)?;
        cols = (cols.0.min(col), cols.1.max(col));
        rows = (rows.0.min(row), rows.1.max(row));
    }
    let col_start = cols.0.floor().max(0.0);
    let row_start = rows.0.floor().max(0.0);
    let col_end = cols.1.ceil().min(raster.width as f64);
    let row_end = rows.1.ceil().min(raster.height as f64);
    if col_end <= col_start || row_end <= row_start {
        return Ok(None);
    }
    Ok(Some(Window {
        col: col_start as usize,
        row: row_start as usize,
        width: (col_end - col_start) as usize,
        height: (row_end - row_start) as usize,
    }))
}

/// Areal shapes take pixels whose centre they contain; others take pixels they touch.
fn covers(geometry: &Geometry<f64>, raster: &Raster, col: usize, row: usize) -> bool {
    match geometry {
        Geometry::Polygon(_)
        | Geometry::MultiPolygon(_)
        | Geometry::Rect(_)
        | Geometry::Triangle(_) => {
            let (x, y) = raster.pixel_center(col, row);
            geometry.intersects(&Point::new(x, y))
        }
        _ => {
            let (x0, y0) = raster.pixel_to_world(col as f64, row as f64);
            let (x1, y1) = raster.pixel_to_world(col as f64 + 1.0, row as f64 + 1.0);
            geometry.intersects(&Rect::new((x0, y0), (x1, y1)))
        }
    }
}

fn union_bounds(shapes: &[Geometry<f64>]) -> Option<Rect<f64>> {
    shapes
        .iter()
        .filter_map(|shape| shape.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
            )
        })
}

/// Crop to the shapes' extent and fill pixels outside every shape.
pub fn clip(raster: &Raster, shapes: &[Geometry<f64>]) -> Result<Raster, GisError> {
    let Some(bounds) = union_bounds(shapes) else {
        return Err(GisError::invalid_input("no geometries to clip with"));
    };
    let Some(window) = window_for_bounds(raster, bounds)? else {
        return Err(GisError::raster("Input shapes do not overlap raster."));
    };
    let mut out = raster.window(window);
    let fill = raster.fill_value();
    for row in 0..out.height {
        for col in 0..out.width {
            if shapes.iter().any(|shape| covers(shape, &out, col, row)) {
                continue;
            }
            let offset = row * out.width + col;
            for band in &mut out.bands {
                band[offset] = fill;
            }
        }
    }
    Ok(out)
}

/// Unmasked values of a band under `geometry`.
pub fn zone_values(
    raster: &Raster,
    band: &[f64],
    geometry: &Geometry<f64>,
) -> Result<Vec<f64>, GisError> {
    let Some(bounds) = geometry.bounding_rect() else {
        return Ok(Vec::new());
    };
    let Some(window) = window_for_bounds(raster, bounds)? else {
        return Ok(Vec::new());
    };
    let mut values = Vec::new();
    for row in window.row..window.row + window.height {
        for col in window.col..window.col + window.width {
            let value = raster.at(band, col, row);
            if !raster.is_masked(value) && covers(geometry, raster, col, row) {
                values.push(value);
            }
        }
    }
    Ok(values)
}
