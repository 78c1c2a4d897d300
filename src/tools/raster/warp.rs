//! Resampling, grid alignment and reprojection.

use crate::{
    lib::errors::GisError,
    tools::crs::{
        normalize_crs,
        projection::{crs_wkt, identify_crs},
        Transformer,
    },
};

use super::grid::Raster;

/// Points sampled along each edge when projecting the extent.
const EDGE_SAMPLES: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resampling {
    Nearest,
    Bilinear,
}

impl Resampling {
    pub fn parse(raw: &str) -> Result<Self, GisError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "nearest" => Ok(Self::Nearest),
            "bilinear" => Ok(Self::Bilinear),
            other => Err(GisError::invalid_input(format!(
                "unsupported resampling '{other}'; use nearest or bilinear"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
        }
    }

    fn sample(&self, raster: &Raster, band: &[f64], col: f64, row: f64) -> Option<f64> {
        match self {
            Self::Nearest => raster.sample_nearest(band, col, row),
            Self::Bilinear => raster.sample_bilinear(band, col, row),
        }
    }
}

/// Short CRS label of a raster, `None` when it has no CRS.
pub fn raster_crs(raster: &Raster) -> Option<String> {
    raster.has_crs().then(|| identify_crs(&raster.projection))
}

/// Resize by `factor`; the grid becomes floor(w·f) × floor(h·f) over the same extent.
pub fn resample(raster: &Raster, factor: f64, method: Resampling) -> Result<Raster, GisError> {
    if !(factor.is_finite() && factor > 0.0) {
        return Err(GisError::invalid_input("Scale factor must be positive."));
    }
    let width = (raster.width as f64 * factor).floor() as usize;
    let height = (raster.height as f64 * factor).floor() as usize;
    if width == 0 || height == 0 {
        return Err(GisError::invalid_input(
            "Resulting raster dimensions are zero. Check scale_factor.",
        ));
    }
    let sx = raster.width as f64 / width as f64;
    let sy = raster.height as f64 / height as f64;
    let bands = raster
        .bands
        .iter()
        .map(|band| {
            let mut out = Vec::with_capacity(width * height);
            for row in 0..height {
                for col in 0..width {
                    let src_col = (col as f64 + 0.5) * sx;
                    let src_row = (row as f64 + 0.5) * sy;
                    out.push(
                        method
                            .sample(raster, band, src_col, src_row)
                            .unwrap_or_else(|| raster.fill_value()),
                    );
                }
            }
            out
        })
        .collect();
    let mut geo_transform = raster.geo_transform;
    geo_transform[1] *= sx;
    geo_transform[2] *= sy;
    geo_transform[4] *= sx;
    geo_transform[5] *= sy;
    Ok(Raster {
        width,
        height,
        bands,
        geo_transform,
        ..raster.clone()
    })
}

/// Resample `source` onto the grid of `reference` by sampling at each target pixel centre.
fn warp_onto(
    source: &Raster,
    reference: &Raster,
    transformer: &Transformer,
    method: Resampling,
) -> Result<Raster, GisError> {
    let mut positions = Vec::with_capacity(reference.width * reference.height);
    for row in 0..reference.height {
        for col in 0..reference.width {
            let (x, y) = reference.pixel_center(col, row);
            let position = match transformer.convert(x, y) {
                Ok((sx, sy)) => Some(source.world_to_pixel(sx, sy)?),
                Err(_) => None,
            };
            positions.push(position);
        }
    }
    let bands = source
        .bands
        .iter()
        .map(|band| {
            positions
                .iter()
                .map(|position| {
                    position
                        .and_then(|(col, row)| method.sample(source, band, col, row))
                        .unwrap_or_else(|| source.fill_value())
                })
                .collect()
        })
        .collect();
    Ok(Raster {
        width: reference.width,
        height: reference.height,
        bands,
        geo_transform: reference.geo_transform,
        projection: reference.projection.clone(),
        nodata: source.nodata,
        dtype: source.dtype,
    })
}

/// Nearest-neighbour copy of `source` on the grid of `reference` when the two differ.
pub fn align_to(source: &Raster, reference: &Raster) -> Result<Raster, GisError> {
    let crs_pair = (raster_crs(reference), raster_crs(source));
    let same_crs = match &crs_pair {
        (Some(a), Some(b)) => a == b,
        _ => true,
    };
    if same_crs && source.same_grid(reference) {
        return Ok(source.clone());
    }
    tracing::debug!(
        target: "gis_mcp::tools",
        same_crs,
        "aligning raster onto the reference grid"
    );
    let transformer = match crs_pair {
        (Some(target), Some(own)) if !same_crs => Transformer::new(&target, &own)?,
        _ => Transformer::new("EPSG:4326", "EPSG:4326")?,
    };
    let mut aligned = warp_onto(source, reference, &transformer, Resampling::Nearest)?;
    if !reference.has_crs() {
        aligned.projection = source.projection.clone();
    }
    Ok(aligned)
}

/// Extent of `raster` in the target CRS, sampled along every edge.
fn projected_bounds(raster: &Raster, forward: &Transformer) -> Result<[f64; 4], GisError> {
    let mut bounds = [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
    let (w, h) = (raster.width as f64, raster.height as f64);
    for i in 0..EDGE_SAMPLES {
        let t = i as f64 / (EDGE_SAMPLES - 1) as f64;
        for (col, row) in [(t * w, 0.0), (t * w, h), (0.0, t * h), (w, t * h)] {
            let (x, y) = raster.pixel_to_world(col, row);
            if let Ok((tx, ty)) = forward.convert(x, y) {
                bounds[0] = bounds[0].min(tx);
                bounds[1] = bounds[1].min(ty);
                bounds[2] = bounds[2].max(tx);
                bounds[3] = bounds[3].max(ty);
            }
        }
    }
    if bounds.iter().all(|v| v.is_finite()) && bounds[0] < bounds[2] && bounds[1] < bounds[3] {
        Ok(bounds)
    } else {
        Err(GisError::crs(format!(
            "raster extent cannot be projected to {}",
            forward.target
        )))
    }
}

/// Reproject into `target_crs`, keeping the pixel count over the projected extent.
pub fn reproject(
    raster: &Raster,
    target_crs: &str,
    method: Resampling,
) -> Result<Raster, GisError> {
    let Some(source_crs) = raster_crs(raster) else {
        return Err(GisError::crs("Source raster has no CRS defined."));
    };
    let target = normalize_crs(target_crs)?;
    let forward = Transformer::new(&source_crs, &target)?;
    let inverse = Transformer::new(&target, &source_crs)?;
    let [left, bottom, right, top] = projected_bounds(raster, &forward)?;
    let grid = Raster {
        geo_transform: [
            left,
            (right - left) / raster.width as f64,
            0.0,
            top,
            0.0,
            -(top - bottom) / raster.height as f64,
        ],
        projection: crs_wkt(&target)?,
        ..raster.like(0, raster.dtype)
    };
    warp_onto(raster, &grid, &inverse, method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::raster::grid::tests::sample_raster;

    #[test]
    fn halving_keeps_extent_and_doubles_pixel_size() {
        let mut raster = sample_raster();
        raster.width = 4;
        raster.height = 2;
        raster.bands = vec![(0..8).map(f64::from).collect()];
        let out = resample(&raster, 0.5, Resampling::Nearest).expect("resample");
        assert_eq!((out.width, out.height), (2, 1));
        assert_eq!(out.geo_transform, [100.0, 20.0, 0.0, 50.0, 0.0, -20.0]);
        assert_eq!(out.bounds()[0], raster.bounds()[0]);
        assert_eq!(out.bounds()[2], raster.bounds()[2]);
        assert_eq!(out.bands[0], vec![5.0, 7.0]);
    }

    #[test]
    fn tiny_factors_are_rejected() {
        let raster = sample_raster();
        assert!(matches!(
            resample(&raster, 0.0, Resampling::Nearest),
            Err(GisError::InvalidInput { .. })
        ));
        assert!(matches!(
            resample(&raster, 0.1, Resampling::Bilinear),
            Err(GisError::InvalidInput { .. })
        ));
        assert!(Resampling::parse("cubic").is_err());
    }

    #[test]
    fn matching_grids_are_not_resampled() {
        let raster = sample_raster();
        let aligned = align_to(&raster, &raster).expect("aligns");
        assert_eq!(aligned, raster);
    }

    #[test]
    fn shifted_grids_take_the_nearest_source_pixel() {
        let reference = sample_raster();
        let mut shifted = sample_raster();
        shifted.geo_transform[0] = 110.0;
        let aligned = align_to(&shifted, &reference).expect("aligns");
        assert!(aligned.same_grid(&reference));
        // The first column now lies outside the shifted raster.
        assert_eq!(aligned.bands[0][0], 0.0);
        assert_eq!(aligned.bands[0][1], 0.0);
        assert_eq!(aligned.bands[0][2], 1.0);
    }

    #[test]
    fn rasters_without_crs_cannot_be_reprojected() {
        let err = reproject(&sample_raster(), "EPSG:3857", Resampling::Nearest)
            .expect_err("no crs");
        assert!(matches!(err, GisError::Crs { .. }));
    }
}
