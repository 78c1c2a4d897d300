//! Per-pixel and neighbourhood computations on in-memory grids.

use std::collections::BTreeMap;

use crate::lib::errors::GisError;

use super::grid::{DataType, Raster};

const NDVI_EPSILON: f64 = 1e-6;
const WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

/// Min, max, mean and population standard deviation; `None` when there are no values.
pub fn summarize(values: &[f64]) -> Option<Summary> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(Summary {
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        mean,
        std: variance.sqrt(),
    })
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Equal-width histogram over the value range; returns counts and `bins + 1` edges.
pub fn histogram(values: &[f64], bins: usize) -> Result<(Vec<u64>, Vec<f64>), GisError> {
    if bins == 0 {
        return Err(GisError::invalid_input("bins must be at least 1"));
    }
    let (mut low, mut high) = match summarize(values) {
        Some(summary) => (summary.min, summary.max),
        None => (0.0, 1.0),
    };
    if low == high {
        low -= 0.5;
        high += 0.5;
    }
    let step = (high - low) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|i| low + step * i as f64).collect();
    let mut counts = vec![0u64; bins];
    for value in values {
        let slot = (((value - low) / (high - low)) * bins as f64).floor() as usize;
        counts[slot.min(bins - 1)] += 1;
    }
    Ok((counts, edges))
}

/// `(nir - red) / (nir + red + 1e-6)` as float32.
pub fn ndvi(raster: &Raster, red_index: usize, nir_index: usize) -> Result<Raster, GisError> {
    let red = raster.band(red_index)?;
    let nir = raster.band(nir_index)?;
    let data = red
        .iter()
        .zip(nir)
        .map(|(r, n)| ((n - r) / (n + r + NDVI_EPSILON)) as f32 as f64)
        .collect();
    let mut out = raster.with_band(data, DataType::Float32);
    out.nodata = None;
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algebra {
    Add,
    Subtract,
}

impl Algebra {
    pub fn parse(raw: &str) -> Result<Self, GisError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(Self::Add),
            "subtract" => Ok(Self::Subtract),
            _ => Err(GisError::invalid_input(
                "Invalid operation. Use 'add' or 'subtract'.",
            )),
        }
    }

    pub fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
        }
    }
}

/// Combine two bands of equal length as float32 on the grid of `reference`.
pub fn band_algebra(reference: &Raster, a: &[f64], b: &[f64], op: Algebra) -> Raster {
    let data = a
        .iter()
        .zip(b)
        .map(|(x, y)| op.apply(*x, *y) as f32 as f64)
        .collect();
    reference.with_band(data, DataType::Float32)
}

/// Sum of bands scaled by `weights`; one weight per band, summing to one.
pub fn weighted_sum(raster: &Raster, weights: &[f64]) -> Result<Raster, GisError> {
    if weights.len() != raster.band_count() {
        return Err(GisError::invalid_input(format!(
            "Number of weights ({}) does not match number of bands ({}).",
            weights.len(),
            raster.band_count()
        )));
    }
    let total: f64 = weights.iter().sum();
    if (total - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(GisError::invalid_input("Sum of weights must be 1.0."));
    }
    let mut data = vec![0.0f32; raster.width * raster.height];
    for (band, weight) in raster.bands.iter().zip(weights) {
        for (acc, value) in data.iter_mut().zip(band) {
            *acc += (*weight * value) as f32;
        }
    }
    Ok(raster.with_band(
        data.into_iter().map(f64::from).collect(),
        DataType::Float32,
    ))
}

/// Parse `{ "from": to }` pairs; keys must be numbers.
pub fn parse_reclass_map(map: &BTreeMap<String, f64>) -> Result<Vec<(f64, f64)>, GisError> {
    if map.is_empty() {
        return Err(GisError::invalid_input("reclass_map must not be empty"));
    }
    map.iter()
        .map(|(from, to)| {
            from.trim()
                .parse::<f64>()
                .map(|from| (from, *to))
                .map_err(|_| {
                    GisError::invalid_input(format!("reclass key '{from}' is not a number"))
                })
        })
        .collect()
}

/// Replace exact matches in the first band; other pixels keep their value.
pub fn reclassify(raster: &Raster, pairs: &[(f64, f64)]) -> Result<Raster, GisError> {
    let band = raster.band(1)?;
    let data = band
        .iter()
        .map(|value| {
            pairs
                .iter()
                .find(|(from, _)| from == value)
                .map(|(_, to)| *to)
                .unwrap_or(*value)
        })
        .collect();
    Ok(raster.with_band(data, raster.dtype))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocalStatistic {
    Mean,
    Min,
    Max,
    Std,
    Median,
}

impl FocalStatistic {
    pub fn parse(raw: &str) -> Result<Self, GisError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "std" => Ok(Self::Std),
            "median" => Ok(Self::Median),
            other => Err(GisError::invalid_input(format!(
                "Unsupported statistic: {other}"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
            Self::Std => "std",
            Self::Median => "median",
        }
    }

    fn reduce(&self, window: &[f64]) -> f64 {
        match self {
            Self::Median => median(window).unwrap_or(f64::NAN),
            _ => match summarize(window) {
                Some(summary) => match self {
                    Self::Mean => summary.mean,
                    Self::Min => summary.min,
                    Self::Max => summary.max,
                    _ => summary.std,
                },
                None => f64::NAN,
            },
        }
    }
}

/// Moving-window statistic over the first band; edges repeat the nearest pixel.
pub fn focal(raster: &Raster, statistic: FocalStatistic, size: usize) -> Result<Raster, GisError> {
    if size == 0 {
        return Err(GisError::invalid_input("size must be at least 1"));
    }
    let band = raster.band(1)?;
    let (width, height) = (raster.width as isize, raster.height as isize);
    // Even windows lean towards the top-left, like a centred filter with origin zero.
    let before = (size / 2) as isize;
    let after = size as isize - before - 1;
    let mut window = Vec::with_capacity(size * size);
    let mut data = Vec::with_capacity(band.len());
    for row in 0..height {
        for col in 0..width {
            window.clear();
            for dr in -before..=after {
                let r = (row + dr).clamp(0, height - 1) as usize;
                for dc in -before..=after {
                    let c = (col + dc).clamp(0, width - 1) as usize;
                    window.push(band[r * raster.width + c]);
                }
            }
            data.push(statistic.reduce(&window));
        }
    }
    Ok(raster.with_band(data, raster.dtype))
}

/// Central differences inside, one-sided at the edges, scaled by `spacing`.
fn gradient_1d(values: &[f64], spacing: f64, out: &mut [f64]) {
    let n = values.len();
    if n < 2 {
        out.iter_mut().for_each(|v| *v = 0.0);
        return;
    }
    out[0] = (values[1] - values[0]) / spacing;
    out[n - 1] = (values[n - 1] - values[n - 2]) / spacing;
    for i in 1..n - 1 {
        out[i] = (values[i + 1] - values[i - 1]) / (2.0 * spacing);
    }
}

/// Shaded relief of the first band as uint8 in 0..=255.
pub fn hillshade(raster: &Raster, azimuth: f64, altitude: f64) -> Result<Raster, GisError> {
    let elevation: Vec<f64> = raster
        .band(1)?
        .iter()
        .map(|v| *v as f32 as f64)
        .collect();
    let (res_x, res_y) = raster.resolution();
    let (width, height) = (raster.width, raster.height);

    // Gradient along rows uses the x pixel size and along columns the y size.
    let mut d_rows = vec![0.0; width * height];
    let mut column = vec![0.0; height];
    let mut column_out = vec![0.0; height];
    for col in 0..width {
        for row in 0..height {
            column[row] = elevation[row * width + col];
        }
        gradient_1d(&column, res_x, &mut column_out);
        for row in 0..height {
            d_rows[row * width + col] = column_out[row];
        }
    }
    let mut d_cols = vec![0.0; width * height];
    for row in 0..height {
        let start = row * width;
        gradient_1d(
            &elevation[start..start + width],
            res_y,
            &mut d_cols[start..start + width],
        );
    }

    let az = azimuth.to_radians();
    let alt = altitude.to_radians();
    let data = d_rows
        .iter()
        .zip(&d_cols)
        .map(|(x, y)| {
            let slope = std::f64::consts::FRAC_PI_2 - (x * x + y * y).sqrt().atan();
            let aspect = (-x).atan2(*y);
            let shaded =
                alt.sin() * slope.sin() + alt.cos() * slope.cos() * (az - aspect).cos();
            (255.0 * shaded).clamp(0.0, 255.0).trunc()
        })
        .collect();
    let mut out = raster.with_band(data, DataType::UInt8);
    out.nodata = None;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::raster::grid::tests::sample_raster;

    fn two_band() -> Raster {
        let mut raster = sample_raster();
        raster.bands = vec![vec![1.0; 12], vec![3.0; 12]];
        raster
    }

    #[test]
    fn summary_uses_population_std() {
        let summary = summarize(&[1.0, 2.0, 3.0, 4.0]).expect("values");
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 4.0);
        assert_eq!(summary.mean, 2.5);
        assert!((summary.std - 1.118_033_988_749_895).abs() < 1e-12);
        assert!(summarize(&[]).is_none());
        assert_eq!(median(&[5.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn histogram_includes_the_upper_edge() {
        let (counts, edges) = histogram(&[0.0, 1.0, 2.0, 3.0, 4.0], 4).expect("bins");
        assert_eq!(counts, vec![1, 1, 1, 2]);
        assert_eq!(edges, vec![0.0, 1.0, 2.0, 3.0, 4.0]);

        let (counts, edges) = histogram(&[7.0, 7.0], 2).expect("bins");
        assert_eq!(counts, vec![0, 2]);
        assert_eq!(edges, vec![6.5, 7.0, 7.5]);
        assert!(histogram(&[1.0], 0).is_err());
    }

    #[test]
    fn ndvi_is_normalised_difference() {
        let out = ndvi(&two_band(), 1, 2).expect("ndvi");
        assert_eq!(out.dtype, DataType::Float32);
        assert!((out.bands[0][0] - 0.5).abs() < 1e-6);
        assert!(ndvi(&two_band(), 1, 3).is_err());
    }

    #[test]
    fn weights_must_match_bands_and_sum_to_one() {
        let raster = two_band();
        let out = weighted_sum(&raster, &[0.25, 0.75]).expect("weights");
        assert!((out.bands[0][5] - 2.5).abs() < 1e-6);
        assert!(weighted_sum(&raster, &[1.0]).is_err());
        assert!(weighted_sum(&raster, &[0.5, 0.6]).is_err());
    }

    #[test]
    fn reclassification_only_touches_matching_values() {
        let map = BTreeMap::from([("1".to_string(), 10.0), ("2".to_string(), 20.0)]);
        let pairs = parse_reclass_map(&map).expect("numeric keys");
        let out = reclassify(&sample_raster(), &pairs).expect("reclass");
        assert_eq!(&out.bands[0][..4], &[0.0, 10.0, 20.0, 3.0]);

        let bad = BTreeMap::from([("one".to_string(), 1.0)]);
        assert!(parse_reclass_map(&bad).is_err());
    }

    #[test]
    fn focal_edges_repeat_the_nearest_pixel() {
        let out = focal(&sample_raster(), FocalStatistic::Max, 3).expect("focal");
        // Row 0 col 0 sees values 0, 1, 4, 5 with edge repetition.
        assert_eq!(out.bands[0][0], 5.0);
        assert_eq!(out.bands[0][11], 11.0);
        let mean = focal(&sample_raster(), FocalStatistic::Mean, 1).expect("identity");
        assert_eq!(mean.bands[0], sample_raster().bands[0]);
        assert!(FocalStatistic::parse("mode").is_err());
    }

    #[test]
    fn flat_terrain_is_lit_by_sun_altitude() {
        let mut raster = sample_raster();
        raster.bands = vec![vec![100.0; 12]];
        let out = hillshade(&raster, 315.0, 45.0).expect("hillshade");
        assert_eq!(out.dtype, DataType::UInt8);
        // 255 * sin(45°)
        assert!(out.bands[0].iter().all(|v| *v == 180.0));
    }
}
