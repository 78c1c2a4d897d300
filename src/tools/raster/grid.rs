//! In-memory raster grids and their pixel/world geometry.

use crate::lib::errors::GisError;

/// Pixel storage type written to GeoTIFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    UInt8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl DataType {
    pub fn parse(raw: &str) -> Result<Self, GisError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "uint8" | "byte" => Ok(Self::UInt8),
            "uint16" => Ok(Self::UInt16),
            "int16" => Ok(Self::Int16),
            "uint32" => Ok(Self::UInt32),
            "int32" => Ok(Self::Int32),
            "float32" => Ok(Self::Float32),
            "float64" => Ok(Self::Float64),
            other => Err(GisError::invalid_input(format!(
                "unsupported dtype '{other}'; \
                 use uint8, uint16, int16, uint32, int32, float32 or float64"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::Int16 => "int16",
            Self::UInt32 => "uint32",
            Self::Int32 => "int32",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

/// Window of pixels: column and row offset plus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub col: usize,
    pub row: usize,
    pub width: usize,
    pub height: usize,
}

/// Band-sequential raster with a GDAL-ordered geotransform.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub bands: Vec<Vec<f64>>,
    /// `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`
    pub geo_transform: [f64; 6],
    /// WKT; empty when the dataset carries no CRS.
    pub projection: String,
    pub nodata: Option<f64>,
    pub dtype: DataType,
}

impl Raster {
    /// Blank raster sharing the grid, CRS and nodata of `self`.
    pub fn like(&self, band_count: usize, dtype: DataType) -> Raster {
        Raster {
            width: self.width,
            height: self.height,
            bands: vec![vec![0.0; self.width * self.height]; band_count],
            geo_transform: self.geo_transform,
            projection: self.projection.clone(),
            nodata: self.nodata,
            dtype,
        }
    }

    /// Single-band raster on the grid of `self` holding `data`.
    pub fn with_band(&self, data: Vec<f64>, dtype: DataType) -> Raster {
        Raster {
            bands: vec![data],
            ..self.like(0, dtype)
        }
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Borrow a band by 1-based index.
    pub fn band(&self, index: usize) -> Result<&[f64], GisError> {
        if index == 0 || index > self.bands.len() {
            return Err(GisError::raster(format!(
                "band index {index} is out of range; the raster has {} band(s)",
                self.bands.len()
            )));
        }
        Ok(&self.bands[index - 1])
    }

    pub fn has_crs(&self) -> bool {
        !self.projection.trim().is_empty()
    }

    /// True for nodata and NaN pixels.
    pub fn is_masked(&self, value: f64) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nodata| value == nodata)
    }

    /// Unmasked values of a band.
    pub fn valid_values(&self, band: &[f64]) -> Vec<f64> {
        band.iter().copied().filter(|v| !self.is_masked(*v)).collect()
    }

    /// Fill value for pixels that fall outside the data: nodata, else zero.
    pub fn fill_value(&self) -> f64 {
        self.nodata.unwrap_or(0.0)
    }

    /// World coordinate of a fractional pixel position.
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        let gt = &self.geo_transform;
        (
            gt[0] + col * gt[1] + row * gt[2],
            gt[3] + col * gt[4] + row * gt[5],
        )
    }

    /// Fractional pixel position of a world coordinate.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> Result<(f64, f64), GisError> {
        let gt = &self.geo_transform;
        let det = gt[1] * gt[5] - gt[2] * gt[4];
        if det == 0.0 || !det.is_finite() {
            return Err(GisError::raster("geotransform is not invertible"));
        }
        let dx = x - gt[0];
        let dy = y - gt[3];
        Ok((
            (dx * gt[5] - dy * gt[2]) / det,
            (dy * gt[1] - dx * gt[4]) / det,
        ))
    }

    /// Centre of pixel (`col`, `row`) in world coordinates.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.pixel_to_world(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// `[left, bottom, right, top]` of the full grid.
    pub fn bounds(&self) -> [f64; 4] {
        let corners = [
            self.pixel_to_world(0.0, 0.0),
            self.pixel_to_world(self.width as f64, 0.0),
            self.pixel_to_world(0.0, self.height as f64),
            self.pixel_to_world(self.width as f64, self.height as f64),
        ];
        let mut out = [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
        for (x, y) in corners {
            out[0] = out[0].min(x);
            out[1] = out[1].min(y);
            out[2] = out[2].max(x);
            out[3] = out[3].max(y);
        }
        out
    }

    /// Pixel sizes as positive numbers, `(x, y)`.
    pub fn resolution(&self) -> (f64, f64) {
        let gt = &self.geo_transform;
        (gt[1].hypot(gt[4]), gt[2].hypot(gt[5]))
    }

    /// Geotransform in affine `(a, b, c, d, e, f)` order.
    pub fn affine(&self) -> [f64; 6] {
        let gt = &self.geo_transform;
        [gt[1], gt[2], gt[0], gt[4], gt[5], gt[3]]
    }

    /// True when `other` has the same size and geotransform.
    pub fn same_grid(&self, other: &Raster) -> bool {
        self.width == other.width
            && self.height == other.height
            && self
                .geo_transform
                .iter()
                .zip(other.geo_transform.iter())
                .all(|(a, b)| (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0))
    }

    /// Copy a window of every band; the geotransform moves to the window origin.
    pub fn window(&self, window: Window) -> Raster {
        let width = window.width.min(self.width.saturating_sub(window.col));
        let height = window.height.min(self.height.saturating_sub(window.row));
        let bands = self
            .bands
            .iter()
            .map(|band| {
                let mut out = Vec::with_capacity(width * height);
                for row in window.row..window.row + height {
                    let start = row * self.width + window.col;
                    out.extend_from_slice(&band[start..start + width]);
                }
                out
            })
            .collect();
        let (origin_x, origin_y) = self.pixel_to_world(window.col as f64, window.row as f64);
        let mut geo_transform = self.geo_transform;
        geo_transform[0] = origin_x;
        geo_transform[3] = origin_y;
        Raster {
            width,
            height,
            bands,
            geo_transform,
            projection: self.projection.clone(),
            nodata: self.nodata,
            dtype: self.dtype,
        }
    }

    /// Value of a band at an integer pixel.
    pub fn at(&self, band: &[f64], col: usize, row: usize) -> f64 {
        band[row * self.width + col]
    }

    /// Nearest-neighbour sample at a fractional pixel position.
    pub fn sample_nearest(&self, band: &[f64], col: f64, row: f64) -> Option<f64> {
        if !(col >= 0.0 && row >= 0.0) {
            return None;
        }
        let (c, r) = (col.floor() as usize, row.floor() as usize);
        (c < self.width && r < self.height).then(|| self.at(band, c, r))
    }

    /// Bilinear sample at a fractional pixel position; masked neighbours fall back to nearest.
    pub fn sample_bilinear(&self, band: &[f64], col: f64, row: f64) -> Option<f64> {
        if !(col >= 0.0 && row >= 0.0 && col < self.width as f64 && row < self.height as f64) {
            return None;
        }
        let x = (col - 0.5).clamp(0.0, (self.width - 1) as f64);
        let y = (row - 0.5).clamp(0.0, (self.height - 1) as f64);
        let (x0, y0) = (x.floor() as usize, y.floor() as usize);
        let (x1, y1) = ((x0 + 1).min(self.width - 1), (y0 + 1).min(self.height - 1));
        let (fx, fy) = (x - x0 as f64, y - y0 as f64);
        let corners = [
            self.at(band, x0, y0),
            self.at(band, x1, y0),
            self.at(band, x0, y1),
            self.at(band, x1, y1),
        ];
        if corners.iter().any(|v| self.is_masked(*v)) {
            return self.sample_nearest(band, col, row);
        }
        let top = corners[0] * (1.0 - fx) + corners[1] * fx;
        let bottom = corners[2] * (1.0 - fx) + corners[3] * fx;
        Some(top * (1.0 - fy) + bottom * fy)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 4x3 north-up grid at (100, 50) with 10 unit pixels, values 0..12.
    pub(crate) fn sample_raster() -> Raster {
        Raster {
            width: 4,
            height: 3,
            bands: vec![(0..12).map(f64::from).collect()],
            geo_transform: [100.0, 10.0, 0.0, 50.0, 0.0, -10.0],
            projection: String::new(),
            nodata: None,
            dtype: DataType::Float32,
        }
    }

    #[test]
    fn bounds_and_affine_follow_the_geotransform() {
        let raster = sample_raster();
        assert_eq!(raster.bounds(), [100.0, 20.0, 140.0, 50.0]);
        assert_eq!(raster.affine(), [10.0, 0.0, 100.0, 0.0, -10.0, 50.0]);
        assert_eq!(raster.resolution(), (10.0, 10.0));
    }

    #[test]
    fn world_and_pixel_coordinates_invert() {
        let raster = sample_raster();
        let (x, y) = raster.pixel_center(2, 1);
        assert_eq!((x, y), (125.0, 35.0));
        let (col, row) = raster.world_to_pixel(x, y).expect("invertible");
        assert!((col - 2.5).abs() < 1e-12 && (row - 1.5).abs() < 1e-12);
    }

    #[test]
    fn windows_are_clipped_at_the_edge() {
        let raster = sample_raster();
        let tile = raster.window(Window {
            col: 2,
            row: 2,
            width: 2,
            height: 2,
        });
        assert_eq!((tile.width, tile.height), (2, 1));
        assert_eq!(tile.bands[0], vec![10.0, 11.0]);
        assert_eq!(tile.geo_transform[0], 120.0);
        assert_eq!(tile.geo_transform[3], 30.0);
    }

    #[test]
    fn out_of_range_bands_are_rejected() {
        let raster = sample_raster();
        assert!(raster.band(1).is_ok());
        assert!(matches!(raster.band(0), Err(GisError::Raster { .. })));
        assert!(matches!(raster.band(2), Err(GisError::Raster { .. })));
    }

    #[test]
    fn bilinear_sampling_interpolates_between_centres() {
        let raster = sample_raster();
        let band = raster.band(1).expect("band");
        assert_eq!(raster.sample_bilinear(band, 1.0, 0.5), Some(0.5));
        assert_eq!(raster.sample_nearest(band, 3.9, 2.1), Some(11.0));
        assert_eq!(raster.sample_nearest(band, 4.0, 0.0), None);
    }

    #[test]
    fn nodata_and_nan_are_masked() {
        let mut raster = sample_raster();
        raster.nodata = Some(3.0);
        assert!(raster.is_masked(3.0));
        assert!(raster.is_masked(f64::NAN));
        assert_eq!(raster.valid_values(&[1.0, 3.0, f64::NAN]), vec![1.0]);
    }
}
