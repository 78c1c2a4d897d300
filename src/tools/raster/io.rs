//! GeoTIFF reading and writing through GDAL.

use std::path::Path;

use gdal::{
    errors::GdalError,
    raster::{Buffer, GdalType},
    Dataset, DriverManager,
};

use crate::lib::{
    errors::GisError,
    paths::{clean_arg, existing_input, is_remote},
};

use super::grid::{DataType, Raster};

const OUTPUT_DRIVER: &str = "GTiff";
const IDENTITY_TRANSFORM: [f64; 6] = [0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Convert GDAL errors into raster errors with context.
pub fn gdal_error(err: GdalError, context: &str) -> GisError {
    GisError::raster(format!("{context}: {err}"))
}

/// Open a local raster, or an http(s) URL through `/vsicurl/`.
pub fn open(raw: &str) -> Result<Dataset, GisError> {
    let cleaned = clean_arg(raw);
    let target = if is_remote(&cleaned) {
        format!("/vsicurl/{cleaned}")
    } else {
        existing_input(&cleaned)?.display().to_string()
    };
    Dataset::open(&target)
        .map_err(|err| gdal_error(err, &format!("Failed to open raster '{cleaned}'")))
}

/// Lower-case GDAL type name of every band, e.g. `uint8`.
pub fn band_types(dataset: &Dataset) -> Result<Vec<String>, GisError> {
    (1..=dataset.raster_count() as usize)
        .map(|index| {
            let band = dataset
                .rasterband(index)
                .map_err(|err| gdal_error(err, &format!("Failed to access band {index}")))?;
            Ok(format!("{:?}", band.band_type()).to_ascii_lowercase())
        })
        .collect()
}

/// Nodata value of every band.
pub fn nodata_values(dataset: &Dataset) -> Result<Vec<Option<f64>>, GisError> {
    (1..=dataset.raster_count() as usize)
        .map(|index| {
            let band = dataset
                .rasterband(index)
                .map_err(|err| gdal_error(err, &format!("Failed to access band {index}")))?;
            Ok(band.no_data_value())
        })
        .collect()
}

/// Geotransform of a dataset; datasets without one use the identity.
pub fn geo_transform(dataset: &Dataset) -> [f64; 6] {
    dataset.geo_transform().unwrap_or(IDENTITY_TRANSFORM)
}

/// Load every band of an open dataset as `f64`.
pub fn load(dataset: &Dataset) -> Result<Raster, GisError> {
    let (width, height) = dataset.raster_size();
    let count = dataset.raster_count() as usize;
    if count == 0 {
        return Err(GisError::raster("raster has no bands"));
    }
    let mut bands = Vec::with_capacity(count);
    for index in 1..=count {
        let band = dataset
            .rasterband(index)
            .map_err(|err| gdal_error(err, &format!("Failed to access band {index}")))?;
        let buffer = band
            .read_as::<f64>((0, 0), (width, height), (width, height), None)
            .map_err(|err| gdal_error(err, &format!("Failed to read band {index}")))?;
        bands.push(buffer.data().to_vec());
    }
    let types = band_types(dataset)?;
    let dtype = types
        .first()
        .and_then(|name| DataType::parse(name).ok())
        .unwrap_or(DataType::Float64);
    let nodata = nodata_values(dataset)?.into_iter().next().flatten();
    Ok(Raster {
        width,
        height,
        bands,
        geo_transform: geo_transform(dataset),
        projection: dataset.projection(),
        nodata,
        dtype,
    })
}

/// Open and load a raster in one step.
pub fn read(raw: &str) -> Result<Raster, GisError> {
    load(&open(raw)?)
}

trait Pixel: GdalType + Copy {
    fn from_f64(value: f64) -> Self;
}

macro_rules! pixel {
    ($($ty:ty),*) => {
        $(impl Pixel for $ty {
            fn from_f64(value: f64) -> Self {
                value as $ty
            }
        })*
    };
}

pixel!(u8, u16, i16, u32, i32, f32, f64);

/// Range of values an integer type can hold.
fn integer_range(dtype: DataType) -> Option<(f64, f64)> {
    match dtype {
        DataType::UInt8 => Some((u8::MIN as f64, u8::MAX as f64)),
        DataType::UInt16 => Some((u16::MIN as f64, u16::MAX as f64)),
        DataType::Int16 => Some((i16::MIN as f64, i16::MAX as f64)),
        DataType::UInt32 => Some((u32::MIN as f64, u32::MAX as f64)),
        DataType::Int32 => Some((i32::MIN as f64, i32::MAX as f64)),
        DataType::Float32 | DataType::Float64 => None,
    }
}

/// Nodata that survives conversion to `dtype`; others are dropped.
fn storable_nodata(raster: &Raster) -> Option<f64> {
    let nodata = raster.nodata?;
    match integer_range(raster.dtype) {
        Some((low, high)) if nodata.fract() != 0.0 || nodata < low || nodata > high => {
            tracing::debug!(
                target: "gis_mcp::tools",
                nodata,
                dtype = raster.dtype.name(),
                "nodata value does not fit the output type and is dropped"
            );
            None
        }
        _ => Some(nodata),
    }
}

fn write_typed<T: Pixel>(raster: &Raster, path: &Path) -> Result<(), GisError> {
    let context = format!("Failed to write raster '{}'", path.display());
    let driver = DriverManager::get_driver_by_name(OUTPUT_DRIVER)
        .map_err(|err| gdal_error(err, &context))?;
    let mut dataset = driver
        .create_with_band_type::<T, _>(path, raster.width, raster.height, raster.band_count())
        .map_err(|err| gdal_error(err, &context))?;
    dataset
        .set_geo_transform(&raster.geo_transform)
        .map_err(|err| gdal_error(err, &context))?;
    if raster.has_crs() {
        dataset
            .set_projection(&raster.projection)
            .map_err(|err| gdal_error(err, &context))?;
    }
    let nodata = storable_nodata(raster);
    for (offset, values) in raster.bands.iter().enumerate() {
        let mut band = dataset
            .rasterband(offset + 1)
            .map_err(|err| gdal_error(err, &context))?;
        if nodata.is_some() {
            band.set_no_data_value(nodata)
                .map_err(|err| gdal_error(err, &context))?;
        }
        let data: Vec<T> = values.iter().map(|value| T::from_f64(*value)).collect();
        let mut buffer = Buffer::new((raster.width, raster.height), data);
        band.write((0, 0), (raster.width, raster.height), &mut buffer)
            .map_err(|err| gdal_error(err, &context))?;
    }
    Ok(())
}

/// Write a raster as GeoTIFF using its declared data type.
pub fn write(raster: &Raster, path: &Path) -> Result<(), GisError> {
    if raster.width == 0 || raster.height == 0 || raster.bands.is_empty() {
        return Err(GisError::raster("cannot write an empty raster"));
    }
    match raster.dtype {
        DataType::UInt8 => write_typed::<u8>(raster, path),
        DataType::UInt16 => write_typed::<u16>(raster, path),
        DataType::Int16 => write_typed::<i16>(raster, path),
        DataType::UInt32 => write_typed::<u32>(raster, path),
        DataType::Int32 => write_typed::<i32>(raster, path),
        DataType::Float32 => write_typed::<f32>(raster, path),
        DataType::Float64 => write_typed::<f64>(raster, path),
    }?;
    tracing::debug!(
        target: "gis_mcp::tools",
        path = %path.display(),
        width = raster.width,
        height = raster.height,
        bands = raster.band_count(),
        dtype = raster.dtype.name(),
        "raster written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::tools::raster::grid::tests::sample_raster;

    #[test]
    fn geotiff_round_trip_keeps_grid_and_values() {
        let dir = tempdir().expect("can create temporary directory");
        let path = dir.path().join("grid.tif");
        let mut raster = sample_raster();
        raster.nodata = Some(-1.0);
        write(&raster, &path).expect("writes");

        let back = read(&path.display().to_string()).expect("reads");
        assert_eq!((back.width, back.height), (4, 3));
        assert_eq!(back.geo_transform, raster.geo_transform);
        assert_eq!(back.bands, raster.bands);
        assert_eq!(back.nodata, Some(-1.0));
        assert_eq!(back.dtype, DataType::Float32);
    }

    #[test]
    fn integer_outputs_truncate_and_saturate() {
        let dir = tempdir().expect("can create temporary directory");
        let path = dir.path().join("bytes.tif");
        let mut raster = sample_raster();
        raster.dtype = DataType::UInt8;
        raster.nodata = Some(-9999.0);
        raster.bands[0][0] = 300.0;
        raster.bands[0][1] = 1.7;
        write(&raster, &path).expect("writes");

        let back = read(&path.display().to_string()).expect("reads");
        assert_eq!(back.bands[0][0], 255.0);
        assert_eq!(back.bands[0][1], 1.0);
        assert_eq!(back.nodata, None);
        assert_eq!(back.dtype, DataType::UInt8);
    }

    #[test]
    fn missing_rasters_are_not_found() {
        let err = read("/no/such/raster.tif").expect_err("missing");
        assert!(matches!(err, GisError::FileNotFound { .. }));
    }
}
