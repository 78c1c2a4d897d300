//! Raster tools: GeoTIFF metadata, band math, resampling, masking and terrain.

pub mod analysis;
pub mod grid;
pub mod io;
pub mod mask;
pub mod request;
mod router;
pub mod warp;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};

use crate::{
    lib::{
        errors::GisError,
        fs::list_files_with_extensions,
        paths::{clean_arg, existing_input, resolve_output_dir, resolve_output_path},
    },
    tools::{vector, SUCCESS},
};

pub use grid::{DataType, Raster, Window};
pub use request::*;
pub(crate) use router::router;

use analysis::{Algebra, FocalStatistic};
use warp::Resampling;

const DEFAULT_ZONAL_STATS: [&str; 4] = ["mean", "min", "max", "std"];
const ZONAL_STATS: [&str; 7] = ["mean", "min", "max", "std", "count", "sum", "median"];

/// Resolve a raster output under `root`; a missing extension becomes `.tif`.
fn raster_output_path(root: &Path, raw: &str) -> Result<PathBuf, GisError> {
    let mut path = resolve_output_path(root, raw)?;
    if path.extension().is_none() {
        path.set_extension("tif");
    }
    Ok(path)
}

fn write_destination(raster: &Raster, root: &Path, raw: &str) -> Result<PathBuf, GisError> {
    let path = raster_output_path(root, raw)?;
    io::write(raster, &path)?;
    Ok(path)
}

fn destination_response(path: &Path, message: String) -> DestinationResponse {
    DestinationResponse {
        status: SUCCESS.into(),
        destination: path.display().to_string(),
        message,
    }
}

/// Write when an output was requested; returns the written path.
fn maybe_write(
    raster: &Raster,
    root: &Path,
    output_path: Option<&str>,
) -> Result<Option<String>, GisError> {
    match output_path.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => Ok(Some(write_destination(raster, root, raw)?.display().to_string())),
        None => Ok(None),
    }
}

/// Grid description of a dataset without reading pixels.
fn header(dataset: &gdal::Dataset) -> Raster {
    let (width, height) = dataset.raster_size();
    Raster {
        width,
        height,
        bands: Vec::new(),
        geo_transform: io::geo_transform(dataset),
        projection: dataset.projection(),
        nodata: None,
        dtype: DataType::Float64,
    }
}

pub fn metadata(req: RasterPathRequest) -> Result<MetadataResponse, GisError> {
    let cleaned = clean_arg(&req.path_or_url);
    let dataset = io::open(&cleaned)?;
    let grid = header(&dataset);
    let [left, bottom, right, top] = grid.bounds();
    let band_dtypes = io::band_types(&dataset)?
        .into_iter()
        .enumerate()
        .map(|(offset, name)| (offset + 1, name))
        .collect();
    Ok(MetadataResponse {
        status: SUCCESS.into(),
        metadata: RasterMetadata {
            name: cleaned.clone(),
            driver: dataset.driver().short_name(),
            width: grid.width,
            height: grid.height,
            count: dataset.raster_count() as usize,
            bounds: RasterBounds {
                left,
                bottom,
                right,
                top,
            },
            band_dtypes,
            no_data: io::nodata_values(&dataset)?,
            crs: warp::raster_crs(&grid),
            transform: grid.affine(),
        },
        message: format!("Raster dataset opened successfully from '{cleaned}'."),
    })
}

/// `+proj=utm +zone=18 +no_defs` as `{"proj": "utm", "zone": 18, "no_defs": true}`.
pub fn proj4_parameters(definition: &str) -> Map<String, Value> {
    definition
        .split_whitespace()
        .filter_map(|token| {
            let token = token.trim_start_matches('+');
            if token.is_empty() {
                return None;
            }
            Some(match token.split_once('=') {
                Some((key, raw)) => {
                    let value = if let Ok(int) = raw.parse::<i64>() {
                        Value::from(int)
                    } else if let Ok(float) = raw.parse::<f64>() {
                        Value::from(float)
                    } else {
                        Value::from(raw)
                    };
                    (key.to_string(), value)
                }
                None => (token.to_string(), Value::Bool(true)),
            })
        })
        .collect()
}

pub fn raster_crs(req: RasterPathRequest) -> Result<RasterCrsResponse, GisError> {
    let dataset = io::open(&req.path_or_url)?;
    if dataset.projection().trim().is_empty() {
        return Err(GisError::crs("No CRS defined for this dataset."));
    }
    let srs = dataset
        .spatial_ref()
        .map_err(|err| io::gdal_error(err, "Failed to read the raster CRS"))?;
    let wkt = srs
        .to_wkt()
        .map_err(|err| io::gdal_error(err, "Failed to export the raster CRS as WKT"))?;
    let proj4 = srs
        .to_proj4()
        .map_err(|err| io::gdal_error(err, "Failed to export the raster CRS as PROJ.4"))?;
    Ok(RasterCrsResponse {
        status: SUCCESS.into(),
        crs: RasterCrs {
            wkt,
            proj4: proj4_parameters(&proj4),
        },
        message: "CRS retrieved successfully".into(),
    })
}

pub fn extract_band(req: ExtractBandRequest, root: &Path) -> Result<DestinationResponse, GisError> {
    let raster = io::read(&req.source)?;
    if req.band_index == 0 || req.band_index > raster.band_count() {
        return Err(GisError::invalid_input(format!(
            "Band index {} is out of range. This raster has {} bands.",
            req.band_index,
            raster.band_count()
        )));
    }
    let band = raster.band(req.band_index)?.to_vec();
    let path = write_destination(&raster.with_band(band, raster.dtype), root, &req.destination)?;
    Ok(destination_response(
        &path,
        format!("Band {} extracted and saved to '{}'.", req.band_index, path.display()),
    ))
}

pub fn band_statistics(req: RasterSourceRequest) -> Result<BandStatisticsResponse, GisError> {
    let raster = io::read(&req.source)?;
    let statistics = raster
        .bands
        .iter()
        .enumerate()
        .map(|(offset, band)| {
            let summary = analysis::summarize(&raster.valid_values(band));
            (
                format!("Band {}", offset + 1),
                BandStatistics {
                    min: summary.map(|s| s.min),
                    max: summary.map(|s| s.max),
                    mean: summary.map(|s| s.mean),
                    std: summary.map(|s| s.std),
                },
            )
        })
        .collect();
    Ok(BandStatisticsResponse {
        status: SUCCESS.into(),
        statistics,
        message: "Band-wise statistics computed successfully.".into(),
    })
}

pub fn histogram(req: HistogramRequest) -> Result<HistogramResponse, GisError> {
    let raster = io::read(&req.source)?;
    let mut histograms = BTreeMap::new();
    for (offset, band) in raster.bands.iter().enumerate() {
        let (histogram, bin_edges) = analysis::histogram(&raster.valid_values(band), req.bins)?;
        histograms.insert(
            format!("Band {}", offset + 1),
            BandHistogram {
                histogram,
                bin_edges,
            },
        );
    }
    Ok(HistogramResponse {
        status: SUCCESS.into(),
        histograms,
        message: "Histogram computed for all bands.".into(),
    })
}

pub fn tile(req: TileRasterRequest, root: &Path) -> Result<TileRasterResponse, GisError> {
    if req.tile_size == 0 {
        return Err(GisError::invalid_input("tile_size must be at least 1"));
    }
    let raster = io::read(&req.source)?;
    let dir = resolve_output_dir(root, &req.destination_dir)?;
    let mut tiles_created = 0;
    for row in (0..raster.height).step_by(req.tile_size) {
        for col in (0..raster.width).step_by(req.tile_size) {
            let tile = raster.window(Window {
                col,
                row,
                width: req.tile_size,
                height: req.tile_size,
            });
            io::write(&tile, &dir.join(format!("tile_{row}_{col}.tif")))?;
            tiles_created += 1;
        }
    }
    Ok(TileRasterResponse {
        status: SUCCESS.into(),
        tiles_created,
        message: format!(
            "{tiles_created} tiles created and saved in '{}'.",
            dir.display()
        ),
    })
}

pub fn ndvi(req: NdviRequest, root: &Path) -> Result<DestinationResponse, GisError> {
    let raster = io::read(&req.source)?;
    let out = analysis::ndvi(&raster, req.red_band_index, req.nir_band_index)?;
    let path = write_destination(&out, root, &req.destination)?;
    Ok(destination_response(
        &path,
        format!("NDVI calculated and saved to '{}'.", path.display()),
    ))
}

pub fn algebra(req: RasterAlgebraRequest, root: &Path) -> Result<DestinationResponse, GisError> {
    let op = Algebra::parse(&req.operation)?;
    let first = io::read(&req.raster1)?;
    let second = io::read(&req.raster2)?;
    let a = first.band(req.band_index)?;
    second.band(req.band_index)?;
    let aligned = warp::align_to(&second, &first)?;
    let out = analysis::band_algebra(&first, a, aligned.band(req.band_index)?, op);
    let path = write_destination(&out, root, &req.destination)?;
    Ok(destination_response(
        &path,
        format!("Raster operation '{}' completed and saved.", req.operation.trim()),
    ))
}

pub fn concat_bands(req: ConcatBandsRequest, root: &Path) -> Result<DestinationResponse, GisError> {
    let folder = existing_input(&req.folder_path)?;
    let files = list_files_with_extensions(&folder, &["tif"])?;
    let Some((first, rest)) = files.split_first() else {
        return Err(GisError::invalid_input("No .tif files found in folder."));
    };
    let reference = io::read(&first.display().to_string())?;
    let mut bands = vec![reference.band(1)?.to_vec()];
    for file in rest {
        let raster = io::read(&file.display().to_string())?;
        let aligned = warp::align_to(&raster, &reference)?;
        bands.push(aligned.band(1)?.to_vec());
    }
    let stacked = Raster {
        bands,
        ..reference.like(0, reference.dtype)
    };
    let path = write_destination(&stacked, root, &req.destination)?;
    Ok(destination_response(
        &path,
        format!(
            "{} single-band rasters concatenated into '{}'.",
            files.len(),
            path.display()
        ),
    ))
}

pub fn weighted_band_sum(
    req: WeightedBandSumRequest,
    root: &Path,
) -> Result<DestinationResponse, GisError> {
    let raster = io::read(&req.source)?;
    let out = analysis::weighted_sum(&raster, &req.weights)?;
    let path = write_destination(&out, root, &req.destination)?;
    Ok(destination_response(
        &path,
        format!("Weighted band sum computed and saved to '{}'.", path.display()),
    ))
}

pub fn resample(req: ResampleRasterRequest, root: &Path) -> Result<DestinationResponse, GisError> {
    let method = Resampling::parse(&req.resampling)?;
    let raster = io::read(&req.source)?;
    let out = warp::resample(&raster, req.scale_factor, method)?;
    let path = write_destination(&out, root, &req.destination)?;
    Ok(destination_response(
        &path,
        format!(
            "Raster resampled by factor {} using '{}' and saved to '{}'.",
            req.scale_factor,
            method.name(),
            path.display()
        ),
    ))
}

pub fn reproject(
    req: ReprojectRasterRequest,
    root: &Path,
) -> Result<DestinationResponse, GisError> {
    let method = Resampling::parse(&req.resampling)?;
    let raster = io::read(&req.source)?;
    let out = warp::reproject(&raster, &req.target_crs, method)?;
    let path = write_destination(&out, root, &req.destination)?;
    Ok(destination_response(
        &path,
        format!(
            "Raster reprojected to '{}' and saved to '{}'.",
            crate::tools::crs::normalize_crs(&req.target_crs)?,
            path.display()
        ),
    ))
}

/// Vector layer in the raster's CRS when both are known.
fn layer_in_raster_crs(raster: &Raster, raw: &str) -> Result<vector::FeatureTable, GisError> {
    let table = vector::read_input(raw)?;
    match (warp::raster_crs(raster), &table.crs) {
        (Some(target), Some(own)) if &target != own => table.to_crs(&target),
        _ => Ok(table),
    }
}

pub fn clip_with_shapes(
    req: ClipRasterRequest,
    root: &Path,
) -> Result<DestinationResponse, GisError> {
    let raster = io::read(&req.raster_path_or_url)?;
    let layer = layer_in_raster_crs(&raster, &req.shapefile_path)?;
    let shapes: Vec<_> = layer.geometries()?.into_iter().cloned().collect();
    let out = mask::clip(&raster, &shapes)?;
    let path = write_destination(&out, root, &req.destination)?;
    Ok(destination_response(
        &path,
        format!("Raster masked and saved to '{}'.", path.display()),
    ))
}

fn zonal_value(stat: &str, values: &[f64]) -> Value {
    if values.is_empty() {
        return Value::Null;
    }
    if stat == "count" {
        return Value::from(values.len());
    }
    let summary = analysis::summarize(values);
    let value = match stat {
        "mean" => summary.map(|s| s.mean),
        "min" => summary.map(|s| s.min),
        "max" => summary.map(|s| s.max),
        "std" => summary.map(|s| s.std),
        "sum" => Some(values.iter().sum()),
        "median" => analysis::median(values),
        _ => None,
    };
    value.map(vector::table::number).unwrap_or(Value::Null)
}

pub fn zonal_statistics(req: ZonalStatisticsRequest) -> Result<ZonalStatisticsResponse, GisError> {
    let stats: Vec<String> = match req.stats {
        Some(stats) if !stats.is_empty() => stats
            .iter()
            .map(|stat| stat.trim().to_ascii_lowercase())
            .collect(),
        _ => DEFAULT_ZONAL_STATS.iter().map(|s| s.to_string()).collect(),
    };
    if let Some(unknown) = stats.iter().find(|stat| !ZONAL_STATS.contains(&stat.as_str())) {
        return Err(GisError::invalid_input(format!(
            "unsupported statistic '{unknown}'; use {}",
            ZONAL_STATS.join(", ")
        )));
    }
    let raster = io::read(&req.raster_path)?;
    let band = raster.band(1)?;
    let layer = layer_in_raster_crs(&raster, &req.vector_path)?;
    let mut results = Vec::with_capacity(layer.len());
    for (index, feature) in layer.features.iter().enumerate() {
        let values = match &feature.geometry {
            Some(geometry) => mask::zone_values(&raster, band, geometry)?,
            None => Vec::new(),
        };
        let mut row = Map::new();
        row.insert("index".into(), Value::from(index));
        for stat in &stats {
            row.insert(stat.clone(), zonal_value(stat, &values));
        }
        results.push(row);
    }
    Ok(ZonalStatisticsResponse {
        status: SUCCESS.into(),
        message: "Zonal statistics computed successfully.".into(),
        results,
    })
}

pub fn reclassify(
    req: ReclassifyRasterRequest,
    root: &Path,
) -> Result<RasterOutputResponse, GisError> {
    let pairs = analysis::parse_reclass_map(&req.reclass_map)?;
    let raster = io::read(&req.raster_path)?;
    let out = analysis::reclassify(&raster, &pairs)?;
    let path = write_destination(&out, root, &req.output_path)?;
    Ok(RasterOutputResponse {
        status: SUCCESS.into(),
        message: format!("Raster reclassified and saved to '{}'.", path.display()),
        output_path: Some(path.display().to_string()),
    })
}

pub fn focal_statistics(
    req: FocalStatisticsRequest,
    root: &Path,
) -> Result<RasterOutputResponse, GisError> {
    let statistic = FocalStatistic::parse(&req.statistic)?;
    let raster = io::read(&req.raster_path)?;
    let out = analysis::focal(&raster, statistic, req.size)?;
    let output_path = maybe_write(&out, root, req.output_path.as_deref())?;
    Ok(RasterOutputResponse {
        status: SUCCESS.into(),
        message: format!("Focal {} computed successfully.", statistic.name()),
        output_path,
    })
}

pub fn hillshade(req: HillshadeRequest, root: &Path) -> Result<RasterOutputResponse, GisError> {
    let raster = io::read(&req.raster_path)?;
    let out = analysis::hillshade(&raster, req.azimuth, req.angle_altitude)?;
    let output_path = maybe_write(&out, root, req.output_path.as_deref())?;
    Ok(RasterOutputResponse {
        status: SUCCESS.into(),
        message: "Hillshade generated successfully.".into(),
        output_path,
    })
}

fn number_row(value: &Value) -> Result<Vec<f64>, GisError> {
    let Value::Array(items) = value else {
        return Err(GisError::invalid_input("Array must be 2D or 3D."));
    };
    items
        .iter()
        .map(|item| match item {
            Value::Null => Ok(f64::NAN),
            other => other
                .as_f64()
                .ok_or_else(|| GisError::invalid_input("array values must be numbers")),
        })
        .collect()
}

/// Parse a 2D or 3D JSON array into `(bands, rows, cols)` with row-major bands.
pub fn parse_array(value: &Value) -> Result<(Vec<Vec<f64>>, usize, usize), GisError> {
    let Value::Array(outer) = value else {
        return Err(GisError::invalid_input("Array must be 2D or 3D."));
    };
    let is_3d = outer
        .first()
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .is_some_and(Value::is_array);
    let planes: Vec<&Value> = if is_3d { outer.iter().collect() } else { vec![value] };

    let mut shape: Option<(usize, usize)> = None;
    let mut bands = Vec::with_capacity(planes.len());
    for plane in planes {
        let Value::Array(rows) = plane else {
            return Err(GisError::invalid_input("Array must be 2D or 3D."));
        };
        let rows = rows.iter().map(number_row).collect::<Result<Vec<_>, _>>()?;
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if width == 0 || rows.iter().any(|row| row.len() != width) {
            return Err(GisError::invalid_input(
                "array rows must be non-empty and of equal length",
            ));
        }
        match shape {
            Some(expected) if expected != (height, width) => {
                return Err(GisError::invalid_input("every band must have the same shape"));
            }
            _ => shape = Some((height, width)),
        }
        bands.push(rows.concat());
    }
    let (height, width) = shape.ok_or_else(|| GisError::invalid_input("Array must be 2D or 3D."))?;
    Ok((bands, height, width))
}

pub fn write_array(req: WriteRasterRequest, root: &Path) -> Result<RasterOutputResponse, GisError> {
    let dtype = match req.dtype.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(name) => DataType::parse(name)?,
        None => DataType::Float32,
    };
    let (bands, height, width) = parse_array(&req.array)?;
    let dataset = io::open(&req.reference_raster)?;
    let reference = header(&dataset);
    if (height, width) != (reference.height, reference.width) {
        return Err(GisError::invalid_input(format!(
            "array shape {height}x{width} does not match the reference raster {}x{}",
            reference.height, reference.width
        )));
    }
    let nodata = io::nodata_values(&dataset)?.into_iter().next().flatten();
    let raster = Raster {
        bands,
        nodata,
        dtype,
        ..reference
    };
    let path = write_destination(&raster, root, &req.output_path)?;
    Ok(RasterOutputResponse {
        status: SUCCESS.into(),
        message: format!("Raster written to '{}' successfully.", path.display()),
        output_path: Some(path.display().to_string()),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;
    use crate::tools::raster::grid::tests::sample_raster;

    fn write_sample(dir: &Path, name: &str, raster: &Raster) -> String {
        let path = dir.join(name);
        io::write(raster, &path).expect("writes fixture");
        path.display().to_string()
    }

    #[test]
    fn proj4_strings_become_parameter_maps() {
        let map = proj4_parameters("+proj=utm +zone=18 +k=0.9996 +datum=WGS84 +no_defs");
        assert_eq!(map["proj"], json!("utm"));
        assert_eq!(map["zone"], json!(18));
        assert_eq!(map["k"], json!(0.9996));
        assert_eq!(map["no_defs"], json!(true));
    }

    #[test]
    fn arrays_parse_in_two_and_three_dimensions() {
        let (bands, h, w) = parse_array(&json!([[1, 2], [3, 4]])).expect("2d");
        assert_eq!((bands.len(), h, w), (1, 2, 2));
        assert_eq!(bands[0], vec![1.0, 2.0, 3.0, 4.0]);

        let (bands, h, w) = parse_array(&json!([[[1, 2]], [[3, 4]]])).expect("3d");
        assert_eq!((bands.len(), h, w), (2, 1, 2));

        assert!(parse_array(&json!([1, 2])).is_err());
        assert!(parse_array(&json!([[1, 2], [3]])).is_err());
    }

    #[test]
    fn band_statistics_mask_nodata() {
        let dir = tempdir().expect("can create temporary directory");
        let mut raster = sample_raster();
        raster.nodata = Some(0.0);
        let source = write_sample(dir.path(), "grid.tif", &raster);
        let response = band_statistics(RasterSourceRequest { source }).expect("stats");
        let band = &response.statistics["Band 1"];
        assert_eq!(band.min, Some(1.0));
        assert_eq!(band.max, Some(11.0));
        assert_eq!(band.mean, Some(6.0));
    }

    #[test]
    fn tiles_cover_the_grid_with_edge_remainders() {
        let dir = tempdir().expect("can create temporary directory");
        let source = write_sample(dir.path(), "grid.tif", &sample_raster());
        let response = tile(
            TileRasterRequest {
                source,
                tile_size: 2,
                destination_dir: "tiles".into(),
            },
            dir.path(),
        )
        .expect("tiles");
        assert_eq!(response.tiles_created, 4);
        let corner = io::read(&dir.path().join("tiles/tile_2_2.tif").display().to_string())
            .expect("corner tile");
        assert_eq!((corner.width, corner.height), (2, 1));
        assert_eq!(corner.bands[0], vec![10.0, 11.0]);
    }

    #[test]
    fn extract_band_rejects_out_of_range_indexes() {
        let dir = tempdir().expect("can create temporary directory");
        let source = write_sample(dir.path(), "grid.tif", &sample_raster());
        let err = extract_band(
            ExtractBandRequest {
                source,
                band_index: 2,
                destination: "band.tif".into(),
            },
            dir.path(),
        )
        .expect_err("one band only");
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn zonal_statistics_report_nulls_for_empty_zones() {
        let dir = tempdir().expect("can create temporary directory");
        let raster = write_sample(dir.path(), "grid.tif", &sample_raster());
        let zones = dir.path().join("zones.geojson");
        std::fs::write(
            &zones,
            json!({
                "type": "FeatureCollection",
                "features": [
                    { "type": "Feature", "properties": {},
                      "geometry": { "type": "Polygon", "coordinates":
                        [[[100, 20], [120, 20], [120, 50], [100, 50], [100, 20]]] } },
                    { "type": "Feature", "properties": {},
                      "geometry": { "type": "Polygon", "coordinates":
                        [[[0, 0], [1, 0], [1, 1], [0, 0]]] } }
                ]
            })
            .to_string(),
        )
        .expect("can write zones");
        let response = zonal_statistics(ZonalStatisticsRequest {
            raster_path: raster,
            vector_path: zones.display().to_string(),
            stats: Some(vec!["mean".into(), "count".into()]),
        })
        .expect("zonal");
        assert_eq!(response.results[0]["index"], json!(0));
        assert_eq!(response.results[0]["mean"], json!(4.5));
        assert_eq!(response.results[0]["count"], json!(6));
        assert_eq!(response.results[1]["mean"], Value::Null);
    }

    #[test]
    fn write_raster_copies_the_reference_grid() {
        let dir = tempdir().expect("can create temporary directory");
        let reference = write_sample(dir.path(), "grid.tif", &sample_raster());
        let response = write_array(
            WriteRasterRequest {
                array: json!([[1, 1, 1, 1], [2, 2, 2, 2], [3, 3, 3, 3]]),
                reference_raster: reference,
                output_path: "written".into(),
                dtype: Some("uint8".into()),
            },
            dir.path(),
        )
        .expect("writes");
        let path = response.output_path.expect("path");
        assert!(path.ends_with("written.tif"));
        let back = io::read(&path).expect("reads");
        assert_eq!(back.dtype, DataType::UInt8);
        assert_eq!(back.geo_transform, sample_raster().geo_transform);
        assert_eq!(back.bands[0][4], 2.0);
    }
}
