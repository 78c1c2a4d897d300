//! Feature-table tools: shapefile and GeoJSON I/O, overlays and joins.

pub mod io;
pub mod join;
pub mod json;
pub mod overlay;
pub mod request;
mod router;
pub mod shp;
pub mod table;

use std::path::Path;

use crate::{lib::errors::GisError, tools::SUCCESS};

pub use io::{read_input, read_table, write_output, write_table, Driver};
pub use request::*;
pub(crate) use router::router;
pub use table::{Feature, FeatureTable};

use join::{JoinHow, Predicate};
use overlay::OverlayHow;

/// Read two layers, bringing the second into the first one's CRS.
fn read_pair(first: &str, second: &str) -> Result<(FeatureTable, FeatureTable), GisError> {
    let first = read_input(first)?;
    let second = first.align(read_input(second)?)?;
    Ok((first, second))
}

fn output_path_with_default_driver(root: &Path, raw: &str) -> Result<std::path::PathBuf, GisError> {
    let mut path = crate::lib::paths::resolve_output_path(root, raw)?;
    if path.extension().is_none() {
        path.set_extension("shp");
    }
    Ok(path)
}

/// Write `table` when the caller asked for an output and report where it went.
fn maybe_write(
    table: &FeatureTable,
    root: &Path,
    output_path: Option<&str>,
) -> Result<Option<String>, GisError> {
    match output_path.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => {
            let path = output_path_with_default_driver(root, raw)?;
            write_table(table, &path, None)?;
            Ok(Some(path.display().to_string()))
        }
        None => Ok(None),
    }
}

fn layer_response(
    table: &FeatureTable,
    message: String,
    output_path: Option<String>,
) -> LayerResponse {
    LayerResponse {
        status: SUCCESS.into(),
        message,
        num_features: table.len(),
        crs: table.crs_label(),
        columns: table.column_names(),
        preview: table.preview(),
        output_path,
    }
}

pub fn read_file(req: ReadFileRequest) -> Result<ReadFileResponse, GisError> {
    let table = read_input(&req.file_path)?;
    let columns = table.column_names();
    Ok(ReadFileResponse {
        status: SUCCESS.into(),
        message: format!(
            "File loaded successfully with {} rows and {} columns",
            table.len(),
            columns.len()
        ),
        num_rows: table.len(),
        num_columns: columns.len(),
        column_types: table.column_types(),
        crs: table.crs_label(),
        bounds: table.total_bounds(),
        preview: table.preview(),
        columns,
    })
}

fn combine_response(
    table: &FeatureTable,
    path: &Path,
    message: String,
    merge_type: Option<String>,
) -> CombineFilesResponse {
    CombineFilesResponse {
        status: SUCCESS.into(),
        message,
        info: CombineInfo {
            output_path: path.display().to_string(),
            merge_type,
            num_features: table.len(),
            crs: table.crs_label(),
            columns: table.column_names(),
        },
    }
}

pub fn append_files(
    req: CombineFilesRequest,
    root: &Path,
) -> Result<CombineFilesResponse, GisError> {
    let (first, second) = read_pair(&req.shapefile1_path, &req.shapefile2_path)?;
    let combined = join::append(&first, &second);
    let path = output_path_with_default_driver(root, &req.output_path)?;
    write_table(&combined, &path, None)?;
    Ok(combine_response(
        &combined,
        &path,
        format!("Shapefiles concatenated successfully into '{}'.", path.display()),
        None,
    ))
}

pub fn merge_files(
    req: CombineFilesRequest,
    root: &Path,
) -> Result<CombineFilesResponse, GisError> {
    let (left, right) = read_pair(&req.shapefile1_path, &req.shapefile2_path)?;
    let merged = join::merge(&left, &right)?;
    if merged.is_empty() {
        tracing::warn!(target: "gis_mcp::tools", "merge produced no matching records");
    }
    let path = output_path_with_default_driver(root, &req.output_path)?;
    write_table(&merged, &path, None)?;
    Ok(combine_response(
        &merged,
        &path,
        format!("Shapefiles merged successfully into '{}'.", path.display()),
        Some("inner".into()),
    ))
}

pub fn overlay_layers(req: OverlayLayersRequest, root: &Path) -> Result<LayerResponse, GisError> {
    let how = OverlayHow::parse(&req.how)?;
    let (first, second) = read_pair(&req.gdf1_path, &req.gdf2_path)?;
    let result = overlay::overlay(&first, &second, how)?;
    let output_path = maybe_write(&result, root, req.output_path.as_deref())?;
    Ok(layer_response(
        &result,
        format!("Overlay ({}) completed successfully.", how.name()),
        output_path,
    ))
}

pub fn dissolve(req: DissolveRequest, root: &Path) -> Result<LayerResponse, GisError> {
    let table = read_input(&req.gdf_path)?;
    let by = req.by.as_deref().map(str::trim).filter(|by| !by.is_empty());
    let result = overlay::dissolve(&table, by)?;
    let output_path = maybe_write(&result, root, req.output_path.as_deref())?;
    Ok(layer_response(
        &result,
        "Dissolve completed successfully.".into(),
        output_path,
    ))
}

pub fn explode(req: ExplodeRequest, root: &Path) -> Result<LayerResponse, GisError> {
    let table = read_input(&req.gdf_path)?;
    let result = overlay::explode(&table);
    let output_path = maybe_write(&result, root, req.output_path.as_deref())?;
    Ok(layer_response(
        &result,
        "Explode completed successfully.".into(),
        output_path,
    ))
}

pub fn clip_vector(req: ClipVectorRequest, root: &Path) -> Result<LayerResponse, GisError> {
    let (table, mask) = read_pair(&req.gdf_path, &req.clip_path)?;
    let result = overlay::clip(&table, &mask)?;
    let output_path = maybe_write(&result, root, req.output_path.as_deref())?;
    Ok(layer_response(
        &result,
        "Clip completed successfully.".into(),
        output_path,
    ))
}

pub fn spatial_join(req: SpatialJoinRequest, root: &Path) -> Result<LayerResponse, GisError> {
    let how = JoinHow::parse(&req.how)?;
    let predicate = Predicate::parse(&req.predicate)?;
    let (left, right) = read_pair(&req.left_path, &req.right_path)?;
    let result = join::sjoin(&left, &right, how, predicate);
    let output_path = maybe_write(&result, root, req.output_path.as_deref())?;
    Ok(layer_response(
        &result,
        format!(
            "Spatial join ({}, {}) completed successfully.",
            how.name(),
            req.predicate.trim()
        ),
        output_path,
    ))
}

pub fn nearest_join(req: NearestJoinRequest, root: &Path) -> Result<LayerResponse, GisError> {
    let how = JoinHow::parse(&req.how)?;
    let (left, right) = read_pair(&req.left_path, &req.right_path)?;
    let result = join::sjoin_nearest(&left, &right, how, req.max_distance)?;
    let output_path = maybe_write(&result, root, req.output_path.as_deref())?;
    Ok(layer_response(
        &result,
        format!("Nearest spatial join ({}) completed successfully.", how.name()),
        output_path,
    ))
}

pub fn point_in_polygon(
    req: PointInPolygonRequest,
    root: &Path,
) -> Result<LayerResponse, GisError> {
    let (points, polygons) = read_pair(&req.points_path, &req.polygons_path)?;
    let result = join::sjoin(&points, &polygons, JoinHow::Left, Predicate::Within);
    let output_path = maybe_write(&result, root, req.output_path.as_deref())?;
    Ok(layer_response(
        &result,
        "Point-in-polygon test completed successfully.".into(),
        output_path,
    ))
}

pub fn write_file(req: WriteFileRequest, root: &Path) -> Result<WriteFileResponse, GisError> {
    let driver = req
        .driver
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(Driver::from_name)
        .transpose()?;
    let table = read_input(&req.gdf_path)?;
    let path = match driver {
        Some(driver) => write_output(&table, root, &req.output_path, Some(driver))?,
        None => {
            let path = output_path_with_default_driver(root, &req.output_path)?;
            write_table(&table, &path, None)?;
            path
        }
    };
    Ok(WriteFileResponse {
        status: SUCCESS.into(),
        message: format!("GeoDataFrame exported to '{}' successfully.", path.display()),
        output_path: path.display().to_string(),
        crs: table.crs_label(),
        num_features: table.len(),
        columns: table.column_names(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    fn write_points(dir: &Path) -> String {
        let path = dir.join("points.geojson");
        std::fs::write(
            &path,
            json!({
                "type": "FeatureCollection",
                "features": [
                    { "type": "Feature", "properties": { "name": "a", "v": 1 },
                      "geometry": { "type": "Point", "coordinates": [0.5, 0.5] } },
                    { "type": "Feature", "properties": { "name": "b", "v": 2 },
                      "geometry": { "type": "Point", "coordinates": [3.0, 3.0] } }
                ]
            })
            .to_string(),
        )
        .expect("can write fixture");
        path.display().to_string()
    }

    #[test]
    fn read_file_reports_shape_and_preview() {
        let dir = tempdir().expect("can create temporary directory");
        let response = read_file(ReadFileRequest {
            file_path: write_points(dir.path()),
        })
        .expect("reads");
        assert_eq!(response.num_rows, 2);
        assert_eq!(response.num_columns, 3);
        assert_eq!(response.columns, vec!["name", "v", "geometry"]);
        assert_eq!(response.crs, "EPSG:4326");
        assert_eq!(response.bounds, Some([0.5, 0.5, 3.0, 3.0]));
        assert_eq!(
            response.message,
            "File loaded successfully with 2 rows and 3 columns"
        );
    }

    #[test]
    fn explode_writes_relative_outputs_under_root() {
        let dir = tempdir().expect("can create temporary directory");
        let input = write_points(dir.path());
        let response = explode(
            ExplodeRequest {
                gdf_path: input,
                output_path: Some("out/exploded.geojson".into()),
            },
            dir.path(),
        )
        .expect("explodes");
        let written = dir.path().join("out/exploded.geojson");
        assert_eq!(response.output_path, Some(written.display().to_string()));
        assert!(written.exists());
    }

    #[test]
    fn geopackage_driver_is_rejected_before_reading() {
        let dir = tempdir().expect("can create temporary directory");
        let err = write_file(
            WriteFileRequest {
                gdf_path: "/missing.shp".into(),
                output_path: "out.gpkg".into(),
                driver: Some("GPKG".into()),
            },
            dir.path(),
        )
        .expect_err("unsupported");
        assert!(matches!(err, GisError::UnsupportedFormat { .. }));
    }

    #[test]
    fn missing_inputs_are_reported() {
        let err = read_file(ReadFileRequest {
            file_path: "/no/such/layer.shp".into(),
        })
        .expect_err("missing");
        assert!(matches!(err, GisError::FileNotFound { .. }));
    }
}
