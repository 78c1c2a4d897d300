//! Mapping from `GisError` to structured MCP error data.
use rmcp::model::ErrorData;
use serde_json::{json, Value};

use crate::lib::errors::{ErrorScope, GisError, ToolErrorDescriptor};

const INVALID_INPUT_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "invalid_input",
    "Tool arguments are invalid",
    "Check the parameter values against the tool schema and retry.",
);
const INVALID_GEOMETRY_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "invalid_geometry",
    "Geometry could not be parsed",
    "Pass a valid WKT string such as `POINT (0 0)`.",
);
const UNSUPPORTED_GEOMETRY_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "unsupported_geometry",
    "Geometry type is not supported by this operation",
    "Convert the input to a polygonal geometry or use a different operation.",
);
const FILE_NOT_FOUND_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "file_not_found",
    "Input file does not exist",
    "Pass an existing absolute path or a path relative to the server's working directory.",
);
const MISSING_COLUMNS_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "missing_columns",
    "Requested columns are not in the dataset",
    "Call read_file_gpd to list the available columns.",
);
const CRS_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "crs_error",
    "Coordinate reference system operation failed",
    "Use an authority code such as `EPSG:4326` \
     and check that the coordinates fall inside its area of use.",
);
const RASTER_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "raster_error",
    "Raster operation failed",
    "Check the raster path, band indices and that GDAL can open the file.",
);
const VECTOR_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "vector_error",
    "Vector data operation failed",
    "Check that the file is a readable shapefile or GeoJSON document.",
);
const STATISTICS_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "statistics_error",
    "Spatial statistics computation failed",
    "Check the variable columns and the weights parameters (threshold, k).",
);
const RENDER_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "render_error",
    "Map could not be drawn",
    "Check the layer styles and that every layer has drawable geometries.",
);
const UNSUPPORTED_FORMAT_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "unsupported_format",
    "File format or driver is not supported",
    "Use a .shp, .geojson or .tif path, or one of the documented drivers.",
);
const OUTPUT_EXISTS_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "output_exists",
    "Output file already exists",
    "Pass overwrite=true or choose a different output path.",
);
const IO_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "io_error",
    "Reading or writing a file failed",
    "Check permissions on the path and free space under the storage root.",
);
const INTERNAL_ERROR: ToolErrorDescriptor = ToolErrorDescriptor::new(
    "internal_error",
    "Tool execution failed unexpectedly",
    "Check the server logs; retry if the failure was transient.",
);

/// Pick the descriptor, scope and retry hint for an error.
pub fn describe(error: &GisError) -> (&'static ToolErrorDescriptor, ErrorScope, bool) {
    match error {
        GisError::InvalidInput { .. } => (&INVALID_INPUT_ERROR, ErrorScope::Input, false),
        GisError::InvalidGeometry { .. } => (&INVALID_GEOMETRY_ERROR, ErrorScope::Input, false),
        GisError::UnsupportedGeometry { .. } => {
            (&UNSUPPORTED_GEOMETRY_ERROR, ErrorScope::Input, false)
        }
        GisError::FileNotFound { .. } => (&FILE_NOT_FOUND_ERROR, ErrorScope::Input, false),
        GisError::MissingColumns { .. } => (&MISSING_COLUMNS_ERROR, ErrorScope::Input, false),
        GisError::UnsupportedFormat { .. } => {
            (&UNSUPPORTED_FORMAT_ERROR, ErrorScope::Input, false)
        }
        GisError::Crs { .. } => (&CRS_ERROR, ErrorScope::Data, false),
        GisError::Raster { .. } => (&RASTER_ERROR, ErrorScope::Data, false),
        GisError::Vector { .. } => (&VECTOR_ERROR, ErrorScope::Data, false),
        GisError::Statistics { .. } => (&STATISTICS_ERROR, ErrorScope::Computation, false),
        GisError::Render { .. } => (&RENDER_ERROR, ErrorScope::Computation, false),
        GisError::OutputExists { .. } => (&OUTPUT_EXISTS_ERROR, ErrorScope::Storage, false),
        GisError::Io { .. } => (&IO_ERROR, ErrorScope::Storage, true),
        GisError::Internal { .. } => (&INTERNAL_ERROR, ErrorScope::Computation, true),
    }
}

fn details_for(error: &GisError) -> Value {
    match error {
        GisError::FileNotFound { path } | GisError::OutputExists { path } => {
            json!({ "path": path.to_string_lossy(), "reason": error.to_string() })
        }
        GisError::Io { path, source } => {
            json!({ "path": path.to_string_lossy(), "reason": source.to_string() })
        }
        GisError::MissingColumns { columns } => json!({ "columns": columns }),
        GisError::UnsupportedFormat { format } => json!({ "format": format }),
        _ => json!({ "reason": error.to_string() }),
    }
}

/// Convert a tool failure into MCP error data tagged with the tool name.
pub fn gis_error_to_error_data(tool: &str, error: GisError) -> ErrorData {
    let (descriptor, scope, retryable) = describe(&error);
    build_error_data(descriptor, details_for(&error), scope, retryable, tool)
}

fn build_error_data(
    desc: &'static ToolErrorDescriptor,
    details: Value,
    scope: ErrorScope,
    retryable: bool,
    tool: &str,
) -> ErrorData {
    desc.builder()
        .details(details)
        .scope(scope)
        .retryable(retryable)
        .with_context_field("tool", json!(tool))
        .build()
        .expect("descriptor is valid")
}
