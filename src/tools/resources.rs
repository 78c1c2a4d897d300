//! Static `gis://` resources listing the operations of each tool family.

use rmcp::model::{
    AnnotateAble, ErrorData, RawResource, ReadResourceResult, Resource, ResourceContents,
};
use serde_json::json;

const MIME_JSON: &str = "application/json";

/// One listing: URI, short name, description and the tool names it covers.
struct Listing {
    uri: &'static str,
    name: &'static str,
    description: &'static str,
    operations: &'static [&'static str],
}

const LISTINGS: &[Listing] = &[
    Listing {
        uri: "gis://operations/basic",
        name: "basic_operations",
        description: "Basic set operations on WKT geometries",
        operations: &["buffer", "intersection", "union", "difference", "symmetric_difference"],
    },
    Listing {
        uri: "gis://operations/geometric",
        name: "geometric_properties",
        description: "Derived shapes and geometric properties",
        operations: &[
            "convex_hull",
            "envelope",
            "minimum_rotated_rectangle",
            "get_centroid",
            "get_bounds",
            "get_coordinates",
            "get_geometry_type",
        ],
    },
    Listing {
        uri: "gis://operations/transformations",
        name: "geometry_transformations",
        description: "Affine transformations of geometries",
        operations: &["rotate_geometry", "scale_geometry", "translate_geometry"],
    },
    Listing {
        uri: "gis://operations/advanced",
        name: "advanced_operations",
        description: "Triangulation, Voronoi diagrams and unions",
        operations: &["triangulate_geometry", "voronoi", "unary_union_geometries"],
    },
    Listing {
        uri: "gis://operations/measurements",
        name: "measurements",
        description: "Planar length and area",
        operations: &["get_length", "get_area"],
    },
    Listing {
        uri: "gis://operations/validation",
        name: "validation",
        description: "Validity checks, repair and simplification",
        operations: &["is_valid", "make_valid", "simplify"],
    },
    Listing {
        uri: "gis://operations/shapely_util",
        name: "geometry_utilities",
        description: "Snapping, nearest points, normalization and GeoJSON conversion",
        operations: &[
            "snap_geometry",
            "nearest_point_on_geometry",
            "normalize_geometry",
            "geometry_to_geojson",
            "geojson_to_geometry",
        ],
    },
    Listing {
        uri: "gis://crs/transformations",
        name: "crs_transformations",
        description: "Coordinate and geometry reprojection",
        operations: &["transform_coordinates", "project_geometry"],
    },
    Listing {
        uri: "gis://crs/info",
        name: "crs_info",
        description: "CRS lookup and UTM helpers",
        operations: &[
            "get_crs_info",
            "get_available_crs",
            "get_utm_zone",
            "get_utm_crs",
            "get_geocentric_crs",
        ],
    },
    Listing {
        uri: "gis://crs/geodetic",
        name: "geodetic_operations",
        description: "Ellipsoidal distances, points and areas",
        operations: &[
            "get_geod_info",
            "calculate_geodetic_distance",
            "calculate_geodetic_point",
            "calculate_geodetic_area",
        ],
    },
    Listing {
        uri: "gis://geopandas/io",
        name: "vector_io",
        description: "Reading, writing and reshaping vector layers",
        operations: &[
            "read_file_gpd",
            "overlay_gpd",
            "dissolve_gpd",
            "explode_gpd",
            "clip_vector",
            "write_file_gpd",
        ],
    },
    Listing {
        uri: "gis://geopandas/joins",
        name: "vector_joins",
        description: "Combining and spatially joining vector layers",
        operations: &[
            "append_gpd",
            "merge_gpd",
            "sjoin_gpd",
            "sjoin_nearest_gpd",
            "point_in_polygon",
        ],
    },
    Listing {
        uri: "gis://operation/rasterio",
        name: "raster_operations",
        description: "Raster metadata, analysis and processing",
        operations: &[
            "metadata_raster",
            "get_raster_crs",
            "clip_raster_with_shapefile",
            "resample_raster",
            "reproject_raster",
            "weighted_band_sum",
            "concat_bands",
            "raster_algebra",
            "compute_ndvi",
            "raster_histogram",
            "tile_raster",
            "raster_band_statistics",
            "extract_band",
            "zonal_statistics",
            "reclassify_raster",
            "focal_statistics",
            "hillshade",
            "write_raster",
        ],
    },
    Listing {
        uri: "gis://operations/esda",
        name: "esda_operations",
        description: "Exploratory spatial data analysis statistics",
        operations: &[
            "getis_ord_g",
            "morans_i",
            "gearys_c",
            "gamma_statistic",
            "moran_local",
            "getis_ord_g_local",
            "join_counts",
            "join_counts_local",
            "adbscan",
        ],
    },
    Listing {
        uri: "gis://operations/visualization",
        name: "visualization_operations",
        description: "Static map images and interactive web maps",
        operations: &["create_map", "create_web_map"],
    },
];

/// Resource descriptors for `resources/list`.
pub fn list() -> Vec<Resource> {
    LISTINGS
        .iter()
        .map(|listing| {
            let mut raw = RawResource::new(listing.uri, listing.name);
            raw.description = Some(listing.description.to_string());
            raw.mime_type = Some(MIME_JSON.to_string());
            raw.no_annotation()
        })
        .collect()
}

/// Tool names covered by `uri`, if it is a known listing.
pub fn operations(uri: &str) -> Option<&'static [&'static str]> {
    LISTINGS
        .iter()
        .find(|listing| listing.uri == uri)
        .map(|listing| listing.operations)
}

/// Contents of `uri` as `{"operations": [...]}`.
pub fn read(uri: &str) -> Result<ReadResourceResult, ErrorData> {
    let Some(operations) = operations(uri) else {
        tracing::debug!(target: "gis_mcp::tools", uri, "unknown resource requested");
        return Err(ErrorData::resource_not_found(
            format!("Unknown resource: {uri}"),
            Some(json!({ "uri": uri })),
        ));
    };
    let body = json!({ "operations": operations }).to_string();
    let mut contents = ResourceContents::text(body, uri);
    if let ResourceContents::TextResourceContents { mime_type, .. } = &mut contents {
        *mime_type = Some(MIME_JSON.to_string());
    }
    Ok(ReadResourceResult {
        contents: vec![contents],
    })
}
