//! Geometry tools: WKT in, WKT (or a measurement) out.

pub mod codec;
pub mod ops;
pub mod request;
mod router;
pub mod triangulation;

use geo::{Geometry, GeometryCollection, MultiPolygon};

use crate::{lib::errors::GisError, tools::SUCCESS};

pub use request::*;
pub(crate) use router::router;

use codec::{geometry_type_name, parse_wkt, to_wkt};
use ops::{BufferParams, JoinStyle, Origin, Overlay};

fn geometry_response(geometry: &Geometry<f64>, message: &str) -> GeometryResponse {
    GeometryResponse {
        status: SUCCESS.into(),
        geometry: to_wkt(geometry),
        message: message.into(),
    }
}

pub fn buffer(req: BufferRequest) -> Result<GeometryResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    let params = BufferParams {
        distance: req.distance,
        resolution: req.resolution,
        join_style: JoinStyle::from_code(req.join_style)?,
        mitre_limit: req.mitre_limit,
        single_sided: req.single_sided,
    };
    let buffered = ops::buffer(&geometry, &params)?;
    Ok(geometry_response(&buffered, "Buffer created successfully"))
}

pub fn overlay(req: GeometryPairRequest, op: Overlay) -> Result<GeometryResponse, GisError> {
    let first = parse_wkt(&req.geometry1)?;
    let second = parse_wkt(&req.geometry2)?;
    let result = ops::overlay(&first, &second, op)?;
    let message = match op {
        Overlay::Intersection => "Intersection created successfully",
        Overlay::Union => "Union created successfully",
        Overlay::Difference => "Difference created successfully",
        Overlay::SymmetricDifference => "Symmetric difference created successfully",
    };
    Ok(geometry_response(&result, message))
}

pub fn convex_hull(req: GeometryRequest) -> Result<GeometryResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    Ok(geometry_response(
        &ops::convex_hull(&geometry),
        "Convex hull created successfully",
    ))
}

pub fn envelope(req: GeometryRequest) -> Result<GeometryResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    Ok(geometry_response(
        &ops::envelope(&geometry)?,
        "Envelope created successfully",
    ))
}

pub fn minimum_rotated_rectangle(req: GeometryRequest) -> Result<GeometryResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    Ok(geometry_response(
        &ops::minimum_rotated_rectangle(&geometry)?,
        "Minimum rotated rectangle created successfully",
    ))
}

pub fn centroid(req: GeometryRequest) -> Result<GeometryResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    let point = ops::centroid(&geometry)?;
    Ok(geometry_response(
        &Geometry::Point(point),
        "Centroid calculated successfully",
    ))
}

pub fn bounds(req: GeometryRequest) -> Result<BoundsResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    Ok(BoundsResponse {
        status: SUCCESS.into(),
        bounds: ops::bounds(&geometry)?,
        message: "Bounds calculated successfully".into(),
    })
}

pub fn coordinates(req: GeometryRequest) -> Result<CoordinatesResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    Ok(CoordinatesResponse {
        status: SUCCESS.into(),
        coordinates: ops::coordinates(&geometry),
        message: "Coordinates retrieved successfully".into(),
    })
}

pub fn geometry_type(req: GeometryRequest) -> Result<GeometryTypeResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    Ok(GeometryTypeResponse {
        status: SUCCESS.into(),
        geometry_type: geometry_type_name(&geometry).into(),
        message: "Geometry type retrieved successfully".into(),
    })
}

pub fn rotate(req: RotateRequest) -> Result<GeometryResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    let origin = Origin::parse(&req.origin)?;
    let rotated = ops::rotate(&geometry, req.angle, origin, req.use_radians)?;
    Ok(geometry_response(&rotated, "Geometry rotated successfully"))
}

pub fn scale(req: ScaleRequest) -> Result<GeometryResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    let origin = Origin::parse(&req.origin)?;
    let scaled = ops::scale(&geometry, req.xfact, req.yfact, origin)?;
    Ok(geometry_response(&scaled, "Geometry scaled successfully"))
}

pub fn translate(req: TranslateRequest) -> Result<GeometryResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    let moved = ops::translate(&geometry, req.xoff, req.yoff);
    Ok(geometry_response(&moved, "Geometry translated successfully"))
}

pub fn triangulate(req: GeometryRequest) -> Result<GeometriesResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    let triangles = triangulation::delaunay_triangles(&geometry)?;
    Ok(GeometriesResponse {
        status: SUCCESS.into(),
        message: format!("Triangulation created with {} triangles", triangles.len()),
        geometries: triangles
            .into_iter()
            .map(|t| to_wkt(&Geometry::Polygon(t)))
            .collect(),
    })
}

pub fn voronoi(req: GeometryRequest) -> Result<GeometryResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    let cells = triangulation::voronoi_cells(&geometry)?;
    let collection = GeometryCollection::new_from(
        cells.into_iter().map(Geometry::Polygon).collect(),
    );
    Ok(geometry_response(
        &Geometry::GeometryCollection(collection),
        "Voronoi diagram created successfully",
    ))
}

pub fn unary_union(req: UnaryUnionRequest) -> Result<GeometryResponse, GisError> {
    let geometries = codec::parse_wkt_list(&req.geometries)?;
    let merged = ops::unary_union_all(&geometries)?;
    Ok(geometry_response(&merged, "Unary union created successfully"))
}

pub fn length(req: GeometryRequest) -> Result<LengthResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    Ok(LengthResponse {
        status: SUCCESS.into(),
        length: ops::length(&geometry),
        message: "Length calculated successfully".into(),
    })
}

pub fn area(req: GeometryRequest) -> Result<AreaResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    Ok(AreaResponse {
        status: SUCCESS.into(),
        area: ops::area(&geometry),
        message: "Area calculated successfully".into(),
    })
}

pub fn is_valid(req: GeometryRequest) -> Result<ValidityResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    let (is_valid, reason) = ops::validity(&geometry);
    Ok(ValidityResponse {
        status: SUCCESS.into(),
        is_valid,
        reason,
        message: "Validity checked successfully".into(),
    })
}

pub fn make_valid(req: GeometryRequest) -> Result<GeometryResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    let repaired = ops::make_valid(&geometry);
    Ok(geometry_response(&repaired, "Geometry made valid successfully"))
}

pub fn simplify(req: SimplifyRequest) -> Result<GeometryResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    let simplified = ops::simplify(&geometry, req.tolerance, req.preserve_topology)?;
    Ok(geometry_response(&simplified, "Geometry simplified successfully"))
}

pub fn snap(req: SnapRequest) -> Result<GeometryResponse, GisError> {
    let geometry = parse_wkt(&req.geometry1)?;
    let reference = parse_wkt(&req.geometry2)?;
    let snapped = ops::snap(&geometry, &reference, req.tolerance)?;
    Ok(geometry_response(&snapped, "Geometry snapped successfully"))
}

pub fn nearest_point(req: GeometryPairRequest) -> Result<NearestPointResponse, GisError> {
    let source = parse_wkt(&req.geometry1)?;
    let target = parse_wkt(&req.geometry2)?;
    let point = ops::nearest_point(&source, &target)?;
    Ok(NearestPointResponse {
        status: SUCCESS.into(),
        nearest_point: to_wkt(&Geometry::Point(point)),
        message: "Nearest point found successfully".into(),
    })
}

pub fn normalize(req: GeometryRequest) -> Result<GeometryResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    Ok(geometry_response(
        &ops::normalize(&geometry),
        "Geometry normalized successfully",
    ))
}

pub fn geometry_to_geojson(req: GeometryRequest) -> Result<GeoJsonResponse, GisError> {
    let geometry = parse_wkt(&req.geometry)?;
    Ok(GeoJsonResponse {
        status: SUCCESS.into(),
        geojson: codec::to_geojson(&geometry)?,
        message: "Geometry converted to GeoJSON successfully".into(),
    })
}

pub fn geojson_to_geometry(req: GeoJsonRequest) -> Result<GeometryResponse, GisError> {
    let geometry = codec::from_geojson(req.geojson)?;
    Ok(geometry_response(
        &geometry,
        "GeoJSON converted to geometry successfully",
    ))
}

/// Areal parts of a parsed geometry, for callers that only accept polygons.
pub fn polygons_of(geometry: &Geometry<f64>) -> Result<MultiPolygon<f64>, GisError> {
    ops::as_multi_polygon(geometry).ok_or_else(|| {
        GisError::unsupported_geometry(format!(
            "expected a polygon, got {}",
            geometry_type_name(geometry)
        ))
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn req(wkt: &str) -> GeometryRequest {
        GeometryRequest {
            geometry: wkt.into(),
        }
    }

    #[test]
    fn buffer_reports_success_and_polygon() {
        let response = buffer(BufferRequest {
            geometry: "POINT (0 0)".into(),
            distance: 1.0,
            resolution: 8,
            join_style: 1,
            mitre_limit: 5.0,
            single_sided: false,
        })
        .expect("buffers");
        assert_eq!(response.status, "success");
        let parsed = parse_wkt(&response.geometry).expect("valid WKT");
        assert_eq!(geometry_type_name(&parsed), "Polygon");
    }

    #[test]
    fn area_of_rectangle() {
        let response = area(req("POLYGON ((0 0, 4 0, 4 2, 0 2, 0 0))")).expect("area");
        assert_eq!(response.area, 8.0);
    }

    #[test]
    fn geometry_type_uses_ogc_names() {
        let response = geometry_type(req("MULTIPOINT ((0 0), (1 1))")).expect("type");
        assert_eq!(response.geometry_type, "MultiPoint");
    }

    #[test]
    fn bad_wkt_surfaces_invalid_geometry() {
        let err = length(req("LINESTRING (0 0")).expect_err("rejects");
        assert!(matches!(err, GisError::InvalidGeometry { .. }));
    }

    #[test]
    fn geojson_round_trip_keeps_type() {
        let encoded = geometry_to_geojson(req("LINESTRING (0 0, 1 1)")).expect("encodes");
        assert_eq!(encoded.geojson["type"], json!("LineString"));
        let decoded = geojson_to_geometry(GeoJsonRequest {
            geojson: encoded.geojson,
        })
        .expect("decodes");
        let parsed = parse_wkt(&decoded.geometry).expect("valid WKT");
        assert_eq!(ops::coordinates(&parsed), vec![[0.0, 0.0], [1.0, 1.0]]);
    }

    #[test]
    fn voronoi_returns_collection() {
        let response = voronoi(req("MULTIPOINT ((0 0), (2 0), (1 2))")).expect("voronoi");
        let parsed = parse_wkt(&response.geometry).expect("valid WKT");
        assert_eq!(geometry_type_name(&parsed), "GeometryCollection");
    }

    #[test]
    fn polygons_of_rejects_lines() {
        let line = parse_wkt("LINESTRING (0 0, 1 1)").expect("parses");
        assert!(matches!(
            polygons_of(&line),
            Err(GisError::UnsupportedGeometry { .. })
        ));
    }
}
