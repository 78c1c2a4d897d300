//! Projection and geodesy tools.

pub mod catalog;
pub mod ellipsoid;
pub mod geodesy;
pub mod projection;
pub mod request;
mod router;
pub mod utm;

use geo::Geometry;

use crate::{
    lib::errors::GisError,
    tools::{
        geometry::{codec, polygons_of},
        SUCCESS,
    },
};

pub use projection::{normalize_crs, Transformer};
pub use request::*;
pub(crate) use router::router;

use ellipsoid::Ellipsoid;

/// Read a `[x, y]` pair from a loosely typed list.
pub fn xy(values: &[f64], field: &str) -> Result<[f64; 2], GisError> {
    match values {
        [x, y] if x.is_finite() && y.is_finite() => Ok([*x, *y]),
        [_, _] => Err(GisError::invalid_input(format!(
            "{field} must contain finite numbers"
        ))),
        _ => Err(GisError::invalid_input(format!(
            "{field} must be a pair [x, y], got {} values",
            values.len()
        ))),
    }
}

pub fn transform_coordinates(
    req: TransformCoordinatesRequest,
) -> Result<TransformCoordinatesResponse, GisError> {
    let [x, y] = xy(&req.coordinates, "coordinates")?;
    let transformer = Transformer::new(&req.source_crs, &req.target_crs)?;
    let (tx, ty) = transformer.convert(x, y)?;
    Ok(TransformCoordinatesResponse {
        status: SUCCESS.into(),
        coordinates: [tx, ty],
        source_crs: transformer.source.clone(),
        target_crs: transformer.target.clone(),
        message: "Coordinates transformed successfully".into(),
    })
}

pub fn project_geometry(req: ProjectGeometryRequest) -> Result<ProjectGeometryResponse, GisError> {
    let geometry = codec::parse_wkt(&req.geometry)?;
    let transformer = Transformer::new(&req.source_crs, &req.target_crs)?;
    let projected = transformer.geometry(&geometry)?;
    Ok(ProjectGeometryResponse {
        status: SUCCESS.into(),
        geometry: codec::to_wkt(&projected),
        source_crs: transformer.source.clone(),
        target_crs: transformer.target.clone(),
        message: "Geometry projected successfully".into(),
    })
}

pub fn crs_info(req: CrsRequest) -> Result<CrsInfoResponse, GisError> {
    let info = projection::describe_crs(&req.crs)?;
    Ok(CrsInfoResponse {
        status: SUCCESS.into(),
        info,
        message: "CRS information retrieved successfully".into(),
    })
}

pub fn available_crs() -> Result<AvailableCrsResponse, GisError> {
    let crs_list = catalog::well_known_crs();
    Ok(AvailableCrsResponse {
        status: SUCCESS.into(),
        message: format!("Listed {} well-known CRSs", crs_list.len()),
        crs_list,
    })
}

pub fn geod_info(req: GeodInfoRequest) -> Result<GeodInfoResponse, GisError> {
    let ellipsoid = Ellipsoid::resolve(&req.ellps, req.a, req.b, req.f)?;
    Ok(GeodInfoResponse {
        status: SUCCESS.into(),
        b: ellipsoid.b(),
        es: ellipsoid.es(),
        e: ellipsoid.e(),
        a: ellipsoid.a,
        f: ellipsoid.f,
        ellps: ellipsoid.name,
        message: "Geod information retrieved successfully".into(),
    })
}

pub fn geodetic_distance(
    req: GeodeticDistanceRequest,
) -> Result<GeodeticDistanceResponse, GisError> {
    let ellipsoid = Ellipsoid::named(&req.ellps)?;
    let from = xy(&req.point1, "point1")?;
    let to = xy(&req.point2, "point2")?;
    let solution = geodesy::inverse(&ellipsoid, from, to)?;
    Ok(GeodeticDistanceResponse {
        status: SUCCESS.into(),
        distance: solution.distance,
        forward_azimuth: solution.forward_azimuth,
        back_azimuth: solution.back_azimuth,
        unit: "meters".into(),
        message: "Geodetic distance calculated successfully".into(),
    })
}

pub fn geodetic_point(req: GeodeticPointRequest) -> Result<GeodeticPointResponse, GisError> {
    let ellipsoid = Ellipsoid::named(&req.ellps)?;
    let start = xy(&req.start_point, "start_point")?;
    let solution = geodesy::direct(&ellipsoid, start, req.azimuth, req.distance)?;
    Ok(GeodeticPointResponse {
        status: SUCCESS.into(),
        point: [solution.lon, solution.lat],
        back_azimuth: solution.back_azimuth,
        message: "Geodetic point calculated successfully".into(),
    })
}

pub fn geodetic_area(req: GeodeticAreaRequest) -> Result<GeodeticAreaResponse, GisError> {
    let ellipsoid = Ellipsoid::named(&req.ellps)?;
    let geometry: Geometry<f64> = codec::parse_wkt(&req.geometry)?;
    let polygons = polygons_of(&geometry)?;
    let area = geodesy::polygon_area(&ellipsoid, &polygons)?;
    Ok(GeodeticAreaResponse {
        status: SUCCESS.into(),
        area,
        unit: "square_meters".into(),
        message: "Geodetic area calculated successfully".into(),
    })
}

pub fn utm_zone(req: LonLatRequest) -> Result<UtmZoneResponse, GisError> {
    let [lon, lat] = xy(&req.coordinates, "coordinates")?;
    let zone = utm::utm_zone(lon, lat)?;
    Ok(UtmZoneResponse {
        status: SUCCESS.into(),
        zone: zone.to_string(),
        message: "UTM zone retrieved successfully".into(),
    })
}

pub fn utm_crs(req: LonLatRequest) -> Result<CrsCodeResponse, GisError> {
    let [lon, lat] = xy(&req.coordinates, "coordinates")?;
    Ok(CrsCodeResponse {
        status: SUCCESS.into(),
        crs: utm::utm_epsg(lon, lat)?,
        message: "UTM CRS retrieved successfully".into(),
    })
}

pub fn geocentric_crs(req: LonLatRequest) -> Result<CrsCodeResponse, GisError> {
    xy(&req.coordinates, "coordinates")?;
    Ok(CrsCodeResponse {
        status: SUCCESS.into(),
        crs: "EPSG:4978".into(),
        message: "Geocentric CRS retrieved successfully".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_must_have_two_values() {
        assert!(xy(&[1.0], "coordinates").is_err());
        assert!(xy(&[1.0, f64::NAN], "coordinates").is_err());
        assert_eq!(xy(&[1.0, 2.0], "coordinates").expect("pair"), [1.0, 2.0]);
    }

    #[test]
    fn geod_info_for_custom_ellipsoid() {
        let response = geod_info(GeodInfoRequest {
            ellps: "WGS84".into(),
            a: Some(6_378_137.0),
            b: None,
            f: Some(0.0),
        })
        .expect("custom");
        assert_eq!(response.ellps, "custom");
        assert_eq!(response.b, 6_378_137.0);
        assert_eq!(response.es, 0.0);
    }

    #[test]
    fn geodetic_area_rejects_points() {
        let err = geodetic_area(GeodeticAreaRequest {
            geometry: "POINT (0 0)".into(),
            ellps: "WGS84".into(),
        })
        .expect_err("points have no area");
        assert!(matches!(err, GisError::UnsupportedGeometry { .. }));
    }

    #[test]
    fn utm_zone_is_a_string() {
        let response = utm_zone(LonLatRequest {
            coordinates: vec![-73.98, 40.75],
        })
        .expect("zone");
        assert_eq!(response.zone, "18");
    }

    #[test]
    fn geocentric_is_fixed() {
        let response = geocentric_crs(LonLatRequest {
            coordinates: vec![0.0, 0.0],
        })
        .expect("crs");
        assert_eq!(response.crs, "EPSG:4978");
    }
}
