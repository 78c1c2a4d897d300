//! Geodesic measurements on an ellipsoid via `geographiclib-rs`.

use geo::{LineString, MultiPolygon};
use geographiclib_rs::{DirectGeodesic, Geodesic, InverseGeodesic, PolygonArea, Winding};

use super::ellipsoid::Ellipsoid;
use crate::lib::errors::GisError;

#[derive(Debug, Clone, PartialEq)]
pub struct InverseSolution {
    pub distance: f64,
    pub forward_azimuth: f64,
    pub back_azimuth: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectSolution {
    pub lon: f64,
    pub lat: f64,
    pub back_azimuth: f64,
}

fn geodesic(ellipsoid: &Ellipsoid) -> Geodesic {
    Geodesic::new(ellipsoid.a, ellipsoid.f)
}

/// Wrap an azimuth into (-180, 180].
fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 {
        180.0
    } else {
        wrapped
    }
}

pub fn check_lon_lat(lon: f64, lat: f64) -> Result<(), GisError> {
    if !(lon.is_finite() && lat.is_finite()) {
        return Err(GisError::invalid_input("coordinates must be finite numbers"));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(GisError::invalid_input(format!(
            "latitude {lat} is outside [-90, 90]; pass points as [lon, lat]"
        )));
    }
    Ok(())
}

/// Distance and azimuths between two `[lon, lat]` points.
pub fn inverse(
    ellipsoid: &Ellipsoid,
    from: [f64; 2],
    to: [f64; 2],
) -> Result<InverseSolution, GisError> {
    check_lon_lat(from[0], from[1])?;
    check_lon_lat(to[0], to[1])?;
    let (distance, azi1, azi2, _arc): (f64, f64, f64, f64) =
        geodesic(ellipsoid).inverse(from[1], from[0], to[1], to[0]);
    Ok(InverseSolution {
        distance,
        forward_azimuth: azi1,
        back_azimuth: wrap_degrees(azi2 + 180.0),
    })
}

/// Destination reached from `[lon, lat]` along `azimuth` for `distance` metres.
pub fn direct(
    ellipsoid: &Ellipsoid,
    start: [f64; 2],
    azimuth: f64,
    distance: f64,
) -> Result<DirectSolution, GisError> {
    check_lon_lat(start[0], start[1])?;
    if !(azimuth.is_finite() && distance.is_finite()) {
        return Err(GisError::invalid_input(
            "azimuth and distance must be finite numbers",
        ));
    }
    let (lat, lon, azi2): (f64, f64, f64) =
        geodesic(ellipsoid).direct(start[1], start[0], azimuth, distance);
    Ok(DirectSolution {
        lon,
        lat,
        back_azimuth: wrap_degrees(azi2 + 180.0),
    })
}

fn ring_area(geod: &Geodesic, ring: &LineString<f64>) -> Result<f64, GisError> {
    let mut polygon = PolygonArea::new(geod, Winding::CounterClockwise);
    let coords = ring.0.as_slice();
    // Drop the closing vertex; PolygonArea closes rings itself.
    let open = match (coords.first(), coords.last()) {
        (Some(first), Some(last)) if coords.len() > 1 && first == last => {
            &coords[..coords.len() - 1]
        }
        _ => coords,
    };
    for coord in open {
        check_lon_lat(coord.x, coord.y)?;
        polygon.add_point(coord.y, coord.x);
    }
    let (_perimeter, area, _count) = polygon.compute(true);
    Ok(area.abs())
}

/// Absolute ellipsoidal area of lon/lat polygons, holes subtracted.
pub fn polygon_area(ellipsoid: &Ellipsoid, polygons: &MultiPolygon<f64>) -> Result<f64, GisError> {
    let geod = geodesic(ellipsoid);
    let mut total = 0.0;
    for polygon in &polygons.0 {
        total += ring_area(&geod, polygon.exterior())?;
        for hole in polygon.interiors() {
            total -= ring_area(&geod, hole)?;
        }
    }
    Ok(total.abs())
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    fn wgs84() -> Ellipsoid {
        Ellipsoid::named("WGS84").expect("known")
    }

    #[test]
    fn one_degree_of_longitude_on_equator() {
        let solution = inverse(&wgs84(), [0.0, 0.0], [1.0, 0.0]).expect("solves");
        assert!((solution.distance - 111_319.490_8).abs() < 0.01);
        assert!((solution.forward_azimuth - 90.0).abs() < 1e-9);
        assert!((solution.back_azimuth + 90.0).abs() < 1e-9);
    }

    #[test]
    fn direct_inverts_inverse() {
        let ellipsoid = wgs84();
        let start = [2.35, 48.85];
        let there = direct(&ellipsoid, start, 45.0, 10_000.0).expect("direct");
        let back = inverse(&ellipsoid, start, [there.lon, there.lat]).expect("inverse");
        assert!((back.distance - 10_000.0).abs() < 1e-6);
        assert!((back.forward_azimuth - 45.0).abs() < 1e-9);
    }

    #[test]
    fn latitude_out_of_range_is_rejected() {
        assert!(inverse(&wgs84(), [0.0, 95.0], [1.0, 0.0]).is_err());
    }

    #[test]
    fn one_degree_cell_area_is_positive_either_winding() {
        let ccw = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]]);
        let area = polygon_area(&wgs84(), &ccw).expect("area");
        // About 12,308 km² for the 1°x1° cell at the equator.
        assert!((area / 1e6 - 12_308.8).abs() < 1.0, "area was {area}");

        let cw = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 0.0, y: 1.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 0.0),
            (x: 0.0, y: 0.0),
        ]]);
        let area_cw = polygon_area(&wgs84(), &cw).expect("area");
        assert!((area - area_cw).abs() < 1e-3);
    }
}
