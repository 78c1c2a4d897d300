//! UTM zone lookup, including the Norway and Svalbard exceptions.

use crate::lib::errors::GisError;

pub fn utm_zone(lon: f64, lat: f64) -> Result<u8, GisError> {
    if !(lon.is_finite() && lat.is_finite()) {
        return Err(GisError::invalid_input("coordinates must be finite numbers"));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(GisError::invalid_input(format!(
            "longitude {lon} is outside [-180, 180]"
        )));
    }
    if !(-80.0..=84.0).contains(&lat) {
        return Err(GisError::invalid_input(format!(
            "latitude {lat} is outside the UTM range [-80, 84]"
        )));
    }

    if (56.0..64.0).contains(&lat) && (3.0..12.0).contains(&lon) {
        return Ok(32);
    }
    if (72.0..=84.0).contains(&lat) && (0.0..42.0).contains(&lon) {
        return Ok(match lon {
            l if l < 9.0 => 31,
            l if l < 21.0 => 33,
            l if l < 33.0 => 35,
            _ => 37,
        });
    }

    let zone = ((lon + 180.0) / 6.0).floor() as i32 + 1;
    Ok(zone.clamp(1, 60) as u8)
}

/// EPSG code of the WGS 84 / UTM CRS covering a point.
pub fn utm_epsg(lon: f64, lat: f64) -> Result<String, GisError> {
    let zone = utm_zone(lon, lat)?;
    let base = if lat >= 0.0 { 32600 } else { 32700 };
    Ok(format!("EPSG:{}", base + zone as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_zones() {
        assert_eq!(utm_zone(-180.0, 0.0).expect("zone"), 1);
        assert_eq!(utm_zone(13.4, 52.5).expect("zone"), 33);
        assert_eq!(utm_zone(180.0, 0.0).expect("zone"), 60);
    }

    #[test]
    fn norway_and_svalbard_exceptions() {
        assert_eq!(utm_zone(5.3, 60.4).expect("zone"), 32);
        assert_eq!(utm_zone(15.0, 78.0).expect("zone"), 33);
    }

    #[test]
    fn hemisphere_selects_epsg_block() {
        assert_eq!(utm_epsg(13.4, 52.5).expect("crs"), "EPSG:32633");
        assert_eq!(utm_epsg(151.2, -33.9).expect("crs"), "EPSG:32756");
    }

    #[test]
    fn polar_latitudes_are_rejected() {
        assert!(utm_zone(0.0, 85.0).is_err());
        assert!(utm_zone(0.0, -81.0).is_err());
    }
}
