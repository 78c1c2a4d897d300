//! Reference ellipsoids accepted by the geodesic tools.

use crate::lib::errors::GisError;

#[derive(Debug, Clone, PartialEq)]
pub struct Ellipsoid {
    pub name: String,
    /// Semi-major axis in metres.
    pub a: f64,
    /// Flattening.
    pub f: f64,
}

enum Shape {
    InverseFlattening(f64),
    SemiMinor(f64),
    Flattening(f64),
}

const KNOWN: &[(&str, f64, Shape)] = &[
    ("WGS84", 6_378_137.0, Shape::InverseFlattening(298.257_223_563)),
    ("GRS80", 6_378_137.0, Shape::InverseFlattening(298.257_222_101)),
    ("WGS72", 6_378_135.0, Shape::InverseFlattening(298.26)),
    ("clrk66", 6_378_206.4, Shape::SemiMinor(6_356_583.8)),
    ("clrk80", 6_378_249.145, Shape::InverseFlattening(293.4663)),
    ("intl", 6_378_388.0, Shape::InverseFlattening(297.0)),
    ("bessel", 6_377_397.155, Shape::InverseFlattening(299.152_812_8)),
    ("airy", 6_377_563.396, Shape::SemiMinor(6_356_256.910)),
    ("krass", 6_378_245.0, Shape::InverseFlattening(298.3)),
    ("aust_SA", 6_378_160.0, Shape::InverseFlattening(298.25)),
    ("sphere", 6_370_997.0, Shape::Flattening(0.0)),
];

impl Ellipsoid {
    /// Look up a named ellipsoid, case-insensitively.
    pub fn named(name: &str) -> Result<Self, GisError> {
        let wanted = name.trim();
        KNOWN
            .iter()
            .find(|(known, _, _)| known.eq_ignore_ascii_case(wanted))
            .map(|(known, a, shape)| {
                let f = match shape {
                    Shape::InverseFlattening(rf) => 1.0 / rf,
                    Shape::SemiMinor(b) => (a - b) / a,
                    Shape::Flattening(f) => *f,
                };
                Self {
                    name: (*known).to_string(),
                    a: *a,
                    f,
                }
            })
            .ok_or_else(|| {
                GisError::invalid_input(format!(
                    "unknown ellipsoid {wanted:?}; use one of {}",
                    Self::names().join(", ")
                ))
            })
    }

    /// Custom ellipsoid from `a` and either `b` or `f`.
    pub fn custom(a: f64, b: Option<f64>, f: Option<f64>) -> Result<Self, GisError> {
        if !(a.is_finite() && a > 0.0) {
            return Err(GisError::invalid_input("a must be a positive number"));
        }
        let f = match (b, f) {
            (_, Some(f)) => f,
            (Some(b), None) => (a - b) / a,
            (None, None) => {
                return Err(GisError::invalid_input(
                    "a custom ellipsoid needs b or f alongside a",
                ))
            }
        };
        if !(0.0..1.0).contains(&f) {
            return Err(GisError::invalid_input("flattening must be in [0, 1)"));
        }
        Ok(Self {
            name: "custom".into(),
            a,
            f,
        })
    }

    /// Named ellipsoid unless `a` is given.
    pub fn resolve(
        name: &str,
        a: Option<f64>,
        b: Option<f64>,
        f: Option<f64>,
    ) -> Result<Self, GisError> {
        match a {
            Some(a) => Self::custom(a, b, f),
            None => Self::named(name),
        }
    }

    pub fn names() -> Vec<&'static str> {
        KNOWN.iter().map(|(name, _, _)| *name).collect()
    }

    pub fn b(&self) -> f64 {
        self.a * (1.0 - self.f)
    }

    /// First eccentricity squared.
    pub fn es(&self) -> f64 {
        self.f * (2.0 - self.f)
    }

    pub fn e(&self) -> f64 {
        self.es().sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wgs84_derived_parameters() {
        let wgs84 = Ellipsoid::named("wgs84").expect("known");
        assert_eq!(wgs84.name, "WGS84");
        assert!((wgs84.b() - 6_356_752.314_245).abs() < 1e-3);
        assert!((wgs84.es() - 0.006_694_379_990_14).abs() < 1e-12);
    }

    #[test]
    fn clarke_1866_uses_semi_minor_axis() {
        let clrk66 = Ellipsoid::named("clrk66").expect("known");
        assert!((clrk66.b() - 6_356_583.8).abs() < 1e-6);
    }

    #[test]
    fn unknown_name_lists_choices() {
        let err = Ellipsoid::named("mars").expect_err("unknown");
        assert!(err.to_string().contains("WGS84"));
    }

    #[test]
    fn custom_requires_shape() {
        assert!(Ellipsoid::custom(6_400_000.0, None, None).is_err());
        let custom = Ellipsoid::custom(6_400_000.0, Some(6_380_000.0), None).expect("custom");
        assert!((custom.b() - 6_380_000.0).abs() < 1e-6);
    }
}
