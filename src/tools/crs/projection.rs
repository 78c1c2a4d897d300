//! Coordinate transforms through PROJ and CRS descriptions through GDAL.

use gdal::spatial_ref::SpatialRef;
use geo::{Coord, Geometry, MapCoords};
use proj::Proj;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

use crate::lib::errors::GisError;

/// Normalise user CRS input: bare codes and lower-case prefixes become `EPSG:nnnn`.
pub fn normalize_crs(raw: &str) -> Result<String, GisError> {
    let cleaned = raw.trim().trim_matches('`').trim();
    if cleaned.is_empty() {
        return Err(GisError::crs("CRS must not be empty"));
    }
    if cleaned.chars().all(|c| c.is_ascii_digit()) {
        return Ok(format!("EPSG:{cleaned}"));
    }
    if let Some((authority, code)) = cleaned.split_once(':') {
        if !authority.is_empty()
            && authority.chars().all(|c| c.is_ascii_alphabetic())
            && !code.contains(['[', ' '])
        {
            return Ok(format!("{}:{}", authority.to_ascii_uppercase(), code.trim()));
        }
    }
    Ok(cleaned.to_string())
}

/// Transformer with x/y (lon/lat) axis order on both sides.
pub struct Transformer {
    proj: Option<Proj>,
    pub source: String,
    pub target: String,
}

impl Transformer {
    pub fn new(source: &str, target: &str) -> Result<Self, GisError> {
        let source = normalize_crs(source)?;
        let target = normalize_crs(target)?;
        if source == target {
            return Ok(Self {
                proj: None,
                source,
                target,
            });
        }
        let proj = Proj::new_known_crs(&source, &target, None).map_err(|err| {
            GisError::crs(format!(
                "cannot build a transformation from {source} to {target}: {err}"
            ))
        })?;
        Ok(Self {
            proj: Some(proj),
            source,
            target,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.proj.is_none()
    }

    pub fn convert(&self, x: f64, y: f64) -> Result<(f64, f64), GisError> {
        let Some(proj) = &self.proj else {
            return Ok((x, y));
        };
        let (tx, ty) = proj.convert((x, y)).map_err(|err| {
            GisError::crs(format!(
                "projection of ({x}, {y}) from {} to {} failed: {err}",
                self.source, self.target
            ))
        })?;
        if !(tx.is_finite() && ty.is_finite()) {
            return Err(GisError::crs(format!(
                "({x}, {y}) is outside the area of use of {}",
                self.target
            )));
        }
        Ok((tx, ty))
    }

    pub fn geometry(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>, GisError> {
        if self.is_identity() {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|coord| {
            self.convert(coord.x, coord.y)
                .map(|(x, y)| Coord { x, y })
        })
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema, PartialEq)]
pub struct AxisInfo {
    pub name: String,
    pub abbreviation: String,
    pub direction: String,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema, PartialEq)]
pub struct AreaOfUse {
    pub name: String,
    /// [west, south, east, north] in degrees.
    pub bounds: Option<[f64; 4]>,
}

/// Summary of a CRS definition.
#[derive(Debug, Clone, Serialize, JsonSchema, PartialEq)]
pub struct CrsDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub crs_type: String,
    pub axis_info: Vec<AxisInfo>,
    pub is_geographic: bool,
    pub is_projected: bool,
    pub datum: Option<String>,
    pub ellipsoid: Option<String>,
    pub prime_meridian: Option<String>,
    pub area_of_use: Option<AreaOfUse>,
    pub authority: Option<String>,
}

pub fn spatial_ref(crs: &str) -> Result<SpatialRef, GisError> {
    let normalized = normalize_crs(crs)?;
    SpatialRef::from_definition(&normalized)
        .map_err(|err| GisError::crs(format!("unknown CRS {normalized}: {err}")))
}

/// Describe a CRS from its PROJJSON form.
pub fn describe_crs(crs: &str) -> Result<CrsDescription, GisError> {
    let srs = spatial_ref(crs)?;
    let projjson = srs
        .to_projjson()
        .map_err(|err| GisError::crs(format!("cannot export {crs} as PROJJSON: {err}")))?;
    let document: Value = serde_json::from_str(&projjson)
        .map_err(|err| GisError::crs(format!("PROJJSON for {crs} is not JSON: {err}")))?;
    Ok(describe_projjson(&document))
}

fn text(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn unit_name(axis: &Value, fallback: Option<&Value>) -> String {
    let unit = axis.get("unit").or(fallback);
    match unit {
        Some(Value::String(name)) => name.clone(),
        Some(other) => text(other, "name").unwrap_or_default(),
        None => String::new(),
    }
}

/// Pull the interesting fields out of a PROJJSON document.
pub fn describe_projjson(document: &Value) -> CrsDescription {
    let crs_type = text(document, "type").unwrap_or_else(|| "unknown".into());
    let is_geographic = crs_type.starts_with("Geographic");
    let is_projected = crs_type == "ProjectedCRS";

    // Projected CRSs carry their datum on the base CRS.
    let datum_host = document.get("base_crs").unwrap_or(document);
    let datum = datum_host
        .get("datum")
        .or_else(|| datum_host.get("datum_ensemble"));
    let datum_name = datum.and_then(|d| text(d, "name"));
    let ellipsoid = datum
        .and_then(|d| d.get("ellipsoid"))
        .and_then(|e| text(e, "name"));
    let prime_meridian = datum_host
        .get("datum")
        .and_then(|d| d.get("prime_meridian"))
        .and_then(|pm| text(pm, "name"))
        .or_else(|| Some("Greenwich".to_string()).filter(|_| datum.is_some()));

    let cs = document.get("coordinate_system");
    let cs_unit = cs.and_then(|cs| cs.get("unit"));
    let axis_info = cs
        .and_then(|cs| cs.get("axis"))
        .and_then(Value::as_array)
        .map(|axes| {
            axes.iter()
                .map(|axis| AxisInfo {
                    name: text(axis, "name").unwrap_or_default(),
                    abbreviation: text(axis, "abbreviation").unwrap_or_default(),
                    direction: text(axis, "direction").unwrap_or_default(),
                    unit: unit_name(axis, cs_unit),
                })
                .collect()
        })
        .unwrap_or_default();

    let usage = document
        .get("usages")
        .and_then(Value::as_array)
        .and_then(|usages| usages.first())
        .unwrap_or(document);
    let area_of_use = text(usage, "area").map(|name| AreaOfUse {
        name,
        bounds: usage
            .get("bbox")
            .map(|bbox| {
                let get = |key: &str| bbox.get(key).and_then(Value::as_f64);
                match (
                    get("west_longitude"),
                    get("south_latitude"),
                    get("east_longitude"),
                    get("north_latitude"),
                ) {
                    (Some(w), Some(s), Some(e), Some(n)) => Some([w, s, e, n]),
                    _ => None,
                }
            })
            .unwrap_or(None),
    });

    let authority = document.get("id").and_then(|id| {
        let authority = text(id, "authority")?;
        let code = match id.get("code")? {
            Value::String(code) => code.clone(),
            other => other.to_string(),
        };
        Some(format!("{authority}:{code}"))
    });

    CrsDescription {
        name: text(document, "name").unwrap_or_default(),
        crs_type,
        axis_info,
        is_geographic,
        is_projected,
        datum: datum_name,
        ellipsoid,
        prime_meridian,
        area_of_use,
        authority,
    }
}

/// Short `AUTH:CODE` label for a WKT definition, or the trimmed WKT when unidentifiable.
pub fn identify_crs(definition: &str) -> String {
    let trimmed = definition.trim();
    if let Ok(mut srs) = SpatialRef::from_wkt(trimmed) {
        if srs.auth_code().is_err() {
            // Unidentified definitions keep failing below.
            let _ = srs.auto_identify_epsg();
        }
        if let (Ok(name), Ok(code)) = (srs.auth_name(), srs.auth_code()) {
            return format!("{name}:{code}");
        }
    }
    authority_from_wkt(trimmed).unwrap_or_else(|| trimmed.to_string())
}

/// Outermost `AUTHORITY["EPSG","nnnn"]` of a WKT1 string.
fn authority_from_wkt(wkt: &str) -> Option<String> {
    let start = wkt.rfind("AUTHORITY[\"")? + "AUTHORITY[\"".len();
    let rest = &wkt[start..];
    let (authority, rest) = rest.split_once('"')?;
    let code: String = rest
        .chars()
        .skip_while(|c| !c.is_ascii_alphanumeric())
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    (!authority.is_empty() && !code.is_empty()).then(|| format!("{authority}:{code}"))
}

/// WKT of a CRS, for `.prj` sidecars and raster headers.
pub fn crs_wkt(crs: &str) -> Result<String, GisError> {
    spatial_ref(crs)?
        .to_wkt()
        .map_err(|err| GisError::crs(format!("cannot export {crs} as WKT: {err}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn bare_codes_gain_epsg_prefix() {
        assert_eq!(normalize_crs("4326").expect("ok"), "EPSG:4326");
        assert_eq!(normalize_crs(" epsg:3857 ").expect("ok"), "EPSG:3857");
        assert_eq!(
            normalize_crs("+proj=longlat +datum=WGS84").expect("ok"),
            "+proj=longlat +datum=WGS84"
        );
        assert!(normalize_crs("  ").is_err());
    }

    #[test]
    fn outermost_authority_wins() {
        let wkt = concat!(
            r#"PROJCS["WGS 84 / UTM zone 33N","#,
            r#"GEOGCS["WGS 84",AUTHORITY["EPSG","4326"]],"#,
            r#"AUTHORITY["EPSG","32633"]]"#
        );
        assert_eq!(authority_from_wkt(wkt).as_deref(), Some("EPSG:32633"));
        assert_eq!(authority_from_wkt("LOCAL_CS[\"x\"]"), None);
    }

    #[test]
    fn identity_transform_skips_proj() {
        let transformer = Transformer::new("4326", "EPSG:4326").expect("builds");
        assert!(transformer.is_identity());
        assert_eq!(transformer.convert(1.0, 2.0).expect("converts"), (1.0, 2.0));
    }

    #[test]
    fn projected_crs_reads_datum_from_base() {
        let document = json!({
            "type": "ProjectedCRS",
            "name": "WGS 84 / UTM zone 33N",
            "base_crs": {
                "name": "WGS 84",
                "datum_ensemble": {
                    "name": "World Geodetic System 1984 ensemble",
                    "ellipsoid": { "name": "WGS 84" }
                }
            },
            "coordinate_system": {
                "subtype": "Cartesian",
                "axis": [
                    {
                        "name": "Easting", "abbreviation": "E",
                        "direction": "east", "unit": "metre"
                    },
                    {
                        "name": "Northing", "abbreviation": "N",
                        "direction": "north", "unit": "metre"
                    }
                ]
            },
            "area": "Between 12°E and 18°E, northern hemisphere",
            "bbox": {
                "south_latitude": 0.0, "west_longitude": 12.0,
                "north_latitude": 84.0, "east_longitude": 18.0
            },
            "id": { "authority": "EPSG", "code": 32633 }
        });

        let description = describe_projjson(&document);
        assert!(description.is_projected);
        assert!(!description.is_geographic);
        assert_eq!(
            description.datum.as_deref(),
            Some("World Geodetic System 1984 ensemble")
        );
        assert_eq!(description.ellipsoid.as_deref(), Some("WGS 84"));
        assert_eq!(description.axis_info.len(), 2);
        assert_eq!(description.axis_info[0].unit, "metre");
        assert_eq!(description.authority.as_deref(), Some("EPSG:32633"));
        assert_eq!(
            description.area_of_use.and_then(|a| a.bounds),
            Some([12.0, 0.0, 18.0, 84.0])
        );
    }
}
