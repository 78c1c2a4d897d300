//! Well-known CRSs advertised by `get_available_crs`.

use schemars::JsonSchema;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, JsonSchema, PartialEq)]
pub struct CrsEntry {
    pub auth_name: String,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub crs_type: String,
}

const WELL_KNOWN: &[(&str, &str, &str)] = &[
    ("4326", "WGS 84", "GEOGRAPHIC_2D_CRS"),
    ("4258", "ETRS89", "GEOGRAPHIC_2D_CRS"),
    ("4269", "NAD83", "GEOGRAPHIC_2D_CRS"),
    ("4267", "NAD27", "GEOGRAPHIC_2D_CRS"),
    ("4283", "GDA94", "GEOGRAPHIC_2D_CRS"),
    ("7844", "GDA2020", "GEOGRAPHIC_2D_CRS"),
    ("4490", "China Geodetic Coordinate System 2000", "GEOGRAPHIC_2D_CRS"),
    ("4978", "WGS 84", "GEOCENTRIC_CRS"),
    ("4979", "WGS 84", "GEOGRAPHIC_3D_CRS"),
    ("3857", "WGS 84 / Pseudo-Mercator", "PROJECTED_CRS"),
    ("3395", "WGS 84 / World Mercator", "PROJECTED_CRS"),
    ("6933", "WGS 84 / NSIDC EASE-Grid 2.0 Global", "PROJECTED_CRS"),
    ("54009", "World_Mollweide", "PROJECTED_CRS"),
    ("3035", "ETRS89-extended / LAEA Europe", "PROJECTED_CRS"),
    ("3034", "ETRS89-extended / LCC Europe", "PROJECTED_CRS"),
    ("27700", "OSGB36 / British National Grid", "PROJECTED_CRS"),
    ("2154", "RGF93 v1 / Lambert-93", "PROJECTED_CRS"),
    ("25832", "ETRS89 / UTM zone 32N", "PROJECTED_CRS"),
    ("25833", "ETRS89 / UTM zone 33N", "PROJECTED_CRS"),
    ("5070", "NAD83 / Conus Albers", "PROJECTED_CRS"),
    ("2163", "US National Atlas Equal Area", "PROJECTED_CRS"),
    ("3577", "GDA94 / Australian Albers", "PROJECTED_CRS"),
    ("3031", "WGS 84 / Antarctic Polar Stereographic", "PROJECTED_CRS"),
    ("3413", "WGS 84 / NSIDC Sea Ice Polar Stereographic North", "PROJECTED_CRS"),
    ("32631", "WGS 84 / UTM zone 31N", "PROJECTED_CRS"),
    ("32633", "WGS 84 / UTM zone 33N", "PROJECTED_CRS"),
    ("32618", "WGS 84 / UTM zone 18N", "PROJECTED_CRS"),
    ("32756", "WGS 84 / UTM zone 56S", "PROJECTED_CRS"),
];

pub fn well_known_crs() -> Vec<CrsEntry> {
    WELL_KNOWN
        .iter()
        .map(|(code, name, crs_type)| CrsEntry {
            auth_name: if code.len() == 5 && code.starts_with("54") {
                "ESRI".into()
            } else {
                "EPSG".into()
            },
            code: (*code).into(),
            name: (*name).into(),
            crs_type: (*crs_type).into(),
        })
        .collect()
}
