//! Format dispatch for feature tables.

use std::path::{Path, PathBuf};

use super::{json, shp, table::FeatureTable};
use crate::lib::{errors::GisError, paths};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Shapefile,
    GeoJson,
}

impl Driver {
    /// OGR-style driver names, plus the usual short aliases.
    pub fn from_name(name: &str) -> Result<Self, GisError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "esri shapefile" | "shapefile" | "shp" => Ok(Self::Shapefile),
            "geojson" | "json" => Ok(Self::GeoJson),
            _ => Err(GisError::UnsupportedFormat {
                format: name.trim().to_string(),
            }),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, GisError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "shp" => Ok(Self::Shapefile),
            "geojson" | "json" => Ok(Self::GeoJson),
            "" => Err(GisError::invalid_input(format!(
                "cannot infer a vector format for {} without an extension",
                path.display()
            ))),
            other => Err(GisError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Shapefile => "ESRI Shapefile",
            Self::GeoJson => "GeoJSON",
        }
    }
}

pub fn read_table(path: &Path) -> Result<FeatureTable, GisError> {
    let table = match Driver::from_path(path)? {
        Driver::Shapefile => shp::read(path)?,
        Driver::GeoJson => json::read(path)?,
    };
    tracing::debug!(
        target: "gis_mcp::tools",
        path = %path.display(),
        rows = table.len(),
        columns = table.columns.len(),
        "read feature table"
    );
    Ok(table)
}

/// Clean a caller-supplied path, check it exists and read it.
pub fn read_input(raw: &str) -> Result<FeatureTable, GisError> {
    read_table(&paths::existing_input(raw)?)
}

/// Write with an explicit driver, or one inferred from the extension.
pub fn write_table(
    table: &FeatureTable,
    path: &Path,
    driver: Option<Driver>,
) -> Result<(), GisError> {
    let driver = match driver {
        Some(driver) => driver,
        None => Driver::from_path(path)?,
    };
    match driver {
        Driver::Shapefile => shp::write(table, path)?,
        Driver::GeoJson => json::write(table, path)?,
    }
    tracing::debug!(
        target: "gis_mcp::tools",
        path = %path.display(),
        driver = driver.name(),
        rows = table.len(),
        "wrote feature table"
    );
    Ok(())
}

/// Resolve `raw` under the storage root and write the table there.
pub fn write_output(
    table: &FeatureTable,
    root: &Path,
    raw: &str,
    driver: Option<Driver>,
) -> Result<PathBuf, GisError> {
    let path = paths::resolve_output_path(root, raw)?;
    write_table(table, &path, driver)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geopackage_is_unsupported() {
        let err = Driver::from_name("GPKG").expect_err("unsupported");
        assert!(matches!(err, GisError::UnsupportedFormat { format } if format == "GPKG"));
        let err = Driver::from_path(Path::new("out.gpkg")).expect_err("unsupported");
        assert!(matches!(err, GisError::UnsupportedFormat { .. }));
    }

    #[test]
    fn driver_names_and_extensions_agree() {
        assert_eq!(Driver::from_name("ESRI Shapefile").expect("ok"), Driver::Shapefile);
        assert_eq!(Driver::from_name("GeoJSON").expect("ok"), Driver::GeoJson);
        assert_eq!(
            Driver::from_path(Path::new("a/b.GeoJSON")).expect("ok"),
            Driver::GeoJson
        );
    }
}
