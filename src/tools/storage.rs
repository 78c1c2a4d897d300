//! `save_results`: persist a tool result in several file formats.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::Utc;
use rmcp::{handler::server::wrapper::Parameters, model::ErrorData, tool, tool_router, Json};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    lib::{
        errors::GisError,
        fs::{timestamped_stem, write_text},
        paths::{clean_arg, resolve_output_dir},
    },
    server::runtime::GisServer,
    tools::{
        self,
        geometry::codec,
        vector::{self, Driver, FeatureTable},
        ServerToolRouter, SUCCESS,
    },
};

const GEOMETRY_KEY: &str = "geometry";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Format {
    Json,
    Csv,
    Txt,
    Yaml,
    Shp,
    GeoJson,
}

impl Format {
    const ALL: [Format; 6] = [
        Format::Json,
        Format::Csv,
        Format::Txt,
        Format::Yaml,
        Format::Shp,
        Format::GeoJson,
    ];

    fn parse(raw: &str) -> Result<Self, GisError> {
        match clean_arg(raw).to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "txt" | "text" => Ok(Self::Txt),
            "yaml" | "yml" => Ok(Self::Yaml),
            "shp" | "shapefile" => Ok(Self::Shp),
            "geojson" => Ok(Self::GeoJson),
            other => Err(GisError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }

    fn key(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Txt => "txt",
            Self::Yaml => "yaml",
            Self::Shp => "shp",
            Self::GeoJson => "geojson",
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SaveResultsRequest {
    /// Result object to persist, typically another tool's response.
    pub data: Map<String, Value>,
    /// File stem; defaults to `output_<YYYYmmdd_HHMMSS>`.
    #[serde(default)]
    pub filename: Option<String>,
    /// Any of json, csv, txt, yaml, shp, geojson. All of them when omitted.
    #[serde(default)]
    pub formats: Option<Vec<String>>,
    /// Output folder; relative folders resolve under the storage root.
    #[serde(default)]
    pub folder: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SaveResultsResponse {
    pub status: String,
    pub message: String,
    /// Format name to written path.
    pub saved_files: BTreeMap<String, String>,
    /// Formats that were requested but not written, such as `shp` without a WKT geometry.
    pub skipped: Vec<String>,
}

/// Nested objects become dotted keys; arrays stay JSON text.
fn flatten(prefix: Option<&str>, data: &Map<String, Value>, out: &mut Vec<(String, String)>) {
    for (key, value) in data {
        let name = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(inner) => flatten(Some(&name), inner, out),
            Value::String(text) => out.push((name, text.clone())),
            Value::Null => out.push((name, String::new())),
            other => out.push((name, other.to_string())),
        }
    }
}

fn csv_error(path: &Path, err: impl std::fmt::Display) -> GisError {
    GisError::Internal {
        message: format!("failed to encode CSV for {}: {err}", path.display()),
    }
}

fn write_csv(data: &Map<String, Value>, path: &Path) -> Result<(), GisError> {
    let mut cells = Vec::new();
    flatten(None, data, &mut cells);
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(cells.iter().map(|(key, _)| key))
        .map_err(|err| csv_error(path, err))?;
    writer
        .write_record(cells.iter().map(|(_, value)| value))
        .map_err(|err| csv_error(path, err))?;
    let bytes = writer.into_inner().map_err(|err| csv_error(path, err))?;
    std::fs::write(path, bytes).map_err(|err| GisError::io(path, err))
}

fn txt_lines(data: &Map<String, Value>) -> String {
    data.iter()
        .map(|(key, value)| match value {
            Value::String(text) => format!("{key}: {text}\n"),
            other => format!("{key}: {other}\n"),
        })
        .collect()
}

/// Single-feature table from `data.geometry` as WKT, other keys as attributes.
fn geometry_table(data: &Map<String, Value>) -> Option<FeatureTable> {
    let wkt = data.get(GEOMETRY_KEY)?.as_str()?;
    let geometry = codec::parse_wkt(wkt).ok()?;
    let columns: Vec<String> = data
        .keys()
        .filter(|key| key.as_str() != GEOMETRY_KEY)
        .cloned()
        .collect();
    let values = columns
        .iter()
        .map(|key| match &data[key] {
            nested @ (Value::Object(_) | Value::Array(_)) => Value::String(nested.to_string()),
            scalar => scalar.clone(),
        })
        .collect();
    let mut table = FeatureTable::new(columns, None);
    table.push(Some(geometry), values);
    Some(table)
}

fn write_format(
    format: Format,
    data: &Map<String, Value>,
    folder: &Path,
    stem: &str,
    features: Option<&FeatureTable>,
) -> Result<Option<PathBuf>, GisError> {
    let path = folder.join(format!("{stem}.{}", format.key()));
    match format {
        Format::Json => {
            let text = serde_json::to_string_pretty(data).map_err(|err| GisError::Internal {
                message: format!("failed to encode JSON: {err}"),
            })?;
            write_text(&path, &text)?;
        }
        Format::Csv => write_csv(data, &path)?,
        Format::Txt => write_text(&path, &txt_lines(data))?,
        Format::Yaml => {
            let text = serde_yaml::to_string(data).map_err(|err| GisError::Internal {
                message: format!("failed to encode YAML: {err}"),
            })?;
            write_text(&path, &text)?;
        }
        Format::Shp | Format::GeoJson => {
            let Some(table) = features else {
                return Ok(None);
            };
            let driver = if format == Format::Shp {
                Driver::Shapefile
            } else {
                Driver::GeoJson
            };
            vector::write_table(table, &path, Some(driver))?;
        }
    }
    Ok(Some(path))
}

pub fn save_results(req: SaveResultsRequest, root: &Path) -> Result<SaveResultsResponse, GisError> {
    let formats: Vec<Format> = match &req.formats {
        Some(names) if !names.is_empty() => {
            let mut parsed = names
                .iter()
                .map(|name| Format::parse(name))
                .collect::<Result<Vec<_>, _>>()?;
            parsed.sort();
            parsed.dedup();
            parsed
        }
        _ => Format::ALL.to_vec(),
    };
    let folder = match req.folder.as_deref().map(clean_arg).filter(|f| !f.is_empty()) {
        Some(folder) => resolve_output_dir(root, &folder)?,
        None => {
            std::fs::create_dir_all(root).map_err(|err| GisError::io(root, err))?;
            root.to_path_buf()
        }
    };
    let stem = req
        .filename
        .as_deref()
        .map(clean_arg)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| timestamped_stem("output", Utc::now()));
    let features = geometry_table(&req.data);

    let mut saved_files = BTreeMap::new();
    let mut skipped = Vec::new();
    for format in formats {
        match write_format(format, &req.data, &folder, &stem, features.as_ref())? {
            Some(path) => {
                saved_files.insert(format.key().to_string(), path.display().to_string());
            }
            None => skipped.push(format.key().to_string()),
        }
    }
    tracing::debug!(
        target: "gis_mcp::tools",
        folder = %folder.display(),
        stem = %stem,
        written = saved_files.len(),
        skipped = skipped.len(),
        "saved results"
    );
    Ok(SaveResultsResponse {
        status: SUCCESS.into(),
        message: format!("Results saved to {}", folder.display()),
        saved_files,
        skipped,
    })
}

pub(crate) fn router() -> ServerToolRouter<GisServer> {
    GisServer::storage_router()
}

#[tool_router(router = storage_router)]
impl GisServer {
    #[tool(
        name = "save_results",
        description = "Save a result object as json, csv, txt, yaml and, when it carries a WKT \
            geometry, shp or geojson"
    )]
    async fn save_results(
        &self,
        Parameters(request): Parameters<SaveResultsRequest>,
    ) -> Result<Json<SaveResultsResponse>, ErrorData> {
        let root = self.storage_root();
        tools::run_blocking("save_results", move || save_results(request, &root)).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    fn request(data: Value, formats: Option<&[&str]>) -> SaveResultsRequest {
        SaveResultsRequest {
            data: data.as_object().cloned().expect("object"),
            filename: Some("result".into()),
            formats: formats.map(|list| list.iter().map(|f| f.to_string()).collect()),
            folder: Some("saved".into()),
        }
    }

    #[test]
    fn json_round_trips_exactly() {
        let dir = tempdir().expect("tempdir");
        let data = json!({"status": "success", "number": 42, "nested": {"a": [1, 2]}});
        let response =
            save_results(request(data.clone(), Some(&["json"])), dir.path()).expect("saved");
        let path = &response.saved_files["json"];
        assert!(path.ends_with("saved/result.json"));
        let loaded: Value =
            serde_json::from_str(&std::fs::read_to_string(path).expect("read")).expect("json");
        assert_eq!(loaded, data);
    }

    #[test]
    fn csv_flattens_nested_keys_into_one_row() {
        let dir = tempdir().expect("tempdir");
        let data = json!({"a": 1, "b": {"c": "x"}});
        let response =
            save_results(request(data, Some(&["csv", "txt"])), dir.path()).expect("saved");
        let csv = std::fs::read_to_string(&response.saved_files["csv"]).expect("csv");
        assert_eq!(csv, "a,b.c\n1,x\n");
        let txt = std::fs::read_to_string(&response.saved_files["txt"]).expect("txt");
        assert_eq!(txt, "a: 1\nb: {\"c\":\"x\"}\n");
    }

    #[test]
    fn spatial_formats_need_a_wkt_geometry() {
        let dir = tempdir().expect("tempdir");
        let plain = save_results(request(json!({"value": 1}), None), dir.path()).expect("saved");
        assert_eq!(plain.skipped, vec!["shp", "geojson"]);
        assert_eq!(plain.saved_files.len(), 4);

        let spatial = json!({"geometry": "POINT (0 0)", "value": 100});
        let saved =
            save_results(request(spatial, Some(&["geojson", "shp"])), dir.path()).expect("saved");
        assert!(saved.skipped.is_empty());
        let table = vector::read_table(Path::new(&saved.saved_files["geojson"])).expect("geojson");
        assert_eq!(table.len(), 1);
        assert!(Path::new(&saved.saved_files["shp"]).exists());
    }

    #[test]
    fn unknown_format_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let err = save_results(request(json!({"a": 1}), Some(&["xlsx"])), dir.path())
            .expect_err("unsupported");
        assert!(matches!(err, GisError::UnsupportedFormat { .. }));
    }

    #[test]
    fn default_stem_is_timestamped() {
        let dir = tempdir().expect("tempdir");
        let mut req = request(json!({"a": 1}), Some(&["yaml"]));
        req.filename = None;
        req.folder = None;
        let response = save_results(req, dir.path()).expect("saved");
        let path = PathBuf::from(&response.saved_files["yaml"]);
        let name = path.file_name().and_then(|n| n.to_str()).expect("name");
        assert!(name.starts_with("output_"));
        assert_eq!(path.parent(), Some(dir.path()));
    }
}
