//! Spatial statistics: autocorrelation, spatial weights, regression and
//! space-time dynamics over feature layers.

pub mod adbscan;
pub mod esda;
pub mod gal;
pub mod linalg;
pub mod markov;
pub mod regression;
pub mod request;
pub mod rose;
mod router;
pub mod weights;

use std::{fmt, path::Path};

use geo::Geometry;
use serde_json::{json, Map, Value};

use crate::{
    lib::{
        errors::GisError,
        paths::{clean_arg, existing_input, resolve_output_path},
    },
    server::config::StatisticsSection,
    tools::{
        crs::normalize_crs,
        geometry::codec,
        vector::{self, FeatureTable},
        SUCCESS,
    },
};

pub use request::*;
pub(crate) use router::router;

use esda::Inference;
use gal::WeightsFormat;
use markov::MarkovOptions;
use regression::{LagSpec, Robust, Variable};
use rose::Alternative;
use weights::{Contiguity, Transform, Weights};

const DEGREES_CRS: &str = "EPSG:4326";
const ISLAND_FALLBACK_K: usize = 4;
const PREVIEW_ROWS: usize = 5;

/// Distance threshold after unit conversion for the target CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Threshold {
    value: f64,
    degrees: bool,
}

impl Threshold {
    /// `meters` becomes degrees when the layer is in EPSG:4326.
    fn new(meters: f64, target_crs: &str, section: &StatisticsSection) -> Result<Self, GisError> {
        if !(meters.is_finite() && meters > 0.0) {
            return Err(GisError::invalid_input(
                "distance_threshold must be a positive number",
            ));
        }
        let degrees = normalize_crs(target_crs)? == DEGREES_CRS;
        Ok(Self {
            value: if degrees {
                meters / section.meters_per_degree
            } else {
                meters
            },
            degrees,
        })
    }

    fn unit(&self) -> &'static str {
        if self.degrees {
            "degrees"
        } else {
            "meters"
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.value, self.unit())
    }
}

fn sequential_ids(n: usize) -> Vec<Value> {
    (0..n).map(Value::from).collect()
}

fn subset_table(table: &FeatureTable, keep: &[usize]) -> FeatureTable {
    let mut out = FeatureTable::new(table.columns.clone(), table.crs.clone());
    out.features = keep.iter().map(|&row| table.features[row].clone()).collect();
    out
}

fn pick<T: Clone>(values: &[T], keep: &[usize]) -> Vec<T> {
    keep.iter().map(|&row| values[row].clone()).collect()
}

/// Numeric column with missing values as NaN.
fn float_column(table: &FeatureTable, name: &str) -> Result<Vec<f64>, GisError> {
    Ok(table
        .numeric_column(name)?
        .into_iter()
        .map(|value| value.unwrap_or(f64::NAN))
        .collect())
}

/// First rows with the listed columns and the geometry as WKT under `geometry_key`.
fn preview_rows(table: &FeatureTable, columns: &[String], geometry_key: &str) -> Vec<Value> {
    let indices: Vec<(String, Option<usize>)> = columns
        .iter()
        .map(|name| (name.clone(), table.column_index(name)))
        .collect();
    table
        .features
        .iter()
        .take(PREVIEW_ROWS)
        .map(|feature| {
            let mut row = Map::new();
            for (name, index) in &indices {
                let value = index.map_or(Value::Null, |i| feature.values[i].clone());
                row.insert(name.clone(), value);
            }
            row.insert(
                geometry_key.to_string(),
                feature
                    .geometry
                    .as_ref()
                    .map_or(Value::Null, |g| Value::String(codec::to_wkt(g))),
            );
            Value::Object(row)
        })
        .collect()
}

fn geometries(table: &FeatureTable) -> Result<Vec<&Geometry<f64>>, GisError> {
    table.geometries()
}

fn row_standardized(mut weights: Weights) -> Weights {
    weights.set_transform(Transform::Row);
    weights
}

/// Row-standardized inverse-distance weights between representative points.
fn inverse_distance(table: &FeatureTable, threshold: f64) -> Result<Weights, GisError> {
    let points = weights::representative_points(table)?;
    let band = weights::distance_band(&points, threshold, false, sequential_ids(table.len()))?;
    Ok(row_standardized(band))
}

/// A variable and its distance-band weights in the target CRS.
struct EsdaInput {
    table: FeatureTable,
    dependent: String,
    y: Vec<f64>,
    weights: Weights,
    threshold: Threshold,
}

impl EsdaInput {
    fn load(req: &EsdaRequest, section: &StatisticsSection) -> Result<Self, GisError> {
        let table = vector::read_input(&req.shapefile_path)?;
        let dependent = clean_arg(&req.dependent_var);
        if table.column_index(&dependent).is_none() {
            return Err(GisError::invalid_input(format!(
                "Dependent variable '{dependent}' not found in shapefile columns"
            )));
        }
        let target = clean_arg(&req.target_crs);
        let table = table.to_crs(&target)?;
        let threshold = Threshold::new(req.distance_threshold, &target, section)?;
        let y = float_column(&table, &dependent)?;
        let weights = inverse_distance(&table, threshold.value)?;
        tracing::debug!(
            target: "gis_mcp::tools",
            rows = table.len(),
            threshold = threshold.value,
            islands = weights.islands().len(),
            "built distance-band weights"
        );
        Ok(Self {
            table,
            dependent,
            y,
            weights,
            threshold,
        })
    }

    /// Local statistics need every unit linked: all islands fall back to KNN,
    /// otherwise islands are dropped.
    fn connect_islands(self) -> Result<Self, GisError> {
        let islands = self.weights.islands();
        if islands.is_empty() {
            return Ok(self);
        }
        let n = self.y.len();
        if islands.len() == n {
            let points = weights::representative_points(&self.table)?;
            let fallback =
                weights::knn(&points, ISLAND_FALLBACK_K, sequential_ids(n)).map_err(|err| {
                    GisError::statistics(format!(
                        "All units are islands and KNN fallback failed: {err}"
                    ))
                })?;
            tracing::debug!(
                target: "gis_mcp::tools",
                k = ISLAND_FALLBACK_K,
                "all units are islands, using KNN weights"
            );
            return Ok(Self {
                weights: row_standardized(fallback),
                ..self
            });
        }
        let keep: Vec<usize> = (0..n).filter(|row| islands.binary_search(row).is_err()).collect();
        tracing::debug!(target: "gis_mcp::tools", dropped = islands.len(), "dropping islands");
        Ok(Self {
            table: subset_table(&self.table, &keep),
            y: pick(&self.y, &keep),
            weights: self.weights.subset(&keep)?,
            ..self
        })
    }

    fn preview(&self) -> Value {
        Value::Array(preview_rows(
            &self.table,
            std::slice::from_ref(&self.dependent),
            vector::table::GEOMETRY,
        ))
    }
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => Map::from_iter([("value".to_string(), other)]),
    }
}

fn stats_response(message: String, result: Value) -> StatsResponse {
    StatsResponse {
        status: SUCCESS.into(),
        message,
        result: into_object(result),
    }
}

pub fn getis_ord_g(
    req: EsdaRequest,
    section: &StatisticsSection,
) -> Result<StatsResponse, GisError> {
    let input = EsdaInput::load(&req, section)?;
    let stat = esda::getis_ord(&input.y, &input.weights, Inference::from(section))?;
    Ok(stats_response(
        format!(
            "Getis-Ord G analysis completed successfully (distance threshold: {})",
            input.threshold
        ),
        json!({
            "shapefile_path": clean_arg(&req.shapefile_path),
            "getis_ord_g": {
                "G": stat.value,
                "p_value": stat.p_sim,
                "z_score": stat.z_sim,
            },
            "data_preview": input.preview(),
        }),
    ))
}

pub fn morans_i(req: EsdaRequest, section: &StatisticsSection) -> Result<StatsResponse, GisError> {
    let input = EsdaInput::load(&req, section)?;
    let (stat, expected) = esda::moran(&input.y, &input.weights, Inference::from(section))?;
    Ok(stats_response(
        format!("Moran's I completed successfully (threshold: {})", input.threshold),
        json!({
            "I": stat.value,
            "morans_i": stat.value,
            "expected": expected,
            "p_value": stat.p_sim,
            "z_score": stat.z_sim,
            "data_preview": input.preview(),
        }),
    ))
}

pub fn gearys_c(req: EsdaRequest, section: &StatisticsSection) -> Result<StatsResponse, GisError> {
    let input = EsdaInput::load(&req, section)?;
    let stat = esda::geary(&input.y, &input.weights, Inference::from(section))?;
    Ok(stats_response(
        format!("Geary's C completed successfully (threshold: {})", input.threshold),
        json!({
            "C": stat.value,
            "gearys_c": stat.value,
            "p_value": stat.p_sim,
            "z_score": stat.z_sim,
            "data_preview": input.preview(),
        }),
    ))
}

pub fn gamma_statistic(
    req: EsdaRequest,
    section: &StatisticsSection,
) -> Result<StatsResponse, GisError> {
    let input = EsdaInput::load(&req, section)?;
    let stat = esda::gamma(&input.y, &input.weights, Inference::from(section))?;
    Ok(stats_response(
        format!("Gamma Statistic completed successfully (threshold: {})", input.threshold),
        json!({
            "Gamma": stat.value,
            "p_value": stat.p_sim,
            "z_score": stat.z_sim,
            "data_preview": input.preview(),
        }),
    ))
}

pub fn moran_local(
    req: EsdaRequest,
    section: &StatisticsSection,
) -> Result<StatsResponse, GisError> {
    let input = EsdaInput::load(&req, section)?.connect_islands()?;
    let (stat, quadrants) = esda::moran_local(&input.y, &input.weights, Inference::from(section))?;
    Ok(stats_response(
        format!("Local Moran's I completed successfully (threshold: {})", input.threshold),
        json!({
            "Is": stat.values,
            "p_values": stat.p_sim,
            "z_scores": stat.z_sim,
            "quadrants": quadrants,
            "data_preview": input.preview(),
        }),
    ))
}

pub fn getis_ord_g_local(
    req: EsdaRequest,
    section: &StatisticsSection,
) -> Result<StatsResponse, GisError> {
    let input = EsdaInput::load(&req, section)?.connect_islands()?;
    let stat = esda::getis_ord_local(&input.y, &input.weights, Inference::from(section))?;
    Ok(stats_response(
        format!(
            "Local Getis-Ord G completed successfully (threshold: {})",
            input.threshold
        ),
        json!({
            "G_local": stat.values,
            "p_values": stat.p_sim,
            "z_scores": stat.z_sim,
            "data_preview": input.preview(),
        }),
    ))
}

pub fn join_counts(
    req: EsdaRequest,
    section: &StatisticsSection,
) -> Result<StatsResponse, GisError> {
    let input = EsdaInput::load(&req, section)?;
    let stat = esda::join_counts(&input.y, &input.weights, Inference::from(section))?;
    Ok(stats_response(
        format!("Join Counts completed successfully (threshold: {})", input.threshold),
        json!({
            "join_counts": stat.j,
            "bb": stat.bb,
            "bw": stat.bw,
            "ww": stat.ww,
            "J": stat.j,
            "expected": stat.expected,
            "variance": stat.variance,
            "z_score": stat.z_score,
            "p_value": stat.p_value,
            "data_preview": input.preview(),
        }),
    ))
}

pub fn join_counts_local(
    req: EsdaRequest,
    section: &StatisticsSection,
) -> Result<StatsResponse, GisError> {
    let input = EsdaInput::load(&req, section)?.connect_islands()?;
    let counts = esda::join_counts_local(&input.y, &input.weights)?;
    Ok(stats_response(
        format!(
            "Local Join Counts completed successfully (threshold: {})",
            input.threshold
        ),
        json!({
            "local_join_counts": counts,
            "data_preview": input.preview(),
        }),
    ))
}

pub fn adbscan(req: AdbscanRequest) -> Result<StatsResponse, GisError> {
    let table = vector::read_input(&req.shapefile_path)?;
    let dependent = req
        .dependent_var
        .as_deref()
        .map(clean_arg)
        .filter(|name| !name.is_empty());
    if let Some(name) = &dependent {
        table.require_column(name)?;
    }
    let table = table.to_crs(&clean_arg(&req.target_crs))?;
    let points = weights::representative_points(&table)?;
    let clustering = adbscan::dbscan(&points, req.eps, req.min_samples)?;
    let columns: Vec<String> = dependent.into_iter().collect();
    Ok(stats_response(
        format!(
            "A-DBSCAN clustering completed successfully (eps={}, min_samples={})",
            req.eps, req.min_samples
        ),
        json!({
            "labels": clustering.labels,
            "core_sample_indices": clustering.core_sample_indices,
            "components": clustering.components,
            "data_preview": preview_rows(&table, &columns, vector::table::GEOMETRY),
        }),
    ))
}

fn non_empty(table: FeatureTable) -> Result<FeatureTable, GisError> {
    if table.is_empty() {
        Err(GisError::invalid_input("Input file contains no features"))
    } else {
        Ok(table)
    }
}

fn weights_response(
    message: String,
    weights: &Weights,
    extra: Map<String, Value>,
) -> WeightsResponse {
    let mut info = weights.describe();
    info.extend(extra);
    WeightsResponse {
        status: SUCCESS.into(),
        message,
        weights_info: info.clone(),
        result: info,
    }
}

fn clean_id_field(id_field: &Option<String>) -> Option<String> {
    id_field
        .as_deref()
        .map(clean_arg)
        .filter(|field| !field.is_empty())
}

pub fn weights_from_shapefile(req: ContiguityWeightsRequest) -> Result<WeightsResponse, GisError> {
    let table = non_empty(vector::read_input(&req.shapefile_path)?)?;
    let kind = Contiguity::parse(&req.contiguity)?;
    let id_field = clean_id_field(&req.id_field);
    let ids = weights::table_ids(&table, id_field.as_deref())?;
    let w = weights::contiguity(&geometries(&table)?, kind, ids)?;
    let extra = Map::from_iter([
        ("id_field".to_string(), json!(id_field)),
        ("contiguity".to_string(), json!(kind.name())),
    ]);
    Ok(weights_response(
        "Spatial weights constructed successfully".into(),
        &w,
        extra,
    ))
}

pub fn distance_band_weights(req: DistanceBandWeightsRequest) -> Result<WeightsResponse, GisError> {
    let table = non_empty(vector::read_input(&req.data_path)?)?;
    let id_field = clean_id_field(&req.id_field);
    let ids = weights::table_ids(&table, id_field.as_deref())?;
    let points = weights::representative_points(&table)?;
    let w = weights::distance_band(&points, req.threshold, req.binary, ids)?;
    let extra = Map::from_iter([
        ("threshold".to_string(), json!(req.threshold)),
        ("binary".to_string(), json!(req.binary)),
        ("id_field".to_string(), json!(id_field)),
    ]);
    Ok(weights_response(
        "DistanceBand spatial weights constructed successfully".into(),
        &w,
        extra,
    ))
}

pub fn knn_weights(req: KnnWeightsRequest) -> Result<WeightsResponse, GisError> {
    let table = non_empty(vector::read_input(&req.data_path)?)?;
    let id_field = clean_id_field(&req.id_field);
    let ids = weights::table_ids(&table, id_field.as_deref())?;
    let points = weights::representative_points(&table)?;
    let w = weights::knn(&points, req.k, ids)?;
    let extra = Map::from_iter([
        ("k".to_string(), json!(req.k)),
        ("id_field".to_string(), json!(id_field)),
    ]);
    Ok(weights_response(
        "KNN spatial weights constructed successfully".into(),
        &w,
        extra,
    ))
}

/// Weights construction methods accepted by the weights pipelines.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Method {
    Contiguity(Contiguity),
    DistanceBand { threshold: f64, binary: bool },
    Knn { k: usize },
}

impl Method {
    fn parse(
        raw: &str,
        threshold: Option<f64>,
        k: Option<usize>,
        binary: bool,
    ) -> Result<Self, GisError> {
        match clean_arg(raw).to_ascii_lowercase().as_str() {
            "queen" => Ok(Self::Contiguity(Contiguity::Queen)),
            "rook" => Ok(Self::Contiguity(Contiguity::Rook)),
            "distance_band" => threshold
                .map(|threshold| Self::DistanceBand { threshold, binary })
                .ok_or_else(|| {
                    GisError::invalid_input("Threshold is required for distance_band method")
                }),
            "knn" => k
                .map(|k| Self::Knn { k })
                .ok_or_else(|| GisError::invalid_input("k is required for knn method")),
            other => Err(GisError::invalid_input(format!("Unsupported method: {other}"))),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Contiguity(kind) => kind.name(),
            Self::DistanceBand { .. } => "distance_band",
            Self::Knn { .. } => "knn",
        }
    }

    fn build(&self, table: &FeatureTable, ids: Vec<Value>) -> Result<Weights, GisError> {
        match *self {
            Self::Contiguity(kind) => weights::contiguity(&geometries(table)?, kind, ids),
            Self::DistanceBand { threshold, binary } => {
                let points = weights::representative_points(table)?;
                weights::distance_band(&points, threshold, binary, ids)
            }
            Self::Knn { k } => weights::knn(&weights::representative_points(table)?, k, ids),
        }
    }

    fn details(&self) -> Map<String, Value> {
        let (threshold, k, binary) = match *self {
            Self::Contiguity(_) => (None, None, None),
            Self::DistanceBand { threshold, binary } => (Some(threshold), None, Some(binary)),
            Self::Knn { k } => (None, Some(k), None),
        };
        Map::from_iter([
            ("method".to_string(), json!(self.name())),
            ("threshold".to_string(), json!(threshold)),
            ("k".to_string(), json!(k)),
            ("binary".to_string(), json!(binary)),
        ])
    }
}

fn build_from_args(args: &WeightsMethodArgs) -> Result<(Method, Weights), GisError> {
    let table = non_empty(vector::read_input(&args.data_path)?)?;
    let method = Method::parse(&args.method, args.threshold, args.k, args.binary)?;
    let id_field = clean_id_field(&args.id_field);
    let ids = weights::table_ids(&table, id_field.as_deref())?;
    let w = method.build(&table, ids)?;
    Ok((method, w))
}

pub fn build_and_transform_weights(req: BuildWeightsRequest) -> Result<WeightsResponse, GisError> {
    let (method, mut w) = build_from_args(&req.weights)?;
    w.set_transform(Transform::parse(&req.transform_type)?);
    let mut extra = method.details();
    extra.insert("transform".into(), json!(w.transform().code()));
    Ok(weights_response(
        format!("{} spatial weights built and transformed successfully", method.name()),
        &w,
        extra,
    ))
}

/// Output path with the format extension appended when missing.
fn weights_output_path(
    root: &Path,
    raw: &str,
    format: WeightsFormat,
) -> Result<std::path::PathBuf, GisError> {
    let mut cleaned = clean_arg(raw);
    let suffix = format!(".{}", format.extension());
    if !cleaned.to_ascii_lowercase().ends_with(&suffix) {
        cleaned.push_str(&suffix);
    }
    resolve_output_path(root, &cleaned)
}

pub fn build_transform_and_save_weights(
    req: SaveWeightsRequest,
    root: &Path,
) -> Result<StatsResponse, GisError> {
    let (method, mut w) = build_from_args(&req.weights)?;
    if let Some(raw) = req.transform_type.as_deref().filter(|raw| !raw.trim().is_empty()) {
        w.set_transform(Transform::parse(raw)?);
    }
    let format = WeightsFormat::parse(&req.format)?;
    let path = weights_output_path(root, &req.output_path, format)?;
    if path.exists() && !req.overwrite {
        return Err(GisError::OutputExists { path });
    }
    gal::write(&w, &path, format)?;
    let islands: Vec<Value> = w.islands().into_iter().map(|row| w.ids[row].clone()).collect();
    Ok(stats_response(
        format!("{} weights built and saved successfully", method.name()),
        json!({
            "path": path.display().to_string(),
            "format": format.extension(),
            "n": w.n(),
            "transform": w.transform().code(),
            "islands": islands,
        }),
    ))
}

pub fn ols_with_spatial_diagnostics(req: OlsRequest) -> Result<RegressionResponse, GisError> {
    let table = non_empty(vector::read_input(&req.data_path)?)?;
    let y_field = clean_arg(&req.y_field);
    let x_fields = req.x_fields.names();
    if table.column_index(&y_field).is_none() {
        return Err(GisError::invalid_input(format!(
            "Dependent variable '{y_field}' not found in dataset"
        )));
    }
    if x_fields.is_empty() || x_fields.iter().any(|x| table.column_index(x).is_none()) {
        return Err(GisError::invalid_input(format!(
            "Independent variable(s) {x_fields:?} not found in dataset"
        )));
    }
    let y = float_column(&table, &y_field)?;
    let regressors = x_fields
        .iter()
        .map(|name| Ok(Variable::new(name.clone(), float_column(&table, name)?)))
        .collect::<Result<Vec<_>, GisError>>()?;
    let fit = regression::ols(&y, &regressors)?;

    let mut w = match req.weights_path.as_deref().filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => gal::read(&existing_input(raw)?)?,
        None => {
            let method = Method::parse(&req.weights_method, req.threshold, req.k, req.binary)?;
            let id_field = clean_id_field(&req.id_field);
            method.build(&table, weights::table_ids(&table, id_field.as_deref())?)?
        }
    };
    if w.n() != table.len() {
        return Err(GisError::statistics(format!(
            "the weights cover {} observations but the layer has {}",
            w.n(),
            table.len()
        )));
    }
    w.set_transform(Transform::Row);
    let diagnostics = regression::spatial_diagnostics(&fit, &y, &w)?;

    let betas: Map<String, Value> = fit
        .names
        .iter()
        .zip(&fit.betas)
        .map(|(name, beta)| (name.clone(), json!(beta)))
        .collect();
    let result = into_object(json!({
        "n_obs": fit.n(),
        "r2": fit.r2,
        "adj_r2": fit.adj_r2,
        "betas": betas,
        "std_error": fit.std_error,
        "t_stats": fit.t_stats,
        "sigma2": fit.sigma2,
        "moran_residual": diagnostics.moran_residual,
        "moran_pvalue": diagnostics.moran_pvalue,
        "lm_error": diagnostics.lm_error,
        "lm_lag": diagnostics.lm_lag,
    }));
    Ok(RegressionResponse {
        status: SUCCESS.into(),
        message: "OLS regression with spatial diagnostics completed successfully".into(),
        regression_results: result.clone(),
        result,
    })
}

/// Weights for the panel tools: `queen`, `rook` or inverse-distance `distance`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PanelMethod {
    Contiguity(Contiguity),
    Distance,
}

impl PanelMethod {
    fn parse(raw: &str) -> Result<Self, GisError> {
        match clean_arg(raw).to_ascii_lowercase().as_str() {
            "queen" => Ok(Self::Contiguity(Contiguity::Queen)),
            "rook" => Ok(Self::Contiguity(Contiguity::Rook)),
            "distance" => Ok(Self::Distance),
            other => Err(GisError::invalid_input(format!("Unknown weights_method: {other}"))),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Contiguity(kind) => kind.name(),
            Self::Distance => "distance",
        }
    }

    fn build(&self, table: &FeatureTable, threshold: Threshold) -> Result<Weights, GisError> {
        match *self {
            Self::Contiguity(kind) => Ok(row_standardized(weights::contiguity(
                &geometries(table)?,
                kind,
                sequential_ids(table.len()),
            )?)),
            Self::Distance => inverse_distance(table, threshold.value),
        }
    }

    /// Suffix noting the degree conversion of a distance threshold.
    fn threshold_note(&self, threshold: Threshold) -> String {
        match self {
            Self::Distance if threshold.degrees => {
                format!(" (threshold interpreted as {:.6} degrees).", threshold.value)
            }
            _ => String::new(),
        }
    }
}

/// Layer, weights without islands and the input rows that were kept.
struct Panel {
    table: FeatureTable,
    weights: Weights,
    kept: Vec<usize>,
}

impl Panel {
    fn build(
        table: FeatureTable,
        method: PanelMethod,
        threshold: Threshold,
    ) -> Result<Self, GisError> {
        let weights = method.build(&table, threshold)?;
        let islands = weights.islands();
        if islands.is_empty() {
            let kept = (0..table.len()).collect();
            return Ok(Self {
                table,
                weights,
                kept,
            });
        }
        if islands.len() == table.len() {
            return Err(GisError::statistics(
                "All units are islands under current weights; adjust weights_method/threshold.",
            ));
        }
        let kept: Vec<usize> = (0..table.len())
            .filter(|row| islands.binary_search(row).is_err())
            .collect();
        let table = subset_table(&table, &kept);
        let weights = method.build(&table, threshold)?;
        Ok(Self {
            table,
            weights,
            kept,
        })
    }
}

/// Load, project and optionally drop rows with missing values in `columns`.
fn load_panel_table(
    path: &str,
    columns: &[String],
    target_crs: &str,
    drop_na: bool,
) -> Result<(FeatureTable, Vec<Vec<f64>>), GisError> {
    let table = vector::read_input(path)?;
    let missing: Vec<String> = columns
        .iter()
        .filter(|name| table.column_index(name).is_none())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(GisError::MissingColumns { columns: missing });
    }
    let table = table.to_crs(&clean_arg(target_crs))?;
    let by_column = columns
        .iter()
        .map(|name| float_column(&table, name))
        .collect::<Result<Vec<_>, GisError>>()?;
    let rows: Vec<Vec<f64>> = (0..table.len())
        .map(|row| by_column.iter().map(|column| column[row]).collect())
        .collect();
    if !drop_na {
        return Ok((table, rows));
    }
    let keep: Vec<usize> = (0..rows.len())
        .filter(|&row| rows[row].iter().all(|v| v.is_finite()))
        .collect();
    if keep.is_empty() {
        return Err(GisError::statistics("All rows dropped due to missing values."));
    }
    if keep.len() == rows.len() {
        return Ok((table, rows));
    }
    Ok((subset_table(&table, &keep), pick(&rows, &keep)))
}

pub fn spatial_markov(
    req: SpatialMarkovRequest,
    section: &StatisticsSection,
) -> Result<StatsResponse, GisError> {
    let columns = req.value_columns.names();
    if columns.len() < 2 {
        return Err(GisError::invalid_input(
            "value_columns must include at least 2 time steps (wide format).",
        ));
    }
    let method = PanelMethod::parse(&req.weights_method)?;
    let threshold = Threshold::new(req.distance_threshold, &req.target_crs, section)?;
    let (table, mut rows) =
        load_panel_table(&req.shapefile_path, &columns, &req.target_crs, req.drop_na)?;
    if req.relative {
        markov::relative_to_period_means(&mut rows);
    }
    let panel = Panel::build(table, method, threshold)?;
    let rows = pick(&rows, &panel.kept);
    let options = MarkovOptions {
        k: req.k,
        m: req.m,
        fixed: req.fixed,
        fill_empty_classes: req.fill_empty_classes,
        inference: Inference {
            permutations: req.permutations,
            seed: section.seed,
        },
    };
    let sm = markov::spatial_markov(&rows, &panel.weights, options)?;
    Ok(stats_response(
        format!(
            "Spatial Markov completed successfully{}",
            method.threshold_note(threshold)
        ),
        json!({
            "n_regions": rows.len(),
            "n_periods": columns.len(),
            "k_classes_y": req.k,
            "m_classes_lag": req.m,
            "weights_method": method.name(),
            "value_columns": columns,
            "discretization": {
                "cutoffs_y": sm.cutoffs_y,
                "cutoffs_lag": sm.cutoffs_lag,
                "fixed": req.fixed,
            },
            "global_transition_prob_p": sm.p,
            "conditional_transition_prob_P": sm.conditional,
            "global_steady_state_s": sm.s,
            "conditional_steady_states_S": sm.conditional_steady,
            "tests": {
                "chi2_total_x2": sm.x2,
                "chi2_df": sm.x2_dof,
                "chi2_pvalue": sm.x2_pvalue,
                "chi2_rpvalue": sm.x2_rpvalue,
                "Q": sm.q,
                "Q_p_value": sm.q_p_value,
                "LR": sm.lr,
                "LR_p_value": sm.lr_p_value,
            },
            "data_preview": preview_rows(&panel.table, &columns, "geometry_wkt"),
        }),
    ))
}

pub fn dynamic_lisa(
    req: DynamicLisaRequest,
    section: &StatisticsSection,
) -> Result<StatsResponse, GisError> {
    let columns = req.value_columns.names();
    if columns.len() != 2 {
        return Err(GisError::invalid_input(
            "value_columns must be exactly two columns: [start_time, end_time].",
        ));
    }
    let alternative = Alternative::parse(&req.alternative)?;
    let method = PanelMethod::parse(&req.weights_method)?;
    let threshold = Threshold::new(req.distance_threshold, &req.target_crs, section)?;
    let (table, mut rows) =
        load_panel_table(&req.shapefile_path, &columns, &req.target_crs, req.drop_na)?;
    if req.relative {
        markov::relative_to_period_means(&mut rows);
    }
    let panel = Panel::build(table, method, threshold)?;
    let rows = pick(&rows, &panel.kept);
    let start: Vec<f64> = rows.iter().map(|row| row[0]).collect();
    let end: Vec<f64> = rows.iter().map(|row| row[1]).collect();
    let inference = Inference {
        permutations: req.permutations,
        seed: section.seed,
    };
    let result = rose::rose(&start, &end, &panel.weights, req.k, inference, alternative)?;
    let (p_values, expected, larger, smaller) = match &result.inference {
        Some(stats) => (
            json!(stats.p_values),
            json!(stats.expected_counts),
            json!(stats.larger_or_equal),
            json!(stats.smaller_or_equal),
        ),
        None => (Value::Null, Value::Null, Value::Null, Value::Null),
    };
    Ok(stats_response(
        format!(
            "Dynamic LISA (Rose) completed successfully{}",
            method.threshold_note(threshold)
        ),
        json!({
            "n_regions": rows.len(),
            "k_sectors": req.k,
            "weights_method": method.name(),
            "value_columns": columns,
            "cuts_radians": result.cuts,
            "sector_counts": result.counts,
            "angles_theta_rad": result.theta,
            "vector_lengths_r": result.r,
            "bins_used": result.cuts,
            "inference": {
                "permutations": req.permutations,
                "alternative": alternative.name(),
                "p_values_by_sector": p_values,
                "expected_counts_perm": expected,
                "larger_or_equal_counts": larger,
                "smaller_or_equal_counts": smaller,
            },
            "data_preview": preview_rows(&panel.table, &columns, "geometry_wkt"),
        }),
    ))
}

fn optional_columns(list: &Option<ColumnList>) -> Vec<String> {
    list.as_ref().map(ColumnList::names).unwrap_or_default()
}

fn variables(names: &[String], values: &[Vec<f64>], offset: usize) -> Vec<Variable> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            Variable::new(name.clone(), values.iter().map(|row| row[offset + i]).collect())
        })
        .collect()
}

pub fn gm_lag(req: GmLagRequest, section: &StatisticsSection) -> Result<StatsResponse, GisError> {
    let y_col = clean_arg(&req.y_col);
    let x_cols = req.x_cols.names();
    let yend_cols = optional_columns(&req.yend_cols);
    let q_cols = optional_columns(&req.q_cols);
    if x_cols.is_empty() {
        return Err(GisError::invalid_input("x_cols must include at least one regressor."));
    }
    let robust = Robust::parse(req.robust.as_deref())?;
    let method = PanelMethod::parse(&req.weights_method)?;
    let threshold = Threshold::new(req.distance_threshold, &req.target_crs, section)?;

    let needed: Vec<String> = std::iter::once(y_col.clone())
        .chain(x_cols.iter().cloned())
        .chain(yend_cols.iter().cloned())
        .chain(q_cols.iter().cloned())
        .collect();
    let (table, rows) =
        load_panel_table(&req.shapefile_path, &needed, &req.target_crs, req.drop_na)?;
    let panel = Panel::build(table, method, threshold)?;
    let rows = pick(&rows, &panel.kept);

    let spec = LagSpec {
        y: Variable::new(y_col.clone(), rows.iter().map(|row| row[0]).collect()),
        x: variables(&x_cols, &rows, 1),
        yend: variables(&yend_cols, &rows, 1 + x_cols.len()),
        q: variables(&q_cols, &rows, 1 + x_cols.len() + yend_cols.len()),
        w_lags: req.w_lags,
        lag_q: req.lag_q,
        robust,
        spat_diag: req.spat_diag,
        sig2n_k: req.sig2n_k,
    };
    let fit = regression::gm_lag(&spec, &panel.weights)?;
    let z_stats: Vec<Value> = fit
        .z_stats
        .iter()
        .map(|(z, p)| json!({"z": z, "p": p}))
        .collect();
    let preview_columns: Vec<String> = std::iter::once(y_col.clone())
        .chain(x_cols.iter().cloned())
        .collect();
    let endog = (!yend_cols.is_empty()).then_some(&yend_cols);
    let instruments = (!q_cols.is_empty()).then_some(&q_cols);
    Ok(stats_response(
        format!(
            "GM_Lag estimation completed successfully{}",
            method.threshold_note(threshold)
        ),
        json!({
            "n_obs": fit.n(),
            "k_vars": fit.betas.len(),
            "dependent": y_col,
            "exog": x_cols,
            "endog": endog,
            "instruments": instruments,
            "weights_method": method.name(),
            "spec": {
                "w_lags": req.w_lags,
                "lag_q": req.lag_q,
                "robust": matches!(robust, Robust::White).then_some("white"),
                "sig2n_k": req.sig2n_k,
            },
            "betas": fit.betas,
            "beta_names": fit.names,
            "std_err": fit.std_err,
            "z_stats": z_stats,
            "pseudo_r2": fit.pseudo_r2,
            "pseudo_r2_reduced": fit.pseudo_r2_reduced,
            "sig2": fit.sig2,
            "ssr": fit.ssr,
            "ak_test": fit.ak_test,
            "pred_y_head": fit.predy.iter().take(PREVIEW_ROWS).collect::<Vec<_>>(),
            "data_preview": preview_rows(&panel.table, &preview_columns, "geometry_wkt"),
        }),
    ))
}
