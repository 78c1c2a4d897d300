//! `create_map`: static PNG/JPEG/BMP/SVG maps drawn with plotters.

use std::path::Path;

use geo::Geometry;
use plotters::{
    coord::Shift,
    drawing::DrawingAreaErrorKind,
    element::Polygon as FilledArea,
    prelude::{
        BitMapBackend, ChartBuilder, Circle, Color, DrawingArea, DrawingBackend,
        IntoDrawingArea, PathElement, RGBColor, Rectangle, SVGBackend, SeriesLabelPosition,
        BLACK, WHITE,
    },
};

use super::{
    load_layer, output_file,
    request::{CreateMapRequest, LayerStyle, MapResponse},
    style::{column_colors, layer_color, parse_color, Palette, Rgb},
    LayerData,
};
use crate::{
    lib::errors::GisError,
    tools::{raster::Raster, vector::FeatureTable, SUCCESS},
};

const CANVAS: (u32, u32) = (1000, 800);
/// Rasters are downsampled to at most this many cells along each axis.
const MAX_RASTER_CELLS: usize = 400;
const DEFAULT_ALPHA: f64 = 0.6;
const DEFAULT_LINEWIDTH: f64 = 1.5;
const DEFAULT_MARKERSIZE: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageFormat {
    Bitmap,
    Svg,
}

impl ImageFormat {
    fn parse(raw: &str) -> Result<(Self, String), GisError> {
        let ext = raw.trim().trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "bmp" => Ok((Self::Bitmap, ext)),
            "svg" => Ok((Self::Svg, ext)),
            _ => Err(GisError::UnsupportedFormat { format: ext }),
        }
    }
}

enum Shape {
    Area(Vec<(f64, f64)>),
    Path(Vec<(f64, f64)>),
    Dot((f64, f64)),
}

fn ring(line: &geo::LineString<f64>) -> Vec<(f64, f64)> {
    line.coords().map(|c| (c.x, c.y)).collect()
}

fn shapes(geometry: &Geometry<f64>, out: &mut Vec<Shape>) {
    match geometry {
        Geometry::Point(point) => out.push(Shape::Dot((point.x(), point.y()))),
        Geometry::MultiPoint(points) => {
            out.extend(points.iter().map(|p| Shape::Dot((p.x(), p.y()))));
        }
        Geometry::Line(line) => out.push(Shape::Path(vec![
            (line.start.x, line.start.y),
            (line.end.x, line.end.y),
        ])),
        Geometry::LineString(line) => out.push(Shape::Path(ring(line))),
        Geometry::MultiLineString(lines) => out.extend(lines.iter().map(|l| Shape::Path(ring(l)))),
        Geometry::Polygon(polygon) => {
            out.push(Shape::Area(ring(polygon.exterior())));
            out.push(Shape::Path(ring(polygon.exterior())));
            out.extend(polygon.interiors().iter().map(|hole| Shape::Path(ring(hole))));
        }
        Geometry::MultiPolygon(polygons) => {
            for polygon in polygons {
                shapes(&Geometry::Polygon(polygon.clone()), out);
            }
        }
        Geometry::Rect(rect) => shapes(&Geometry::Polygon(rect.to_polygon()), out),
        Geometry::Triangle(triangle) => shapes(&Geometry::Polygon(triangle.to_polygon()), out),
        Geometry::GeometryCollection(collection) => {
            for member in collection {
                shapes(member, out);
            }
        }
    }
}

/// A layer resolved to drawable shapes and legend entries.
struct Prepared {
    shapes: Vec<(Shape, Rgb)>,
    cells: Vec<([(f64, f64); 2], Rgb)>,
    bounds: Option<[f64; 4]>,
    legend: Vec<(String, Rgb)>,
    alpha: f64,
    linewidth: u32,
    markersize: u32,
}

impl Prepared {
    fn new(style: &LayerStyle) -> Self {
        let pixels =
            |value: Option<f64>, default: f64| value.unwrap_or(default).max(1.0).round() as u32;
        Self {
            shapes: Vec::new(),
            cells: Vec::new(),
            bounds: None,
            legend: Vec::new(),
            alpha: style.alpha.unwrap_or(DEFAULT_ALPHA).clamp(0.0, 1.0),
            linewidth: pixels(style.linewidth, DEFAULT_LINEWIDTH),
            markersize: pixels(style.markersize, DEFAULT_MARKERSIZE),
        }
    }
}

fn prepare_vector(
    table: &FeatureTable,
    style: &LayerStyle,
    base: Rgb,
) -> Result<Prepared, GisError> {
    let mut prepared = Prepared::new(style);
    prepared.bounds = table.total_bounds();
    let per_feature = match &style.column {
        Some(column) => {
            let colored = column_colors(table, column, style.cmap.as_deref())?;
            prepared.legend = colored.legend;
            Some(colored.colors)
        }
        None => {
            if let Some(label) = &style.label {
                prepared.legend.push((label.clone(), base));
            }
            None
        }
    };
    for (at, feature) in table.features.iter().enumerate() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        let color = match &per_feature {
            Some(colors) => colors[at].unwrap_or(Rgb(190, 190, 190)),
            None => base,
        };
        let mut out = Vec::new();
        shapes(geometry, &mut out);
        prepared.shapes.extend(out.into_iter().map(|shape| (shape, color)));
    }
    Ok(prepared)
}

fn value_range(raster: &Raster, band: &[f64]) -> (f64, f64) {
    raster
        .valid_values(band)
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// Three or more bands draw as RGB, otherwise band 1 on a ramp.
fn prepare_raster(raster: &Raster, style: &LayerStyle) -> Result<Prepared, GisError> {
    let mut prepared = Prepared::new(style);
    let [minx, miny, maxx, maxy] = raster.bounds();
    prepared.bounds = Some([minx, miny, maxx, maxy]);
    if let Some(label) = &style.label {
        prepared.legend.push((label.clone(), Rgb(128, 128, 128)));
    }
    let channels: Vec<&[f64]> = if raster.band_count() >= 3 {
        vec![raster.band(1)?, raster.band(2)?, raster.band(3)?]
    } else {
        vec![raster.band(1)?]
    };
    let ranges: Vec<(f64, f64)> = channels.iter().map(|band| value_range(raster, band)).collect();
    let palette = Palette::parse(style.cmap.as_deref().or(Some("greys")), true)?;
    let scale = |value: f64, (lo, hi): (f64, f64)| {
        if hi > lo {
            (value - lo) / (hi - lo)
        } else {
            0.0
        }
    };

    let stride = raster.width.max(raster.height).div_ceil(MAX_RASTER_CELLS).max(1);
    for row in (0..raster.height).step_by(stride) {
        for col in (0..raster.width).step_by(stride) {
            let values: Vec<f64> = channels.iter().map(|band| raster.at(band, col, row)).collect();
            if values.iter().any(|v| raster.is_masked(*v)) {
                continue;
            }
            let color = if channels.len() == 3 {
                let byte = |at: usize| (scale(values[at], ranges[at]) * 255.0).round() as u8;
                Rgb(byte(0), byte(1), byte(2))
            } else if palette == Palette::Greys {
                // greys runs white to black
                palette.sample(1.0 - scale(values[0], ranges[0]))
            } else {
                palette.sample(scale(values[0], ranges[0]))
            };
            let corner = raster.pixel_to_world(col as f64, row as f64);
            let far = raster.pixel_to_world(
                (col + stride).min(raster.width) as f64,
                (row + stride).min(raster.height) as f64,
            );
            prepared.cells.push(([corner, far], color));
        }
    }
    Ok(prepared)
}

fn merge(bounds: Option<[f64; 4]>, other: Option<[f64; 4]>) -> Option<[f64; 4]> {
    match (bounds, other) {
        (Some(a), Some(b)) => Some([
            a[0].min(b[0]),
            a[1].min(b[1]),
            a[2].max(b[2]),
            a[3].max(b[3]),
        ]),
        (a, b) => a.or(b),
    }
}

/// Bounds grown by 5% on each side; a degenerate axis gets one unit.
fn padded(bounds: [f64; 4]) -> ([f64; 2], [f64; 2]) {
    let pad = |low: f64, high: f64| {
        let margin = if high > low { (high - low) * 0.05 } else { 1.0 };
        [low - margin, high + margin]
    };
    (pad(bounds[0], bounds[2]), pad(bounds[1], bounds[3]))
}

fn render_error<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> GisError {
    GisError::render(err.to_string())
}

fn plot_color(rgb: Rgb) -> RGBColor {
    RGBColor(rgb.0, rgb.1, rgb.2)
}

struct Frame<'a> {
    title: Option<&'a str>,
    show_grid: bool,
    add_legend: bool,
    x: [f64; 2],
    y: [f64; 2],
}

fn draw<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    layers: &[Prepared],
    frame: &Frame<'_>,
) -> Result<(), GisError> {
    root.fill(&WHITE).map_err(render_error)?;
    let mut builder = ChartBuilder::on(&root);
    builder.margin(20).x_label_area_size(40).y_label_area_size(60);
    if let Some(title) = frame.title {
        builder.caption(title, ("sans-serif", 28));
    }
    let mut chart = builder
        .build_cartesian_2d(frame.x[0]..frame.x[1], frame.y[0]..frame.y[1])
        .map_err(render_error)?;

    let mut mesh = chart.configure_mesh();
    mesh.x_desc("x").y_desc("y");
    if !frame.show_grid {
        mesh.disable_mesh();
    }
    mesh.draw().map_err(render_error)?;

    let mut labelled = false;
    for layer in layers {
        chart
            .draw_series(layer.cells.iter().map(|(corners, color)| {
                Rectangle::new(*corners, plot_color(*color).filled())
            }))
            .map_err(render_error)?;
        for (shape, color) in &layer.shapes {
            let color = plot_color(*color);
            let drawn = match shape {
                Shape::Area(points) => chart.draw_series(std::iter::once(FilledArea::new(
                    points.clone(),
                    color.mix(layer.alpha).filled(),
                ))),
                Shape::Path(points) => chart.draw_series(std::iter::once(PathElement::new(
                    points.clone(),
                    color.stroke_width(layer.linewidth),
                ))),
                Shape::Dot(point) => chart.draw_series(std::iter::once(Circle::new(
                    *point,
                    layer.markersize,
                    color.filled(),
                ))),
            };
            drawn.map_err(render_error)?;
        }
        if frame.add_legend {
            for (label, color) in &layer.legend {
                let swatch = plot_color(*color);
                chart
                    .draw_series(std::iter::empty::<Circle<(f64, f64), u32>>())
                    .map_err(render_error)?
                    .label(label.as_str())
                    .legend(move |(x, y)| {
                        Rectangle::new([(x, y - 5), (x + 10, y + 5)], swatch.filled())
                    });
                labelled = true;
            }
        }
    }

    if labelled {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(render_error)?;
    }
    root.present().map_err(render_error)
}

fn prepare_layers(request: &CreateMapRequest) -> Result<Vec<Prepared>, GisError> {
    let mut reference: Option<FeatureTable> = None;
    let mut prepared = Vec::with_capacity(request.layers.len());
    for (at, layer) in request.layers.iter().enumerate() {
        let base = match &layer.style.color {
            Some(color) => parse_color(color)?,
            None => layer_color(at),
        };
        match load_layer(&layer.data, true)? {
            LayerData::Vector(table) => {
                let table = match &reference {
                    Some(first) => first.align(table)?,
                    None => table,
                };
                prepared.push(prepare_vector(&table, &layer.style, base)?);
                if reference.is_none() {
                    reference = Some(table);
                }
            }
            LayerData::Raster(raster) => prepared.push(prepare_raster(&raster, &layer.style)?),
        }
    }
    Ok(prepared)
}

/// Draw every layer into one image under `output_dir`.
pub fn create_map(request: CreateMapRequest, root: &Path) -> Result<MapResponse, GisError> {
    if request.layers.is_empty() {
        return Err(GisError::invalid_input("at least one layer is required"));
    }
    let (format, ext) = ImageFormat::parse(&request.filetype)?;
    let layers = prepare_layers(&request)?;
    let bounds = layers
        .iter()
        .map(|layer| layer.bounds)
        .fold(None, merge)
        .ok_or_else(|| GisError::invalid_input("layers contain no geometry to draw"))?;
    let (x, y) = padded(bounds);
    let frame = Frame {
        title: request.title.as_deref(),
        show_grid: request.show_grid,
        add_legend: request.add_legend,
        x,
        y,
    };

    let path = output_file(root, &request.output_dir, &request.filename, &ext)?;
    match format {
        ImageFormat::Bitmap => {
            draw(BitMapBackend::new(&path, CANVAS).into_drawing_area(), &layers, &frame)?
        }
        ImageFormat::Svg => {
            draw(SVGBackend::new(&path, CANVAS).into_drawing_area(), &layers, &frame)?
        }
    }
    tracing::info!(
        target: "gis_mcp::tools",
        path = %path.display(),
        layers = layers.len(),
        "Map image written"
    );
    Ok(MapResponse {
        status: SUCCESS.to_string(),
        message: format!("Map saved to {}", path.display()),
        output_path: path.to_string_lossy().into_owned(),
        layer_count: layers.len(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;
    use crate::tools::{
        raster::{io, DataType},
        visualize::request::MapLayer,
    };

    fn layer(data: serde_json::Value, style: LayerStyle) -> MapLayer {
        MapLayer { data, style }
    }

    fn request(layers: Vec<MapLayer>, filetype: &str) -> CreateMapRequest {
        CreateMapRequest {
            layers,
            filename: "city".into(),
            filetype: filetype.into(),
            title: Some("City overview".into()),
            show_grid: true,
            add_legend: true,
            output_dir: "maps".into(),
        }
    }

    fn labelled(label: &str) -> LayerStyle {
        LayerStyle {
            label: Some(label.into()),
            ..LayerStyle::default()
        }
    }

    #[test]
    fn svg_maps_draw_each_geometry_kind() {
        let dir = tempdir().expect("can create temporary directory");
        let layers = vec![
            layer(json!("POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))"), labelled("parcel")),
            layer(json!([[1.0, 1.0], [9.0, 9.0]]), labelled("road")),
            layer(
                json!([5.0, 5.0]),
                LayerStyle {
                    color: Some("#ff0000".into()),
                    ..labelled("well")
                },
            ),
        ];

        let response = create_map(request(layers, "svg"), dir.path()).expect("draws");
        assert_eq!(response.status, "success");
        assert_eq!(response.layer_count, 3);
        assert!(response.output_path.ends_with("city.svg"));

        let svg = std::fs::read_to_string(&response.output_path).expect("svg written");
        assert!(svg.contains("<svg"));
        assert!(svg.contains("<polygon"));
        assert!(svg.contains("<polyline"));
        assert!(svg.contains("<circle"));
        assert!(svg.contains("City overview"));
        assert!(svg.contains("parcel"));
        assert!(svg.contains("#FF0000") || svg.contains("#ff0000"));
    }

    #[test]
    fn png_maps_include_rasters() {
        let dir = tempdir().expect("can create temporary directory");
        let dem = Raster {
            width: 4,
            height: 3,
            bands: vec![(0..12).map(f64::from).collect()],
            geo_transform: [0.0, 1.0, 0.0, 3.0, 0.0, -1.0],
            projection: String::new(),
            nodata: Some(0.0),
            dtype: DataType::Float64,
        };
        let dem_path = dir.path().join("dem.tif");
        io::write(&dem, &dem_path).expect("raster written");

        let layers = vec![
            layer(json!(dem_path.to_string_lossy()), labelled("elevation")),
            layer(json!("POINT (2 1.5)"), LayerStyle::default()),
        ];
        let response = create_map(request(layers, "png"), dir.path()).expect("draws");
        let bytes = std::fs::read(&response.output_path).expect("png written");
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn raster_cells_skip_nodata_and_respect_the_cell_budget() {
        let dem = Raster {
            width: 2,
            height: 1,
            bands: vec![vec![-9999.0, 5.0]],
            geo_transform: [0.0, 1.0, 0.0, 1.0, 0.0, -1.0],
            projection: String::new(),
            nodata: Some(-9999.0),
            dtype: DataType::Float64,
        };
        let prepared = prepare_raster(&dem, &LayerStyle::default()).expect("prepares");
        assert_eq!(prepared.cells.len(), 1);
        assert_eq!(prepared.cells[0].0, [(1.0, 1.0), (2.0, 0.0)]);
        assert_eq!(prepared.bounds, Some([0.0, 0.0, 2.0, 1.0]));

        let wide = Raster {
            width: 1000,
            height: 10,
            bands: vec![vec![1.0; 10_000]],
            ..dem
        };
        let prepared = prepare_raster(&wide, &LayerStyle::default()).expect("prepares");
        assert_eq!(prepared.cells.len(), 334 * 4);
    }

    #[test]
    fn unknown_filetypes_and_empty_requests_are_rejected() {
        let dir = tempdir().expect("can create temporary directory");
        let layers = vec![layer(json!("POINT (0 0)"), LayerStyle::default())];
        let err = create_map(request(layers, "pdf"), dir.path()).unwrap_err();
        assert!(matches!(err, GisError::UnsupportedFormat { .. }));
        let err = create_map(request(Vec::new(), "png"), dir.path()).unwrap_err();
        assert!(matches!(err, GisError::InvalidInput { .. }));
    }

    #[test]
    fn padding_handles_single_points() {
        assert_eq!(padded([5.0, 5.0, 5.0, 5.0]), ([4.0, 6.0], [4.0, 6.0]));
        let (x, _) = padded([0.0, 0.0, 100.0, 10.0]);
        assert_eq!(x, [-5.0, 105.0]);
    }
}
