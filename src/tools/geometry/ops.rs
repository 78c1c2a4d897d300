//! Planar geometry operations on top of the `geo` algorithms.

use std::{cmp::Ordering, f64::consts::FRAC_PI_2};

use geo::{
    algorithm::buffer::{Buffer, BufferStyle, LineCap, LineJoin},
    line_intersection::line_intersection,
    unary_union, Area, BooleanOps, BoundingRect, Centroid, Closest, ClosestPoint, ConvexHull,
    Coord, CoordsIter, Distance, Euclidean, Geometry, GeometryCollection, Intersects, Line,
    LineIntersection, LineString, LinesIter, MapCoords, MinimumRotatedRect, MultiLineString,
    MultiPoint, MultiPolygon, Point, Polygon, Rotate, Scale, Simplify, Translate, Validation,
};
use rstar::RTree;

use crate::lib::errors::GisError;

/// Corner treatment for buffers, numbered as in the tool parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JoinStyle {
    Round,
    Mitre,
    Bevel,
}

impl JoinStyle {
    pub fn from_code(code: u8) -> Result<Self, GisError> {
        match code {
            1 => Ok(Self::Round),
            2 => Ok(Self::Mitre),
            3 => Ok(Self::Bevel),
            other => Err(GisError::invalid_input(format!(
                "join_style must be 1 (round), 2 (mitre) or 3 (bevel), got {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BufferParams {
    pub distance: f64,
    pub resolution: u32,
    pub join_style: JoinStyle,
    pub mitre_limit: f64,
    pub single_sided: bool,
}

/// Set-theoretic overlay between two geometries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    Intersection,
    Union,
    Difference,
    SymmetricDifference,
}

impl Overlay {
    pub fn name(&self) -> &'static str {
        match self {
            Overlay::Intersection => "intersection",
            Overlay::Union => "union",
            Overlay::Difference => "difference",
            Overlay::SymmetricDifference => "symmetric_difference",
        }
    }
}

/// Where rotation and scaling are anchored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Origin {
    Center,
    Centroid,
    Point(f64, f64),
}

impl Origin {
    pub fn parse(raw: &str) -> Result<Self, GisError> {
        let cleaned = raw.trim().to_ascii_lowercase();
        match cleaned.as_str() {
            "" | "center" => Ok(Self::Center),
            "centroid" => Ok(Self::Centroid),
            _ => {
                let parts: Vec<&str> = cleaned
                    .trim_matches(|c| c == '(' || c == ')' || c == '[' || c == ']')
                    .split(',')
                    .map(str::trim)
                    .collect();
                match parts.as_slice() {
                    [x, y] => {
                        let x = x.parse::<f64>();
                        let y = y.parse::<f64>();
                        match (x, y) {
                            (Ok(x), Ok(y)) => Ok(Self::Point(x, y)),
                            _ => Err(origin_error(raw)),
                        }
                    }
                    _ => Err(origin_error(raw)),
                }
            }
        }
    }
}

fn origin_error(raw: &str) -> GisError {
    GisError::invalid_input(format!(
        "origin must be \"center\", \"centroid\" or \"x,y\", got {raw:?}"
    ))
}

pub fn is_areal(geometry: &Geometry<f64>) -> bool {
    matches!(
        geometry,
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::Rect(_) | Geometry::Triangle(_)
    )
}

fn is_lineal(geometry: &Geometry<f64>) -> bool {
    matches!(
        geometry,
        Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_)
    )
}

fn is_puntal(geometry: &Geometry<f64>) -> bool {
    matches!(geometry, Geometry::Point(_) | Geometry::MultiPoint(_))
}

/// Polygonal parts of an areal geometry, or `None` for anything else.
pub fn as_multi_polygon(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => Some(MultiPolygon::new(vec![polygon.clone()])),
        Geometry::MultiPolygon(multi) => Some(multi.clone()),
        Geometry::Rect(rect) => Some(MultiPolygon::new(vec![rect.to_polygon()])),
        Geometry::Triangle(triangle) => Some(MultiPolygon::new(vec![triangle.to_polygon()])),
        _ => None,
    }
}

fn as_multi_line_string(geometry: &Geometry<f64>) -> Option<MultiLineString<f64>> {
    match geometry {
        Geometry::Line(line) => Some(MultiLineString::new(vec![LineString::from(vec![
            line.start, line.end,
        ])])),
        Geometry::LineString(line) => Some(MultiLineString::new(vec![line.clone()])),
        Geometry::MultiLineString(multi) => Some(multi.clone()),
        _ => None,
    }
}

fn as_points(geometry: &Geometry<f64>) -> Option<Vec<Point<f64>>> {
    match geometry {
        Geometry::Point(point) => Some(vec![*point]),
        Geometry::MultiPoint(multi) => Some(multi.0.clone()),
        _ => None,
    }
}

/// Collapse single-part results to their simple type.
pub fn collapse_polygons(multi: MultiPolygon<f64>) -> Geometry<f64> {
    if multi.0.len() == 1 {
        let mut parts = multi.0;
        match parts.pop() {
            Some(polygon) => Geometry::Polygon(polygon),
            None => Geometry::MultiPolygon(MultiPolygon::new(Vec::new())),
        }
    } else {
        Geometry::MultiPolygon(multi)
    }
}

fn collapse_lines(multi: MultiLineString<f64>) -> Geometry<f64> {
    if multi.0.len() == 1 {
        let mut parts = multi.0;
        match parts.pop() {
            Some(line) => Geometry::LineString(line),
            None => Geometry::MultiLineString(MultiLineString::new(Vec::new())),
        }
    } else {
        Geometry::MultiLineString(multi)
    }
}

fn collapse_points(points: Vec<Point<f64>>) -> Geometry<f64> {
    if points.len() == 1 {
        Geometry::Point(points[0])
    } else {
        Geometry::MultiPoint(MultiPoint::new(points))
    }
}

pub fn buffer(geometry: &Geometry<f64>, params: &BufferParams) -> Result<Geometry<f64>, GisError> {
    if !params.distance.is_finite() {
        return Err(GisError::invalid_input("distance must be a finite number"));
    }
    if params.resolution == 0 {
        return Err(GisError::invalid_input("resolution must be at least 1"));
    }
    if params.distance == 0.0 && is_areal(geometry) {
        return Ok(geometry.clone());
    }
    if params.single_sided && params.distance != 0.0 {
        if let Some(lines) = as_multi_line_string(geometry) {
            return Ok(collapse_polygons(single_sided_buffer(&lines, params)));
        }
    }
    if params.distance <= 0.0 && !is_areal(geometry) {
        return Ok(Geometry::Polygon(Polygon::new(LineString::new(Vec::new()), Vec::new())));
    }

    let arc_step = FRAC_PI_2 / params.resolution as f64;
    let join = match params.join_style {
        JoinStyle::Round => LineJoin::Round(arc_step),
        JoinStyle::Mitre => LineJoin::Miter(mitre_angle(params.mitre_limit)),
        JoinStyle::Bevel => LineJoin::Bevel,
    };
    let style = BufferStyle::new(params.distance)
        .line_join(join)
        .line_cap(LineCap::Round(arc_step));
    Ok(collapse_polygons(geometry.buffer_with_style(style)))
}

/// Smallest corner angle, in radians, that still gets a full mitre under `limit`.
///
/// A mitre reaches `distance / sin(angle / 2)` from the vertex, so corners sharper than
/// `2 * asin(1 / limit)` are cut back.
fn mitre_angle(limit: f64) -> f64 {
    if limit <= 1.0 {
        std::f64::consts::PI
    } else {
        2.0 * (1.0 / limit).asin()
    }
}

/// One-sided offset of each segment: left for positive distance, right for negative.
fn single_sided_buffer(lines: &MultiLineString<f64>, params: &BufferParams) -> MultiPolygon<f64> {
    let side = params.distance.signum();
    let width = params.distance.abs();
    let arc_step = FRAC_PI_2 / params.resolution as f64;
    let mut pieces: Vec<Polygon<f64>> = Vec::new();

    for line in &lines.0 {
        let coords: Vec<Coord<f64>> = line.coords().copied().collect();
        let mut normals = Vec::new();
        for pair in coords.windows(2) {
            let (dx, dy) = (pair[1].x - pair[0].x, pair[1].y - pair[0].y);
            let len = dx.hypot(dy);
            if len == 0.0 {
                continue;
            }
            let normal = Coord {
                x: -dy / len * width * side,
                y: dx / len * width * side,
            };
            normals.push((pair[0], pair[1], normal));
            pieces.push(Polygon::new(
                LineString::from(vec![
                    pair[0],
                    pair[1],
                    pair[1] + normal,
                    pair[0] + normal,
                    pair[0],
                ]),
                Vec::new(),
            ));
        }
        for window in normals.windows(2) {
            let (_, vertex, incoming) = window[0];
            let outgoing = window[1].2;
            let turn = incoming.x * outgoing.y - incoming.y * outgoing.x;
            // Only the convex side of a bend leaves a gap between quads.
            if turn * side >= 0.0 {
                continue;
            }
            let start = incoming.y.atan2(incoming.x);
            let mut sweep = outgoing.y.atan2(outgoing.x) - start;
            if side > 0.0 && sweep > 0.0 {
                sweep -= std::f64::consts::TAU;
            } else if side < 0.0 && sweep < 0.0 {
                sweep += std::f64::consts::TAU;
            }
            let steps = ((sweep.abs() / arc_step).ceil() as usize).max(1);
            let mut ring = vec![vertex];
            for step in 0..=steps {
                let angle = start + sweep * step as f64 / steps as f64;
                ring.push(Coord {
                    x: vertex.x + width * angle.cos(),
                    y: vertex.y + width * angle.sin(),
                });
            }
            ring.push(vertex);
            pieces.push(Polygon::new(LineString::from(ring), Vec::new()));
        }
    }
    unary_union(pieces.iter())
}

pub fn overlay(
    first: &Geometry<f64>,
    second: &Geometry<f64>,
    op: Overlay,
) -> Result<Geometry<f64>, GisError> {
    if let (Some(a), Some(b)) = (as_multi_polygon(first), as_multi_polygon(second)) {
        let result = match op {
            Overlay::Intersection => a.intersection(&b),
            Overlay::Union => a.union(&b),
            Overlay::Difference => a.difference(&b),
            Overlay::SymmetricDifference => a.xor(&b),
        };
        return Ok(collapse_polygons(result));
    }

    if let (Some(lines), Some(polygons)) = (as_multi_line_string(first), as_multi_polygon(second))
    {
        match op {
            Overlay::Intersection => return Ok(collapse_lines(polygons.clip(&lines, false))),
            Overlay::Difference => return Ok(collapse_lines(polygons.clip(&lines, true))),
            _ => {}
        }
    }
    if let (Some(polygons), Some(lines)) = (as_multi_polygon(first), as_multi_line_string(second))
    {
        match op {
            Overlay::Intersection => return Ok(collapse_lines(polygons.clip(&lines, false))),
            Overlay::Difference => return Ok(first.clone()),
            _ => {}
        }
    }

    if let Some(points) = as_points(first) {
        if let Some(others) = as_points(second) {
            return Ok(point_set_overlay(points, others, op));
        }
        match op {
            Overlay::Intersection => {
                let kept: Vec<_> = points.into_iter().filter(|p| p.intersects(second)).collect();
                return Ok(collapse_points(kept));
            }
            Overlay::Difference => {
                let kept: Vec<_> = points
                    .into_iter()
                    .filter(|p| !p.intersects(second))
                    .collect();
                return Ok(collapse_points(kept));
            }
            _ => {}
        }
    }
    if is_puntal(second) && op == Overlay::Difference {
        return Ok(first.clone());
    }

    if is_lineal(first) && is_lineal(second) && op == Overlay::Union {
        let mut parts = as_multi_line_string(first).map(|m| m.0).unwrap_or_default();
        parts.extend(as_multi_line_string(second).map(|m| m.0).unwrap_or_default());
        return Ok(collapse_lines(MultiLineString::new(parts)));
    }

    Err(GisError::unsupported_geometry(format!(
        "{} is not supported between {} and {}",
        op.name(),
        super::codec::geometry_type_name(first),
        super::codec::geometry_type_name(second)
    )))
}

fn same_point(a: &Point<f64>, b: &Point<f64>) -> bool {
    a.x() == b.x() && a.y() == b.y()
}

fn point_set_overlay(
    first: Vec<Point<f64>>,
    second: Vec<Point<f64>>,
    op: Overlay,
) -> Geometry<f64> {
    let in_second = |p: &Point<f64>| second.iter().any(|q| same_point(p, q));
    let in_first = |p: &Point<f64>| first.iter().any(|q| same_point(p, q));
    let mut result: Vec<Point<f64>> = match op {
        Overlay::Intersection => first.iter().copied().filter(|p| in_second(p)).collect(),
        Overlay::Difference => first.iter().copied().filter(|p| !in_second(p)).collect(),
        Overlay::Union => first.iter().chain(second.iter()).copied().collect(),
        Overlay::SymmetricDifference => first
            .iter()
            .copied()
            .filter(|p| !in_second(p))
            .chain(second.iter().copied().filter(|p| !in_first(p)))
            .collect(),
    };
    dedup_points(&mut result);
    collapse_points(result)
}

fn dedup_points(points: &mut Vec<Point<f64>>) {
    points.sort_by(|a, b| compare_coords(&a.0, &b.0));
    points.dedup_by(|a, b| same_point(a, b));
}

fn compare_coords(a: &Coord<f64>, b: &Coord<f64>) -> Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}

pub fn convex_hull(geometry: &Geometry<f64>) -> Geometry<f64> {
    Geometry::Polygon(geometry.convex_hull())
}

pub fn envelope(geometry: &Geometry<f64>) -> Result<Geometry<f64>, GisError> {
    let rect = geometry
        .bounding_rect()
        .ok_or_else(|| {
            GisError::invalid_input("cannot compute the envelope of an empty geometry")
        })?;
    let (min, max) = (rect.min(), rect.max());
    Ok(match (rect.width() == 0.0, rect.height() == 0.0) {
        (true, true) => Geometry::Point(Point::from(min)),
        (true, false) | (false, true) => Geometry::LineString(LineString::from(vec![min, max])),
        (false, false) => Geometry::Polygon(rect.to_polygon()),
    })
}

pub fn minimum_rotated_rectangle(geometry: &Geometry<f64>) -> Result<Geometry<f64>, GisError> {
    geometry
        .minimum_rotated_rect()
        .map(Geometry::Polygon)
        .ok_or_else(|| {
            GisError::invalid_input("cannot compute a rotated rectangle of an empty geometry")
        })
}

pub fn centroid(geometry: &Geometry<f64>) -> Result<Point<f64>, GisError> {
    geometry
        .centroid()
        .ok_or_else(|| GisError::invalid_input("cannot compute the centroid of an empty geometry"))
}

pub fn bounds(geometry: &Geometry<f64>) -> Result<[f64; 4], GisError> {
    let rect = geometry
        .bounding_rect()
        .ok_or_else(|| GisError::invalid_input("cannot compute the bounds of an empty geometry"))?;
    Ok([rect.min().x, rect.min().y, rect.max().x, rect.max().y])
}

pub fn coordinates(geometry: &Geometry<f64>) -> Vec<[f64; 2]> {
    geometry.coords_iter().map(|c| [c.x, c.y]).collect()
}

/// Rotate counter-clockwise by `angle` degrees (or radians).
pub fn rotate(
    geometry: &Geometry<f64>,
    angle: f64,
    origin: Origin,
    use_radians: bool,
) -> Result<Geometry<f64>, GisError> {
    let degrees = if use_radians { angle.to_degrees() } else { angle };
    Ok(match origin {
        Origin::Center => geometry.rotate_around_center(degrees),
        Origin::Centroid => geometry.rotate_around_centroid(degrees),
        Origin::Point(x, y) => geometry.rotate_around_point(degrees, Point::new(x, y)),
    })
}

pub fn scale(
    geometry: &Geometry<f64>,
    xfact: f64,
    yfact: f64,
    origin: Origin,
) -> Result<Geometry<f64>, GisError> {
    Ok(match origin {
        Origin::Center => geometry.scale_xy(xfact, yfact),
        Origin::Centroid => {
            let anchor = centroid(geometry)?;
            geometry.scale_around_point(xfact, yfact, anchor)
        }
        Origin::Point(x, y) => geometry.scale_around_point(xfact, yfact, Coord { x, y }),
    })
}

pub fn translate(geometry: &Geometry<f64>, xoff: f64, yoff: f64) -> Geometry<f64> {
    geometry.translate(xoff, yoff)
}

/// Merge geometries of one dimension; mixed inputs come back as a collection.
pub fn unary_union_all(geometries: &[Geometry<f64>]) -> Result<Geometry<f64>, GisError> {
    if geometries.is_empty() {
        return Err(GisError::invalid_input("geometries must not be empty"));
    }
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    let mut lines: Vec<LineString<f64>> = Vec::new();
    let mut points: Vec<Point<f64>> = Vec::new();
    for geometry in geometries {
        collect_parts(geometry, &mut polygons, &mut lines, &mut points);
    }

    let mut parts: Vec<Geometry<f64>> = Vec::new();
    if !polygons.is_empty() {
        parts.push(collapse_polygons(unary_union(polygons.iter())));
    }
    if !lines.is_empty() {
        parts.push(collapse_lines(MultiLineString::new(lines)));
    }
    if !points.is_empty() {
        dedup_points(&mut points);
        parts.push(collapse_points(points));
    }
    Ok(match parts.len() {
        1 => parts.remove(0),
        _ => Geometry::GeometryCollection(GeometryCollection::new_from(parts)),
    })
}

fn collect_parts(
    geometry: &Geometry<f64>,
    polygons: &mut Vec<Polygon<f64>>,
    lines: &mut Vec<LineString<f64>>,
    points: &mut Vec<Point<f64>>,
) {
    match geometry {
        Geometry::GeometryCollection(collection) => {
            for inner in &collection.0 {
                collect_parts(inner, polygons, lines, points);
            }
        }
        other => {
            if let Some(multi) = as_multi_polygon(other) {
                polygons.extend(multi.0);
            } else if let Some(multi) = as_multi_line_string(other) {
                lines.extend(multi.0);
            } else if let Some(parts) = as_points(other) {
                points.extend(parts);
            }
        }
    }
}

/// Planar length; polygons report their perimeter including holes.
pub fn length(geometry: &Geometry<f64>) -> f64 {
    fn ring_length(ring: &LineString<f64>) -> f64 {
        ring.lines().map(|line| line.dx().hypot(line.dy())).sum()
    }
    match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => 0.0,
        Geometry::Line(line) => line.dx().hypot(line.dy()),
        Geometry::LineString(line) => ring_length(line),
        Geometry::MultiLineString(multi) => multi.0.iter().map(ring_length).sum(),
        Geometry::GeometryCollection(collection) => collection.0.iter().map(length).sum(),
        other => as_multi_polygon(other)
            .map(|multi| {
                multi
                    .0
                    .iter()
                    .map(|polygon| {
                        ring_length(polygon.exterior())
                            + polygon.interiors().iter().map(ring_length).sum::<f64>()
                    })
                    .sum()
            })
            .unwrap_or(0.0),
    }
}

pub fn area(geometry: &Geometry<f64>) -> f64 {
    geometry.unsigned_area()
}

/// Validity flag plus a reason in the style of `explain_validity`.
pub fn validity(geometry: &Geometry<f64>) -> (bool, String) {
    let errors = geometry.validation_errors();
    match errors.first() {
        None => (true, "Valid Geometry".to_string()),
        Some(first) => (false, first.to_string()),
    }
}

/// Repair areal geometries; others pass through.
///
/// Each ring is split at its self-intersections into simple loops. Loops of one polygon
/// combine under the even-odd rule, so holes stay holes, and the polygons are then unioned.
pub fn make_valid(geometry: &Geometry<f64>) -> Geometry<f64> {
    match as_multi_polygon(geometry) {
        Some(multi) if !geometry.is_valid() => {
            let repaired: Vec<Polygon<f64>> = multi
                .0
                .iter()
                .flat_map(|polygon| even_odd_fill(polygon).0)
                .collect();
            collapse_polygons(unary_union(repaired.iter()))
        }
        _ => geometry.clone(),
    }
}

fn even_odd_fill(polygon: &Polygon<f64>) -> MultiPolygon<f64> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .flat_map(simple_loops)
        .fold(MultiPolygon::new(Vec::new()), |acc, ring| {
            acc.xor(&Polygon::new(ring, Vec::new()))
        })
}

/// Node a ring at every crossing or touch, then cut it into loops that revisit no vertex.
fn simple_loops(ring: &LineString<f64>) -> Vec<LineString<f64>> {
    let segments: Vec<Line<f64>> = ring.lines().filter(|line| line.start != line.end).collect();
    let count = segments.len();
    let mut splits: Vec<Vec<Coord<f64>>> = vec![Vec::new(); count];
    for i in 0..count {
        for j in (i + 1)..count {
            let adjacent = j == i + 1 || (i == 0 && j + 1 == count);
            match line_intersection(segments[i], segments[j]) {
                Some(LineIntersection::SinglePoint { intersection, .. }) if !adjacent => {
                    splits[i].push(intersection);
                    splits[j].push(intersection);
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    for end in [intersection.start, intersection.end] {
                        splits[i].push(end);
                        splits[j].push(end);
                    }
                }
                _ => {}
            }
        }
    }

    let mut noded: Vec<Coord<f64>> = Vec::new();
    for (segment, mut cuts) in segments.iter().zip(splits) {
        let along = |c: &Coord<f64>| (c.x - segment.start.x).hypot(c.y - segment.start.y);
        cuts.sort_by(|a, b| along(a).total_cmp(&along(b)));
        noded.push(segment.start);
        for cut in cuts {
            if cut != segment.start && cut != segment.end && noded.last() != Some(&cut) {
                noded.push(cut);
            }
        }
    }
    if let Some(first) = noded.first().copied() {
        noded.push(first);
    }

    let mut loops = Vec::new();
    let mut path: Vec<Coord<f64>> = Vec::new();
    for coord in noded {
        match path.iter().position(|seen| *seen == coord) {
            Some(start) => {
                let mut closed: Vec<Coord<f64>> = path.split_off(start + 1);
                closed.insert(0, coord);
                closed.push(coord);
                if closed.len() >= 4 && signed_ring_area(&closed).abs() > 0.0 {
                    loops.push(LineString::new(closed));
                }
            }
            None => path.push(coord),
        }
    }
    loops
}

pub fn simplify(
    geometry: &Geometry<f64>,
    tolerance: f64,
    preserve_topology: bool,
) -> Result<Geometry<f64>, GisError> {
    if !(tolerance.is_finite() && tolerance >= 0.0) {
        return Err(GisError::invalid_input("tolerance must be a non-negative number"));
    }
    let simplified = simplify_parts(geometry, tolerance);
    if preserve_topology && !simplified.is_valid() {
        return Ok(geometry.clone());
    }
    Ok(simplified)
}

fn simplify_parts(geometry: &Geometry<f64>, tolerance: f64) -> Geometry<f64> {
    match geometry {
        Geometry::LineString(line) => Geometry::LineString(line.simplify(tolerance)),
        Geometry::MultiLineString(multi) => Geometry::MultiLineString(multi.simplify(tolerance)),
        Geometry::Polygon(polygon) => Geometry::Polygon(polygon.simplify(tolerance)),
        Geometry::MultiPolygon(multi) => Geometry::MultiPolygon(multi.simplify(tolerance)),
        Geometry::GeometryCollection(collection) => Geometry::GeometryCollection(
            GeometryCollection::new_from(
                collection
                    .0
                    .iter()
                    .map(|inner| simplify_parts(inner, tolerance))
                    .collect(),
            ),
        ),
        other => other.clone(),
    }
}

/// Move vertices of `geometry` onto the nearest vertex of `reference` within `tolerance`.
pub fn snap(
    geometry: &Geometry<f64>,
    reference: &Geometry<f64>,
    tolerance: f64,
) -> Result<Geometry<f64>, GisError> {
    if !(tolerance.is_finite() && tolerance >= 0.0) {
        return Err(GisError::invalid_input("tolerance must be a non-negative number"));
    }
    let anchors: Vec<[f64; 2]> = reference.coords_iter().map(|c| [c.x, c.y]).collect();
    let tree = RTree::bulk_load(anchors);
    Ok(geometry.map_coords(|coord| {
        match tree.nearest_neighbor(&[coord.x, coord.y]) {
            Some(anchor) if (anchor[0] - coord.x).hypot(anchor[1] - coord.y) <= tolerance => {
                Coord {
                    x: anchor[0],
                    y: anchor[1],
                }
            }
            _ => coord,
        }
    }))
}

/// Point on `target` nearest to any part of `source`.
pub fn nearest_point(
    source: &Geometry<f64>,
    target: &Geometry<f64>,
) -> Result<Point<f64>, GisError> {
    for a in segments_of(source) {
        for b in segments_of(target) {
            if let Some(hit) = line_intersection(a, b) {
                let point = match hit {
                    LineIntersection::SinglePoint { intersection, .. } => intersection,
                    LineIntersection::Collinear { intersection } => intersection.start,
                };
                return Ok(Point::from(point));
            }
        }
    }

    let mut best: Option<(f64, Point<f64>)> = None;
    let mut consider = |distance: f64, on_target: Point<f64>| {
        if best.map_or(true, |(current, _)| distance < current) {
            best = Some((distance, on_target));
        }
    };
    for vertex in source.coords_iter().map(Point::from) {
        if let Some(on_target) = closest_on(target, vertex) {
            consider(Euclidean.distance(vertex, on_target), on_target);
        }
    }
    for vertex in target.coords_iter().map(Point::from) {
        if let Some(on_source) = closest_on(source, vertex) {
            consider(Euclidean.distance(vertex, on_source), vertex);
        }
    }
    best.map(|(_, point)| point).ok_or_else(|| {
        GisError::invalid_input("nearest point is indeterminate for the given geometries")
    })
}

fn closest_on(geometry: &Geometry<f64>, point: Point<f64>) -> Option<Point<f64>> {
    match geometry.closest_point(&point) {
        Closest::Intersection(found) | Closest::SinglePoint(found) => Some(found),
        Closest::Indeterminate => None,
    }
}

fn segments_of(geometry: &Geometry<f64>) -> Vec<Line<f64>> {
    match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => Vec::new(),
        Geometry::Line(line) => vec![*line],
        Geometry::LineString(line) => line.lines().collect(),
        Geometry::MultiLineString(multi) => multi.lines_iter().collect(),
        Geometry::Polygon(polygon) => polygon.lines_iter().collect(),
        Geometry::MultiPolygon(multi) => multi.lines_iter().collect(),
        Geometry::Rect(rect) => rect.to_polygon().lines_iter().collect(),
        Geometry::Triangle(triangle) => triangle.to_polygon().lines_iter().collect(),
        Geometry::GeometryCollection(collection) => {
            collection.0.iter().flat_map(segments_of).collect()
        }
    }
}

/// Canonical form: exterior rings clockwise, holes counter-clockwise, rings starting at
/// their smallest vertex, and multi-part members sorted.
pub fn normalize(geometry: &Geometry<f64>) -> Geometry<f64> {
    match geometry {
        Geometry::Point(point) => Geometry::Point(*point),
        Geometry::MultiPoint(multi) => {
            let mut points = multi.0.clone();
            points.sort_by(|a, b| compare_coords(&a.0, &b.0));
            Geometry::MultiPoint(MultiPoint::new(points))
        }
        Geometry::Line(line) => normalize(&Geometry::LineString(LineString::from(vec![
            line.start, line.end,
        ]))),
        Geometry::LineString(line) => Geometry::LineString(normalize_line(line)),
        Geometry::MultiLineString(multi) => {
            let mut lines: Vec<_> = multi.0.iter().map(normalize_line).collect();
            lines.sort_by(|a, b| compare_first(a, b));
            Geometry::MultiLineString(MultiLineString::new(lines))
        }
        Geometry::GeometryCollection(collection) => Geometry::GeometryCollection(
            GeometryCollection::new_from(collection.0.iter().map(normalize).collect()),
        ),
        other => match as_multi_polygon(other) {
            Some(multi) => {
                let mut polygons: Vec<_> = multi.0.iter().map(normalize_polygon).collect();
                polygons.sort_by(|a, b| compare_first(a.exterior(), b.exterior()));
                if matches!(other, Geometry::MultiPolygon(_)) {
                    Geometry::MultiPolygon(MultiPolygon::new(polygons))
                } else {
                    collapse_polygons(MultiPolygon::new(polygons))
                }
            }
            None => other.clone(),
        },
    }
}

fn compare_first(a: &LineString<f64>, b: &LineString<f64>) -> Ordering {
    match (a.0.first(), b.0.first()) {
        (Some(a), Some(b)) => compare_coords(a, b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

fn normalize_line(line: &LineString<f64>) -> LineString<f64> {
    let mut coords = line.0.clone();
    if let (Some(first), Some(last)) = (coords.first(), coords.last()) {
        if compare_coords(last, first) == Ordering::Less {
            coords.reverse();
        }
    }
    LineString::new(coords)
}

fn signed_ring_area(ring: &[Coord<f64>]) -> f64 {
    ring.windows(2)
        .map(|pair| pair[0].x * pair[1].y - pair[1].x * pair[0].y)
        .sum::<f64>()
        / 2.0
}

fn normalize_ring(ring: &LineString<f64>, clockwise: bool) -> LineString<f64> {
    let mut coords = ring.0.clone();
    if coords.len() < 4 {
        return ring.clone();
    }
    let area = signed_ring_area(&coords);
    if (clockwise && area > 0.0) || (!clockwise && area < 0.0) {
        coords.reverse();
    }
    coords.pop();
    let start = coords
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| compare_coords(a, b))
        .map(|(index, _)| index)
        .unwrap_or(0);
    coords.rotate_left(start);
    if let Some(first) = coords.first().copied() {
        coords.push(first);
    }
    LineString::new(coords)
}

fn normalize_polygon(polygon: &Polygon<f64>) -> Polygon<f64> {
    let exterior = normalize_ring(polygon.exterior(), true);
    let mut interiors: Vec<_> = polygon
        .interiors()
        .iter()
        .map(|ring| normalize_ring(ring, false))
        .collect();
    interiors.sort_by(compare_first);
    Polygon::new(exterior, interiors)
}

#[cfg(test)]
mod tests {
    use geo::polygon;
    use proptest::prelude::*;

    use super::*;

    fn unit_square() -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ])
    }

    fn round_buffer(distance: f64) -> BufferParams {
        BufferParams {
            distance,
            resolution: 16,
            join_style: JoinStyle::Round,
            mitre_limit: 5.0,
            single_sided: false,
        }
    }

    #[test]
    fn zero_buffer_returns_polygon_unchanged() {
        let square = unit_square();
        let buffered = buffer(&square, &round_buffer(0.0)).expect("buffers");
        assert_eq!(buffered, square);
    }

    #[test]
    fn point_buffer_approximates_a_disc() {
        let point = Geometry::Point(Point::new(0.0, 0.0));
        let buffered = buffer(&point, &round_buffer(1.0)).expect("buffers");
        let area = area(&buffered);
        assert!((area - std::f64::consts::PI).abs() < 0.05, "area was {area}");
    }

    #[test]
    fn mitre_buffer_of_square_is_larger_square() {
        let params = BufferParams {
            join_style: JoinStyle::Mitre,
            ..round_buffer(1.0)
        };
        let buffered = buffer(&unit_square(), &params).expect("buffers");
        assert!((area(&buffered) - 9.0).abs() < 1e-6);
    }

    #[test]
    fn single_sided_buffer_covers_one_side_only() {
        let line = Geometry::LineString(LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]));
        let params = BufferParams {
            single_sided: true,
            ..round_buffer(2.0)
        };
        let buffered = buffer(&line, &params).expect("buffers");
        let [_, miny, _, maxy] = bounds(&buffered).expect("bounds");
        assert!((area(&buffered) - 20.0).abs() < 1e-6);
        assert!(miny >= -1e-9 && (maxy - 2.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_join_style_is_rejected() {
        assert!(JoinStyle::from_code(4).is_err());
    }

    #[test]
    fn polygon_overlay_areas() {
        let a = unit_square();
        let b = translate(&a, 0.5, 0.0);
        let inter = overlay(&a, &b, Overlay::Intersection).expect("overlay");
        let union = overlay(&a, &b, Overlay::Union).expect("overlay");
        let diff = overlay(&a, &b, Overlay::Difference).expect("overlay");
        let sym = overlay(&a, &b, Overlay::SymmetricDifference).expect("overlay");
        assert!((area(&inter) - 0.5).abs() < 1e-9);
        assert!((area(&union) - 1.5).abs() < 1e-9);
        assert!((area(&diff) - 0.5).abs() < 1e-9);
        assert!((area(&sym) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn line_is_clipped_by_polygon() {
        let line = Geometry::LineString(LineString::from(vec![(-1.0, 0.5), (2.0, 0.5)]));
        let inside = overlay(&line, &unit_square(), Overlay::Intersection).expect("clips");
        assert!((length(&inside) - 1.0).abs() < 1e-9);
        let outside = overlay(&line, &unit_square(), Overlay::Difference).expect("clips");
        assert!((length(&outside) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn points_filter_by_membership() {
        let points = Geometry::MultiPoint(MultiPoint::from(vec![(0.5, 0.5), (3.0, 3.0)]));
        let kept = overlay(&points, &unit_square(), Overlay::Intersection).expect("filters");
        assert_eq!(kept, Geometry::Point(Point::new(0.5, 0.5)));
    }

    #[test]
    fn line_line_intersection_is_unsupported() {
        let a = Geometry::LineString(LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]));
        let b = Geometry::LineString(LineString::from(vec![(0.0, 1.0), (1.0, 0.0)]));
        let err = overlay(&a, &b, Overlay::Intersection).expect_err("unsupported");
        assert!(matches!(err, GisError::UnsupportedGeometry { .. }));
    }

    #[test]
    fn envelope_of_point_is_point() {
        let point = Geometry::Point(Point::new(2.0, 3.0));
        assert_eq!(envelope(&point).expect("envelope"), point);
    }

    #[test]
    fn rotate_quarter_turn_about_point() {
        let point = Geometry::Point(Point::new(1.0, 0.0));
        let rotated = rotate(&point, 90.0, Origin::Point(0.0, 0.0), false).expect("rotates");
        let [x, y] = coordinates(&rotated)[0];
        assert!(x.abs() < 1e-9 && (y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn origin_parsing() {
        assert_eq!(Origin::parse("center").expect("parses"), Origin::Center);
        assert_eq!(Origin::parse("Centroid").expect("parses"), Origin::Centroid);
        assert_eq!(Origin::parse("1.5, -2").expect("parses"), Origin::Point(1.5, -2.0));
        assert!(Origin::parse("left").is_err());
    }

    #[test]
    fn scale_about_center_keeps_center() {
        let scaled = scale(&unit_square(), 2.0, 2.0, Origin::Center).expect("scales");
        assert_eq!(bounds(&scaled).expect("bounds"), [-0.5, -0.5, 1.5, 1.5]);
    }

    #[test]
    fn polygon_length_is_perimeter() {
        assert!((length(&unit_square()) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn bowtie_is_invalid_and_repairable() {
        let bowtie = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 2.0),
            (x: 2.0, y: 0.0),
            (x: 0.0, y: 2.0),
            (x: 0.0, y: 0.0),
        ]);
        let (valid, reason) = validity(&bowtie);
        assert!(!valid);
        assert!(!reason.is_empty());
        let repaired = make_valid(&bowtie);
        assert!((area(&repaired) - 2.0).abs() < 1e-9, "area {}", area(&repaired));
        let [minx, miny, maxx, maxy] = bounds(&repaired).expect("bounds");
        assert_eq!([minx, miny, maxx, maxy], [0.0, 0.0, 2.0, 2.0]);
    }

    #[test]
    fn make_valid_keeps_holes_of_a_self_crossing_shell() {
        let shell = LineString::from(vec![
            (0.0, 0.0),
            (4.0, 4.0),
            (4.0, 0.0),
            (0.0, 4.0),
            (0.0, 0.0),
        ]);
        let hole = LineString::from(vec![
            (3.0, 1.5),
            (3.5, 1.5),
            (3.5, 2.5),
            (3.0, 2.5),
            (3.0, 1.5),
        ]);
        let repaired = make_valid(&Geometry::Polygon(Polygon::new(shell, vec![hole])));
        assert!((area(&repaired) - 7.5).abs() < 1e-9, "area {}", area(&repaired));
    }

    #[test]
    fn simple_loops_split_a_figure_eight() {
        let ring = LineString::from(vec![
            (0.0, 0.0),
            (2.0, 2.0),
            (2.0, 0.0),
            (0.0, 2.0),
            (0.0, 0.0),
        ]);
        let loops = simple_loops(&ring);
        assert_eq!(loops.len(), 2);
        for lobe in &loops {
            assert!((signed_ring_area(&lobe.0).abs() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn mitre_limit_becomes_a_corner_angle() {
        assert!((mitre_angle(2.0) - std::f64::consts::FRAC_PI_3).abs() < 1e-12);
        assert_eq!(mitre_angle(0.5), std::f64::consts::PI);
        assert!(mitre_angle(5.0) < FRAC_PI_2);
    }

    #[test]
    fn tight_mitre_limit_bevels_square_corners() {
        let params = BufferParams {
            join_style: JoinStyle::Mitre,
            mitre_limit: 1.0,
            ..round_buffer(1.0)
        };
        let buffered = buffer(&unit_square(), &params).expect("buffers");
        assert!(area(&buffered) < 8.9, "area {}", area(&buffered));
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        assert!(simplify(&unit_square(), -1.0, true).is_err());
        assert!(snap(&unit_square(), &unit_square(), -1.0).is_err());
    }

    #[test]
    fn simplify_drops_collinear_vertex() {
        let line = Geometry::LineString(LineString::from(vec![
            (0.0, 0.0),
            (1.0, 0.01),
            (2.0, 0.0),
        ]));
        let simplified = simplify(&line, 0.1, false).expect("simplifies");
        assert_eq!(coordinates(&simplified).len(), 2);
    }

    #[test]
    fn snap_moves_vertices_within_tolerance() {
        let line = Geometry::LineString(LineString::from(vec![(0.0, 0.0), (0.95, 0.0)]));
        let snapped = snap(&line, &unit_square(), 0.1).expect("snaps");
        assert_eq!(coordinates(&snapped), vec![[0.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn nearest_point_on_square_from_outside() {
        let outside = Geometry::Point(Point::new(3.0, 0.5));
        let nearest = nearest_point(&outside, &unit_square()).expect("nearest");
        assert!((nearest.x() - 1.0).abs() < 1e-9 && (nearest.y() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn nearest_point_measures_from_the_whole_source() {
        let line = Geometry::LineString(LineString::from(vec![
            (0.5, 3.0),
            (50.0, 3.0),
            (50.0, 100.0),
        ]));
        let nearest = nearest_point(&line, &unit_square()).expect("nearest");
        assert!((nearest.x() - 0.5).abs() < 1e-9 && (nearest.y() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn nearest_point_of_crossing_lines_is_the_crossing() {
        let a = Geometry::LineString(LineString::from(vec![(0.0, 0.0), (2.0, 2.0)]));
        let b = Geometry::LineString(LineString::from(vec![(0.0, 2.0), (2.0, 0.0)]));
        let nearest = nearest_point(&a, &b).expect("nearest");
        assert!((nearest.x() - 1.0).abs() < 1e-9 && (nearest.y() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn normalize_orients_exterior_clockwise_from_lowest_vertex() {
        let ccw = unit_square();
        let normalized = normalize(&ccw);
        let coords = coordinates(&normalized);
        assert_eq!(coords.first(), Some(&[0.0, 0.0]));
        assert_eq!(coords[1], [0.0, 1.0]);
    }

    #[test]
    fn unary_union_merges_touching_squares() {
        let a = unit_square();
        let b = translate(&a, 1.0, 0.0);
        let merged = unary_union_all(&[a, b]).expect("merges");
        assert!(matches!(merged, Geometry::Polygon(_)));
        assert!((area(&merged) - 2.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn translate_preserves_area(dx in -1e3f64..1e3, dy in -1e3f64..1e3) {
            let moved = translate(&unit_square(), dx, dy);
            prop_assert!((area(&moved) - 1.0).abs() < 1e-6);
        }

        #[test]
        fn convex_hull_contains_input_area(scale_x in 0.1f64..10.0, scale_y in 0.1f64..10.0) {
            let scaled = scale(&unit_square(), scale_x, scale_y, Origin::Center).expect("scales");
            let hull = convex_hull(&scaled);
            prop_assert!(area(&hull) + 1e-9 >= area(&scaled));
        }
    }
}
