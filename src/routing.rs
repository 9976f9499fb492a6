use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};
use tracing::debug;

use crate::config::EditorConfig;
use crate::diagram::{Diagram, ElementKind, ElementRef};
use crate::error::Result;
use crate::geometry::{Bounds, Point};
use crate::ports::Alignment;
use crate::snap::SnapTarget;
use crate::utils::{centroid, format_point};
use crate::{ARROW_SIDE_ANGLE, CURVE_POINT_OFFSET, DIAMOND_SIDE_ANGLE, TIP_HEIGHT, TIP_WIDTH};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteStyle {
    #[default]
    Direct,
    Spline,
    AutoRouting,
    OrthogonalSquare,
    OrthogonalRounded,
    TreeVertical,
    TreeHorizontal,
}

impl RouteStyle {
    /// Styles that are declared but have no geometry of their own yet.
    pub fn is_placeholder(self) -> bool {
        !matches!(self, RouteStyle::Direct | RouteStyle::Spline)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TipStyle {
    #[default]
    None,
    Arrow,
    Triangle,
    FilledTriangle,
    Diamond,
    FilledDiamond,
}

impl TipStyle {
    /// Distance from the marker tip back to where the line should end.
    pub fn length(self, size: Point) -> f32 {
        match self {
            TipStyle::None => 0.0,
            TipStyle::Arrow | TipStyle::Triangle | TipStyle::FilledTriangle => {
                size.x * (PI - ARROW_SIDE_ANGLE).cos()
            }
            TipStyle::Diamond | TipStyle::FilledDiamond => size.x.hypot(size.y),
        }
    }

    pub fn is_filled(self) -> bool {
        matches!(self, TipStyle::FilledTriangle | TipStyle::FilledDiamond)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Endpoint {
    pub bounds: Bounds,
    pub alignment: Option<Alignment>,
}

impl Endpoint {
    pub fn new(bounds: Bounds, alignment: Option<Alignment>) -> Self {
        Self { bounds, alignment }
    }

    pub fn point(point: Point) -> Self {
        Self {
            bounds: Bounds::new(point.x, point.y, 0.0, 0.0),
            alignment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest<'a> {
    pub source: Endpoint,
    pub target: Endpoint,
    pub waypoints: &'a [Point],
    pub style: RouteStyle,
    pub source_tip: TipStyle,
    pub target_tip: TipStyle,
    pub tip_size: Point,
    pub curve_offset: f32,
}

impl<'a> RouteRequest<'a> {
    pub fn new(source: Endpoint, target: Endpoint) -> Self {
        Self {
            source,
            target,
            waypoints: &[],
            style: RouteStyle::Direct,
            source_tip: TipStyle::None,
            target_tip: TipStyle::None,
            tip_size: Point::new(TIP_WIDTH, TIP_HEIGHT),
            curve_offset: CURVE_POINT_OFFSET,
        }
    }
}

/// Drawable connector geometry. Angles are in degrees and point in the direction of
/// travel into each tip.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub path_segments: Vec<String>,
    pub source_angle: f32,
    pub source_point: Point,
    pub target_angle: f32,
    pub target_point: Point,
    /// Trimmed knots the path was drawn through.
    pub points: Vec<Point>,
}

impl Route {
    pub fn source_marker(&self, tip: TipStyle, size: Point) -> Option<TipShape> {
        tip_shape(tip, self.source_point, size, self.source_angle.to_radians())
    }

    pub fn target_marker(&self, tip: TipStyle, size: Point) -> Option<TipShape> {
        tip_shape(tip, self.target_point, size, self.target_angle.to_radians())
    }

    /// Where a link label sits: the interior knot closest to the centroid, or the
    /// midpoint of a two-point route.
    pub fn label_anchor(&self) -> Point {
        let fallback = centroid(&self.points);
        if self.points.len() <= 2 {
            return fallback;
        }

        let handles = &self.points[1..self.points.len() - 1];
        let mut best = handles[0];
        let mut best_distance = f32::INFINITY;
        for point in handles.iter().copied() {
            let distance = point.distance(fallback);
            if distance < best_distance {
                best_distance = distance;
                best = point;
            }
        }
        best
    }
}

pub fn route(request: &RouteRequest<'_>) -> Route {
    let start = request.source.bounds.center();
    let end = request.target.bounds.center();

    let mut points = if request.waypoints.is_empty() {
        straight_points(&request.source, &request.target, request.curve_offset)
    } else {
        let mut points = Vec::with_capacity(request.waypoints.len() + 2);
        points.push(start);
        points.extend_from_slice(request.waypoints);
        points.push(end);
        points
    };

    let style = if request.style.is_placeholder() {
        debug!(style = ?request.style, "route style has no geometry, drawing it as direct");
        RouteStyle::Direct
    } else {
        request.style
    };

    let last = points.len() - 1;
    let source_angle = segment_angle(points[1], points[0]);
    let target_angle = segment_angle(points[last - 1], points[last]);

    trim_endpoint(&mut points, 0, 1, request.source_tip.length(request.tip_size));
    trim_endpoint(
        &mut points,
        last,
        last - 1,
        request.target_tip.length(request.tip_size),
    );

    let path_segments = match style {
        RouteStyle::Spline => spline_path(&points),
        _ => polyline_path(&points),
    };

    Route {
        path_segments,
        source_angle: source_angle.to_degrees(),
        source_point: start,
        target_angle: target_angle.to_degrees(),
        target_point: end,
        points,
    }
}

/// Points of a route without waypoints: one elbow when an alignment is missing,
/// otherwise one curve point in front of each endpoint.
fn straight_points(source: &Endpoint, target: &Endpoint, curve_offset: f32) -> Vec<Point> {
    let start = source.bounds.center();
    let end = target.bounds.center();

    match (source.alignment, target.alignment) {
        (Some(source_alignment), Some(target_alignment)) => {
            let offset = curve_offset.min(start.distance(end));
            vec![
                start,
                curve_point(start, end, source_alignment, offset),
                curve_point(end, start, target_alignment, offset),
                end,
            ]
        }
        _ => {
            let dx = end.x - start.x;
            let dy = end.y - start.y;
            let elbow = if dx.abs() >= dy.abs() {
                Point::new(start.x + dx / 2.0, start.y)
            } else {
                Point::new(start.x, start.y + dy / 2.0)
            };
            vec![start, elbow, end]
        }
    }
}

fn curve_point(from: Point, toward: Point, alignment: Alignment, offset: f32) -> Point {
    let outward = alignment.outward();
    if alignment.is_vertical() {
        let delta = toward.y - from.y;
        let sign = if delta.abs() > f32::EPSILON {
            delta.signum()
        } else {
            outward.y
        };
        Point::new(from.x, from.y + sign * offset)
    } else {
        let delta = toward.x - from.x;
        let sign = if delta.abs() > f32::EPSILON {
            delta.signum()
        } else {
            outward.x
        };
        Point::new(from.x + sign * offset, from.y)
    }
}

fn segment_angle(from: Point, to: Point) -> f32 {
    (to.y - from.y).atan2(to.x - from.x)
}

/// Pulls `points[index]` towards `points[neighbor]` by `length`, never past the neighbor.
fn trim_endpoint(points: &mut [Point], index: usize, neighbor: usize, length: f32) {
    if length <= 0.0 {
        return;
    }
    let tip = points[index];
    let toward = points[neighbor];
    let distance = tip.distance(toward);
    if distance <= f32::EPSILON {
        return;
    }
    let angle = segment_angle(tip, toward);
    let length = length.min(distance);
    points[index] = Point::new(tip.x + angle.cos() * length, tip.y + angle.sin() * length);
}

fn polyline_path(points: &[Point]) -> Vec<String> {
    points
        .windows(2)
        .map(|segment| {
            format!(
                "M {} L {}",
                format_point(segment[0]),
                format_point(segment[1])
            )
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BezierSegment {
    pub start: Point,
    pub control1: Point,
    pub control2: Point,
    pub end: Point,
}

impl BezierSegment {
    pub fn to_path(&self) -> String {
        format!(
            "M {} C {}, {}, {}",
            format_point(self.start),
            format_point(self.control1),
            format_point(self.control2),
            format_point(self.end)
        )
    }
}

/// Control points of the natural cubic Bézier spline through `knots`.
///
/// Returns `(first, second)` control points, one pair per segment. The first control
/// points come from a tridiagonal system solved per axis; the second ones follow from
/// first-derivative continuity, and the last one from a zero second derivative at the
/// final knot.
pub fn spline_control_points(knots: &[Point]) -> (Vec<Point>, Vec<Point>) {
    if knots.len() < 2 {
        return (Vec::new(), Vec::new());
    }

    let n = knots.len() - 1;
    if n == 1 {
        let first = Point::new(
            (2.0 * knots[0].x + knots[1].x) / 3.0,
            (2.0 * knots[0].y + knots[1].y) / 3.0,
        );
        let second = Point::new(2.0 * first.x - knots[0].x, 2.0 * first.y - knots[0].y);
        return (vec![first], vec![second]);
    }

    let xs = first_control_points(&spline_rhs(knots, |p| p.x));
    let ys = first_control_points(&spline_rhs(knots, |p| p.y));

    let first: Vec<Point> = xs
        .iter()
        .zip(&ys)
        .map(|(&x, &y)| Point::new(x, y))
        .collect();

    let mut second = Vec::with_capacity(n);
    for i in 0..n {
        if i < n - 1 {
            second.push(Point::new(
                2.0 * knots[i + 1].x - first[i + 1].x,
                2.0 * knots[i + 1].y - first[i + 1].y,
            ));
        } else {
            second.push(Point::new(
                (knots[n].x + first[n - 1].x) / 2.0,
                (knots[n].y + first[n - 1].y) / 2.0,
            ));
        }
    }

    (first, second)
}

fn spline_rhs(knots: &[Point], axis: impl Fn(&Point) -> f32) -> Vec<f32> {
    let n = knots.len() - 1;
    let mut rhs = vec![0.0_f32; n];
    for i in 1..n - 1 {
        rhs[i] = 4.0 * axis(&knots[i]) + 2.0 * axis(&knots[i + 1]);
    }
    rhs[0] = axis(&knots[0]) + 2.0 * axis(&knots[1]);
    rhs[n - 1] = (8.0 * axis(&knots[n - 1]) + axis(&knots[n])) / 2.0;
    rhs
}

fn first_control_points(rhs: &[f32]) -> Vec<f32> {
    let n = rhs.len();
    let mut solution = vec![0.0_f32; n];
    let mut scratch = vec![0.0_f32; n];

    let mut b = 2.0_f32;
    solution[0] = rhs[0] / b;
    for i in 1..n {
        scratch[i] = 1.0 / b;
        b = (if i < n - 1 { 4.0 } else { 3.5 }) - scratch[i];
        solution[i] = (rhs[i] - solution[i - 1]) / b;
    }
    for i in 1..n {
        solution[n - i - 1] -= scratch[n - i] * solution[n - i];
    }

    solution
}

pub fn spline_segments(knots: &[Point]) -> Vec<BezierSegment> {
    let (first, second) = spline_control_points(knots);
    first
        .into_iter()
        .zip(second)
        .enumerate()
        .map(|(i, (control1, control2))| BezierSegment {
            start: knots[i],
            control1,
            control2,
            end: knots[i + 1],
        })
        .collect()
}

pub fn spline_path(knots: &[Point]) -> Vec<String> {
    spline_segments(knots)
        .iter()
        .map(BezierSegment::to_path)
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct TipShape {
    pub tip: Point,
    /// Outline in drawing order. Open shapes are stroked, closed ones filled or outlined.
    pub points: Vec<Point>,
    pub closed: bool,
    pub filled: bool,
}

impl TipShape {
    pub fn path(&self) -> String {
        let mut path = String::new();
        for (idx, point) in self.points.iter().enumerate() {
            if idx > 0 {
                path.push(' ');
            }
            path.push_str(if idx == 0 { "M " } else { "L " });
            path.push_str(&format_point(*point));
        }
        if self.closed {
            path.push_str(" Z");
        }
        path
    }
}

/// Marker outline for a tip at `point` reached while travelling along `angle` (radians).
pub fn tip_shape(tip: TipStyle, point: Point, size: Point, angle: f32) -> Option<TipShape> {
    let angle = angle.rem_euclid(TAU);
    let side = |offset: f32| {
        Point::new(
            point.x + size.x * (angle + offset).cos(),
            point.y + size.y * (angle + offset).sin(),
        )
    };

    let (points, closed) = match tip {
        TipStyle::None => return None,
        TipStyle::Arrow => (
            vec![side(ARROW_SIDE_ANGLE), point, side(-ARROW_SIDE_ANGLE)],
            false,
        ),
        TipStyle::Triangle | TipStyle::FilledTriangle => (
            vec![point, side(ARROW_SIDE_ANGLE), side(-ARROW_SIDE_ANGLE)],
            true,
        ),
        TipStyle::Diamond | TipStyle::FilledDiamond => {
            let back_distance = size.x.hypot(size.y);
            let back = Point::new(
                point.x + back_distance * (angle + PI).cos(),
                point.y + back_distance * (angle + PI).sin(),
            );
            (
                vec![
                    point,
                    side(DIAMOND_SIDE_ANGLE),
                    back,
                    side(-DIAMOND_SIDE_ANGLE),
                ],
                true,
            )
        }
    };

    Some(TipShape {
        tip: point,
        points,
        closed,
        filled: tip.is_filled(),
    })
}

fn endpoint_for_port(diagram: &Diagram, port_id: &str) -> Result<Endpoint> {
    let port = diagram.port(port_id)?;
    Ok(Endpoint::new(
        diagram.port_bounds_of(port_id)?,
        Some(port.alignment),
    ))
}

fn endpoint_for_element(diagram: &Diagram, element: &ElementRef) -> Result<Endpoint> {
    let alignment = match element.kind {
        ElementKind::Port => Some(diagram.port(&element.id)?.alignment),
        _ => None,
    };
    Ok(Endpoint::new(diagram.element_bounds(element)?, alignment))
}

/// Routes a stored link between its two ports.
pub fn route_link(diagram: &Diagram, link_id: &str, config: &EditorConfig) -> Result<Route> {
    let link = diagram.link(link_id)?;
    let request = RouteRequest {
        source: endpoint_for_port(diagram, &link.port1)?,
        target: endpoint_for_port(diagram, &link.port2)?,
        waypoints: &link.points,
        style: link.style.route,
        source_tip: link.style.source_tip,
        target_tip: link.style.target_tip,
        tip_size: config.tip_size,
        curve_offset: config.curve_point_offset,
    };
    Ok(route(&request))
}

/// Routes a link that is still being drawn from `source` to the pointer.
pub fn route_preview(
    diagram: &Diagram,
    source: &ElementRef,
    free_end: Point,
    target: Option<&SnapTarget>,
    config: &EditorConfig,
) -> Result<Route> {
    let source = endpoint_for_element(diagram, source)?;
    let target = match target {
        Some(target) => endpoint_for_element(diagram, &target.element)?,
        None => Endpoint::point(free_end),
    };
    let mut request = RouteRequest::new(source, target);
    request.target_tip = TipStyle::Arrow;
    request.tip_size = config.tip_size;
    request.curve_offset = config.curve_point_offset;
    Ok(route(&request))
}

pub fn route_all(diagram: &Diagram, config: &EditorConfig) -> Result<IndexMap<String, Route>> {
    let mut routes = IndexMap::with_capacity(diagram.links.len());
    for id in diagram.links.keys() {
        routes.insert(id.clone(), route_link(diagram, id, config)?);
    }
    Ok(routes)
}
