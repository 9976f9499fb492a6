use serde::Serialize;

use crate::diagram::{Diagram, ElementRef};
use crate::error::Result;
use crate::geometry::{Bounds, Point};

/// Element found under the pointer, with the rectangle it was hit-tested against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapTarget {
    pub element: ElementRef,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapped {
    pub point: Point,
    pub target: Option<SnapTarget>,
}

/// Rounds each axis to the nearest multiple of `grid_size`.
pub fn snap_to_grid(point: Point, grid_size: f32) -> Point {
    if grid_size <= 0.0 || !grid_size.is_finite() {
        return point;
    }
    Point {
        x: (point.x / grid_size).round() * grid_size,
        y: (point.y / grid_size).round() * grid_size,
    }
}

/// Moves the point onto the left edge of `bounds`, keeping its y.
pub fn snap_to_bounds(point: Point, bounds: Bounds) -> Point {
    Point {
        x: bounds.x,
        y: point.y,
    }
}

/// First port, then first node, whose rectangle contains `point` within `tolerance`.
pub fn snap_to_elements(
    point: Point,
    diagram: &Diagram,
    tolerance: f32,
) -> Result<Option<SnapTarget>> {
    snap_to_elements_where(point, diagram, tolerance, |_| true)
}

/// Like [`snap_to_elements`], skipping candidates rejected by `accept`.
pub fn snap_to_elements_where(
    point: Point,
    diagram: &Diagram,
    tolerance: f32,
    accept: impl Fn(&ElementRef) -> bool,
) -> Result<Option<SnapTarget>> {
    for id in diagram.ports.keys() {
        let element = ElementRef::port(id.clone());
        if !accept(&element) {
            continue;
        }
        let bounds = diagram.port_bounds_of(id)?;
        if bounds.within_bounds(point, tolerance) {
            return Ok(Some(SnapTarget { element, bounds }));
        }
    }

    for (id, node) in &diagram.nodes {
        let element = ElementRef::node(id.clone());
        if !accept(&element) {
            continue;
        }
        if node.bounds.within_bounds(point, tolerance) {
            return Ok(Some(SnapTarget {
                element,
                bounds: node.bounds,
            }));
        }
    }

    Ok(None)
}

/// Final position of a free endpoint: the target's center when something was hit,
/// otherwise the nearest grid point.
pub fn resolve_snap(point: Point, target: Option<SnapTarget>, grid_size: f32) -> Snapped {
    match target {
        Some(target) => Snapped {
            point: target.bounds.center(),
            target: Some(target),
        },
        None => Snapped {
            point: snap_to_grid(point, grid_size),
            target: None,
        },
    }
}
