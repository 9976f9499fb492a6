use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::geometry::{Bounds, Point};
use crate::{PORT_CENTERED_RATIO, PORT_DEPTH_RATIO, PORT_LATITUDE, PORT_LONGITUDE};

/// Node edge a port sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Alignment {
    Top,
    Bottom,
    Left,
    Right,
}

impl Alignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Alignment::Top => "top",
            Alignment::Bottom => "bottom",
            Alignment::Left => "left",
            Alignment::Right => "right",
        }
    }

    pub fn complementary(self) -> Alignment {
        match self {
            Alignment::Top => Alignment::Bottom,
            Alignment::Bottom => Alignment::Top,
            Alignment::Left => Alignment::Right,
            Alignment::Right => Alignment::Left,
        }
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Alignment::Top | Alignment::Bottom)
    }

    /// Unit vector pointing away from the node through this edge.
    pub fn outward(self) -> Point {
        match self {
            Alignment::Top => Point::new(0.0, -1.0),
            Alignment::Bottom => Point::new(0.0, 1.0),
            Alignment::Left => Point::new(-1.0, 0.0),
            Alignment::Right => Point::new(1.0, 0.0),
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Alignment {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "top" => Ok(Alignment::Top),
            "bottom" => Ok(Alignment::Bottom),
            "left" => Ok(Alignment::Left),
            "right" => Ok(Alignment::Right),
            _ => Err(Error::UnknownAlignment(value.to_string())),
        }
    }
}

impl TryFrom<String> for Alignment {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Alignment> for String {
    fn from(alignment: Alignment) -> Self {
        alignment.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortPlacement {
    /// Position along the edge, 0..=100.
    pub edge_pos_ratio: f32,
    /// How far the port sinks into the node: 0 fully outside, 100 fully inside.
    pub depth_ratio: f32,
    /// Size along the edge.
    pub latitude: f32,
    /// Size perpendicular to the edge.
    pub longitude: f32,
}

impl Default for PortPlacement {
    fn default() -> Self {
        Self::centered()
    }
}

impl PortPlacement {
    pub fn centered() -> Self {
        Self::centered_with(PORT_LATITUDE, PORT_LONGITUDE)
    }

    pub fn centered_with(latitude: f32, longitude: f32) -> Self {
        Self {
            edge_pos_ratio: PORT_CENTERED_RATIO,
            depth_ratio: PORT_DEPTH_RATIO,
            latitude,
            longitude,
        }
    }
}

/// Absolute rectangle of a port on a node.
pub fn port_bounds(node: Bounds, alignment: Alignment, placement: &PortPlacement) -> Bounds {
    let PortPlacement {
        edge_pos_ratio,
        depth_ratio,
        latitude,
        longitude,
    } = *placement;

    match alignment {
        Alignment::Top | Alignment::Bottom => {
            let x = node.x + node.width * edge_pos_ratio / 100.0 - latitude / 2.0;
            let y = if alignment == Alignment::Top {
                node.y - longitude * (100.0 - depth_ratio) / 100.0
            } else {
                node.y + node.height - longitude * depth_ratio / 100.0
            };
            Bounds::new(x, y, latitude, longitude)
        }
        Alignment::Left | Alignment::Right => {
            let y = node.y + node.height * edge_pos_ratio / 100.0 - latitude / 2.0;
            let x = if alignment == Alignment::Left {
                node.x - longitude * (100.0 - depth_ratio) / 100.0
            } else {
                node.x + node.width - longitude * depth_ratio / 100.0
            };
            Bounds::new(x, y, longitude, latitude)
        }
    }
}

/// Alignment of the edge of `from` that faces `to`.
pub fn alignment_towards(from: Bounds, to: Bounds) -> Alignment {
    let delta = to.center().minus(from.center());
    if delta.x.abs() >= delta.y.abs() {
        if delta.x >= 0.0 {
            Alignment::Right
        } else {
            Alignment::Left
        }
    } else if delta.y >= 0.0 {
        Alignment::Bottom
    } else {
        Alignment::Top
    }
}

/// Nearest edge to `point` and the position ratio along it, clamped to the edge.
pub fn relocate_on_edge(node: Bounds, point: Point) -> (Alignment, f32) {
    let candidates = [
        (Alignment::Top, (point.y - node.y).abs()),
        (Alignment::Bottom, (point.y - node.bottom()).abs()),
        (Alignment::Left, (point.x - node.x).abs()),
        (Alignment::Right, (point.x - node.right()).abs()),
    ];

    let mut best = candidates[0];
    for candidate in candidates.into_iter().skip(1) {
        if candidate.1 < best.1 {
            best = candidate;
        }
    }

    let alignment = best.0;
    let ratio = if alignment.is_vertical() {
        edge_ratio(point.x - node.x, node.width)
    } else {
        edge_ratio(point.y - node.y, node.height)
    };
    (alignment, ratio)
}

fn edge_ratio(offset: f32, length: f32) -> f32 {
    if length <= f32::EPSILON {
        return PORT_CENTERED_RATIO;
    }
    (offset / length * 100.0).clamp(0.0, 100.0)
}
