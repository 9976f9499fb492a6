use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::geometry::Point;
use crate::ports::PortPlacement;
use crate::{
    CURVE_POINT_OFFSET, DEFAULT_GRID_SIZE, HISTORY_MAX_LENGTH, MIN_ELEMENT_SIZE, PORT_LATITUDE,
    PORT_LONGITUDE, SNAP_TOLERANCE, TIP_HEIGHT, TIP_WIDTH,
};

/// Tunables for an editor session. Every field falls back to the crate default when
/// missing from a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    pub grid_size: f32,
    pub snap_tolerance: f32,
    pub min_element_size: f32,
    pub history_max_length: usize,
    pub curve_point_offset: f32,
    pub tip_size: Point,
    pub port_latitude: f32,
    pub port_longitude: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            snap_tolerance: SNAP_TOLERANCE,
            min_element_size: MIN_ELEMENT_SIZE,
            history_max_length: HISTORY_MAX_LENGTH,
            curve_point_offset: CURVE_POINT_OFFSET,
            tip_size: Point::new(TIP_WIDTH, TIP_HEIGHT),
            port_latitude: PORT_LATITUDE,
            port_longitude: PORT_LONGITUDE,
        }
    }
}

impl EditorConfig {
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Placement for ports created by the editor: centered on the edge, straddling it.
    pub fn port_placement(&self) -> PortPlacement {
        PortPlacement::centered_with(self.port_latitude, self.port_longitude)
    }
}
