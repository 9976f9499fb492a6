pub mod behavior;
pub mod config;
pub mod diagram;
pub mod error;
pub mod geometry;
pub mod history;
pub mod interaction;
pub mod ports;
pub mod routing;
pub mod session;
pub mod snap;
pub mod utils;

pub use behavior::*;
pub use config::*;
pub use diagram::*;
pub use error::{Error, Result};
pub use geometry::*;
pub use history::*;
pub use interaction::*;
pub use ports::*;
pub use routing::*;
pub use session::*;
pub use snap::*;

pub const DEFAULT_GRID_SIZE: f32 = 10.0;
pub const SNAP_TOLERANCE: f32 = 3.0;
pub const MIN_ELEMENT_SIZE: f32 = 10.0;
pub const HISTORY_MAX_LENGTH: usize = 100;
pub const CURVE_POINT_OFFSET: f32 = 125.0;
pub const TIP_WIDTH: f32 = 10.0;
pub const TIP_HEIGHT: f32 = 10.0;
pub const PORT_LATITUDE: f32 = 10.0;
pub const PORT_LONGITUDE: f32 = 10.0;
pub const PORT_CENTERED_RATIO: f32 = 50.0;
pub const PORT_DEPTH_RATIO: f32 = 50.0;
pub const MIN_VIEWPORT_SCALE: f32 = 0.1;
pub const MAX_VIEWPORT_SCALE: f32 = 5.0;
pub const NODE_WIDTH: f32 = 140.0;
pub const NODE_HEIGHT: f32 = 60.0;
pub const CLASS_NODE_WIDTH: f32 = 160.0;
pub const CLASS_NODE_HEIGHT: f32 = 100.0;
pub const LIFELINE_WIDTH: f32 = 120.0;
pub const LIFELINE_HEIGHT: f32 = 400.0;
pub const ARROW_SIDE_ANGLE: f32 = 0.85 * std::f32::consts::PI;
pub const DIAMOND_SIDE_ANGLE: f32 = 0.75 * std::f32::consts::PI;
