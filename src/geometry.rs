use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn plus(self, other: Point) -> Point {
        Point {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    pub fn minus(self, other: Point) -> Point {
        minus(self, other)
    }

    pub fn scale(self, factor: f32) -> Point {
        Point {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    pub fn distance(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Vector subtraction `a - b`.
pub fn minus(a: Point, b: Point) -> Point {
    Point {
        x: a.x - b.x,
        y: a.y - b.y,
    }
}

impl Bounds {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn position(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }

    pub fn with_position(self, position: Point) -> Bounds {
        Bounds {
            x: position.x,
            y: position.y,
            ..self
        }
    }

    /// Grows the rectangle by `dx` on the left and right and by `dy` on the top and
    /// bottom. Negative deltas shrink it.
    pub fn inflate(self, dx: f32, dy: f32) -> Bounds {
        Bounds {
            x: self.x - dx,
            y: self.y - dy,
            width: self.width + 2.0 * dx,
            height: self.height + 2.0 * dy,
        }
    }

    pub fn shift(self, dx: f32, dy: f32) -> Bounds {
        Bounds {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    /// A rectangle of `width` placed flush against the right edge.
    pub fn right_of(&self, width: f32) -> Bounds {
        Bounds {
            x: self.x + self.width,
            y: self.y,
            width,
            height: self.height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn within_bounds(&self, point: Point, tolerance: f32) -> bool {
        self.within_x_bounds(point.x, tolerance) && self.within_y_bounds(point.y, tolerance)
    }

    pub fn within_x_bounds(&self, x: f32, tolerance: f32) -> bool {
        x >= self.x - tolerance && x <= self.right() + tolerance
    }

    pub fn within_y_bounds(&self, y: f32, tolerance: f32) -> bool {
        y >= self.y - tolerance && y <= self.bottom() + tolerance
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.x <= other.right()
            && self.right() >= other.x
            && self.y <= other.bottom()
            && self.bottom() >= other.y
    }

    pub fn contains_bounds(&self, other: &Bounds) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn with_min_size(self, min: f32) -> Bounds {
        Bounds {
            width: self.width.max(min),
            height: self.height.max(min),
            ..self
        }
    }

    /// Normalized rectangle spanned by two corner points.
    pub fn from_corners(a: Point, b: Point) -> Bounds {
        Bounds {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }
}
