//! Page coordinates in CSS pixels.

use serde::{Deserialize, Serialize};

/// A point on the page.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Offset by a delta.
    pub fn offset(&self, dx: f64, dy: f64) -> Position {
        Position::new(self.x + dx, self.y + dy)
    }

    /// Move toward `target`, travelling at most `max_step`.
    pub fn step_toward(&self, target: Position, max_step: f64) -> Position {
        let distance = self.distance(target);
        if distance <= max_step || distance == 0.0 {
            return target;
        }
        let ratio = max_step.max(0.0) / distance;
        self.offset((target.x - self.x) * ratio, (target.y - self.y) * ratio)
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width.max(0.0)
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height.max(0.0)
    }

    pub fn center(&self) -> Position {
        Position::new(
            self.x + self.width.max(0.0) / 2.0,
            self.y + self.height.max(0.0) / 2.0,
        )
    }

    pub fn contains(&self, point: Position) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Nearest point inside the rectangle. A non-finite rectangle leaves
    /// the point as is.
    pub fn clamp(&self, point: Position) -> Position {
        if !self.is_finite() {
            return point;
        }
        Position::new(
            point.x.clamp(self.x, self.right()),
            point.y.clamp(self.y, self.bottom()),
        )
    }
}
