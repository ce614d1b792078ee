/*! Geometry and range types carried by packed accessibility values. */

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A 2D point in screen coordinates (top-left origin).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
pub struct Point {
  pub x: f64,
  pub y: f64,
}

impl Point {
  pub const fn new(x: f64, y: f64) -> Self {
    Self { x, y }
  }
}

/// Width and height in points.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
pub struct Size {
  pub width: f64,
  pub height: f64,
}

impl Size {
  pub const fn new(width: f64, height: f64) -> Self {
    Self { width, height }
  }
}

/// Rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
pub struct Rect {
  pub origin: Point,
  pub size: Size,
}

impl Rect {
  pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
    Self {
      origin: Point::new(x, y),
      size: Size::new(width, height),
    }
  }

  /// Build a rect from a position and a size, as reported by
  /// `AXPosition` / `AXSize`.
  pub const fn from_parts(origin: Point, size: Size) -> Self {
    Self { origin, size }
  }

  /// Check if a point is contained within this rect (edges inclusive).
  pub fn contains(&self, point: Point) -> bool {
    point.x >= self.origin.x
      && point.x <= self.origin.x + self.size.width
      && point.y >= self.origin.y
      && point.y <= self.origin.y + self.size.height
  }

  /// Check if two rects match within a margin of error.
  pub fn matches(&self, other: &Rect, margin: f64) -> bool {
    (self.origin.x - other.origin.x).abs() <= margin
      && (self.origin.y - other.origin.y).abs() <= margin
      && (self.size.width - other.size.width).abs() <= margin
      && (self.size.height - other.size.height).abs() <= margin
  }
}

/// Integer range (`location`, `length`), used for text ranges and
/// parameterized attribute queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Range {
  pub location: i64,
  pub length: i64,
}

impl Range {
  pub const fn new(location: i64, length: i64) -> Self {
    Self { location, length }
  }

  /// Exclusive end of the range.
  pub const fn end(&self) -> i64 {
    self.location + self.length
  }

  /// Check if the range is empty (a caret position).
  pub const fn is_empty(&self) -> bool {
    self.length == 0
  }

  /// Check if a position falls within this range.
  pub const fn contains(&self, position: i64) -> bool {
    position >= self.location && position < self.end()
  }
}

impl From<std::ops::Range<i64>> for Range {
  fn from(range: std::ops::Range<i64>) -> Self {
    Self {
      location: range.start,
      length: range.end - range.start,
    }
  }
}
