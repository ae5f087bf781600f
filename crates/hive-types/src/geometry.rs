//! 2D geometry primitives persisted as comma-joined numeric fields.
//!
//! Every type here has a canonical text form (`x,y` or `x,y,w,h`) produced by
//! `Display` and read back by `parse`. Parsing is tolerant by contract: a
//! malformed string yields `None` instead of an error, because these values
//! are routinely hand-edited in persisted settings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Split `text` on commas and parse exactly `N` fields.
fn parse_fields<T: FromStr, const N: usize>(text: &str) -> Option<[T; N]> {
    let parts: Vec<&str> = text.split(',').collect();
    if parts.len() != N {
        return None;
    }
    let parsed: Vec<T> = parts
        .iter()
        .map(|p| p.trim().parse::<T>().ok())
        .collect::<Option<Vec<T>>>()?;
    parsed.try_into().ok()
}

/// An integer point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Parse `x,y`. Returns `None` when the text is malformed.
    pub fn parse(text: &str) -> Option<Self> {
        let [x, y] = parse_fields::<i32, 2>(text)?;
        Some(Self { x, y })
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// An integer extent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Parse `w,h`. Returns `None` when the text is malformed.
    pub fn parse(text: &str) -> Option<Self> {
        let [width, height] = parse_fields::<i32, 2>(text)?;
        Some(Self { width, height })
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.width, self.height)
    }
}

/// A single-precision floating point extent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SizeF {
    pub width: f32,
    pub height: f32,
}

impl SizeF {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Parse `w,h`. Returns `None` when the text is malformed.
    pub fn parse(text: &str) -> Option<Self> {
        let [width, height] = parse_fields::<f32, 2>(text)?;
        Some(Self { width, height })
    }
}

impl fmt::Display for SizeF {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.width, self.height)
    }
}

/// An integer rectangle: origin plus extent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rectangle {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn location(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Parse `x,y,w,h`. Returns `None` when the text is malformed.
    pub fn parse(text: &str) -> Option<Self> {
        let [x, y, width, height] = parse_fields::<i32, 4>(text)?;
        Some(Self {
            x,
            y,
            width,
            height,
        })
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}
