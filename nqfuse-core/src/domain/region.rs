//! Screen rectangles used for capture and calibration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegionError {
    #[error("region must have a positive size, got {width}x{height}")]
    EmptyRegion { width: u32, height: u32 },
}

/// Screen rectangle in desktop pixel coordinates.
///
/// Replaced wholesale on recalibration; there are no partial setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RegionSpec")]
pub struct Region {
    left: i32,
    top: i32,
    width: u32,
    height: u32,
}

impl Region {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Result<Self, RegionError> {
        if width == 0 || height == 0 {
            return Err(RegionError::EmptyRegion { width, height });
        }
        Ok(Self {
            left,
            top,
            width,
            height,
        })
    }

    pub fn left(&self) -> i32 {
        self.left
    }

    pub fn top(&self) -> i32 {
        self.top
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn right(&self) -> i32 {
        self.left.saturating_add(self.width as i32)
    }

    pub fn bottom(&self) -> i32 {
        self.top.saturating_add(self.height as i32)
    }
}

/// Unvalidated wire form of a [`Region`].
#[derive(Debug, Deserialize)]
struct RegionSpec {
    left: i32,
    top: i32,
    width: u32,
    height: u32,
}

impl TryFrom<RegionSpec> for Region {
    type Error = RegionError;

    fn try_from(spec: RegionSpec) -> Result<Self, Self::Error> {
        Region::new(spec.left, spec.top, spec.width, spec.height)
    }
}

impl Default for Region {
    /// Price column of a ladder docked on the right of a 1920x1080 display.
    fn default() -> Self {
        Self {
            left: 1440,
            top: 90,
            width: 220,
            height: 880,
        }
    }
}
