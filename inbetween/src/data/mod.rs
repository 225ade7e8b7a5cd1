use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::{InterpError, InterpResult};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dim {
    pub width: u32,
    pub height: u32,
}

impl Dim {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(img: &RgbImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
        }
    }

    // Number of pixels
    pub const fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    // Both sides even; required by yuv420p encoders
    pub const fn is_even(&self) -> bool {
        self.width % 2 == 0 && self.height % 2 == 0
    }

    pub fn ensure_same(&self, other: &Dim) -> InterpResult<()> {
        if self == other {
            Ok(())
        } else {
            Err(InterpError::DimensionMismatch {
                width_a: self.width,
                height_a: self.height,
                width_b: other.width,
                height_b: other.height,
            })
        }
    }
}

impl std::fmt::Display for Dim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// A frame tagged with its position in [0, 1] along the generated sequence
#[derive(Debug, Clone)]
pub struct TimedFrame {
    pub timestamp: f64,
    pub frame: RgbImage,
}

impl TimedFrame {
    pub fn new(timestamp: f64, frame: RgbImage) -> Self {
        Self { timestamp, frame }
    }
}

// Rectangular override for a region-motion mask
//   bbox: [x1, y1, x2, y2] (half-open, negative counts from the far edge)
//   motion: [dx, dy]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub bbox: [i64; 4],
    pub motion: [f32; 2],
}

impl Region {
    pub fn new(bbox: [i64; 4], motion: [f32; 2]) -> Self {
        Self { bbox, motion }
    }
}
