//! Grayscale rasters and adaptive binarisation ahead of text recognition.

use super::sensor::SensorError;

/// Neighbourhood width of the adaptive threshold.
pub const THRESHOLD_BLOCK: usize = 31;
/// Constant subtracted from the local mean.
pub const THRESHOLD_C: f64 = 2.0;

/// 8-bit grayscale image, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Raster {
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Result<Self, SensorError> {
        if pixels.len() != width * height {
            return Err(SensorError::BadImage(format!(
                "expected {} pixels for {width}x{height}, got {}",
                width * height,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build from BGRA bytes as returned by desktop capture APIs, using BT.601 luma.
    pub fn from_bgra(width: usize, height: usize, bgra: &[u8]) -> Result<Self, SensorError> {
        if bgra.len() != width * height * 4 {
            return Err(SensorError::BadImage(format!(
                "expected {} BGRA bytes for {width}x{height}, got {}",
                width * height * 4,
                bgra.len()
            )));
        }
        let pixels = bgra
            .chunks_exact(4)
            .map(|px| {
                let (b, g, r) = (f64::from(px[0]), f64::from(px[1]), f64::from(px[2]));
                (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8
            })
            .collect();
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    /// Adaptive mean threshold: a pixel becomes 255 when it is brighter than the
    /// mean of its `block`-wide neighbourhood minus `c`, else 0. The window is
    /// clipped at the image edges.
    pub fn binarize(&self, block: usize, c: f64) -> Raster {
        let (w, h) = (self.width, self.height);
        if w == 0 || h == 0 {
            return self.clone();
        }
        let half = block.max(1) / 2;

        // Integral image with a zero border row/column.
        let stride = w + 1;
        let mut integral = vec![0u64; stride * (h + 1)];
        for y in 0..h {
            let mut row_sum = 0u64;
            for x in 0..w {
                row_sum += u64::from(self.pixels[y * w + x]);
                integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
            }
        }

        let mut out = Vec::with_capacity(w * h);
        for y in 0..h {
            let y0 = y.saturating_sub(half);
            let y1 = (y + half + 1).min(h);
            for x in 0..w {
                let x0 = x.saturating_sub(half);
                let x1 = (x + half + 1).min(w);
                let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                    - integral[y0 * stride + x1]
                    - integral[y1 * stride + x0];
                let count = ((y1 - y0) * (x1 - x0)) as f64;
                let mean = sum as f64 / count;
                let value = f64::from(self.pixels[y * w + x]);
                out.push(if value > mean - c { 255 } else { 0 });
            }
        }

        Raster {
            width: w,
            height: h,
            pixels: out,
        }
    }

    /// Binarise with the standard block size and constant.
    pub fn binarize_default(&self) -> Raster {
        self.binarize(THRESHOLD_BLOCK, THRESHOLD_C)
    }
}
