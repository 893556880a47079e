//! Heuristic discovery of the ladder's price column on screen.
//!
//! Scans a strip on the right edge of the primary display for a "PRICE" header
//! (tolerating common misreads) and places the capture region just below it.
//! Without a header, the median x of digit-bearing words anchors the region.

use super::sensor::{Display, RecognitionMode, ScreenCapture, TextRecognizer, TextToken};
use crate::domain::Region;
use tracing::{debug, info};

/// Header spellings accepted after trimming and upper-casing.
pub const PRICE_HEADERS: [&str; 5] = ["PRICE", "PR1CE", "PRLCE", "PRLC", "RICE"];

const SCAN_TOP_INSET: i32 = 50;
const SCAN_HEIGHT_TRIM: i64 = 100;
const HEADER_LEFT_PAD: i32 = 12;
const HEADER_GAP: i32 = 6;
const FALLBACK_LEFT_PAD: i32 = 40;
const FALLBACK_TOP_OFFSET: i32 = 60;
const FALLBACK_HEIGHT_TRIM: i64 = 120;
const REGION_WIDTH: u32 = 220;
const REGION_HEIGHT: u32 = 880;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionLocator {
    search_right_px: u32,
    mode: RecognitionMode,
}

impl RegionLocator {
    pub fn new(search_right_px: u32, mode: RecognitionMode) -> Self {
        Self {
            search_right_px,
            mode,
        }
    }

    /// Strip of the display that is scanned: the rightmost `search_right_px`
    /// pixels, inset 50 px from the top, 100 px shorter than the display.
    pub fn scan_area(&self, display: &Display) -> Option<Region> {
        let width = self.search_right_px.min(display.width);
        let height = i64::from(display.height) - SCAN_HEIGHT_TRIM;
        let height = u32::try_from(height).ok()?;
        let left = display.left + display.width as i32 - width as i32;
        Region::new(left, display.top + SCAN_TOP_INSET, width, height).ok()
    }

    /// Capture the scan strip and search it. `None` leaves the current region in place.
    pub fn locate(&self, capture: &dyn ScreenCapture, recognizer: &dyn TextRecognizer) -> Option<Region> {
        let display = match capture.primary_display() {
            Ok(d) => d,
            Err(e) => {
                debug!(error = %e, "locate: no display");
                return None;
            }
        };
        let scan = self.scan_area(&display)?;
        let image = match capture.capture(&scan) {
            Ok(img) => img,
            Err(e) => {
                debug!(error = %e, "locate: capture failed");
                return None;
            }
        };
        let tokens = match recognizer.recognize(&image.binarize_default(), self.mode) {
            Ok(t) => t,
            Err(e) => {
                debug!(error = %e, "locate: recognition failed");
                return None;
            }
        };
        let found = locate_in_tokens(&scan, &tokens);
        if let Some(region) = &found {
            info!(
                left = region.left(),
                top = region.top(),
                width = region.width(),
                height = region.height(),
                "located price column"
            );
        }
        found
    }
}

/// Pure search over recognised tokens positioned relative to `scan`.
pub fn locate_in_tokens(scan: &Region, tokens: &[TextToken]) -> Option<Region> {
    let header = tokens.iter().find(|t| {
        let word = t.text.trim().to_uppercase();
        !word.is_empty() && PRICE_HEADERS.contains(&word.as_str())
    });
    if let Some(t) = header {
        let left = (scan.left() + t.left - HEADER_LEFT_PAD).max(0);
        let top = (scan.top() + t.top + t.height + HEADER_GAP).max(0);
        return Region::new(left, top, REGION_WIDTH, REGION_HEIGHT).ok();
    }

    let mut xs: Vec<i32> = tokens
        .iter()
        .filter(|t| t.text.trim().chars().any(|c| c.is_ascii_digit()))
        .map(|t| t.left)
        .collect();
    if xs.is_empty() {
        return None;
    }
    xs.sort_unstable();
    let mid = xs.len() / 2;
    let median_x = if xs.len() % 2 == 0 {
        ((f64::from(xs[mid - 1]) + f64::from(xs[mid])) / 2.0).trunc() as i32
    } else {
        xs[mid]
    };

    let height = u32::try_from(i64::from(scan.height()) - FALLBACK_HEIGHT_TRIM).ok()?;
    let left = (scan.left() + median_x - FALLBACK_LEFT_PAD).max(0);
    Region::new(left, scan.top() + FALLBACK_TOP_OFFSET, REGION_WIDTH, height).ok()
}
