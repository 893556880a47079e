//! Price extraction from recognised ladder text.
//!
//! Every recognised word is matched against a price pattern, snapped to the
//! instrument tick and bounded; the median of the survivors is the candidate.
//! A candidate that jumps too far from the last accepted price is replaced by
//! that price.

use super::raster::Raster;
use super::sensor::{RecognitionMode, ScreenCapture, TextRecognizer, TextToken};
use crate::domain::{Instrument, Region};
use regex::Regex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("price bounds inverted or non-finite: min {min} max {max}")]
    InvalidBounds { min: f64, max: f64 },

    #[error("max jump must be non-negative, got {0}")]
    InvalidJump(f64),

    #[error("price pattern failed to compile: {0}")]
    Pattern(#[from] regex::Error),
}

/// Plausibility limits for extracted prices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractorSettings {
    pub min_px: f64,
    pub max_px: f64,
    pub max_jump_pts: f64,
    pub mode: RecognitionMode,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            min_px: 2000.0,
            max_px: 40000.0,
            max_jump_pts: 60.0,
            mode: RecognitionMode::BLOCK,
        }
    }
}

#[derive(Debug)]
pub struct PriceExtractor {
    instrument: Instrument,
    settings: ExtractorSettings,
    digits: Regex,
    last_good: Option<f64>,
}

impl PriceExtractor {
    pub fn new(instrument: Instrument, settings: ExtractorSettings) -> Result<Self, ExtractorError> {
        let ExtractorSettings {
            min_px,
            max_px,
            max_jump_pts,
            ..
        } = settings;
        if !(min_px.is_finite() && max_px.is_finite() && min_px <= max_px) {
            return Err(ExtractorError::InvalidBounds {
                min: min_px,
                max: max_px,
            });
        }
        if max_jump_pts.is_nan() || max_jump_pts < 0.0 {
            return Err(ExtractorError::InvalidJump(max_jump_pts));
        }
        Ok(Self {
            instrument,
            settings,
            digits: Regex::new(r"\d+")?,
            last_good: None,
        })
    }

    pub fn settings(&self) -> &ExtractorSettings {
        &self.settings
    }

    /// Last price accepted by the jump gate.
    pub fn last_good(&self) -> Option<f64> {
        self.last_good
    }

    pub fn reset(&mut self) {
        self.last_good = None;
    }

    /// First price-shaped number in a word: 4-6 integer digits not adjacent to
    /// other digits, with a 1-2 digit fraction when present. A longer fraction
    /// keeps the integer part only.
    pub fn parse_token(&self, text: &str) -> Option<f64> {
        let clean = text.trim().replace(',', "");
        let bytes = clean.as_bytes();

        self.digits.find_iter(&clean).find_map(|run| {
            let int_len = run.end() - run.start();
            if !(4..=6).contains(&int_len) {
                return None;
            }
            let mut end = run.end();
            if bytes.get(end) == Some(&b'.') {
                let frac_len = bytes[end + 1..]
                    .iter()
                    .take_while(|b| b.is_ascii_digit())
                    .count();
                if (1..=2).contains(&frac_len) {
                    end += 1 + frac_len;
                }
            }
            clean[run.start()..end].parse::<f64>().ok()
        })
    }

    /// In-bounds, tick-snapped prices found in `tokens`, in token order.
    pub fn candidates(&self, tokens: &[TextToken]) -> Vec<f64> {
        tokens
            .iter()
            .filter(|t| !t.text.trim().is_empty())
            .filter_map(|t| self.parse_token(&t.text))
            .map(|p| self.instrument.snap(p))
            .filter(|p| (self.settings.min_px..=self.settings.max_px).contains(p))
            .collect()
    }

    /// Median of the candidates, snapped, then passed through the jump gate.
    /// `None` when there are no candidates.
    pub fn select(&mut self, mut candidates: Vec<f64>) -> Option<f64> {
        if candidates.is_empty() {
            return None;
        }
        candidates.sort_by(f64::total_cmp);
        let mid = candidates.len() / 2;
        let median = if candidates.len() % 2 == 0 {
            (candidates[mid - 1] + candidates[mid]) / 2.0
        } else {
            candidates[mid]
        };
        let median = self.instrument.snap(median);

        if let Some(last) = self.last_good {
            if (median - last).abs() > self.settings.max_jump_pts {
                debug!(candidate = median, last, "rejected implausible price jump");
                return Some(last);
            }
        }
        self.last_good = Some(median);
        Some(median)
    }

    pub fn extract_from_tokens(&mut self, tokens: &[TextToken]) -> Option<f64> {
        let candidates = self.candidates(tokens);
        self.select(candidates)
    }

    /// Binarise and recognise an already-captured image.
    pub fn extract_from_image(&mut self, image: &Raster, recognizer: &dyn TextRecognizer) -> Option<f64> {
        let binary = image.binarize_default();
        match recognizer.recognize(&binary, self.settings.mode) {
            Ok(tokens) => self.extract_from_tokens(&tokens),
            Err(e) => {
                debug!(error = %e, "recognition failed");
                None
            }
        }
    }

    /// One full reading: capture `region`, recognise, extract. Sensor failures
    /// yield `None` ("hold the previous value").
    pub fn read(
        &mut self,
        capture: &dyn ScreenCapture,
        recognizer: &dyn TextRecognizer,
        region: &Region,
    ) -> Option<f64> {
        match capture.capture(region) {
            Ok(image) => self.extract_from_image(&image, recognizer),
            Err(e) => {
                debug!(error = %e, "capture failed");
                None
            }
        }
    }
}
