//! Capture and recognition collaborators.
//!
//! Neither is assumed reliable: every call may fail, and the extraction code
//! treats a failure as "no reading this cycle".

use super::raster::Raster;
use crate::domain::Region;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SensorError {
    #[error("screen capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error("text recognition failed: {0}")]
    RecognitionFailed(String),

    #[error("malformed image: {0}")]
    BadImage(String),
}

/// A recognised word with its bounding box, relative to the recognised image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextToken {
    pub text: String,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl TextToken {
    pub fn new(text: impl Into<String>, left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            text: text.into(),
            left,
            top,
            width,
            height,
        }
    }
}

/// Page segmentation mode handed to the recogniser (Tesseract numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionMode(pub u8);

impl RecognitionMode {
    /// Single uniform block of text.
    pub const BLOCK: RecognitionMode = RecognitionMode(6);
}

impl Default for RecognitionMode {
    fn default() -> Self {
        Self::BLOCK
    }
}

/// Size and origin of a display in desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Display {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

/// Grabs screen pixels.
pub trait ScreenCapture: Send + Sync {
    fn primary_display(&self) -> Result<Display, SensorError>;

    fn capture(&self, region: &Region) -> Result<Raster, SensorError>;
}

/// Turns a binarised image into positioned words.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &Raster, mode: RecognitionMode) -> Result<Vec<TextToken>, SensorError>;
}

/// Capture backend for hosts without a desktop capture implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableCapture;

impl ScreenCapture for UnavailableCapture {
    fn primary_display(&self) -> Result<Display, SensorError> {
        Err(SensorError::CaptureUnavailable(
            "no capture backend configured".to_string(),
        ))
    }

    fn capture(&self, _region: &Region) -> Result<Raster, SensorError> {
        Err(SensorError::CaptureUnavailable(
            "no capture backend configured".to_string(),
        ))
    }
}

/// Recogniser for hosts without an OCR engine; always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRecognizer;

impl TextRecognizer for UnavailableRecognizer {
    fn recognize(&self, _image: &Raster, _mode: RecognitionMode) -> Result<Vec<TextToken>, SensorError> {
        Err(SensorError::RecognitionFailed(
            "no recognition engine configured".to_string(),
        ))
    }
}
