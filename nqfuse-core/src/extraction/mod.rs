//! Screen-sensor price acquisition: binarisation, recognition seams, price
//! extraction and price-column location.

pub mod locator;
pub mod price;
pub mod raster;
pub mod sensor;

pub use locator::{locate_in_tokens, RegionLocator, PRICE_HEADERS};
pub use price::{ExtractorError, ExtractorSettings, PriceExtractor};
pub use raster::Raster;
pub use sensor::{
    Display, RecognitionMode, ScreenCapture, SensorError, TextRecognizer, TextToken,
    UnavailableCapture, UnavailableRecognizer,
};
