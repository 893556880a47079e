//! Owns both acquisition feeds and their lifecycles.

use crate::extraction_feed::ExtractionFeed;
use crate::reference_feed::{ReferenceBatch, ReferenceFeed};
use nqfuse_core::domain::{PriceSample, Region};
use std::io;
use std::sync::Arc;
use tracing::info;

/// The two independently cadenced feeds. Consumers only ever read their
/// latest values; nothing here queues history.
pub struct FeedController {
    reference: ReferenceFeed,
    extraction: ExtractionFeed,
}

impl FeedController {
    pub fn new(reference: ReferenceFeed, extraction: ExtractionFeed) -> Self {
        Self {
            reference,
            extraction,
        }
    }

    /// Start both feeds. Feeds already running are left alone.
    pub fn start(&self) -> io::Result<()> {
        let reference = self.reference.start()?;
        let extraction = self.extraction.start()?;
        if reference || extraction {
            info!(reference, extraction, "feeds started");
        }
        Ok(())
    }

    pub fn stop(&self) {
        let reference = self.reference.stop();
        let extraction = self.extraction.stop();
        if reference || extraction {
            info!(reference, extraction, "feeds stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.reference.is_running() || self.extraction.is_running()
    }

    pub fn latest_reference(&self) -> Option<Arc<ReferenceBatch>> {
        self.reference.latest()
    }

    pub fn latest_extracted(&self) -> Option<PriceSample> {
        self.extraction.latest()
    }

    pub fn region(&self) -> Option<Region> {
        self.extraction.region()
    }

    /// Manual override: replaces and persists the capture region.
    pub fn set_region(&self, region: Region) {
        self.extraction.set_region(region);
    }

    pub fn request_relocation(&self) {
        self.extraction.request_relocation();
    }

    pub fn reference(&self) -> &ReferenceFeed {
        &self.reference
    }

    pub fn extraction(&self) -> &ExtractionFeed {
        &self.extraction
    }
}
