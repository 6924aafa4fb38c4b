//! ROI-aware JPEG 2000 (Part 1) encoder adapter and compression-rate strategy.
//!
//! Everything specific to the bound `openjp2` library lives in [`encoder`]; [`table`] and
//! [`strategy`] are pure and independently tested.

pub mod encoder;
pub mod strategy;
pub mod table;

pub use encoder::{EncodeParams, Jp2Encoder, Jp2Error, RoiParams};
pub use strategy::{Attempt, EncodingStrategy, StrategyError, StrategyOutcome};

use pivcard_image::Image;

/// Encodes `image` per `strategy`, retrying at most `max_retries` additional times for
/// [`EncodingStrategy::TargetSize`]. `roi` is applied to every attempt when present.
pub fn encode(
    image: &Image,
    strategy: EncodingStrategy,
    max_retries: u32,
    roi: Option<RoiParams>,
) -> anyhow::Result<StrategyOutcome> {
    let jp2 = Jp2Encoder::new();
    strategy::run(strategy, max_retries, |rate| {
        let params = EncodeParams { rate, roi };
        jp2.encode(image, &params)
    })
}
