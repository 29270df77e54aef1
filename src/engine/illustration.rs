use anyhow::{anyhow, Result};
use std::time::Duration;

use crate::engine::generator::ContentGenerator;
use crate::engine::prompt_builder::PromptBuilder;
use crate::engine::protocol::DecodedImage;
use crate::model::scenario::Scenario;

/// Ask the generator for a scenario illustration, fetch it, and decode to
/// RGBA. Strictly cosmetic: every failure is reported as an `Err` the caller
/// is expected to log and forget. Must never gate turn progression.
pub fn fetch_illustration(
    generator: &dyn ContentGenerator,
    scenario: &Scenario,
) -> Result<DecodedImage> {
    let url = generator.generate_image(&PromptBuilder::illustration(scenario))?;

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let bytes = client.get(&url).send()?.error_for_status()?.bytes()?;

    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| anyhow!("illustration did not decode: {e}"))?
        .to_rgba8();

    Ok(DecodedImage {
        width: decoded.width(),
        height: decoded.height(),
        rgba: decoded.into_raw(),
    })
}
