//! Companion query against the eBird observations API
//!
//! Fetches recent bird observations for a region and prints the first few.
//! The API token is read from the `EBIRD_API_TOKEN` environment variable;
//! the region code defaults to US-CA and can be overridden as the first
//! CLI argument.

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_REGION: &str = "US-CA";
const SHOWN: usize = 3;

/// One observation record from the eBird "recent observations" endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Observation {
    /// Common species name
    com_name: String,
    /// Scientific species name
    sci_name: String,
    /// Location description
    loc_name: String,
    /// Observation date, "YYYY-MM-DD HH:MM"
    obs_dt: String,
    /// Individual count, absent when the observer reported presence only
    how_many: Option<u32>,
}

fn fetch_recent(region: &str, token: &str) -> Result<Vec<Observation>> {
    let url = format!("https://api.ebird.org/v2/data/obs/{}/recent", region);
    let response = ureq::get(&url)
        .set("X-eBirdApiToken", token)
        .call()
        .with_context(|| format!("Request failed: {}", url))?;

    serde_json::from_reader(response.into_reader()).context("Failed to parse eBird response")
}

fn main() -> Result<()> {
    let region = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_REGION.to_string());
    let token = std::env::var("EBIRD_API_TOKEN")
        .context("EBIRD_API_TOKEN is not set (get a key at https://ebird.org/api/keygen)")?;

    let observations = fetch_recent(&region, &token)?;
    if observations.is_empty() {
        println!("No recent observations for {}", region);
        return Ok(());
    }

    for obs in observations.iter().take(SHOWN) {
        let count = obs
            .how_many
            .map(|n| n.to_string())
            .unwrap_or_else(|| "present".to_string());
        println!(
            "{} ({}) x{} at {}, {}",
            obs.com_name, obs.sci_name, count, obs.loc_name, obs.obs_dt
        );
    }

    Ok(())
}
