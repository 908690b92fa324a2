//! JSON output for search results.
//!
//! Each search is written to `{json_output_dir}/{local date}/{keyword slug}.json`.
//! A later search for the same keyword on the same day replaces the file.

use crate::models::AggregationResult;
use crate::utils::slugify;
use chrono::Local;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write an [`AggregationResult`] under `json_output_dir`, returning the path.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir, keyword = %result.keyword))]
pub async fn write_results(
    result: &AggregationResult,
    json_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(result)?;

    let local_date = Local::now().date_naive().to_string();
    let full_json_dir = PathBuf::from(json_output_dir).join(local_date);

    info!(full_json_dir = %full_json_dir.display(), "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&full_json_dir).await {
        error!(full_json_dir = %full_json_dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = full_json_dir.join(format!("{}.json", slugify(&result.keyword)));
    fs::write(&path, json).await?;
    info!(path = %path.display(), combined = result.combined.len(), "Wrote search results");

    Ok(path)
}
