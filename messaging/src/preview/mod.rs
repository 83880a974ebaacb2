//! Preview metadata fetching for the preview worker.
//!
//! Fetches a page and extracts Open Graph / Twitter / HTML metadata with
//! graceful degradation: every field is `None` on fetch or parse failure, the
//! fetch itself never fails the job.

pub mod extract;

use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};

pub use extract::{extract_metadata, PreviewMetadata};

/// Fetch a URL and extract its preview metadata.
///
/// Redirects are followed by the client; non-2xx responses and transport
/// errors degrade to empty metadata.
pub async fn fetch_preview(client: &Client, url: &str, timeout: Duration) -> PreviewMetadata {
    let response = match client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .and_then(|r| r.error_for_status())
    {
        Ok(response) => response,
        Err(e) => {
            warn!(url = url, error = %e, "preview_fetch_failed");
            return PreviewMetadata::default();
        }
    };

    let html = match response.text().await {
        Ok(html) => html,
        Err(e) => {
            warn!(url = url, error = %e, "preview_body_read_failed");
            return PreviewMetadata::default();
        }
    };

    let metadata = extract_metadata(&html, url);

    info!(
        url = url,
        has_title = metadata.title.is_some(),
        has_description = metadata.description.is_some(),
        has_image = metadata.image.is_some(),
        "preview_fetched"
    );

    metadata
}
