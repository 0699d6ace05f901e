//! Model artifact acquisition.
//!
//! Artifacts are single raw ONNX files on a static origin. Two failure
//! modes dominate in the wild and both masquerade as success: a CDN
//! serving an HTML 404 page with status 200, and a truncated file. Both
//! are rejected here before any bytes reach the runtime.

use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::Client;
use tokio::time::timeout;

use super::config::EngineConfig;
use super::types::{EngineError, EngineResult, MIN_MODEL_BYTES};

/// Download the artifact for a rating level, with the fetch timeout and
/// content validation applied.
pub async fn fetch_model(client: &Client, config: &EngineConfig, rating: u16) -> EngineResult<Vec<u8>> {
    let url = config.model_url(rating);
    info!("Fetching model artifact: {}", url);

    match timeout(config.fetch_timeout(), fetch_bytes(client, &url, rating)).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Model fetch timed out after {:?}: {}", config.fetch_timeout(), url);
            Err(EngineError::LoadTimeout)
        }
    }
}

async fn fetch_bytes(client: &Client, url: &str, rating: u16) -> EngineResult<Vec<u8>> {
    let res = client.get(url).send().await?;

    if res.status() == reqwest::StatusCode::NOT_FOUND {
        warn!("Model artifact missing (404): {}", url);
        return Err(EngineError::ModelNotFound(rating));
    }
    let res = res.error_for_status()?;

    // A CDN answering a missing file with its HTML error page.
    let content_type = res
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if content_type.contains("text/html") {
        warn!("Model fetch returned HTML instead of a binary: {}", url);
        return Err(EngineError::ModelNotFound(rating));
    }

    let mut data = Vec::with_capacity(res.content_length().unwrap_or(0) as usize);
    let mut stream = res.bytes_stream();
    while let Some(item) = stream.next().await {
        let chunk = item?;
        data.extend_from_slice(&chunk);
    }
    debug!("Downloaded {} bytes for rating {}", data.len(), rating);

    if data.len() < MIN_MODEL_BYTES {
        return Err(EngineError::InvalidArtifact(format!(
            "artifact is {} bytes, expected at least {}",
            data.len(),
            MIN_MODEL_BYTES
        )));
    }

    Ok(data)
}
