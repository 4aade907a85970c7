//! Background image fetching, decoding and installation.
//!
//! A story's image URL stays stable while its content is regenerated
//! server-side, so every fetch appends a fresh timestamp query parameter to
//! defeat HTTP caches.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use image::RgbaImage;
use tracing::{debug, warn};

use crate::canvas::{CanvasError, SketchSurface};

use super::ApiError;

/// Fetches raw image bytes. A seam so loading flows can be tested without
/// a network.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ApiError>;
}

/// reqwest-backed [`ImageFetcher`].
#[derive(Debug, Clone, Default)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Append a millisecond timestamp query parameter so regenerated content is
/// never served from cache.
pub fn cache_defeating(url: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}ts={}", current_time_ms())
}

fn current_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

/// Decode fetched bytes into straight-alpha RGBA.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, ApiError> {
    image::load_from_memory(bytes)
        .map(|image| image.to_rgba8())
        .map_err(|e| ApiError::ImageDecode(e.to_string()))
}

/// Load a story's background into the surface: fetch with a cache-defeating
/// URL, decode, install. `None` installs the blank placeholder (story
/// without an image). Failures fall back to the placeholder and are
/// surfaced through [`SketchSurface::load_error`]; a result arriving for a
/// superseded load is discarded.
pub async fn load_background<F>(surface: &mut SketchSurface, fetcher: &F, url: Option<&str>)
where
    F: ImageFetcher + ?Sized,
{
    let token = surface.begin_background_load();
    let Some(url) = url else {
        let _ = surface.install_blank(token);
        return;
    };

    let fetched = fetcher.fetch(&cache_defeating(url)).await;
    let message = match fetched.and_then(|bytes| decode_image(&bytes)) {
        Ok(image) => match surface.install_background(token, &image) {
            Ok(()) => return,
            Err(CanvasError::InvalidInput(message)) => message,
            Err(e) => {
                debug!(error = %e, "background install skipped");
                return;
            }
        },
        Err(e) => e.to_string(),
    };

    warn!(url, %message, "background load failed");
    let _ = surface.install_load_failure(token, message);
}
