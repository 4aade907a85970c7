//! Story backend client: typed contracts, HTTP service, image loading,
//! status polling and session bookkeeping.

pub mod http;
pub mod images;
pub mod models;
pub mod poller;
pub mod session;

pub use http::{HttpStoryApi, StoryApi};
pub use images::{load_background, HttpImageFetcher, ImageFetcher};
pub use models::*;
pub use poller::{PollConfig, PollEvent, PollState, StoryPoller};
pub use session::{CurrentStory, SessionStore};

use thiserror::Error;

/// Story backend errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status code: {0}")]
    Status(u16),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}
