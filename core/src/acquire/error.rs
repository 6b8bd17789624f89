//! Error types for image acquisition

use thiserror::Error;

/// Errors while querying the remote collection or downloading an image.
///
/// None of these reach the refresh loop: the acquisition boundary logs them
/// and reports "no image this tick".
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("invalid query URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("page {page} body is not a JSON array")]
    NotAnArray { page: u32 },

    #[error("page {page} is not valid JSON")]
    Json {
        page: u32,
        #[source]
        source: serde_json::Error,
    },

    #[error("page {page} has no posts")]
    EmptyPage { page: u32 },

    #[error("post {index} on page {page} has no file_url")]
    MissingFileUrl { page: u32, index: usize },

    #[error("failed to decode image")]
    Decode(#[from] image::ImageError),

    #[error("decoded image has no pixels")]
    EmptyImage,
}
