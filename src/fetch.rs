//! Downloading the galaxy image referenced by a record.
//!
//! The bytes are never decoded. They are only sniffed, so the upload can
//! carry the right content type and obviously wrong payloads (HTML error pages,
//! empty bodies) are caught before they reach the posting endpoint.

use crate::config::FetchConfig;
use image::ImageFormat;
use thiserror::Error;
use tracing::{debug, info};

pub(crate) const USER_AGENT: &str = concat!("galaxy-post/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request for {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} is larger than {limit} bytes")]
    TooLarge { url: String, limit: u64 },
    #[error("image body is empty")]
    Empty,
    #[error("unsupported image format")]
    UnsupportedFormat,
}

/// Raw image bytes plus the MIME type they were sniffed as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

impl FetchedImage {
    /// Sniff `bytes` and wrap them. Only formats Bluesky accepts pass.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, FetchError> {
        if bytes.is_empty() {
            return Err(FetchError::Empty);
        }
        let format = image::guess_format(&bytes)
            .ok()
            .filter(|f| {
                matches!(
                    f,
                    ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP
                )
            })
            .ok_or(FetchError::UnsupportedFormat)?;
        Ok(Self {
            bytes,
            mime: format.to_mime_type(),
        })
    }
}

/// Where image bytes come from.
pub trait ImageSource {
    fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError>;
}

/// Plain HTTP(S) download with a timeout and a size cap.
pub struct HttpImageSource {
    agent: ureq::Agent,
    max_bytes: u64,
}

impl HttpImageSource {
    pub fn new(config: &FetchConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout()))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            max_bytes: config.max_bytes,
        }
    }
}

impl ImageSource for HttpImageSource {
    fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
        info!(url, "downloading image");
        let mut response = self
            .agent
            .get(url)
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|err| FetchError::Transport {
                url: url.to_string(),
                reason: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .body_mut()
            .with_config()
            .limit(self.max_bytes)
            .read_to_vec()
            .map_err(|err| match err {
                ureq::Error::BodyExceedsLimit(_) => FetchError::TooLarge {
                    url: url.to_string(),
                    limit: self.max_bytes,
                },
                other => FetchError::Transport {
                    url: url.to_string(),
                    reason: other.to_string(),
                },
            })?;
        debug!(url, bytes = bytes.len(), "image downloaded");

        FetchedImage::from_bytes(bytes)
    }
}
