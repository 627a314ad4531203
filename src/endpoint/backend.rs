//! Posting endpoint trait and shared result types.

use crate::fetch::FetchedImage;
use serde_json::Value;
use thiserror::Error;

/// The request may not have been processed. Worth retrying.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server error: HTTP {status}")]
    Server { status: u16 },
    #[error("rate limited by endpoint")]
    RateLimited,
}

/// A processed request: either accepted with a payload, or refused with a
/// non-empty list of errors.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointResponse {
    pub payload: Value,
    pub errors: Vec<String>,
}

impl EndpointResponse {
    pub fn accepted(payload: Value) -> Self {
        Self {
            payload,
            errors: Vec::new(),
        }
    }

    pub fn rejected(errors: Vec<String>) -> Self {
        Self {
            payload: Value::Null,
            errors,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Something that can publish an image with a caption and alt text.
///
/// One call is one logical post; implementations may make several HTTP
/// requests underneath.
pub trait PostingEndpoint {
    fn submit(
        &self,
        image: &FetchedImage,
        text: &str,
        alt_text: &str,
    ) -> Result<EndpointResponse, TransportError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::test_helpers::JPEG_MAGIC;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Endpoint that replays scripted replies and records every submission.
    #[derive(Default)]
    pub struct MockEndpoint {
        pub replies: Mutex<VecDeque<Result<EndpointResponse, TransportError>>>,
        pub submissions: Mutex<Vec<RecordedSubmit>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedSubmit {
        pub bytes: usize,
        pub text: String,
        pub alt_text: String,
    }

    impl MockEndpoint {
        pub fn with_replies(replies: Vec<Result<EndpointResponse, TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                submissions: Mutex::new(Vec::new()),
            }
        }

        /// `failures` network errors, then acceptance.
        pub fn failing_then_ok(failures: usize) -> Self {
            let mut replies: Vec<_> = (0..failures)
                .map(|i| Err(TransportError::Network(format!("connection reset #{}", i + 1))))
                .collect();
            replies.push(Ok(EndpointResponse::accepted(
                serde_json::json!({"uri": "at://did:plc:test/app.bsky.feed.post/1"}),
            )));
            Self::with_replies(replies)
        }

        pub fn get_submissions(&self) -> Vec<RecordedSubmit> {
            self.submissions.lock().unwrap().clone()
        }

        pub fn calls(&self) -> usize {
            self.submissions.lock().unwrap().len()
        }
    }

    impl PostingEndpoint for MockEndpoint {
        fn submit(
            &self,
            image: &FetchedImage,
            text: &str,
            alt_text: &str,
        ) -> Result<EndpointResponse, TransportError> {
            self.submissions.lock().unwrap().push(RecordedSubmit {
                bytes: image.bytes.len(),
                text: text.to_string(),
                alt_text: alt_text.to_string(),
            });
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Network("no scripted reply".into())))
        }
    }

    pub fn test_image() -> FetchedImage {
        FetchedImage::from_bytes(JPEG_MAGIC.to_vec()).unwrap()
    }

    #[test]
    fn mock_replays_in_order_and_records() {
        let endpoint = MockEndpoint::failing_then_ok(1);
        let image = test_image();

        assert!(endpoint.submit(&image, "caption", "alt").is_err());
        let reply = endpoint.submit(&image, "caption", "alt").unwrap();
        assert!(reply.is_accepted());

        let submissions = endpoint.get_submissions();
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].text, "caption");
        assert_eq!(submissions[0].bytes, JPEG_MAGIC.len());
    }

    #[test]
    fn rejected_response_is_not_accepted() {
        let response = EndpointResponse::rejected(vec!["InvalidRequest: too long".into()]);
        assert!(!response.is_accepted());
        assert_eq!(response.payload, Value::Null);
    }
}
