//! Posting endpoints: where a finished caption and image end up.
//!
//! - **Backend**: [`PostingEndpoint`] trait, [`EndpointResponse`] and
//!   [`TransportError`]. The split between the two result shapes is what the
//!   retry loop keys on: a `TransportError` means the request may never have
//!   been processed, an `EndpointResponse` with errors means it was processed
//!   and refused.
//! - **Bluesky**: [`BlueskyClient`], the production implementation over XRPC.

pub mod backend;
pub mod bluesky;

pub use backend::{EndpointResponse, PostingEndpoint, TransportError};
pub use bluesky::BlueskyClient;
