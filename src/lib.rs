//! # galaxy-post
//!
//! Posts one galaxy per run to Bluesky: a random row from a catalog, its
//! image, and a caption describing what the object is and where it sits.
//!
//! # Architecture: One-Way Pipeline
//!
//! ```text
//! catalog.csv ──▶ GalaxyRecord ──▶ Caption ──▶ image bytes ──▶ PublishOutcome
//!   (catalog)       (record)       (caption)     (fetch)         (publish)
//! ```
//!
//! Each arrow is a separate module with a narrow contract. The interesting
//! logic lives in two of them:
//!
//! - **Caption synthesis** turns raw numeric and categorical catalog fields into
//!   grammatical text. It is a pure function of the record and an injected RNG.
//! - **Publishing** wraps the network call in a bounded retry loop that tells
//!   transport failures (retry) apart from endpoint rejections (don't).
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`record`] | Canonical `GalaxyRecord`, `Redshift`, `Instrument` |
//! | [`catalog`] | CSV loading, column alias normalization, uniform sampling |
//! | [`caption`] | Caption and alt-text rules |
//! | [`fetch`] | Image download and format sniffing |
//! | [`endpoint`] | `PostingEndpoint` trait and the Bluesky XRPC client |
//! | [`publish`] | Retry state machine, backoff, cancellation |
//! | [`pipeline`] | Orchestration of one run, plus whole-catalog checks |
//! | [`config`] | `galaxy-post.toml` layering and environment credentials |
//! | [`output`] | Terminal output formatting |
//!
//! # Design Decisions
//!
//! ## Fail Before Posting
//!
//! The caption is rendered before any network traffic. A record with an empty
//! classification or a project that maps to no known telescope aborts the run
//! without uploading anything. Retrying the same bad record could never help.
//!
//! ## Classified Retries
//!
//! Only transport-level failures (connection errors, timeouts, 5xx, 429) are
//! retried, and always with the identical request. A response the endpoint
//! processed and refused is returned immediately with its error detail.
//!
//! ## Deterministic Captions
//!
//! The one-in-twenty decorative line is drawn from the `Rng` handed in by the
//! caller. The CLI seeds it from `--seed` when given, so a caption can be
//! reproduced exactly.

pub mod caption;
pub mod catalog;
pub mod config;
pub mod endpoint;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod publish;
pub mod record;

#[cfg(test)]
pub(crate) mod test_helpers;
