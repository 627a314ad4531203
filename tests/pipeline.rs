//! End-to-end runs over the fixture catalog with in-process collaborators.
//!
//! Nothing here touches the network: the endpoint replays a script, images
//! come from memory, and sleeps are recorded instead of taken.

use galaxy_post::catalog::Catalog;
use galaxy_post::config::{self, BotConfig};
use galaxy_post::endpoint::{EndpointResponse, PostingEndpoint, TransportError};
use galaxy_post::fetch::{FetchError, FetchedImage, ImageSource};
use galaxy_post::pipeline::{self, Pipeline, RunReport, RunSettings};
use galaxy_post::publish::{CancelToken, PublishOutcome, Sleeper};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

fn fixture_catalog() -> Catalog {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/catalog.csv");
    Catalog::load(&path).unwrap()
}

/// Replays scripted replies; once the script runs out, every call fails in transit.
#[derive(Default)]
struct ScriptedEndpoint {
    script: Mutex<VecDeque<Result<EndpointResponse, TransportError>>>,
    texts: Mutex<Vec<String>>,
}

impl ScriptedEndpoint {
    fn new(script: Vec<Result<EndpointResponse, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            texts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.texts.lock().unwrap().len()
    }
}

impl PostingEndpoint for ScriptedEndpoint {
    fn submit(
        &self,
        image: &FetchedImage,
        text: &str,
        _alt_text: &str,
    ) -> Result<EndpointResponse, TransportError> {
        assert_eq!(image.mime, "image/jpeg");
        self.texts.lock().unwrap().push(text.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("connection refused".into())))
    }
}

struct MemoryImages;

impl ImageSource for MemoryImages {
    fn fetch(&self, _url: &str) -> Result<FetchedImage, FetchError> {
        FetchedImage::from_bytes(JPEG.to_vec())
    }
}

#[derive(Default)]
struct Sleeps(Mutex<Vec<Duration>>);

impl Sleeper for Sleeps {
    fn sleep(&self, duration: Duration) {
        self.0.lock().unwrap().push(duration);
    }
}

fn run(
    config: &BotConfig,
    endpoint: &ScriptedEndpoint,
    sleeps: &Sleeps,
    cancel: &CancelToken,
) -> RunReport {
    let catalog = fixture_catalog();
    let settings = RunSettings::from_config(config);
    let pipeline = Pipeline {
        source: &catalog,
        images: &MemoryImages,
        endpoint,
        settings: &settings,
    };
    pipeline
        .run(&mut StdRng::seed_from_u64(2024), sleeps, cancel)
        .unwrap()
}

#[test]
fn fixture_catalog_is_clean() {
    let catalog = fixture_catalog();
    let options = RunSettings::from_config(&BotConfig::default()).caption;
    let summary = pipeline::check_catalog(&catalog, &options);
    assert_eq!(summary.rows, 4);
    assert!(summary.is_clean(), "{:?}", summary.failures);
}

#[test]
fn transient_failures_then_success() {
    let endpoint = ScriptedEndpoint::new(vec![
        Err(TransportError::Network("timed out".into())),
        Err(TransportError::Server { status: 502 }),
        Ok(EndpointResponse::accepted(json!({"uri": "at://post/1"}))),
    ]);
    let sleeps = Sleeps::default();
    let report = run(&BotConfig::default(), &endpoint, &sleeps, &CancelToken::new());

    assert_eq!(
        report.outcome,
        PublishOutcome::Succeeded {
            payload: json!({"uri": "at://post/1"}),
            attempts: 3
        }
    );
    assert_eq!(*sleeps.0.lock().unwrap(), vec![Duration::from_secs(10); 2]);

    // Every attempt carries the identical caption.
    let texts = endpoint.texts.lock().unwrap();
    assert_eq!(texts.len(), 3);
    assert!(texts.iter().all(|t| *t == report.caption.text));
}

#[test]
fn rejection_is_not_retried() {
    let endpoint = ScriptedEndpoint::new(vec![Ok(EndpointResponse::rejected(vec![
        "InvalidRequest: text too long".into(),
    ]))]);
    let sleeps = Sleeps::default();
    let report = run(&BotConfig::default(), &endpoint, &sleeps, &CancelToken::new());

    assert_eq!(
        report.outcome,
        PublishOutcome::Rejected {
            errors: vec!["InvalidRequest: text too long".into()],
            attempts: 1
        }
    );
    assert_eq!(endpoint.calls(), 1);
    assert!(sleeps.0.lock().unwrap().is_empty());
}

#[test]
fn exhaustion_uses_every_attempt_and_skips_final_sleep() {
    let endpoint = ScriptedEndpoint::default();
    let sleeps = Sleeps::default();
    let report = run(&BotConfig::default(), &endpoint, &sleeps, &CancelToken::new());

    assert!(!report.is_success());
    assert_eq!(
        report.outcome,
        PublishOutcome::Exhausted {
            reason: "network error: connection refused".into(),
            attempts: 5
        }
    );
    assert_eq!(endpoint.calls(), 5);
    assert_eq!(sleeps.0.lock().unwrap().len(), 4);
}

#[test]
fn config_file_controls_retry_policy() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("galaxy-post.toml");
    std::fs::write(
        &path,
        r#"
[publish]
max_attempts = 4

[publish.backoff]
strategy = "exponential"
interval_secs = 1
max_interval_secs = 3
"#,
    )
    .unwrap();
    let config = config::load_config(&path).unwrap();

    let endpoint = ScriptedEndpoint::default();
    let sleeps = Sleeps::default();
    let report = run(&config, &endpoint, &sleeps, &CancelToken::new());

    assert_eq!(report.outcome.attempts(), 4);
    assert_eq!(
        *sleeps.0.lock().unwrap(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(3)
        ]
    );
}

#[test]
fn cancelled_token_posts_nothing() {
    let endpoint = ScriptedEndpoint::default();
    let cancel = CancelToken::new();
    cancel.cancel();
    let report = run(&BotConfig::default(), &endpoint, &Sleeps::default(), &cancel);

    assert!(matches!(
        report.outcome,
        PublishOutcome::Cancelled { attempts: 0, .. }
    ));
    assert_eq!(endpoint.calls(), 0);
}

#[test]
fn same_seed_same_draft() {
    let catalog = fixture_catalog();
    let options = RunSettings::from_config(&BotConfig::default()).caption;
    let a = pipeline::draft(&catalog, &options, &mut StdRng::seed_from_u64(7)).unwrap();
    let b = pipeline::draft(&catalog, &options, &mut StdRng::seed_from_u64(7)).unwrap();

    assert_eq!(a.record, b.record);
    assert_eq!(a.caption.text, b.caption.text);
    assert!(a.caption.alt_text.starts_with("A "));
}
