//! One run: pick a record, caption it, fetch its image, publish.
//!
//! ```text
//! RecordSource ──▶ caption::format_caption ──▶ ImageSource ──▶ Publisher
//!   (catalog)        (pure, fails fast)         (download)     (retries)
//! ```
//!
//! The caption is rendered before any network traffic, so a bad record never
//! produces a partial post. Catalog, caption and download errors abort the run
//! as [`RunError`]; everything after that point is reported through the
//! [`PublishOutcome`] inside the [`RunReport`].

use crate::caption::{self, Caption, CaptionError, CaptionOptions};
use crate::catalog::{Catalog, CatalogError, RecordSource};
use crate::config::BotConfig;
use crate::endpoint::PostingEndpoint;
use crate::fetch::{FetchError, ImageSource};
use crate::publish::{CancelToken, PublishOutcome, Publisher, Sleeper};
use crate::record::GalaxyRecord;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("caption error: {0}")]
    Caption(#[from] CaptionError),
    #[error("image download failed: {0}")]
    Fetch(#[from] FetchError),
}

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub caption: CaptionOptions,
    pub publisher: Publisher,
}

impl RunSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            caption: CaptionOptions::from_config(config),
            publisher: Publisher::from_config(&config.publish),
        }
    }
}

/// A record and the caption rendered for it, before anything is sent.
#[derive(Debug, Clone, Serialize)]
pub struct Draft {
    pub record: GalaxyRecord,
    pub caption: Caption,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub record: GalaxyRecord,
    pub caption: Caption,
    pub image_bytes: usize,
    pub outcome: PublishOutcome,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Select a record and render its caption. No I/O beyond the record source.
pub fn draft<S, R>(source: &S, options: &CaptionOptions, rng: &mut R) -> Result<Draft, RunError>
where
    S: RecordSource,
    R: Rng,
{
    let record = source.next_record(rng)?;
    let caption = caption::format_caption(&record, options, rng)?;
    info!(
        classification = %record.classification,
        project = %record.project_name,
        decorated = caption.decorated,
        "caption rendered"
    );
    Ok(Draft { record, caption })
}

/// Result of validating every catalog row.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckSummary {
    pub rows: usize,
    /// 1-based row number and what is wrong with it.
    pub failures: Vec<(usize, String)>,
}

impl CheckSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Normalize and caption every row, collecting the ones that would abort a run.
pub fn check_catalog(catalog: &Catalog, options: &CaptionOptions) -> CheckSummary {
    let mut summary = CheckSummary {
        rows: catalog.len(),
        failures: Vec::new(),
    };
    for (row, result) in catalog.records() {
        let problem = match result {
            Ok(record) => caption::compose(&record, options, false)
                .err()
                .map(|err| err.to_string()),
            Err(err) => Some(err.to_string()),
        };
        if let Some(problem) = problem {
            summary.failures.push((row, problem));
        }
    }
    summary
}

/// The collaborators a run talks to.
pub struct Pipeline<'a, S, I, E: ?Sized> {
    pub source: &'a S,
    pub images: &'a I,
    pub endpoint: &'a E,
    pub settings: &'a RunSettings,
}

impl<S, I, E> Pipeline<'_, S, I, E>
where
    S: RecordSource,
    I: ImageSource,
    E: PostingEndpoint + ?Sized,
{
    pub fn run<R, Z>(
        &self,
        rng: &mut R,
        sleeper: &Z,
        cancel: &CancelToken,
    ) -> Result<RunReport, RunError>
    where
        R: Rng,
        Z: Sleeper + ?Sized,
    {
        let Draft { record, caption } = draft(self.source, &self.settings.caption, rng)?;
        let image = self.images.fetch(&record.image_url)?;

        let outcome = self.settings.publisher.publish(
            self.endpoint,
            &image,
            &caption.text,
            &caption.alt_text,
            sleeper,
            cancel,
        );

        Ok(RunReport {
            record,
            caption,
            image_bytes: image.bytes.len(),
            outcome,
        })
    }
}
