//! Caption and alt-text synthesis from a [`GalaxyRecord`].
//!
//! Everything here is pure: no I/O, no clocks, no global randomness. The only
//! nondeterminism, the occasional decorative trailing line, is drawn from a
//! caller-supplied [`Rng`], so a seeded generator reproduces a caption exactly.
//!
//! ## Caption layout
//!
//! ```text
//! An elliptical galaxy, observed with the Hubble Space Telescope in the CANDELS-GOODS survey.
//!
//! It is at redshift 0.00 (lookback time 45.0 million years) with coordinates (150.11920, 2.20058).
//!
//! This classification was made in the CANDELS project.
//! ```
//!
//! ## Field rules
//!
//! | Field | Rendering |
//! |---|---|
//! | Redshift | pre-formatted text verbatim, numbers with 2 decimals |
//! | RA / Dec | 5 decimals, degrees, no unit |
//! | Survey | `CANDELS-COODS` (a catalog typo) becomes `CANDELS-GOODS` |
//! | Instrument | first project substring match: `Hubble`, `CANDELS`, `Galaxy Zoo 2` |
//! | Lookback | `< 1` Gyr as millions (1 decimal), otherwise billions (2 decimals) |
//! | Article | `An` before a vowel, `A` otherwise |
//!
//! The alt text always reads `A <classification> from the <project> project.`

use crate::config::{BotConfig, UnknownInstrument};
use crate::record::{GalaxyRecord, Instrument, Redshift};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptionError {
    #[error("malformed record: {field} {reason}")]
    MalformedRecord { field: &'static str, reason: String },
    #[error("no known instrument for project '{project}'")]
    UnresolvedInstrument { project: String },
}

/// A rendered post body plus its image description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Caption {
    pub text: String,
    pub alt_text: String,
    /// Whether the decorative trailing line was appended.
    pub decorated: bool,
}

/// Knobs for caption rendering, resolved from [`BotConfig`].
#[derive(Debug, Clone)]
pub struct CaptionOptions {
    /// One in `decoration_odds` captions gets the decorative line.
    pub decoration_odds: u32,
    pub decoration: String,
    pub unknown_instrument: UnknownInstrument,
    pub instrument_placeholder: String,
}

impl CaptionOptions {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            decoration_odds: config.caption.decoration_odds,
            decoration: config.caption.decoration.clone(),
            unknown_instrument: config.caption.unknown_instrument,
            instrument_placeholder: config.caption.instrument_placeholder.clone(),
        }
    }
}

impl Default for CaptionOptions {
    fn default() -> Self {
        Self::from_config(&BotConfig::default())
    }
}

const MISSPELLED_SURVEY: &str = "CANDELS-COODS";
const CORRECTED_SURVEY: &str = "CANDELS-GOODS";

/// Project substrings checked in order; the first hit wins.
const INSTRUMENT_RULES: &[(&str, Instrument)] = &[
    ("Hubble", Instrument::HubbleSpaceTelescope),
    ("CANDELS", Instrument::HubbleSpaceTelescope),
    ("Galaxy Zoo 2", Instrument::ApachePoint25m),
];

// =============================================================================
// Field rules
// =============================================================================

/// Render a redshift: text verbatim, numbers fixed-point with two decimals.
pub fn format_redshift(redshift: &Redshift) -> String {
    match redshift {
        Redshift::Formatted(text) => text.clone(),
        Redshift::Numeric(z) => format!("{z:.2}"),
    }
}

/// Render a coordinate in degrees with five decimals.
pub fn format_coordinate(degrees: f64) -> String {
    format!("{degrees:.5}")
}

/// Replace a survey name containing the `CANDELS-COODS` typo with the
/// corrected name. Idempotent.
pub fn normalize_survey(survey: &str) -> String {
    if survey.contains(MISSPELLED_SURVEY) {
        CORRECTED_SURVEY.to_string()
    } else {
        survey.to_string()
    }
}

/// Map a project name to the telescope that imaged its galaxies.
///
/// Returns `None` when no rule matches; callers decide what that means.
pub fn resolve_instrument(project: &str) -> Option<Instrument> {
    INSTRUMENT_RULES
        .iter()
        .find(|(needle, _)| project.contains(needle))
        .map(|(_, instrument)| *instrument)
}

/// Describe a lookback time given in billions of years.
///
/// Below one billion years the value is shown in millions.
pub fn lookback_phrase(gyr: f64) -> String {
    // A catalog "-0" would otherwise print as "-0.0".
    let gyr = if gyr == 0.0 { 0.0 } else { gyr };
    if gyr < 1.0 {
        format!("{:.1} million years", gyr * 1000.0)
    } else {
        format!("{gyr:.2} billion years")
    }
}

/// `"An"` if the first character is an ASCII vowel (any case), else `"A"`.
pub fn indefinite_article(word: &str) -> &'static str {
    match word.chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "An",
        _ => "A",
    }
}

// =============================================================================
// Validation
// =============================================================================

fn require_text(field: &'static str, value: &str) -> Result<(), CaptionError> {
    if value.trim().is_empty() {
        return Err(CaptionError::MalformedRecord {
            field,
            reason: "is empty".into(),
        });
    }
    Ok(())
}

fn require_finite(field: &'static str, value: f64) -> Result<(), CaptionError> {
    if !value.is_finite() {
        return Err(CaptionError::MalformedRecord {
            field,
            reason: format!("is not a finite number ({value})"),
        });
    }
    Ok(())
}

/// Check that every field the caption interpolates has a usable shape.
pub fn validate(record: &GalaxyRecord) -> Result<(), CaptionError> {
    require_text("classification", &record.classification)?;
    require_text("survey_name", &record.survey_name)?;
    require_text("project_name", &record.project_name)?;
    require_finite("right_ascension", record.right_ascension)?;
    require_finite("declination", record.declination)?;
    require_finite("lookback_time", record.lookback_time)?;
    if record.lookback_time < 0.0 {
        return Err(CaptionError::MalformedRecord {
            field: "lookback_time",
            reason: format!("is negative ({})", record.lookback_time),
        });
    }
    match &record.redshift {
        Redshift::Numeric(z) => require_finite("redshift", *z)?,
        Redshift::Formatted(text) => require_text("redshift", text)?,
    }
    Ok(())
}

// =============================================================================
// Assembly
// =============================================================================

fn instrument_name(
    record: &GalaxyRecord,
    options: &CaptionOptions,
) -> Result<String, CaptionError> {
    match resolve_instrument(&record.project_name) {
        Some(instrument) => Ok(instrument.name().to_string()),
        None => match options.unknown_instrument {
            UnknownInstrument::Reject => Err(CaptionError::UnresolvedInstrument {
                project: record.project_name.clone(),
            }),
            UnknownInstrument::Placeholder => Ok(options.instrument_placeholder.clone()),
        },
    }
}

/// Accessibility text for the image. Always uses the article "A".
pub fn alt_text(record: &GalaxyRecord) -> String {
    format!(
        "A {} from the {} project.",
        record.classification, record.project_name
    )
}

/// Build the caption with the decoration decided by the caller.
pub fn compose(
    record: &GalaxyRecord,
    options: &CaptionOptions,
    decorate: bool,
) -> Result<Caption, CaptionError> {
    validate(record)?;
    let instrument = instrument_name(record, options)?;

    let mut text = format!(
        "{article} {classification}, observed with the {instrument} in the {survey} survey.\n\n\
         It is at redshift {redshift} (lookback time {lookback}) \
         with coordinates ({ra}, {dec}).\n\n\
         This classification was made in the {project} project.",
        article = indefinite_article(&record.classification),
        classification = record.classification,
        survey = normalize_survey(&record.survey_name),
        redshift = format_redshift(&record.redshift),
        lookback = lookback_phrase(record.lookback_time),
        ra = format_coordinate(record.right_ascension),
        dec = format_coordinate(record.declination),
        project = record.project_name,
    );
    if decorate {
        text.push_str("\n\n");
        text.push_str(&options.decoration);
    }

    Ok(Caption {
        text,
        alt_text: alt_text(record),
        decorated: decorate,
    })
}

/// Build the caption, drawing the one-in-N decoration from `rng`.
pub fn format_caption<R: Rng>(
    record: &GalaxyRecord,
    options: &CaptionOptions,
    rng: &mut R,
) -> Result<Caption, CaptionError> {
    let decorate = rng.random_ratio(1, options.decoration_odds.max(1));
    compose(record, options, decorate)
}
