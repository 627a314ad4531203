//! The canonical catalog record consumed by the caption formatter.
//!
//! Whatever shape a catalog file has on disk, the [`catalog`](crate::catalog)
//! adapter normalizes each row into a [`GalaxyRecord`] before anything else
//! touches it. Records are immutable for the lifetime of a run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Redshift as it arrived from the catalog.
///
/// Some catalogs carry a number, others a pre-rendered string (ranges,
/// uncertainties, upper limits). Pre-rendered text is used verbatim; numbers
/// are formatted to two decimals at caption time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Redshift {
    Numeric(f64),
    Formatted(String),
}

/// One galaxy, normalized from a catalog row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalaxyRecord {
    pub redshift: Redshift,
    /// Right ascension in degrees.
    pub right_ascension: f64,
    /// Declination in degrees.
    pub declination: f64,
    /// Morphological description, e.g. "elliptical galaxy".
    pub classification: String,
    pub survey_name: String,
    /// Citizen-science project the classification came from.
    pub project_name: String,
    /// Lookback time in billions of years.
    pub lookback_time: f64,
    pub image_url: String,
}

/// Telescope that imaged a galaxy, inferred from the classifying project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instrument {
    HubbleSpaceTelescope,
    ApachePoint25m,
}

impl Instrument {
    pub fn name(self) -> &'static str {
        match self {
            Self::HubbleSpaceTelescope => "Hubble Space Telescope",
            Self::ApachePoint25m => "Apache Point 2.5m Telescope",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
