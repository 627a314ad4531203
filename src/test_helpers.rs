//! Shared test utilities: canonical records and catalog text.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let record = record_with(|r| r.lookback_time = 1.0);
//! let catalog = Catalog::from_reader(CATALOG_CSV.as_bytes()).unwrap();
//! ```

use crate::record::{GalaxyRecord, Redshift};

/// The CANDELS example: typo'd survey, sub-Gyr lookback, vowel-initial class.
pub fn candels_record() -> GalaxyRecord {
    GalaxyRecord {
        redshift: Redshift::Numeric(0.00324),
        right_ascension: 150.11920,
        declination: 2.20058,
        classification: "elliptical galaxy".to_string(),
        survey_name: "CANDELS-COODS".to_string(),
        project_name: "CANDELS".to_string(),
        lookback_time: 0.045,
        image_url: "https://example.org/images/candels-001.jpg".to_string(),
    }
}

/// [`candels_record`] with one or more fields changed.
pub fn record_with(edit: impl FnOnce(&mut GalaxyRecord)) -> GalaxyRecord {
    let mut record = candels_record();
    edit(&mut record);
    record
}

/// Three rows using the modern typed column layout.
pub const CATALOG_CSV: &str = "\
image_url,redshift,ra,dec,classification,survey,project,lookback_time
https://example.org/a.jpg,0.00324,150.11920,2.20058,elliptical galaxy,CANDELS-COODS,CANDELS,0.045
https://example.org/b.jpg,0.0812,185.5,-1.25,barred spiral galaxy,SDSS,Galaxy Zoo 2,1.0
https://example.org/c.jpg,z < 0.01,10.0,41.2,irregular galaxy,COSMOS,Galaxy Zoo: Hubble,0.12
";

/// The oldest catalog layout: a `url` column and a JSON metadata blob.
pub const LEGACY_CATALOG_CSV: &str = r#"url,some_meta_data
https://example.org/legacy.jpg,"{""z"": 0.5, ""ra"": 200.0, ""dec"": -30.5, ""clsf"": ""spiral galaxy"", ""survey"": ""SDSS"", ""projects"": ""Galaxy Zoo 2"", ""lookback"": 5.02}"
"#;

/// Minimal valid JPEG header bytes, enough for format sniffing.
pub const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
