//! Catalog loading and normalization into [`GalaxyRecord`]s.
//!
//! The catalog is a CSV file with a header row. Its schema has drifted over
//! time, so columns are matched by alias rather than by exact name:
//!
//! | Field | Accepted headers (case-insensitive) |
//! |---|---|
//! | redshift | `redshift`, `z` |
//! | right ascension | `ra`, `right_ascension` |
//! | declination | `dec`, `declination` |
//! | classification | `classification`, `clsf`, `class` |
//! | survey | `survey`, `survey_name` |
//! | project | `project`, `project_name`, `projects` |
//! | lookback time | `lookback_time`, `lookback`, `lookback_gyr` |
//! | image URL | `image_url`, `url` |
//!
//! The oldest layout has only `url` plus a free-text `some_meta_data` (or
//! `meta_data`) column holding a JSON object keyed by the same aliases. When a
//! row has both, typed columns win over the JSON blob.
//!
//! ## Redshift
//!
//! A CSV cell that parses as a finite number becomes
//! [`Redshift::Numeric`]; anything else is kept verbatim as
//! [`Redshift::Formatted`]. Inside the JSON blob the JSON type decides.
//! Text that parses as a non-finite float (`nan`, `inf`) is an invalid field
//! either way.

use crate::record::{GalaxyRecord, Redshift};
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("catalog has no column for {0} and no metadata column")]
    MissingColumn(&'static str),
    #[error("catalog has no rows")]
    Empty,
    #[error("row {row}: missing {field}")]
    MissingField { row: usize, field: &'static str },
    #[error("row {row}: {field} has invalid value '{value}'")]
    InvalidField {
        row: usize,
        field: &'static str,
        value: String,
    },
    #[error("row {row}: unreadable metadata: {reason}")]
    MetaData { row: usize, reason: String },
}

/// Anything that can hand the pipeline one record per run.
pub trait RecordSource {
    fn next_record<R: Rng>(&self, rng: &mut R) -> Result<GalaxyRecord, CatalogError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Redshift,
    RightAscension,
    Declination,
    Classification,
    Survey,
    Project,
    Lookback,
    ImageUrl,
}

impl Field {
    const ALL: [Field; 8] = [
        Field::Redshift,
        Field::RightAscension,
        Field::Declination,
        Field::Classification,
        Field::Survey,
        Field::Project,
        Field::Lookback,
        Field::ImageUrl,
    ];

    fn name(self) -> &'static str {
        match self {
            Field::Redshift => "redshift",
            Field::RightAscension => "right_ascension",
            Field::Declination => "declination",
            Field::Classification => "classification",
            Field::Survey => "survey_name",
            Field::Project => "project_name",
            Field::Lookback => "lookback_time",
            Field::ImageUrl => "image_url",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::Redshift => &["redshift", "z"],
            Field::RightAscension => &["ra", "right_ascension"],
            Field::Declination => &["dec", "declination"],
            Field::Classification => &["classification", "clsf", "class"],
            Field::Survey => &["survey", "survey_name"],
            Field::Project => &["project", "project_name", "projects"],
            Field::Lookback => &["lookback_time", "lookback", "lookback_gyr"],
            Field::ImageUrl => &["image_url", "url"],
        }
    }

    fn from_column(header: &str) -> Option<Field> {
        let header = header.trim().to_ascii_lowercase();
        Field::ALL
            .into_iter()
            .find(|field| field.aliases().contains(&header.as_str()))
    }
}

const META_COLUMNS: &[&str] = &["some_meta_data", "meta_data"];

/// A value before it is interpreted for a specific field.
#[derive(Debug, Clone)]
enum RawValue {
    /// CSV cell: untyped text.
    Cell(String),
    /// JSON string: explicitly text.
    Text(String),
    /// JSON number.
    Number(f64),
}

/// An in-memory catalog with its column mapping resolved.
#[derive(Debug)]
pub struct Catalog {
    columns: HashMap<Field, usize>,
    meta_column: Option<usize>,
    rows: Vec<csv::StringRecord>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let catalog = Self::from_reader(File::open(path)?)?;
        debug!(path = %path.display(), rows = catalog.len(), "loaded catalog");
        Ok(catalog)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        // Ragged rows load; their missing cells surface as per-row errors.
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let headers = reader.headers()?.clone();

        let mut columns = HashMap::new();
        let mut meta_column = None;
        for (index, header) in headers.iter().enumerate() {
            if let Some(field) = Field::from_column(header) {
                // First matching column wins when aliases collide.
                columns.entry(field).or_insert(index);
            } else if META_COLUMNS.contains(&header.trim().to_ascii_lowercase().as_str()) {
                meta_column.get_or_insert(index);
            }
        }

        if meta_column.is_none() {
            if let Some(missing) = Field::ALL.into_iter().find(|f| !columns.contains_key(f)) {
                return Err(CatalogError::MissingColumn(missing.name()));
            }
        }

        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            columns,
            meta_column,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Normalize the row at `index` (0-based). Errors report 1-based rows.
    pub fn record(&self, index: usize) -> Result<GalaxyRecord, CatalogError> {
        let row_number = index + 1;
        let row = self.rows.get(index).ok_or(CatalogError::Empty)?;
        let values = self.raw_values(row, row_number)?;
        build_record(&values, row_number)
    }

    /// Every row with its 1-based row number.
    pub fn records(
        &self,
    ) -> impl Iterator<Item = (usize, Result<GalaxyRecord, CatalogError>)> + '_ {
        (0..self.rows.len()).map(|index| (index + 1, self.record(index)))
    }

    /// Pick one row uniformly at random.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Result<GalaxyRecord, CatalogError> {
        if self.rows.is_empty() {
            return Err(CatalogError::Empty);
        }
        let index = rng.random_range(0..self.rows.len());
        info!(row = index + 1, of = self.rows.len(), "selected catalog row");
        self.record(index)
    }

    fn raw_values(
        &self,
        row: &csv::StringRecord,
        row_number: usize,
    ) -> Result<HashMap<Field, RawValue>, CatalogError> {
        let mut values = HashMap::new();

        if let Some(blob) = self.meta_column.and_then(|col| row.get(col)) {
            if !blob.is_empty() {
                values.extend(parse_meta_data(blob, row_number)?);
            }
        }

        for (field, col) in &self.columns {
            if let Some(cell) = row.get(*col).filter(|c| !c.is_empty()) {
                values.insert(*field, RawValue::Cell(cell.to_string()));
            }
        }

        Ok(values)
    }
}

impl RecordSource for Catalog {
    fn next_record<R: Rng>(&self, rng: &mut R) -> Result<GalaxyRecord, CatalogError> {
        self.sample(rng)
    }
}

fn parse_meta_data(blob: &str, row: usize) -> Result<Vec<(Field, RawValue)>, CatalogError> {
    let object: serde_json::Map<String, Value> =
        serde_json::from_str(blob).map_err(|err| CatalogError::MetaData {
            row,
            reason: err.to_string(),
        })?;

    let mut values = Vec::new();
    for (key, value) in object {
        let Some(field) = Field::from_column(&key) else {
            continue;
        };
        let raw = match value {
            Value::Null => continue,
            Value::String(s) => RawValue::Text(s.trim().to_string()),
            Value::Number(n) => match n.as_f64() {
                Some(f) => RawValue::Number(f),
                None => {
                    return Err(CatalogError::MetaData {
                        row,
                        reason: format!("{key} is out of range"),
                    });
                }
            },
            other => {
                return Err(CatalogError::MetaData {
                    row,
                    reason: format!("{key} has unsupported value {other}"),
                });
            }
        };
        values.push((field, raw));
    }
    Ok(values)
}

// =============================================================================
// Field interpretation
// =============================================================================

fn lookup<'a>(
    values: &'a HashMap<Field, RawValue>,
    field: Field,
    row: usize,
) -> Result<&'a RawValue, CatalogError> {
    values.get(&field).ok_or(CatalogError::MissingField {
        row,
        field: field.name(),
    })
}

fn text(
    values: &HashMap<Field, RawValue>,
    field: Field,
    row: usize,
) -> Result<String, CatalogError> {
    match lookup(values, field, row)? {
        RawValue::Cell(s) | RawValue::Text(s) => Ok(s.clone()),
        RawValue::Number(n) => Err(CatalogError::InvalidField {
            row,
            field: field.name(),
            value: n.to_string(),
        }),
    }
}

fn number(
    values: &HashMap<Field, RawValue>,
    field: Field,
    row: usize,
) -> Result<f64, CatalogError> {
    match lookup(values, field, row)? {
        RawValue::Number(n) => Ok(*n),
        RawValue::Cell(s) | RawValue::Text(s) => {
            s.parse::<f64>().map_err(|_| CatalogError::InvalidField {
                row,
                field: field.name(),
                value: s.clone(),
            })
        }
    }
}

fn redshift(values: &HashMap<Field, RawValue>, row: usize) -> Result<Redshift, CatalogError> {
    let raw = lookup(values, Field::Redshift, row)?;
    if let RawValue::Cell(s) | RawValue::Text(s) = raw {
        // "nan", "inf" and friends parse as floats but are not redshifts.
        if s.parse::<f64>().is_ok_and(|z| !z.is_finite()) {
            return Err(CatalogError::InvalidField {
                row,
                field: Field::Redshift.name(),
                value: s.clone(),
            });
        }
    }
    Ok(match raw {
        RawValue::Number(n) => Redshift::Numeric(*n),
        RawValue::Text(s) => Redshift::Formatted(s.clone()),
        RawValue::Cell(s) => match s.parse::<f64>() {
            Ok(z) => Redshift::Numeric(z),
            Err(_) => Redshift::Formatted(s.clone()),
        },
    })
}

fn build_record(
    values: &HashMap<Field, RawValue>,
    row: usize,
) -> Result<GalaxyRecord, CatalogError> {
    Ok(GalaxyRecord {
        redshift: redshift(values, row)?,
        right_ascension: number(values, Field::RightAscension, row)?,
        declination: number(values, Field::Declination, row)?,
        classification: text(values, Field::Classification, row)?,
        survey_name: text(values, Field::Survey, row)?,
        project_name: text(values, Field::Project, row)?,
        lookback_time: number(values, Field::Lookback, row)?,
        image_url: text(values, Field::ImageUrl, row)?,
    })
}
