//! Records as they move through the ingestion pipeline
//!
//! Collector output ([`RawRecord`]) is provider-native and loosely typed. The
//! normalizer turns it into a [`NormalizedRecord`], the resolver attaches
//! catalog ids to produce an [`ObservationDraft`], and the upsert engine
//! writes the draft.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::catalog::{CountryId, IndicatorId, IndicatorMetadata};

use super::runs::{RunId, RunStatus};

/// Provider flags carried alongside a value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFlags {
    #[serde(default)]
    pub estimated: bool,
}

/// One provider-native record, exactly as a collector produced it
///
/// `year` and `value` stay as raw JSON so that every provider quirk (numeric
/// strings, placeholders like `".."`) reaches the normalizer untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, alias = "country")]
    pub country_code: Option<String>,
    #[serde(default, alias = "indicator")]
    pub indicator_code: Option<String>,
    #[serde(default)]
    pub year: Value,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub flags: RecordFlags,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub metadata: Option<IndicatorMetadata>,
}

impl RawRecord {
    pub fn new(
        country_code: &str,
        indicator_code: &str,
        year: impl Into<Value>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            country_code: Some(country_code.to_string()),
            indicator_code: Some(indicator_code.to_string()),
            year: year.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn estimated(mut self) -> Self {
        self.flags.estimated = true;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_metadata(mut self, metadata: IndicatorMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A validated record, still keyed by external codes
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub country_iso3: String,
    pub indicator_code: String,
    pub year: i32,
    pub value: Option<f64>,
    pub is_estimated: bool,
    pub source_note: Option<String>,
    pub metadata: Option<IndicatorMetadata>,
}

/// Logical key of an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservationKey {
    pub country_id: CountryId,
    pub indicator_id: IndicatorId,
    pub year: i32,
}

/// A record ready to be written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationDraft {
    pub country_id: CountryId,
    pub indicator_id: IndicatorId,
    pub year: i32,
    pub value: Option<f64>,
    pub is_estimated: bool,
    pub source_note: Option<String>,
}

impl ObservationDraft {
    pub fn key(&self) -> ObservationKey {
        ObservationKey {
            country_id: self.country_id,
            indicator_id: self.indicator_id,
            year: self.year,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Why a single record was dropped from a batch
///
/// Skips are counted and logged; they never end a run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkipReason {
    #[error("bad year: {0}")]
    BadYear(String),

    #[error("unparsable value: {0}")]
    UnparsableValue(String),

    #[error("missing country code")]
    MissingCountryCode,

    #[error("missing indicator code")]
    MissingIndicatorCode,

    #[error("unknown country: {0}")]
    UnknownCountry(String),

    #[error("unknown parent category '{parent}' for category '{category}'")]
    UnknownParentCategory { category: String, parent: String },

    #[error("malformed record: {0}")]
    MalformedRecord(String),
}

impl SkipReason {
    /// Stable label used for tallies and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            SkipReason::BadYear(_) => "bad_year",
            SkipReason::UnparsableValue(_) => "unparsable_value",
            SkipReason::MissingCountryCode => "missing_country_code",
            SkipReason::MissingIndicatorCode => "missing_indicator_code",
            SkipReason::UnknownCountry(_) => "unknown_country",
            SkipReason::UnknownParentCategory { .. } => "unknown_parent_category",
            SkipReason::MalformedRecord(_) => "malformed_record",
        }
    }
}

/// Number of skip messages kept verbatim for the run's error summary
pub const MAX_SKIP_SAMPLES: usize = 10;

/// Per-run skip counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkipTally {
    total: u64,
    by_reason: BTreeMap<String, u64>,
    samples: Vec<String>,
}

impl SkipTally {
    pub fn record(&mut self, reason: &SkipReason) {
        self.total += 1;
        *self.by_reason.entry(reason.kind().to_string()).or_default() += 1;
        if self.samples.len() < MAX_SKIP_SAMPLES {
            self.samples.push(reason.to_string());
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn by_reason(&self) -> &BTreeMap<String, u64> {
        &self.by_reason
    }

    pub fn count(&self, kind: &str) -> u64 {
        self.by_reason.get(kind).copied().unwrap_or(0)
    }

    /// One-line description stored on the run, `None` when nothing was skipped
    pub fn summary(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let counts = self
            .by_reason
            .iter()
            .map(|(kind, n)| format!("{kind}={n}"))
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!(
            "skipped {} record(s) ({}); first errors: {}",
            self.total,
            counts,
            self.samples.join(" | ")
        ))
    }
}

/// A request to ingest one source over an inclusive year range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub source_code: String,
    pub start_year: i32,
    pub end_year: i32,
}

impl IngestRequest {
    pub fn new(source_code: &str, start_year: i32, end_year: i32) -> Self {
        Self {
            source_code: source_code.trim().to_uppercase(),
            start_year,
            end_year,
        }
    }
}

impl fmt::Display for IngestRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}-{}", self.source_code, self.start_year, self.end_year)
    }
}

/// Outcome of one ingestion task
///
/// Produced for successful and failed runs alike, so callers always see how
/// far a run got.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub source_code: String,
    pub status: RunStatus,
    /// Distinct observation keys written by this run
    pub records_processed: u64,
    pub records_skipped: u64,
    pub skips_by_reason: BTreeMap<String, u64>,
    /// Upsert calls issued, including repeated writes of the same key
    pub upserts: u64,
    pub inserted: u64,
    pub updated: u64,
    pub fetch_attempts: u32,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub error: Option<String>,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}
