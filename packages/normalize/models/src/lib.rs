#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Data shapes flowing through the container status normalization pipeline.
//!
//! A [`RawInput`] is classified into a [`DetectedFormat`], split into
//! [`ParsedItem`]s, and each item is validated into a [`ValidationResult`]
//! whose [`ValidationOutcome`] carries the terminal
//! [`NormalizedStatusEvent`]. All values are created fresh per request and
//! never mutated once returned.

use boxtrack_container_models::{CarrierType, Location, LocationType, StatusCode};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

// ── Raw input ────────────────────────────────────────────────────────────

/// Caller-supplied hint about the input's format.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum InputHint {
    /// Free-form text (operator email, chat message)
    Text,
    /// JSON object or array
    Json,
    /// Delimited text
    Csv,
    /// A single table row or a list of rows
    Table,
    /// Payload from a partner API
    Api,
}

/// Optional context travelling with a raw input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputMetadata {
    /// Address the message was sent from.
    #[serde(default)]
    pub from_email: Option<String>,
    /// Email subject line.
    #[serde(default)]
    pub subject: Option<String>,
    /// Identifier of the reporting carrier.
    #[serde(default)]
    pub carrier_id: Option<String>,
    /// URL the payload was fetched from.
    #[serde(default)]
    pub source_url: Option<String>,
    /// When the payload was received.
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

/// The content of a raw input: text, a single object, or an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawContent {
    /// Free-form or delimited text.
    Text(String),
    /// An array of strings and/or objects.
    Array(Vec<serde_json::Value>),
    /// A single JSON object.
    Object(serde_json::Map<String, serde_json::Value>),
}

impl From<serde_json::Value> for RawContent {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) => Self::Array(items),
            serde_json::Value::Object(map) => Self::Object(map),
            other => Self::Text(other.to_string()),
        }
    }
}

/// A single unit of low-trust input to normalize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInput {
    /// The payload itself.
    pub content: RawContent,
    /// Optional format hint that short-circuits detection.
    #[serde(default)]
    pub hint: Option<InputHint>,
    /// Optional transport metadata.
    #[serde(default)]
    pub metadata: InputMetadata,
}

impl RawInput {
    /// Creates an un-hinted text input.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: RawContent::Text(content.into()),
            hint: None,
            metadata: InputMetadata::default(),
        }
    }

    /// Creates an un-hinted input from an arbitrary JSON value.
    #[must_use]
    pub fn json(value: serde_json::Value) -> Self {
        Self {
            content: RawContent::from(value),
            hint: None,
            metadata: InputMetadata::default(),
        }
    }

    /// Returns a copy of this input carrying the given hint.
    #[must_use]
    pub fn with_hint(mut self, hint: InputHint) -> Self {
        self.hint = Some(hint);
        self
    }

    /// Returns a copy of this input carrying the given metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: InputMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

// ── Format detection ─────────────────────────────────────────────────────

/// Structural format of a raw input.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FormatType {
    /// Free-form prose
    PlainText,
    /// A JSON object that is not a table row
    JsonObject,
    /// A JSON array of non-row values
    JsonArray,
    /// Delimited text
    CsvText,
    /// A single object with table-like keys
    TableRow,
    /// A list of row objects
    TableRows,
    /// An object wrapping a free-text body
    Mixed,
    /// Nothing recognizable
    Unknown,
}

/// Language the input text is predominantly written in.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Language {
    /// Russian (Cyrillic script)
    Ru,
    /// English (Latin script)
    En,
    /// Both scripts in comparable amounts
    Mixed,
    /// No letters to judge by
    Unknown,
}

/// Content signals observed while classifying an input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatDetails {
    /// A container-number-shaped token is present.
    pub has_container_number: bool,
    /// A status keyword is present.
    pub has_status: bool,
    /// Something date-shaped is present.
    pub has_date: bool,
    /// A location keyword or gazetteer name is present.
    pub has_location: bool,
    /// Predominant language.
    pub language: Language,
    /// Estimated number of rows (1 for prose and single objects).
    pub estimated_rows: usize,
}

impl Default for FormatDetails {
    fn default() -> Self {
        Self {
            has_container_number: false,
            has_status: false,
            has_date: false,
            has_location: false,
            language: Language::Unknown,
            estimated_rows: 0,
        }
    }
}

/// Result of classifying a raw input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedFormat {
    /// The assigned format tag.
    #[serde(rename = "type")]
    pub format_type: FormatType,
    /// Confidence in the assignment, in [0, 1].
    pub confidence: f64,
    /// Observed content signals.
    pub details: FormatDetails,
}

// ── Extraction ───────────────────────────────────────────────────────────

/// Candidate fields extracted from one container mention or one row.
///
/// Dates are kept as strings: ISO `YYYY-MM-DD` when the extractor could
/// parse them, otherwise the raw source text for the validator to judge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedItem {
    /// Container number as found, after typo repair when possible.
    pub container_number: Option<String>,
    /// Mapped status code, when a status token was found.
    pub status_code: Option<StatusCode>,
    /// The raw status token.
    pub status_text: Option<String>,
    /// Location text as found.
    pub location: Option<String>,
    /// Location type implied by context.
    pub location_type: Option<LocationType>,
    /// Remaining distance in kilometres.
    pub distance_km: Option<i64>,
    /// Estimated arrival date.
    pub eta: Option<String>,
    /// Estimated unloading date.
    pub unload_eta: Option<String>,
    /// When the reported operation happened.
    pub event_time: Option<String>,
    /// Route origin.
    pub origin: Option<String>,
    /// Route destination.
    pub destination: Option<String>,
    /// Carrier name.
    pub carrier_name: Option<String>,
    /// Carrier transport mode, when the carrier is known.
    pub carrier_type: Option<CarrierType>,
    /// Free-text attribution ("по данным РЖД").
    pub source_info: Option<String>,
    /// Operator comment.
    pub comment: Option<String>,
    /// The source fragment this item was extracted from.
    pub raw_fragment: String,
    /// Confidence in the extraction, in [0, 1].
    pub extraction_confidence: f64,
}

/// Items extracted from one raw input plus parse-level diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOutcome {
    /// Extracted candidate items.
    pub items: Vec<ParsedItem>,
    /// Parse errors (e.g. "row 3 could not be parsed").
    pub errors: Vec<String>,
    /// Parse warnings.
    pub warnings: Vec<String>,
}

// ── Identifier validation ────────────────────────────────────────────────

/// Structural breakdown of a shape-valid container number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierParts {
    /// Three-letter owner code.
    pub owner_code: String,
    /// Equipment category letter.
    pub category: char,
    /// Six-digit serial number.
    pub serial: String,
    /// Check digit as supplied.
    pub check_digit: u8,
    /// Check digit computed from the first ten characters.
    pub computed_check_digit: u8,
    /// Owner and category prefix is in the registry.
    pub owner_known: bool,
    /// Supplied check digit equals the computed one.
    pub check_digit_valid: bool,
    /// Category letter is one of U, J, Z.
    pub category_valid: bool,
}

/// Result of validating a candidate container number.
///
/// `is_valid` reflects shape only: a wrong check digit lowers confidence
/// but the number is still the intended container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierValidationResult {
    /// Shape matched after correction.
    pub is_valid: bool,
    /// Corrected container number (or the cleaned input on failure).
    pub container_number: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Structural breakdown, present when the shape matched.
    pub parts: Option<IdentifierParts>,
    /// Notes describing every correction applied.
    pub corrections: Vec<String>,
    /// Hard error when the shape did not match.
    pub error: Option<String>,
}

// ── Location resolution ──────────────────────────────────────────────────

/// Result of resolving a location mention against the gazetteer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationMatchResult {
    /// A location (registered or guessed) was identified.
    pub found: bool,
    /// The resolved or guessed location.
    pub location: Option<Location>,
    /// The location came from the gazetteer.
    pub registered: bool,
    /// The substring that produced the match.
    pub matched_text: Option<String>,
    /// Confidence in [0, 1].
    pub confidence: f64,
}

impl LocationMatchResult {
    /// A result for text that mentions no recognizable location.
    #[must_use]
    pub const fn not_found() -> Self {
        Self {
            found: false,
            location: None,
            registered: false,
            matched_text: None,
            confidence: 0.0,
        }
    }
}

// ── Normalized output ────────────────────────────────────────────────────

/// Channel a status report arrived through.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceChannel {
    /// Operator email
    Email,
    /// Other free text
    Text,
    /// JSON document
    Json,
    /// Delimited text
    Csv,
    /// Table rows
    Table,
    /// Partner API
    Api,
}

/// Location attached to a normalized event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLocation {
    /// Canonical name, or the title-cased input when unregistered.
    pub name: String,
    /// Location type, when known or inferable.
    pub location_type: Option<LocationType>,
    /// The name is in the gazetteer.
    pub registered: bool,
    /// Administrative region.
    pub region: Option<String>,
    /// Country.
    pub country: Option<String>,
}

/// Canonical record of what container, what status, where, and when.
///
/// This is the only type handed to persistence and notification
/// collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedStatusEvent {
    /// Container number. Always present on valid records; partial records
    /// may lack it.
    pub container_number: Option<String>,
    /// Canonical status code.
    pub status_code: StatusCode,
    /// Human status text.
    pub status_text: String,
    /// Where the container is.
    pub location: Option<ResolvedLocation>,
    /// Remaining distance to destination in kilometres.
    pub distance_km: Option<u32>,
    /// Estimated arrival date.
    pub eta: Option<NaiveDate>,
    /// Estimated unloading date.
    pub unload_eta: Option<NaiveDate>,
    /// When the reported operation happened.
    pub event_time: Option<DateTime<Utc>>,
    /// Channel the report arrived through.
    pub source_channel: SourceChannel,
    /// The raw source fragment.
    pub raw_text: String,
    /// Route origin.
    pub origin: Option<String>,
    /// Route destination.
    pub destination: Option<String>,
    /// Carrier name.
    pub carrier_name: Option<String>,
    /// Overall confidence in [0, 1].
    pub confidence: f64,
}

// ── Validation ───────────────────────────────────────────────────────────

/// Sub-scores that feed the final confidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationScores {
    /// Identifier validator confidence (0 when missing or invalid).
    pub identifier: f64,
    /// Status mapping confidence.
    pub status: f64,
    /// Location resolution confidence.
    pub location: f64,
    /// Fraction of key fields present.
    pub completeness: f64,
    /// Cross-field consistency (1.0 when nothing conflicts).
    pub consistency: f64,
}

/// Outcome of validating one parsed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationOutcome {
    /// Passed validation.
    Valid(NormalizedStatusEvent),
    /// Failed validation but still carries usable signal.
    Partial(NormalizedStatusEvent),
    /// Nothing worth keeping.
    Rejected,
}

/// Validation outcome plus the diagnostics and scores behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Valid, partial, or rejected.
    pub outcome: ValidationOutcome,
    /// Hard errors.
    pub errors: Vec<String>,
    /// Soft warnings.
    pub warnings: Vec<String>,
    /// Sub-scores.
    pub scores: ValidationScores,
    /// Final confidence in [0, 1].
    pub confidence: f64,
}

impl ValidationResult {
    /// Returns `true` when the item passed validation.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.outcome, ValidationOutcome::Valid(_))
    }

    /// Returns `true` when only a partial record could be salvaged.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        matches!(self.outcome, ValidationOutcome::Partial(_))
    }

    /// The validated event, if any.
    #[must_use]
    pub const fn event(&self) -> Option<&NormalizedStatusEvent> {
        match &self.outcome {
            ValidationOutcome::Valid(event) => Some(event),
            ValidationOutcome::Partial(_) | ValidationOutcome::Rejected => None,
        }
    }

    /// The salvaged partial record, if any.
    #[must_use]
    pub const fn partial_data(&self) -> Option<&NormalizedStatusEvent> {
        match &self.outcome {
            ValidationOutcome::Partial(event) => Some(event),
            ValidationOutcome::Valid(_) | ValidationOutcome::Rejected => None,
        }
    }
}

// ── Pipeline results ─────────────────────────────────────────────────────

/// A parsed item together with its validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedItem {
    /// What the extractor produced.
    pub parsed: ParsedItem,
    /// What the validator concluded.
    pub validation: ValidationResult,
}

/// Overall outcome of one raw input.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum InputOutcome {
    /// At least one item validated.
    Success,
    /// No item validated but at least one partial record was salvaged.
    Partial,
    /// Nothing usable.
    Failed,
}

/// Everything the pipeline produced for one raw input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    /// How the input was classified.
    pub format: DetectedFormat,
    /// Per-item extraction and validation.
    pub items: Vec<ProcessedItem>,
    /// Parse errors plus per-item errors (prefixed with the item index).
    pub errors: Vec<String>,
    /// Parse warnings plus per-item warnings (prefixed with the item index).
    pub warnings: Vec<String>,
    /// Overall confidence in [0, 1].
    pub confidence: f64,
}

impl PipelineResult {
    /// Iterates over validated events.
    pub fn events(&self) -> impl Iterator<Item = &NormalizedStatusEvent> {
        self.items.iter().filter_map(|item| item.validation.event())
    }

    /// Iterates over salvaged partial records.
    pub fn partial_events(&self) -> impl Iterator<Item = &NormalizedStatusEvent> {
        self.items
            .iter()
            .filter_map(|item| item.validation.partial_data())
    }

    /// Number of validated items.
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.items.iter().filter(|i| i.validation.is_valid()).count()
    }

    /// Number of partial items.
    #[must_use]
    pub fn partial_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.validation.is_partial())
            .count()
    }

    /// Number of rejected items.
    #[must_use]
    pub fn rejected_count(&self) -> usize {
        self.items.len() - self.valid_count() - self.partial_count()
    }

    /// Classifies the input as success, partial, or failed.
    #[must_use]
    pub fn outcome(&self) -> InputOutcome {
        if self.valid_count() > 0 {
            InputOutcome::Success
        } else if self.partial_count() > 0 {
            InputOutcome::Partial
        } else {
            InputOutcome::Failed
        }
    }
}

/// Counts over a batch of raw inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Number of inputs.
    pub total: usize,
    /// Inputs with at least one valid item.
    pub succeeded: usize,
    /// Inputs with only partial items.
    pub partial: usize,
    /// Inputs with nothing usable.
    pub failed: usize,
    /// Every error from every input, prefixed with the input index.
    pub errors: Vec<String>,
}

/// Results for a batch; `results[i]` corresponds to the i-th input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// Per-input results in input order.
    pub results: Vec<PipelineResult>,
    /// Aggregated counts.
    pub summary: BatchSummary,
}
