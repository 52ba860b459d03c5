//! Format classification.
//!
//! Assigns a [`FormatType`] to a raw input from its structure alone.
//! Branch confidences are fixed per decision path and never depend on
//! content length.

use std::sync::LazyLock;

use boxtrack_normalize_models::{
    DetectedFormat, FormatDetails, FormatType, InputHint, Language, RawContent, RawInput,
};
use boxtrack_reference::Gazetteer;
use regex::Regex;
use serde_json::{Map, Value};

use crate::fields::resolve_field;
use crate::location::infer_location_type;
use crate::parsing::find_date;
use crate::status_mapping::find_status;

const HINT_AGREES: f64 = 0.99;
const HINT_OVERRIDES: f64 = 0.95;
const ARRAY_CONFIDENCE: f64 = 0.9;
const PLAIN_TEXT_CONFIDENCE: f64 = 0.9;
const CSV_CONFIDENCE: f64 = 0.8;
const TABLE_OBJECT_CONFIDENCE: f64 = 0.8;
const GENERIC_OBJECT_CONFIDENCE: f64 = 0.7;

/// Lines after the first that must agree on the delimiter count.
const CSV_SAMPLE_LINES: usize = 4;
pub(crate) const CSV_DELIMITERS: &[char] = &[';', ',', '\t', '|'];

/// Leap year, so `29 февраля` counts as date-shaped.
const SHAPE_CHECK_YEAR: i32 = 2024;

/// Keys of a wrapper object that hold its rows.
pub const NESTED_ROW_KEYS: &[&str] = &["rows", "data", "items", "records"];

/// Keys of a wrapper object that hold a free-text body.
pub const BODY_KEYS: &[&str] = &["body", "text", "message"];

static CONTAINER_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z]{3}[A-Za-z0-9]\s?[0-9OILSB]{6,7}\b").expect("valid regex")
});

struct Shape {
    format_type: FormatType,
    confidence: f64,
    rows: usize,
}

impl Shape {
    const fn new(format_type: FormatType, confidence: f64, rows: usize) -> Self {
        Self {
            format_type,
            confidence,
            rows,
        }
    }
}

/// Classifies a raw input.
#[must_use]
pub fn detect(input: &RawInput, gazetteer: &Gazetteer) -> DetectedFormat {
    let shape = classify_content(&input.content);
    let text = content_text(&input.content);

    let (format_type, confidence) = match input.hint {
        Some(hint) => {
            let hinted = hinted_format(hint, shape.format_type, &input.content);
            let confidence = if hinted == shape.format_type {
                HINT_AGREES
            } else {
                HINT_OVERRIDES
            };
            (hinted, confidence)
        }
        None => (shape.format_type, shape.confidence),
    };

    let details = if format_type == FormatType::Unknown && text.trim().is_empty() {
        FormatDetails::default()
    } else {
        FormatDetails {
            has_container_number: CONTAINER_SHAPE.is_match(&text),
            has_status: find_status(&text).is_some(),
            has_date: find_date(&text, SHAPE_CHECK_YEAR).is_some(),
            has_location: gazetteer.find_in(&text).is_some()
                || infer_location_type(&text).is_some(),
            language: detect_language(&text),
            estimated_rows: shape.rows,
        }
    };

    log::debug!("detected {format_type} ({confidence:.2}), {} rows", details.estimated_rows);

    DetectedFormat {
        format_type,
        confidence,
        details,
    }
}

fn hinted_format(hint: InputHint, observed: FormatType, content: &RawContent) -> FormatType {
    match hint {
        InputHint::Text => FormatType::PlainText,
        InputHint::Csv => FormatType::CsvText,
        InputHint::Json | InputHint::Api => match observed {
            FormatType::JsonObject
            | FormatType::JsonArray
            | FormatType::TableRow
            | FormatType::TableRows
            | FormatType::Mixed => observed,
            _ => match content {
                RawContent::Array(_) => FormatType::JsonArray,
                RawContent::Object(_) | RawContent::Text(_) => FormatType::JsonObject,
            },
        },
        InputHint::Table => match observed {
            FormatType::TableRow | FormatType::TableRows | FormatType::CsvText => observed,
            _ => match content {
                RawContent::Array(_) => FormatType::TableRows,
                RawContent::Object(_) => FormatType::TableRow,
                RawContent::Text(_) => FormatType::CsvText,
            },
        },
    }
}

fn classify_content(content: &RawContent) -> Shape {
    match content {
        RawContent::Array(items) => classify_array(items),
        RawContent::Object(map) => classify_object(map),
        RawContent::Text(text) => classify_text(text),
    }
}

fn classify_text(text: &str) -> Shape {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Shape::new(FormatType::Unknown, 0.0, 0);
    }

    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && let Ok(value) = serde_json::from_str::<Value>(trimmed)
    {
        match value {
            Value::Array(items) => return classify_array(&items),
            Value::Object(map) => return classify_object(&map),
            _ => {}
        }
    }

    if let Some(delimiter) = csv_delimiter(trimmed) {
        let header = has_header(trimmed, delimiter);
        if header || rows_carry_one_container(trimmed) {
            let lines = trimmed.lines().filter(|l| !l.trim().is_empty()).count();
            return Shape::new(
                FormatType::CsvText,
                CSV_CONFIDENCE,
                lines - usize::from(header && lines > 1),
            );
        }
    }

    Shape::new(FormatType::PlainText, PLAIN_TEXT_CONFIDENCE, 1)
}

fn classify_array(items: &[Value]) -> Shape {
    let Some(first) = items.first() else {
        return Shape::new(FormatType::JsonArray, ARRAY_CONFIDENCE, 0);
    };

    if let Value::Object(map) = first
        && table_key_count(map) >= 2
    {
        return Shape::new(FormatType::TableRows, ARRAY_CONFIDENCE, items.len());
    }

    if items.iter().all(Value::is_string) {
        let joined = items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        if csv_delimiter(&joined).is_some() {
            return Shape::new(FormatType::CsvText, ARRAY_CONFIDENCE, items.len());
        }
    }

    Shape::new(FormatType::JsonArray, ARRAY_CONFIDENCE, items.len())
}

fn classify_object(map: &Map<String, Value>) -> Shape {
    if table_key_count(map) >= 2 {
        return Shape::new(FormatType::TableRow, TABLE_OBJECT_CONFIDENCE, 1);
    }

    if let Some(rows) = nested_rows(map) {
        return Shape::new(FormatType::TableRows, TABLE_OBJECT_CONFIDENCE, rows.len());
    }

    if body_text(map).is_some() {
        return Shape::new(FormatType::Mixed, GENERIC_OBJECT_CONFIDENCE, 1);
    }

    Shape::new(FormatType::JsonObject, GENERIC_OBJECT_CONFIDENCE, 1)
}

fn table_key_count(map: &Map<String, Value>) -> usize {
    map.keys().filter(|k| resolve_field(k).is_some()).count()
}

/// The nested row array of a wrapper object, if it has one.
#[must_use]
pub fn nested_rows(map: &Map<String, Value>) -> Option<&Vec<Value>> {
    map.iter()
        .find(|(key, value)| {
            NESTED_ROW_KEYS.contains(&key.to_lowercase().as_str()) && value.is_array()
        })
        .and_then(|(_, value)| value.as_array())
}

/// The free-text body of a wrapper object, if it has one.
#[must_use]
pub fn body_text(map: &Map<String, Value>) -> Option<&str> {
    map.iter()
        .find(|(key, value)| BODY_KEYS.contains(&key.to_lowercase().as_str()) && value.is_string())
        .and_then(|(_, value)| value.as_str())
}

/// Picks the CSV delimiter when the text is delimiter-shaped: a delimiter
/// occurs at least twice on the first line and its count stays within one
/// on the following lines. The most frequent qualifying delimiter wins.
pub(crate) fn csv_delimiter(text: &str) -> Option<char> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let first = lines.next()?;
    let sample: Vec<&str> = lines.take(CSV_SAMPLE_LINES).collect();

    CSV_DELIMITERS
        .iter()
        .rev()
        .copied()
        .filter(|&delimiter| {
            let count = first.matches(delimiter).count();
            count >= 2
                && sample
                    .iter()
                    .all(|line| line.matches(delimiter).count().abs_diff(count) <= 1)
        })
        .max_by_key(|&delimiter| first.matches(delimiter).count())
}

/// Whether the first line names at least one known column.
fn has_header(text: &str, delimiter: char) -> bool {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .is_some_and(|first| first.split(delimiter).any(|t| resolve_field(t).is_some()))
}

/// A headerless table row describes exactly one container, so prose that
/// lists several numbers between commas stays text.
fn rows_carry_one_container(text: &str) -> bool {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .all(|line| CONTAINER_SHAPE.find_iter(line).count() == 1)
}

fn detect_language(text: &str) -> Language {
    let (cyrillic, latin) = text.chars().fold((0usize, 0usize), |(cyr, lat), c| {
        if matches!(c, '\u{0400}'..='\u{04FF}') {
            (cyr + 1, lat)
        } else if c.is_ascii_alphabetic() {
            (cyr, lat + 1)
        } else {
            (cyr, lat)
        }
    });

    match (cyrillic, latin) {
        (0, 0) => Language::Unknown,
        (c, l) if c >= 2 * l => Language::Ru,
        (c, l) if l >= 2 * c => Language::En,
        _ => Language::Mixed,
    }
}

/// Flattens any content to searchable text: the text itself, or every
/// key and scalar value of a JSON structure separated by newlines.
#[must_use]
pub fn content_text(content: &RawContent) -> String {
    fn collect(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::String(s) => out.push(s.clone()),
            Value::Number(n) => out.push(n.to_string()),
            Value::Bool(_) | Value::Null => {}
            Value::Array(items) => items.iter().for_each(|item| collect(item, out)),
            Value::Object(map) => {
                for (key, value) in map {
                    out.push(key.clone());
                    collect(value, out);
                }
            }
        }
    }

    match content {
        RawContent::Text(text) => text.clone(),
        RawContent::Array(items) => {
            let mut out = Vec::new();
            items.iter().for_each(|item| collect(item, &mut out));
            out.join("\n")
        }
        RawContent::Object(map) => {
            let mut out = Vec::new();
            for (key, value) in map {
                out.push(key.clone());
                collect(value, &mut out);
            }
            out.join("\n")
        }
    }
}
