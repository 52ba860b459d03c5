//! Structured extraction: JSON objects, arrays of rows, and table rows.

use std::sync::LazyLock;

use boxtrack_container_models::LocationType;
use boxtrack_normalize_models::{ExtractionOutcome, ParsedItem, RawContent};
use regex::Regex;
use serde_json::{Map, Value};

use super::patterns::find_known_carrier;
use super::{Extractor, fill_missing, has_signal};
use crate::detect::{body_text, content_text, nested_rows};
use crate::fields::{Field, normalize_key, resolve_field};
use crate::location::infer_location_type;
use crate::parsing::parse_datetime;
use crate::status_mapping::map_status;

static DISTANCE_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(-?\d[\d\s\x{a0}]*(?:[.,]\d+)?)\s*(?i:км|km|kilometers|километр\w*)?\s*$")
        .expect("valid regex")
});

impl Extractor<'_> {
    /// Extracts one item per row. Rows that are strings go through the
    /// free-text extractor.
    pub(super) fn extract_rows(&self, rows: &[Value]) -> ExtractionOutcome {
        let mut outcome = ExtractionOutcome::default();

        for (i, row) in rows.iter().enumerate() {
            let n = i + 1;
            match row {
                Value::Object(map) => {
                    let mut row_outcome = self.extract_map(map);
                    outcome.items.append(&mut row_outcome.items);
                    for error in row_outcome.errors {
                        outcome.errors.push(format!("Row {n} could not be parsed: {error}"));
                    }
                    for warning in row_outcome.warnings {
                        outcome.warnings.push(format!("Row {n}: {warning}"));
                    }
                }
                Value::String(text) => {
                    let mut row_outcome = self.extract_text(text);
                    outcome.items.append(&mut row_outcome.items);
                    for error in row_outcome.errors {
                        outcome.errors.push(format!("Row {n} could not be parsed: {error}"));
                    }
                    for warning in row_outcome.warnings {
                        outcome.warnings.push(format!("Row {n}: {warning}"));
                    }
                }
                _ => outcome.errors.push(format!("Row {n} could not be parsed")),
            }
        }

        outcome
    }

    /// Extracts from a single object: a row, a wrapper around nested rows,
    /// or a message with a text body plus side fields.
    pub(super) fn extract_map(&self, map: &Map<String, Value>) -> ExtractionOutcome {
        let keyed = keyed_field_count(map);

        if keyed < 2 {
            if let Some(rows) = nested_rows(map) {
                return self.extract_rows(rows);
            }
            if let Some(body) = body_text(map) {
                return self.extract_mixed(map, body);
            }
        }

        let mut outcome = ExtractionOutcome::default();
        let item = self.row_item(map, &mut outcome.warnings);
        if has_signal(&item) {
            outcome.items.push(item);
            return outcome;
        }

        // No usable keys; the values may still read as a message.
        let items = self.scan_text(&content_text(&RawContent::Object(map.clone())));
        if items.is_empty() {
            outcome.errors.push("no recognizable fields".to_string());
        } else {
            outcome.items = items;
        }
        outcome
    }

    /// A text body interpreted by the free-text extractor, with gaps
    /// filled from the object's other fields.
    fn extract_mixed(&self, map: &Map<String, Value>, body: &str) -> ExtractionOutcome {
        let mut outcome = ExtractionOutcome::default();
        let fields = self.row_item(map, &mut outcome.warnings);
        let mut items = self.scan_text(body);

        if items.is_empty() {
            if has_signal(&fields) {
                items.push(fields);
            } else {
                outcome.errors.push("no recognizable fields".to_string());
            }
        } else {
            for item in &mut items {
                fill_missing(item, &fields);
            }
            if items.iter().any(|item| item.container_number.is_none()) {
                outcome
                    .warnings
                    .push("No container number found in message".to_string());
            }
        }

        outcome.items = items;
        outcome
    }

    /// Maps the object's recognized keys onto an item. The first value
    /// seen for a field wins.
    pub(super) fn row_item(&self, map: &Map<String, Value>, warnings: &mut Vec<String>) -> ParsedItem {
        let mut item = ParsedItem {
            raw_fragment: Value::Object(map.clone()).to_string(),
            ..ParsedItem::default()
        };

        for (key, value) in map {
            let Some(field) = resolve_field(key) else {
                continue;
            };
            let Some(text) = scalar_text(value) else {
                continue;
            };
            self.apply_field(&mut item, field, key, &text, value, warnings);
        }

        if item.container_number.is_none() {
            item.container_number = map
                .values()
                .filter_map(Value::as_str)
                .find_map(|s| self.find_identifiers(s).into_iter().next())
                .map(|mention| mention.number);
        }

        item
    }

    fn apply_field(
        &self,
        item: &mut ParsedItem,
        field: Field,
        key: &str,
        text: &str,
        value: &Value,
        warnings: &mut Vec<String>,
    ) {
        match field {
            Field::Container if item.container_number.is_none() => {
                let result = self.identifiers.validate(text);
                item.container_number = Some(if result.is_valid {
                    result.container_number
                } else {
                    text.to_string()
                });
            }
            Field::Status if item.status_code.is_none() => {
                item.status_code = Some(map_status(text));
                item.status_text = Some(text.to_string());
            }
            Field::Location if item.location.is_none() => {
                item.location = Some(text.to_string());
                item.location_type = key_location_type(key).or_else(|| infer_location_type(text));
            }
            Field::Distance if item.distance_km.is_none() => {
                item.distance_km = distance_value(value);
                if item.distance_km.is_none() {
                    warnings.push(format!("Distance '{text}' is not a number"));
                }
            }
            Field::Eta if item.eta.is_none() => {
                item.eta = Some(self.normalize_date(text));
            }
            Field::UnloadEta if item.unload_eta.is_none() => {
                item.unload_eta = Some(self.normalize_date(text));
            }
            Field::EventTime if item.event_time.is_none() => {
                item.event_time = Some(
                    parse_datetime(text, self.reference_year)
                        .map_or_else(|| text.to_string(), |dt| dt.to_rfc3339()),
                );
            }
            Field::Origin if item.origin.is_none() => item.origin = Some(text.to_string()),
            Field::Destination if item.destination.is_none() => {
                item.destination = Some(text.to_string());
            }
            Field::Carrier if item.carrier_name.is_none() => {
                item.carrier_name = Some(text.to_string());
                item.carrier_type = find_known_carrier(text).map(|carrier| carrier.carrier_type);
            }
            Field::Comment if item.comment.is_none() => item.comment = Some(text.to_string()),
            Field::Source if item.source_info.is_none() => {
                item.source_info = Some(text.to_string());
            }
            _ => {}
        }
    }
}

fn keyed_field_count(map: &Map<String, Value>) -> usize {
    map.keys().filter(|key| resolve_field(key).is_some()).count()
}

/// Location type implied by the column name itself.
fn key_location_type(key: &str) -> Option<LocationType> {
    match normalize_key(key).as_str() {
        "station" | "станция" | "станциядислокации" | "текущаястанция" => {
            Some(LocationType::Station)
        }
        "port" | "порт" => Some(LocationType::Port),
        _ => None,
    }
}

/// Strings (trimmed, non-empty) and numbers; everything else is ignored.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn distance_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let caps = DISTANCE_VALUE.captures(s)?;
            let number: String = caps
                .get(1)?
                .as_str()
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| if c == ',' { '.' } else { c })
                .collect();
            number.parse::<f64>().ok().map(|f| f.round() as i64)
        }
        _ => None,
    }
}
