//! Delimited text (CSV, TSV, `;`- and `|`-separated tables).

use boxtrack_normalize_models::{ExtractionOutcome, ParsedItem};
use serde_json::{Map, Value};

use super::{Extractor, has_signal};
use crate::detect::CSV_DELIMITERS;
use crate::fields::resolve_field;
use crate::parsing::{parse_date, to_iso};
use crate::status_mapping::{canonical_status, find_status};

impl Extractor<'_> {
    /// Extracts one item per data row. A first row naming any known
    /// column is a header; without one, columns are guessed per value.
    pub(super) fn extract_csv(&self, text: &str) -> ExtractionOutcome {
        let mut outcome = ExtractionOutcome::default();
        let text = text.trim();
        let Some(first_line) = text.lines().map(str::trim).find(|line| !line.is_empty()) else {
            outcome.errors.push("Empty CSV input".to_string());
            return outcome;
        };

        let delimiter = most_frequent_delimiter(first_line);
        let has_header = first_line
            .split(delimiter)
            .any(|token| resolve_field(token).is_some());
        let Ok(delimiter_byte) = u8::try_from(delimiter) else {
            outcome.errors.push(format!("Unsupported delimiter {delimiter:?}"));
            return outcome;
        };

        log::debug!("csv: delimiter {delimiter:?}, header={has_header}");

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter_byte)
            .has_headers(has_header)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers = if has_header {
            match reader.headers() {
                Ok(headers) => Some(headers.clone()),
                Err(e) => {
                    outcome.errors.push(format!("CSV header could not be parsed: {e}"));
                    return outcome;
                }
            }
        } else {
            None
        };

        let separator = delimiter.to_string();
        let mut rows = 0;
        for (i, record) in reader.records().enumerate() {
            let n = i + 1;
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    outcome.errors.push(format!("Row {n} could not be parsed: {e}"));
                    continue;
                }
            };
            if record.iter().all(str::is_empty) {
                continue;
            }
            rows += 1;

            let values: Vec<&str> = record.iter().collect();
            let raw_fragment = values.join(separator.as_str());

            let item = match &headers {
                Some(headers) => {
                    let mut map = Map::new();
                    for (header, value) in headers.iter().zip(values.iter()) {
                        if !value.is_empty() && !map.contains_key(header) {
                            map.insert(header.to_string(), Value::String((*value).to_string()));
                        }
                    }
                    let mut warnings = Vec::new();
                    let item = self.row_item(&map, &mut warnings);
                    outcome
                        .warnings
                        .extend(warnings.into_iter().map(|w| format!("Row {n}: {w}")));
                    item
                }
                None => self.positional_item(&values),
            };

            if has_signal(&item) {
                outcome.items.push(ParsedItem {
                    raw_fragment,
                    ..item
                });
            } else {
                outcome
                    .errors
                    .push(format!("Row {n} could not be parsed: no recognizable fields"));
            }
        }

        if rows == 0 {
            outcome.errors.push("CSV input has no data rows".to_string());
        }

        outcome
    }

    /// Guesses what each value of a headerless row is. The first value
    /// left over is the location; the rest become the comment.
    fn positional_item(&self, values: &[&str]) -> ParsedItem {
        let mut item = ParsedItem::default();
        let mut rest = Vec::new();

        for &value in values.iter().filter(|value| !value.is_empty()) {
            if item.container_number.is_none()
                && let Some(mention) = self.find_identifiers(value).into_iter().next()
            {
                item.container_number = Some(mention.number);
            } else if item.status_code.is_none()
                && let Some(code) = canonical_status(value).or_else(|| find_status(value))
            {
                item.status_code = Some(code);
                item.status_text = Some(value.to_string());
            } else if item.distance_km.is_none()
                && value.chars().all(|c| c.is_ascii_digit())
                && let Ok(distance) = value.parse()
            {
                item.distance_km = Some(distance);
            } else if item.eta.is_none()
                && let Some(date) = parse_date(value, self.reference_year)
            {
                item.eta = Some(to_iso(date));
            } else {
                rest.push(value);
            }
        }

        if let Some((location, comment)) = rest.split_first() {
            item.location = Some((*location).to_string());
            if !comment.is_empty() {
                item.comment = Some(comment.join(", "));
            }
        }

        item
    }
}

/// Ties go to the delimiter listed first in [`CSV_DELIMITERS`].
fn most_frequent_delimiter(line: &str) -> char {
    CSV_DELIMITERS
        .iter()
        .rev()
        .copied()
        .max_by_key(|&delimiter| line.matches(delimiter).count())
        .unwrap_or(',')
}
