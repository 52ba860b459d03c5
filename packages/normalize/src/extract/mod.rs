//! Field extraction.
//!
//! Turns a classified raw input into candidate [`ParsedItem`]s: one per
//! distinct container mentioned in free text, or one per row of
//! structured input. Parse problems are collected in the outcome and never
//! abort sibling items.

mod delimited;
pub mod patterns;
mod structured;
mod text;

use boxtrack_normalize_models::{
    DetectedFormat, ExtractionOutcome, FormatType, ParsedItem, RawContent, RawInput,
};
use serde_json::Value;

use crate::config::ExtractionScoring;
use crate::detect::content_text;
use crate::identifier::IdentifierValidator;
use crate::location::LocationResolver;

/// Extracts candidate fields from raw inputs.
#[derive(Debug, Clone, Copy)]
pub struct Extractor<'a> {
    identifiers: IdentifierValidator<'a>,
    locations: LocationResolver<'a>,
    scoring: &'a ExtractionScoring,
    /// Year assumed for month-name dates written without one.
    reference_year: i32,
}

impl<'a> Extractor<'a> {
    #[must_use]
    pub const fn new(
        identifiers: IdentifierValidator<'a>,
        locations: LocationResolver<'a>,
        scoring: &'a ExtractionScoring,
        reference_year: i32,
    ) -> Self {
        Self {
            identifiers,
            locations,
            scoring,
            reference_year,
        }
    }

    /// Extracts every item from `input` according to its detected format.
    #[must_use]
    pub fn extract(&self, input: &RawInput, format: &DetectedFormat) -> ExtractionOutcome {
        let subject = input.metadata.subject.as_deref();
        let mut outcome = match format.format_type {
            FormatType::Unknown => match &input.content {
                RawContent::Text(text) if text.trim().is_empty() => ExtractionOutcome {
                    errors: vec!["Empty input".to_string()],
                    ..ExtractionOutcome::default()
                },
                content => self.extract_text_with_subject(&content_text(content), subject),
            },
            FormatType::PlainText => match &input.content {
                RawContent::Text(text) => self.extract_text_with_subject(text, subject),
                content => self.extract_text_with_subject(&content_text(content), subject),
            },
            FormatType::CsvText => self.extract_csv_content(&input.content),
            FormatType::JsonObject
            | FormatType::JsonArray
            | FormatType::TableRow
            | FormatType::TableRows
            | FormatType::Mixed => self.extract_structured(&input.content),
        };

        for item in &mut outcome.items {
            item.extraction_confidence = self.score(item);
        }

        log::debug!(
            "extracted {} items ({} errors, {} warnings) from {}",
            outcome.items.len(),
            outcome.errors.len(),
            outcome.warnings.len(),
            format.format_type
        );

        outcome
    }

    fn extract_csv_content(&self, content: &RawContent) -> ExtractionOutcome {
        match content {
            RawContent::Text(text) => self.extract_csv(text),
            RawContent::Array(items) => {
                let mut errors = Vec::new();
                let lines: Vec<&str> = items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, item)| {
                        let line = item.as_str();
                        if line.is_none() {
                            errors.push(format!("Row {} could not be parsed: not a string", i + 1));
                        }
                        line
                    })
                    .collect();
                let mut outcome = self.extract_csv(&lines.join("\n"));
                errors.append(&mut outcome.errors);
                outcome.errors = errors;
                outcome
            }
            RawContent::Object(_) => self.extract_csv(&content_text(content)),
        }
    }

    fn extract_structured(&self, content: &RawContent) -> ExtractionOutcome {
        match content {
            RawContent::Array(rows) => self.extract_rows(rows),
            RawContent::Object(map) => self.extract_map(map),
            RawContent::Text(text) => match serde_json::from_str::<Value>(text.trim()) {
                Ok(Value::Array(rows)) => self.extract_rows(&rows),
                Ok(Value::Object(map)) => self.extract_map(&map),
                Ok(_) => {
                    let mut outcome = self.extract_text(text);
                    outcome
                        .errors
                        .insert(0, "Content is not a JSON object or array".to_string());
                    outcome
                }
                Err(e) => {
                    let mut outcome = self.extract_text(text);
                    outcome
                        .errors
                        .insert(0, format!("Content is not valid JSON: {e}"));
                    outcome
                }
            },
        }
    }

    /// Additive per-field confidence, capped at 1.
    fn score(&self, item: &ParsedItem) -> f64 {
        let s = self.scoring;
        let mut confidence = 0.0;

        if item.container_number.is_some() {
            confidence += s.identifier;
        }
        if item.status_code.is_some_and(|code| code.is_known()) {
            confidence += s.known_status;
        }
        if let Some(location) = &item.location {
            confidence += if self.locations.resolve(location).registered {
                s.registered_location
            } else {
                s.unregistered_location
            };
        }
        if item.eta.is_some() {
            confidence += s.eta;
        }
        if item.distance_km.is_some() {
            confidence += s.distance;
        }

        confidence.clamp(0.0, 1.0)
    }
}

/// Copies every field `target` lacks from `source`.
fn fill_missing(target: &mut ParsedItem, source: &ParsedItem) {
    fn take<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
        if target.is_none() {
            target.clone_from(source);
        }
    }

    take(&mut target.container_number, &source.container_number);
    if target.status_code.is_none() {
        target.status_code = source.status_code;
        target.status_text.clone_from(&source.status_text);
    }
    if target.location.is_none() {
        target.location.clone_from(&source.location);
        target.location_type = source.location_type;
    }
    take(&mut target.distance_km, &source.distance_km);
    take(&mut target.eta, &source.eta);
    take(&mut target.unload_eta, &source.unload_eta);
    take(&mut target.event_time, &source.event_time);
    take(&mut target.origin, &source.origin);
    take(&mut target.destination, &source.destination);
    if target.carrier_name.is_none() {
        target.carrier_name.clone_from(&source.carrier_name);
        target.carrier_type = source.carrier_type;
    }
    take(&mut target.source_info, &source.source_info);
    take(&mut target.comment, &source.comment);
}

/// Whether an item carries anything worth validating.
const fn has_signal(item: &ParsedItem) -> bool {
    item.container_number.is_some() || item.status_code.is_some() || item.location.is_some()
}

#[cfg(test)]
pub(crate) mod test_support {
    use boxtrack_reference::ReferenceData;

    use crate::config::ScoringConfig;
    use crate::identifier::IdentifierValidator;
    use crate::location::LocationResolver;

    use super::Extractor;

    pub struct Fixture {
        pub reference: ReferenceData,
        pub scoring: ScoringConfig,
    }

    impl Fixture {
        pub fn builtin() -> Self {
            Self {
                reference: ReferenceData::builtin(),
                scoring: ScoringConfig::default(),
            }
        }

        pub fn extractor(&self) -> Extractor<'_> {
            Extractor::new(
                IdentifierValidator::new(&self.reference.owners, &self.scoring.identifier),
                LocationResolver::new(&self.reference.gazetteer, &self.scoring.location),
                &self.scoring.extraction,
                2025,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use boxtrack_container_models::StatusCode;
    use boxtrack_normalize_models::InputHint;
    use serde_json::json;

    use super::test_support::Fixture;
    use super::*;
    use crate::detect::detect;

    fn run(fixture: &Fixture, input: &RawInput) -> ExtractionOutcome {
        let format = detect(input, &fixture.reference.gazetteer);
        fixture.extractor().extract(input, &format)
    }

    #[test]
    fn scenario_a_operator_email() {
        let fixture = Fixture::builtin();
        let outcome = run(
            &fixture,
            &RawInput::text(
                "Контейнер MSCU1234560 на станции Гончарово, 1857 км до Иня-Восточная. ETA 04.12.2025",
            ),
        );

        assert_eq!(outcome.items.len(), 1);
        let item = &outcome.items[0];
        assert_eq!(item.container_number.as_deref(), Some("MSCU1234560"));
        assert_eq!(item.status_code, Some(StatusCode::OnRail));
        assert_eq!(item.location.as_deref(), Some("Гончарово"));
        assert_eq!(item.distance_km, Some(1857));
        assert_eq!(item.eta.as_deref(), Some("2025-12-04"));
        assert_eq!(item.destination.as_deref(), Some("Иня-Восточная"));
        assert!((item.extraction_confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_b_csv_with_header() {
        let fixture = Fixture::builtin();
        let outcome = run(
            &fixture,
            &RawInput::text("containerNumber;status;location\nMSKU1111110;ON_RAIL;Новосибирск"),
        );

        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(outcome.items.len(), 1);
        let item = &outcome.items[0];
        assert_eq!(item.container_number.as_deref(), Some("MSKU1111110"));
        assert_eq!(item.status_code, Some(StatusCode::OnRail));
        assert_eq!(item.location.as_deref(), Some("Новосибирск"));
        assert!(item.extraction_confidence >= 0.6);
    }

    #[test]
    fn scenario_d_rows_keep_bad_dates_raw() {
        let fixture = Fixture::builtin();
        let outcome = run(
            &fixture,
            &RawInput::json(json!([
                {"container": "MSCU1234566", "status": "ON_RAIL", "eta": "2025-12-04"},
                {"container": "MSKU1111112", "status": "IN_PORT", "eta": "когда-нибудь"},
                {"container": "CSQU3054383", "status": "ON_SHIP", "eta": "10.01.2026"}
            ])),
        );

        assert_eq!(outcome.items.len(), 3);
        assert!(outcome.errors.is_empty());
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.items[0].eta.as_deref(), Some("2025-12-04"));
        assert_eq!(outcome.items[1].eta.as_deref(), Some("когда-нибудь"));
        assert_eq!(outcome.items[2].eta.as_deref(), Some("2026-01-10"));
    }

    #[test]
    fn non_object_rows_are_reported() {
        let fixture = Fixture::builtin();
        let outcome = run(
            &fixture,
            &RawInput::json(json!([
                {"container": "MSCU1234566", "status": "ON_RAIL"},
                42,
                {"container": "MSKU1111112", "status": "IN_PORT"}
            ])),
        );

        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.errors, vec!["Row 2 could not be parsed".to_string()]);
    }

    #[test]
    fn mixed_object_combines_body_and_fields() {
        let fixture = Fixture::builtin();
        let outcome = run(
            &fixture,
            &RawInput::json(json!({
                "body": "Контейнер прибыл в порт Находка",
                "containerNumber": "CSQU3054383"
            })),
        );

        assert_eq!(outcome.items.len(), 1);
        let item = &outcome.items[0];
        assert_eq!(item.container_number.as_deref(), Some("CSQU3054383"));
        assert_eq!(item.status_code, Some(StatusCode::ArrivedPort));
        assert_eq!(item.location.as_deref(), Some("Находка"));
    }

    #[test]
    fn invalid_json_with_json_hint_falls_back_to_text() {
        let fixture = Fixture::builtin();
        let outcome = run(
            &fixture,
            &RawInput::text("{broken MSCU1234566 в пути").with_hint(InputHint::Json),
        );

        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("Content is not valid JSON"));
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].container_number.as_deref(), Some("MSCU1234566"));
    }

    #[test]
    fn empty_input_reports_error() {
        let fixture = Fixture::builtin();
        let outcome = run(&fixture, &RawInput::text(""));
        assert!(outcome.items.is_empty());
        assert_eq!(outcome.errors, vec!["Empty input".to_string()]);
    }

    #[test]
    fn confidences_stay_in_range() {
        let fixture = Fixture::builtin();
        for input in [
            RawInput::text("x"),
            RawInput::text(";;;\n;;;"),
            RawInput::json(json!([])),
            RawInput::json(json!({})),
            RawInput::json(json!([null, "", {}])),
        ] {
            for item in run(&fixture, &input).items {
                assert!((0.0..=1.0).contains(&item.extraction_confidence));
            }
        }
    }
}
