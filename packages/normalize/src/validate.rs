//! Record validation.
//!
//! Checks one [`ParsedItem`] against the identifier rules, the gazetteer,
//! and the status vocabulary, and decides whether it becomes a valid
//! event, a partial record, or nothing.

use boxtrack_container_models::StatusCode;
use boxtrack_normalize_models::{
    IdentifierValidationResult, NormalizedStatusEvent, ParsedItem, ResolvedLocation,
    SourceChannel, ValidationOutcome, ValidationResult, ValidationScores,
};
use chrono::{Datelike as _, NaiveDate};

use crate::config::ValidationScoring;
use crate::identifier::IdentifierValidator;
use crate::location::{LocationResolver, infer_location_type, title_case};
use crate::parsing::{parse_date, parse_datetime};
use crate::status_mapping::map_status;

/// Number of fields counted towards completeness: identifier, status,
/// location, ETA, distance, and a route endpoint.
const COMPLETENESS_FIELDS: f64 = 6.0;

#[derive(Debug, Clone, Copy)]
pub struct RecordValidator<'a> {
    identifiers: IdentifierValidator<'a>,
    locations: LocationResolver<'a>,
    scoring: &'a ValidationScoring,
    /// "Today" for stale-ETA checks and year-less dates.
    reference_date: NaiveDate,
}

impl<'a> RecordValidator<'a> {
    #[must_use]
    pub const fn new(
        identifiers: IdentifierValidator<'a>,
        locations: LocationResolver<'a>,
        scoring: &'a ValidationScoring,
        reference_date: NaiveDate,
    ) -> Self {
        Self {
            identifiers,
            locations,
            scoring,
            reference_date,
        }
    }

    /// Validates one item. Never fails: problems become errors and
    /// warnings in the result.
    #[must_use]
    pub fn validate(&self, item: &ParsedItem, channel: SourceChannel) -> ValidationResult {
        let s = self.scoring;
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let identifier = self.check_identifier(item, &mut errors, &mut warnings);
        let (status_code, status_text, status_score) = self.check_status(item, &mut warnings);
        let (location, location_score) = self.check_location(item, &mut warnings);

        let mut consistency = 1.0;
        if let Some(location_type) = location.as_ref().and_then(|l| l.location_type)
            && status_code.is_known()
            && !status_code.accepts_location(location_type)
        {
            consistency *= s.consistency_penalty;
            warnings.push(format!(
                "Status {status_code} does not fit location type {location_type}"
            ));
        }

        let distance_km = match item.distance_km {
            None => None,
            Some(km) if km < 0 || km > s.max_distance_km => {
                warnings.push(format!("Distance {km} km is out of range, discarded"));
                None
            }
            Some(km) => u32::try_from(km).ok(),
        };
        if status_code == StatusCode::Delivered
            && let Some(km) = distance_km.filter(|&km| km != 0)
        {
            warnings.push(format!("Delivered container still reports {km} km remaining"));
        }

        let eta = self.check_date(item.eta.as_deref(), "ETA", &mut warnings);
        if let Some(eta) = eta
            && eta < self.reference_date
            && status_code != StatusCode::Delivered
        {
            warnings.push(format!("ETA {eta} is in the past"));
        }
        let unload_eta = self.check_date(item.unload_eta.as_deref(), "Unload ETA", &mut warnings);

        let event_time = item
            .event_time
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .and_then(|raw| {
                let parsed = parse_datetime(raw, self.reference_date.year());
                if parsed.is_none() {
                    warnings.push(format!("Event time '{raw}' is not a valid timestamp, discarded"));
                }
                parsed
            });

        let origin = self.canonical_place(item.origin.as_deref());
        let destination = self.canonical_place(item.destination.as_deref());

        let registered_location = location.as_ref().is_some_and(|l| l.registered);
        let present = [
            identifier.is_some(),
            status_code.is_known(),
            location.is_some(),
            eta.is_some(),
            distance_km.is_some(),
            origin.is_some() || destination.is_some(),
        ];
        #[allow(clippy::cast_precision_loss)]
        let completeness = present.iter().filter(|&&p| p).count() as f64 / COMPLETENESS_FIELDS;

        let mut confidence = identifier.as_ref().map_or_else(
            || {
                status_score * s.status_weight
                    + location_score * s.location_weight
                    + completeness * s.completeness_weight
            },
            |result| {
                let mut confidence = result.confidence;
                if status_code.is_known() {
                    confidence += s.known_status_bonus;
                }
                if registered_location {
                    confidence += s.registered_location_bonus;
                }
                if completeness > s.completeness_threshold {
                    confidence += s.completeness_bonus;
                }
                if consistency >= 1.0 {
                    confidence += s.consistency_bonus;
                }
                confidence.min(1.0)
            },
        );
        if !errors.is_empty() {
            confidence *= s.error_multiplier;
        }
        if warnings.len() > s.warning_limit {
            confidence *= s.warning_multiplier;
        }
        let confidence = confidence.clamp(0.0, 1.0);

        let scores = ValidationScores {
            identifier: identifier.as_ref().map_or(0.0, |result| result.confidence),
            status: status_score,
            location: location_score,
            completeness,
            consistency,
        };

        let has_signal = identifier.is_some() || status_code.is_known() || registered_location;
        let valid = errors.is_empty() && identifier.is_some() && confidence >= s.valid_threshold;
        let partial = !valid && has_signal && confidence > s.partial_threshold;

        let event = (valid || partial).then(|| NormalizedStatusEvent {
            container_number: identifier.map(|result| result.container_number),
            status_code,
            status_text,
            location,
            distance_km,
            eta,
            unload_eta,
            event_time,
            source_channel: channel,
            raw_text: item.raw_fragment.clone(),
            origin,
            destination,
            carrier_name: item.carrier_name.clone(),
            confidence,
        });

        let outcome = match event {
            Some(event) if valid => ValidationOutcome::Valid(event),
            Some(event) => ValidationOutcome::Partial(event),
            None => ValidationOutcome::Rejected,
        };

        log::trace!(
            "validated {:?}: {} errors, {} warnings, confidence {confidence:.3}",
            item.container_number,
            errors.len(),
            warnings.len()
        );

        ValidationResult {
            outcome,
            errors,
            warnings,
            scores,
            confidence,
        }
    }

    /// Canonical code, human text, and status sub-score.
    fn check_status(
        &self,
        item: &ParsedItem,
        warnings: &mut Vec<String>,
    ) -> (StatusCode, String, f64) {
        let code = item
            .status_code
            .or_else(|| item.status_text.as_deref().map(map_status));

        match code {
            Some(code) if code.is_known() => (code, code.human_text().to_string(), 1.0),
            Some(_) => {
                let raw = item.status_text.clone().unwrap_or_default();
                warnings.push(format!("Unknown status '{raw}'"));
                let text = if raw.is_empty() {
                    StatusCode::Unknown.human_text().to_string()
                } else {
                    raw
                };
                (StatusCode::Unknown, text, self.scoring.unknown_status_score)
            }
            None => {
                warnings.push("No status found".to_string());
                (
                    StatusCode::Unknown,
                    StatusCode::Unknown.human_text().to_string(),
                    0.0,
                )
            }
        }
    }

    /// The validated identifier, or `None` with a hard error recorded.
    fn check_identifier(
        &self,
        item: &ParsedItem,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> Option<IdentifierValidationResult> {
        let Some(raw) = item.container_number.as_deref() else {
            errors.push("Missing container number".to_string());
            return None;
        };

        let result = self.identifiers.validate(raw);
        if !result.is_valid {
            errors.push(format!(
                "Invalid container number: {}",
                result.error.as_deref().unwrap_or("unrecognized shape")
            ));
            return None;
        }

        if let Some(parts) = &result.parts {
            if !parts.check_digit_valid {
                warnings.push(format!(
                    "Check digit mismatch for {}: expected {}, found {}",
                    result.container_number, parts.computed_check_digit, parts.check_digit
                ));
            }
            if !parts.category_valid {
                warnings.push(format!(
                    "Unusual equipment category '{}' in {}",
                    parts.category, result.container_number
                ));
            }
        }
        for correction in &result.corrections {
            warnings.push(format!("Container number corrected: {correction}"));
        }

        Some(result)
    }

    fn check_location(
        &self,
        item: &ParsedItem,
        warnings: &mut Vec<String>,
    ) -> (Option<ResolvedLocation>, f64) {
        let Some(raw) = item.location.as_deref().map(str::trim).filter(|raw| !raw.is_empty())
        else {
            return (None, 0.0);
        };

        let result = self.locations.resolve(raw);
        match result.location {
            Some(location) if result.registered => (
                Some(ResolvedLocation {
                    name: location.name,
                    location_type: Some(location.location_type),
                    registered: true,
                    region: location.region,
                    country: location.country,
                }),
                result.confidence,
            ),
            guess => {
                warnings.push(format!("Location '{raw}' is not in the gazetteer"));
                let (name, location_type, score) = match guess {
                    Some(guess) => (
                        title_case(&guess.name),
                        item.location_type.or(Some(guess.location_type)),
                        result.confidence,
                    ),
                    None => (
                        title_case(raw),
                        item.location_type.or_else(|| infer_location_type(raw)),
                        self.scoring.unresolved_location_score,
                    ),
                };
                (
                    Some(ResolvedLocation {
                        name,
                        location_type,
                        registered: false,
                        region: None,
                        country: None,
                    }),
                    score,
                )
            }
        }
    }

    fn check_date(
        &self,
        raw: Option<&str>,
        label: &str,
        warnings: &mut Vec<String>,
    ) -> Option<NaiveDate> {
        let raw = raw.map(str::trim).filter(|raw| !raw.is_empty())?;
        let parsed = parse_date(raw, self.reference_date.year());
        if parsed.is_none() {
            warnings.push(format!("{label} '{raw}' is not a valid date, discarded"));
        }
        parsed
    }

    /// Gazetteer name for a route endpoint when registered, otherwise the
    /// text as written.
    fn canonical_place(&self, raw: Option<&str>) -> Option<String> {
        let raw = raw.map(str::trim).filter(|raw| !raw.is_empty())?;
        let result = self.locations.resolve(raw);
        Some(match result.location {
            Some(location) if result.registered => location.name,
            _ => raw.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use boxtrack_container_models::LocationType;
    use boxtrack_reference::ReferenceData;

    use super::*;
    use crate::config::ScoringConfig;

    struct Fixture {
        reference: ReferenceData,
        scoring: ScoringConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                reference: ReferenceData::builtin(),
                scoring: ScoringConfig::default(),
            }
        }

        fn validator(&self) -> RecordValidator<'_> {
            RecordValidator::new(
                IdentifierValidator::new(&self.reference.owners, &self.scoring.identifier),
                LocationResolver::new(&self.reference.gazetteer, &self.scoring.location),
                &self.scoring.validation,
                NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
            )
        }
    }

    fn item() -> ParsedItem {
        ParsedItem {
            container_number: Some("MSCU1234566".to_string()),
            status_code: Some(StatusCode::OnRail),
            status_text: Some("в пути".to_string()),
            location: Some("Гончарово".to_string()),
            location_type: Some(LocationType::Station),
            distance_km: Some(1857),
            eta: Some("2025-12-04".to_string()),
            destination: Some("Иня-Восточная".to_string()),
            raw_fragment: "test".to_string(),
            ..ParsedItem::default()
        }
    }

    #[test]
    fn complete_item_is_valid() {
        let fixture = Fixture::new();
        let result = fixture.validator().validate(&item(), SourceChannel::Email);

        assert!(result.is_valid());
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert!((result.confidence - 1.0).abs() < 1e-9);

        let event = result.event().unwrap();
        assert_eq!(event.container_number.as_deref(), Some("MSCU1234566"));
        assert_eq!(event.status_code, StatusCode::OnRail);
        assert_eq!(event.status_text, StatusCode::OnRail.human_text());
        assert_eq!(event.location.as_ref().unwrap().name, "Гончарово");
        assert!(event.location.as_ref().unwrap().registered);
        assert_eq!(event.distance_km, Some(1857));
        assert_eq!(event.eta, NaiveDate::from_ymd_opt(2025, 12, 4));
        assert_eq!(event.source_channel, SourceChannel::Email);
        assert!((result.scores.completeness - 1.0).abs() < 1e-9);
    }

    #[test]
    fn wrong_check_digit_is_valid_with_warning() {
        let fixture = Fixture::new();
        let result = fixture.validator().validate(
            &ParsedItem {
                container_number: Some("MSCU1234560".to_string()),
                ..item()
            },
            SourceChannel::Text,
        );

        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("Check digit mismatch"));
    }

    #[test]
    fn missing_identifier_with_signal_is_partial() {
        let fixture = Fixture::new();
        let result = fixture.validator().validate(
            &ParsedItem {
                container_number: None,
                ..item()
            },
            SourceChannel::Text,
        );

        assert!(!result.is_valid());
        assert_eq!(result.errors, vec!["Missing container number".to_string()]);
        let partial = result.partial_data().unwrap();
        assert_eq!(partial.container_number, None);
        assert_eq!(partial.status_code, StatusCode::OnRail);
        assert!(result.confidence > 0.3);
    }

    #[test]
    fn missing_identifier_halves_blended_confidence() {
        let fixture = Fixture::new();
        let result = fixture.validator().validate(
            &ParsedItem {
                container_number: None,
                ..item()
            },
            SourceChannel::Text,
        );

        // known status, registered location, 5 of 6 fields present
        let blended = 0.3 * 1.0 + 0.3 * 0.95 + 0.4 * (5.0 / 6.0);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert!((result.scores.completeness - 5.0 / 6.0).abs() < 1e-9);
        assert!((result.confidence - blended * 0.5).abs() < 1e-9);
        assert!(result.is_partial());
    }

    #[test]
    fn more_than_three_warnings_scale_confidence() {
        let fixture = Fixture::new();
        let result = fixture.validator().validate(
            &ParsedItem {
                container_number: Some("MSCU1234560".to_string()),
                location: Some("тайшет".to_string()),
                eta: Some("когда-нибудь".to_string()),
                distance_km: Some(25_000),
                ..item()
            },
            SourceChannel::Text,
        );

        assert_eq!(result.warnings.len(), 4, "{:?}", result.warnings);
        assert!(result.errors.is_empty());
        // 0.92 + 0.05 status + 0.03 completeness + 0.02 consistency caps at 1.0
        assert!((result.confidence - 0.95).abs() < 1e-9);
        assert!(result.is_valid());
    }

    #[test]
    fn three_warnings_leave_confidence_unscaled() {
        let fixture = Fixture::new();
        let result = fixture.validator().validate(
            &ParsedItem {
                container_number: Some("MSCU1234560".to_string()),
                location: Some("тайшет".to_string()),
                eta: Some("когда-нибудь".to_string()),
                ..item()
            },
            SourceChannel::Text,
        );

        assert_eq!(result.warnings.len(), 3, "{:?}", result.warnings);
        assert!((result.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn missing_identifier_without_signal_is_rejected() {
        let fixture = Fixture::new();
        let result = fixture.validator().validate(&ParsedItem::default(), SourceChannel::Text);

        assert!(matches!(result.outcome, ValidationOutcome::Rejected));
        assert!(result.partial_data().is_none());
        assert!((0.0..=1.0).contains(&result.confidence));
    }

    #[test]
    fn invalid_identifier_is_a_hard_error() {
        let fixture = Fixture::new();
        let result = fixture.validator().validate(
            &ParsedItem {
                container_number: Some("ABC".to_string()),
                ..item()
            },
            SourceChannel::Json,
        );

        assert!(!result.is_valid());
        assert!(result.errors[0].starts_with("Invalid container number"));
        assert!(result.scores.identifier.abs() < f64::EPSILON);
    }

    #[test]
    fn status_location_mismatch_is_soft() {
        let fixture = Fixture::new();
        let result = fixture.validator().validate(
            &ParsedItem {
                location: Some("Владивосток".to_string()),
                location_type: None,
                ..item()
            },
            SourceChannel::Text,
        );

        assert!(result.is_valid());
        assert!((result.scores.consistency - 0.8).abs() < 1e-9);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("does not fit"));
    }

    #[test]
    fn out_of_range_distance_is_discarded() {
        let fixture = Fixture::new();
        for km in [-5, 25_000] {
            let result = fixture.validator().validate(
                &ParsedItem {
                    distance_km: Some(km),
                    ..item()
                },
                SourceChannel::Text,
            );
            assert_eq!(result.event().unwrap().distance_km, None);
            assert_eq!(result.warnings.len(), 1);
        }
    }

    #[test]
    fn delivered_with_distance_is_flagged() {
        let fixture = Fixture::new();
        let result = fixture.validator().validate(
            &ParsedItem {
                status_code: Some(StatusCode::Delivered),
                location: Some("Москва".to_string()),
                distance_km: Some(12),
                ..item()
            },
            SourceChannel::Text,
        );
        assert!(result.warnings.iter().any(|w| w.contains("12 km remaining")));
        assert_eq!(result.event().unwrap().distance_km, Some(12));
    }

    #[test]
    fn unparsable_eta_is_discarded_with_warning() {
        let fixture = Fixture::new();
        let result = fixture.validator().validate(
            &ParsedItem {
                eta: Some("когда-нибудь".to_string()),
                ..item()
            },
            SourceChannel::Json,
        );
        assert!(result.is_valid());
        assert_eq!(result.event().unwrap().eta, None);
        assert_eq!(
            result.warnings,
            vec!["ETA 'когда-нибудь' is not a valid date, discarded".to_string()]
        );
    }

    #[test]
    fn past_eta_is_flagged_but_kept() {
        let fixture = Fixture::new();
        let result = fixture.validator().validate(
            &ParsedItem {
                eta: Some("2025-01-15".to_string()),
                ..item()
            },
            SourceChannel::Text,
        );
        assert_eq!(result.event().unwrap().eta, NaiveDate::from_ymd_opt(2025, 1, 15));
        assert!(result.warnings[0].contains("in the past"));
    }

    #[test]
    fn unknown_status_keeps_raw_text() {
        let fixture = Fixture::new();
        let result = fixture.validator().validate(
            &ParsedItem {
                status_code: Some(StatusCode::Unknown),
                status_text: Some("непонятно".to_string()),
                ..item()
            },
            SourceChannel::Text,
        );
        let event = result.event().unwrap();
        assert_eq!(event.status_code, StatusCode::Unknown);
        assert_eq!(event.status_text, "непонятно");
        assert!((result.scores.status - 0.2).abs() < 1e-9);
    }

    #[test]
    fn unregistered_location_is_title_cased() {
        let fixture = Fixture::new();
        let result = fixture.validator().validate(
            &ParsedItem {
                location: Some("тайшет".to_string()),
                ..item()
            },
            SourceChannel::Text,
        );
        let location = result.event().unwrap().location.clone().unwrap();
        assert_eq!(location.name, "Тайшет");
        assert!(!location.registered);
        assert_eq!(location.location_type, Some(LocationType::Station));
        assert!(result.warnings[0].contains("not in the gazetteer"));
    }

    #[test]
    fn route_endpoints_use_gazetteer_names() {
        let fixture = Fixture::new();
        let result = fixture.validator().validate(
            &ParsedItem {
                origin: Some("Vladivostok".to_string()),
                destination: Some("Тайшет".to_string()),
                ..item()
            },
            SourceChannel::Text,
        );
        let event = result.event().unwrap();
        assert_eq!(event.origin.as_deref(), Some("Владивосток"));
        assert_eq!(event.destination.as_deref(), Some("Тайшет"));
    }
}
