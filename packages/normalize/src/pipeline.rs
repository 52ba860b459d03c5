//! The normalization pipeline: classify, extract, validate, aggregate.

use std::sync::Arc;

use boxtrack_normalize_models::{
    BatchResult, BatchSummary, DetectedFormat, ExtractionOutcome, FormatType,
    IdentifierValidationResult, InputHint, InputOutcome, LocationMatchResult, ParsedItem,
    PipelineResult, ProcessedItem, RawInput, SourceChannel, ValidationOutcome, ValidationResult,
};
use boxtrack_reference::ReferenceData;
use chrono::{Datelike as _, NaiveDate, Utc};
use rayon::prelude::*;

use crate::audit::{AuditEntry, AuditSink};
use crate::config::PipelineConfig;
use crate::detect::detect;
use crate::extract::Extractor;
use crate::identifier::IdentifierValidator;
use crate::location::LocationResolver;
use crate::progress::{ProgressCallback, null_progress};
use crate::validate::RecordValidator;

/// Normalizes raw status inputs against shared reference data.
///
/// Cheap to share across threads: the reference tables are read-only and
/// every run allocates its own results.
#[derive(Clone)]
pub struct Pipeline {
    reference: Arc<ReferenceData>,
    config: PipelineConfig,
    audit: Option<Arc<dyn AuditSink>>,
    /// Fixed "today"; the current UTC date when `None`.
    reference_date: Option<NaiveDate>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("locations", &self.reference.gazetteer.len())
            .field("owners", &self.reference.owners.len())
            .field("config", &self.config)
            .field("audit", &self.audit.is_some())
            .field("reference_date", &self.reference_date)
            .finish()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Arc::new(ReferenceData::builtin()), PipelineConfig::default())
    }
}

impl Pipeline {
    #[must_use]
    pub const fn new(reference: Arc<ReferenceData>, config: PipelineConfig) -> Self {
        Self {
            reference,
            config,
            audit: None,
            reference_date: None,
        }
    }

    /// Records one [`AuditEntry`] per processed input into `sink`.
    #[must_use]
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Pins "today" for stale-ETA checks and year-less dates.
    #[must_use]
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    #[must_use]
    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Classifies an input without extracting anything.
    #[must_use]
    pub fn detect(&self, input: &RawInput) -> DetectedFormat {
        detect(input, &self.reference.gazetteer)
    }

    /// Validates a single container number.
    #[must_use]
    pub fn check_identifier(&self, candidate: &str) -> IdentifierValidationResult {
        self.identifiers().validate(candidate)
    }

    /// Resolves a location mention against the gazetteer.
    #[must_use]
    pub fn resolve_location(&self, text: &str) -> LocationMatchResult {
        self.locations().resolve(text)
    }

    /// Extracts candidate items from an already classified input.
    #[must_use]
    pub fn extract(&self, input: &RawInput, format: &DetectedFormat) -> ExtractionOutcome {
        let year = input
            .metadata
            .received_at
            .map_or_else(|| self.today().year(), |received| received.year());
        Extractor::new(
            self.identifiers(),
            self.locations(),
            &self.config.scoring.extraction,
            year,
        )
        .extract(input, format)
    }

    /// Validates one parsed item.
    #[must_use]
    pub fn validate_item(&self, item: &ParsedItem, channel: SourceChannel) -> ValidationResult {
        self.validator().validate(item, channel)
    }

    /// Runs the whole pipeline on one input.
    #[must_use]
    pub fn process(&self, input: &RawInput) -> PipelineResult {
        let format = self.detect(input);
        let extraction = self.extract(input, &format);
        let channel = source_channel(input, format.format_type);
        let validator = self.validator();

        for error in &extraction.errors {
            log::warn!("{error}");
        }

        let parse_errors = extraction.errors.len();
        let mut errors = extraction.errors;
        let mut warnings = extraction.warnings;

        let items: Vec<ProcessedItem> = extraction
            .items
            .into_iter()
            .enumerate()
            .map(|(i, parsed)| {
                let validation = validator.validate(&parsed, channel);
                let n = i + 1;
                errors.extend(validation.errors.iter().map(|e| format!("item {n}: {e}")));
                warnings.extend(validation.warnings.iter().map(|w| format!("item {n}: {w}")));
                ProcessedItem { parsed, validation }
            })
            .collect();

        let confidence = self.overall_confidence(&format, &items, parse_errors);
        let result = PipelineResult {
            format,
            items,
            errors,
            warnings,
            confidence,
        };

        log::debug!(
            "processed {} input: {} items ({} valid, {} partial), confidence {:.3}",
            result.format.format_type,
            result.items.len(),
            result.valid_count(),
            result.partial_count(),
            result.confidence
        );

        if let Some(sink) = &self.audit {
            sink.record(AuditEntry::from_result(&result));
        }

        result
    }

    /// Runs the pipeline on every input in parallel; `results[i]`
    /// corresponds to `inputs[i]`.
    #[must_use]
    pub fn process_batch(&self, inputs: &[RawInput]) -> BatchResult {
        self.process_batch_with_progress(inputs, &null_progress())
    }

    /// Like [`Self::process_batch`], reporting each finished input to
    /// `progress`.
    #[must_use]
    pub fn process_batch_with_progress(
        &self,
        inputs: &[RawInput],
        progress: &Arc<dyn ProgressCallback>,
    ) -> BatchResult {
        progress.set_total(inputs.len() as u64);
        progress.set_message("normalizing".to_string());

        let results: Vec<PipelineResult> = inputs
            .par_iter()
            .map(|input| {
                let result = self.process(input);
                progress.inc(1);
                result
            })
            .collect();

        let mut summary = BatchSummary {
            total: results.len(),
            ..BatchSummary::default()
        };
        for (i, result) in results.iter().enumerate() {
            match result.outcome() {
                InputOutcome::Success => summary.succeeded += 1,
                InputOutcome::Partial => summary.partial += 1,
                InputOutcome::Failed => summary.failed += 1,
            }
            let n = i + 1;
            summary
                .errors
                .extend(result.errors.iter().map(|e| format!("input {n}: {e}")));
        }

        let message = format!(
            "{} inputs: {} succeeded, {} partial, {} failed",
            summary.total, summary.succeeded, summary.partial, summary.failed
        );
        log::info!("{message}");
        progress.finish(message);

        BatchResult { results, summary }
    }

    /// Mean confidence of the valid items; without any, a blend of format
    /// confidence, parse-error ratio, item-loss ratio, and completeness.
    #[allow(clippy::cast_precision_loss)]
    fn overall_confidence(
        &self,
        format: &DetectedFormat,
        items: &[ProcessedItem],
        parse_errors: usize,
    ) -> f64 {
        let valid: Vec<f64> = items
            .iter()
            .filter(|item| item.validation.is_valid())
            .map(|item| item.validation.confidence)
            .collect();
        if !valid.is_empty() {
            return (valid.iter().sum::<f64>() / valid.len() as f64).clamp(0.0, 1.0);
        }

        let a = &self.config.scoring.aggregate;
        let extracted = items.len();
        let error_ratio = if parse_errors == 0 {
            0.0
        } else {
            parse_errors as f64 / (parse_errors + extracted) as f64
        };
        let (loss_ratio, completeness) = if extracted == 0 {
            (1.0, 0.0)
        } else {
            let rejected = items
                .iter()
                .filter(|item| matches!(item.validation.outcome, ValidationOutcome::Rejected))
                .count();
            let completeness = items
                .iter()
                .map(|item| item.validation.scores.completeness)
                .sum::<f64>()
                / extracted as f64;
            (rejected as f64 / extracted as f64, completeness)
        };

        (format.confidence
            * (a.error_weight * (1.0 - error_ratio)
                + a.loss_weight * (1.0 - loss_ratio)
                + a.completeness_weight * completeness))
            .clamp(0.0, 1.0)
    }

    fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    fn identifiers(&self) -> IdentifierValidator<'_> {
        IdentifierValidator::new(&self.reference.owners, &self.config.scoring.identifier)
    }

    fn locations(&self) -> LocationResolver<'_> {
        LocationResolver::new(&self.reference.gazetteer, &self.config.scoring.location)
    }

    fn validator(&self) -> RecordValidator<'_> {
        RecordValidator::new(
            self.identifiers(),
            self.locations(),
            &self.config.scoring.validation,
            self.today(),
        )
    }
}

/// Channel tag for events produced from `input`: the hint when given,
/// email when the input came from a mailbox, otherwise by format.
#[must_use]
pub fn source_channel(input: &RawInput, format: FormatType) -> SourceChannel {
    if let Some(hint) = input.hint {
        return match hint {
            InputHint::Text => SourceChannel::Text,
            InputHint::Json => SourceChannel::Json,
            InputHint::Csv => SourceChannel::Csv,
            InputHint::Table => SourceChannel::Table,
            InputHint::Api => SourceChannel::Api,
        };
    }
    if input.metadata.from_email.is_some() {
        return SourceChannel::Email;
    }
    match format {
        FormatType::PlainText | FormatType::Unknown => SourceChannel::Text,
        FormatType::CsvText => SourceChannel::Csv,
        FormatType::TableRow | FormatType::TableRows => SourceChannel::Table,
        FormatType::JsonObject | FormatType::JsonArray | FormatType::Mixed => SourceChannel::Json,
    }
}

#[cfg(test)]
mod tests {
    use boxtrack_container_models::StatusCode;
    use boxtrack_normalize_models::InputMetadata;
    use serde_json::json;

    use super::*;
    use crate::audit::BoundedAuditLog;

    fn pipeline() -> Pipeline {
        Pipeline::default().with_reference_date(NaiveDate::from_ymd_opt(2025, 11, 1).unwrap())
    }

    #[test]
    fn scenario_a_text_email() {
        let result = pipeline().process(&RawInput::text(
            "Контейнер MSCU1234560 на станции Гончарово, 1857 км до Иня-Восточная. ETA 04.12.2025",
        ));

        assert_eq!(result.format.format_type, FormatType::PlainText);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.valid_count(), 1);

        let event = result.events().next().unwrap();
        assert_eq!(event.container_number.as_deref(), Some("MSCU1234560"));
        assert_eq!(event.status_code, StatusCode::OnRail);
        assert_eq!(event.location.as_ref().unwrap().name, "Гончарово");
        assert_eq!(event.distance_km, Some(1857));
        assert_eq!(event.eta, NaiveDate::from_ymd_opt(2025, 12, 4));
        assert_eq!(event.destination.as_deref(), Some("Иня-Восточная"));
        assert_eq!(event.source_channel, SourceChannel::Text);
        // The check digit of MSCU123456 is 6, not 0.
        assert!(result.warnings.iter().any(|w| w.contains("Check digit mismatch")));
        assert!((result.confidence - event.confidence).abs() < 1e-9);
    }

    #[test]
    fn scenario_b_csv_resolves_canonical_location() {
        let result = pipeline().process(&RawInput::text(
            "containerNumber;status;location\nMSKU1111110;ON_RAIL;Новосибирск",
        ));

        assert_eq!(result.format.format_type, FormatType::CsvText);
        assert_eq!(result.items.len(), 1);
        assert!(result.items[0].parsed.extraction_confidence >= 0.6);

        let event = result.events().next().unwrap();
        assert_eq!(event.container_number.as_deref(), Some("MSKU1111110"));
        assert_eq!(event.status_code, StatusCode::OnRail);
        let location = event.location.as_ref().unwrap();
        assert_eq!(location.name, "Новосибирск");
        assert!(location.registered);
        assert_eq!(event.source_channel, SourceChannel::Csv);
    }

    #[test]
    fn scenario_c_typo_in_owner_code() {
        let result = pipeline().check_identifier("MSC01234560");
        assert!(result.is_valid);
        assert_eq!(result.container_number, "MSCO1234560");
        assert!(!result.corrections.is_empty());
    }

    #[test]
    fn scenario_d_one_bad_date_among_three_rows() {
        let result = pipeline().process(&RawInput::json(json!([
            {"container": "MSCU1234566", "status": "ON_RAIL", "eta": "2025-12-04"},
            {"container": "MSKU1111112", "status": "IN_PORT", "eta": "когда-нибудь"},
            {"container": "CSQU3054383", "status": "ON_SHIP", "eta": "10.01.2026"}
        ])));

        assert_eq!(result.items.len(), 3);
        assert_eq!(result.warnings.len(), 1, "{:?}", result.warnings);
        assert!(result.warnings[0].starts_with("item 2: ETA"));
        assert_eq!(result.valid_count(), 3);
        assert_eq!(
            result.items[0].validation.event().unwrap().eta,
            NaiveDate::from_ymd_opt(2025, 12, 4)
        );
        assert_eq!(result.items[1].validation.event().unwrap().eta, None);
        assert_eq!(
            result.items[2].validation.event().unwrap().eta,
            NaiveDate::from_ymd_opt(2026, 1, 10)
        );
    }

    #[test]
    fn status_only_text_is_not_valid() {
        let result = pipeline().process(&RawInput::text("Груз прибыл на станцию Забайкальск"));

        assert_eq!(result.items.len(), 1);
        assert_eq!(result.valid_count(), 0);
        assert!(result.errors.iter().any(|e| e == "item 1: Missing container number"));
        // Known status and known location: salvaged as a partial record.
        assert_eq!(result.outcome(), InputOutcome::Partial);
        assert!((0.0..=1.0).contains(&result.confidence));
    }

    #[test]
    fn unusable_input_has_fallback_confidence() {
        let result = pipeline().process(&RawInput::text("Добрый день!"));
        assert!(result.items.is_empty());
        assert_eq!(result.outcome(), InputOutcome::Failed);
        assert!((0.0..=1.0).contains(&result.confidence));
        assert!(result.confidence < 0.5);
    }

    #[test]
    fn email_metadata_sets_channel_and_subject_fallback() {
        let input = RawInput::text("Прибыл в порт Находка").with_metadata(InputMetadata {
            from_email: Some("ops@carrier.example".to_string()),
            subject: Some("Статус MSCU1234566".to_string()),
            ..InputMetadata::default()
        });
        let result = pipeline().process(&input);

        let event = result.events().next().unwrap();
        assert_eq!(event.container_number.as_deref(), Some("MSCU1234566"));
        assert_eq!(event.status_code, StatusCode::ArrivedPort);
        assert_eq!(event.source_channel, SourceChannel::Email);
    }

    #[test]
    fn batch_preserves_order_and_summarizes() {
        let inputs = vec![
            RawInput::text("MSCU1234566 в пути"),
            RawInput::text(""),
            RawInput::json(json!({"container": "CSQU3054383", "status": "IN_PORT", "port": "Находка"})),
        ];
        let batch = pipeline().process_batch(&inputs);

        assert_eq!(batch.results.len(), 3);
        assert_eq!(batch.summary.total, 3);
        assert_eq!(batch.summary.succeeded, 2);
        assert_eq!(batch.summary.failed, 1);
        assert_eq!(
            batch.results[0].items[0].parsed.container_number.as_deref(),
            Some("MSCU1234566")
        );
        assert_eq!(
            batch.results[2].items[0].parsed.container_number.as_deref(),
            Some("CSQU3054383")
        );
        assert!(batch.summary.errors.iter().any(|e| e.starts_with("input 2: ")));
    }

    #[test]
    fn audit_sink_records_each_input() {
        let log = Arc::new(BoundedAuditLog::new(10));
        let pipeline = pipeline().with_audit(log.clone());

        let _ = pipeline.process_batch(&[
            RawInput::text("MSCU1234566 в пути"),
            RawInput::text("CSQU3054383 в порту Находка"),
        ]);

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|entry| entry.valid == 1));
    }

    #[test]
    fn confidences_in_range_for_degenerate_inputs() {
        let pipeline = pipeline();
        for input in [
            RawInput::text(""),
            RawInput::text("   "),
            RawInput::text("{"),
            RawInput::text("[]"),
            RawInput::json(json!([])),
            RawInput::json(json!({})),
            RawInput::json(json!([1, null, true])),
            RawInput::text(";;;\n;;;"),
        ] {
            let result = pipeline.process(&input);
            assert!((0.0..=1.0).contains(&result.confidence));
            assert!((0.0..=1.0).contains(&result.format.confidence));
            for item in &result.items {
                assert!((0.0..=1.0).contains(&item.validation.confidence));
                assert!((0.0..=1.0).contains(&item.parsed.extraction_confidence));
            }
        }
    }

    #[test]
    fn channel_follows_hint_then_email_then_format() {
        let hinted = RawInput::text("x").with_hint(InputHint::Api);
        assert_eq!(source_channel(&hinted, FormatType::PlainText), SourceChannel::Api);
        assert_eq!(
            source_channel(&RawInput::text("x"), FormatType::TableRows),
            SourceChannel::Table
        );
    }
}
