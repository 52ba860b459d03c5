//! Free-text extraction: operator emails, chat messages, notes.

use std::ops::Range;

use boxtrack_container_models::LocationType;
use boxtrack_normalize_models::{ExtractionOutcome, ParsedItem};
use regex::Captures;

use super::Extractor;
use super::patterns::{
    CARRIER_LABEL, COMMENT_LABEL, DESTINATION_MARKERS, DISTANCE_PATTERNS, ETA_PATTERNS,
    EVENT_DATE_PATTERNS, IDENTIFIER_PATTERNS, LOCATION_PATTERNS, ROUTE_PATTERNS, RouteCapture,
    SOURCE_LABEL, UNLOAD_ETA_PATTERNS, find_known_carrier,
};
use crate::location::infer_location_type;
use crate::parsing::{parse_date, parse_datetime, to_iso};
use crate::status_mapping::find_status_keyword;

/// A validated container number and where it was mentioned.
#[derive(Debug, Clone)]
pub(super) struct Mention {
    pub span: Range<usize>,
    pub number: String,
}

impl Extractor<'_> {
    /// Extracts one item per distinct container mentioned in `text`.
    pub(super) fn extract_text(&self, text: &str) -> ExtractionOutcome {
        let mut outcome = ExtractionOutcome::default();
        let items = self.scan_text(text);

        match items.first() {
            None => outcome
                .errors
                .push("No container number, status, or location found in text".to_string()),
            Some(item) if item.container_number.is_none() => outcome
                .warnings
                .push("No container number found in text".to_string()),
            Some(_) => {}
        }

        outcome.items = items;
        outcome
    }

    /// Like [`Self::extract_text`], but retries with the email subject
    /// prepended when the body alone names no container.
    pub(super) fn extract_text_with_subject(
        &self,
        text: &str,
        subject: Option<&str>,
    ) -> ExtractionOutcome {
        if let Some(subject) = subject
            && self.find_identifiers(text).is_empty()
            && !self.find_identifiers(subject).is_empty()
        {
            log::debug!("using subject {subject:?} for container numbers");
            return self.extract_text(&format!("{subject}\n{text}"));
        }
        self.extract_text(text)
    }

    /// Items found in `text`, without diagnostics. When no container is
    /// mentioned but a status or location is, a single item without a
    /// container number is returned.
    pub(super) fn scan_text(&self, text: &str) -> Vec<ParsedItem> {
        let mentions = self.find_identifiers(text);

        if mentions.is_empty() {
            let mut item = ParsedItem {
                raw_fragment: text.trim().to_string(),
                ..ParsedItem::default()
            };
            self.fill_from_text(&mut item, text);
            return if item.status_code.is_some() || item.location.is_some() {
                vec![item]
            } else {
                Vec::new()
            };
        }

        let multiple = mentions.len() > 1;
        mentions
            .iter()
            .enumerate()
            .map(|(i, mention)| {
                // The first segment also covers any preamble before it.
                let start = if i == 0 { 0 } else { mention.span.start };
                let end = mentions
                    .get(i + 1)
                    .map_or(text.len(), |next| next.span.start);
                let segment = &text[start..end];

                let mut item = ParsedItem {
                    container_number: Some(mention.number.clone()),
                    raw_fragment: segment.trim().to_string(),
                    ..ParsedItem::default()
                };
                self.fill_from_text(&mut item, segment);
                if multiple {
                    // Shared facts ("all on station X") apply to every container.
                    self.fill_from_text(&mut item, text);
                }
                item
            })
            .collect()
    }

    /// Valid container numbers in `text`, in order of appearance.
    ///
    /// Patterns are tried most trustworthy first; a candidate overlapping
    /// an already accepted span is ignored, as is a repeat of a number
    /// already found.
    pub(super) fn find_identifiers(&self, text: &str) -> Vec<Mention> {
        let mut mentions: Vec<Mention> = Vec::new();

        for pattern in IDENTIFIER_PATTERNS.iter() {
            for caps in pattern.captures_iter(text) {
                let Some(m) = caps.get(1) else {
                    continue;
                };
                if m.as_str().chars().filter(char::is_ascii_digit).count() < 4 {
                    continue;
                }
                if mentions
                    .iter()
                    .any(|other| other.span.start < m.end() && m.start() < other.span.end)
                {
                    continue;
                }

                let result = self.identifiers.validate(m.as_str());
                if !result.is_valid
                    || mentions
                        .iter()
                        .any(|other| other.number == result.container_number)
                {
                    continue;
                }

                mentions.push(Mention {
                    span: m.range(),
                    number: result.container_number,
                });
            }
        }

        mentions.sort_by_key(|mention| mention.span.start);
        mentions
    }

    /// Fills every field of `item` that is still empty from `fragment`.
    pub(super) fn fill_from_text(&self, item: &mut ParsedItem, fragment: &str) {
        if item.status_code.is_none()
            && let Some((code, token)) = find_status_keyword(fragment)
        {
            item.status_code = Some(code);
            item.status_text = Some(token.to_string());
        }

        // Route first, so its endpoints are not taken for the current location.
        fill_route(item, fragment);

        if item.location.is_none()
            && let Some((name, location_type)) = self.find_location(item, fragment)
        {
            item.location = Some(name);
            item.location_type = location_type;
        }

        if item.distance_km.is_none() {
            item.distance_km = DISTANCE_PATTERNS
                .iter()
                .find_map(|pattern| first_group(pattern.captures(fragment)?))
                .and_then(parse_distance);
        }

        if item.eta.is_none() {
            item.eta = ETA_PATTERNS
                .iter()
                .find_map(|pattern| first_group(pattern.captures(fragment)?))
                .map(|raw| self.normalize_date(raw));
        }

        if item.unload_eta.is_none() {
            item.unload_eta = UNLOAD_ETA_PATTERNS
                .iter()
                .find_map(|pattern| first_group(pattern.captures(fragment)?))
                .map(|raw| self.normalize_date(raw));
        }

        if item.event_time.is_none() {
            item.event_time = EVENT_DATE_PATTERNS
                .iter()
                .find_map(|pattern| first_group(pattern.captures(fragment)?))
                .map(|raw| {
                    parse_datetime(raw, self.reference_year)
                        .map_or_else(|| raw.to_string(), |dt| dt.to_rfc3339())
                });
        }

        if item.carrier_name.is_none() {
            if let Some(name) = CARRIER_LABEL.captures(fragment).and_then(first_group) {
                item.carrier_name = Some(name.to_string());
                item.carrier_type = find_known_carrier(name).map(|c| c.carrier_type);
            } else if let Some(carrier) = find_known_carrier(fragment) {
                item.carrier_name = Some(carrier.name.to_string());
                item.carrier_type = Some(carrier.carrier_type);
            }
        }

        if item.source_info.is_none() {
            item.source_info = SOURCE_LABEL
                .captures(fragment)
                .and_then(first_group)
                .map(ToString::to_string);
        }

        if item.comment.is_none() {
            item.comment = COMMENT_LABEL
                .captures(fragment)
                .and_then(first_group)
                .map(ToString::to_string);
        }
    }

    fn find_location(
        &self,
        item: &ParsedItem,
        fragment: &str,
    ) -> Option<(String, Option<LocationType>)> {
        for (pattern, location_type) in LOCATION_PATTERNS.iter() {
            for caps in pattern.captures_iter(fragment) {
                let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                if follows_destination_marker(&fragment[..whole.start()]) {
                    continue;
                }
                let Some(name) = clean_place(name.as_str()) else {
                    continue;
                };
                let location_type = location_type.or_else(|| infer_location_type(name));
                return Some((name.to_string(), location_type));
            }
        }

        let mut scrubbed = fragment.to_string();
        for endpoint in [&item.origin, &item.destination].into_iter().flatten() {
            scrubbed = scrubbed.replace(endpoint.as_str(), " ");
        }
        let hit = self.locations.gazetteer().find_in(&scrubbed)?;
        Some((hit.location.name.clone(), Some(hit.location.location_type)))
    }

    /// ISO date when `raw` parses, otherwise `raw` as written.
    pub(super) fn normalize_date(&self, raw: &str) -> String {
        parse_date(raw, self.reference_year).map_or_else(|| raw.trim().to_string(), to_iso)
    }
}

fn fill_route(item: &mut ParsedItem, fragment: &str) {
    for (pattern, capture) in ROUTE_PATTERNS.iter() {
        let Some(caps) = pattern.captures(fragment) else {
            continue;
        };
        let first = caps.get(1).and_then(|m| clean_place(m.as_str()));
        let second = caps.get(2).and_then(|m| clean_place(m.as_str()));

        let (origin, destination) = match capture {
            RouteCapture::Both => (first, second),
            RouteCapture::Destination => (None, first),
            RouteCapture::Origin => (first, None),
        };
        if origin.is_none() && destination.is_none() {
            continue;
        }

        if item.origin.is_none() {
            item.origin = origin.map(ToString::to_string);
        }
        if item.destination.is_none() {
            item.destination = destination.map(ToString::to_string);
        }
        if item.origin.is_some() && item.destination.is_some() {
            return;
        }
    }
}

fn first_group<'t>(caps: Captures<'t>) -> Option<&'t str> {
    caps.get(1)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

/// Parses `1857`, `1 857`, or `-3` (the validator rejects negatives).
fn parse_distance(raw: &str) -> Option<i64> {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .parse()
        .ok()
}

/// Whether the text before a match ends with a destination marker word.
fn follows_destination_marker(prefix: &str) -> bool {
    let lower = prefix.trim_end().to_lowercase();
    DESTINATION_MARKERS.iter().any(|marker| {
        lower.strip_suffix(marker).is_some_and(|before| {
            before
                .chars()
                .next_back()
                .is_none_or(|c| !c.is_alphanumeric())
        })
    })
}

/// Trims a captured place name, dropping leading container numbers the
/// capture swallowed (`MSKU1111112 Шанхай`). `None` when nothing
/// place-like remains.
fn clean_place(name: &str) -> Option<&str> {
    let is_code = |word: &str| word.chars().filter(char::is_ascii_digit).count() >= 4;

    let mut rest = name.trim().trim_end_matches('-').trim_end();
    while let Some((head, tail)) = rest.split_once(' ')
        && is_code(head)
    {
        rest = tail.trim_start();
    }

    (rest.chars().any(char::is_alphabetic) && !is_code(rest)).then_some(rest)
}

#[cfg(test)]
mod tests {
    use boxtrack_container_models::{CarrierType, StatusCode};

    use super::super::test_support::Fixture;
    use super::*;

    #[test]
    fn extracts_operator_email_fields() {
        let fixture = Fixture::builtin();
        let outcome = fixture.extractor().extract_text(
            "Контейнер MSCU1234560 на станции Гончарово, 1857 км до Иня-Восточная. ETA 04.12.2025",
        );

        assert!(outcome.errors.is_empty());
        assert!(outcome.warnings.is_empty());
        let item = &outcome.items[0];
        assert_eq!(item.status_text.as_deref(), Some("на станции"));
        assert_eq!(item.location_type, Some(LocationType::Station));
        assert_eq!(item.destination.as_deref(), Some("Иня-Восточная"));
        assert_eq!(item.origin, None);
    }

    #[test]
    fn splits_multiple_containers_into_segments() {
        let fixture = Fixture::builtin();
        let outcome = fixture.extractor().extract_text(
            "MSCU1234566 в порту Владивосток.\nCSQU3054383 погружен на судно, ETA 10.01.2026",
        );

        assert_eq!(outcome.items.len(), 2);
        let first = &outcome.items[0];
        let second = &outcome.items[1];
        assert_eq!(first.container_number.as_deref(), Some("MSCU1234566"));
        assert_eq!(first.status_code, Some(StatusCode::InPort));
        assert_eq!(first.location.as_deref(), Some("Владивосток"));
        assert_eq!(second.container_number.as_deref(), Some("CSQU3054383"));
        assert_eq!(second.status_code, Some(StatusCode::OnShip));
        assert_eq!(second.eta.as_deref(), Some("2026-01-10"));
        // The second container falls back to the shared location.
        assert_eq!(second.location.as_deref(), Some("Владивосток"));
    }

    #[test]
    fn repeated_number_yields_one_item() {
        let fixture = Fixture::builtin();
        let outcome = fixture
            .extractor()
            .extract_text("MSCU1234566 в пути. Повторяю: MSCU 1234566 в пути по ЖД");
        assert_eq!(outcome.items.len(), 1);
    }

    #[test]
    fn repairs_typos_in_free_text() {
        let fixture = Fixture::builtin();
        let outcome = fixture
            .extractor()
            .extract_text("контейнер mscu123456 прибыл в порт Находка");

        assert_eq!(outcome.items.len(), 1);
        let item = &outcome.items[0];
        assert_eq!(item.container_number.as_deref(), Some("MSCU1234566"));
        assert_eq!(item.status_code, Some(StatusCode::ArrivedPort));
        assert_eq!(item.location.as_deref(), Some("Находка"));
    }

    #[test]
    fn finds_lowercase_container_number() {
        let fixture = Fixture::builtin();
        let outcome = fixture
            .extractor()
            .extract_text("mscu1234566 в порту Владивосток");

        assert_eq!(outcome.items.len(), 1);
        assert_eq!(
            outcome.items[0].container_number.as_deref(),
            Some("MSCU1234566")
        );
        assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    }

    #[test]
    fn distance_right_after_container_number() {
        let fixture = Fixture::builtin();
        let outcome = fixture
            .extractor()
            .extract_text("Контейнер MSCU1234566 100 км до станции Гончарово");
        assert_eq!(outcome.items[0].distance_km, Some(100));
    }

    #[test]
    fn distance_right_after_date() {
        let fixture = Fixture::builtin();
        let outcome = fixture
            .extractor()
            .extract_text("MSCU1234566 в пути, ETA 04.12.2025 500 км до Гончарово");
        assert_eq!(outcome.items[0].distance_km, Some(500));
        assert_eq!(outcome.items[0].eta.as_deref(), Some("2025-12-04"));
    }

    #[test]
    fn grouped_distance_in_text() {
        let fixture = Fixture::builtin();
        let outcome = fixture
            .extractor()
            .extract_text("MSCU1234566 в пути, осталось 1 857 км");
        assert_eq!(outcome.items[0].distance_km, Some(1857));
    }

    #[test]
    fn status_without_container_is_salvaged_with_warning() {
        let fixture = Fixture::builtin();
        let outcome = fixture
            .extractor()
            .extract_text("Груз прибыл на станцию Забайкальск");

        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].container_number, None);
        assert_eq!(outcome.items[0].status_code, Some(StatusCode::ArrivedStation));
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn nothing_recognizable_is_an_error() {
        let fixture = Fixture::builtin();
        let outcome = fixture.extractor().extract_text("Добрый день, спасибо!");
        assert!(outcome.items.is_empty());
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn route_arrow_fills_origin_and_destination() {
        let fixture = Fixture::builtin();
        let outcome = fixture
            .extractor()
            .extract_text("MSKU1111112 Шанхай → Москва, на судне");

        let item = &outcome.items[0];
        assert_eq!(item.origin.as_deref(), Some("Шанхай"));
        assert_eq!(item.destination.as_deref(), Some("Москва"));
        assert_eq!(item.status_code, Some(StatusCode::OnShip));
        // Route endpoints are not the current location.
        assert_eq!(item.location, None);
    }

    #[test]
    fn carrier_source_and_comment_labels() {
        let fixture = Fixture::builtin();
        let outcome = fixture.extractor().extract_text(
            "MSCU1234566 в пути. Перевозчик: ТрансКонтейнер\nИсточник: диспетчер\nКомментарий: пломба цела",
        );

        let item = &outcome.items[0];
        assert_eq!(item.carrier_name.as_deref(), Some("ТрансКонтейнер"));
        assert_eq!(item.carrier_type, Some(CarrierType::Rail));
        assert_eq!(item.source_info.as_deref(), Some("диспетчер"));
        assert_eq!(item.comment.as_deref(), Some("пломба цела"));
    }

    #[test]
    fn unparsable_eta_is_kept_raw() {
        let fixture = Fixture::builtin();
        let outcome = fixture
            .extractor()
            .extract_text("MSCU1234566 в пути, ETA: на следующей неделе");
        assert_eq!(outcome.items[0].eta.as_deref(), Some("на следующей неделе"));
    }

    #[test]
    fn distance_with_thousands_separator() {
        assert_eq!(parse_distance("1 857"), Some(1857));
        assert_eq!(parse_distance("-3"), Some(-3));
        assert_eq!(parse_distance("x"), None);
    }

    #[test]
    fn place_names_drop_swallowed_container_numbers() {
        assert_eq!(clean_place("MSKU1111112 Шанхай"), Some("Шанхай"));
        assert_eq!(clean_place("Хабаровск-2"), Some("Хабаровск-2"));
        assert_eq!(clean_place("MSKU1111112"), None);
        assert_eq!(clean_place("  "), None);
    }

    #[test]
    fn destination_marker_needs_word_boundary() {
        assert!(follows_destination_marker("1857 км до "));
        assert!(follows_destination_marker("to "));
        assert!(!follows_destination_marker("погружено "));
        assert!(!follows_destination_marker("на "));
    }
}
