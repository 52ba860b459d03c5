//! Location resolution against the gazetteer.

use std::sync::LazyLock;

use boxtrack_container_models::{Location, LocationType};
use boxtrack_normalize_models::LocationMatchResult;
use boxtrack_reference::Gazetteer;
use regex::Regex;

use crate::config::LocationScoring;

/// A capitalized place name of one or more words, e.g. `Иня-Восточная`,
/// `Белый Раст`, `Хабаровск-2`.
pub const PLACE_NAME: &str = r"(\p{Lu}[\p{L}\d]*(?:[- ][\p{Lu}\d][\p{L}\d]*)*)";

/// Ordered (pattern, implied type) table for "station X" / "port X" style
/// mentions. Keywords match case-insensitively; the captured name must be
/// capitalized.
static CONTEXT_PATTERNS: LazyLock<Vec<(Regex, LocationType)>> = LazyLock::new(|| {
    [
        (r"(?i:таможенн\w*\s+пост\w*|customs\s+post)", LocationType::Customs),
        (r"(?i:склад\w*|тлц|warehouse|terminal)", LocationType::Warehouse),
        (r"(?i:порт[уае]?|port\s+of|port)", LocationType::Port),
        (r"(?i:станци[яиюей]|station|stn\.?)", LocationType::Station),
        (r"(?i:ст\.)", LocationType::Station),
        (r"(?i:город[еа]?|city|г\.)", LocationType::City),
    ]
    .into_iter()
    .map(|(keyword, location_type)| {
        let pattern = format!(r"\b{keyword}\s*{PLACE_NAME}");
        (Regex::new(&pattern).expect("valid regex"), location_type)
    })
    .collect()
});

/// Ordered keyword table for [`infer_location_type`].
const TYPE_KEYWORDS: &[(LocationType, &[&str])] = &[
    (LocationType::Customs, &["тамож", "свх", "customs"]),
    (
        LocationType::Warehouse,
        &["склад", "тлц", "терминал", "warehouse", "depot", "terminal"],
    ),
    (
        LocationType::Port,
        &["порт ", "порту", "порта", "морпорт", "причал", "port", "harbor", "harbour"],
    ),
    (
        LocationType::Station,
        &["станц", "ст.", "ж/д", "жд ", "station", "railway", "rail"],
    ),
    (LocationType::City, &["город", "г.", "city"]),
];

/// Infers the kind of place a fragment talks about from contextual
/// keywords, ignoring gazetteer membership.
#[must_use]
pub fn infer_location_type(text: &str) -> Option<LocationType> {
    let lower = format!("{} ", text.to_lowercase());
    TYPE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|&(location_type, _)| location_type)
}

/// Title-cases each word and each hyphen-separated part
/// (`"иня-восточная"` → `"Иня-Восточная"`).
#[must_use]
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.trim().chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        at_word_start = c.is_whitespace() || c == '-';
    }
    out
}

/// Maps a byte offset in `text.to_lowercase()` back onto `text`. Only
/// possible when lowercasing preserved byte lengths.
fn original_slice<'t>(text: &'t str, lowered_len: usize, start: usize, len: usize) -> Option<&'t str> {
    if text.len() != lowered_len {
        return None;
    }
    text.get(start..start + len)
}

#[derive(Debug, Clone, Copy)]
pub struct LocationResolver<'a> {
    gazetteer: &'a Gazetteer,
    scoring: &'a LocationScoring,
}

impl<'a> LocationResolver<'a> {
    #[must_use]
    pub const fn new(gazetteer: &'a Gazetteer, scoring: &'a LocationScoring) -> Self {
        Self { gazetteer, scoring }
    }

    #[must_use]
    pub const fn gazetteer(&self) -> &'a Gazetteer {
        self.gazetteer
    }

    /// Resolves a location mention.
    ///
    /// Tries, in order: any gazetteer alias contained in the text, then a
    /// contextual "station X" / "port X" capture (registered if the name is
    /// in the gazetteer, otherwise an unregistered guess of the implied
    /// type).
    #[must_use]
    pub fn resolve(&self, text: &str) -> LocationMatchResult {
        if text.trim().is_empty() {
            return LocationMatchResult::not_found();
        }

        if let Some(hit) = self.gazetteer.find_in(text) {
            // find_in searches the trimmed, lowercased text.
            let trimmed = text.trim();
            let lowered_len = trimmed.to_lowercase().replace('ё', "е").len();
            let matched = original_slice(trimmed, lowered_len, hit.position, hit.alias.len())
                .map_or_else(|| hit.alias.to_string(), ToString::to_string);
            log::trace!("location {text:?} -> {}", hit.location.name);
            return self.registered(hit.location, matched);
        }

        for (pattern, location_type) in CONTEXT_PATTERNS.iter() {
            let Some(name) = pattern.captures(text).and_then(|caps| caps.get(1)) else {
                continue;
            };
            let name = name.as_str().trim_end_matches('-');

            if let Some(location) = self.gazetteer.get(name) {
                return self.registered(location, name.to_string());
            }

            return LocationMatchResult {
                found: true,
                location: Some(Location {
                    name: title_case(name),
                    location_type: *location_type,
                    aliases: Vec::new(),
                    region: None,
                    country: None,
                }),
                registered: false,
                matched_text: Some(name.to_string()),
                confidence: self.scoring.contextual_guess.clamp(0.0, 1.0),
            };
        }

        LocationMatchResult::not_found()
    }

    fn registered(&self, location: &Location, matched_text: String) -> LocationMatchResult {
        LocationMatchResult {
            found: true,
            location: Some(location.clone()),
            registered: true,
            matched_text: Some(matched_text),
            confidence: self.scoring.registered.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Gazetteer {
        Gazetteer::from_locations(vec![
            Location {
                name: "Гончарово".to_string(),
                location_type: LocationType::Station,
                aliases: vec!["Goncharovo".to_string()],
                region: Some("Иркутская область".to_string()),
                country: Some("Россия".to_string()),
            },
            Location {
                name: "Находка".to_string(),
                location_type: LocationType::Port,
                aliases: vec![],
                region: None,
                country: None,
            },
        ])
        .unwrap()
    }

    #[test]
    fn resolves_substring_against_fixture() {
        let gazetteer = fixture();
        let scoring = LocationScoring::default();
        let resolver = LocationResolver::new(&gazetteer, &scoring);

        let result = resolver.resolve("на станции Гончарово, 1857 км");
        assert!(result.found);
        assert!(result.registered);
        assert_eq!(result.location.unwrap().name, "Гончарово");
        assert_eq!(result.matched_text.as_deref(), Some("Гончарово"));
        assert!((result.confidence - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn canonical_name_resolves_to_itself() {
        let gazetteer = Gazetteer::builtin();
        let scoring = LocationScoring::default();
        let resolver = LocationResolver::new(&gazetteer, &scoring);

        for location in gazetteer.locations() {
            let result = resolver.resolve(&location.name);
            assert!(result.registered, "{}", location.name);
            assert_eq!(result.location.as_ref().unwrap().name, location.name);
            assert!(result.confidence >= 0.95);
        }
    }

    #[test]
    fn contextual_capture_guesses_unregistered_station() {
        let gazetteer = fixture();
        let scoring = LocationScoring::default();
        let resolver = LocationResolver::new(&gazetteer, &scoring);

        let result = resolver.resolve("прибыл на станцию Тайшет вчера");
        assert!(result.found);
        assert!(!result.registered);
        let location = result.location.unwrap();
        assert_eq!(location.name, "Тайшет");
        assert_eq!(location.location_type, LocationType::Station);
        assert!((result.confidence - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn contextual_capture_guesses_port() {
        let gazetteer = fixture();
        let scoring = LocationScoring::default();
        let resolver = LocationResolver::new(&gazetteer, &scoring);

        let result = resolver.resolve("arrived at port Vostochny");
        assert_eq!(
            result.location.map(|l| l.location_type),
            Some(LocationType::Port)
        );
    }

    #[test]
    fn nothing_found() {
        let gazetteer = fixture();
        let scoring = LocationScoring::default();
        let resolver = LocationResolver::new(&gazetteer, &scoring);

        let result = resolver.resolve("в пути, всё по плану");
        assert!(!result.found);
        assert!(result.confidence.abs() < f64::EPSILON);
        assert!(!resolver.resolve("").found);
    }

    #[test]
    fn infers_types_from_keywords() {
        assert_eq!(infer_location_type("станция Тайшет"), Some(LocationType::Station));
        assert_eq!(infer_location_type("порт Восточный"), Some(LocationType::Port));
        assert_eq!(infer_location_type("СВХ Ворсино"), Some(LocationType::Customs));
        assert_eq!(
            infer_location_type("таможенный пост Забайкальск"),
            Some(LocationType::Customs)
        );
        assert_eq!(
            infer_location_type("Новосибирская таможня"),
            Some(LocationType::Customs)
        );
        assert_eq!(infer_location_type("склад Подольск"), Some(LocationType::Warehouse));
        assert_eq!(infer_location_type("г. Казань"), Some(LocationType::City));
        assert_eq!(infer_location_type("Тайшет"), None);
    }

    #[test]
    fn title_cases_hyphenated_names() {
        assert_eq!(title_case("иня-восточная"), "Иня-Восточная");
        assert_eq!(title_case("  ПЕРВАЯ РЕЧКА "), "Первая Речка");
    }
}
