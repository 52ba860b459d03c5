//! Ordered pattern tables for free-text extraction.
//!
//! Each table is tried top to bottom and the first pattern that matches
//! wins, so new phrasings are added by inserting a row at the right
//! priority.

use std::sync::LazyLock;

use boxtrack_container_models::{CarrierType, LocationType};
use regex::Regex;

use crate::location::PLACE_NAME;
use crate::parsing::DATE_TOKEN;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

/// Identifier-shaped candidates, most trustworthy first.
pub static IDENTIFIER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // MSCU1234566, MSCU 1234566, mscu1234566
        r"\b((?i:[a-z]{4})\s?[0-9]{7})\b",
        // MSCU123456 (check digit missing)
        r"\b((?i:[a-z]{4})\s?[0-9]{6})\b",
        // контейнер mscu1234566, cntr: MSCU-123456-6
        r"(?i:контейнер\w*|конт\.|container|cntr|ктк)[\s:№#]*([A-Za-z0-9][A-Za-z0-9\-]{8,12}[A-Za-z0-9])",
        // MSC01234566, MSCUI234566
        r"\b([A-Z]{3}[A-Z0-9][0-9OILSB]{6,7})\b",
    ]
    .into_iter()
    .map(compile)
    .collect()
});

/// (pattern, implied location type). Group 1 is the place name.
pub static LOCATION_PATTERNS: LazyLock<Vec<(Regex, Option<LocationType>)>> =
    LazyLock::new(|| {
        vec![
            (
                compile(
                    r"(?i:местоположение|местонахождение|дислокация|текущая станция|current location|location)\s*[:\-]\s*([^\n,;.]+)",
                ),
                None,
            ),
            (
                compile(&format!(
                    r"\b(?i:станци[яиюей]|station)\s+{PLACE_NAME}"
                )),
                Some(LocationType::Station),
            ),
            (
                compile(&format!(r"\b(?i:ст\.)\s*{PLACE_NAME}")),
                Some(LocationType::Station),
            ),
            (
                compile(&format!(
                    r"\b(?i:таможенн\w*\s+пост\w*|customs\s+post|customs)\s+{PLACE_NAME}"
                )),
                Some(LocationType::Customs),
            ),
            (
                compile(&format!(
                    r"\b(?i:порт[уае]?|port\s+of|port)\s+{PLACE_NAME}"
                )),
                Some(LocationType::Port),
            ),
            (
                compile(&format!(
                    r"\b(?i:склад[еау]?|тлц|терминал[еау]?|warehouse|terminal)\s+{PLACE_NAME}"
                )),
                Some(LocationType::Warehouse),
            ),
        ]
    });

/// Markers that make a following place a destination rather than the
/// current location.
pub const DESTINATION_MARKERS: &[&str] = &["до", "to", "в направлении", "towards", "назначения"];

pub static DISTANCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i:расстояние|дистанция|остаток пути|distance|remaining distance)\s*[:\-]?\s*(-?\d{1,3}(?:[\s\x{a0}]\d{3})+|-?\d+)\b",
        // The number must start a token, not continue an id or a date.
        r"(?:^|[^\w.])(-?\d{1,3}(?:[\s\x{a0}]\d{3})+|-?\d+)\s*(?i:км|km)\b",
    ]
    .into_iter()
    .map(compile)
    .collect()
});

/// Labelled arrival dates. Group 1 is the date.
pub static ETA_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        compile(&format!(
            r"\b(?i:eta|estimated arrival|arrival|ожидаемое прибытие|дата прибытия|прибытие|прибудет|ожидается)\s*[:\-]?\s*(?i:ориентировочно|около|к|on|by|~)?\s*({DATE_TOKEN})"
        )),
        // ETA given but not a recognizable date; kept raw for the validator.
        compile(r"(?i:\beta)\s*[:\-]\s*([^\n,;]+)"),
    ]
});

pub static UNLOAD_ETA_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![compile(&format!(
        r"(?i:выгрузк\w*|разгрузк\w*|unload\w*|discharge)\D{{0,20}}?({DATE_TOKEN})"
    ))]
});

/// Labelled operation dates, optionally with a time.
pub static EVENT_DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![compile(&format!(
        r"(?i:по состоянию на|дата операции|дата|date|as of|updated|обновлено)\s*[:\-]?\s*({DATE_TOKEN}(?:\s+\d{{1,2}}:\d{{2}})?)"
    ))]
});

/// Which route endpoints a pattern captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteCapture {
    /// Group 1 is the origin, group 2 the destination.
    Both,
    Destination,
    Origin,
}

pub static ROUTE_PATTERNS: LazyLock<Vec<(Regex, RouteCapture)>> = LazyLock::new(|| {
    vec![
        (
            compile(&format!(r"{PLACE_NAME}\s*(?:→|->|—>|=>|➝)\s*{PLACE_NAME}")),
            RouteCapture::Both,
        ),
        (
            compile(&format!(
                r"\b(?i:из|from)\s+{PLACE_NAME}\s+(?i:в|во|на|до|to)\s+{PLACE_NAME}"
            )),
            RouteCapture::Both,
        ),
        (
            compile(&format!(r"{PLACE_NAME}\s+[-–—]\s+{PLACE_NAME}")),
            RouteCapture::Both,
        ),
        (
            compile(&format!(
                r"(?i:км до|km to|до станции|до ст\.|пункт назначения|станция назначения|назначение|destination|bound for|следует до|следует в)\s*[:\-]?\s*{PLACE_NAME}"
            )),
            RouteCapture::Destination,
        ),
        (
            compile(&format!(
                r"(?i:станция отправления|отправлен[аоы]? из|отправление|откуда|origin)\s*[:\-]?\s*{PLACE_NAME}"
            )),
            RouteCapture::Origin,
        ),
    ]
});

pub static CARRIER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i:перевозчик|carrier|линия|shipping line|оператор|operator)\s*[:\-]\s*([^\n,;.]+)")
});

pub static SOURCE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i:по данным|согласно|источник|according to|source)\s*[:\-]?\s*([^\n,;.]+)")
});

pub static COMMENT_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i:комментарий|примечание|коммент|comment|note|remark)\s*[:\-]\s*([^\n]+)")
});

/// A carrier the extractor recognizes by name.
#[derive(Debug)]
pub struct KnownCarrier {
    pub name: &'static str,
    pub carrier_type: CarrierType,
    pub aliases: &'static [&'static str],
}

const KNOWN_CARRIERS: &[KnownCarrier] = &[
    KnownCarrier {
        name: "РЖД",
        carrier_type: CarrierType::Rail,
        aliases: &["ржд", "rzd", "russian railways"],
    },
    KnownCarrier {
        name: "ТрансКонтейнер",
        carrier_type: CarrierType::Rail,
        aliases: &["трансконтейнер", "transcontainer"],
    },
    KnownCarrier {
        name: "ОТЛК ЕРА",
        carrier_type: CarrierType::Rail,
        aliases: &["отлк", "utlc"],
    },
    KnownCarrier {
        name: "FESCO",
        carrier_type: CarrierType::Sea,
        aliases: &["fesco", "феско"],
    },
    KnownCarrier {
        name: "Maersk",
        carrier_type: CarrierType::Sea,
        aliases: &["maersk", "маерск", "мерск"],
    },
    KnownCarrier {
        name: "MSC",
        carrier_type: CarrierType::Sea,
        aliases: &["msc", "mediterranean shipping"],
    },
    KnownCarrier {
        name: "COSCO",
        carrier_type: CarrierType::Sea,
        aliases: &["cosco", "коско"],
    },
    KnownCarrier {
        name: "CMA CGM",
        carrier_type: CarrierType::Sea,
        aliases: &["cma cgm", "cma-cgm"],
    },
    KnownCarrier {
        name: "Hapag-Lloyd",
        carrier_type: CarrierType::Sea,
        aliases: &["hapag-lloyd", "hapag lloyd", "хапаг"],
    },
    KnownCarrier {
        name: "Sinokor",
        carrier_type: CarrierType::Sea,
        aliases: &["sinokor", "синокор"],
    },
    KnownCarrier {
        name: "ПЭК",
        carrier_type: CarrierType::Road,
        aliases: &["пэк"],
    },
    KnownCarrier {
        name: "Деловые Линии",
        carrier_type: CarrierType::Road,
        aliases: &["деловые линии"],
    },
    KnownCarrier {
        name: "GlobalTruck",
        carrier_type: CarrierType::Road,
        aliases: &["globaltruck", "глобалтрак"],
    },
];

static CARRIER_PATTERNS: LazyLock<Vec<(Regex, &'static KnownCarrier)>> = LazyLock::new(|| {
    KNOWN_CARRIERS
        .iter()
        .flat_map(|carrier| {
            carrier.aliases.iter().map(move |alias| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(alias));
                (compile(&pattern), carrier)
            })
        })
        .collect()
});

/// Finds the earliest known carrier mentioned in `text`.
#[must_use]
pub fn find_known_carrier(text: &str) -> Option<&'static KnownCarrier> {
    CARRIER_PATTERNS
        .iter()
        .filter_map(|(pattern, carrier)| pattern.find(text).map(|m| (m.start(), *carrier)))
        .min_by_key(|&(start, _)| start)
        .map(|(_, carrier)| carrier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_patterns_compile() {
        assert_eq!(IDENTIFIER_PATTERNS.len(), 4);
        assert!(!LOCATION_PATTERNS.is_empty());
        assert!(!DISTANCE_PATTERNS.is_empty());
        assert!(!ETA_PATTERNS.is_empty());
        assert!(!UNLOAD_ETA_PATTERNS.is_empty());
        assert!(!EVENT_DATE_PATTERNS.is_empty());
        assert!(!ROUTE_PATTERNS.is_empty());
        assert!(CARRIER_PATTERNS.len() >= KNOWN_CARRIERS.len());
        assert!(CARRIER_LABEL.is_match("Перевозчик: ТрансКонтейнер"));
    }

    #[test]
    fn finds_known_carrier_by_alias() {
        let carrier = find_known_carrier("по данным РЖД вагон в пути").unwrap();
        assert_eq!(carrier.name, "РЖД");
        assert_eq!(carrier.carrier_type, CarrierType::Rail);
    }

    #[test]
    fn carrier_alias_needs_word_boundary() {
        // "msc" inside a container number is not the carrier.
        assert!(find_known_carrier("MSCU1234566 в пути").is_none());
    }

    #[test]
    fn earliest_carrier_wins() {
        let carrier = find_known_carrier("FESCO, далее РЖД").unwrap();
        assert_eq!(carrier.name, "FESCO");
    }
}
