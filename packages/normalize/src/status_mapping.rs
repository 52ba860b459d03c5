//! Status token mapping.
//!
//! Maps operator wording (Russian and English) onto the canonical
//! [`StatusCode`] vocabulary. The keyword table is ordered: specific
//! phrases ("прибыл в порт") come before generic ones ("в порт") so
//! overlapping keywords always resolve to the most specific code.

use std::str::FromStr;

use boxtrack_container_models::StatusCode;

/// Ordered (outcome, keywords) table. The first row with any keyword
/// contained in the lowercased text wins.
const STATUS_KEYWORDS: &[(StatusCode, &[&str])] = &[
    (
        StatusCode::Delivered,
        &[
            "доставлен",
            "выдан получателю",
            "выдан клиенту",
            "получен клиентом",
            "delivered",
            "handed over",
        ],
    ),
    (
        StatusCode::ReturnedEmpty,
        &[
            "возвращен порожн",
            "возврат порожн",
            "сдан порожн",
            "порожний возврат",
            "returned empty",
            "empty return",
        ],
    ),
    (
        StatusCode::ArrivedPort,
        &[
            "прибыл в порт",
            "прибыл в морской порт",
            "выгружен в порту",
            "выгружен с судна",
            "arrived at port",
            "arrived in port",
            "arrived port",
            "discharged",
        ],
    ),
    (
        StatusCode::ArrivedStation,
        &[
            "прибыл на ст",
            "прибыл на жд",
            "прибыл на ж/д",
            "arrived at station",
            "arrived at rail",
            "arrived station",
        ],
    ),
    (
        StatusCode::OnShip,
        &[
            "на судне",
            "погружен на судно",
            "в пути морем",
            "морем",
            "on vessel",
            "on board",
            "on ship",
            "at sea",
            "sailing",
        ],
    ),
    (
        StatusCode::OnTruck,
        &[
            "автотранспорт",
            "на авто",
            "автомобил",
            "на машине",
            "on truck",
            "by truck",
            "trucking",
        ],
    ),
    (
        StatusCode::Customs,
        &[
            "тамож",
            "растаможк",
            "на свх",
            "customs",
            "clearance",
        ],
    ),
    (
        StatusCode::Delayed,
        &["задерж", "простой", "delayed", "delay", "on hold"],
    ),
    (
        StatusCode::OnWarehouse,
        &[
            "на складе",
            "на склад",
            "в тлц",
            "на терминале",
            "warehouse",
            "in storage",
            "stored",
        ],
    ),
    (
        StatusCode::InPort,
        &["в порту", "в порт", "in port", "at port", "at terminal"],
    ),
    (
        StatusCode::OnRail,
        &[
            "в пути по жд",
            "в пути по ж/д",
            "по жд",
            "по ж/д",
            "на станции",
            "следует",
            "в пути",
            "on rail",
            "by rail",
            "railway",
            "in transit",
        ],
    ),
    (
        StatusCode::Loaded,
        &["погружен", "погрузка", "загружен", "отгружен", "loaded", "loading"],
    ),
];

/// Parses a canonical code written with any case and with spaces or
/// hyphens in place of underscores (`"on rail"`, `"ON-RAIL"`).
#[must_use]
pub fn canonical_status(raw: &str) -> Option<StatusCode> {
    let token = raw.trim().replace([' ', '-'], "_");
    if token.is_empty() {
        return None;
    }
    StatusCode::from_str(&token).ok()
}

/// Scans free text for an embedded canonical code or a status keyword,
/// returning the code and the token that matched.
#[must_use]
pub fn find_status_keyword(text: &str) -> Option<(StatusCode, &'static str)> {
    if let Some(code) = StatusCode::known()
        .iter()
        .copied()
        .find(|code| text.contains(code.as_ref()))
    {
        let token: &'static str = code.into();
        return Some((code, token));
    }

    let lower = text.to_lowercase().replace('ё', "е");
    STATUS_KEYWORDS.iter().find_map(|&(code, keywords)| {
        keywords
            .iter()
            .find(|keyword| lower.contains(*keyword))
            .map(|&keyword| (code, keyword))
    })
}

/// Scans free text for a status keyword or an embedded canonical code.
#[must_use]
pub fn find_status(text: &str) -> Option<StatusCode> {
    find_status_keyword(text).map(|(code, _)| code)
}

/// Maps a raw status token to the canonical vocabulary, falling back to
/// [`StatusCode::Unknown`].
#[must_use]
pub fn map_status(raw: &str) -> StatusCode {
    canonical_status(raw)
        .or_else(|| find_status(raw))
        .unwrap_or(StatusCode::Unknown)
}
