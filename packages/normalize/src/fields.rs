//! Canonical record fields and the column/key names that map to them.

/// A field of a parsed item that structured input can supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Container,
    Status,
    Location,
    Distance,
    Eta,
    UnloadEta,
    EventTime,
    Origin,
    Destination,
    Carrier,
    Comment,
    Source,
}

/// Accepted key names per field, already in [`normalize_key`] form.
const FIELD_ALIASES: &[(Field, &[&str])] = &[
    (
        Field::Container,
        &[
            "container",
            "containernumber",
            "containerno",
            "containernum",
            "containerid",
            "cntr",
            "cntrno",
            "equipment",
            "equipmentnumber",
            "number",
            "номерконтейнера",
            "контейнер",
            "ктк",
            "номер",
        ],
    ),
    (
        Field::Status,
        &[
            "status",
            "state",
            "event",
            "operation",
            "статус",
            "состояние",
            "событие",
            "операция",
        ],
    ),
    (
        Field::Location,
        &[
            "location",
            "currentlocation",
            "place",
            "position",
            "station",
            "port",
            "местоположение",
            "местонахождение",
            "дислокация",
            "станциядислокации",
            "текущаястанция",
            "станция",
            "порт",
        ],
    ),
    (
        Field::Distance,
        &[
            "distance",
            "distancekm",
            "remainingdistance",
            "kmleft",
            "km",
            "расстояние",
            "осталоськм",
            "остатоккм",
            "км",
        ],
    ),
    (
        Field::Eta,
        &[
            "eta",
            "arrival",
            "arrivaldate",
            "estimatedarrival",
            "прибытие",
            "датаприбытия",
            "ожидаемоеприбытие",
            "плановаядатаприбытия",
        ],
    ),
    (
        Field::UnloadEta,
        &[
            "unloadeta",
            "unloaddate",
            "unloading",
            "dischargedate",
            "выгрузка",
            "датавыгрузки",
        ],
    ),
    (
        Field::EventTime,
        &[
            "date",
            "datetime",
            "eventdate",
            "eventtime",
            "timestamp",
            "time",
            "updated",
            "дата",
            "датаоперации",
            "времяоперации",
            "датасобытия",
        ],
    ),
    (
        Field::Origin,
        &[
            "origin",
            "from",
            "departure",
            "pol",
            "откуда",
            "отправление",
            "станцияотправления",
            "пунктотправления",
        ],
    ),
    (
        Field::Destination,
        &[
            "destination",
            "dest",
            "to",
            "pod",
            "куда",
            "назначение",
            "станцияназначения",
            "пунктназначения",
        ],
    ),
    (
        Field::Carrier,
        &[
            "carrier",
            "line",
            "shippingline",
            "operator",
            "перевозчик",
            "линия",
            "оператор",
        ],
    ),
    (
        Field::Comment,
        &["comment", "comments", "note", "notes", "remark", "комментарий", "примечание"],
    ),
    (Field::Source, &["source", "источник"]),
];

/// Lowercases a key and strips quotes, spaces, underscores, and hyphens.
#[must_use]
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '"' | '\'' | ' ' | '_' | '-' | '\t'))
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .replace('ё', "е")
}

/// Resolves a raw key or column header to a canonical field.
#[must_use]
pub fn resolve_field(key: &str) -> Option<Field> {
    let key = normalize_key(key);
    FIELD_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&key.as_str()))
        .map(|&(field, _)| field)
}
