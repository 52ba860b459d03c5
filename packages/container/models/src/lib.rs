#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Container status vocabulary and location taxonomy.
//!
//! This crate defines the canonical status codes every input format is
//! normalized into, the location types used by the gazetteer, and the
//! fixed table of which location types are plausible for each status.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Canonical container status code.
///
/// Every normalized status event carries exactly one of these. Input that
/// cannot be mapped is kept as [`StatusCode::Unknown`] rather than dropped.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum StatusCode {
    /// Loaded onto transport at origin
    Loaded,
    /// Aboard a vessel at sea
    OnShip,
    /// Vessel has arrived at the port of discharge
    ArrivedPort,
    /// Sitting in a port terminal
    InPort,
    /// Under customs clearance
    Customs,
    /// Moving by rail
    OnRail,
    /// Arrived at the destination rail station
    ArrivedStation,
    /// Moving by road
    OnTruck,
    /// Stored in a warehouse or terminal yard
    OnWarehouse,
    /// Handed over to the consignee
    Delivered,
    /// Empty container returned to the owner's depot
    ReturnedEmpty,
    /// Movement is held up
    Delayed,
    /// Status could not be determined
    Unknown,
}

impl StatusCode {
    /// Returns every known status code, excluding [`Self::Unknown`].
    #[must_use]
    pub const fn known() -> &'static [Self] {
        &[
            Self::Loaded,
            Self::OnShip,
            Self::ArrivedPort,
            Self::InPort,
            Self::Customs,
            Self::OnRail,
            Self::ArrivedStation,
            Self::OnTruck,
            Self::OnWarehouse,
            Self::Delivered,
            Self::ReturnedEmpty,
            Self::Delayed,
        ]
    }

    /// Returns `true` for every code except [`Self::Unknown`].
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Human-readable status text as shown to operators.
    #[must_use]
    pub const fn human_text(self) -> &'static str {
        match self {
            Self::Loaded => "Погружен",
            Self::OnShip => "В пути морем",
            Self::ArrivedPort => "Прибыл в порт",
            Self::InPort => "В порту",
            Self::Customs => "Таможенное оформление",
            Self::OnRail => "В пути по ЖД",
            Self::ArrivedStation => "Прибыл на станцию",
            Self::OnTruck => "В пути автотранспортом",
            Self::OnWarehouse => "На складе",
            Self::Delivered => "Доставлен",
            Self::ReturnedEmpty => "Возвращен порожним",
            Self::Delayed => "Задержан",
            Self::Unknown => "Статус неизвестен",
        }
    }

    /// Location types that are consistent with this status.
    ///
    /// An empty slice means the status places no requirement on the
    /// location type.
    #[must_use]
    pub const fn expected_location_types(self) -> &'static [LocationType] {
        match self {
            Self::ArrivedPort | Self::InPort => &[LocationType::Port],
            Self::Customs => &[
                LocationType::Customs,
                LocationType::Port,
                LocationType::Warehouse,
            ],
            Self::OnRail | Self::ArrivedStation => &[LocationType::Station],
            Self::OnWarehouse => &[LocationType::Warehouse, LocationType::Customs],
            Self::Delivered => &[LocationType::City, LocationType::Warehouse],
            Self::Loaded
            | Self::OnShip
            | Self::OnTruck
            | Self::ReturnedEmpty
            | Self::Delayed
            | Self::Unknown => &[],
        }
    }

    /// Returns `true` if `location_type` is acceptable for this status.
    #[must_use]
    pub fn accepts_location(self, location_type: LocationType) -> bool {
        let expected = self.expected_location_types();
        expected.is_empty() || expected.contains(&location_type)
    }
}

/// Kind of place a container can be reported at.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum LocationType {
    /// Rail station
    Station,
    /// Sea or river port
    Port,
    /// City or settlement
    City,
    /// Warehouse, terminal yard, or logistics center
    Warehouse,
    /// Customs post or bonded warehouse
    Customs,
}

/// A gazetteer entry.
///
/// Aliases are matched case-insensitively; the canonical `name` is itself
/// always treated as an alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Canonical display name (e.g. "Гончарово").
    pub name: String,
    /// What kind of place this is.
    #[serde(rename = "type")]
    pub location_type: LocationType,
    /// Alternative spellings and transliterations.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Administrative region, if known.
    #[serde(default)]
    pub region: Option<String>,
    /// Country name, if known.
    #[serde(default)]
    pub country: Option<String>,
}

/// Transport mode a carrier operates.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum CarrierType {
    /// Rail operator
    Rail,
    /// Ocean shipping line
    Sea,
    /// Trucking company
    Road,
}
