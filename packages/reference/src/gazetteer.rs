//! Gazetteer of known locations with a lowercase alias index.

use std::collections::BTreeSet;

use boxtrack_container_models::{Location, LocationType};
use serde::Deserialize;

use crate::ReferenceError;

const BUILTIN_GAZETTEER: &str = include_str!("../data/gazetteer.toml");

/// Number of entries in the embedded gazetteer (used in tests).
#[cfg(test)]
const EXPECTED_LOCATION_COUNT: usize = 43;

#[derive(Debug, Deserialize)]
struct GazetteerFile {
    #[serde(default)]
    locations: Vec<Location>,
}

#[derive(Debug, Clone)]
struct AliasEntry {
    alias: String,
    location: usize,
}

/// A gazetteer hit inside a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GazetteerMatch<'a> {
    pub location: &'a Location,
    /// Lowercased alias that matched.
    pub alias: &'a str,
    /// Byte offset of the match in the lowercased text.
    pub position: usize,
}

/// Known locations, searchable by canonical name or alias.
#[derive(Debug, Clone)]
pub struct Gazetteer {
    locations: Vec<Location>,
    /// Sorted longest alias first so equal-position hits prefer the more
    /// specific name.
    index: Vec<AliasEntry>,
}

impl Gazetteer {
    /// Builds a gazetteer from a list of locations.
    ///
    /// # Errors
    ///
    /// * If a location has an empty name or alias
    /// * If two locations share a canonical name
    pub fn from_locations(locations: Vec<Location>) -> Result<Self, ReferenceError> {
        let mut names = BTreeSet::new();
        let mut index = Vec::new();

        for (i, location) in locations.iter().enumerate() {
            let name = normalize_alias(&location.name);
            if name.is_empty() {
                return Err(ReferenceError::EmptyName(i));
            }
            if !names.insert(name.clone()) {
                return Err(ReferenceError::DuplicateLocation(location.name.clone()));
            }

            let mut aliases = BTreeSet::new();
            aliases.insert(name);
            for alias in &location.aliases {
                let alias = normalize_alias(alias);
                if alias.is_empty() {
                    return Err(ReferenceError::EmptyName(i));
                }
                aliases.insert(alias);
            }

            index.extend(
                aliases
                    .into_iter()
                    .map(|alias| AliasEntry { alias, location: i }),
            );
        }

        index.sort_by(|a, b| {
            b.alias
                .chars()
                .count()
                .cmp(&a.alias.chars().count())
                .then_with(|| a.location.cmp(&b.location))
        });

        Ok(Self { locations, index })
    }

    /// Parses a gazetteer from TOML (`[[locations]]` tables).
    ///
    /// # Errors
    ///
    /// * If the TOML is malformed
    /// * If the entries fail [`Self::from_locations`] checks
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ReferenceError> {
        let file: GazetteerFile = toml::from_str(toml_str)?;
        Self::from_locations(file.locations)
    }

    /// The embedded gazetteer.
    ///
    /// # Panics
    ///
    /// Panics if the embedded table is malformed (it is checked by tests).
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_toml_str(BUILTIN_GAZETTEER)
            .unwrap_or_else(|e| panic!("Failed to parse gazetteer.toml: {e}"))
    }

    #[must_use]
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Exact lookup of a name or alias, ignoring case and surrounding
    /// whitespace.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Location> {
        let needle = normalize_alias(name);
        self.index
            .iter()
            .find(|entry| entry.alias == needle)
            .map(|entry| &self.locations[entry.location])
    }

    /// Finds the first alias occurring anywhere in `text`.
    ///
    /// The earliest match wins; at the same position the longest alias
    /// wins.
    #[must_use]
    pub fn find_in(&self, text: &str) -> Option<GazetteerMatch<'_>> {
        let haystack = normalize_alias(text);
        if haystack.is_empty() {
            return None;
        }

        let mut best: Option<GazetteerMatch<'_>> = None;
        for entry in &self.index {
            let Some(position) = haystack.find(&entry.alias) else {
                continue;
            };
            // Index is sorted longest first, so only a strictly earlier
            // position can replace the current best.
            if best.is_none_or(|b| position < b.position) {
                best = Some(GazetteerMatch {
                    location: &self.locations[entry.location],
                    alias: &entry.alias,
                    position,
                });
            }
        }

        best
    }

    /// Locations of the given type.
    pub fn of_type(&self, location_type: LocationType) -> impl Iterator<Item = &Location> {
        self.locations
            .iter()
            .filter(move |l| l.location_type == location_type)
    }
}

impl Default for Gazetteer {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Lowercases and trims a name, folding `ё` into `е`.
#[must_use]
pub fn normalize_alias(name: &str) -> String {
    name.trim().to_lowercase().replace('ё', "е")
}
