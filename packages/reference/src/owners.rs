//! Registry of known owner-code prefixes.
//!
//! A prefix is the owner code plus the equipment category letter, i.e. the
//! first four characters of a container number.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::ReferenceError;

const BUILTIN_OWNERS: &str = include_str!("../data/owner_codes.toml");

#[derive(Debug, Deserialize)]
struct OwnersFile {
    #[serde(default)]
    owners: Vec<OwnerEntry>,
}

#[derive(Debug, Deserialize)]
struct OwnerEntry {
    code: String,
    #[serde(default)]
    name: Option<String>,
}

/// Set of known four-letter prefixes, each with an optional operator name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerRegistry {
    prefixes: BTreeMap<String, Option<String>>,
}

impl OwnerRegistry {
    /// Parses a registry from TOML (`[[owners]]` tables with `code` and
    /// optional `name`).
    ///
    /// # Errors
    ///
    /// * If the TOML is malformed
    /// * If any code is not four ASCII letters
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ReferenceError> {
        let file: OwnersFile = toml::from_str(toml_str)?;
        let mut prefixes = BTreeMap::new();

        for entry in file.owners {
            let code = normalize_code(&entry.code)?;
            prefixes.insert(code, entry.name);
        }

        Ok(Self { prefixes })
    }

    /// Builds a registry from bare codes.
    ///
    /// # Errors
    ///
    /// * If any code is not four ASCII letters
    pub fn from_codes<I, S>(codes: I) -> Result<Self, ReferenceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prefixes = codes
            .into_iter()
            .map(|code| normalize_code(code.as_ref()).map(|code| (code, None)))
            .collect::<Result<_, _>>()?;

        Ok(Self { prefixes })
    }

    /// The embedded registry.
    ///
    /// # Panics
    ///
    /// Panics if the embedded table is malformed (it is checked by tests).
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_toml_str(BUILTIN_OWNERS)
            .unwrap_or_else(|e| panic!("Failed to parse owner_codes.toml: {e}"))
    }

    /// Whether `prefix` (case-insensitive) is a known owner prefix.
    #[must_use]
    pub fn contains(&self, prefix: &str) -> bool {
        self.prefixes.contains_key(&prefix.to_ascii_uppercase())
    }

    /// Operator name registered for `prefix`, if any.
    #[must_use]
    pub fn name(&self, prefix: &str) -> Option<&str> {
        self.prefixes
            .get(&prefix.to_ascii_uppercase())
            .and_then(Option::as_deref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Iterates over the registered prefixes in sorted order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.prefixes.keys().map(String::as_str)
    }
}

fn normalize_code(code: &str) -> Result<String, ReferenceError> {
    let code = code.trim().to_ascii_uppercase();
    if code.len() == 4 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(code)
    } else {
        Err(ReferenceError::InvalidOwnerCode(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_parses() {
        let registry = OwnerRegistry::builtin();
        assert!(registry.len() >= 20);
        assert!(registry.contains("MSCU"));
        assert!(registry.contains("csqu"));
        assert!(!registry.contains("ABCU"));
    }

    #[test]
    fn builtin_codes_are_four_letters() {
        for code in OwnerRegistry::builtin().codes() {
            assert_eq!(code.len(), 4, "{code}");
            assert!(code.chars().all(|c| c.is_ascii_uppercase()), "{code}");
        }
    }

    #[test]
    fn name_lookup() {
        let registry = OwnerRegistry::builtin();
        assert_eq!(
            registry.name("MSCU"),
            Some("Mediterranean Shipping Company")
        );
        assert_eq!(registry.name("ZZZU"), None);
    }

    #[test]
    fn from_codes_rejects_bad_code() {
        let err = OwnerRegistry::from_codes(["MSCU", "MS1U"]).unwrap_err();
        assert!(matches!(err, ReferenceError::InvalidOwnerCode(code) if code == "MS1U"));
    }

    #[test]
    fn from_codes_without_names() {
        let registry = OwnerRegistry::from_codes(["abcu", "XYZJ"]).unwrap();
        assert!(registry.contains("ABCU"));
        assert_eq!(registry.name("XYZJ"), None);
        assert_eq!(registry.len(), 2);
    }
}
