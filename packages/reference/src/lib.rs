#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reference data for container status normalization.
//!
//! Two tables are consulted while normalizing: the registry of known
//! owner-code prefixes (e.g. `MSCU`) and the gazetteer of stations, ports,
//! warehouses, customs posts, and cities. Both ship embedded in the binary
//! and can be replaced by operator-supplied TOML files.

pub mod gazetteer;
pub mod owners;

use std::path::{Path, PathBuf};

pub use gazetteer::{Gazetteer, GazetteerMatch};
pub use owners::OwnerRegistry;

/// Errors that can occur while loading reference data.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    /// A reference file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A reference file is not valid TOML for its table.
    #[error("Invalid reference TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// An owner entry is not a four-letter prefix.
    #[error("Invalid owner code '{0}': expected four ASCII letters")]
    InvalidOwnerCode(String),

    /// A gazetteer entry has an empty name or alias.
    #[error("Gazetteer entry {0} has an empty name or alias")]
    EmptyName(usize),

    /// Two gazetteer entries share a canonical name.
    #[error("Duplicate gazetteer location '{0}'")]
    DuplicateLocation(String),
}

/// Reads a reference file into memory.
///
/// # Errors
///
/// * If the file cannot be read
pub fn read_file(path: &Path) -> Result<String, ReferenceError> {
    std::fs::read_to_string(path).map_err(|source| ReferenceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Gazetteer and owner registry bundled together.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub gazetteer: Gazetteer,
    pub owners: OwnerRegistry,
}

impl ReferenceData {
    /// The embedded gazetteer and owner registry.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            gazetteer: Gazetteer::builtin(),
            owners: OwnerRegistry::builtin(),
        }
    }

    /// Loads reference data, falling back to the embedded table for any
    /// path that is `None`.
    ///
    /// # Errors
    ///
    /// * If a supplied file cannot be read
    /// * If a supplied file is not a valid table
    pub fn load(
        gazetteer_path: Option<&Path>,
        owners_path: Option<&Path>,
    ) -> Result<Self, ReferenceError> {
        let gazetteer = match gazetteer_path {
            Some(path) => {
                let gazetteer = Gazetteer::from_toml_str(&read_file(path)?)?;
                log::info!(
                    "Loaded {} gazetteer locations from {}",
                    gazetteer.len(),
                    path.display()
                );
                gazetteer
            }
            None => Gazetteer::builtin(),
        };

        let owners = match owners_path {
            Some(path) => {
                let owners = OwnerRegistry::from_toml_str(&read_file(path)?)?;
                log::info!(
                    "Loaded {} owner codes from {}",
                    owners.len(),
                    path.display()
                );
                owners
            }
            None => OwnerRegistry::builtin(),
        };

        Ok(Self { gazetteer, owners })
    }
}

impl Default for ReferenceData {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_without_paths_uses_builtin_tables() {
        let data = ReferenceData::load(None, None).unwrap();
        assert_eq!(data.gazetteer.len(), Gazetteer::builtin().len());
        assert!(data.owners.contains("MSCU"));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = ReferenceData::load(Some(Path::new("/nonexistent/gazetteer.toml")), None)
            .unwrap_err();
        assert!(matches!(err, ReferenceError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/gazetteer.toml"));
    }
}
