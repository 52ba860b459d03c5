//! Scoring weights and pipeline settings.
//!
//! Every confidence bonus, multiplier, and threshold used by the pipeline
//! is a field here. Defaults reproduce the stock weights; a TOML file may
//! override any subset of them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Errors that can occur while loading a [`PipelineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// A weight or threshold lies outside [0, 1].
    #[error("{field} must be within [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f64 },

    /// A bound that must be positive is zero or negative.
    #[error("{field} must be positive")]
    NotPositive { field: &'static str },
}

/// Confidence policy of the identifier validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentifierScoring {
    pub shape_match: f64,
    pub check_digit_bonus: f64,
    pub known_owner_bonus: f64,
    pub uncorrected_bonus: f64,
}

impl Default for IdentifierScoring {
    fn default() -> Self {
        Self {
            shape_match: 0.85,
            check_digit_bonus: 0.10,
            known_owner_bonus: 0.05,
            uncorrected_bonus: 0.02,
        }
    }
}

/// Per-field bonuses that make up `extractionConfidence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionScoring {
    pub identifier: f64,
    pub known_status: f64,
    pub registered_location: f64,
    /// Bonus for a location that is present but not in the gazetteer.
    pub unregistered_location: f64,
    pub eta: f64,
    pub distance: f64,
}

impl Default for ExtractionScoring {
    fn default() -> Self {
        Self {
            identifier: 0.3,
            known_status: 0.2,
            registered_location: 0.2,
            unregistered_location: 0.1,
            eta: 0.15,
            distance: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocationScoring {
    /// Gazetteer hit.
    pub registered: f64,
    /// Name captured from "station X" / "port X" context but not in the
    /// gazetteer.
    pub contextual_guess: f64,
}

impl Default for LocationScoring {
    fn default() -> Self {
        Self {
            registered: 0.95,
            contextual_guess: 0.7,
        }
    }
}

/// Weights and thresholds of the record validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationScoring {
    pub known_status_bonus: f64,
    pub registered_location_bonus: f64,
    pub completeness_bonus: f64,
    /// Completeness must exceed this for the completeness bonus.
    pub completeness_threshold: f64,
    pub consistency_bonus: f64,

    /// Blend used when the identifier did not validate.
    pub status_weight: f64,
    pub location_weight: f64,
    pub completeness_weight: f64,

    /// Status sub-score for a token that maps to `UNKNOWN`.
    pub unknown_status_score: f64,
    /// Location sub-score for a location the resolver could not place.
    pub unresolved_location_score: f64,

    /// Multiplier applied to consistency per status/location mismatch.
    pub consistency_penalty: f64,
    pub error_multiplier: f64,
    pub warning_multiplier: f64,
    /// More warnings than this triggers `warning_multiplier`.
    pub warning_limit: usize,

    pub valid_threshold: f64,
    /// Partial records need confidence strictly above this.
    pub partial_threshold: f64,

    pub max_distance_km: i64,
}

impl Default for ValidationScoring {
    fn default() -> Self {
        Self {
            known_status_bonus: 0.05,
            registered_location_bonus: 0.05,
            completeness_bonus: 0.03,
            completeness_threshold: 0.5,
            consistency_bonus: 0.02,
            status_weight: 0.3,
            location_weight: 0.3,
            completeness_weight: 0.4,
            unknown_status_score: 0.2,
            unresolved_location_score: 0.4,
            consistency_penalty: 0.8,
            error_multiplier: 0.5,
            warning_multiplier: 0.95,
            warning_limit: 3,
            valid_threshold: 0.5,
            partial_threshold: 0.3,
            max_distance_km: 20_000,
        }
    }
}

/// Fallback blend for the overall confidence of an input with no valid
/// items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregateScoring {
    pub error_weight: f64,
    pub loss_weight: f64,
    pub completeness_weight: f64,
}

impl Default for AggregateScoring {
    fn default() -> Self {
        Self {
            error_weight: 0.4,
            loss_weight: 0.3,
            completeness_weight: 0.3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    pub identifier: IdentifierScoring,
    pub extraction: ExtractionScoring,
    pub location: LocationScoring,
    pub validation: ValidationScoring,
    pub aggregate: AggregateScoring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub scoring: ScoringConfig,
    /// Maximum number of entries kept by the bounded audit log.
    pub audit_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            audit_capacity: 1000,
        }
    }
}

impl PipelineConfig {
    /// Parses and validates a config from TOML. Missing keys take their
    /// defaults.
    ///
    /// # Errors
    ///
    /// * If the TOML is malformed or names an unknown key
    /// * If a value fails [`Self::validate`]
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a config file.
    ///
    /// # Errors
    ///
    /// * If the file cannot be read
    /// * If the contents fail [`Self::from_toml_str`]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        log::info!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    /// Checks every weight is within [0, 1] and every bound is positive.
    ///
    /// # Errors
    ///
    /// * If any weight or threshold is out of range
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scoring;
        let weights: &[(&'static str, f64)] = &[
            ("identifier.shape_match", s.identifier.shape_match),
            ("identifier.check_digit_bonus", s.identifier.check_digit_bonus),
            ("identifier.known_owner_bonus", s.identifier.known_owner_bonus),
            ("identifier.uncorrected_bonus", s.identifier.uncorrected_bonus),
            ("extraction.identifier", s.extraction.identifier),
            ("extraction.known_status", s.extraction.known_status),
            ("extraction.registered_location", s.extraction.registered_location),
            ("extraction.unregistered_location", s.extraction.unregistered_location),
            ("extraction.eta", s.extraction.eta),
            ("extraction.distance", s.extraction.distance),
            ("location.registered", s.location.registered),
            ("location.contextual_guess", s.location.contextual_guess),
            ("validation.known_status_bonus", s.validation.known_status_bonus),
            ("validation.registered_location_bonus", s.validation.registered_location_bonus),
            ("validation.completeness_bonus", s.validation.completeness_bonus),
            ("validation.completeness_threshold", s.validation.completeness_threshold),
            ("validation.consistency_bonus", s.validation.consistency_bonus),
            ("validation.status_weight", s.validation.status_weight),
            ("validation.location_weight", s.validation.location_weight),
            ("validation.completeness_weight", s.validation.completeness_weight),
            ("validation.unknown_status_score", s.validation.unknown_status_score),
            ("validation.unresolved_location_score", s.validation.unresolved_location_score),
            ("validation.consistency_penalty", s.validation.consistency_penalty),
            ("validation.error_multiplier", s.validation.error_multiplier),
            ("validation.warning_multiplier", s.validation.warning_multiplier),
            ("validation.valid_threshold", s.validation.valid_threshold),
            ("validation.partial_threshold", s.validation.partial_threshold),
            ("aggregate.error_weight", s.aggregate.error_weight),
            ("aggregate.loss_weight", s.aggregate.loss_weight),
            ("aggregate.completeness_weight", s.aggregate.completeness_weight),
        ];

        for &(field, value) in weights {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }

        if s.validation.max_distance_km <= 0 {
            return Err(ConfigError::NotPositive {
                field: "validation.max_distance_km",
            });
        }
        if self.audit_capacity == 0 {
            return Err(ConfigError::NotPositive {
                field: "audit_capacity",
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = PipelineConfig::from_toml_str(
            r"
audit_capacity = 50

[scoring.validation]
valid_threshold = 0.6
",
        )
        .unwrap();
        assert_eq!(config.audit_capacity, 50);
        assert!((config.scoring.validation.valid_threshold - 0.6).abs() < f64::EPSILON);
        assert!((config.scoring.validation.partial_threshold - 0.3).abs() < f64::EPSILON);
        assert!((config.scoring.identifier.shape_match - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_weight_above_one() {
        let err = PipelineConfig::from_toml_str(
            r"
[scoring.identifier]
shape_match = 1.5
",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                field: "identifier.shape_match",
                ..
            }
        ));
    }

    #[test]
    fn rejects_unknown_key() {
        let err = PipelineConfig::from_toml_str("bogus = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn rejects_zero_audit_capacity() {
        let err = PipelineConfig::from_toml_str("audit_capacity = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NotPositive {
                field: "audit_capacity"
            }
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = PipelineConfig::load(Path::new("/nonexistent/boxtrack.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
