//! Configuration consumed by the vertex index, builder and validator.
//!
//! Stored as TOML; every field is optional and falls back to its default, so a
//! partial file only overrides what it names:
//!
//! ```toml
//! precision = 2
//! buffer_radius = 3
//! validation_mode = "fast"
//!
//! [radii]
//! bay = 4.0
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TopologyError, TopologyResult};
use crate::geometry;

/// Topology engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Decimal places coordinates are rounded to before lookup.
    pub precision: u32,

    /// Number of grid rings scanned around a missed coordinate (0 disables).
    pub buffer_radius: u32,

    /// Proximity radii used to classify dangling ends.
    pub radii: ProximityRadii,

    /// Maximum distance between an object and its container root.
    pub parent_radius: f64,

    /// Fast mode skips proximity classification of dangling ends.
    pub validation_mode: ValidationMode,

    /// Validate the raw graph before normalization.
    pub precheck_connectivity: bool,

    /// PSR-type per class name, e.g. `AcLineSegment = "Cable"`.
    pub psr_types: BTreeMap<String, String>,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            precision: 3,
            buffer_radius: 2,
            radii: ProximityRadii::default(),
            parent_radius: 250.0,
            validation_mode: ValidationMode::Slow,
            precheck_connectivity: false,
            psr_types: BTreeMap::new(),
        }
    }
}

/// Search radii, in map units, walked in increasing order when classifying a dangling end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityRadii {
    pub bay: f64,
    pub consumer: f64,
    pub dangling: f64,
    pub enclosure: f64,
}

impl Default for ProximityRadii {
    fn default() -> Self {
        Self {
            bay: 5.0,
            consumer: 10.0,
            dangling: 15.0,
            enclosure: 25.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    Fast,
    #[default]
    Slow,
}

impl TopologyConfig {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> TopologyResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> TopologyResult<Self> {
        let config: TopologyConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> TopologyResult<()> {
        if self.precision > 9 {
            return Err(TopologyError::Config(format!(
                "precision {} exceeds 9 decimal places",
                self.precision
            )));
        }
        let radii = [
            ("radii.bay", self.radii.bay),
            ("radii.consumer", self.radii.consumer),
            ("radii.dangling", self.radii.dangling),
            ("radii.enclosure", self.radii.enclosure),
            ("parent_radius", self.parent_radius),
        ];
        if let Some((name, value)) = radii.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(TopologyError::Config(format!(
                "{name} must be a non-negative number, got {value}"
            )));
        }
        Ok(())
    }

    /// Coordinate tolerance implied by precision and buffer radius.
    pub fn tolerance(&self) -> f64 {
        geometry::grid_step(self.precision) * self.buffer_radius.max(1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = TopologyConfig::from_toml_str(
            r#"
            precision = 2
            validation_mode = "fast"

            [radii]
            bay = 4.0
            "#,
        )
        .unwrap();
        assert_eq!(config.precision, 2);
        assert_eq!(config.buffer_radius, 2);
        assert_eq!(config.validation_mode, ValidationMode::Fast);
        assert_eq!(config.radii.bay, 4.0);
        assert_eq!(config.radii.enclosure, 25.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = TopologyConfig::from_toml_str("[radii]\nbay = -1.0\n").unwrap_err();
        assert!(matches!(err, TopologyError::Config(_)));
        assert!(TopologyConfig::from_toml_str("precision = \"three\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "buffer_radius = 5\n[psr_types]\nAcLineSegment = \"Cable\"").unwrap();
        let config = TopologyConfig::load(file.path()).unwrap();
        assert_eq!(config.buffer_radius, 5);
        assert_eq!(config.psr_types["AcLineSegment"], "Cable");
    }
}
