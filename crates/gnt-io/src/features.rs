//! Feature records read from GIS extracts.
//!
//! A feature file is a JSON array of records:
//!
//! ```json
//! [
//!   {
//!     "class": "AcLineSegment",
//!     "points": [{"x": 0.0, "y": 0.0}, {"x": 10.0, "y": 0.0}],
//!     "properties": {"external_id": "cable-1", "voltage_level": 22}
//!   }
//! ]
//! ```
//!
//! Recognized property keys are lifted into [`IdentifiedObject`] fields; every other
//! key is kept in the property bag for later passes.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use gnt_core::{
    ClassTag, IdentifiedObject, Mrid, Point, PropertyValue, TopologyError, TopologyResult,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys lifted out of the property bag into object fields.
const LIFTED_KEYS: [&str; 7] = [
    "external_id",
    "id",
    "mrid",
    "name",
    "description",
    "voltage_level",
    "psr_type",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePoint {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Digitizing precision in map units, as reported by the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,
}

impl From<&FeaturePoint> for Point {
    fn from(p: &FeaturePoint) -> Self {
        Point::new(p.x, p.y)
    }
}

/// One input feature: class, ordered points and attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub class: ClassTag,
    #[serde(default)]
    pub points: Vec<FeaturePoint>,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl FeatureRecord {
    pub fn new(class: ClassTag) -> Self {
        Self {
            class,
            points: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_point(mut self, x: f64, y: f64) -> Self {
        self.points.push(FeaturePoint {
            x,
            y,
            timestamp: None,
            precision: None,
        });
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn geometry(&self) -> Vec<Point> {
        self.points.iter().map(Point::from).collect()
    }

    /// External id from `external_id` or `id`.
    pub fn external_id(&self) -> Option<String> {
        ["external_id", "id"]
            .iter()
            .filter_map(|k| self.properties.get(*k))
            .find_map(value_text)
    }

    /// Convert into an object. `ordinal` names records that carry no external id.
    pub fn to_object(&self, ordinal: usize) -> IdentifiedObject {
        let external_id = self
            .external_id()
            .unwrap_or_else(|| format!("{}-{}", self.class, ordinal));
        let text = |key: &str| self.properties.get(key).and_then(value_text);

        let mrid = text("mrid")
            .and_then(|m| Mrid::parse(&m))
            .unwrap_or_else(|| Mrid::from_external_id(&format!("{}:{}", self.class, external_id)));

        let mut object = IdentifiedObject::new(self.class, external_id)
            .with_mrid(mrid)
            .with_geometry(self.geometry());
        object.name = text("name");
        object.description = text("description");
        object.psr_type = text("psr_type");
        object.voltage_level = self
            .properties
            .get("voltage_level")
            .and_then(|v| property_value(v)?.as_f64());

        for (key, value) in &self.properties {
            if LIFTED_KEYS.contains(&key.as_str()) {
                continue;
            }
            if let Some(value) = property_value(value) {
                object.properties.insert(key.clone(), value);
            }
        }
        object
    }
}

fn value_text(value: &Value) -> Option<String> {
    property_value(value)
        .map(|v| v.to_text())
        .filter(|s| !s.trim().is_empty())
}

fn property_value(value: &Value) -> Option<PropertyValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(PropertyValue::Bool(*b)),
        Value::Number(n) => n.as_f64().map(PropertyValue::Number),
        Value::String(s) => Some(PropertyValue::Str(s.clone())),
        other => Some(PropertyValue::Str(other.to_string())),
    }
}

/// Load feature records from a JSON file.
pub fn load_features(path: impl AsRef<Path>) -> TopologyResult<Vec<FeatureRecord>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    parse_features(&content)
        .map_err(|e| TopologyError::Parse(format!("{}: {}", path.display(), e)))
}

/// Parse feature records from JSON text.
pub fn parse_features(content: &str) -> TopologyResult<Vec<FeatureRecord>> {
    Ok(serde_json::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_record_to_object_lifts_known_keys() {
        let record = FeatureRecord::new(ClassTag::Breaker)
            .with_point(1.0, 2.0)
            .with_property("external_id", "BRK-1")
            .with_property("name", "Main breaker")
            .with_property("voltage_level", "22")
            .with_property("bay_id", "BAY-7")
            .with_property("normal_open", true)
            .with_property("comment", Value::Null);

        let object = record.to_object(0);
        assert_eq!(object.external_id, "BRK-1");
        assert_eq!(object.name.as_deref(), Some("Main breaker"));
        assert_eq!(object.voltage_level, Some(22.0));
        assert_eq!(object.geometry, vec![Point::new(1.0, 2.0)]);
        assert_eq!(object.properties.get_str("bay_id"), Some("BAY-7"));
        assert_eq!(object.properties.get_bool("normal_open"), Some(true));
        assert!(!object.properties.contains("comment"));
        assert!(!object.properties.contains("name"));
    }

    #[test]
    fn test_missing_identifiers_are_stable() {
        let record = FeatureRecord::new(ClassTag::Fuse).with_point(0.0, 0.0);
        let a = record.to_object(3);
        let b = record.to_object(3);
        assert_eq!(a.external_id, "Fuse-3");
        assert_eq!(a.mrid, b.mrid);
        assert!(a.mrid.is_some());

        let explicit = FeatureRecord::new(ClassTag::Fuse)
            .with_property("mrid", "{0F0E0D0C-0B0A-0908-0706-050403020100}")
            .to_object(0);
        assert_eq!(
            explicit.mrid.map(|m| m.to_string()).as_deref(),
            Some("0f0e0d0c-0b0a-0908-0706-050403020100")
        );
    }

    #[test]
    fn test_load_features_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"class": "EnergyConsumer", "points": [{{"x": 5, "y": 6, "timestamp": "2020-01-01"}}],
                 "properties": {{"id": 17}}}}]"#
        )
        .unwrap();

        let records = load_features(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].class, ClassTag::EnergyConsumer);
        assert_eq!(records[0].external_id().as_deref(), Some("17"));
        assert_eq!(records[0].points[0].timestamp.as_deref(), Some("2020-01-01"));
    }

    #[test]
    fn test_unknown_class_is_a_parse_error() {
        let err = parse_features(r#"[{"class": "Teapot"}]"#).unwrap_err();
        assert!(matches!(err, TopologyError::Parse(_)));
    }
}
