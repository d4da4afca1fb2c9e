use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

pub const SAMPLE_ID_PURL: &str = "http://purl.obolibrary.org/obo/OBI_0001901";
pub const SAMPLING_EVENT_ID_PURL: &str = "http://purl.obolibrary.org/obo/PMO_00000056";
pub const CAMPAIGN_ID_PURL: &str = "http://purl.obolibrary.org/obo/PMO_00000060";

pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ValueType {
    Number,
    String,
    Datetime,
    Date,
    Time,
    Duration,
    Other(String),
}

impl ValueType {
    pub fn as_str(&self) -> &str {
        match self {
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Datetime => "datetime",
            ValueType::Date => "date",
            ValueType::Time => "time",
            ValueType::Duration => "duration",
            ValueType::Other(other) => other,
        }
    }
}

impl Default for ValueType {
    fn default() -> Self {
        ValueType::String
    }
}

impl From<String> for ValueType {
    fn from(value: String) -> Self {
        match value.trim() {
            "number" => ValueType::Number,
            "string" => ValueType::String,
            "datetime" => ValueType::Datetime,
            "date" => ValueType::Date,
            "time" => ValueType::Time,
            "duration" => ValueType::Duration,
            _ => ValueType::Other(value),
        }
    }
}

impl From<&str> for ValueType {
    fn from(value: &str) -> Self {
        ValueType::from(value.to_string())
    }
}

impl From<ValueType> for String {
    fn from(value: ValueType) -> Self {
        match value {
            ValueType::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Campaign,
    SamplingEvent,
    Sample,
    Ctd,
    Niskin,
    #[serde(other)]
    Other,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceType::Campaign => "campaign",
            ResourceType::SamplingEvent => "sampling_event",
            ResourceType::Sample => "sample",
            ResourceType::Ctd => "ctd",
            ResourceType::Niskin => "niskin",
            ResourceType::Other => "other",
        };
        write!(f, "{name}")
    }
}

/// Which resources are joined together and on which identifier columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityKind {
    pub name: &'static str,
    pub resource_type: ResourceType,
    pub identifier_type: &'static str,
    pub parent_type: Option<&'static str>,
}

impl EntityKind {
    pub const CAMPAIGN: EntityKind = EntityKind {
        name: "campaign",
        resource_type: ResourceType::Campaign,
        identifier_type: CAMPAIGN_ID_PURL,
        parent_type: None,
    };

    pub const SAMPLING_EVENT: EntityKind = EntityKind {
        name: "sampling_event",
        resource_type: ResourceType::SamplingEvent,
        identifier_type: SAMPLING_EVENT_ID_PURL,
        parent_type: Some(CAMPAIGN_ID_PURL),
    };

    pub const SAMPLE: EntityKind = EntityKind {
        name: "sample",
        resource_type: ResourceType::Sample,
        identifier_type: SAMPLE_ID_PURL,
        parent_type: Some(SAMPLING_EVENT_ID_PURL),
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
    #[serde(rename = "rdfType", default, deserialize_with = "empty_as_none")]
    pub semantic_type: Option<String>,
    #[serde(rename = "pm:sourceUrl", default, deserialize_with = "empty_as_none")]
    pub source_url: Option<String>,
    #[serde(
        rename = "pm:measurementSourceRdfType",
        default,
        deserialize_with = "empty_as_none"
    )]
    pub measurement_source_type: Option<String>,
    #[serde(rename = "pm:unitRdfType", default, deserialize_with = "empty_as_none")]
    pub unit_type: Option<String>,
    #[serde(rename = "pm:searchable", default)]
    pub searchable: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            semantic_type: None,
            source_url: None,
            measurement_source_type: None,
            unit_type: None,
            searchable: false,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_semantic_type(mut self, semantic_type: impl Into<String>) -> Self {
        self.semantic_type = Some(semantic_type.into());
        self
    }

    pub fn with_source_url(mut self, source_url: impl Into<String>) -> Self {
        self.source_url = Some(source_url.into());
        self
    }

    pub fn with_measurement_source_type(mut self, measurement_source_type: impl Into<String>) -> Self {
        self.measurement_source_type = Some(measurement_source_type.into());
        self
    }

    pub fn with_unit_type(mut self, unit_type: impl Into<String>) -> Self {
        self.unit_type = Some(unit_type.into());
        self
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub fn has_semantic_type(&self, semantic_type: &str) -> bool {
        self.semantic_type.as_deref() == Some(semantic_type)
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|value| !value.trim().is_empty()))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FieldKey {
    pub value_type: String,
    pub semantic_type: String,
    pub source_url: String,
    pub measurement_source_type: String,
}

impl FieldKey {
    /// The `identifier_type` column is keyed without provenance.
    pub fn of(field: &FieldDescriptor, identifier_type: &str) -> Self {
        let semantic_type = field
            .semantic_type
            .clone()
            .unwrap_or_else(|| field.name.clone());

        if semantic_type == identifier_type {
            return Self {
                value_type: field.value_type.to_string(),
                semantic_type,
                source_url: UNKNOWN.to_string(),
                measurement_source_type: UNKNOWN.to_string(),
            };
        }

        Self {
            value_type: field.value_type.to_string(),
            semantic_type,
            source_url: field
                .source_url
                .clone()
                .unwrap_or_else(|| UNKNOWN.to_string()),
            measurement_source_type: field
                .measurement_source_type
                .clone()
                .unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.value_type, self.semantic_type, self.source_url, self.measurement_source_type
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    NotANumber,
    Text(String),
}

impl CellValue {
    pub fn from_raw(raw: &str, missing_values: &[String], below_detection_limit: &[String]) -> Self {
        let trimmed = raw.trim();
        if missing_values.iter().any(|token| token == trimmed) {
            return CellValue::Null;
        }
        if below_detection_limit.iter().any(|token| token == trimmed) {
            return CellValue::NotANumber;
        }
        CellValue::Text(trimmed.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn same_value(&self, other: &CellValue, value_type: &ValueType) -> bool {
        match (self, other) {
            (CellValue::Null, CellValue::Null) => true,
            (CellValue::NotANumber, CellValue::NotANumber) => true,
            (CellValue::Text(left), CellValue::Text(right)) => {
                if *value_type == ValueType::Number {
                    if let (Ok(left), Ok(right)) = (left.parse::<f64>(), right.parse::<f64>()) {
                        return left == right || (left.is_nan() && right.is_nan());
                    }
                }
                left == right
            }
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "null"),
            CellValue::NotANumber => write!(f, "NaN"),
            CellValue::Text(text) => write!(f, "{text}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadWarning {
    RedundantField {
        resource: String,
        field: String,
        key: String,
    },
    ValueMismatch {
        resource: String,
        entity_id: String,
        key: String,
        kept: String,
        discarded: String,
    },
    UnknownType {
        entity_id: String,
        field: String,
        declared_type: String,
    },
    CoordinateSpread {
        entity_id: String,
        axis: String,
        values: Vec<f64>,
        spread: f64,
    },
    UnresolvedParent {
        entity_id: String,
        parent_id: String,
    },
    IncompleteCoordinates {
        entity_id: String,
        role: String,
    },
}

impl LoadWarning {
    pub fn emit(&self) {
        tracing::warn!("{self}");
    }
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::RedundantField {
                resource,
                field,
                key,
            } => write!(
                f,
                "removing redundant field {field} ({key}) in resource {resource}"
            ),
            LoadWarning::ValueMismatch {
                resource,
                entity_id,
                key,
                kept,
                discarded,
            } => write!(
                f,
                "value mismatch: key \"{key}\" entity {entity_id} {discarded} != {kept} in resource {resource}"
            ),
            LoadWarning::UnknownType {
                entity_id,
                field,
                declared_type,
            } => write!(
                f,
                "unknown type {declared_type:?} for field {field} in entity {entity_id}"
            ),
            LoadWarning::CoordinateSpread {
                entity_id,
                axis,
                values,
                spread,
            } => write!(
                f,
                "{axis} coordinates {values:?} do not match within threshold for entity {entity_id} (spread {spread})"
            ),
            LoadWarning::UnresolvedParent {
                entity_id,
                parent_id,
            } => write!(f, "entity {entity_id} references unknown parent {parent_id}"),
            LoadWarning::IncompleteCoordinates { entity_id, role } => write!(
                f,
                "ignoring {role} coordinate without its counterpart for entity {entity_id}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_type_roundtrips_unknown_names() {
        assert_eq!(ValueType::from("number"), ValueType::Number);
        assert_eq!(
            ValueType::from("geopoint"),
            ValueType::Other("geopoint".to_string())
        );
        assert_eq!(String::from(ValueType::from("geopoint")), "geopoint");
    }

    #[test]
    fn field_key_defaults_unknown_provenance() {
        let field = FieldDescriptor::new("temp", ValueType::Number).with_semantic_type("obo:temp");
        let key = FieldKey::of(&field, SAMPLE_ID_PURL);
        assert_eq!(key.to_string(), "number obo:temp unknown unknown");
    }

    #[test]
    fn field_key_falls_back_to_name() {
        let field = FieldDescriptor::new("notes", ValueType::String);
        let key = FieldKey::of(&field, SAMPLE_ID_PURL);
        assert_eq!(key.semantic_type, "notes");
    }

    #[test]
    fn identifier_key_ignores_provenance() {
        let a = FieldDescriptor::new("sample", ValueType::String)
            .with_semantic_type(SAMPLE_ID_PURL)
            .with_source_url("https://example.org/a");
        let b = FieldDescriptor::new("sample_name", ValueType::String)
            .with_semantic_type(SAMPLE_ID_PURL)
            .with_measurement_source_type("obo:other");
        assert_eq!(FieldKey::of(&a, SAMPLE_ID_PURL), FieldKey::of(&b, SAMPLE_ID_PURL));
    }

    #[test]
    fn cell_aliasing_precedes_cast() {
        let missing = vec!["".to_string(), "nd".to_string()];
        let bdl = vec!["bdl".to_string()];
        assert_eq!(CellValue::from_raw("nd", &missing, &bdl), CellValue::Null);
        assert_eq!(CellValue::from_raw(" bdl ", &missing, &bdl), CellValue::NotANumber);
        assert_eq!(
            CellValue::from_raw("5.2", &missing, &bdl),
            CellValue::Text("5.2".to_string())
        );
    }

    #[test]
    fn numeric_cells_compare_by_value() {
        let a = CellValue::Text("5.2".to_string());
        let b = CellValue::Text("5.20".to_string());
        assert!(a.same_value(&b, &ValueType::Number));
        assert!(!a.same_value(&b, &ValueType::String));
    }

    #[test]
    fn literal_nan_cells_are_equal() {
        let a = CellValue::Text("NaN".to_string());
        let b = CellValue::Text("nan".to_string());
        assert!(a.same_value(&b, &ValueType::Number));
        assert!(!a.same_value(&CellValue::Text("1.0".to_string()), &ValueType::Number));
    }

    #[test]
    fn field_descriptor_reads_datapackage_names() {
        let json = r#"{
            "name": "temp",
            "type": "number",
            "rdfType": "http://purl.obolibrary.org/obo/PMO_00000033",
            "pm:unitRdfType": "http://purl.obolibrary.org/obo/UO_0000027",
            "pm:sourceUrl": "",
            "pm:searchable": true,
            "format": "default"
        }"#;
        let field: FieldDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(field.value_type, ValueType::Number);
        assert!(field.searchable);
        assert_eq!(field.source_url, None);
        assert_eq!(
            field.unit_type.as_deref(),
            Some("http://purl.obolibrary.org/obo/UO_0000027")
        );
        assert!(field.extra.contains_key("format"));
    }
}
