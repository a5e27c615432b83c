//! Trigger schemas: what authoring tools need to know to configure a kind.
//!
//! A schema lists the described properties of a trigger kind. Properties
//! that are not described (internal handles, the enabled flag) are simply
//! left out.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value, json};

/// JSON type of a configurable property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

/// Description of one configurable property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertySchema {
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(rename = "type")]
    pub kind: PropertyType,
}

impl PropertySchema {
    #[must_use]
    pub fn new(kind: PropertyType, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            format: None,
            kind,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Configuration schema of one trigger kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerSchema {
    /// The trigger kind this schema describes.
    pub id: String,
    pub properties: BTreeMap<String, PropertySchema>,
    pub required: Vec<String>,
}

impl TriggerSchema {
    /// Schema for `kind`, pre-filled with the properties every trigger has.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: kind.into(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
        .required(
            "id",
            PropertySchema::new(PropertyType::String, "Id")
                .description("Identifier, unique within the trigger condition"),
        )
        .property(
            "description",
            PropertySchema::new(PropertyType::String, "Description"),
        )
    }

    /// Add an optional property.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, schema: PropertySchema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Add a required property.
    #[must_use]
    pub fn required(mut self, name: impl Into<String>, schema: PropertySchema) -> Self {
        let name = name.into();
        if !self.required.contains(&name) {
            self.required.push(name.clone());
        }
        self.properties.insert(name, schema);
        self
    }

    #[must_use]
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Render as a JSON Schema object, with `kind` pinned to this kind.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        properties.insert("kind".to_string(), json!({"const": self.id}));
        for (name, property) in &self.properties {
            properties.insert(name.clone(), json!(property));
        }
        let mut required = vec![Value::from("kind")];
        required.extend(self.required.iter().map(|r| Value::from(r.as_str())));
        json!({
            "type": "object",
            "title": self.id,
            "properties": properties,
            "required": required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_include_common_properties() {
        let schema = TriggerSchema::new("custom");
        assert!(schema.is_required("id"));
        assert!(schema.properties.contains_key("description"));
        assert!(!schema.is_required("description"));
        assert!(!schema.properties.contains_key("enabled"));
    }

    #[test]
    fn should_not_duplicate_required_names() {
        let schema = TriggerSchema::new("custom")
            .required("x", PropertySchema::new(PropertyType::Integer, "X"))
            .required("x", PropertySchema::new(PropertyType::Integer, "X again"));
        assert_eq!(schema.required.iter().filter(|r| *r == "x").count(), 1);
        assert_eq!(schema.properties["x"].title, "X again");
    }

    #[test]
    fn should_render_json_schema() {
        let schema = TriggerSchema::new("scheduled").required(
            "start_time_utc",
            PropertySchema::new(PropertyType::String, "Start")
                .format("date-time")
                .description("First boundary"),
        );
        let json = schema.to_json_schema();
        assert_eq!(json["type"], "object");
        assert_eq!(json["properties"]["kind"]["const"], "scheduled");
        assert_eq!(json["properties"]["start_time_utc"]["type"], "string");
        assert_eq!(json["properties"]["start_time_utc"]["format"], "date-time");
        assert_eq!(json["properties"]["description"]["title"], "Description");
        assert!(json["properties"]["description"].get("format").is_none());
        let required: Vec<&str> = json["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required, vec!["kind", "id", "start_time_utc"]);
    }
}
