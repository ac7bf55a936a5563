//! Recursive description of the desired output shape.
//!
//! A [`Schema`] node is either an `OBJECT` with ordered named properties, an
//! `ARRAY` with one `items` schema, or a terminal (`STRING`, `NUMBER`,
//! `BOOLEAN`). Property declaration order is significant: it determines the
//! order in which the walker resolves properties and the key order of the
//! assembled result. Schemas are immutable once built and supplied fresh per
//! request.
//!
//! # Example
//!
//! ```
//! use refinery::schema::Schema;
//!
//! let schema = Schema::object(vec![
//!     ("name".to_string(), Schema::string()),
//!     ("tags".to_string(), Schema::array(Schema::string())),
//! ])?;
//!
//! assert!(schema.is_object());
//! assert_eq!(schema.to_value()["type"], "OBJECT");
//! # Ok::<(), refinery::Error>(())
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// The kind of value a schema node describes.
///
/// Serialized in the SCREAMING_SNAKE_CASE wire form (`"STRING"`, `"OBJECT"`,
/// ...) used both inside conversion instructions and as a provider's
/// response-schema constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaType {
    /// A JSON string.
    String,
    /// A JSON number.
    Number,
    /// A JSON boolean.
    Boolean,
    /// A JSON object with named properties.
    Object,
    /// A JSON array with homogeneous items.
    Array,
}

impl SchemaType {
    /// Wire name of this type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::String => "STRING",
            SchemaType::Number => "NUMBER",
            SchemaType::Boolean => "BOOLEAN",
            SchemaType::Object => "OBJECT",
            SchemaType::Array => "ARRAY",
        }
    }
}

/// A recursive description of the structured value to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// The kind of value this node describes.
    #[serde(rename = "type")]
    schema_type: SchemaType,

    /// Named child schemas, in declaration order. Only meaningful for
    /// `OBJECT` nodes.
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        with = "properties_as_map"
    )]
    properties: Vec<(String, Schema)>,

    /// Item schema. Only meaningful for `ARRAY` nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<Box<Schema>>,
}

impl Schema {
    fn terminal(schema_type: SchemaType) -> Self {
        Schema {
            schema_type,
            properties: Vec::new(),
            items: None,
        }
    }

    /// A `STRING` terminal.
    #[must_use]
    pub fn string() -> Self {
        Self::terminal(SchemaType::String)
    }

    /// A `NUMBER` terminal.
    #[must_use]
    pub fn number() -> Self {
        Self::terminal(SchemaType::Number)
    }

    /// A `BOOLEAN` terminal.
    #[must_use]
    pub fn boolean() -> Self {
        Self::terminal(SchemaType::Boolean)
    }

    /// An `OBJECT` node with the given properties, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a property name appears twice.
    pub fn object(properties: Vec<(String, Schema)>) -> Result<Self> {
        for (i, (name, _)) in properties.iter().enumerate() {
            if properties[..i].iter().any(|(other, _)| other == name) {
                return Err(Error::invalid_input(format!(
                    "duplicate property name '{name}' in object schema"
                )));
            }
        }
        Ok(Schema {
            schema_type: SchemaType::Object,
            properties,
            items: None,
        })
    }

    /// An `ARRAY` node with the given item schema.
    #[must_use]
    pub fn array(items: Schema) -> Self {
        Schema {
            schema_type: SchemaType::Array,
            properties: Vec::new(),
            items: Some(Box::new(items)),
        }
    }

    /// Wrap a single property into a minimal one-property object schema.
    ///
    /// Used by the walker for scalar/singular properties, which are refined
    /// against the full raw text and then extracted by key.
    #[must_use]
    pub fn wrap_property(name: &str, property: &Schema) -> Self {
        Schema {
            schema_type: SchemaType::Object,
            properties: vec![(name.to_string(), property.clone())],
            items: None,
        }
    }

    /// The kind of value this node describes.
    #[must_use]
    pub fn schema_type(&self) -> SchemaType {
        self.schema_type
    }

    /// Named child schemas, in declaration order. Empty for non-objects.
    #[must_use]
    pub fn properties(&self) -> &[(String, Schema)] {
        &self.properties
    }

    /// Item schema of an `ARRAY` node.
    #[must_use]
    pub fn items(&self) -> Option<&Schema> {
        self.items.as_deref()
    }

    /// Child schema for a named property, if present.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Schema> {
        self.properties
            .iter()
            .find(|(prop, _)| prop == name)
            .map(|(_, schema)| schema)
    }

    /// Whether this node is an `OBJECT` with at least one property.
    #[must_use]
    pub fn is_object(&self) -> bool {
        self.schema_type == SchemaType::Object && !self.properties.is_empty()
    }

    /// Whether this node is an `ARRAY` whose items are objects — the shape
    /// that requires segmentation before refinement.
    #[must_use]
    pub fn is_array_of_objects(&self) -> bool {
        self.schema_type == SchemaType::Array
            && self.items.as_ref().is_some_and(|items| items.is_object())
    }

    /// Render this schema in the JSON wire shape
    /// (`{"type":"OBJECT","properties":{...}}`), preserving property order.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut node = Map::new();
        node.insert(
            "type".to_string(),
            Value::String(self.schema_type.as_str().to_string()),
        );
        if !self.properties.is_empty() {
            let mut props = Map::new();
            for (name, child) in &self.properties {
                props.insert(name.clone(), child.to_value());
            }
            node.insert("properties".to_string(), Value::Object(props));
        }
        if let Some(items) = &self.items {
            node.insert("items".to_string(), items.to_value());
        }
        Value::Object(node)
    }
}

/// Serializes ordered `(name, schema)` pairs as a JSON map and back, keeping
/// declaration order on both paths (serde_json is built with
/// `preserve_order`).
mod properties_as_map {
    use super::Schema;
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(properties: &[(String, Schema)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(properties.len()))?;
        for (name, schema) in properties {
            map.serialize_entry(name, schema)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, Schema)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PropertiesVisitor;

        impl<'de> Visitor<'de> for PropertiesVisitor {
            type Value = Vec<(String, Schema)>;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map of property name to schema")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut properties = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, schema)) = access.next_entry::<String, Schema>()? {
                    properties.push((name, schema));
                }
                Ok(properties)
            }
        }

        deserializer.deserialize_map(PropertiesVisitor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn persona_schema() -> Schema {
        Schema::object(vec![(
            "personas".to_string(),
            Schema::array(Schema::object(vec![("name".to_string(), Schema::string())]).unwrap()),
        )])
        .unwrap()
    }

    // ========================================================================
    // Constructor Tests
    // ========================================================================

    #[test]
    fn test_terminal_constructors() {
        assert_eq!(Schema::string().schema_type(), SchemaType::String);
        assert_eq!(Schema::number().schema_type(), SchemaType::Number);
        assert_eq!(Schema::boolean().schema_type(), SchemaType::Boolean);
    }

    #[test]
    fn test_object_preserves_declaration_order() {
        let schema = Schema::object(vec![
            ("zulu".to_string(), Schema::string()),
            ("alpha".to_string(), Schema::number()),
            ("mike".to_string(), Schema::boolean()),
        ])
        .unwrap();

        let names: Vec<&str> = schema
            .properties()
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(names, vec!["zulu", "alpha", "mike"]);
    }

    #[test]
    fn test_object_rejects_duplicate_property() {
        let result = Schema::object(vec![
            ("name".to_string(), Schema::string()),
            ("name".to_string(), Schema::number()),
        ]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_wrap_property() {
        let wrapped = Schema::wrap_property("title", &Schema::string());
        assert!(wrapped.is_object());
        assert_eq!(wrapped.properties().len(), 1);
        assert_eq!(
            wrapped.property("title").unwrap().schema_type(),
            SchemaType::String
        );
    }

    // ========================================================================
    // Shape Query Tests
    // ========================================================================

    #[test]
    fn test_is_object() {
        assert!(persona_schema().is_object());
        assert!(!Schema::string().is_object());
        assert!(!Schema::array(Schema::string()).is_object());
    }

    #[test]
    fn test_empty_object_is_not_walkable() {
        let schema = Schema::object(Vec::new()).unwrap();
        assert!(!schema.is_object());
    }

    #[test]
    fn test_is_array_of_objects() {
        let schema = persona_schema();
        let personas = schema.property("personas").unwrap();
        assert!(personas.is_array_of_objects());

        assert!(!Schema::array(Schema::string()).is_array_of_objects());
        assert!(!Schema::string().is_array_of_objects());
    }

    #[test]
    fn test_property_lookup() {
        let schema = persona_schema();
        assert!(schema.property("personas").is_some());
        assert!(schema.property("missing").is_none());
    }

    // ========================================================================
    // Wire Rendering Tests
    // ========================================================================

    #[test]
    fn test_to_value_terminal() {
        assert_eq!(Schema::string().to_value(), json!({"type": "STRING"}));
        assert_eq!(Schema::number().to_value(), json!({"type": "NUMBER"}));
    }

    #[test]
    fn test_to_value_nested() {
        let value = persona_schema().to_value();
        assert_eq!(value["type"], "OBJECT");
        assert_eq!(value["properties"]["personas"]["type"], "ARRAY");
        assert_eq!(
            value["properties"]["personas"]["items"]["properties"]["name"]["type"],
            "STRING"
        );
    }

    #[test]
    fn test_to_value_preserves_property_order() {
        let schema = Schema::object(vec![
            ("zulu".to_string(), Schema::string()),
            ("alpha".to_string(), Schema::string()),
        ])
        .unwrap();

        let value = schema.to_value();
        let keys: Vec<&String> = value["properties"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["zulu", "alpha"]);
    }

    // ========================================================================
    // Serde Tests
    // ========================================================================

    #[test]
    fn test_serialize_matches_to_value() {
        let schema = persona_schema();
        let serialized = serde_json::to_value(&schema).unwrap();
        assert_eq!(serialized, schema.to_value());
    }

    #[test]
    fn test_deserialize_round_trip() {
        let schema = persona_schema();
        let json = serde_json::to_string(&schema).unwrap();
        let back: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn test_deserialize_from_wire_form() {
        let schema: Schema = serde_json::from_value(json!({
            "type": "OBJECT",
            "properties": {
                "x": {"type": "STRING"},
                "y": {"type": "NUMBER"}
            }
        }))
        .unwrap();

        assert!(schema.is_object());
        let names: Vec<&str> = schema
            .properties()
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn test_schema_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&SchemaType::Object).unwrap(),
            "\"OBJECT\""
        );
        assert_eq!(SchemaType::Array.as_str(), "ARRAY");
    }
}
