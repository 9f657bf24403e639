//! Attribute values and deferred references.
//!
//! A node's configuration maps attribute names to [`Value`]s. Most values are
//! literals; a [`Value::Ref`] is a placeholder for an attribute of another
//! node that only exists once that node has been materialized.
//!
//! In JSON a reference is written as `{"$ref": "node.attribute"}`. Any object
//! whose only key is `$ref` with a string value is read back as a reference.
//! A literal map whose only key is `$ref` or `$literal` is written wrapped as
//! `{"$literal": {...}}` so that it reads back as a map.

use crate::error::{GraphError, GraphResult};
use crate::name::NodeName;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// JSON key marking a reference object
pub const REF_KEY: &str = "$ref";

/// JSON key wrapping a literal map that would otherwise read as a marker
pub const LITERAL_KEY: &str = "$literal";

/// A pointer at one attribute of another node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    /// Target node
    pub node: NodeName,
    /// Target attribute
    pub attribute: String,
}

impl Reference {
    /// Create a reference from an already validated node name
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the attribute is empty or contains `.`
    pub fn new(node: NodeName, attribute: impl Into<String>) -> GraphResult<Self> {
        let attribute = attribute.into();
        if attribute.is_empty() || attribute.contains('.') {
            return Err(GraphError::InvalidName {
                name: format!("{}.{}", node, attribute),
                reason: "attribute must be non-empty and must not contain '.'".to_string(),
            });
        }
        Ok(Self { node, attribute })
    }

    /// Create a (possibly forward) reference by node name
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the node name or attribute is invalid
    pub fn to(node: &str, attribute: &str) -> GraphResult<Self> {
        Self::new(NodeName::new(node)?, attribute)
    }

    /// Parse a `node.attribute` path
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the path has no `.` separator or either
    /// half is invalid
    pub fn parse(path: &str) -> GraphResult<Self> {
        let (node, attribute) = path.split_once('.').ok_or_else(|| GraphError::InvalidName {
            name: path.to_string(),
            reason: "reference must have the form node.attribute".to_string(),
        })?;
        Self::to(node, attribute)
    }

    /// Render as a `node.attribute` path
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}.{}", self.node, self.attribute)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.attribute)
    }
}

/// An attribute value: a literal or a reference
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit null
    Null,
    /// Boolean literal
    Bool(bool),
    /// Numeric literal
    Number(serde_json::Number),
    /// String literal
    String(String),
    /// Ordered list
    List(Vec<Value>),
    /// Ordered map
    Map(IndexMap<String, Value>),
    /// Deferred reference to another node's attribute
    Ref(Reference),
}

impl Value {
    /// Check whether this value is a reference
    #[must_use]
    pub fn is_ref(&self) -> bool {
        matches!(self, Self::Ref(_))
    }

    /// Check whether this value contains a reference anywhere inside it
    #[must_use]
    pub fn contains_ref(&self) -> bool {
        match self {
            Self::Ref(_) => true,
            Self::List(items) => items.iter().any(Value::contains_ref),
            Self::Map(entries) => entries.values().any(Value::contains_ref),
            _ => false,
        }
    }

    /// Get the string content, if this is a string literal
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to plain JSON, encoding references as `$ref` objects
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Self::Map(entries) => {
                let object: serde_json::Map<String, serde_json::Value> = entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                if is_marker(&object) {
                    let mut wrapper = serde_json::Map::new();
                    wrapper.insert(LITERAL_KEY.to_string(), serde_json::Value::Object(object));
                    serde_json::Value::Object(wrapper)
                } else {
                    serde_json::Value::Object(object)
                }
            }
            Self::Ref(reference) => {
                let mut object = serde_json::Map::new();
                object.insert(
                    REF_KEY.to_string(),
                    serde_json::Value::String(reference.path()),
                );
                serde_json::Value::Object(object)
            }
        }
    }

    /// Build from plain JSON, decoding `$ref` objects into references and
    /// unwrapping `$literal` objects into maps
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if a `$ref` path is malformed
    pub fn from_json(json: serde_json::Value) -> GraphResult<Self> {
        Ok(match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => Self::List(
                items
                    .into_iter()
                    .map(Value::from_json)
                    .collect::<GraphResult<_>>()?,
            ),
            serde_json::Value::Object(mut object) => {
                if object.len() == 1 {
                    if let Some(serde_json::Value::String(path)) = object.get(REF_KEY) {
                        return Ok(Self::Ref(Reference::parse(path)?));
                    }
                    if matches!(object.get(LITERAL_KEY), Some(serde_json::Value::Object(_))) {
                        if let Some(serde_json::Value::Object(inner)) = object.remove(LITERAL_KEY) {
                            object = inner;
                        }
                    }
                }
                let mut entries = IndexMap::with_capacity(object.len());
                for (key, value) in object {
                    entries.insert(key, Value::from_json(value)?);
                }
                Self::Map(entries)
            }
        })
    }
}

/// A single-key object under `$ref` or `$literal` reads as a marker, not a map
fn is_marker(object: &serde_json::Map<String, serde_json::Value>) -> bool {
    object.len() == 1 && (object.contains_key(REF_KEY) || object.contains_key(LITERAL_KEY))
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Value::from_json(json).map_err(serde::de::Error::custom)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<Reference> for Value {
    fn from(reference: Reference) -> Self {
        Self::Ref(reference)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// A node's configuration record: attribute name to value, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config(IndexMap<String, Value>);

impl Config {
    /// Create an empty config
    #[must_use]
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Set an attribute, replacing any previous value
    pub fn insert(&mut self, attribute: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(attribute.into(), value.into());
    }

    /// Builder-style attribute setter
    #[must_use]
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(attribute, value);
        self
    }

    /// Get an attribute
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.0.get(attribute)
    }

    /// Iterate attributes in insertion order
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Number of attributes
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no attributes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Config {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for Config {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(String, Value)> for Config {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_reference_parse() {
        let r = Reference::parse("api.root_resource_id").unwrap();
        assert_eq!(r.node.as_str(), "api");
        assert_eq!(r.attribute, "root_resource_id");
        assert_eq!(r.to_string(), "api.root_resource_id");
    }

    #[test]
    fn test_reference_parse_rejects_missing_separator() {
        assert!(Reference::parse("api").is_err());
        assert!(Reference::parse("api.").is_err());
        assert!(Reference::parse(".id").is_err());
        assert!(Reference::parse("api.id.extra").is_err());
    }

    #[test]
    fn test_from_json_decodes_ref_objects() {
        let value = Value::from_json(json!({
            "rest_api_id": { "$ref": "api.id" },
            "provider_arns": [{ "$ref": "pool.arn" }],
            "type": "COGNITO_USER_POOLS"
        }))
        .unwrap();

        let Value::Map(entries) = value else {
            panic!("expected map");
        };
        assert_eq!(
            entries["rest_api_id"],
            Value::Ref(Reference::to("api", "id").unwrap())
        );
        assert_eq!(
            entries["provider_arns"],
            Value::List(vec![Value::Ref(Reference::to("pool", "arn").unwrap())])
        );
        assert_eq!(entries["type"], Value::from("COGNITO_USER_POOLS"));
    }

    #[test]
    fn test_ref_key_with_siblings_is_a_plain_map() {
        let value = Value::from_json(json!({ "$ref": "api.id", "note": "x" })).unwrap();
        assert!(matches!(value, Value::Map(_)));
        assert!(!value.contains_ref());
    }

    #[test]
    fn test_marker_shaped_maps_survive_round_trip() {
        let mut entries = IndexMap::new();
        entries.insert(REF_KEY.to_string(), Value::from("api.id"));
        let map = Value::Map(entries);

        let json = map.to_json();
        assert_eq!(json, json!({ "$literal": { "$ref": "api.id" } }));
        assert_eq!(Value::from_json(json).unwrap(), map);

        let wrapped = Value::from_json(json!({ "$literal": { "$literal": 5 } })).unwrap();
        let Value::Map(entries) = &wrapped else {
            panic!("expected map");
        };
        assert_eq!(entries[LITERAL_KEY], Value::from(5_i64));
        assert_eq!(Value::from_json(wrapped.to_json()).unwrap(), wrapped);

        let plain = Value::from_json(json!({ "$literal": "x" })).unwrap();
        assert!(matches!(plain, Value::Map(_)));
    }

    fn arb_key() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(REF_KEY.to_string()),
            Just(LITERAL_KEY.to_string()),
            "[a-z]{1,6}",
        ]
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[a-z$. ]{0,8}".prop_map(Value::String),
            ("[a-zA-Z0-9_-]{1,12}", "[a-z_]{1,8}")
                .prop_map(|(node, attribute)| Value::Ref(Reference::to(&node, &attribute).unwrap())),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
                proptest::collection::vec((arb_key(), inner), 0..3)
                    .prop_map(|pairs| Value::Map(pairs.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_json_round_trip(value in arb_value()) {
            prop_assert_eq!(Value::from_json(value.to_json()).unwrap(), value.clone());
            let text = serde_json::to_string(&value).unwrap();
            prop_assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), value);
        }
    }

    #[test]
    fn test_to_json_encodes_refs() {
        let value = Value::List(vec![
            Value::from("a"),
            Value::Ref(Reference::to("fn", "invoke_arn").unwrap()),
        ]);
        assert_eq!(value.to_json(), json!(["a", { "$ref": "fn.invoke_arn" }]));
    }

    #[test]
    fn test_contains_ref_nested() {
        let mut inner = IndexMap::new();
        inner.insert(
            "deep".to_string(),
            Value::List(vec![Value::Ref(Reference::to("a", "b").unwrap())]),
        );
        assert!(Value::Map(inner).contains_ref());
        assert!(!Value::from(3_i64).contains_ref());
    }

    #[test]
    fn test_config_preserves_insertion_order() {
        let config = Config::new()
            .with("zeta", "1")
            .with("alpha", "2")
            .with("mid", true);
        let keys: Vec<_> = config.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_config_serde() {
        let config: Config = serde_json::from_value(json!({
            "handler": "index.handler",
            "role": { "$ref": "role.arn" }
        }))
        .unwrap();
        assert!(config.get("role").unwrap().is_ref());
        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back["role"], json!({ "$ref": "role.arn" }));
    }
}
