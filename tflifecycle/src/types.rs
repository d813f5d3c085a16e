//! Attribute value model for desired and observed state
//!
//! `Dynamic` carries untyped attribute values the way Terraform hands them
//! over; `State` is one resource instance (remote identifier plus attribute
//! map). Typed access happens through the `State` accessors only, so
//! per-resource glue never matches on `Dynamic` directly.

use crate::error::{LifecycleError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Dynamic represents attribute values of any type
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Dynamic {
    #[default]
    Null,
    Bool(bool),
    /// All numbers are f64 to match Terraform
    Number(f64),
    String(String),
    /// Ordered collection; sets are also carried as lists and compared
    /// unordered by the consistency checker
    List(Vec<Dynamic>),
    /// Nested objects and maps
    Map(BTreeMap<String, Dynamic>),
}

impl Dynamic {
    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Dynamic::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Dynamic::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Dynamic]> {
        match self {
            Dynamic::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Dynamic>> {
        match self {
            Dynamic::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Bool(_) => "bool",
            Dynamic::Number(_) => "number",
            Dynamic::String(_) => "string",
            Dynamic::List(_) => "list",
            Dynamic::Map(_) => "map",
        }
    }

    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Dynamic::List(items.into_iter().map(|s| Dynamic::String(s.into())).collect())
    }
}

impl From<&str> for Dynamic {
    fn from(s: &str) -> Self {
        Dynamic::String(s.to_string())
    }
}

impl From<String> for Dynamic {
    fn from(s: String) -> Self {
        Dynamic::String(s)
    }
}

impl From<bool> for Dynamic {
    fn from(b: bool) -> Self {
        Dynamic::Bool(b)
    }
}

impl From<i64> for Dynamic {
    fn from(n: i64) -> Self {
        Dynamic::Number(n as f64)
    }
}

impl From<f64> for Dynamic {
    fn from(n: f64) -> Self {
        Dynamic::Number(n)
    }
}

impl<T: Into<Dynamic>> From<Option<T>> for Dynamic {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Dynamic::Null)
    }
}

impl fmt::Display for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str(self.type_name()),
        }
    }
}

impl Serialize for Dynamic {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Dynamic::Null => serializer.serialize_unit(),
            Dynamic::Bool(b) => serializer.serialize_bool(*b),
            Dynamic::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                serializer.serialize_i64(*n as i64)
            }
            Dynamic::Number(n) => serializer.serialize_f64(*n),
            Dynamic::String(s) => serializer.serialize_str(s),
            Dynamic::List(l) => l.serialize(serializer),
            Dynamic::Map(m) => m.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Dynamic {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct DynamicVisitor;

        impl<'de> Visitor<'de> for DynamicVisitor {
            type Value = Dynamic;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a valid attribute value")
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Null)
            }

            fn visit_none<E: de::Error>(self) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Null)
            }

            fn visit_some<D>(self, deserializer: D) -> std::result::Result<Dynamic, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                Dynamic::deserialize(deserializer)
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Bool(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::String(value.to_string()))
            }

            fn visit_string<E: de::Error>(self, value: String) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::String(value))
            }

            fn visit_seq<V>(self, mut seq: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::SeqAccess<'de>,
            {
                let mut vec = Vec::new();
                while let Some(elem) = seq.next_element()? {
                    vec.push(elem);
                }
                Ok(Dynamic::List(vec))
            }

            fn visit_map<V>(self, mut map: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::MapAccess<'de>,
            {
                let mut values = BTreeMap::new();
                while let Some((key, value)) = map.next_entry()? {
                    values.insert(key, value);
                }
                Ok(Dynamic::Map(values))
            }
        }

        deserializer.deserialize_any(DynamicVisitor)
    }
}

/// One resource instance: the remote identifier (assigned by the remote
/// system, never chosen locally) and its attribute values.
///
/// Used both as desired state (what the configuration declares) and as
/// observed state (what the last read returned).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct State {
    pub id: Option<String>,
    pub values: BTreeMap<String, Dynamic>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            values: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Signals "does not exist" to the orchestration layer.
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    pub fn get(&self, name: &str) -> Option<&Dynamic> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    pub fn set(&mut self, name: &str, value: impl Into<Dynamic>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn with(mut self, name: &str, value: impl Into<Dynamic>) -> Self {
        self.set(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Dynamic> {
        self.values.remove(name)
    }

    pub fn get_string(&self, name: &str) -> Result<Option<String>> {
        match self.get(name) {
            None => Ok(None),
            Some(Dynamic::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(type_mismatch(name, "string", other)),
        }
    }

    pub fn require_string(&self, name: &str) -> Result<String> {
        self.get_string(name)?
            .ok_or_else(|| LifecycleError::validation(format!("{} is required", name)))
    }

    pub fn get_bool(&self, name: &str) -> Result<Option<bool>> {
        match self.get(name) {
            None => Ok(None),
            Some(Dynamic::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(type_mismatch(name, "bool", other)),
        }
    }

    pub fn get_f64(&self, name: &str) -> Result<Option<f64>> {
        match self.get(name) {
            None => Ok(None),
            Some(Dynamic::Number(n)) => Ok(Some(*n)),
            Some(other) => Err(type_mismatch(name, "number", other)),
        }
    }

    pub fn get_i64(&self, name: &str) -> Result<Option<i64>> {
        match self.get_f64(name)? {
            None => Ok(None),
            Some(n) if n.fract() == 0.0 => Ok(Some(n as i64)),
            Some(n) => Err(LifecycleError::validation(format!(
                "{} must be a whole number, got {}",
                name, n
            ))),
        }
    }

    pub fn get_list(&self, name: &str) -> Result<Option<Vec<Dynamic>>> {
        match self.get(name) {
            None => Ok(None),
            Some(Dynamic::List(l)) => Ok(Some(l.clone())),
            Some(other) => Err(type_mismatch(name, "list", other)),
        }
    }

    pub fn get_string_list(&self, name: &str) -> Result<Option<Vec<String>>> {
        let Some(items) = self.get_list(name)? else {
            return Ok(None);
        };
        items
            .iter()
            .map(|item| {
                item.as_string()
                    .map(str::to_string)
                    .ok_or_else(|| type_mismatch(name, "list of string", item))
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Elements of a list-of-objects attribute, each wrapped as a `State`
    /// so nested fields get the same typed accessors.
    pub fn get_objects(&self, name: &str) -> Result<Option<Vec<State>>> {
        let Some(items) = self.get_list(name)? else {
            return Ok(None);
        };
        items
            .into_iter()
            .map(|item| match item {
                Dynamic::Map(values) => Ok(State { id: None, values }),
                other => Err(type_mismatch(name, "list of object", &other)),
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// First element of a single-item block list (`MaxItems: 1` style).
    pub fn get_object(&self, name: &str) -> Result<Option<State>> {
        Ok(self
            .get_objects(name)?
            .and_then(|objects| objects.into_iter().next()))
    }

    pub fn into_dynamic(self) -> Dynamic {
        Dynamic::Map(self.values)
    }
}

fn type_mismatch(name: &str, expected: &str, actual: &Dynamic) -> LifecycleError {
    LifecycleError::validation(format!(
        "{}: expected {}, got {}",
        name,
        expected,
        actual.type_name()
    ))
}

/// Builds a nested object value for `State::set`.
#[derive(Debug, Default)]
pub struct ObjectBuilder {
    values: BTreeMap<String, Dynamic>,
}

impl ObjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, value: impl Into<Dynamic>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn build(self) -> Dynamic {
        Dynamic::Map(self.values)
    }

    /// Wrap as a single-element list, the shape Terraform uses for blocks.
    pub fn build_block(self) -> Dynamic {
        Dynamic::List(vec![self.build()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_typed_accessors() {
        let state = State::with_id("q1")
            .with("name", "Support")
            .with("auto_answer_only", true)
            .with("weight", 2i64);

        assert_eq!(state.id(), Some("q1"));
        assert_eq!(state.get_string("name").unwrap(), Some("Support".to_string()));
        assert_eq!(state.get_bool("auto_answer_only").unwrap(), Some(true));
        assert_eq!(state.get_i64("weight").unwrap(), Some(2));
        assert_eq!(state.get_string("missing").unwrap(), None);
    }

    #[test]
    fn state_rejects_wrong_type() {
        let state = State::new().with("name", 5i64);
        assert!(matches!(
            state.get_string("name"),
            Err(LifecycleError::Validation(_))
        ));
    }

    #[test]
    fn null_values_read_as_unset() {
        let state = State::new().with("description", Dynamic::Null);
        assert!(state.get("description").is_none());
        assert_eq!(state.get_string("description").unwrap(), None);
    }

    #[test]
    fn nested_objects_are_states() {
        let state = State::new().with(
            "activation",
            ObjectBuilder::new()
                .field("type", "immediate")
                .field("delay_in_seconds", 5i64)
                .build_block(),
        );

        let activation = state.get_object("activation").unwrap().unwrap();
        assert_eq!(
            activation.get_string("type").unwrap(),
            Some("immediate".to_string())
        );
        assert_eq!(activation.get_i64("delay_in_seconds").unwrap(), Some(5));
    }

    #[test]
    fn dynamic_json_roundtrip_keeps_integers() {
        let value: Dynamic = serde_json::from_str(r#"{"a":[1,"x",true,null]}"#).unwrap();
        assert_eq!(value.to_string(), r#"{"a":[1,"x",true,null]}"#);
    }
}
