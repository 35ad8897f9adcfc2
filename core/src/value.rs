use serde::{
  ser::{SerializeMap, SerializeSeq},
  Deserialize, Serialize, Serializer,
};
use thiserror::Error;

use crate::models::{NodePath, PathSegment, PointerId, ValueType};

/// Key of the single-entry object that marks a pointer under [`PointerPolicy::Tagged`].
pub const POINTER_TAG: &str = "$pointer";

/// A document value. Pointers are explicit; everything else mirrors JSON.
///
/// Objects keep their insertion order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Null,
  Bool(bool),
  Number(serde_json::Number),
  String(String),
  Array(Vec<Value>),
  Object(Vec<(String, Value)>),
  Pointer(PointerId),
}

/// How raw JSON is mapped onto [`Value::Pointer`] when a document or a fetched chunk is imported.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PointerPolicy {
  /// Integers strictly greater than `threshold` are pointers.
  NumericThreshold { threshold: u64 },
  /// Only `{"$pointer": <id>}` objects are pointers.
  Tagged,
}

impl Default for PointerPolicy {
  fn default() -> Self {
    PointerPolicy::NumericThreshold { threshold: 10_000 }
  }
}

impl PointerPolicy {
  pub fn pointer_id(&self, raw: &serde_json::Value) -> Option<PointerId> {
    match self {
      PointerPolicy::NumericThreshold { threshold } => raw.as_u64().filter(|n| n > threshold),
      PointerPolicy::Tagged => {
        let obj = raw.as_object()?;
        if obj.len() != 1 {
          return None;
        }
        obj.get(POINTER_TAG)?.as_u64()
      }
    }
  }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
  #[error("no value at {path} (segment {depth} not found)")]
  Missing { path: NodePath, depth: usize },
  #[error("cannot descend into a scalar at {path} (segment {depth})")]
  NotAContainer { path: NodePath, depth: usize },
}

/// Type tag of a document value. Purely structural.
pub fn classify(value: &Value) -> ValueType {
  match value {
    Value::Null => ValueType::Null,
    Value::Bool(_) => ValueType::Boolean,
    Value::Number(_) => ValueType::Number,
    Value::String(_) => ValueType::String,
    Value::Array(_) => ValueType::Array,
    Value::Object(_) => ValueType::Object,
    Value::Pointer(_) => ValueType::Pointer,
  }
}

/// Type tag of a raw JSON value, with pointer detection done by `policy`.
pub fn classify_raw(raw: &serde_json::Value, policy: &PointerPolicy) -> ValueType {
  if policy.pointer_id(raw).is_some() {
    return ValueType::Pointer;
  }
  match raw {
    serde_json::Value::Null => ValueType::Null,
    serde_json::Value::Bool(_) => ValueType::Boolean,
    serde_json::Value::Number(_) => ValueType::Number,
    serde_json::Value::String(_) => ValueType::String,
    serde_json::Value::Array(_) => ValueType::Array,
    serde_json::Value::Object(_) => ValueType::Object,
  }
}

impl Value {
  pub fn from_json(raw: &serde_json::Value, policy: &PointerPolicy) -> Self {
    if let Some(id) = policy.pointer_id(raw) {
      return Value::Pointer(id);
    }
    match raw {
      serde_json::Value::Null => Value::Null,
      serde_json::Value::Bool(b) => Value::Bool(*b),
      serde_json::Value::Number(n) => Value::Number(n.clone()),
      serde_json::Value::String(s) => Value::String(s.clone()),
      serde_json::Value::Array(items) => {
        Value::Array(items.iter().map(|v| Value::from_json(v, policy)).collect())
      }
      serde_json::Value::Object(map) => Value::Object(
        map
          .iter()
          .map(|(k, v)| (k.clone(), Value::from_json(v, policy)))
          .collect(),
      ),
    }
  }

  /// Back to JSON. Pointers become `{"$pointer": id}`.
  pub fn to_json(&self) -> serde_json::Value {
    match self {
      Value::Null => serde_json::Value::Null,
      Value::Bool(b) => serde_json::Value::Bool(*b),
      Value::Number(n) => serde_json::Value::Number(n.clone()),
      Value::String(s) => serde_json::Value::String(s.clone()),
      Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
      Value::Object(entries) => serde_json::Value::Object(
        entries
          .iter()
          .map(|(k, v)| (k.clone(), v.to_json()))
          .collect(),
      ),
      Value::Pointer(id) => {
        let mut map = serde_json::Map::new();
        map.insert(POINTER_TAG.to_string(), serde_json::Value::from(*id));
        serde_json::Value::Object(map)
      }
    }
  }

  pub fn kind(&self) -> ValueType {
    classify(self)
  }

  pub fn as_pointer(&self) -> Option<PointerId> {
    match self {
      Value::Pointer(id) => Some(*id),
      _ => None,
    }
  }

  /// Direct children count for containers, 0 for everything else.
  pub fn child_count(&self) -> usize {
    match self {
      Value::Array(items) => items.len(),
      Value::Object(entries) => entries.len(),
      _ => 0,
    }
  }

  pub fn get(&self, segment: &PathSegment) -> Option<&Value> {
    match (self, segment) {
      (Value::Object(entries), PathSegment::Key(key)) => {
        entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
      }
      (Value::Array(items), PathSegment::Index(i)) => items.get(*i),
      _ => None,
    }
  }

  fn get_mut(&mut self, segment: &PathSegment) -> Option<&mut Value> {
    match (self, segment) {
      (Value::Object(entries), PathSegment::Key(key)) => {
        entries.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
      }
      (Value::Array(items), PathSegment::Index(i)) => items.get_mut(*i),
      _ => None,
    }
  }

  /// Walk `path` from this value.
  pub fn at(&self, path: &NodePath) -> Result<&Value, PathError> {
    let mut current = self;
    for (depth, segment) in path.segments().iter().enumerate() {
      if !current.kind().is_container() {
        return Err(PathError::NotAContainer {
          path: path.clone(),
          depth,
        });
      }
      current = current.get(segment).ok_or_else(|| PathError::Missing {
        path: path.clone(),
        depth,
      })?;
    }
    Ok(current)
  }

  pub fn at_mut(&mut self, path: &NodePath) -> Result<&mut Value, PathError> {
    let mut current = self;
    for (depth, segment) in path.segments().iter().enumerate() {
      if !current.kind().is_container() {
        return Err(PathError::NotAContainer {
          path: path.clone(),
          depth,
        });
      }
      current = current.get_mut(segment).ok_or_else(|| PathError::Missing {
        path: path.clone(),
        depth,
      })?;
    }
    Ok(current)
  }

  /// Swap the value at `path` for `replacement`, returning the previous value.
  pub fn replace_at(&mut self, path: &NodePath, replacement: Value) -> Result<Value, PathError> {
    let slot = self.at_mut(path)?;
    Ok(std::mem::replace(slot, replacement))
  }

  /// Inspector text: strings as-is, everything else as pretty JSON.
  pub fn display_text(&self) -> String {
    match self {
      Value::String(s) => s.clone(),
      other => serde_json::to_string_pretty(&other.to_json()).unwrap_or_default(),
    }
  }

  /// Length in Unicode scalar values (`char`s), not UTF-16 code units, so an emoji counts
  /// as one. Non-strings are measured on their compact JSON form.
  pub fn size_chars(&self) -> usize {
    match self {
      Value::String(s) => s.chars().count(),
      other => serde_json::to_string(&other.to_json())
        .map(|s| s.chars().count())
        .unwrap_or(0),
    }
  }
}

impl Serialize for Value {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Value::Null => serializer.serialize_unit(),
      Value::Bool(b) => serializer.serialize_bool(*b),
      Value::Number(n) => n.serialize(serializer),
      Value::String(s) => serializer.serialize_str(s),
      Value::Array(items) => {
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items {
          seq.serialize_element(item)?;
        }
        seq.end()
      }
      Value::Object(entries) => {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (k, v) in entries {
          map.serialize_entry(k, v)?;
        }
        map.end()
      }
      Value::Pointer(id) => {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(POINTER_TAG, id)?;
        map.end()
      }
    }
  }
}
