//! Values stored in observed trees.

use std::fmt;

use objerve_path::Key;
use serde_json::Number;

/// Handle to an observed container.
///
/// Handles are generational: once a node is reclaimed its handle goes stale
/// and every operation rejects it, even if the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub(crate) fn index(self) -> usize {
        self.index as usize
    }

    pub(crate) fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// A value held in a container slot.
///
/// Containers are always [`Value::Node`]; primitives are stored as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Node(NodeId),
}

impl Value {
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::Node(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converts a primitive JSON value. Arrays and objects return `None`.
    pub fn from_primitive(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => Some(Value::Number(n.clone())),
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    pub(crate) fn from_len(len: usize) -> Value {
        Value::Number(Number::from(len as u64))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON number form and become `Null`.
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::Node(id)
    }
}

/// A value about to be stored.
///
/// Plain JSON containers are wrapped into fresh nodes, recursively. An
/// existing [`NodeId`] is stored as-is and never wrapped twice.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Json(serde_json::Value),
    Node(NodeId),
}

impl From<serde_json::Value> for Input {
    fn from(json: serde_json::Value) -> Self {
        Input::Json(json)
    }
}

impl From<NodeId> for Input {
    fn from(id: NodeId) -> Self {
        Input::Node(id)
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Input::Json(serde_json::Value::Null),
            Value::Bool(b) => Input::Json(b.into()),
            Value::Number(n) => Input::Json(serde_json::Value::Number(n)),
            Value::String(s) => Input::Json(s.into()),
            Value::Node(id) => Input::Node(id),
        }
    }
}

macro_rules! input_from_json {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Input {
                fn from(v: $t) -> Self {
                    Input::Json(serde_json::Value::from(v))
                }
            }
        )*
    };
}

input_from_json!(bool, i32, i64, u32, u64, usize, f64, &str, String);

/// Anything usable as a container key. Indices become their decimal form.
pub trait IntoKey {
    fn into_key(self) -> Key;
}

impl IntoKey for &str {
    fn into_key(self) -> Key {
        self.to_string()
    }
}

impl IntoKey for String {
    fn into_key(self) -> Key {
        self
    }
}

impl IntoKey for &String {
    fn into_key(self) -> Key {
        self.clone()
    }
}

impl IntoKey for usize {
    fn into_key(self) -> Key {
        self.to_string()
    }
}

/// Identifier shared by every listener call caused by one external mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId(pub(crate) u64);

impl TxId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx{}", self.0)
    }
}
