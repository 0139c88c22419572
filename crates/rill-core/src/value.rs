#![forbid(unsafe_code)]

//! Immutable, structurally comparable state values.
//!
//! Every state carried through the graph is a [`Value`]. Collections are
//! persistent (`im::Vector`, `im::OrdMap`), so cloning is O(1) and every
//! "update" method returns a new value that shares structure with the old
//! one. Nothing in this module mutates a value in place.
//!
//! # Invariants
//!
//! 1. Equality is structural: two values are equal when their shapes and
//!    leaves are equal, regardless of how they were built.
//! 2. Equality is reflexive for every value. NaN equals NaN and `0.0` equals
//!    `-0.0`; `Int` and `Float` never compare equal to each other.

use im::{OrdMap, Vector};

/// An immutable state value.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "state-persistence",
    derive(serde::Serialize, serde::Deserialize),
    serde(untagged)
)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vector<Value>),
    Map(OrdMap<String, Value>),
}

impl Value {
    /// An empty keyed map.
    #[must_use]
    pub fn empty_map() -> Self {
        Self::Map(OrdMap::new())
    }

    /// Build a keyed map from `(key, value)` pairs. Later duplicates win.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }

    /// Build a list from values, preserving order.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Look up a map entry by key, or a list element by decimal index.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Map(map) => map.get(key),
            Self::List(list) => key.parse::<usize>().ok().and_then(|idx| list.get(idx)),
            _ => None,
        }
    }

    /// Follow a path of keys through nested collections.
    ///
    /// An empty path returns `self`.
    #[must_use]
    pub fn get_in(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(self, |current, key| current.get(key))
    }

    /// Return a map with `key` set to `value`.
    ///
    /// A non-map receiver is treated as an empty map.
    #[must_use]
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Self {
        let base = match self {
            Self::Map(map) => map.clone(),
            _ => OrdMap::new(),
        };
        Self::Map(base.update(key.into(), value))
    }

    /// Return a map without `key`.
    ///
    /// A non-map receiver is treated as an empty map.
    #[must_use]
    pub fn remove(&self, key: &str) -> Self {
        match self {
            Self::Map(map) => Self::Map(map.without(key)),
            _ => Self::empty_map(),
        }
    }

    /// Return a list with `value` appended.
    ///
    /// A non-list receiver is treated as an empty list.
    #[must_use]
    pub fn push(&self, value: Value) -> Self {
        let mut list = match self {
            Self::List(list) => list.clone(),
            _ => Vector::new(),
        };
        list.push_back(value);
        Self::List(list)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to `f64`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&Vector<Value>> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&OrdMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Whether the value is a list or a map.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::List(_) | Self::Map(_))
    }

    /// Number of entries for collections, `0` for scalars.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::List(list) => list.len(),
            Self::Map(map) => map.len(),
            _ => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the value counts as reported for funnel priming.
    ///
    /// `false`, `0`, `0.0`, NaN and `""` are falsy. Collections are truthy
    /// even when empty.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Float(x) => *x != 0.0 && !x.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::List(_) | Self::Map(_) => true,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

#[cfg(feature = "state-persistence")]
impl Value {
    /// Convert persisted JSON into a value.
    ///
    /// `null` has no value representation: a top-level `null` yields `None`,
    /// and `null` map entries or list elements are omitted. Numbers that fit
    /// `i64` become `Int`, everything else becomes `Float`.
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Self::Bool(b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::Str(s)),
            serde_json::Value::Array(items) => Some(Self::List(
                items.into_iter().filter_map(Self::from_json).collect(),
            )),
            serde_json::Value::Object(entries) => Some(Self::Map(
                entries
                    .into_iter()
                    .filter_map(|(key, value)| Self::from_json(value).map(|v| (key, v)))
                    .collect(),
            )),
        }
    }

    /// Convert the value into JSON. Non-finite floats become `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(n) => serde_json::Value::from(*n),
            Self::Float(x) => serde_json::Number::from_f64(*x)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Str(s) => serde_json::Value::String(s.clone()),
            Self::List(list) => serde_json::Value::Array(list.iter().map(Self::to_json).collect()),
            Self::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::list(items)
    }
}

impl From<Vector<Value>> for Value {
    fn from(list: Vector<Value>) -> Self {
        Self::List(list)
    }
}

impl From<OrdMap<String, Value>> for Value {
    fn from(map: OrdMap<String, Value>) -> Self {
        Self::Map(map)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
