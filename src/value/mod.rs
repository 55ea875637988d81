//! Dynamically-typed field values and the value-type-name registry.
//!
//! Fields in the path-addressed store hold a [`Value`]: a scalar, a path or
//! path edit list, a dictionary of values with partial-key access, or a
//! time-sample map. [`ValueTypeName`] describes an attribute's declared type,
//! its role (Distance, Angle, ...) and the default display unit derived from
//! that role.

use crate::listop::ListOp;
use crate::path::Path;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Value represents a dynamically-typed field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    String(String),
    Token(String),
    Path(Path),
    PathList(Vec<Path>),
    TokenList(Vec<String>),
    PathListOp(ListOp<Path>),
    TokenListOp(ListOp<String>),
    Dict(Dict),
    TimeSamples(TimeSampleMap),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Token(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Value::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_path_list_op(&self) -> Option<&ListOp<Path>> {
        match self {
            Value::PathListOp(op) => Some(op),
            _ => None,
        }
    }

    pub fn as_token_list_op(&self) -> Option<&ListOp<String>> {
        match self {
            Value::TokenListOp(op) => Some(op),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_time_samples(&self) -> Option<&TimeSampleMap> {
        match self {
            Value::TimeSamples(ts) => Some(ts),
            _ => None,
        }
    }

    /// Returns the scalar kind of this value, if it is a scalar.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            Value::Bool(_) => Some(ScalarKind::Bool),
            Value::Int(_) => Some(ScalarKind::Int),
            Value::Float(_) => Some(ScalarKind::Float),
            Value::Double(_) => Some(ScalarKind::Double),
            Value::String(_) => Some(ScalarKind::String),
            Value::Token(_) => Some(ScalarKind::Token),
            _ => None,
        }
    }

    /// Coerces this value to the given scalar kind. Exact matches pass
    /// through; numeric kinds convert to one another; anything else is None.
    pub fn coerce_to(&self, kind: ScalarKind) -> Option<Value> {
        if self.scalar_kind() == Some(kind) {
            return Some(self.clone());
        }
        match (self, kind) {
            (Value::Int(i), ScalarKind::Float) => Some(Value::Float(*i as f32)),
            (Value::Int(i), ScalarKind::Double) => Some(Value::Double(*i as f64)),
            (Value::Float(f), ScalarKind::Double) => Some(Value::Double(f64::from(*f))),
            (Value::Float(f), ScalarKind::Int) => Some(Value::Int(*f as i64)),
            (Value::Double(d), ScalarKind::Float) => Some(Value::Float(*d as f32)),
            (Value::Double(d), ScalarKind::Int) => Some(Value::Int(*d as i64)),
            (Value::String(s), ScalarKind::Token) => Some(Value::Token(s.clone())),
            (Value::Token(t), ScalarKind::String) => Some(Value::String(t.clone())),
            _ => None,
        }
    }
}

/// Dict is a dictionary of values keyed by strings, with `:`-separated
/// partial-key access into nested dictionaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dict {
    pub entries: BTreeMap<String, Value>,
}

impl Dict {
    pub fn new() -> Self {
        Dict::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Looks up a possibly-nested value by a `:`-separated key path.
    pub fn get_at(&self, key_path: &str) -> Option<&Value> {
        let mut parts = key_path.split(':');
        let first = parts.next()?;
        let mut current = self.entries.get(first)?;
        for part in parts {
            current = current.as_dict()?.entries.get(part)?;
        }
        Some(current)
    }

    /// Sets a possibly-nested value by a `:`-separated key path, creating
    /// intermediate dictionaries as needed. A non-dictionary intermediate
    /// value is replaced.
    pub fn set_at(&mut self, key_path: &str, value: Value) {
        let mut parts: Vec<&str> = key_path.split(':').collect();
        let last = parts.pop().unwrap_or(key_path);
        let mut current = &mut self.entries;
        for part in parts {
            let entry = current
                .entry(part.to_string())
                .or_insert_with(|| Value::Dict(Dict::new()));
            if !matches!(entry, Value::Dict(_)) {
                *entry = Value::Dict(Dict::new());
            }
            match entry {
                Value::Dict(d) => current = &mut d.entries,
                _ => unreachable!(),
            }
        }
        current.insert(last.to_string(), value);
    }

    /// Erases a possibly-nested value by a `:`-separated key path. Returns
    /// true if a value was removed. Intermediate dictionaries emptied by the
    /// removal are pruned.
    pub fn erase_at(&mut self, key_path: &str) -> bool {
        match key_path.split_once(':') {
            None => self.entries.remove(key_path).is_some(),
            Some((first, rest)) => {
                let Some(Value::Dict(child)) = self.entries.get_mut(first) else {
                    return false;
                };
                if !child.erase_at(rest) {
                    return false;
                }
                if child.is_empty() {
                    self.entries.remove(first);
                }
                true
            }
        }
    }

    /// Recursive override-union: keys missing here are filled from `weak`;
    /// keys present in both recurse when both values are dictionaries, and
    /// keep this dictionary's value otherwise.
    pub fn merge_under(&mut self, weak: &Dict) {
        for (key, weak_value) in &weak.entries {
            match self.entries.get_mut(key) {
                None => {
                    self.entries.insert(key.clone(), weak_value.clone());
                }
                Some(Value::Dict(strong_child)) => {
                    if let Value::Dict(weak_child) = weak_value {
                        strong_child.merge_under(weak_child);
                    }
                }
                Some(_) => {}
            }
        }
    }
}

/// TimeCode is an ordered time key for time-sample maps. It serializes as a
/// string so time-sample maps survive JSON, whose map keys must be strings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeCode(pub f64);

impl Serialize for TimeCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TimeCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TimeCodeVisitor;

        impl serde::de::Visitor<'_> for TimeCodeVisitor {
            type Value = TimeCode;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a time code as a number or numeric string")
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<TimeCode, E> {
                Ok(TimeCode(v))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<TimeCode, E> {
                Ok(TimeCode(v as f64))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<TimeCode, E> {
                Ok(TimeCode(v as f64))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<TimeCode, E> {
                v.parse::<f64>().map(TimeCode).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(TimeCodeVisitor)
    }
}

impl Eq for TimeCode {}

impl PartialOrd for TimeCode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeCode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for TimeCode {
    fn from(t: f64) -> Self {
        TimeCode(t)
    }
}

impl fmt::Display for TimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// TimeSampleMap maps time codes to sample values.
pub type TimeSampleMap = BTreeMap<TimeCode, Value>;

/// ScalarKind identifies the scalar representation of a value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    Double,
    String,
    Token,
}

/// Role describes the semantic interpretation of a value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    None,
    Distance,
    Angle,
    Color,
    Point,
    Normal,
}

/// Unit is a display unit for authored attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Millimeters,
    Centimeters,
    Meters,
    Degrees,
    Radians,
}

impl Unit {
    pub fn name(self) -> &'static str {
        match self {
            Unit::Millimeters => "millimeters",
            Unit::Centimeters => "centimeters",
            Unit::Meters => "meters",
            Unit::Degrees => "degrees",
            Unit::Radians => "radians",
        }
    }

    pub fn from_name(name: &str) -> Option<Unit> {
        match name {
            "millimeters" => Some(Unit::Millimeters),
            "centimeters" => Some(Unit::Centimeters),
            "meters" => Some(Unit::Meters),
            "degrees" => Some(Unit::Degrees),
            "radians" => Some(Unit::Radians),
            _ => None,
        }
    }
}

impl Role {
    /// Returns the default display unit for this role, if it has one.
    pub fn default_unit(self) -> Option<Unit> {
        match self {
            Role::Distance | Role::Point | Role::Normal => Some(Unit::Centimeters),
            Role::Angle => Some(Unit::Degrees),
            Role::None | Role::Color => None,
        }
    }
}

/// ValueTypeName describes a registered attribute value type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueTypeName {
    pub name: &'static str,
    pub scalar: ScalarKind,
    pub role: Role,
}

impl ValueTypeName {
    /// Returns the default display unit derived from this type's role.
    pub fn default_unit(&self) -> Option<Unit> {
        self.role.default_unit()
    }
}

static VALUE_TYPE_NAMES: Lazy<BTreeMap<&'static str, ValueTypeName>> = Lazy::new(|| {
    let types = [
        ValueTypeName { name: "bool", scalar: ScalarKind::Bool, role: Role::None },
        ValueTypeName { name: "int", scalar: ScalarKind::Int, role: Role::None },
        ValueTypeName { name: "float", scalar: ScalarKind::Float, role: Role::None },
        ValueTypeName { name: "double", scalar: ScalarKind::Double, role: Role::None },
        ValueTypeName { name: "string", scalar: ScalarKind::String, role: Role::None },
        ValueTypeName { name: "token", scalar: ScalarKind::Token, role: Role::None },
        ValueTypeName { name: "distance", scalar: ScalarKind::Double, role: Role::Distance },
        ValueTypeName { name: "angle", scalar: ScalarKind::Double, role: Role::Angle },
        ValueTypeName { name: "point", scalar: ScalarKind::Double, role: Role::Point },
        ValueTypeName { name: "normal", scalar: ScalarKind::Double, role: Role::Normal },
        ValueTypeName { name: "color", scalar: ScalarKind::Float, role: Role::Color },
    ];
    types.into_iter().map(|t| (t.name, t)).collect()
});

/// Returns the registered value type for `name`, if any.
pub fn find_value_type_name(name: &str) -> Option<&'static ValueTypeName> {
    VALUE_TYPE_NAMES.get(name)
}

/// Returns true if `name` names a registered value type.
pub fn is_valid_value_type_name(name: &str) -> bool {
    VALUE_TYPE_NAMES.contains_key(name)
}

/// Parse a value from JSON.
pub fn from_json(json: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(json)
}

/// Serialize a value to JSON.
pub fn to_json(value: &Value) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}
