// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// One level of an experimental factor.
///
/// The set of variants is closed: hosts that need richer payloads route them
/// through `Opaque`, which the engine passes along without interpreting.
///
/// The untagged representation makes JSON design files read naturally:
/// numbers, booleans, strings and 2/3/4-element arrays map straight onto the
/// typed variants. `Color` serializes as a 4-array and is only constructed
/// programmatically; a 4-array in a design file always deserializes as `Vec4`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactorValue {
    Bool(bool),
    Float(f64),
    String(String),
    Vec2([f64; 2]),
    Vec3([f64; 3]),
    Vec4([f64; 4]),
    Color([f32; 4]),
    Opaque(serde_json::Value),
}

impl FactorValue {
    /// The value as a `serde_json::Value`, for record fields and exports.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl std::fmt::Display for FactorValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactorValue::Bool(v) => write!(f, "{}", v),
            FactorValue::Float(v) => write!(f, "{}", v),
            FactorValue::String(v) => write!(f, "{}", v),
            FactorValue::Vec2(v) => write!(f, "[{}, {}]", v[0], v[1]),
            FactorValue::Vec3(v) => write!(f, "[{}, {}, {}]", v[0], v[1], v[2]),
            FactorValue::Vec4(v) => write!(f, "[{}, {}, {}, {}]", v[0], v[1], v[2], v[3]),
            FactorValue::Color(v) => write!(f, "[{}, {}, {}, {}]", v[0], v[1], v[2], v[3]),
            FactorValue::Opaque(v) => write!(f, "{}", v),
        }
    }
}

impl From<f64> for FactorValue {
    fn from(value: f64) -> Self {
        FactorValue::Float(value)
    }
}

impl From<i64> for FactorValue {
    fn from(value: i64) -> Self {
        FactorValue::Float(value as f64)
    }
}

impl From<bool> for FactorValue {
    fn from(value: bool) -> Self {
        FactorValue::Bool(value)
    }
}

impl From<&str> for FactorValue {
    fn from(value: &str) -> Self {
        FactorValue::String(value.to_string())
    }
}

impl From<String> for FactorValue {
    fn from(value: String) -> Self {
        FactorValue::String(value)
    }
}

impl From<[f64; 2]> for FactorValue {
    fn from(value: [f64; 2]) -> Self {
        FactorValue::Vec2(value)
    }
}

impl From<[f64; 3]> for FactorValue {
    fn from(value: [f64; 3]) -> Self {
        FactorValue::Vec3(value)
    }
}

impl From<[f64; 4]> for FactorValue {
    fn from(value: [f64; 4]) -> Self {
        FactorValue::Vec4(value)
    }
}

impl TryFrom<&FactorValue> for f64 {
    type Error = &'static str;

    fn try_from(value: &FactorValue) -> Result<Self, Self::Error> {
        match value {
            FactorValue::Float(v) => Ok(*v),
            FactorValue::Bool(_) => Err("Cannot convert boolean to f64"),
            _ => Err("Value is not scalar"),
        }
    }
}

impl TryFrom<&FactorValue> for bool {
    type Error = &'static str;

    fn try_from(value: &FactorValue) -> Result<Self, Self::Error> {
        match value {
            FactorValue::Bool(v) => Ok(*v),
            _ => Err("Value is not boolean"),
        }
    }
}
