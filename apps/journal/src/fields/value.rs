use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// A scalar as it sits in the backing table or in a field's configured `default`.
///
/// Absence ("never written" or "not measured") is modelled as `Option::None` by
/// the callers, never as a variant here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawValue {
    /// Truthiness used by checkbox fields.
    pub fn truthy(&self) -> bool {
        match self {
            RawValue::Bool(b) => *b,
            RawValue::Int(i) => *i != 0,
            RawValue::Float(f) => *f != 0.0,
            RawValue::Text(s) => !s.is_empty(),
        }
    }

    /// Numeric view for metrics. Booleans and non-finite numbers are not numbers here.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Int(i) => Some(*i as f64),
            RawValue::Float(f) if f.is_finite() => Some(*f),
            RawValue::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Bool(true) => f.write_str("True"),
            RawValue::Bool(false) => f.write_str("False"),
            RawValue::Int(i) => write!(f, "{i}"),
            RawValue::Float(x) => f.write_str(&format_float(*x)),
            RawValue::Text(s) => f.write_str(s),
        }
    }
}

/// Integral floats keep a trailing `.0` so they read back as floats.
pub fn format_float(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

/// The value an input control is seeded with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Time(NaiveTime),
    Raw(RawValue),
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Int(i) => write!(f, "{i}"),
            TypedValue::Float(x) => f.write_str(&format_float(*x)),
            TypedValue::Bool(b) => RawValue::Bool(*b).fmt(f),
            TypedValue::Text(s) => f.write_str(s),
            TypedValue::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            TypedValue::Raw(raw) => raw.fmt(f),
        }
    }
}
