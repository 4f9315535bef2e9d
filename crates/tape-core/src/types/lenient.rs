//! Serde helpers for numbers that may arrive as JSON strings.
//!
//! The feed encodes 64-bit integers as strings (`"1700000000"`) but some
//! fields arrive as plain numbers. Both forms are accepted, as are
//! float-form integers (`1.7e9`) and `null`, which reads as zero.

use std::fmt::Display;
use std::str::FromStr;

use serde::Deserialize;
use serde::de::{self, Deserializer};
use serde_json::{Number, Value};

/// Largest magnitude an `f64` can hold while still converting to `i64`.
const F64_INT_LIMIT: f64 = 9.2e18;

/// Deserialize a number from either a JSON number or a JSON string.
pub fn number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
    T::Err: Display,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(T::default()),
        Value::Number(n) => integral(&n).parse().map_err(de::Error::custom),
        Value::String(s) => s.trim().parse().map_err(de::Error::custom),
        other => Err(de::Error::custom(format!(
            "expected number or numeric string, got {other}"
        ))),
    }
}

/// Text form of `n`, with whole floats written as integers.
fn integral(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < F64_INT_LIMIT => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

/// Deserialize a string from either a JSON string or a JSON number.
pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("expected string or number, got {other}"))),
    }
}
