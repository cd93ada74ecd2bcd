// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Watermark Values
//!
//! A watermark is the last boundary value of an incremental cursor column. It is
//! persisted between runs as plain text, so every run has to turn that text
//! back into something comparable. The declared type tag decides how:
//!
//! | tag                          | scalar                  |
//! |------------------------------|-------------------------|
//! | `short`, `int`               | 32-bit integer          |
//! | `bigint`                     | 64-bit integer          |
//! | `decimal`, `double`, `float` | floating point          |
//! | `date`                       | calendar date-time      |
//! | `timestamp`                  | epoch milliseconds      |
//! | anything else / missing      | opaque string           |
//!
//! Source values are compared after unwrapping the extended-JSON scalar
//! wrappers, so `{"$oid": ..}` and `{"$numberLong": ..}` line up with the
//! text a converter renders for them.

use crate::domain::errors::{ConnectorError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Declared type of an incremental cursor column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkType {
    Short,
    Int,
    BigInt,
    Decimal,
    Double,
    Float,
    Date,
    Timestamp,
    Opaque,
}

impl WatermarkType {
    /// Maps a configuration tag to a type. Unknown or absent tags are opaque.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(|t| t.trim().to_lowercase()).as_deref() {
            Some("short") => WatermarkType::Short,
            Some("int") => WatermarkType::Int,
            Some("bigint") => WatermarkType::BigInt,
            Some("decimal") => WatermarkType::Decimal,
            Some("double") => WatermarkType::Double,
            Some("float") => WatermarkType::Float,
            Some("date") => WatermarkType::Date,
            Some("timestamp") => WatermarkType::Timestamp,
            _ => WatermarkType::Opaque,
        }
    }

    /// Parses a persisted watermark into a comparable scalar.
    ///
    /// A `date` that does not parse is an error; it is never retried as a
    /// timestamp.
    pub fn parse(&self, raw: &str) -> Result<Scalar> {
        let text = raw.trim();
        let parsed = match self {
            WatermarkType::Short | WatermarkType::Int => {
                text.parse::<i32>().map(|v| Scalar::Int(v as i64)).ok()
            }
            WatermarkType::BigInt => text.parse::<i64>().map(Scalar::Int).ok(),
            WatermarkType::Decimal | WatermarkType::Double | WatermarkType::Float => {
                text.parse::<f64>().map(Scalar::Float).ok()
            }
            WatermarkType::Date => parse_datetime(text).map(Scalar::DateTime),
            WatermarkType::Timestamp => parse_epoch_millis(text).map(Scalar::Timestamp),
            WatermarkType::Opaque => Some(Scalar::Text(raw.to_string())),
        };
        parsed.ok_or_else(|| {
            ConnectorError::Watermark(format!("cannot parse '{}' as {}", raw, self))
        })
    }
}

impl fmt::Display for WatermarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            WatermarkType::Short => "short",
            WatermarkType::Int => "int",
            WatermarkType::BigInt => "bigint",
            WatermarkType::Decimal => "decimal",
            WatermarkType::Double => "double",
            WatermarkType::Float => "float",
            WatermarkType::Date => "date",
            WatermarkType::Timestamp => "timestamp",
            WatermarkType::Opaque => "opaque",
        };
        write!(f, "{}", tag)
    }
}

/// Accepts `yyyy-MM-dd HH:mm:ss[.SSS]`, its `T`-separated form, or a bare date.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// An integer is taken as epoch seconds, anything else as a date-time.
fn parse_epoch_millis(text: &str) -> Option<i64> {
    match text.parse::<i64>() {
        Ok(secs) => secs.checked_mul(1000),
        Err(_) => parse_datetime(text).map(|dt| dt.and_utc().timestamp_millis()),
    }
}

/// Unwraps single-key extended-JSON scalars: `$oid` becomes a string and the
/// `$number*` forms become numbers. `$date` is left for date parsing.
pub fn unwrap_extended(value: &Value) -> Cow<'_, Value> {
    let Value::Object(map) = value else {
        return Cow::Borrowed(value);
    };
    if map.len() != 1 {
        return Cow::Borrowed(value);
    }
    let unwrapped = match map.iter().next() {
        Some((key, Value::String(s))) => match key.as_str() {
            "$oid" => Some(Value::String(s.clone())),
            "$numberLong" | "$numberInt" => s.parse::<i64>().ok().map(Value::from),
            "$numberDouble" | "$numberDecimal" => s
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            _ => None,
        },
        _ => None,
    };
    unwrapped.map_or(Cow::Borrowed(value), Cow::Owned)
}

/// A typed watermark value used in bound predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    DateTime(NaiveDateTime),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    Text(String),
}

impl Scalar {
    /// Orders a raw source value against this scalar, coercing the value to
    /// this scalar's kind. Returns `None` when the two cannot be compared,
    /// e.g. a missing field or a string that is not a date.
    pub fn compare_value(&self, value: &Value) -> Option<Ordering> {
        let value = unwrap_extended(value);
        let value = value.as_ref();
        if value.is_null() {
            return None;
        }
        match self {
            Scalar::Int(bound) => match value {
                Value::Number(n) => match n.as_i64() {
                    Some(i) => Some(i.cmp(bound)),
                    None => n.as_f64()?.partial_cmp(&(*bound as f64)),
                },
                _ => None,
            },
            Scalar::Float(bound) => value.as_f64()?.partial_cmp(bound),
            Scalar::DateTime(bound) => datetime_of(value).map(|dt| dt.cmp(bound)),
            Scalar::Timestamp(bound) => match value {
                Value::Number(n) => {
                    let millis = match n.as_i64() {
                        Some(secs) => secs.checked_mul(1000)?,
                        None => (n.as_f64()? * 1000.0).round() as i64,
                    };
                    Some(millis.cmp(bound))
                }
                _ => datetime_of(value).map(|dt| dt.and_utc().timestamp_millis().cmp(bound)),
            },
            Scalar::Text(bound) => match value {
                Value::String(s) => Some(s.as_str().cmp(bound.as_str())),
                Value::Number(n) => match bound.trim().parse::<f64>() {
                    Ok(b) => n.as_f64()?.partial_cmp(&b),
                    Err(_) => Some(n.to_string().as_str().cmp(bound.as_str())),
                },
                other => Some(other.to_string().as_str().cmp(bound.as_str())),
            },
        }
    }
}

fn datetime_of(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_datetime(s),
        Value::Object(map) => map.get("$date").and_then(Value::as_str).and_then(parse_datetime),
        _ => None,
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.3f")),
            Scalar::Timestamp(v) => write!(f, "@{}ms", v),
            Scalar::Text(v) => write!(f, "'{}'", v),
        }
    }
}
