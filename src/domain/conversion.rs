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

//! # Value Conversion
//!
//! Turns raw source values into the textual form a record carries. The worker
//! only depends on the `ValueConverter` trait, so date, number and identifier
//! formatting can be swapped per deployment.

use crate::domain::errors::{ConnectorError, Result};
use crate::domain::watermark::parse_datetime;
use serde_json::Value;

/// Converts one raw value into its normalized textual representation.
pub trait ValueConverter: Send + Sync {
    fn convert(&self, column: &str, value: &Value) -> Result<String>;
}

/// Canonical textual form used when a converter rejects a value.
pub fn canonical_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Default converter for JSON-shaped sources.
///
/// Extended-JSON wrappers (`{"$date": ..}`, `{"$oid": ..}`,
/// `{"$numberLong": ..}`) are unwrapped; dates are rendered as
/// `yyyy-MM-dd HH:mm:ss.SSS`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextConverter;

impl ValueConverter for TextConverter {
    fn convert(&self, column: &str, value: &Value) -> Result<String> {
        match value {
            Value::Null => Ok(String::new()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Number(n) => Ok(n.to_string()),
            Value::String(s) => Ok(s.clone()),
            Value::Array(_) => Ok(value.to_string()),
            Value::Object(map) => {
                if let Some(raw) = map.get("$date") {
                    let text = raw.as_str().ok_or_else(|| ConnectorError::Conversion {
                        column: column.to_string(),
                        reason: format!("$date is not a string: {}", raw),
                    })?;
                    let dt = parse_datetime(text).ok_or_else(|| ConnectorError::Conversion {
                        column: column.to_string(),
                        reason: format!("unrecognised date '{}'", text),
                    })?;
                    return Ok(dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string());
                }
                if let Some(Value::String(oid)) = map.get("$oid") {
                    return Ok(oid.clone());
                }
                if let Some(Value::String(n)) = map.get("$numberLong") {
                    return Ok(n.clone());
                }
                Ok(value.to_string())
            }
        }
    }
}
