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

//! JSON-lines document collection as a query source.
//!
//! The collection `<object>` under `<address>` is the file
//! `<address>/<object>.jsonl`, one JSON object per line. It is loaded once and
//! queried in memory. Windows are taken after a stable sort on the order-by
//! column, so disjoint `skip`/`limit` windows never overlap.

use crate::domain::entities::{Document, Filter, Predicate, QueryWindow};
use crate::domain::errors::{ConnectorError, Result};
use crate::domain::watermark::{parse_datetime, unwrap_extended};
use crate::ports::source_port::{Cursor, QuerySource};
use log::info;
use serde_json::Value;
use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

pub struct DocumentCollection {
    path: PathBuf,
    docs: RwLock<Vec<Document>>,
}

impl DocumentCollection {
    pub fn collection_path(address: impl AsRef<Path>, object: &str) -> PathBuf {
        address.as_ref().join(format!("{}.jsonl", object))
    }

    /// Loads `<address>/<object>.jsonl`. Blank lines are skipped.
    pub fn open(address: impl AsRef<Path>, object: &str) -> Result<Self> {
        let path = Self::collection_path(address, object);
        let file = File::open(&path)
            .map_err(|e| ConnectorError::Setup(format!("{}: {}", path.display(), e)))?;
        let mut docs = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line) {
                Ok(Value::Object(doc)) => docs.push(doc),
                Ok(_) => {
                    return Err(ConnectorError::Source(format!(
                        "{}:{}: not a JSON object",
                        path.display(),
                        n + 1
                    )))
                }
                Err(e) => {
                    return Err(ConnectorError::Source(format!(
                        "{}:{}: {}",
                        path.display(),
                        n + 1,
                        e
                    )))
                }
            }
        }
        info!("Loaded {} documents from {}", docs.len(), path.display());
        Ok(Self {
            path,
            docs: RwLock::new(docs),
        })
    }

    /// A collection held only in memory; inserts are not persisted.
    pub fn in_memory(docs: Vec<Document>) -> Self {
        Self {
            path: PathBuf::new(),
            docs: RwLock::new(docs),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a document in memory and, for file-backed collections, on disk.
    pub fn insert(&self, doc: Document) -> Result<()> {
        if !self.path.as_os_str().is_empty() {
            use std::io::Write;
            let mut file = fs::OpenOptions::new().append(true).create(true).open(&self.path)?;
            writeln!(file, "{}", Value::Object(doc.clone()))?;
        }
        self.docs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(doc);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn matching(&self, filter: &Filter) -> Vec<Document> {
        self.docs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|doc| matches(doc, filter))
            .cloned()
            .collect()
    }
}

fn matches(doc: &Document, filter: &Filter) -> bool {
    filter.predicates().iter().all(|p| match p {
        Predicate::Matches(expected) => expected.iter().all(|(k, v)| doc.get(k) == Some(v)),
        Predicate::Gt { column, value } => doc
            .get(column)
            .and_then(|v| value.compare_value(v))
            .is_some_and(|o| o == Ordering::Greater),
        Predicate::Lte { column, value } => doc
            .get(column)
            .and_then(|v| value.compare_value(v))
            .is_some_and(|o| o != Ordering::Greater),
    })
}

/// Orders two column values; missing and null sort first.
///
/// Values of different types order by type rank, so the order is total even
/// for columns with mixed types.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_present(a, b),
    }
}

fn compare_present(a: &Value, b: &Value) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    let a = unwrap_extended(a);
    let b = unwrap_extended(b);
    match (a.as_ref(), b.as_ref()) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.total_cmp(&y)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (x, y) if ra == DATE_RANK => {
            let dx = x.get("$date").and_then(Value::as_str);
            let dy = y.get("$date").and_then(Value::as_str);
            dx.and_then(parse_datetime)
                .cmp(&dy.and_then(parse_datetime))
                .then_with(|| dx.cmp(&dy))
        }
        (x, y) => x.to_string().cmp(&y.to_string()),
    }
}

const DATE_RANK: u8 = 6;

/// Type order of present values; extended-JSON wrappers rank as what they wrap.
fn type_rank(value: &Value) -> u8 {
    if let Value::Object(map) = value {
        if map.len() == 1 {
            if map.contains_key("$oid") {
                return 4;
            }
            if map.contains_key("$date") {
                return DATE_RANK;
            }
        }
    }
    match unwrap_extended(value).as_ref() {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 3,
        Value::Bool(_) => 5,
    }
}

impl QuerySource for DocumentCollection {
    fn count(&self, filter: &Filter) -> Result<u64> {
        Ok(self.matching(filter).len() as u64)
    }

    fn query(&self, window: &QueryWindow) -> Result<Cursor> {
        let mut docs = self.matching(&window.filter);
        if let Some(column) = &window.order_by {
            docs.sort_by(|a, b| compare_values(a.get(column), b.get(column)));
        }
        let page: Vec<Result<Document>> = docs
            .into_iter()
            .skip(window.skip as usize)
            .take(window.limit as usize)
            .map(Ok)
            .collect();
        Ok(Box::new(page.into_iter()))
    }

    fn max_of(&self, column: &str) -> Result<Option<Value>> {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs
            .iter()
            .filter_map(|d| d.get(column))
            .filter(|v| !v.is_null())
            .max_by(|a, b| compare_values(Some(a), Some(b)))
            .cloned())
    }
}
