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

//! # Domain Entities
//!
//! The "nouns" of a job: what a source looks like, how it is cut into
//! partitions, what a record is, and how a finished job reports back.

use crate::domain::watermark::Scalar;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A single source document. Field order is irrelevant; projection decides it.
pub type Document = serde_json::Map<String, Value>;

/// Incremental cursor settings of a source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CursorSpec {
    /// Column whose maximum is frozen as the upper bound of a run.
    pub column: String,
    /// Declared type tag (`int`, `bigint`, `timestamp`, ...).
    #[serde(default, rename = "type")]
    pub type_tag: Option<String>,
    /// Watermark committed by the previous run, if any.
    #[serde(default, rename = "value")]
    pub prior: Option<String>,
}

/// Immutable description of a source, owned by the job configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceDescriptor {
    /// Host, directory or store location.
    pub address: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Collection, table or base directory to read.
    pub object: String,
    /// Equality filter document applied on top of any watermark bounds.
    pub filter: Option<Document>,
    /// Filename pattern for hierarchical sources.
    pub filename_pattern: Option<String>,
    pub cursor: Option<CursorSpec>,
    pub recursive: bool,
    pub secure: bool,
}

/// One entry of an enumerable source listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Path relative to the listed root, `/`-separated.
    pub name: String,
    pub size: u64,
    /// Modification time in epoch seconds.
    pub timestamp: i64,
}

/// A single filter clause. All clauses of a `Filter` are combined with AND.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Every field of the document must equal the source value.
    Matches(Document),
    /// Strict lower bound, `column > value`.
    Gt { column: String, value: Scalar },
    /// Inclusive upper bound, `column <= value`.
    Lte { column: String, value: Scalar },
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Matches(doc) => write!(f, "{}", Value::Object(doc.clone())),
            Predicate::Gt { column, value } => write!(f, "{} > {}", column, value),
            Predicate::Lte { column, value } => write!(f, "{} <= {}", column, value),
        }
    }
}

/// Conjunction of predicates. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.predicates.is_empty() {
            return write!(f, "<all>");
        }
        let parts: Vec<String> = self.predicates.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", parts.join(" and "))
    }
}

/// A bounded slice of a query source.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryWindow {
    pub filter: Filter,
    /// Column that gives the window a stable order, if any.
    pub order_by: Option<String>,
    pub skip: u64,
    pub limit: u64,
}

/// The concrete sub-range a partition covers.
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionRange {
    Items(Vec<Item>),
    Window(QueryWindow),
}

impl fmt::Display for PartitionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionRange::Items(items) => match (items.first(), items.last()) {
                (Some(first), Some(last)) => {
                    write!(f, "{} items [{} .. {}]", items.len(), first.name, last.name)
                }
                _ => write!(f, "0 items"),
            },
            PartitionRange::Window(w) => write!(
                f,
                "skip={} limit={} where {}",
                w.skip, w.limit, w.filter
            ),
        }
    }
}

/// A source plus the sub-range one worker is responsible for.
///
/// Built once by a planner and consumed once by a worker.
#[derive(Debug, Clone)]
pub struct PartitionDescriptor {
    pub id: usize,
    pub source: Arc<SourceDescriptor>,
    pub range: PartitionRange,
}

impl fmt::Display for PartitionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} of {} ({})", self.id, self.source.object, self.range)
    }
}

/// The result of planning: partitions in order, plus the watermark to publish.
#[derive(Debug, Clone)]
pub struct Plan {
    pub partitions: Vec<PartitionDescriptor>,
    /// Upper bound frozen for this run, in textual form.
    pub next_watermark: Option<String>,
}

/// An ordered, fixed-arity tuple of column values in projection order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    values: Vec<String>,
}

impl Record {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn arity(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }
}

/// Identity of one writer instance, passed with every sink call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteContext {
    pub job_id: String,
    pub task_id: String,
    pub partition_id: usize,
}

/// Outcome of a single remote write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    Ok,
    Rejected(String),
}

/// Per-partition outcome collected by the job runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionResult {
    pub partition_id: usize,
    pub range: String,
    pub records_read: u64,
    pub records_written: u64,
    pub write_failures: u64,
    /// True for the one writer that issued the job-level finalize call.
    pub finalized: bool,
    /// Either "SUCCESS" or "FAILED".
    pub status: String,
    pub error: Option<String>,
}

/// Summary of a whole job run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    pub task_id: String,
    pub requested_parallelism: usize,
    pub partitions: usize,
    pub records_read: u64,
    pub records_written: u64,
    pub write_failures: u64,
    pub watermark: Option<String>,
    pub duration_seconds: f64,
    pub status: String,
    pub details: Vec<PartitionResult>,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.status == "SUCCESS"
    }
}
