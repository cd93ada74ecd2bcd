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

//! # Extraction Worker
//!
//! A worker reads exactly one partition. `run` opens a cursor scoped to the
//! partition and hands back a `RecordStream`: a lazy iterator that projects
//! and converts each document as it is pulled. The stream owns the cursor, so
//! the cursor is released as soon as the stream is exhausted, fails, is
//! cancelled or is simply dropped.

use crate::domain::conversion::{canonical_text, ValueConverter};
use crate::domain::entities::{Document, PartitionDescriptor, PartitionRange, Record};
use crate::domain::errors::{ConnectorError, Result};
use crate::ports::source_port::{Cursor, EnumerableSource, QuerySource};
use crossbeam_channel::Sender;
use log::{debug, warn};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The source a worker opens cursors on.
#[derive(Clone)]
pub enum SourceHandle {
    Enumerable(Arc<dyn EnumerableSource>),
    Query(Arc<dyn QuerySource>),
}

impl SourceHandle {
    /// Opens a cursor over exactly the partition's range.
    pub fn open(&self, partition: &PartitionDescriptor) -> Result<Cursor> {
        match (self, &partition.range) {
            (SourceHandle::Enumerable(source), PartitionRange::Items(items)) => {
                source.open_items(items)
            }
            (SourceHandle::Query(source), PartitionRange::Window(window)) => source.query(window),
            _ => Err(ConnectorError::Extraction {
                partition: partition.to_string(),
                reason: "partition range does not match the source kind".to_string(),
            }),
        }
    }
}

/// Cooperative cancellation flag shared between a caller and its workers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Downstream receiver of extracted records.
///
/// `send` may block; that is how a slow sink throttles the worker.
pub trait RecordCollector {
    fn send(&mut self, record: Record) -> Result<()>;
}

impl RecordCollector for Vec<Record> {
    fn send(&mut self, record: Record) -> Result<()> {
        self.push(record);
        Ok(())
    }
}

/// Collector backed by a bounded channel to a writer thread.
pub struct ChannelCollector {
    partition_id: usize,
    tx: Sender<Record>,
}

impl ChannelCollector {
    pub fn new(partition_id: usize, tx: Sender<Record>) -> Self {
        Self { partition_id, tx }
    }
}

impl RecordCollector for ChannelCollector {
    fn send(&mut self, record: Record) -> Result<()> {
        self.tx.send(record).map_err(|_| ConnectorError::Extraction {
            partition: self.partition_id.to_string(),
            reason: "writer hung up".to_string(),
        })
    }
}

pub struct ExtractionWorker {
    source: SourceHandle,
    converter: Arc<dyn ValueConverter>,
    cancel: CancelToken,
}

impl ExtractionWorker {
    pub fn new(source: SourceHandle, converter: Arc<dyn ValueConverter>, cancel: CancelToken) -> Self {
        Self {
            source,
            converter,
            cancel,
        }
    }

    /// Opens the partition and returns its records as a single-pass stream.
    pub fn run(&self, partition: &PartitionDescriptor, projection: &[String]) -> Result<RecordStream> {
        let cursor = self.source.open(partition).map_err(|e| ConnectorError::Extraction {
            partition: partition.to_string(),
            reason: e.to_string(),
        })?;
        debug!("Opened cursor for partition {}", partition);
        Ok(RecordStream {
            partition: partition.to_string(),
            partition_id: partition.id,
            cursor: Some(cursor),
            projection: projection.to_vec(),
            converter: Arc::clone(&self.converter),
            cancel: self.cancel.clone(),
            emitted: 0,
            substituted: 0,
        })
    }
}

/// Records of one partition in source order.
///
/// Yields `Err` at most once, after which the stream is finished.
pub struct RecordStream {
    partition: String,
    partition_id: usize,
    cursor: Option<Cursor>,
    projection: Vec<String>,
    converter: Arc<dyn ValueConverter>,
    cancel: CancelToken,
    emitted: u64,
    substituted: u64,
}

impl RecordStream {
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Values that failed conversion and were replaced by their canonical text.
    pub fn substituted(&self) -> u64 {
        self.substituted
    }

    /// Pushes every remaining record into `collector`, returning how many the
    /// stream has produced. On failure `emitted` still reports progress.
    pub fn drain_into(&mut self, collector: &mut dyn RecordCollector) -> Result<u64> {
        while let Some(record) = self.next() {
            collector.send(record?)?;
        }
        Ok(self.emitted)
    }

    fn project(&mut self, doc: &Document) -> Record {
        let mut values = Vec::with_capacity(self.projection.len());
        for column in &self.projection {
            let raw = doc.get(column).unwrap_or(&Value::Null);
            let text = match self.converter.convert(column, raw) {
                Ok(text) => text,
                Err(e) => {
                    self.substituted += 1;
                    warn!("Partition {}: {}; keeping raw value", self.partition, e);
                    canonical_text(raw)
                }
            };
            values.push(text);
        }
        Record::new(values)
    }
}

impl Iterator for RecordStream {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.as_ref()?;
        if self.cancel.is_cancelled() {
            self.cursor = None;
            warn!("Partition {} cancelled after {} records", self.partition, self.emitted);
            return Some(Err(ConnectorError::Cancelled(self.partition_id)));
        }
        match self.cursor.as_mut()?.next() {
            None => {
                self.cursor = None;
                debug!("Partition {} exhausted after {} records", self.partition, self.emitted);
                None
            }
            Some(Err(e)) => {
                self.cursor = None;
                Some(Err(ConnectorError::Extraction {
                    partition: self.partition.clone(),
                    reason: e.to_string(),
                }))
            }
            Some(Ok(doc)) => {
                let record = self.project(&doc);
                self.emitted += 1;
                Some(Ok(record))
            }
        }
    }
}
