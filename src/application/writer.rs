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

//! # Sink Writer
//!
//! One writer instance per partition. It forwards records to the shared sink
//! handle, keeps per-instance counters, and on `close` reports to the job's
//! completion coordinator, issuing the finalize call if it turns out to be
//! the last writer.

use crate::application::completion::{CompletionOutcome, WriteCompletionCoordinator};
use crate::domain::entities::{Record, WriteContext, WriteStatus};
use crate::domain::errors::Result;
use crate::ports::sink_port::SinkPort;
use log::{debug, error, info, warn};
use std::sync::Arc;

/// Counters of a closed writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterSummary {
    pub written: u64,
    pub failed: u64,
    /// True if this writer issued the job-level finalize call.
    pub finalized: bool,
}

pub struct SinkWriter {
    sink: Arc<dyn SinkPort>,
    completion: Arc<WriteCompletionCoordinator>,
    ctx: WriteContext,
    written: u64,
    failed: u64,
}

impl SinkWriter {
    pub fn new(
        sink: Arc<dyn SinkPort>,
        completion: Arc<WriteCompletionCoordinator>,
        task_id: &str,
        partition_id: usize,
    ) -> Self {
        let ctx = WriteContext {
            job_id: completion.job_id().to_string(),
            task_id: task_id.to_string(),
            partition_id,
        };
        Self {
            sink,
            completion,
            ctx,
            written: 0,
            failed: 0,
        }
    }

    /// Writes one record. Failures are logged and counted, never raised, so
    /// the rest of the partition still gets written.
    pub fn write(&mut self, record: &Record) {
        match self.sink.write(&self.ctx, record) {
            Ok(WriteStatus::Ok) => self.written += 1,
            Ok(WriteStatus::Rejected(reason)) => {
                self.failed += 1;
                warn!(
                    "Job {} task {} partition {}: record rejected: {}",
                    self.ctx.job_id, self.ctx.task_id, self.ctx.partition_id, reason
                );
            }
            Err(e) => {
                self.failed += 1;
                warn!(
                    "Job {} task {} partition {}: write failed, the sink may be unreachable: {}",
                    self.ctx.job_id, self.ctx.task_id, self.ctx.partition_id, e
                );
            }
        }
    }

    /// Flushes the partition and reports completion.
    ///
    /// Completion is reported even when the flush fails, with nothing counted
    /// as delivered. The flush error is returned afterwards.
    pub fn close(self) -> Result<WriterSummary> {
        let flushed = self.sink.flush(&self.ctx);
        let delivered = match &flushed {
            Ok(()) => self.written,
            Err(e) => {
                error!(
                    "Job {} task {} partition {}: flush failed, {} records not delivered: {}",
                    self.ctx.job_id, self.ctx.task_id, self.ctx.partition_id, self.written, e
                );
                0
            }
        };
        let finalized = match self.completion.complete(self.ctx.partition_id, delivered)? {
            CompletionOutcome::Finalize { total_records } => {
                info!(
                    "Job {}: partition {} finalizes with {} records",
                    self.ctx.job_id, self.ctx.partition_id, total_records
                );
                self.sink.finalize(&self.ctx, total_records, true)?;
                true
            }
            CompletionOutcome::Pending { finished, expected } => {
                debug!(
                    "Job {}: partition {} closed ({}/{})",
                    self.ctx.job_id, self.ctx.partition_id, finished, expected
                );
                false
            }
        };
        flushed?;
        Ok(WriterSummary {
            written: delivered,
            failed: self.failed,
            finalized,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ConnectorError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        fail_flush_for: Option<usize>,
        writes: Mutex<Vec<(usize, Record)>>,
        flushed: Mutex<Vec<usize>>,
        finalized: Mutex<Vec<(usize, u64, bool)>>,
    }

    impl SinkPort for RecordingSink {
        fn write(&self, ctx: &WriteContext, record: &Record) -> Result<WriteStatus> {
            match record.get(0) {
                Some("bad") => Ok(WriteStatus::Rejected("schema mismatch".into())),
                Some("down") => Err(ConnectorError::Source("connection reset".into())),
                _ => {
                    self.writes.lock().unwrap().push((ctx.partition_id, record.clone()));
                    Ok(WriteStatus::Ok)
                }
            }
        }
        fn flush(&self, ctx: &WriteContext) -> Result<()> {
            if self.fail_flush_for == Some(ctx.partition_id) {
                return Err(ConnectorError::Source("disk full".into()));
            }
            self.flushed.lock().unwrap().push(ctx.partition_id);
            Ok(())
        }
        fn finalize(&self, ctx: &WriteContext, total: u64, is_final: bool) -> Result<()> {
            self.finalized.lock().unwrap().push((ctx.partition_id, total, is_final));
            Ok(())
        }
    }

    fn rec(v: &str) -> Record {
        Record::new(vec![v.to_string()])
    }

    #[test]
    fn test_failed_writes_do_not_stop_the_partition() {
        let sink = Arc::new(RecordingSink::default());
        let completion = Arc::new(WriteCompletionCoordinator::new("job", 1));
        let mut writer = SinkWriter::new(sink.clone(), completion, "task", 0);
        for v in ["a", "bad", "down", "b"] {
            writer.write(&rec(v));
        }
        let summary = writer.close().unwrap();
        assert_eq!(summary.written, 2);
        assert_eq!(summary.failed, 2);
        assert!(summary.finalized);
        assert_eq!(sink.writes.lock().unwrap().len(), 2);
        assert_eq!(*sink.finalized.lock().unwrap(), vec![(0, 2, true)]);
    }

    #[test]
    fn test_only_last_writer_finalizes() {
        let sink = Arc::new(RecordingSink::default());
        let completion = Arc::new(WriteCompletionCoordinator::new("job", 3));
        let mut writers: Vec<SinkWriter> = (0..3)
            .map(|p| SinkWriter::new(sink.clone(), completion.clone(), "task", p))
            .collect();
        for (p, w) in writers.iter_mut().enumerate() {
            for _ in 0..=p {
                w.write(&rec("x"));
            }
        }
        let mut summaries = Vec::new();
        for w in writers.into_iter().rev() {
            summaries.push(w.close().unwrap());
        }
        assert_eq!(
            summaries.iter().map(|s| s.finalized).collect::<Vec<_>>(),
            vec![false, false, true]
        );
        assert_eq!(*sink.flushed.lock().unwrap(), vec![2, 1, 0]);
        assert_eq!(*sink.finalized.lock().unwrap(), vec![(0, 6, true)]);
    }

    #[test]
    fn test_failed_flush_still_reports_completion() {
        let sink = Arc::new(RecordingSink {
            fail_flush_for: Some(1),
            ..Default::default()
        });
        let completion = Arc::new(WriteCompletionCoordinator::new("job", 2));
        let mut first = SinkWriter::new(sink.clone(), completion.clone(), "task", 0);
        let mut second = SinkWriter::new(sink.clone(), completion, "task", 1);
        for _ in 0..3 {
            first.write(&rec("x"));
            second.write(&rec("y"));
        }

        let summary = first.close().unwrap();
        assert!(!summary.finalized);
        assert!(second.close().is_err());
        assert_eq!(*sink.finalized.lock().unwrap(), vec![(1, 3, true)]);
    }
}
