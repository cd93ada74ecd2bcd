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

//! # Job Runner
//!
//! Drives one job end to end:
//! 1. Restores the prior watermark from the store unless one was supplied.
//! 2. Plans the partitions and publishes the next watermark.
//! 3. Runs a reader thread and a writer thread per partition, joined by a
//!    bounded channel so a slow sink throttles its reader.
//! 4. Aggregates per-partition results into a `JobReport`.
//!
//! Partitions are independent. A failed reader does not stop its siblings,
//! and its writer still closes and reports to the completion coordinator, so
//! the job is finalized with whatever was written.

use crate::application::completion::WriteCompletionCoordinator;
use crate::application::planner::PartitionPlanner;
use crate::application::watermark_resolver::WatermarkResolver;
use crate::application::worker::{CancelToken, ChannelCollector, ExtractionWorker, SourceHandle};
use crate::application::writer::{SinkWriter, WriterSummary};
use crate::domain::conversion::ValueConverter;
use crate::domain::entities::{
    JobReport, PartitionDescriptor, PartitionResult, Record, SourceDescriptor,
};
use crate::domain::errors::{ConnectorError, Result};
use crate::ports::sink_port::SinkPort;
use crate::ports::watermark_port::WatermarkStore;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Per-run settings, resolved from config and CLI.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub job_id: String,
    pub task_id: String,
    pub parallelism: usize,
    pub columns: Vec<String>,
    pub channel_capacity: usize,
    /// Directory for `report_<timestamp>.json`; no report file when `None`.
    pub report_dir: Option<PathBuf>,
}

pub struct JobRunner {
    planner: Box<dyn PartitionPlanner>,
    source: SourceHandle,
    converter: Arc<dyn ValueConverter>,
    sink: Arc<dyn SinkPort>,
    watermarks: Arc<dyn WatermarkStore>,
    settings: JobSettings,
    cancel: CancelToken,
}

/// What one reader thread accomplished.
struct ReadOutcome {
    read: u64,
    error: Option<ConnectorError>,
}

impl JobRunner {
    pub fn new(
        planner: Box<dyn PartitionPlanner>,
        source: SourceHandle,
        converter: Arc<dyn ValueConverter>,
        sink: Arc<dyn SinkPort>,
        watermarks: Arc<dyn WatermarkStore>,
        settings: JobSettings,
    ) -> Self {
        Self {
            planner,
            source,
            converter,
            sink,
            watermarks,
            settings,
            cancel: CancelToken::new(),
        }
    }

    /// Token that stops every reader of this runner between records.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs the job. Setup and planning failures are returned as `Err`;
    /// partition failures are reported in the returned `JobReport`.
    pub fn run(&self, mut descriptor: SourceDescriptor) -> Result<JobReport> {
        let start = Instant::now();
        let job_id = self.settings.job_id.as_str();

        if let Some(cursor) = descriptor.cursor.as_mut() {
            if cursor.prior.is_none() {
                cursor.prior = self.watermarks.load(job_id)?;
                if let Some(prior) = &cursor.prior {
                    info!("Job {}: resuming {} after {}", job_id, cursor.column, prior);
                }
            }
        }
        if descriptor.secure {
            warn!(
                "Job {}: secure transport requested for {}; local sources ignore it",
                job_id, descriptor.address
            );
        }

        let descriptor = Arc::new(descriptor);
        let plan = self.planner.plan(job_id, &descriptor, self.settings.parallelism)?;
        WatermarkResolver::publish(self.watermarks.as_ref(), job_id, plan.next_watermark.as_deref())?;

        info!(
            "Job {}: {} partitions planned for parallelism {}",
            job_id,
            plan.partitions.len(),
            self.settings.parallelism
        );
        let completion = Arc::new(WriteCompletionCoordinator::new(job_id, plan.partitions.len()));

        let details: Vec<PartitionResult> = thread::scope(|scope| {
            let handles: Vec<_> = plan
                .partitions
                .iter()
                .map(|partition| {
                    let (tx, rx) = bounded(self.settings.channel_capacity);
                    let reader = scope.spawn(move || self.read_partition(partition, tx));
                    let completion = Arc::clone(&completion);
                    let writer = scope.spawn(move || self.write_partition(partition.id, completion, rx));
                    (partition, reader, writer)
                })
                .collect();

            handles
                .into_iter()
                .map(|(partition, reader, writer)| {
                    let read = reader.join().unwrap_or_else(|_| ReadOutcome {
                        read: 0,
                        error: Some(ConnectorError::Extraction {
                            partition: partition.to_string(),
                            reason: "reader thread panicked".to_string(),
                        }),
                    });
                    let written = writer.join().unwrap_or_else(|_| {
                        Err(ConnectorError::Write {
                            job: job_id.to_string(),
                            partition: partition.id,
                            reason: "writer thread panicked".to_string(),
                        })
                    });
                    partition_result(partition, read, written)
                })
                .collect()
        });

        let report = self.build_report(
            plan.next_watermark,
            details,
            start.elapsed().as_secs_f64(),
        );
        info!(
            "Job {} {}: {} partitions, {} read, {} written, {} failed writes in {:.2}s",
            report.job_id,
            report.status,
            report.partitions,
            report.records_read,
            report.records_written,
            report.write_failures,
            report.duration_seconds
        );
        if let Some(dir) = &self.settings.report_dir {
            write_report(dir, &report)?;
        }
        Ok(report)
    }

    fn read_partition(&self, partition: &PartitionDescriptor, tx: Sender<Record>) -> ReadOutcome {
        let worker = ExtractionWorker::new(
            self.source.clone(),
            Arc::clone(&self.converter),
            self.cancel.clone(),
        );
        let mut stream = match worker.run(partition, &self.settings.columns) {
            Ok(stream) => stream,
            Err(e) => {
                error!("Job {}: {}", self.settings.job_id, e);
                return ReadOutcome {
                    read: 0,
                    error: Some(e),
                };
            }
        };
        let mut collector = ChannelCollector::new(partition.id, tx);
        let result = stream.drain_into(&mut collector);
        if stream.substituted() > 0 {
            warn!(
                "Job {}: partition {} kept {} unconverted values",
                self.settings.job_id,
                partition.id,
                stream.substituted()
            );
        }
        let error = result.err();
        if let Some(e) = &error {
            error!("Job {}: partition {} stopped: {}", self.settings.job_id, partition.id, e);
        }
        ReadOutcome {
            read: stream.emitted(),
            error,
        }
    }

    fn write_partition(
        &self,
        partition_id: usize,
        completion: Arc<WriteCompletionCoordinator>,
        rx: Receiver<Record>,
    ) -> Result<WriterSummary> {
        let mut writer = SinkWriter::new(
            Arc::clone(&self.sink),
            completion,
            &self.settings.task_id,
            partition_id,
        );
        for record in rx {
            writer.write(&record);
        }
        writer.close()
    }

    fn build_report(
        &self,
        watermark: Option<String>,
        details: Vec<PartitionResult>,
        duration_seconds: f64,
    ) -> JobReport {
        let failed = details.iter().filter(|d| d.status != "SUCCESS").count();
        JobReport {
            job_id: self.settings.job_id.clone(),
            task_id: self.settings.task_id.clone(),
            requested_parallelism: self.settings.parallelism,
            partitions: details.len(),
            records_read: details.iter().map(|d| d.records_read).sum(),
            records_written: details.iter().map(|d| d.records_written).sum(),
            write_failures: details.iter().map(|d| d.write_failures).sum(),
            watermark,
            duration_seconds,
            status: if failed == 0 { "SUCCESS" } else { "FAILED" }.to_string(),
            details,
        }
    }
}

fn partition_result(
    partition: &PartitionDescriptor,
    read: ReadOutcome,
    written: Result<WriterSummary>,
) -> PartitionResult {
    let mut errors = Vec::new();
    if let Some(e) = read.error {
        errors.push(e.to_string());
    }
    let summary = match written {
        Ok(summary) => summary,
        Err(e) => {
            errors.push(e.to_string());
            WriterSummary {
                written: 0,
                failed: 0,
                finalized: false,
            }
        }
    };
    PartitionResult {
        partition_id: partition.id,
        range: partition.range.to_string(),
        records_read: read.read,
        records_written: summary.written,
        write_failures: summary.failed,
        finalized: summary.finalized,
        status: if errors.is_empty() { "SUCCESS" } else { "FAILED" }.to_string(),
        error: if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        },
    }
}

fn write_report(dir: &Path, report: &JobReport) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("report_{}.json", timestamp));
    let file = std::fs::File::create(&path)?;
    serde_json::to_writer_pretty(file, report)?;
    info!("Report written to {}", path.display());
    Ok(path)
}
