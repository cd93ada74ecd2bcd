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

//! # Configuration
//!
//! A job is described by a YAML or JSON file; a handful of settings can be
//! overridden from the command line for ad-hoc runs.

use crate::application::planner::compile_filename_pattern;
use crate::domain::entities::{CursorSpec, Document, SourceDescriptor};
use crate::domain::errors::{ConnectorError, Result};
use crate::domain::partitioning::MIN_BATCH_SIZE;
use crate::domain::watermark::WatermarkType;
use crate::ports::endpoint_port::EndpointIdentity;
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub job: JobConfig,
    pub source: SourceConfig,
    /// Projected columns, in output order.
    pub columns: Vec<String>,
    pub sink: SinkConfig,
    /// JSON file holding committed watermarks, keyed by job id.
    #[serde(default)]
    pub watermark_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JobConfig {
    pub id: String,
    #[serde(default = "default_task_id")]
    pub task_id: String,
    pub parallelism: Option<usize>,
    /// Share of local cores used when `parallelism` is not set.
    pub cpu_percent: Option<u8>,
    pub min_batch_size: Option<u64>,
    /// Records buffered between a reader and its writer.
    pub channel_capacity: Option<usize>,
}

fn default_task_id() -> String {
    "0".to_string()
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A directory tree; each matching file is one item.
    FileTree,
    /// A JSON-lines collection file, `<address>/<object>.jsonl`.
    Documents,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub address: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Collection name, or base directory under `address` for file trees.
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub filter: Option<Document>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub cursor: Option<CursorSpec>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub secure: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SinkConfig {
    #[serde(default = "default_sink_protocol")]
    pub protocol: String,
    /// Output directory for the local sink.
    pub address: String,
    #[serde(default)]
    pub username: Option<String>,
    /// Where job reports go; defaults to `address`.
    #[serde(default)]
    pub report_dir: Option<PathBuf>,
}

fn default_sink_protocol() -> String {
    "file".to_string()
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: String,

    #[arg(long)]
    pub job_id: Option<String>,
    #[arg(short, long)]
    pub parallel: Option<usize>,
    /// Sink output directory
    #[arg(short, long)]
    pub output: Option<String>,
    /// Prior watermark; takes precedence over the watermark file
    #[arg(long)]
    pub watermark: Option<String>,
    #[arg(long)]
    pub min_batch_size: Option<u64>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConnectorError::Config(format!("cannot read {}: {}", path, e)))?;
        let config: AppConfig = if path.ends_with(".json") {
            serde_json::from_str(&contents)
                .map_err(|e| ConnectorError::Config(format!("{}: {}", path, e)))?
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|e| ConnectorError::Config(format!("{}: {}", path, e)))?
        };
        Ok(config)
    }

    pub fn merge_cli(&mut self, args: &CliArgs) {
        if let Some(j) = &args.job_id {
            self.job.id = j.clone();
        }
        if let Some(p) = args.parallel {
            self.job.parallelism = Some(p);
        }
        if let Some(o) = &args.output {
            self.sink.address = o.clone();
        }
        if let Some(m) = args.min_batch_size {
            self.job.min_batch_size = Some(m);
        }
        if let (Some(w), Some(cursor)) = (&args.watermark, self.source.cursor.as_mut()) {
            cursor.prior = Some(w.clone());
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.job.id.trim().is_empty() {
            return Err(ConnectorError::Config("job.id must not be empty".into()));
        }
        if self.job.parallelism == Some(0) {
            return Err(ConnectorError::Config("job.parallelism must be at least 1".into()));
        }
        if self.job.min_batch_size == Some(0) {
            return Err(ConnectorError::Config("job.min_batch_size must be at least 1".into()));
        }
        if self.job.channel_capacity == Some(0) {
            return Err(ConnectorError::Config("job.channel_capacity must be at least 1".into()));
        }
        if self.columns.is_empty() {
            return Err(ConnectorError::Config("columns must list at least one column".into()));
        }
        if self.source.address.trim().is_empty() {
            return Err(ConnectorError::Config("source.address must not be empty".into()));
        }
        match self.source.kind {
            SourceKind::FileTree => {
                compile_filename_pattern(self.source.filename.as_deref())?;
                if self.source.cursor.is_some() {
                    return Err(ConnectorError::Config(
                        "file_tree sources do not support an incremental cursor".into(),
                    ));
                }
            }
            SourceKind::Documents => {
                if self.source.object.trim().is_empty() {
                    return Err(ConnectorError::Config("source.object names the collection".into()));
                }
            }
        }
        if let Some(cursor) = &self.source.cursor {
            if cursor.column.trim().is_empty() {
                return Err(ConnectorError::Config("source.cursor.column must not be empty".into()));
            }
            if let Some(prior) = &cursor.prior {
                WatermarkType::from_tag(cursor.type_tag.as_deref()).parse(prior)?;
            }
        }
        Ok(())
    }

    pub fn min_batch_size(&self) -> u64 {
        self.job.min_batch_size.unwrap_or(MIN_BATCH_SIZE)
    }

    pub fn source_descriptor(&self) -> SourceDescriptor {
        SourceDescriptor {
            address: self.source.address.clone(),
            username: self.source.username.clone(),
            password: self.source.password.clone(),
            object: self.source.object.clone(),
            filter: self.source.filter.clone(),
            filename_pattern: self.source.filename.clone(),
            cursor: self.source.cursor.clone(),
            recursive: self.source.recursive,
            secure: self.source.secure,
        }
    }

    pub fn sink_endpoint(&self) -> EndpointIdentity {
        EndpointIdentity {
            protocol: self.sink.protocol.clone(),
            address: self.sink.address.clone(),
            username: self.sink.username.clone(),
        }
    }

    pub fn report_dir(&self) -> PathBuf {
        self.sink
            .report_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.sink.address))
    }
}
