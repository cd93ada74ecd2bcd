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

//! Core error definitions for the batch connector.
//!
//! Every layer returns the crate-wide `Result`. The variants follow the failure
//! classes of a job: setup and planning errors are fatal for the whole job,
//! conversion and write errors are handled locally by the worker or writer that
//! hit them and only surface here when a caller asks for them explicitly.

use thiserror::Error;

/// Error types encountered while planning, extracting or writing a job.
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A source or sink connection could not be established.
    #[error("Setup failed: {0}")]
    Setup(String),

    /// Items could not be enumerated or counted. No partition list is produced.
    #[error("Planning failed for job {job}: {reason}")]
    Planning { job: String, reason: String },

    #[error("Watermark error: {0}")]
    Watermark(String),

    #[error("Conversion failed for column {column}: {reason}")]
    Conversion { column: String, reason: String },

    #[error("Extraction failed for partition {partition}: {reason}")]
    Extraction { partition: String, reason: String },

    #[error("Write failed for job {job} partition {partition}: {reason}")]
    Write {
        job: String,
        partition: usize,
        reason: String,
    },

    #[error("Completion error for job {job}: {reason}")]
    Completion { job: String, reason: String },

    #[error("Partition {0} was cancelled")]
    Cancelled(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Source error: {0}")]
    Source(String),
}

impl ConnectorError {
    /// Wraps a source failure raised while planning so it carries the job id.
    pub fn planning(job: &str, err: impl std::fmt::Display) -> Self {
        ConnectorError::Planning {
            job: job.to_string(),
            reason: err.to_string(),
        }
    }
}

/// A specialized Result type for the batch connector.
pub type Result<T> = std::result::Result<T, ConnectorError>;
