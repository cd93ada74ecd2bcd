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

//! # Sink Port
//!
//! Contract for the remote write service behind the parallel writers.

use crate::domain::entities::{Record, WriteContext, WriteStatus};
use crate::domain::errors::Result;

/// `SinkPort` receives records from every writer instance of a job.
///
/// Implementations are shared across threads, one handle per remote endpoint.
pub trait SinkPort: Send + Sync {
    /// Writes one record. A rejected record is reported through
    /// `WriteStatus::Rejected`; `Err` is reserved for transport failures.
    fn write(&self, ctx: &WriteContext, record: &Record) -> Result<WriteStatus>;

    /// Flushes whatever the sink buffers for this writer instance.
    fn flush(&self, _ctx: &WriteContext) -> Result<()> {
        Ok(())
    }

    /// Job-level completion call. Invoked by exactly one writer per job.
    fn finalize(&self, ctx: &WriteContext, total_records: u64, is_final: bool) -> Result<()>;
}
