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

//! # Watermark Port
//!
//! Where committed watermarks live between runs. Values are opaque text; the
//! cursor type tag decides how they are read back.

use crate::domain::errors::Result;

pub trait WatermarkStore: Send + Sync {
    /// The watermark published by the last run of `job_id`.
    fn load(&self, job_id: &str) -> Result<Option<String>>;

    /// Records `value` as the lower bound for the next run of `job_id`.
    fn publish(&self, job_id: &str, value: &str) -> Result<()>;
}
