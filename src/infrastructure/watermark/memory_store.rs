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

//! In-memory watermark store for tests and one-shot runs.

use crate::domain::errors::Result;
use crate::ports::watermark_port::WatermarkStore;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    values: Mutex<HashMap<String, String>>,
}

impl WatermarkStore for MemoryWatermarkStore {
    fn load(&self, job_id: &str) -> Result<Option<String>> {
        Ok(self
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned())
    }

    fn publish(&self, job_id: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id.to_string(), value.to_string());
        Ok(())
    }
}
