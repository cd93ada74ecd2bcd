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

//! # Runtime Context
//!
//! Sizing decisions made once per process: how many partitions a job asks
//! for, and how many records may queue between a reader and its writer.

use crate::config::AppConfig;
use log::info;

/// Records buffered per reader/writer pair when the config does not say.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeContext {
    /// Requested parallelism; the planner may return fewer partitions.
    pub parallelism: usize,
    pub channel_capacity: usize,
}

impl RuntimeContext {
    /// Derives the runtime sizing from the config and the local core count.
    ///
    /// An explicit `parallelism` wins. Otherwise `cpu_percent` (default 50) of
    /// the available cores is used, rounded up and never below one.
    pub fn init(config: &AppConfig) -> Self {
        let cpu_percent = config.job.cpu_percent.unwrap_or(50);
        let parallelism = resolve_parallelism(config.job.parallelism, cpu_percent, num_cpus::get());
        let channel_capacity = config
            .job
            .channel_capacity
            .unwrap_or(DEFAULT_CHANNEL_CAPACITY)
            .max(1);

        info!(
            "Runtime: parallelism {} (target CPU {}%), {} records buffered per partition",
            parallelism, cpu_percent, channel_capacity
        );

        Self {
            parallelism,
            channel_capacity,
        }
    }
}

fn resolve_parallelism(explicit: Option<usize>, cpu_percent: u8, total_cpus: usize) -> usize {
    let n = explicit
        .unwrap_or_else(|| (total_cpus as f64 * (cpu_percent as f64 / 100.0)).ceil() as usize);
    std::cmp::max(1, n)
}
