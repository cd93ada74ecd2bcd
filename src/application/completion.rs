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

//! # Write Completion
//!
//! One `WriteCompletionCoordinator` exists per job and is shared by every
//! writer instance of that job. Each writer reports once, after flushing its
//! partition. The report that brings the count up to the known number of
//! writers is the only one told to finalize.

use crate::domain::errors::{ConnectorError, Result};
use log::{debug, info};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Lifecycle of a job's completion state. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPhase {
    Open,
    PartiallyComplete { finished: usize },
    Finalized,
}

/// What a writer must do after reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Other writers are still running; clean up locally and return.
    Pending { finished: usize, expected: usize },
    /// This writer was the last one and must issue the finalize call.
    Finalize { total_records: u64 },
}

#[derive(Debug)]
struct CompletionState {
    reported: HashSet<usize>,
    total_records: u64,
    phase: CompletionPhase,
}

#[derive(Debug)]
pub struct WriteCompletionCoordinator {
    job_id: String,
    expected: usize,
    state: Mutex<CompletionState>,
}

impl WriteCompletionCoordinator {
    /// `expected` is the number of writer instances actually started, i.e. the
    /// number of planned partitions.
    pub fn new(job_id: impl Into<String>, expected: usize) -> Self {
        Self {
            job_id: job_id.into(),
            expected,
            state: Mutex::new(CompletionState {
                reported: HashSet::new(),
                total_records: 0,
                phase: CompletionPhase::Open,
            }),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn phase(&self) -> CompletionPhase {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .phase
    }

    /// Records that `instance_id` finished after writing `records_written`.
    ///
    /// Each instance may report once. Exactly one call per job returns
    /// `CompletionOutcome::Finalize`, whatever the arrival order.
    pub fn complete(&self, instance_id: usize, records_written: u64) -> Result<CompletionOutcome> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.phase == CompletionPhase::Finalized {
            return Err(self.error(format!(
                "instance {} reported after the job was finalized",
                instance_id
            )));
        }
        if instance_id >= self.expected {
            return Err(self.error(format!(
                "instance {} is outside the {} planned writers",
                instance_id, self.expected
            )));
        }
        if !state.reported.insert(instance_id) {
            return Err(self.error(format!("instance {} reported twice", instance_id)));
        }

        state.total_records += records_written;
        let finished = state.reported.len();

        if finished >= self.expected {
            state.phase = CompletionPhase::Finalized;
            info!(
                "Job {}: all {} writers reported, {} records in total",
                self.job_id, self.expected, state.total_records
            );
            Ok(CompletionOutcome::Finalize {
                total_records: state.total_records,
            })
        } else {
            state.phase = CompletionPhase::PartiallyComplete { finished };
            debug!(
                "Job {}: writer {} done ({}/{})",
                self.job_id, instance_id, finished, self.expected
            );
            Ok(CompletionOutcome::Pending {
                finished,
                expected: self.expected,
            })
        }
    }

    fn error(&self, reason: String) -> ConnectorError {
        ConnectorError::Completion {
            job: self.job_id.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_last_report_finalizes_with_total() {
        let c = WriteCompletionCoordinator::new("job", 3);
        assert_eq!(c.phase(), CompletionPhase::Open);
        assert_eq!(
            c.complete(2, 10).unwrap(),
            CompletionOutcome::Pending {
                finished: 1,
                expected: 3
            }
        );
        assert_eq!(c.phase(), CompletionPhase::PartiallyComplete { finished: 1 });
        assert!(matches!(c.complete(0, 5).unwrap(), CompletionOutcome::Pending { .. }));
        assert_eq!(
            c.complete(1, 7).unwrap(),
            CompletionOutcome::Finalize { total_records: 22 }
        );
        assert_eq!(c.phase(), CompletionPhase::Finalized);
    }

    #[test]
    fn test_single_writer_finalizes_immediately() {
        let c = WriteCompletionCoordinator::new("job", 1);
        assert_eq!(
            c.complete(0, 0).unwrap(),
            CompletionOutcome::Finalize { total_records: 0 }
        );
    }

    #[test]
    fn test_duplicate_and_late_reports_are_rejected() {
        let c = WriteCompletionCoordinator::new("job", 2);
        c.complete(0, 1).unwrap();
        assert!(c.complete(0, 1).is_err());
        assert!(c.complete(9, 1).is_err());
        assert_eq!(c.phase(), CompletionPhase::PartiallyComplete { finished: 1 });
        c.complete(1, 1).unwrap();
        assert!(c.complete(2, 1).is_err());
        assert_eq!(c.phase(), CompletionPhase::Finalized);
    }

    #[test]
    fn test_concurrent_reports_finalize_exactly_once() {
        for _ in 0..20 {
            let n = 16;
            let c = Arc::new(WriteCompletionCoordinator::new("job", n));
            let barrier = Arc::new(Barrier::new(n));
            let handles: Vec<_> = (0..n)
                .map(|i| {
                    let c = Arc::clone(&c);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        c.complete(i, i as u64).unwrap()
                    })
                })
                .collect();
            let outcomes: Vec<CompletionOutcome> =
                handles.into_iter().map(|h| h.join().unwrap()).collect();

            let finals: Vec<_> = outcomes
                .iter()
                .filter(|o| matches!(o, CompletionOutcome::Finalize { .. }))
                .collect();
            assert_eq!(finals.len(), 1);
            assert_eq!(
                *finals[0],
                CompletionOutcome::Finalize {
                    total_records: (0..n as u64).sum()
                }
            );
            let mut pending: Vec<usize> = outcomes
                .iter()
                .filter_map(|o| match o {
                    CompletionOutcome::Pending { finished, .. } => Some(*finished),
                    _ => None,
                })
                .collect();
            pending.sort_unstable();
            assert_eq!(pending, (1..n).collect::<Vec<_>>());
        }
    }
}
