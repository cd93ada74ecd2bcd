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

//! # Split Arithmetic
//!
//! Pure functions that decide partition boundaries. They know nothing about
//! sources.

use std::ops::Range;

/// Default floor for the size of one query window.
pub const MIN_BATCH_SIZE: u64 = 5000;

/// Splits `n` items into `parallelism` contiguous index ranges.
///
/// Slice `i` covers `[ceil(n/p * i), ceil(n/p * (i+1)))`, so neighbouring
/// slices differ by at most one item and the ranges tile `0..n` exactly.
/// When `n < p` some ranges are empty; they are kept here and it is up to the
/// caller to drop them.
pub fn list_slices(n: usize, parallelism: usize) -> Vec<Range<usize>> {
    let p = parallelism.max(1);
    (0..p)
        .map(|i| ceil_div(n * i, p)..ceil_div(n * (i + 1), p))
        .collect()
}

/// `ceil(a / b)` without going through floats.
fn ceil_div(a: usize, b: usize) -> usize {
    a / b + usize::from(a % b != 0)
}

/// A `skip`/`limit` pair for one query window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub skip: u64,
    pub limit: u64,
}

/// Computes query windows for `count` matching items.
///
/// `batch = max(min_batch, count / parallelism)`. Windows start at
/// `i * batch` for `i < parallelism` and only while the start lies inside
/// `count`, so small sources yield fewer windows than requested. The last
/// window is widened to absorb the floor-division remainder. A zero count
/// still yields one (empty) window so the job has a writer to finalize.
pub fn query_windows(count: u64, parallelism: usize, min_batch: u64) -> Vec<Window> {
    let p = parallelism.max(1) as u64;
    let batch = min_batch.max(count / p).max(1);

    let mut windows: Vec<Window> = (0..p)
        .map(|i| i * batch)
        .take_while(|&skip| skip < count || skip == 0)
        .map(|skip| Window { skip, limit: batch })
        .collect();

    if let Some(last) = windows.last_mut() {
        last.limit = last.limit.max(count.saturating_sub(last.skip));
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twenty_three_items_over_five() {
        let slices = list_slices(23, 5);
        assert_eq!(slices, vec![0..5, 5..10, 10..15, 15..19, 19..23]);
        let sizes: Vec<usize> = slices.iter().map(|r| r.len()).collect();
        assert_eq!(sizes, vec![5, 5, 5, 4, 4]);
    }

    #[test]
    fn test_list_slices_balance_and_cover() {
        for n in 0..60 {
            for p in 1..12 {
                let slices = list_slices(n, p);
                assert_eq!(slices.len(), p);
                assert_eq!(slices.first().unwrap().start, 0);
                assert_eq!(slices.last().unwrap().end, n);
                for pair in slices.windows(2) {
                    assert_eq!(pair[0].end, pair[1].start, "gap or overlap n={} p={}", n, p);
                }
                let max = slices.iter().map(|r| r.len()).max().unwrap();
                let min = slices.iter().map(|r| r.len()).min().unwrap();
                assert!(max - min <= 1, "unbalanced n={} p={}", n, p);
            }
        }
    }

    #[test]
    fn test_fewer_items_than_slices() {
        let slices = list_slices(2, 4);
        assert!(slices.iter().all(|r| r.end <= 2));
        assert_eq!(slices.iter().filter(|r| !r.is_empty()).count(), 2);
    }

    #[test]
    fn test_small_count_emits_fewer_windows() {
        let windows = query_windows(12_000, 4, MIN_BATCH_SIZE);
        let skips: Vec<u64> = windows.iter().map(|w| w.skip).collect();
        assert_eq!(skips, vec![0, 5000, 10_000]);
        assert!(windows.iter().all(|w| w.limit == 5000));
    }

    #[test]
    fn test_large_count_uses_count_over_parallelism() {
        let windows = query_windows(100_000, 4, MIN_BATCH_SIZE);
        assert_eq!(windows.len(), 4);
        assert!(windows.iter().all(|w| w.limit == 25_000));
    }

    #[test]
    fn test_remainder_is_absorbed_by_last_window() {
        let windows = query_windows(23_001, 4, MIN_BATCH_SIZE);
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[3].skip, 17_250);
        assert_eq!(windows[3].limit, 5751);
    }

    #[test]
    fn test_zero_count_yields_single_empty_window() {
        assert_eq!(query_windows(0, 8, MIN_BATCH_SIZE), vec![Window { skip: 0, limit: 5000 }]);
    }

    #[test]
    fn test_windows_cover_count_and_never_start_past_it() {
        for count in [1u64, 4999, 5000, 5001, 10_000, 12_000, 33_333, 250_000] {
            for p in 1..9 {
                let windows = query_windows(count, p, MIN_BATCH_SIZE);
                assert!(windows.len() <= p);
                assert!(windows.iter().all(|w| w.skip <= count));
                let covered: u64 = windows.iter().map(|w| w.limit).sum();
                assert!(covered >= count, "count={} p={}", count, p);
                for pair in windows.windows(2) {
                    assert_eq!(pair[0].skip + pair[0].limit, pair[1].skip);
                }
            }
        }
    }
}
