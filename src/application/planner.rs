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

//! # Partition Planning
//!
//! A planner turns one logical read into an ordered list of partitions. Each
//! source shape gets its own strategy behind the `PartitionPlanner` trait, so a
//! new kind of source adds an implementation instead of touching the runner.
//!
//! Planning never retries and never returns a partial list: any source error
//! fails the whole plan.

use crate::application::watermark_resolver::WatermarkResolver;
use crate::domain::entities::{
    PartitionDescriptor, PartitionRange, Plan, QueryWindow, SourceDescriptor,
};
use crate::domain::errors::{ConnectorError, Result};
use crate::domain::partitioning::{list_slices, query_windows};
use crate::ports::source_port::{EnumerableSource, QuerySource};
use log::{debug, info};
use regex::Regex;
use std::sync::Arc;

/// Strategy that splits a source into independently readable partitions.
pub trait PartitionPlanner: Send + Sync {
    /// Plans `descriptor` for up to `parallelism` workers.
    ///
    /// The returned list may be shorter than `parallelism`; its length is the
    /// writer fan-out the sink must expect.
    fn plan(
        &self,
        job_id: &str,
        descriptor: &Arc<SourceDescriptor>,
        parallelism: usize,
    ) -> Result<Plan>;
}

/// Compiles a filename pattern so that it has to match the whole name.
pub fn compile_filename_pattern(pattern: Option<&str>) -> Result<Regex> {
    let pattern = pattern.unwrap_or(".*");
    Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| ConnectorError::Config(format!("invalid filename pattern '{}': {}", pattern, e)))
}

/// Enumerable-list strategy for hierarchical sources.
pub struct ListPlanner {
    source: Arc<dyn EnumerableSource>,
}

impl ListPlanner {
    pub fn new(source: Arc<dyn EnumerableSource>) -> Self {
        Self { source }
    }
}

impl PartitionPlanner for ListPlanner {
    fn plan(
        &self,
        job_id: &str,
        descriptor: &Arc<SourceDescriptor>,
        parallelism: usize,
    ) -> Result<Plan> {
        let pattern = compile_filename_pattern(descriptor.filename_pattern.as_deref())?;
        let items = self
            .source
            .list(&pattern, descriptor.recursive)
            .map_err(|e| ConnectorError::planning(job_id, format!("listing {}: {}", descriptor.object, e)))?;
        info!(
            "Listed {} items under {} (recursive: {})",
            items.len(),
            descriptor.object,
            descriptor.recursive
        );

        let ranges = if parallelism <= 1 {
            vec![items]
        } else {
            let mut ranges: Vec<_> = list_slices(items.len(), parallelism)
                .into_iter()
                .filter(|r| !r.is_empty())
                .map(|r| items[r].to_vec())
                .collect();
            if ranges.is_empty() {
                ranges.push(Vec::new());
            }
            ranges
        };

        let partitions = ranges
            .into_iter()
            .enumerate()
            .map(|(id, slice)| PartitionDescriptor {
                id,
                source: Arc::clone(descriptor),
                range: PartitionRange::Items(slice),
            })
            .collect::<Vec<_>>();
        for p in &partitions {
            debug!("Planned partition {}", p);
        }

        Ok(Plan {
            partitions,
            next_watermark: None,
        })
    }
}

/// Bounded-query strategy for count/skip/limit sources.
pub struct QueryPlanner {
    source: Arc<dyn QuerySource>,
    resolver: WatermarkResolver,
    min_batch_size: u64,
}

impl QueryPlanner {
    pub fn new(
        source: Arc<dyn QuerySource>,
        resolver: WatermarkResolver,
        min_batch_size: u64,
    ) -> Self {
        Self {
            source,
            resolver,
            min_batch_size,
        }
    }
}

impl PartitionPlanner for QueryPlanner {
    fn plan(
        &self,
        job_id: &str,
        descriptor: &Arc<SourceDescriptor>,
        parallelism: usize,
    ) -> Result<Plan> {
        let resolution = self.resolver.resolve(descriptor).map_err(|e| match e {
            ConnectorError::Watermark(_) => e,
            other => ConnectorError::planning(job_id, format!("resolving bounds: {}", other)),
        })?;

        let count = self
            .source
            .count(&resolution.filter)
            .map_err(|e| ConnectorError::planning(job_id, format!("counting {}: {}", resolution.filter, e)))?;

        let order_by = descriptor.cursor.as_ref().map(|c| c.column.clone());
        let windows = query_windows(count, parallelism, self.min_batch_size);
        info!(
            "{} matches {} documents in {}; {} windows for parallelism {}",
            descriptor.object,
            count,
            resolution.filter,
            windows.len(),
            parallelism
        );

        let partitions = windows
            .into_iter()
            .enumerate()
            .map(|(id, w)| PartitionDescriptor {
                id,
                source: Arc::clone(descriptor),
                range: PartitionRange::Window(QueryWindow {
                    filter: resolution.filter.clone(),
                    order_by: order_by.clone(),
                    skip: w.skip,
                    limit: w.limit,
                }),
            })
            .collect();

        Ok(Plan {
            partitions,
            next_watermark: resolution.next_watermark,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversion::TextConverter;
    use crate::domain::entities::{CursorSpec, Filter, Item, Predicate};
    use crate::domain::partitioning::MIN_BATCH_SIZE;
    use crate::ports::source_port::Cursor;
    use serde_json::Value;

    struct FixedList(Vec<Item>);

    impl EnumerableSource for FixedList {
        fn list(&self, pattern: &Regex, _recursive: bool) -> Result<Vec<Item>> {
            Ok(self.0.iter().filter(|i| pattern.is_match(&i.name)).cloned().collect())
        }
        fn open_items(&self, _items: &[Item]) -> Result<Cursor> {
            unreachable!()
        }
    }

    struct Unreachable;

    impl EnumerableSource for Unreachable {
        fn list(&self, _pattern: &Regex, _recursive: bool) -> Result<Vec<Item>> {
            Err(ConnectorError::Source("connection refused".into()))
        }
        fn open_items(&self, _items: &[Item]) -> Result<Cursor> {
            unreachable!()
        }
    }

    struct Counted {
        count: u64,
        max: Option<Value>,
    }

    impl QuerySource for Counted {
        fn count(&self, _filter: &Filter) -> Result<u64> {
            Ok(self.count)
        }
        fn query(&self, _window: &QueryWindow) -> Result<Cursor> {
            unreachable!()
        }
        fn max_of(&self, _column: &str) -> Result<Option<Value>> {
            Ok(self.max.clone())
        }
    }

    fn items(n: usize) -> Vec<Item> {
        (0..n)
            .map(|i| Item {
                name: format!("f{:03}.csv", i),
                size: 1,
                timestamp: 0,
            })
            .collect()
    }

    fn query_planner(count: u64, max: Option<Value>) -> QueryPlanner {
        let source: Arc<dyn QuerySource> = Arc::new(Counted { count, max });
        let resolver = WatermarkResolver::new(Arc::clone(&source), Arc::new(TextConverter));
        QueryPlanner::new(source, resolver, MIN_BATCH_SIZE)
    }

    fn item_slices(plan: &Plan) -> Vec<Vec<Item>> {
        plan.partitions
            .iter()
            .map(|p| match &p.range {
                PartitionRange::Items(items) => items.clone(),
                other => panic!("unexpected range {}", other),
            })
            .collect()
    }

    #[test]
    fn test_list_plan_concatenates_to_listing() {
        let planner = ListPlanner::new(Arc::new(FixedList(items(23))));
        let desc = Arc::new(SourceDescriptor::default());
        let plan = planner.plan("job", &desc, 5).unwrap();
        let slices = item_slices(&plan);
        let sizes: Vec<usize> = slices.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![5, 5, 5, 4, 4]);
        assert_eq!(slices.concat(), items(23));
        let ids: Vec<usize> = plan.partitions.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_list_plan_single_partition_holds_everything() {
        let planner = ListPlanner::new(Arc::new(FixedList(items(7))));
        let plan = planner
            .plan("job", &Arc::new(SourceDescriptor::default()), 1)
            .unwrap();
        assert_eq!(item_slices(&plan), vec![items(7)]);
    }

    #[test]
    fn test_list_plan_drops_empty_slices() {
        let planner = ListPlanner::new(Arc::new(FixedList(items(2))));
        let plan = planner
            .plan("job", &Arc::new(SourceDescriptor::default()), 4)
            .unwrap();
        assert_eq!(plan.partitions.len(), 2);
        assert_eq!(item_slices(&plan).concat(), items(2));
    }

    #[test]
    fn test_list_plan_of_nothing_is_one_empty_partition() {
        let planner = ListPlanner::new(Arc::new(FixedList(vec![])));
        let plan = planner
            .plan("job", &Arc::new(SourceDescriptor::default()), 3)
            .unwrap();
        assert_eq!(item_slices(&plan), vec![Vec::<Item>::new()]);
    }

    #[test]
    fn test_list_plan_applies_full_name_pattern() {
        let mut listing = items(3);
        listing.push(Item {
            name: "f000.csv.bak".into(),
            size: 1,
            timestamp: 0,
        });
        let planner = ListPlanner::new(Arc::new(FixedList(listing)));
        let desc = Arc::new(SourceDescriptor {
            filename_pattern: Some(r"f\d+\.csv".into()),
            ..Default::default()
        });
        let plan = planner.plan("job", &desc, 1).unwrap();
        assert_eq!(item_slices(&plan).concat(), items(3));
    }

    #[test]
    fn test_list_plan_fails_fast_when_unreachable() {
        let planner = ListPlanner::new(Arc::new(Unreachable));
        let err = planner
            .plan("job-7", &Arc::new(SourceDescriptor::default()), 4)
            .unwrap_err();
        match err {
            ConnectorError::Planning { job, reason } => {
                assert_eq!(job, "job-7");
                assert!(reason.contains("connection refused"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_query_plan_emits_fewer_partitions_than_requested() {
        let plan = query_planner(12_000, None)
            .plan("job", &Arc::new(SourceDescriptor::default()), 4)
            .unwrap();
        let skips: Vec<u64> = plan
            .partitions
            .iter()
            .map(|p| match &p.range {
                PartitionRange::Window(w) => w.skip,
                other => panic!("unexpected range {}", other),
            })
            .collect();
        assert_eq!(skips, vec![0, 5000, 10_000]);
        assert!(plan.next_watermark.is_none());
    }

    #[test]
    fn test_query_plan_carries_bounds_and_order() {
        let desc = Arc::new(SourceDescriptor {
            cursor: Some(CursorSpec {
                column: "seq".into(),
                type_tag: Some("bigint".into()),
                prior: Some("100".into()),
            }),
            ..Default::default()
        });
        let plan = query_planner(10, Some(serde_json::json!(150)))
            .plan("job", &desc, 2)
            .unwrap();
        assert_eq!(plan.partitions.len(), 1);
        assert_eq!(plan.next_watermark.as_deref(), Some("150"));
        match &plan.partitions[0].range {
            PartitionRange::Window(w) => {
                assert_eq!(w.order_by.as_deref(), Some("seq"));
                assert!(matches!(w.filter.predicates()[0], Predicate::Gt { .. }));
                assert!(matches!(w.filter.predicates()[1], Predicate::Lte { .. }));
            }
            other => panic!("unexpected range {}", other),
        }
    }
}
