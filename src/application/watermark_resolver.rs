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

//! # Watermark Resolution
//!
//! Incremental runs read the half-open range `(previous, upper]` of a cursor
//! column. The upper bound is frozen once, at plan time, before any partition
//! is read: rows written while the partitions run fall above it and are picked
//! up by the next run instead of being read twice or skipped.

use crate::domain::conversion::ValueConverter;
use crate::domain::entities::{Filter, Predicate, SourceDescriptor};
use crate::domain::errors::Result;
use crate::domain::watermark::WatermarkType;
use crate::ports::source_port::QuerySource;
use crate::ports::watermark_port::WatermarkStore;
use log::{info, warn};
use serde_json::Value;
use std::sync::Arc;

/// Outcome of resolving the bounds for one run.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Descriptor filter plus the watermark bounds.
    pub filter: Filter,
    /// The frozen maximum, as read from the source.
    pub upper_bound: Option<Value>,
    /// `upper_bound` in the textual form persisted for the next run.
    pub next_watermark: Option<String>,
}

pub struct WatermarkResolver {
    source: Arc<dyn QuerySource>,
    converter: Arc<dyn ValueConverter>,
}

impl WatermarkResolver {
    pub fn new(source: Arc<dyn QuerySource>, converter: Arc<dyn ValueConverter>) -> Self {
        Self { source, converter }
    }

    /// Computes the effective filter for a run.
    ///
    /// Without a cursor column only the descriptor filter applies. With one, the
    /// current maximum is frozen as an inclusive upper bound and a committed
    /// prior watermark becomes a strict lower bound. An empty source has no
    /// maximum; the run then reads unfiltered and publishes nothing.
    pub fn resolve(&self, descriptor: &SourceDescriptor) -> Result<Resolution> {
        let mut filter = Filter::new();
        if let Some(doc) = &descriptor.filter {
            if !doc.is_empty() {
                filter = filter.and(Predicate::Matches(doc.clone()));
            }
        }

        let Some(cursor) = &descriptor.cursor else {
            return Ok(Resolution {
                filter,
                upper_bound: None,
                next_watermark: None,
            });
        };

        let Some(max) = self.source.max_of(&cursor.column)? else {
            warn!(
                "No maximum for cursor column {} on {}; reading without watermark bounds",
                cursor.column, descriptor.object
            );
            return Ok(Resolution {
                filter,
                upper_bound: None,
                next_watermark: None,
            });
        };

        // The upper bound is parsed from the published text, the same way the
        // next run parses its lower bound.
        let kind = WatermarkType::from_tag(cursor.type_tag.as_deref());
        let next = self.converter.convert(&cursor.column, &max)?;
        if let Some(prior) = cursor.prior.as_deref().filter(|p| !p.trim().is_empty()) {
            filter = filter.and(Predicate::Gt {
                column: cursor.column.clone(),
                value: kind.parse(prior)?,
            });
        }
        filter = filter.and(Predicate::Lte {
            column: cursor.column.clone(),
            value: kind.parse(&next)?,
        });

        info!(
            "Froze {} at {} (previous: {})",
            cursor.column,
            next,
            cursor.prior.as_deref().unwrap_or("none")
        );

        Ok(Resolution {
            filter,
            upper_bound: Some(max),
            next_watermark: Some(next),
        })
    }

    /// Publishes the frozen upper bound as the next run's lower bound.
    ///
    /// Called only after planning succeeded. When nothing was frozen the
    /// previously committed watermark is left untouched.
    pub fn publish(store: &dyn WatermarkStore, job_id: &str, next: Option<&str>) -> Result<()> {
        match next {
            Some(value) => {
                store.publish(job_id, value)?;
                info!("Published watermark {} for job {}", value, job_id);
            }
            None => info!("No watermark to publish for job {}", job_id),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversion::TextConverter;
    use crate::domain::entities::{CursorSpec, Document, QueryWindow};
    use crate::domain::errors::ConnectorError;
    use crate::domain::watermark::Scalar;
    use crate::infrastructure::documents::json_lines_source::DocumentCollection;
    use crate::infrastructure::watermark::memory_store::MemoryWatermarkStore;
    use crate::ports::source_port::Cursor;
    use serde_json::json;

    struct MaxOnly(Option<Value>);

    impl QuerySource for MaxOnly {
        fn count(&self, _filter: &Filter) -> Result<u64> {
            unreachable!()
        }
        fn query(&self, _window: &QueryWindow) -> Result<Cursor> {
            unreachable!()
        }
        fn max_of(&self, _column: &str) -> Result<Option<Value>> {
            Ok(self.0.clone())
        }
    }

    fn descriptor(prior: Option<&str>) -> SourceDescriptor {
        SourceDescriptor {
            object: "events".into(),
            cursor: Some(CursorSpec {
                column: "id".into(),
                type_tag: Some("int".into()),
                prior: prior.map(String::from),
            }),
            ..Default::default()
        }
    }

    fn resolver(max: Option<Value>) -> WatermarkResolver {
        WatermarkResolver::new(Arc::new(MaxOnly(max)), Arc::new(TextConverter))
    }

    #[test]
    fn test_first_run_only_has_upper_bound() {
        let res = resolver(Some(json!(100))).resolve(&descriptor(None)).unwrap();
        assert_eq!(
            res.filter.predicates(),
            &[Predicate::Lte {
                column: "id".into(),
                value: Scalar::Int(100)
            }]
        );
        assert_eq!(res.next_watermark.as_deref(), Some("100"));
    }

    #[test]
    fn test_second_run_is_bounded_on_both_sides() {
        let res = resolver(Some(json!(150)))
            .resolve(&descriptor(Some("100")))
            .unwrap();
        assert_eq!(res.filter.to_string(), "id > 100 and id <= 150");
        assert_eq!(res.next_watermark.as_deref(), Some("150"));
    }

    #[test]
    fn test_empty_source_skips_incremental_filtering() {
        let res = resolver(None).resolve(&descriptor(Some("100"))).unwrap();
        assert!(res.filter.is_empty());
        assert!(res.upper_bound.is_none());
        assert!(res.next_watermark.is_none());
    }

    #[test]
    fn test_user_filter_is_kept() {
        let mut doc = Document::new();
        doc.insert("status".into(), json!("active"));
        let mut d = descriptor(None);
        d.filter = Some(doc.clone());
        let res = resolver(Some(json!(7))).resolve(&d).unwrap();
        assert_eq!(res.filter.predicates()[0], Predicate::Matches(doc));
        assert_eq!(res.filter.predicates().len(), 2);
    }

    #[test]
    fn test_unparseable_prior_fails() {
        let err = resolver(Some(json!(150)))
            .resolve(&descriptor(Some("abc")))
            .unwrap_err();
        assert!(matches!(err, ConnectorError::Watermark(_)));
    }

    #[test]
    fn test_publish_keeps_previous_when_nothing_frozen() {
        let store = MemoryWatermarkStore::default();
        store.publish("job", "100").unwrap();
        WatermarkResolver::publish(&store, "job", None).unwrap();
        assert_eq!(store.load("job").unwrap().as_deref(), Some("100"));
        WatermarkResolver::publish(&store, "job", Some("150")).unwrap();
        assert_eq!(store.load("job").unwrap().as_deref(), Some("150"));
    }

    fn row(column: &str, value: Value) -> Document {
        let mut doc = Document::new();
        doc.insert(column.to_string(), value);
        doc
    }

    /// Resolves a run over `existing`, appends `arrival`, then resolves the
    /// next run from the published watermark. Returns both match counts.
    fn two_runs(tag: Option<&str>, existing: Vec<Value>, arrival: Value) -> (u64, u64) {
        let column = "cursor";
        let collection = Arc::new(DocumentCollection::in_memory(
            existing.into_iter().map(|v| row(column, v)).collect(),
        ));
        let resolver = WatermarkResolver::new(collection.clone(), Arc::new(TextConverter));
        let mut desc = SourceDescriptor {
            object: "events".into(),
            cursor: Some(CursorSpec {
                column: column.into(),
                type_tag: tag.map(String::from),
                prior: None,
            }),
            ..Default::default()
        };

        let first = resolver.resolve(&desc).unwrap();
        let first_count = collection.count(&first.filter).unwrap();
        collection.insert(row(column, arrival)).unwrap();

        if let Some(cursor) = desc.cursor.as_mut() {
            cursor.prior = first.next_watermark;
        }
        let second = resolver.resolve(&desc).unwrap();
        (first_count, collection.count(&second.filter).unwrap())
    }

    #[test]
    fn test_object_id_cursor_reads_only_new_documents() {
        let counts = two_runs(
            None,
            vec![
                json!({"$oid": "5b76632e3cfa776c1ae3fd18"}),
                json!({"$oid": "5b76632e3cfa776c1ae3fd19"}),
            ],
            json!({"$oid": "5b76632e3cfa776c1ae3fd1a"}),
        );
        assert_eq!(counts, (2, 1));
    }

    #[test]
    fn test_number_long_cursor_reads_only_new_documents() {
        let counts = two_runs(
            Some("bigint"),
            vec![json!({"$numberLong": "1"}), json!({"$numberLong": "2"})],
            json!({"$numberLong": "3"}),
        );
        assert_eq!(counts, (2, 1));
    }

    #[test]
    fn test_epoch_timestamp_cursor_reads_only_new_documents() {
        let counts = two_runs(Some("timestamp"), vec![json!(100), json!(200)], json!(300));
        assert_eq!(counts, (2, 1));
    }

    #[test]
    fn test_timestamp_cursor_keeps_subsecond_arrivals() {
        let counts = two_runs(
            Some("timestamp"),
            vec![
                json!({"$date": "2024-01-01 10:00:00.250"}),
                json!({"$date": "2024-01-01 10:00:00.500"}),
            ],
            json!({"$date": "2024-01-01 10:00:00.750"}),
        );
        assert_eq!(counts, (2, 1));
    }

    #[test]
    fn test_date_cursor_reads_only_new_documents() {
        let counts = two_runs(
            Some("date"),
            vec![
                json!({"$date": "2024-01-01T00:00:00"}),
                json!({"$date": "2024-01-02 00:00:00"}),
            ],
            json!({"$date": "2024-01-02T08:30:00.125"}),
        );
        assert_eq!(counts, (2, 1));
    }

    #[test]
    fn test_decimal_cursor_reads_only_new_documents() {
        let counts = two_runs(
            Some("decimal"),
            vec![json!(1.25), json!(2.5)],
            json!(3.75),
        );
        assert_eq!(counts, (2, 1));
    }

    #[test]
    fn test_opaque_cursor_reads_only_new_documents() {
        let counts = two_runs(
            Some("uuid"),
            vec![json!("evt-0001"), json!("evt-0002")],
            json!("evt-0003"),
        );
        assert_eq!(counts, (2, 1));
    }

    #[test]
    fn test_upper_bound_uses_declared_type() {
        let res = WatermarkResolver::new(
            Arc::new(MaxOnly(Some(json!({"$numberLong": "9000000000"})))),
            Arc::new(TextConverter),
        )
        .resolve(&SourceDescriptor {
            cursor: Some(CursorSpec {
                column: "id".into(),
                type_tag: Some("bigint".into()),
                prior: None,
            }),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            res.filter.predicates(),
            &[Predicate::Lte {
                column: "id".into(),
                value: Scalar::Int(9_000_000_000)
            }]
        );
    }
}
