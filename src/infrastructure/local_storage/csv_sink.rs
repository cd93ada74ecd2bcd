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

//! Local filesystem sink.
//!
//! Each writer instance gets its own gzip-compressed CSV file under
//! `<root>/<job_id>/`. The job-level finalize call drops a `_FINALIZED.json`
//! manifest next to the part files; downstream loaders wait for it.

use crate::domain::entities::{Record, WriteContext, WriteStatus};
use crate::domain::errors::{ConnectorError, Result};
use crate::ports::endpoint_port::{EndpointConnector, EndpointIdentity};
use crate::ports::sink_port::SinkPort;
use csv::{QuoteStyle, WriterBuilder};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info};
use serde_json::json;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

pub const MANIFEST_FILE: &str = "_FINALIZED.json";

type PartWriter = csv::Writer<GzEncoder<BufWriter<File>>>;
type PartKey = (String, String, usize);

pub struct LocalCsvSink {
    root: PathBuf,
    header: Vec<String>,
    parts: Mutex<HashMap<PartKey, Arc<Mutex<Option<PartWriter>>>>>,
}

impl LocalCsvSink {
    pub fn new(root: impl Into<PathBuf>, header: Vec<String>) -> Self {
        Self {
            root: root.into(),
            header,
            parts: Mutex::new(HashMap::new()),
        }
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.root.join(job_id)
    }

    pub fn part_path(&self, ctx: &WriteContext) -> PathBuf {
        self.job_dir(&ctx.job_id)
            .join(format!("part-{}-{:05}.csv.gz", ctx.task_id, ctx.partition_id))
    }

    fn write_error(ctx: &WriteContext, e: impl std::fmt::Display) -> ConnectorError {
        ConnectorError::Write {
            job: ctx.job_id.clone(),
            partition: ctx.partition_id,
            reason: e.to_string(),
        }
    }

    fn open_part(&self, ctx: &WriteContext) -> Result<PartWriter> {
        let path = self.part_path(ctx);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = File::create(&path)?;
        let buf_writer = BufWriter::with_capacity(128 * 1024, file);
        let encoder = GzEncoder::new(buf_writer, Compression::fast());
        let mut wtr = WriterBuilder::new()
            .quote_style(QuoteStyle::NonNumeric)
            .from_writer(encoder);
        if !self.header.is_empty() {
            wtr.write_record(&self.header)
                .map_err(|e| Self::write_error(ctx, e))?;
        }
        debug!("Opened {}", path.display());
        Ok(wtr)
    }

    fn part(&self, ctx: &WriteContext) -> Arc<Mutex<Option<PartWriter>>> {
        let key = (ctx.job_id.clone(), ctx.task_id.clone(), ctx.partition_id);
        let mut parts = self.parts.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(parts.entry(key).or_default())
    }

    fn finish(ctx: &WriteContext, wtr: PartWriter) -> Result<()> {
        let encoder = wtr.into_inner().map_err(|e| Self::write_error(ctx, e))?;
        let mut buf_writer = encoder.finish()?;
        buf_writer.flush()?;
        Ok(())
    }

    fn part_files(dir: &Path) -> Result<Vec<String>> {
        let mut files: Vec<String> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("part-"))
            .collect();
        files.sort();
        Ok(files)
    }
}

impl SinkPort for LocalCsvSink {
    fn write(&self, ctx: &WriteContext, record: &Record) -> Result<WriteStatus> {
        if !self.header.is_empty() && record.arity() != self.header.len() {
            return Ok(WriteStatus::Rejected(format!(
                "expected {} columns, got {}",
                self.header.len(),
                record.arity()
            )));
        }
        let part = self.part(ctx);
        let mut guard = part.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(self.open_part(ctx)?);
        }
        if let Some(wtr) = guard.as_mut() {
            wtr.write_record(record.values())
                .map_err(|e| Self::write_error(ctx, e))?;
        }
        Ok(WriteStatus::Ok)
    }

    /// Closes the partition's file. A partition that wrote nothing still gets
    /// a file holding only the header.
    fn flush(&self, ctx: &WriteContext) -> Result<()> {
        let key = (ctx.job_id.clone(), ctx.task_id.clone(), ctx.partition_id);
        let part = self
            .parts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        let open = match &part {
            Some(p) => {
                let mut guard = p.lock().unwrap_or_else(PoisonError::into_inner);
                guard.take()
            }
            None => None,
        };
        let wtr = match open {
            Some(wtr) => wtr,
            None => self.open_part(ctx)?,
        };
        Self::finish(ctx, wtr)?;
        debug!("Closed {}", self.part_path(ctx).display());
        Ok(())
    }

    fn finalize(&self, ctx: &WriteContext, total_records: u64, is_final: bool) -> Result<()> {
        let dir = self.job_dir(&ctx.job_id);
        fs::create_dir_all(&dir)?;
        let manifest = json!({
            "job_id": ctx.job_id,
            "task_id": ctx.task_id,
            "finalized_by_partition": ctx.partition_id,
            "total_records": total_records,
            "is_final": is_final,
            "files": Self::part_files(&dir)?,
            "finished_at": chrono::Utc::now().to_rfc3339(),
        });
        let path = dir.join(MANIFEST_FILE);
        let file = File::create(&path)?;
        serde_json::to_writer_pretty(file, &manifest)?;
        info!("Job {} finalized with {} records at {}", ctx.job_id, total_records, path.display());
        Ok(())
    }
}

/// Opens `file://` endpoints as a `LocalCsvSink` rooted at the address.
pub struct LocalSinkConnector {
    header: Vec<String>,
}

impl LocalSinkConnector {
    pub fn new(header: Vec<String>) -> Self {
        Self { header }
    }
}

impl EndpointConnector for LocalSinkConnector {
    type Handle = LocalCsvSink;

    fn connect(&self, endpoint: &EndpointIdentity) -> Result<LocalCsvSink> {
        if endpoint.protocol != "file" {
            return Err(ConnectorError::Setup(format!(
                "unsupported sink protocol '{}'",
                endpoint.protocol
            )));
        }
        fs::create_dir_all(&endpoint.address)
            .map_err(|e| ConnectorError::Setup(format!("{}: {}", endpoint.address, e)))?;
        Ok(LocalCsvSink::new(&endpoint.address, self.header.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;

    fn ctx(partition_id: usize) -> WriteContext {
        WriteContext {
            job_id: "job1".into(),
            task_id: "t0".into(),
            partition_id,
        }
    }

    fn rec(values: &[&str]) -> Record {
        Record::new(values.iter().map(|v| v.to_string()).collect())
    }

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        let decoder = GzDecoder::new(File::open(path).unwrap());
        csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(decoder)
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect()
    }

    #[test]
    fn test_writes_one_file_per_partition() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalCsvSink::new(dir.path(), vec!["id".into(), "name".into()]);

        assert_eq!(sink.write(&ctx(0), &rec(&["1", "a,b"])).unwrap(), WriteStatus::Ok);
        assert_eq!(sink.write(&ctx(1), &rec(&["2", "c"])).unwrap(), WriteStatus::Ok);
        assert_eq!(sink.write(&ctx(0), &rec(&["3", "d"])).unwrap(), WriteStatus::Ok);
        sink.flush(&ctx(0)).unwrap();
        sink.flush(&ctx(1)).unwrap();

        let rows = read_rows(&sink.part_path(&ctx(0)));
        assert_eq!(rows[0], vec!["id", "name"]);
        assert_eq!(rows[1], vec!["1", "a,b"]);
        assert_eq!(rows[2], vec!["3", "d"]);
        assert_eq!(read_rows(&sink.part_path(&ctx(1))).len(), 2);
    }

    #[test]
    fn test_wrong_arity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalCsvSink::new(dir.path(), vec!["id".into()]);
        assert!(matches!(
            sink.write(&ctx(0), &rec(&["1", "extra"])).unwrap(),
            WriteStatus::Rejected(_)
        ));
    }

    #[test]
    fn test_empty_partition_still_produces_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalCsvSink::new(dir.path(), vec!["id".into()]);
        sink.flush(&ctx(4)).unwrap();
        assert_eq!(read_rows(&sink.part_path(&ctx(4))), vec![vec!["id".to_string()]]);
    }

    #[test]
    fn test_finalize_writes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalCsvSink::new(dir.path(), vec!["id".into()]);
        sink.write(&ctx(0), &rec(&["1"])).unwrap();
        sink.flush(&ctx(0)).unwrap();
        sink.flush(&ctx(1)).unwrap();
        sink.finalize(&ctx(1), 1, true).unwrap();

        let manifest: serde_json::Value = serde_json::from_reader(
            File::open(sink.job_dir("job1").join(MANIFEST_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest["total_records"], 1);
        assert_eq!(manifest["is_final"], true);
        assert_eq!(
            manifest["files"],
            json!(["part-t0-00000.csv.gz", "part-t0-00001.csv.gz"])
        );
    }

    #[test]
    fn test_connector_rejects_unknown_protocol() {
        let dir = tempfile::tempdir().unwrap();
        let connector = LocalSinkConnector::new(vec![]);
        let mut endpoint = EndpointIdentity {
            protocol: "file".into(),
            address: dir.path().join("out").to_string_lossy().into_owned(),
            username: None,
        };
        assert!(connector.connect(&endpoint).is_ok());
        assert!(dir.path().join("out").is_dir());

        endpoint.protocol = "s3".into();
        assert!(matches!(connector.connect(&endpoint), Err(ConnectorError::Setup(_))));
    }
}
