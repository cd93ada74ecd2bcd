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

use batch_connector::application::job_runner::{JobRunner, JobSettings};
use batch_connector::application::planner::{ListPlanner, PartitionPlanner, QueryPlanner};
use batch_connector::application::registry::RemoteEndpointRegistry;
use batch_connector::application::runtime::RuntimeContext;
use batch_connector::application::watermark_resolver::WatermarkResolver;
use batch_connector::application::worker::SourceHandle;
use batch_connector::config::{AppConfig, CliArgs, SourceKind};
use batch_connector::domain::conversion::{TextConverter, ValueConverter};
use batch_connector::domain::entities::JobReport;
use batch_connector::domain::errors::Result;
use batch_connector::infrastructure::documents::json_lines_source::DocumentCollection;
use batch_connector::infrastructure::file_tree::local_tree_source::LocalTreeSource;
use batch_connector::infrastructure::local_storage::csv_sink::LocalSinkConnector;
use batch_connector::infrastructure::watermark::file_store::FileWatermarkStore;
use batch_connector::infrastructure::watermark::memory_store::MemoryWatermarkStore;
use batch_connector::ports::source_port::{EnumerableSource, QuerySource};
use batch_connector::ports::watermark_port::WatermarkStore;
use clap::Parser;
use log::{error, info};
use std::process;
use std::sync::Arc;

fn main() {
    // 1. Initialize Logging
    env_logger::init();

    // 2. Parse Arguments
    let args = CliArgs::parse();

    // 3. Load Config
    let mut config = match AppConfig::from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {}", e);
            process::exit(1);
        }
    };
    config.merge_cli(&args);

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        process::exit(1);
    }

    // 4. Run
    match run(&config) {
        Ok(report) if report.is_success() => {
            info!("Job {} finished: {} records written", report.job_id, report.records_written);
        }
        Ok(report) => {
            let failed = report.details.iter().filter(|d| d.status != "SUCCESS").count();
            error!(
                "Job {} finished with {}/{} failed partitions",
                report.job_id, failed, report.partitions
            );
            process::exit(2);
        }
        Err(e) => {
            error!("Job {} failed: {}", config.job.id, e);
            process::exit(1);
        }
    }
}

/// Wires adapters into a `JobRunner` and runs the configured job.
fn run(config: &AppConfig) -> Result<JobReport> {
    let runtime = RuntimeContext::init(config);
    let converter: Arc<dyn ValueConverter> = Arc::new(TextConverter);

    let watermarks: Arc<dyn WatermarkStore> = match &config.watermark_file {
        Some(path) => Arc::new(FileWatermarkStore::new(path)),
        None => Arc::new(MemoryWatermarkStore::default()),
    };

    // The sink handle is resolved before any partition is planned or read.
    let registry = RemoteEndpointRegistry::new(LocalSinkConnector::new(config.columns.clone()));
    let sink = registry.get_handle(&config.sink_endpoint())?;

    let (planner, source): (Box<dyn PartitionPlanner>, SourceHandle) = match config.source.kind {
        SourceKind::FileTree => {
            let source: Arc<dyn EnumerableSource> = Arc::new(LocalTreeSource::new(
                &config.source.address,
                &config.source.object,
            ));
            (
                Box::new(ListPlanner::new(Arc::clone(&source))) as Box<dyn PartitionPlanner>,
                SourceHandle::Enumerable(source),
            )
        }
        SourceKind::Documents => {
            let source: Arc<dyn QuerySource> = Arc::new(DocumentCollection::open(
                &config.source.address,
                &config.source.object,
            )?);
            let resolver = WatermarkResolver::new(Arc::clone(&source), Arc::clone(&converter));
            (
                Box::new(QueryPlanner::new(
                    Arc::clone(&source),
                    resolver,
                    config.min_batch_size(),
                )) as Box<dyn PartitionPlanner>,
                SourceHandle::Query(source),
            )
        }
    };

    let settings = JobSettings {
        job_id: config.job.id.clone(),
        task_id: config.job.task_id.clone(),
        parallelism: runtime.parallelism,
        columns: config.columns.clone(),
        channel_capacity: runtime.channel_capacity,
        report_dir: Some(config.report_dir()),
    };

    info!("Starting job {}...", settings.job_id);
    let runner = JobRunner::new(planner, source, converter, sink, watermarks, settings);
    runner.run(config.source_descriptor())
}
