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

//! Command-line entry point of the EDW direct transfer tool.

use clap::Parser;
use edw_direct::application::orchestrator::TransferOrchestrator;
use edw_direct::application::runtime::RuntimeContext;
use edw_direct::config::{AppConfig, CliArgs};
use edw_direct::domain::entities::TaskStatus;
use edw_direct::infrastructure::local_storage::delimited_source::DelimitedSourceFactory;
use edw_direct::infrastructure::local_storage::part_file_sink::PartFileSinkFactory;
use log::{error, info};
use std::process;

fn main() {
    // 1. Initialize Logging
    env_logger::init();

    // 2. Parse Arguments
    let args = CliArgs::parse();

    // 3. Load Config
    let mut config = if let Some(config_path) = &args.config {
        match AppConfig::from_file(config_path) {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to load config: {}", e);
                process::exit(1);
            }
        }
    } else {
        AppConfig::default_from_cli(&args)
    };

    // Merge CLI overrides
    config.merge_cli(&args);

    let job = match config.build_job_spec() {
        Ok(job) => job,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    // 4. Initialize runtime resources
    let runtime = match RuntimeContext::init(&config) {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to initialize runtime: {}", e);
            process::exit(1);
        }
    };
    info!(
        "Job {} ({}) on {} with {} partitions",
        job.job_id,
        job.direction,
        job.qualified_table(),
        job.partitions
    );

    // 5. Wire the local file store
    let sinks = match PartFileSinkFactory::new(
        job.import.output_dir.clone(),
        job.format.clone(),
        job.import.compress,
    ) {
        Ok(s) => s,
        Err(e) => {
            error!("Cannot prepare output directory: {}", e);
            process::exit(1);
        }
    };
    let sources = DelimitedSourceFactory::new(
        job.export.input_dir.clone(),
        job.export.input.clone(),
        job.format.null_token().to_string(),
    );

    // 6. Run Orchestrator
    let direction = job.direction;
    let orchestrator = TransferOrchestrator::new(job, runtime.sessions, runtime.metadata);
    match orchestrator.run(&sinks, &sources) {
        Ok(results) => {
            let success_count = results
                .iter()
                .filter(|r| r.status == TaskStatus::Success)
                .count();
            info!(
                "{} finished. {}/{} partitions successful.",
                direction,
                success_count,
                results.len()
            );
            if success_count != results.len() {
                process::exit(1);
            }
        }
        Err(e) => {
            error!("Transfer failed: {}", e);
            process::exit(1);
        }
    }
}
