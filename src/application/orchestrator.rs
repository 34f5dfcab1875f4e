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

//! The application logic that runs one transfer job end to end.
//!
//! Before any worker starts, the target is checked (only physical tables are
//! supported), the column list is resolved, and the job is frozen into an
//! `Arc<JobSpec>`. Partitions then run in parallel on the rayon pool. A
//! job-level completion hook merges and drops shadow tables exactly once.

use crate::application::partition_assigner::{
    assign_export, PartitionStrategy, TempTableStrategy, VirtualColumnStrategy,
};
use crate::application::temp_tables::{ShadowTableRegistry, TemporaryTableManager};
use crate::application::transfer_loop::{channel_for, ExportWorker, ImportWorker, WorkerContext};
use crate::domain::entities::{
    Direction, ExportStaging, ImportPartitioning, JobSpec, ObjectKind, TaskResult, TaskStatus,
    TempTableDescriptor,
};
use crate::domain::errors::{Result, TransferError};
use crate::infrastructure::local_storage::log_uploader::{prepare_log_dir, LogUploader};
use crate::ports::metadata_port::MetadataPort;
use crate::ports::record_port::{RecordSinkFactory, RecordSourceFactory};
use crate::ports::sql_port::SessionFactory;
use log::{error, info, warn};
use rayon::prelude::*;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Runs import and export jobs against one EDW.
pub struct TransferOrchestrator {
    job: JobSpec,
    sessions: Arc<dyn SessionFactory>,
    metadata: Arc<dyn MetadataPort>,
    registry: Arc<ShadowTableRegistry>,
    report_dir: PathBuf,
}

impl TransferOrchestrator {
    pub fn new(job: JobSpec, sessions: Arc<dyn SessionFactory>, metadata: Arc<dyn MetadataPort>) -> Self {
        let report_dir = job.work_dir.clone();
        Self {
            job,
            sessions,
            metadata,
            registry: Arc::new(ShadowTableRegistry::new()),
            report_dir,
        }
    }

    /// Shares a registry with other orchestrators in the same process.
    pub fn with_registry(mut self, registry: Arc<ShadowTableRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_report_dir(mut self, dir: PathBuf) -> Self {
        self.report_dir = dir;
        self
    }

    /// Checks the target and freezes the job. Returns the snapshot and the
    /// table's full column list.
    fn prepare(&self) -> Result<(Arc<JobSpec>, Vec<String>)> {
        let schema = self.job.schema.as_deref();
        let kind = self.metadata.object_kind(schema, &self.job.table)?;
        if kind != ObjectKind::Table {
            return Err(TransferError::UnsupportedObject {
                object: self.job.qualified_table(),
                kind: kind.to_string(),
            });
        }

        let table_columns = self.metadata.column_names(schema, &self.job.table)?;
        let mut job = self.job.clone();
        if job.columns.is_empty() {
            if table_columns.is_empty() {
                warn!("No columns found for {}; selecting *", job.qualified_table());
            }
            job.columns = table_columns.clone();
        }
        if let Some(dir) = &job.direct.log_dir {
            prepare_log_dir(dir)?;
        }
        std::fs::create_dir_all(&job.work_dir)?;
        Ok((Arc::new(job), table_columns))
    }

    fn context(&self, job: Arc<JobSpec>) -> WorkerContext {
        let uploader = job.direct.upload_dir.clone().map(LogUploader::new);
        WorkerContext {
            job,
            sessions: Arc::clone(&self.sessions),
            registry: Arc::clone(&self.registry),
            uploader,
        }
    }

    /// Entry point for the configured direction.
    pub fn run(
        &self,
        sinks: &dyn RecordSinkFactory,
        sources: &dyn RecordSourceFactory,
    ) -> Result<Vec<TaskResult>> {
        match self.job.direction {
            Direction::Import => self.run_import(sinks),
            Direction::Export => self.run_export(sources),
        }
    }

    /// Unloads every partition of the table into `sinks`.
    pub fn run_import(&self, sinks: &dyn RecordSinkFactory) -> Result<Vec<TaskResult>> {
        let start_time = Instant::now();
        info!("Starting import of {}", self.job.qualified_table());
        let (job, table_columns) = self.prepare()?;

        let results = self.import_partitions(&job, &table_columns, sinks);
        // the shadow is dropped even when populating it failed
        self.finish_import_job(&job)?;
        let results = results?;

        self.generate_report(&job, &results, start_time.elapsed().as_secs_f64())?;
        Ok(results)
    }

    fn import_partitions(
        &self,
        job: &Arc<JobSpec>,
        table_columns: &[String],
        sinks: &dyn RecordSinkFactory,
    ) -> Result<Vec<TaskResult>> {
        let strategy: Box<dyn PartitionStrategy> = match job.import.partitioning {
            ImportPartitioning::Virtual => Box::new(VirtualColumnStrategy),
            ImportPartitioning::TempTable => {
                let mut session = self.sessions.open_session()?;
                let mut manager = TemporaryTableManager::new(session.as_mut());
                let mut shadow = manager.create_import_shadow(
                    &job.qualified_table(),
                    &job.import.temp_table_suffix,
                    job.partitions,
                )?;
                self.registry.register(&job.job_id, shadow.clone());
                manager.populate_import_shadow(&mut shadow, table_columns, job.where_clause.as_deref())?;
                let template = TemporaryTableManager::parameterized_query(&mut shadow, &job.select_list())?;
                Box::new(TempTableStrategy::new(shadow.shadow_table, template)?)
            }
        };

        let worker = ImportWorker::new(self.context(Arc::clone(job)), channel_for(job.channel));
        let results = (0..job.partitions)
            .into_par_iter()
            .map(|index| {
                let outcome = strategy.partition(job, index).and_then(|spec| {
                    let mut sink = sinks.create_sink(index)?;
                    worker.run(&spec, sink.as_mut())
                });
                outcome.unwrap_or_else(|e| {
                    error!("Import partition {} of {} failed: {}", index, job.qualified_table(), e);
                    TaskResult::failure(job.qualified_table(), Direction::Import, Some(index), e.to_string())
                })
            })
            .collect();
        Ok(results)
    }

    /// Job-completion hook for imports: drops the shadow table once.
    fn finish_import_job(&self, job: &JobSpec) -> Result<()> {
        let mut shadows = self.registry.take(&job.job_id);
        if shadows.is_empty() {
            return Ok(());
        }
        if !job.import.delete_temp_table {
            info!("Keeping shadow tables {:?}", shadow_names(&shadows));
            return Ok(());
        }
        let mut session = self.sessions.open_session()?;
        let mut manager = TemporaryTableManager::new(session.as_mut());
        for shadow in &mut shadows {
            manager.drop_shadow(shadow)?;
        }
        Ok(())
    }

    /// Loads every partition of `sources` into the table.
    pub fn run_export(&self, sources: &dyn RecordSourceFactory) -> Result<Vec<TaskResult>> {
        let start_time = Instant::now();
        info!("Starting export into {}", self.job.qualified_table());
        let (job, _) = self.prepare()?;

        let worker = ExportWorker::new(self.context(Arc::clone(&job)), channel_for(job.channel));
        let results: Vec<TaskResult> = (0..job.partitions)
            .into_par_iter()
            .map(|index| {
                let outcome = assign_export(&job, index).and_then(|assignment| {
                    let mut source = sources.open_source(index, job.partitions)?;
                    worker.run(&assignment, source.as_mut())
                });
                outcome.unwrap_or_else(|e| {
                    error!("Export partition {} into {} failed: {}", index, job.qualified_table(), e);
                    TaskResult::failure(job.qualified_table(), Direction::Export, Some(index), e.to_string())
                })
            })
            .collect();

        self.finish_export_job(&job, &results)?;
        self.generate_report(&job, &results, start_time.elapsed().as_secs_f64())?;
        Ok(results)
    }

    /// Job-completion hook for exports: merges the shadows into the
    /// destination when every partition succeeded, then drops them.
    fn finish_export_job(&self, job: &JobSpec, results: &[TaskResult]) -> Result<()> {
        if job.export.staging != ExportStaging::ShadowTables {
            return Ok(());
        }
        let mut shadows = self.registry.take(&job.job_id);
        if !results.iter().all(TaskResult::is_success) {
            warn!(
                "Not merging into {}: some partitions failed; shadow tables {:?} are left for the next attempt",
                job.qualified_table(),
                shadow_names(&shadows)
            );
            return Ok(());
        }

        let mut session = self.sessions.open_session()?;
        let mut manager = TemporaryTableManager::new(session.as_mut());
        manager.merge_export_shadows(&job.qualified_table(), &shadows)?;
        if job.export.delete_temp_tables {
            for shadow in &mut shadows {
                manager.drop_shadow(shadow)?;
            }
        }
        Ok(())
    }

    fn generate_report(&self, job: &JobSpec, results: &[TaskResult], duration_secs: f64) -> Result<()> {
        let success = results.iter().filter(|r| r.status == TaskStatus::Success).count();
        let failed = results.len() - success;
        let total_rows: u64 = results.iter().map(|r| r.rows).sum();
        let total_bytes: u64 = results.iter().map(|r| r.bytes).sum();

        let report = json!({
            "summary": {
                "job_id": job.job_id,
                "direction": job.direction,
                "table": job.qualified_table(),
                "partitions": job.partitions,
                "total_tasks": results.len(),
                "success": success,
                "failed": failed,
                "total_rows": total_rows,
                "total_bytes": total_bytes,
                "total_duration_seconds": duration_secs,
                "total_mb_per_sec": if duration_secs > 0.0 { (total_bytes as f64 / 1024.0 / 1024.0) / duration_secs } else { 0.0 }
            },
            "details": results
        });

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        std::fs::create_dir_all(&self.report_dir)?;
        let report_path = self.report_dir.join(format!("report_{}.json", timestamp));
        let file = std::fs::File::create(&report_path)?;
        serde_json::to_writer_pretty(file, &report)?;
        info!("Report written to {}", report_path.display());
        Ok(())
    }
}

fn shadow_names(shadows: &[TempTableDescriptor]) -> Vec<&str> {
    shadows.iter().map(|d| d.shadow_table.as_str()).collect()
}
