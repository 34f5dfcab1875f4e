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

//! # Transfer Loop
//!
//! The per-worker record loops. A `TransferChannel` moves one partition's
//! records between the local file store and the EDW; `ExportWorker` and
//! `ImportWorker` wrap a channel with the task bookkeeping.
//!
//! The pipe channel is the direct path: records cross a named pipe while a
//! `LoaderThread` runs the bulk statement on the other end. The statement
//! channel sends plain parameterised SQL over the session instead.

use crate::application::loader_thread::{LoaderRequest, LoaderThread};
use crate::application::partition_assigner::partition_select;
use crate::application::temp_tables::{ShadowTableRegistry, TemporaryTableManager};
use crate::domain::entities::{
    ChannelKind, Direction, ExportAssignment, ExportStaging, JobSpec, LoaderOutcome, PartitionSpec,
    ShadowState, TaskResult,
};
use crate::domain::errors::{Result, TransferError};
use crate::infrastructure::edw::sql_utils;
use crate::infrastructure::fifo::pipe_bridge::{self, PipeBridge, PipeEnd};
use crate::infrastructure::local_storage::log_uploader::LogUploader;
use crate::ports::record_port::{RecordSink, RecordSource};
use crate::ports::sql_port::SessionFactory;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::sync::Arc;
use std::time::Instant;

const PIPE_BUFFER: usize = 64 * 1024;

/// Shared by every worker of one job.
#[derive(Clone)]
pub struct WorkerContext {
    pub job: Arc<JobSpec>,
    pub sessions: Arc<dyn SessionFactory>,
    pub registry: Arc<ShadowTableRegistry>,
    pub uploader: Option<LogUploader>,
}

/// Records and wire bytes moved by one channel run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Throughput {
    pub rows: u64,
    pub bytes: u64,
}

/// Moves one partition's records between local storage and the EDW.
pub trait TransferChannel: Send + Sync {
    /// Loads every record of `source` into `target_table`.
    fn export(
        &self,
        ctx: &WorkerContext,
        partition: u32,
        target_table: &str,
        source: &mut dyn RecordSource,
    ) -> Result<Throughput>;

    /// Writes every row produced by `select_sql` to `sink`.
    fn import(
        &self,
        ctx: &WorkerContext,
        partition: u32,
        select_sql: &str,
        sink: &mut dyn RecordSink,
    ) -> Result<Throughput>;
}

/// Picks the channel implementation for a job.
pub fn channel_for(kind: ChannelKind) -> Box<dyn TransferChannel> {
    match kind {
        ChannelKind::Direct => Box::new(PipeChannel),
        ChannelKind::Statement => Box::new(StatementChannel),
    }
}

/// Named pipe plus a concurrent bulk statement.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipeChannel;

impl PipeChannel {
    fn prepare_pipe(ctx: &WorkerContext, partition: u32) -> Result<PipeBridge> {
        let task_dir = ctx.job.task_work_dir(partition);
        std::fs::create_dir_all(&task_dir)?;
        PipeBridge::create(pipe_bridge::pipe_path(&task_dir, partition), ctx.job.pipe_open_timeout)
    }

    fn start_loader(ctx: &WorkerContext, partition: u32, sql: String) -> Result<LoaderThread> {
        let session = ctx.sessions.open_session()?;
        LoaderThread::spawn(
            session,
            LoaderRequest {
                partition,
                sql,
                null_token: ctx.job.format.null_token().to_string(),
                log_dir: ctx.job.direct.log_dir.clone(),
                uploader: ctx.uploader.clone(),
                task_attempt_id: ctx.job.task_attempt_id(partition),
            },
        )
    }

    /// Opens the worker's end of the pipe.
    ///
    /// When the open fails and the loader has already stopped, the loader's
    /// error is the root cause and is reported instead.
    fn open_end(
        bridge: &mut PipeBridge,
        end: PipeEnd,
        loader: LoaderThread,
        partition: u32,
    ) -> Result<(File, LoaderThread)> {
        let opened = match end {
            PipeEnd::Write => bridge.open_write(loader.finished_signal()),
            PipeEnd::Read => bridge.open_read(loader.finished_signal()),
        };
        match opened {
            Ok(file) => Ok((file, loader)),
            Err(e) if loader.is_finished() => {
                loader.join().into_result(partition)?;
                Err(e)
            }
            Err(e) => {
                // the statement is still blocked in the database; leave it detached
                warn!("Abandoning loader for partition {} after pipe failure", partition);
                Err(e)
            }
        }
    }

    /// Joins the loader after a pipe I/O failure and picks the error to report.
    fn fail_with_loader(loader: LoaderThread, partition: u32, io_error: TransferError) -> TransferError {
        match loader.join() {
            LoaderOutcome::Failed(e) => TransferError::Loader {
                partition,
                source: Box::new(e),
            },
            LoaderOutcome::Succeeded => io_error,
        }
    }
}

impl TransferChannel for PipeChannel {
    fn export(
        &self,
        ctx: &WorkerContext,
        partition: u32,
        target_table: &str,
        source: &mut dyn RecordSource,
    ) -> Result<Throughput> {
        let job = &ctx.job;
        let mut bridge = Self::prepare_pipe(ctx, partition)?;
        let sql = sql_utils::build_bulk_load_sql(target_table, bridge.path(), &job.format, &job.direct);
        let loader = Self::start_loader(ctx, partition, sql)?;
        let (file, loader) = Self::open_end(&mut bridge, PipeEnd::Write, loader, partition)?;

        let pipe_path = bridge.path().to_path_buf();
        let pipe_err = |source: std::io::Error| TransferError::Pipe {
            path: pipe_path.clone(),
            source,
        };

        let mut stats = Throughput::default();
        let mut writer = BufWriter::with_capacity(PIPE_BUFFER, file);
        let mut buf = Vec::with_capacity(4096);
        let written: Result<()> = (|| {
            while let Some(record) = source.next_record()? {
                buf.clear();
                job.format.encode_record(&record, &mut buf);
                writer.write_all(&buf).map_err(pipe_err)?;
                stats.rows += 1;
                stats.bytes += buf.len() as u64;
            }
            writer.flush().map_err(pipe_err)
        })();

        // closing the write end is the end-of-data signal
        let (file, unflushed) = writer.into_parts();
        if let Ok(rest) = unflushed {
            if !rest.is_empty() {
                debug!("Discarding {} unflushed bytes for partition {}", rest.len(), partition);
            }
        }
        bridge.close(file, PipeEnd::Write);

        match written {
            Ok(()) => {
                loader.join().into_result(partition)?;
                Ok(stats)
            }
            Err(e @ TransferError::Pipe { .. }) => Err(Self::fail_with_loader(loader, partition, e)),
            Err(e) => {
                if let LoaderOutcome::Failed(loader_err) = loader.join() {
                    warn!("Loader for partition {} also failed: {}", partition, loader_err);
                }
                Err(e)
            }
        }
    }

    fn import(
        &self,
        ctx: &WorkerContext,
        partition: u32,
        select_sql: &str,
        sink: &mut dyn RecordSink,
    ) -> Result<Throughput> {
        let job = &ctx.job;
        let mut bridge = Self::prepare_pipe(ctx, partition)?;
        let sql = sql_utils::build_bulk_unload_sql(bridge.path(), &job.format, &job.direct, select_sql);
        let loader = Self::start_loader(ctx, partition, sql)?;
        let (file, loader) = Self::open_end(&mut bridge, PipeEnd::Read, loader, partition)?;

        let pipe_path = bridge.path().to_path_buf();
        let mut stats = Throughput::default();
        let mut reader = BufReader::with_capacity(PIPE_BUFFER, file);
        let mut buf = Vec::with_capacity(4096);
        let read: Result<()> = (|| {
            loop {
                let more = job
                    .format
                    .read_raw_record(&mut reader, &mut buf)
                    .map_err(|source| TransferError::Pipe {
                        path: pipe_path.clone(),
                        source,
                    })?;
                if !more {
                    return Ok(());
                }
                sink.write_record(&job.format.decode_record(&buf))?;
                stats.rows += 1;
                stats.bytes += buf.len() as u64 + 1;
            }
        })();

        // an early close makes a still-writing database fail instead of block
        bridge.close(reader.into_inner(), PipeEnd::Read);

        match read {
            Ok(()) => {
                loader.join().into_result(partition)?;
                sink.finish()?;
                Ok(stats)
            }
            Err(e @ TransferError::Pipe { .. }) => Err(Self::fail_with_loader(loader, partition, e)),
            Err(e) => {
                if let LoaderOutcome::Failed(loader_err) = loader.join() {
                    debug!("Loader for partition {} stopped after sink failure: {}", partition, loader_err);
                }
                Err(e)
            }
        }
    }
}

/// Plain SQL over the session: a cursor for import, single-row INSERTs for export.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatementChannel;

impl TransferChannel for StatementChannel {
    fn export(
        &self,
        ctx: &WorkerContext,
        _partition: u32,
        target_table: &str,
        source: &mut dyn RecordSource,
    ) -> Result<Throughput> {
        let mut session = ctx.sessions.open_session()?;
        let mut statements: HashMap<usize, String> = HashMap::new();
        let mut stats = Throughput::default();
        while let Some(record) = source.next_record()? {
            let sql = statements
                .entry(record.len())
                .or_insert_with(|| sql_utils::insert_row_sql(target_table, &ctx.job.columns, record.len()));
            session.execute_row(sql, &record)?;
            stats.rows += 1;
            stats.bytes += record.iter().flatten().map(|v| v.len() as u64).sum::<u64>();
        }
        Ok(stats)
    }

    fn import(
        &self,
        ctx: &WorkerContext,
        _partition: u32,
        select_sql: &str,
        sink: &mut dyn RecordSink,
    ) -> Result<Throughput> {
        let mut session = ctx.sessions.open_session()?;
        let mut bytes = 0u64;
        info!("Streaming SQL statement: {}", select_sql);
        let rows = session.stream_query(select_sql, &mut |record| {
            bytes += record.iter().flatten().map(|v| v.len() as u64).sum::<u64>();
            sink.write_record(&record)
        })?;
        sink.finish()?;
        Ok(Throughput { rows, bytes })
    }
}

/// Runs one export partition.
pub struct ExportWorker {
    ctx: WorkerContext,
    channel: Box<dyn TransferChannel>,
}

impl ExportWorker {
    pub fn new(ctx: WorkerContext, channel: Box<dyn TransferChannel>) -> Self {
        Self { ctx, channel }
    }

    pub fn run(&self, assignment: &ExportAssignment, source: &mut dyn RecordSource) -> Result<TaskResult> {
        let start = Instant::now();
        let job = &self.ctx.job;
        info!(
            "Export partition {}/{} into {}",
            assignment.index, assignment.total, assignment.target_table
        );

        let shadow = match job.export.staging {
            ExportStaging::ShadowTables => {
                let mut session = self.ctx.sessions.open_session()?;
                Some(TemporaryTableManager::new(session.as_mut()).create_export_shadow(
                    &job.qualified_table(),
                    &job.export.temp_tables_suffix,
                    assignment.index,
                )?)
            }
            ExportStaging::Direct => None,
        };

        let stats = self
            .channel
            .export(&self.ctx, assignment.index, &assignment.target_table, source)?;
        if let Some(mut shadow) = shadow {
            shadow.advance(ShadowState::Written)?;
            self.ctx.registry.register(&job.job_id, shadow);
        }
        info!(
            "Export partition {} loaded {} records ({} bytes)",
            assignment.index, stats.rows, stats.bytes
        );
        Ok(TaskResult::success(
            job.qualified_table(),
            Direction::Export,
            Some(assignment.index),
            stats.rows,
            stats.bytes,
            start.elapsed().as_secs_f64(),
        ))
    }
}

/// Runs one import partition.
pub struct ImportWorker {
    ctx: WorkerContext,
    channel: Box<dyn TransferChannel>,
}

impl ImportWorker {
    pub fn new(ctx: WorkerContext, channel: Box<dyn TransferChannel>) -> Self {
        Self { ctx, channel }
    }

    pub fn run(&self, spec: &PartitionSpec, sink: &mut dyn RecordSink) -> Result<TaskResult> {
        let start = Instant::now();
        let job = &self.ctx.job;
        let select_sql = partition_select(job, spec);
        info!("Import partition {}/{}: {}", spec.index, spec.total, select_sql);

        let stats = self.channel.import(&self.ctx, spec.index, &select_sql, sink)?;
        info!(
            "Import partition {} unloaded {} records ({} bytes)",
            spec.index, stats.rows, stats.bytes
        );
        Ok(TaskResult::success(
            job.qualified_table(),
            Direction::Import,
            Some(spec.index),
            stats.rows,
            stats.bytes,
            start.elapsed().as_secs_f64(),
        ))
    }
}
