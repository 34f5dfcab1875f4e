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

//! # Domain Entities
//!
//! The nouns of a transfer: the immutable job snapshot every worker receives,
//! the partition each worker owns, shadow-table descriptors, and the results
//! that flow back to the orchestrator.

use crate::domain::delimiters::DelimiterFormat;
use crate::domain::errors::{Result, TransferError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// One column value in transit, as raw bytes. `None` is SQL NULL.
///
/// Values are never decoded as text: the EDW unloads CHAR/VARCHAR in its
/// internal single-byte encoding and every byte must survive unchanged.
pub type Field = Option<Vec<u8>>;

/// One row in transit.
pub type Record = Vec<Field>;

/// Placeholder replaced by the partition index in shadow-table query templates.
pub const PARTITION_PLACEHOLDER: &str = "%N%";

/// Column added to import shadow tables to tag each row with its partition.
pub const INDEX_COLUMN: &str = "index_column";

/// Built-in per-row shard identifier exposed by the EDW.
pub const SHARD_ID_COLUMN: &str = "DATASLICEID";

/// Which way the data moves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// EDW table to local part files.
    Import,
    /// Local delimited files into an EDW table.
    Export,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Import => write!(f, "import"),
            Direction::Export => write!(f, "export"),
        }
    }
}

/// How an import divides the source table between workers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ImportPartitioning {
    /// `MOD(DATASLICEID, N) = i`; no side effects.
    #[default]
    Virtual,
    /// Physical shadow table tagged with a random partition index.
    TempTable,
}

/// Where export workers write before the data reaches the destination.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExportStaging {
    /// Every worker loads straight into the destination table.
    #[default]
    Direct,
    /// One shadow table per worker, merged by a single job-level step.
    ShadowTables,
}

/// How records cross between a worker and the database.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelKind {
    /// Named pipe plus a concurrent bulk statement.
    #[default]
    Direct,
    /// Plain parameterised statements over the session, row by row.
    Statement,
}

/// Catalog object type of the transfer target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    View,
    MaterializedView,
    Other(String),
}

impl ObjectKind {
    /// Maps the catalog's OBJTYPE text.
    pub fn from_catalog(objtype: &str) -> Self {
        match objtype.trim().to_uppercase().as_str() {
            "TABLE" => ObjectKind::Table,
            "VIEW" => ObjectKind::View,
            "MATERIALIZED VIEW" | "MVIEW" => ObjectKind::MaterializedView,
            other => ObjectKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Table => write!(f, "table"),
            ObjectKind::View => write!(f, "view"),
            ObjectKind::MaterializedView => write!(f, "materialized view"),
            ObjectKind::Other(o) => write!(f, "{}", o.to_lowercase()),
        }
    }
}

/// Database-specific knobs of the bulk statements.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectOptions {
    /// Bad rows tolerated before the bulk statement aborts.
    pub max_errors: u32,
    /// Where the database writes its own reject/log files.
    pub log_dir: Option<PathBuf>,
    /// Where those logs are copied once a loader finishes.
    pub upload_dir: Option<PathBuf>,
    /// Pass low-ASCII control characters through on unload.
    pub ctrl_chars: bool,
}

impl Default for DirectOptions {
    fn default() -> Self {
        Self {
            max_errors: 1,
            log_dir: None,
            upload_dir: None,
            ctrl_chars: false,
        }
    }
}

/// Import-only settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSettings {
    pub partitioning: ImportPartitioning,
    pub temp_table_suffix: String,
    pub delete_temp_table: bool,
    pub output_dir: PathBuf,
    pub compress: bool,
}

/// Export-only settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    pub staging: ExportStaging,
    pub temp_tables_suffix: String,
    pub delete_temp_tables: bool,
    pub input_dir: PathBuf,
    /// Layout of the local input files, independent of the wire format.
    pub input: InputLayout,
}

/// How export input files on disk are delimited.
#[derive(Debug, Clone, PartialEq)]
pub struct InputLayout {
    pub delimiter: u8,
    pub escaped_by: Option<u8>,
    /// When set, files are parsed as quoted CSV.
    pub enclosed_by: Option<u8>,
}

/// Immutable snapshot of everything a worker needs.
///
/// Built once before any worker starts and shared behind an `Arc`; workers
/// never mutate it.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub job_id: String,
    pub direction: Direction,
    pub table: String,
    pub schema: Option<String>,
    pub columns: Vec<String>,
    pub where_clause: Option<String>,
    pub partitions: u32,
    /// Attempt number of this run; names the per-task work and log directories.
    pub attempt: u32,
    pub work_dir: PathBuf,
    pub pipe_open_timeout: Option<Duration>,
    pub format: DelimiterFormat,
    pub direct: DirectOptions,
    pub channel: ChannelKind,
    pub import: ImportSettings,
    pub export: ExportSettings,
}

impl JobSpec {
    /// `schema.table` when a schema qualifier is configured.
    pub fn qualified_table(&self) -> String {
        match &self.schema {
            Some(s) => format!("{}.{}", s, self.table),
            None => self.table.clone(),
        }
    }

    /// Select list for the configured columns, `*` when none are known.
    pub fn select_list(&self) -> String {
        if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        }
    }

    /// Identifier of this attempt of one partition's task.
    pub fn task_attempt_id(&self, partition: u32) -> String {
        format!("{}_m_{:06}_{}", self.job_id, partition, self.attempt)
    }

    /// Private working directory of one task attempt.
    pub fn task_work_dir(&self, partition: u32) -> PathBuf {
        self.work_dir.join(self.task_attempt_id(partition))
    }
}

/// Rows one import worker is responsible for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionPredicate {
    /// A WHERE clause over the built-in shard identifier.
    VirtualColumn { expression: String },
    /// A complete SELECT over a physical shadow table.
    PhysicalShard { shadow_table: String, query: String },
}

/// A worker's share of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSpec {
    pub index: u32,
    pub total: u32,
    pub predicate: PartitionPredicate,
}

/// Where one export worker loads its records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportAssignment {
    pub index: u32,
    pub total: u32,
    pub target_table: String,
}

/// Lifecycle of a shadow table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowState {
    Absent,
    Created,
    Populated,
    Queried,
    Written,
    Dropped,
}

impl ShadowState {
    /// Legal moves of the shadow-table state machine.
    ///
    /// `Created` is only reachable from `Absent`; `Dropped` is terminal apart
    /// from the drop-before-recreate path back through `Absent`.
    pub fn can_transition(self, next: ShadowState) -> bool {
        use ShadowState::*;
        matches!(
            (self, next),
            (Absent, Created)
                | (Created, Populated)
                | (Populated, Queried)
                | (Queried, Queried)
                | (Populated, Dropped)
                | (Queried, Dropped)
                | (Created, Written)
                | (Written, Dropped)
                | (Created, Dropped)
                | (Dropped, Absent)
        )
    }
}

/// A shadow copy of a table used for partitioning or staged merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempTableDescriptor {
    pub source_table: String,
    pub shadow_table: String,
    pub tag_column: String,
    pub partitions: u32,
    pub row_count: Option<u64>,
    state: ShadowState,
}

impl TempTableDescriptor {
    pub fn new(source_table: &str, shadow_table: String, partitions: u32) -> Self {
        Self {
            source_table: source_table.to_string(),
            shadow_table,
            tag_column: INDEX_COLUMN.to_string(),
            partitions,
            row_count: None,
            state: ShadowState::Absent,
        }
    }

    pub fn state(&self) -> ShadowState {
        self.state
    }

    /// Moves to `next`, refusing transitions the lifecycle does not allow.
    pub fn advance(&mut self, next: ShadowState) -> Result<()> {
        if !self.state.can_transition(next) {
            return Err(TransferError::Config(format!(
                "shadow table {} cannot move from {:?} to {:?}",
                self.shadow_table, self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }
}

/// Tagged result of a loader thread, consumed once by the joining worker.
#[derive(Debug)]
pub enum LoaderOutcome {
    Succeeded,
    Failed(TransferError),
}

impl LoaderOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoaderOutcome::Succeeded)
    }

    /// Converts into a task-level result, wrapping a captured error.
    pub fn into_result(self, partition: u32) -> Result<()> {
        match self {
            LoaderOutcome::Succeeded => Ok(()),
            LoaderOutcome::Failed(e) => Err(TransferError::Loader {
                partition,
                source: Box::new(e),
            }),
        }
    }
}

/// Final state of one task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Success,
    Failed,
}

/// The report card of one worker task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub table: String,
    pub direction: Direction,
    pub partition: Option<u32>,
    /// Records moved across the pipe or statement channel.
    pub rows: u64,
    /// Wire bytes moved.
    pub bytes: u64,
    /// Seconds.
    pub duration: f64,
    pub status: TaskStatus,
    pub error: Option<String>,
}

impl TaskResult {
    /// Helper to create a successful result.
    pub fn success(
        table: String,
        direction: Direction,
        partition: Option<u32>,
        rows: u64,
        bytes: u64,
        duration: f64,
    ) -> Self {
        Self {
            table,
            direction,
            partition,
            rows,
            bytes,
            duration,
            status: TaskStatus::Success,
            error: None,
        }
    }

    /// Helper to create a failure result.
    pub fn failure(table: String, direction: Direction, partition: Option<u32>, error: String) -> Self {
        Self {
            table,
            direction,
            partition,
            rows: 0,
            bytes: 0,
            duration: 0.0,
            status: TaskStatus::Failed,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}
