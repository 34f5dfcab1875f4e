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

//! # Partition Assigner
//!
//! Decides which rows each import worker pulls and where each export worker
//! loads. Two strategies exist for import: a predicate over the EDW's built-in
//! shard identifier, or a query over a physical shadow table that was tagged
//! with a partition index beforehand.

use crate::domain::entities::{
    ExportAssignment, ExportStaging, JobSpec, PartitionPredicate, PartitionSpec, PARTITION_PLACEHOLDER,
};
use crate::domain::errors::{Result, TransferError};
use crate::infrastructure::edw::sql_utils;

/// Produces the `PartitionSpec` of one import worker.
pub trait PartitionStrategy: Send + Sync {
    fn partition(&self, job: &JobSpec, index: u32) -> Result<PartitionSpec>;
}

fn check_index(job: &JobSpec, index: u32) -> Result<()> {
    if job.partitions == 0 || index >= job.partitions {
        return Err(TransferError::Config(format!(
            "partition index {} is outside [0, {})",
            index, job.partitions
        )));
    }
    Ok(())
}

/// `MOD(DATASLICEID, N) = i`. Has no side effects on the database.
#[derive(Debug, Default, Clone, Copy)]
pub struct VirtualColumnStrategy;

impl PartitionStrategy for VirtualColumnStrategy {
    fn partition(&self, job: &JobSpec, index: u32) -> Result<PartitionSpec> {
        check_index(job, index)?;
        Ok(PartitionSpec {
            index,
            total: job.partitions,
            predicate: PartitionPredicate::VirtualColumn {
                expression: sql_utils::virtual_partition_expression(job.partitions, index),
            },
        })
    }
}

/// Per-partition queries over a populated shadow table.
#[derive(Debug, Clone)]
pub struct TempTableStrategy {
    shadow_table: String,
    query_template: String,
}

impl TempTableStrategy {
    /// `query_template` must contain the partition placeholder.
    pub fn new(shadow_table: String, query_template: String) -> Result<Self> {
        if !query_template.contains(PARTITION_PLACEHOLDER) {
            return Err(TransferError::Config(format!(
                "partition query template lacks {}: {}",
                PARTITION_PLACEHOLDER, query_template
            )));
        }
        Ok(Self {
            shadow_table,
            query_template,
        })
    }
}

impl PartitionStrategy for TempTableStrategy {
    fn partition(&self, job: &JobSpec, index: u32) -> Result<PartitionSpec> {
        check_index(job, index)?;
        Ok(PartitionSpec {
            index,
            total: job.partitions,
            predicate: PartitionPredicate::PhysicalShard {
                shadow_table: self.shadow_table.clone(),
                query: substitute_partition(&self.query_template, index),
            },
        })
    }
}

/// Replaces every placeholder in `template` with `index`, verbatim.
pub fn substitute_partition(template: &str, index: u32) -> String {
    template.replace(PARTITION_PLACEHOLDER, &index.to_string())
}

/// The SELECT an import worker runs for its partition.
///
/// A shadow-table query already carries the user filter, which was applied
/// when the shadow was populated.
pub fn partition_select(job: &JobSpec, spec: &PartitionSpec) -> String {
    match &spec.predicate {
        PartitionPredicate::VirtualColumn { expression } => sql_utils::build_partition_select(
            &job.select_list(),
            &job.qualified_table(),
            expression,
            job.where_clause.as_deref(),
        ),
        PartitionPredicate::PhysicalShard { query, .. } => query.clone(),
    }
}

/// Target table of export worker `index`.
pub fn assign_export(job: &JobSpec, index: u32) -> Result<ExportAssignment> {
    check_index(job, index)?;
    let target_table = match job.export.staging {
        ExportStaging::Direct => job.qualified_table(),
        ExportStaging::ShadowTables => {
            sql_utils::export_shadow_name(&job.qualified_table(), &job.export.temp_tables_suffix, index)
        }
    };
    Ok(ExportAssignment {
        index,
        total: job.partitions,
        target_table,
    })
}
