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

//! # Temporary Table Manager
//!
//! Shadow tables serve two purposes. An import shadow is a copy of the source
//! tagged with a random partition index, so each worker can select its own
//! rows. Export shadows, one per worker, stage each worker's load until a
//! single job-level step merges them into the destination.

use crate::domain::entities::{ShadowState, TempTableDescriptor, INDEX_COLUMN};
use crate::domain::errors::{Result, TransferError};
use crate::infrastructure::edw::sql_utils;
use crate::ports::sql_port::SqlSession;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Mutex;

/// Runs shadow-table DDL and DML over one borrowed session.
pub struct TemporaryTableManager<'s> {
    session: &'s mut dyn SqlSession,
}

impl<'s> TemporaryTableManager<'s> {
    pub fn new(session: &'s mut dyn SqlSession) -> Self {
        Self { session }
    }

    /// Drops `table`; a missing table is not an error.
    pub fn drop_if_exists(&mut self, table: &str) -> Result<()> {
        match self.session.execute(&sql_utils::drop_table_sql(table)) {
            Ok(()) => {
                info!("Dropped table {}", table);
                Ok(())
            }
            Err(e) if e.is_object_not_found() => {
                debug!("Table {} does not exist, nothing to drop: {}", table, e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Drop-before-create, so a retried attempt absorbs its predecessor's table.
    fn recreate_empty_copy(&mut self, shadow: &str, source: &str) -> Result<()> {
        self.drop_if_exists(shadow)?;
        self.session
            .execute(&sql_utils::create_structural_copy_sql(shadow, source))
    }

    /// Creates the empty, partition-tagged shadow of `source`.
    pub fn create_import_shadow(
        &mut self,
        source: &str,
        suffix: &str,
        partitions: u32,
    ) -> Result<TempTableDescriptor> {
        let shadow = sql_utils::import_shadow_name(source, suffix);
        let mut descriptor = TempTableDescriptor::new(source, shadow.clone(), partitions);

        info!("Creating import shadow table {} for {}", shadow, source);
        self.recreate_empty_copy(&shadow, source)?;
        self.session
            .execute(&sql_utils::add_tag_column_sql(&shadow, INDEX_COLUMN))?;
        self.session
            .execute(&sql_utils::partition_layout_sql(&shadow, INDEX_COLUMN, partitions))?;
        descriptor.advance(ShadowState::Created)?;
        Ok(descriptor)
    }

    /// Copies every source row into the shadow with a random tag in `[0, N)`.
    ///
    /// `columns` must list all source columns in table order, or be empty.
    pub fn populate_import_shadow(
        &mut self,
        descriptor: &mut TempTableDescriptor,
        columns: &[String],
        user_filter: Option<&str>,
    ) -> Result<()> {
        let sql = sql_utils::populate_shadow_sql(
            &descriptor.shadow_table,
            &descriptor.source_table,
            columns,
            &descriptor.tag_column,
            descriptor.partitions,
            user_filter,
        );
        info!("Populating {}: {}", descriptor.shadow_table, sql);
        self.session.execute(&sql)?;
        descriptor.advance(ShadowState::Populated)?;

        let count_sql = format!("SELECT COUNT(*) FROM {}", descriptor.shadow_table);
        let rows = self.session.query(&count_sql, &[])?;
        descriptor.row_count = rows
            .first()
            .and_then(|r| r.first().cloned().flatten())
            .and_then(|c| std::str::from_utf8(&c).ok()?.trim().parse().ok());
        info!(
            "Shadow table {} holds {:?} rows",
            descriptor.shadow_table, descriptor.row_count
        );
        Ok(())
    }

    /// The per-partition select template with the `%N%` placeholder.
    pub fn parameterized_query(descriptor: &mut TempTableDescriptor, select_list: &str) -> Result<String> {
        descriptor.advance(ShadowState::Queried)?;
        Ok(sql_utils::parameterized_query(
            select_list,
            &descriptor.shadow_table,
            &descriptor.tag_column,
        ))
    }

    /// Creates worker `index`'s empty staging copy of `destination`.
    pub fn create_export_shadow(
        &mut self,
        destination: &str,
        suffix: &str,
        index: u32,
    ) -> Result<TempTableDescriptor> {
        let shadow = sql_utils::export_shadow_name(destination, suffix, index);
        let mut descriptor = TempTableDescriptor::new(destination, shadow.clone(), 1);
        info!("Creating export shadow table {} for {}", shadow, destination);
        self.recreate_empty_copy(&shadow, destination)?;
        descriptor.advance(ShadowState::Created)?;
        Ok(descriptor)
    }

    /// Moves every export shadow into `destination` in one statement.
    ///
    /// Every shadow must have been fully written by its worker.
    pub fn merge_export_shadows(&mut self, destination: &str, shadows: &[TempTableDescriptor]) -> Result<()> {
        if shadows.is_empty() {
            debug!("No export shadows to merge into {}", destination);
            return Ok(());
        }
        if let Some(unwritten) = shadows.iter().find(|d| d.state() != ShadowState::Written) {
            return Err(TransferError::Config(format!(
                "shadow table {} is {:?}, not written; refusing to merge into {}",
                unwritten.shadow_table,
                unwritten.state(),
                destination
            )));
        }
        let names: Vec<String> = shadows.iter().map(|d| d.shadow_table.clone()).collect();
        let sql = sql_utils::merge_shadows_sql(destination, &names);
        info!("Merging {} shadow tables into {}", shadows.len(), destination);
        self.session.execute(&sql)
    }

    /// Drops a shadow table and closes its lifecycle.
    pub fn drop_shadow(&mut self, descriptor: &mut TempTableDescriptor) -> Result<()> {
        self.drop_if_exists(&descriptor.shadow_table)?;
        descriptor.advance(ShadowState::Dropped)
    }
}

/// Shadow tables created on behalf of each running job.
///
/// Keyed by job id, so concurrent jobs in one process never see each
/// other's tables. A job's entry is taken exactly once, by its completion hook.
#[derive(Debug, Default)]
pub struct ShadowTableRegistry {
    jobs: Mutex<HashMap<String, Vec<TempTableDescriptor>>>,
}

impl ShadowTableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a shadow; a later registration of the same table replaces it.
    pub fn register(&self, job_id: &str, descriptor: TempTableDescriptor) {
        let mut jobs = self.jobs.lock().unwrap_or_else(|p| p.into_inner());
        let tables = jobs.entry(job_id.to_string()).or_default();
        match tables.iter_mut().find(|d| d.shadow_table == descriptor.shadow_table) {
            Some(existing) => *existing = descriptor,
            None => tables.push(descriptor),
        }
    }

    /// Removes and returns the job's shadows, sorted by table name.
    pub fn take(&self, job_id: &str) -> Vec<TempTableDescriptor> {
        let mut jobs = self.jobs.lock().unwrap_or_else(|p| p.into_inner());
        let mut tables = jobs.remove(job_id).unwrap_or_default();
        tables.sort_by(|a, b| a.shadow_table.cmp(&b.shadow_table));
        tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ObjectKind;
    use crate::ports::sql_port::SessionFactory;
    use crate::testing::{text_record, FakeEdw};

    fn edw_with_foo() -> FakeEdw {
        let edw = FakeEdw::new();
        edw.create_table("FOO", ObjectKind::Table, &["ID", "NAME"]);
        for i in 0..10 {
            edw.insert("FOO", text_record(&[Some(i.to_string().as_str()), Some(format!("n{}", i).as_str())]));
        }
        edw
    }

    #[test]
    fn test_import_shadow_create_is_idempotent() {
        let edw = edw_with_foo();
        let mut session = edw.open_session().unwrap();
        let mut manager = TemporaryTableManager::new(session.as_mut());

        let first = manager.create_import_shadow("FOO", "_temp", 3).unwrap();
        // a retried attempt finds the first attempt's table and replaces it
        let second = manager.create_import_shadow("FOO", "_temp", 3).unwrap();
        assert_eq!(first.shadow_table, "FOO_temp");
        assert_eq!(second.state(), ShadowState::Created);
        assert_eq!(edw.columns("FOO_temp"), vec!["ID", "NAME", "index_column"]);
    }

    #[test]
    fn test_populate_tags_every_row_within_range() {
        let edw = edw_with_foo();
        let mut session = edw.open_session().unwrap();
        let mut manager = TemporaryTableManager::new(session.as_mut());

        let mut shadow = manager.create_import_shadow("FOO", "_temp", 3).unwrap();
        manager
            .populate_import_shadow(&mut shadow, &["ID".into(), "NAME".into()], None)
            .unwrap();
        assert_eq!(shadow.row_count, Some(10));

        let rows = edw.rows("FOO_temp");
        assert_eq!(rows.len(), 10);
        for row in rows {
            let tag: u32 = std::str::from_utf8(row[2].as_deref().unwrap()).unwrap().parse().unwrap();
            assert!(tag < 3);
        }

        let template = TemporaryTableManager::parameterized_query(&mut shadow, "ID, NAME").unwrap();
        assert_eq!(template, "SELECT ID, NAME FROM FOO_temp WHERE index_column = %N%");
        assert_eq!(shadow.state(), ShadowState::Queried);
    }

    #[test]
    fn test_drop_missing_table_is_swallowed_other_errors_propagate() {
        let edw = edw_with_foo();
        let mut session = edw.open_session().unwrap();
        let mut manager = TemporaryTableManager::new(session.as_mut());
        manager.drop_if_exists("NOPE").unwrap();

        edw.fail_on("DROP TABLE FOO", "ERROR: permission denied");
        assert!(manager.drop_if_exists("FOO").is_err());
    }

    #[test]
    fn test_merge_export_shadows() {
        let edw = FakeEdw::new();
        edw.create_table("DEST", ObjectKind::Table, &["ID"]);
        let mut session = edw.open_session().unwrap();
        let mut manager = TemporaryTableManager::new(session.as_mut());

        let mut shadows = Vec::new();
        for i in 0..2 {
            let mut d = manager.create_export_shadow("DEST", "_temp_", i).unwrap();
            edw.insert(&d.shadow_table, text_record(&[Some(i.to_string().as_str())]));
            d.advance(ShadowState::Written).unwrap();
            shadows.push(d);
        }
        manager.merge_export_shadows("DEST", &shadows).unwrap();
        assert_eq!(edw.rows("DEST").len(), 2);
        assert!(edw
            .statements()
            .contains(&"INSERT INTO DEST SELECT * FROM DEST_temp_0 UNION ALL SELECT * FROM DEST_temp_1".to_string()));

        for shadow in &mut shadows {
            manager.drop_shadow(shadow).unwrap();
            assert_eq!(shadow.state(), ShadowState::Dropped);
        }
        assert!(!edw.has_table("DEST_temp_0"));
    }

    #[test]
    fn test_merge_refuses_unwritten_shadow() {
        let edw = FakeEdw::new();
        edw.create_table("DEST", ObjectKind::Table, &["ID"]);
        let mut session = edw.open_session().unwrap();
        let mut manager = TemporaryTableManager::new(session.as_mut());

        let created = manager.create_export_shadow("DEST", "_temp_", 0).unwrap();
        let err = manager.merge_export_shadows("DEST", &[created]).unwrap_err();
        assert!(err.to_string().contains("not written"), "got {}", err);
        assert!(!edw.statements().iter().any(|s| s.starts_with("INSERT INTO DEST")));
    }

    #[test]
    fn test_registry_takes_once_per_job() {
        let shadow = |name: &str| TempTableDescriptor::new("FOO", name.to_string(), 1);
        let names = |tables: Vec<TempTableDescriptor>| -> Vec<String> {
            tables.into_iter().map(|d| d.shadow_table).collect()
        };
        let registry = ShadowTableRegistry::new();
        registry.register("job_a", shadow("FOO_temp_1"));
        registry.register("job_a", shadow("FOO_temp_0"));
        let mut written = shadow("FOO_temp_0");
        written.advance(ShadowState::Created).unwrap();
        written.advance(ShadowState::Written).unwrap();
        registry.register("job_a", written);
        registry.register("job_b", shadow("BAR_temp"));

        let job_a = registry.take("job_a");
        assert_eq!(job_a[0].state(), ShadowState::Written);
        assert_eq!(names(job_a), vec!["FOO_temp_0", "FOO_temp_1"]);
        assert!(registry.take("job_a").is_empty());
        assert_eq!(names(registry.take("job_b")), vec!["BAR_temp"]);
    }
}
