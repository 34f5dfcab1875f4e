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

//! Utility functions for generating EDW SQL text.
//!
//! Every statement this crate sends to the database is built here: the bulk
//! load/unload statements bound to a named pipe, per-partition selects, and
//! the shadow-table DDL used for physical partitioning and staged export.

use crate::domain::delimiters::DelimiterFormat;
use crate::domain::entities::{DirectOptions, PARTITION_PLACEHOLDER, SHARD_ID_COLUMN};
use std::path::Path;

/// Quotes a filesystem path as an SQL string literal.
fn quote_path(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', "''"))
}

/// Format options shared by load and unload statements.
///
/// The delimiter is given in base 10 so that control characters survive.
/// NULLVALUE is always the single bound parameter of the statement.
fn common_options(format: &DelimiterFormat, direct: &DirectOptions, boolstyle: &str) -> Vec<String> {
    vec![
        "REMOTESOURCE 'ODBC'".to_string(),
        format!("BOOLSTYLE '{}'", boolstyle),
        "CRINSTRING FALSE".to_string(),
        format!("DELIMITER {}", format.field_delimiter()),
        "ENCODING 'internal'".to_string(),
        format!("ESCAPECHAR '{}'", format.escape() as char),
        "FORMAT 'text'".to_string(),
        "INCLUDEZEROSECONDS TRUE".to_string(),
        "NULLVALUE ?".to_string(),
        format!("MAXERRORS {}", direct.max_errors),
    ]
}

fn push_log_dir(options: &mut Vec<String>, direct: &DirectOptions) {
    if let Some(dir) = &direct.log_dir {
        let dir = dir.display().to_string();
        if !dir.trim().is_empty() {
            options.push(format!("LOGDIR {}", quote_path(Path::new(dir.trim()))));
        }
    }
}

/// Builds the export statement: the database reads the pipe into `target_table`.
pub fn build_bulk_load_sql(
    target_table: &str,
    pipe_path: &Path,
    format: &DelimiterFormat,
    direct: &DirectOptions,
) -> String {
    let mut options = common_options(format, direct, "TRUE_FALSE");
    push_log_dir(&mut options, direct);
    format!(
        "INSERT INTO {} SELECT * FROM EXTERNAL {} USING ({})",
        target_table,
        quote_path(pipe_path),
        options.join(" ")
    )
}

/// Builds the import statement: the database writes the result of `select_sql`
/// into the pipe.
pub fn build_bulk_unload_sql(
    pipe_path: &Path,
    format: &DelimiterFormat,
    direct: &DirectOptions,
    select_sql: &str,
) -> String {
    let mut options = common_options(format, direct, "T_F");
    options.push(format!("CTRLCHARS {}", direct.ctrl_chars));
    push_log_dir(&mut options, direct);
    format!(
        "CREATE EXTERNAL TABLE {} USING ({}) AS {}",
        quote_path(pipe_path),
        options.join(" "),
        select_sql
    )
}

/// `MOD(DATASLICEID, n) = i`.
pub fn virtual_partition_expression(partitions: u32, index: u32) -> String {
    format!("MOD({}, {}) = {}", SHARD_ID_COLUMN, partitions, index)
}

/// Conjoins a partition predicate with an optional user filter.
pub fn conjoin_filter(predicate: &str, user_filter: Option<&str>) -> String {
    match user_filter.map(str::trim).filter(|f| !f.is_empty()) {
        Some(filter) => format!("{} AND ( {} )", predicate, filter),
        None => predicate.to_string(),
    }
}

/// `SELECT <cols> FROM <table> WHERE <predicate> [AND ( <filter> )]`.
pub fn build_partition_select(
    select_list: &str,
    qualified_table: &str,
    predicate: &str,
    user_filter: Option<&str>,
) -> String {
    format!(
        "SELECT {} FROM {} WHERE {}",
        select_list,
        qualified_table,
        conjoin_filter(predicate, user_filter)
    )
}

pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE {}", table)
}

/// Empty structural copy of `source`.
pub fn create_structural_copy_sql(shadow: &str, source: &str) -> String {
    format!("CREATE TABLE {} AS {} WITH NO DATA", shadow, source)
}

pub fn add_tag_column_sql(shadow: &str, tag_column: &str) -> String {
    format!("ALTER TABLE {} ADD {} INTEGER", shadow, tag_column)
}

/// Physical layout of an import shadow: one range partition per worker.
pub fn partition_layout_sql(shadow: &str, tag_column: &str, partitions: u32) -> String {
    format!(
        "ALTER TABLE {shadow} MODIFY PRIMARY INDEX( {tag} ) PARTITION BY RANGE_N( CAST( \
         ( {tag} MOD {n} ) AS INTEGER ) BETWEEN 0 AND {last} EACH 1 )",
        shadow = shadow,
        tag = tag_column,
        n = partitions,
        last = partitions.saturating_sub(1)
    )
}

/// Copies every source row into the shadow with a uniform random tag in `[0, n)`.
pub fn populate_shadow_sql(
    shadow: &str,
    source: &str,
    columns: &[String],
    tag_column: &str,
    partitions: u32,
    user_filter: Option<&str>,
) -> String {
    let select_list = if columns.is_empty() {
        format!("{}.*", source)
    } else {
        columns.join(", ")
    };
    let mut sql = format!(
        "INSERT INTO {} SELECT {}, RANDOM(0, {}) AS {} FROM {}",
        shadow,
        select_list,
        partitions.saturating_sub(1),
        tag_column,
        source
    );
    if let Some(filter) = user_filter.map(str::trim).filter(|f| !f.is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    sql
}

/// Per-partition select template over an import shadow.
pub fn parameterized_query(select_list: &str, shadow: &str, tag_column: &str) -> String {
    format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_list, shadow, tag_column, PARTITION_PLACEHOLDER
    )
}

/// Single statement moving every export shadow into the destination.
pub fn merge_shadows_sql(destination: &str, shadows: &[String]) -> String {
    let selects: Vec<String> = shadows.iter().map(|s| format!("SELECT * FROM {}", s)).collect();
    format!("INSERT INTO {} {}", destination, selects.join(" UNION ALL "))
}

/// Row-at-a-time insert used by the statement channel.
pub fn insert_row_sql(table: &str, columns: &[String], arity: usize) -> String {
    let placeholders = vec!["?"; arity].join(", ");
    if columns.is_empty() {
        format!("INSERT INTO {} VALUES ({})", table, placeholders)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        )
    }
}

pub fn import_shadow_name(table: &str, suffix: &str) -> String {
    format!("{}{}", table, suffix)
}

pub fn export_shadow_name(table: &str, suffix: &str, index: u32) -> String {
    format!("{}{}{}", table, suffix, index)
}
