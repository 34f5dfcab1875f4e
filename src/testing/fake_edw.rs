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

//! An in-memory stand-in for the EDW.
//!
//! It understands exactly the statement shapes the crate emits. Bulk load
//! and unload statements really open the named pipe, from whichever thread
//! runs them, so worker loops are exercised end to end.

use crate::domain::entities::{Field, ObjectKind, Record};
use crate::domain::errors::{Result, TransferError};
use crate::ports::sql_port::{SessionFactory, SqlSession};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

const SLICES: u32 = 4;
const ESCAPE: u8 = b'\\';

struct Row {
    slice: u32,
    values: Record,
}

struct Table {
    kind: ObjectKind,
    columns: Vec<String>,
    rows: Vec<Row>,
}

#[derive(Default)]
struct State {
    tables: BTreeMap<String, Table>,
    statements: Vec<String>,
    failures: Vec<(String, String)>,
    open_sessions: usize,
    next_slice: u32,
    rng: u64,
}

impl State {
    fn table(&self, name: &str) -> Result<&Table> {
        self.tables.get(&key(name)).ok_or_else(|| not_found(name))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables.get_mut(&key(name)).ok_or_else(|| not_found(name))
    }

    fn slice(&mut self) -> u32 {
        let s = self.next_slice;
        self.next_slice = (self.next_slice + 1) % SLICES;
        s
    }

    fn random_below(&mut self, n: u64) -> u64 {
        self.rng = self
            .rng
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.rng >> 33) % n.max(1)
    }

    fn append(&mut self, table: &str, rows: Vec<Record>) -> Result<()> {
        let slices: Vec<u32> = rows.iter().map(|_| self.slice()).collect();
        let t = self.table_mut(table)?;
        for (values, slice) in rows.into_iter().zip(slices) {
            if values.len() != t.columns.len() {
                return Err(TransferError::Sql(format!(
                    "ERROR: row has {} values, table has {} columns",
                    values.len(),
                    t.columns.len()
                )));
            }
            t.rows.push(Row { slice, values });
        }
        Ok(())
    }

    /// `SELECT <list> FROM <table> [WHERE <cond>]`.
    fn select(&self, sql: &str) -> Result<Vec<Record>> {
        let body = strip_prefix_ci(sql.trim(), "SELECT ").ok_or_else(|| unsupported(sql))?;
        let (list, rest) = split_ci(body, " FROM ").ok_or_else(|| unsupported(sql))?;
        let (table_name, filter) = match split_ci(rest, " WHERE ") {
            Some((t, f)) => (t.trim(), Some(f)),
            None => (rest.trim(), None),
        };
        let table = self.table(table_name)?;
        let projection = table.projection(list)?;
        let mut out = Vec::new();
        for row in &table.rows {
            if let Some(cond) = filter {
                if !table.matches(row, cond)? {
                    continue;
                }
            }
            out.push(projection.iter().map(|&i| row.values[i].clone()).collect());
        }
        Ok(out)
    }
}

impl Table {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name.trim()))
    }

    /// Column positions for `*`, `T.*` or a comma-separated list.
    fn projection(&self, list: &str) -> Result<Vec<usize>> {
        let list = list.trim();
        if list == "*" || list.ends_with(".*") {
            return Ok((0..self.columns.len()).collect());
        }
        list.split(',')
            .map(|c| {
                self.column_index(c)
                    .ok_or_else(|| TransferError::Sql(format!("ERROR: Attribute '{}' not found", c.trim())))
            })
            .collect()
    }

    /// Conjunctions of `MOD(DATASLICEID, n) = i` and `<col> <op> <literal>`.
    fn matches(&self, row: &Row, cond: &str) -> Result<bool> {
        for atom in cond.split(" AND ") {
            let mut atom = atom.trim();
            while atom.starts_with('(') && atom.ends_with(')') {
                atom = atom[1..atom.len() - 1].trim();
            }
            if !self.atom_matches(row, atom)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn atom_matches(&self, row: &Row, atom: &str) -> Result<bool> {
        if let Some(rest) = strip_prefix_ci(atom, "MOD(") {
            let (args, rhs) = rest.split_once(')').ok_or_else(|| unsupported(atom))?;
            let (column, n) = args.split_once(',').ok_or_else(|| unsupported(atom))?;
            let n: u64 = n.trim().parse().map_err(|_| unsupported(atom))?;
            let i: u64 = rhs.trim().trim_start_matches('=').trim().parse().map_err(|_| unsupported(atom))?;
            let value = self.value_of(row, column).and_then(|v| v.parse::<u64>().ok());
            return Ok(value.map_or(false, |v| v % n == i));
        }
        for op in [">=", "<=", "<>", "=", ">", "<"] {
            if let Some((lhs, rhs)) = atom.split_once(op) {
                let rhs = rhs.trim().trim_matches('\'');
                let Some(lhs) = self.value_of(row, lhs) else {
                    return Ok(false);
                };
                let ord = match (lhs.parse::<i64>(), rhs.parse::<i64>()) {
                    (Ok(a), Ok(b)) => a.cmp(&b),
                    _ => lhs.as_str().cmp(rhs),
                };
                return Ok(match op {
                    ">=" => ord.is_ge(),
                    "<=" => ord.is_le(),
                    "<>" => ord.is_ne(),
                    "=" => ord.is_eq(),
                    ">" => ord.is_gt(),
                    _ => ord.is_lt(),
                });
            }
        }
        Err(unsupported(atom))
    }

    fn value_of(&self, row: &Row, column: &str) -> Option<String> {
        if column.trim().eq_ignore_ascii_case("DATASLICEID") {
            return Some(row.slice.to_string());
        }
        self.column_index(column)
            .and_then(|i| row.values[i].as_deref())
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }
}

fn key(name: &str) -> String {
    name.trim().to_uppercase()
}

fn not_found(name: &str) -> TransferError {
    TransferError::from_sql_message(format!("ERROR:  Table '{}' does not exist", name.trim()))
}

fn unsupported(sql: &str) -> TransferError {
    TransferError::Sql(format!("fake EDW cannot parse: {}", sql))
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn split_ci<'a>(s: &'a str, sep: &str) -> Option<(&'a str, &'a str)> {
    let at = s.to_uppercase().find(&sep.to_uppercase())?;
    Some((&s[..at], &s[at + sep.len()..]))
}

/// Value of a bare `KEY value` option inside a USING clause.
fn option<'a>(sql: &'a str, name: &str) -> Option<&'a str> {
    let mut words = sql.split_whitespace();
    while let Some(w) = words.next() {
        if w == name {
            return words.next().map(|v| v.trim_end_matches(')'));
        }
    }
    None
}

/// The single-quoted literal following `marker`, with `''` unescaped.
fn quoted_after(sql: &str, marker: &str) -> Option<String> {
    let start = sql.find(marker)? + marker.len();
    let rest = sql[start..].trim_start().strip_prefix('\'')?;
    let mut out = String::new();
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                chars.next();
                out.push('\'');
            } else {
                return Some(out);
            }
        } else {
            out.push(c);
        }
    }
    None
}

/// Reads one record, keeping escaped newlines. The terminator is dropped.
fn read_line(reader: &mut impl BufRead, buf: &mut Vec<u8>) -> std::io::Result<bool> {
    buf.clear();
    loop {
        if reader.read_until(b'\n', buf)? == 0 {
            return Ok(!buf.is_empty());
        }
        if buf.last() != Some(&b'\n') {
            return Ok(true);
        }
        let escapes = buf[..buf.len() - 1].iter().rev().take_while(|&&b| b == ESCAPE).count();
        if escapes % 2 == 0 {
            buf.pop();
            return Ok(true);
        }
    }
}

fn parse_fields(line: &[u8], delimiter: u8, null_token: &str) -> Record {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i <= line.len() {
        if i == line.len() || line[i] == delimiter {
            let raw = &line[start..i];
            if raw == null_token.as_bytes() {
                fields.push(None);
            } else {
                let mut value = Vec::with_capacity(raw.len());
                let mut j = 0;
                while j < raw.len() {
                    if raw[j] == ESCAPE && j + 1 < raw.len() {
                        j += 1;
                    }
                    value.push(raw[j]);
                    j += 1;
                }
                fields.push(Some(value));
            }
            start = i + 1;
        } else if line[i] == ESCAPE {
            i += 1;
        }
        i += 1;
    }
    fields
}

fn format_fields(record: &Record, delimiter: u8, null_token: &str, out: &mut Vec<u8>) {
    for (i, field) in record.iter().enumerate() {
        if i > 0 {
            out.push(delimiter);
        }
        match field {
            None => out.extend_from_slice(null_token.as_bytes()),
            Some(v) => {
                if v.as_slice() == null_token.as_bytes() {
                    out.push(ESCAPE);
                }
                for &b in v {
                    if b == delimiter || b == ESCAPE || b == b'\n' || b == b'\r' {
                        out.push(ESCAPE);
                    }
                    out.push(b);
                }
            }
        }
    }
    out.push(b'\n');
}

/// Shared handle to the fake database; clones see the same tables.
#[derive(Clone, Default)]
pub struct FakeEdw {
    state: Arc<Mutex<State>>,
}

impl FakeEdw {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn create_table(&self, name: &str, kind: ObjectKind, columns: &[&str]) {
        self.lock().tables.insert(
            key(name),
            Table {
                kind,
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            },
        );
    }

    pub fn insert(&self, table: &str, values: Record) {
        self.lock().append(table, vec![values]).unwrap();
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.lock().tables.contains_key(&key(name))
    }

    pub fn rows(&self, table: &str) -> Vec<Record> {
        let state = self.lock();
        state.table(table).unwrap().rows.iter().map(|r| r.values.clone()).collect()
    }

    pub fn columns(&self, table: &str) -> Vec<String> {
        self.lock().table(table).unwrap().columns.clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    /// Every later statement containing `fragment` fails with `message`.
    pub fn fail_on(&self, fragment: &str, message: &str) {
        self.lock().failures.push((fragment.to_string(), message.to_string()));
    }

    pub fn open_sessions(&self) -> usize {
        self.lock().open_sessions
    }

    fn record(&self, sql: &str) -> Result<()> {
        let mut state = self.lock();
        state.statements.push(sql.to_string());
        match state.failures.iter().find(|(fragment, _)| sql.contains(fragment.as_str())) {
            Some((_, message)) => Err(TransferError::from_sql_message(message.clone())),
            None => Ok(()),
        }
    }

    fn run(&self, sql: &str, param: Option<&str>) -> Result<()> {
        self.record(sql)?;
        let upper = sql.trim().to_uppercase();
        if upper.starts_with("DROP TABLE ") {
            self.drop_table(sql)
        } else if upper.starts_with("CREATE EXTERNAL TABLE ") {
            self.unload(sql, param.unwrap_or("null"))
        } else if upper.starts_with("CREATE TABLE ") {
            self.create_as(sql)
        } else if upper.starts_with("ALTER TABLE ") {
            self.alter(sql)
        } else if upper.starts_with("INSERT INTO ") && upper.contains(" FROM EXTERNAL ") {
            self.load(sql, param.unwrap_or("null"))
        } else if upper.starts_with("INSERT INTO ") && upper.contains("RANDOM(") {
            self.populate(sql)
        } else if upper.starts_with("INSERT INTO ") && upper.contains(" SELECT * FROM ") {
            self.merge(sql)
        } else {
            Err(unsupported(sql))
        }
    }

    fn drop_table(&self, sql: &str) -> Result<()> {
        let name = sql.split_whitespace().nth(2).ok_or_else(|| unsupported(sql))?;
        match self.lock().tables.remove(&key(name)) {
            Some(_) => Ok(()),
            None => Err(not_found(name)),
        }
    }

    /// `CREATE TABLE s AS src WITH NO DATA`.
    fn create_as(&self, sql: &str) -> Result<()> {
        let words: Vec<&str> = sql.split_whitespace().collect();
        if words.len() < 5 || !words[3].eq_ignore_ascii_case("AS") {
            return Err(unsupported(sql));
        }
        let (shadow, source) = (words[2], words[4]);
        let mut state = self.lock();
        if state.tables.contains_key(&key(shadow)) {
            return Err(TransferError::Sql(format!("ERROR:  Table '{}' already exists", shadow)));
        }
        let columns = state.table(source)?.columns.clone();
        state.tables.insert(
            key(shadow),
            Table {
                kind: ObjectKind::Table,
                columns,
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    /// `ALTER TABLE s ADD c INTEGER` or a layout change.
    fn alter(&self, sql: &str) -> Result<()> {
        let words: Vec<&str> = sql.split_whitespace().collect();
        if words.len() < 4 {
            return Err(unsupported(sql));
        }
        let mut state = self.lock();
        let table = state.table_mut(words[2])?;
        if words[3].eq_ignore_ascii_case("ADD") {
            let column = words.get(4).ok_or_else(|| unsupported(sql))?;
            table.columns.push(column.to_string());
            for row in &mut table.rows {
                row.values.push(None);
            }
        }
        Ok(())
    }

    /// `INSERT INTO s SELECT <list>, RANDOM(0, k) AS tag FROM src [WHERE f]`.
    fn populate(&self, sql: &str) -> Result<()> {
        let shadow = sql.split_whitespace().nth(2).ok_or_else(|| unsupported(sql))?;
        let (_, select) = split_ci(sql, " SELECT ").ok_or_else(|| unsupported(sql))?;
        let (list, rest) = split_ci(select, ", RANDOM(0, ").ok_or_else(|| unsupported(sql))?;
        let (max, rest) = rest.split_once(')').ok_or_else(|| unsupported(sql))?;
        let max: u64 = max.trim().parse().map_err(|_| unsupported(sql))?;
        let (_, from) = split_ci(rest, " FROM ").ok_or_else(|| unsupported(sql))?;
        let source_select = format!("SELECT {} FROM {}", list, from);

        let mut state = self.lock();
        let mut rows = state.select(&source_select)?;
        for row in &mut rows {
            let tag = state.random_below(max + 1);
            row.push(Some(tag.to_string().into_bytes()));
        }
        state.append(shadow, rows)
    }

    /// `INSERT INTO dest SELECT * FROM a UNION ALL SELECT * FROM b ...`.
    fn merge(&self, sql: &str) -> Result<()> {
        let dest = sql.split_whitespace().nth(2).ok_or_else(|| unsupported(sql))?;
        let (_, selects) = split_ci(sql, " SELECT ").ok_or_else(|| unsupported(sql))?;
        let mut state = self.lock();
        let mut rows = Vec::new();
        for select in format!("SELECT {}", selects).split(" UNION ALL ") {
            rows.extend(state.select(select.trim())?);
        }
        state.append(dest, rows)
    }

    /// Bulk load: reads the pipe named in the statement into the target.
    fn load(&self, sql: &str, null_token: &str) -> Result<()> {
        let target = sql.split_whitespace().nth(2).ok_or_else(|| unsupported(sql))?;
        let path = PathBuf::from(quoted_after(sql, "EXTERNAL").ok_or_else(|| unsupported(sql))?);
        let delimiter: u8 = option(sql, "DELIMITER")
            .and_then(|d| d.parse().ok())
            .ok_or_else(|| unsupported(sql))?;
        let max_errors: usize = option(sql, "MAXERRORS").and_then(|m| m.parse().ok()).unwrap_or(1);
        let log_dir = quoted_after(sql, "LOGDIR").map(PathBuf::from);

        let arity = {
            let state = self.lock();
            let table = state.table(target)?;
            if table.kind != ObjectKind::Table {
                return Err(TransferError::Sql(format!("ERROR:  {} is not a table", target)));
            }
            table.columns.len()
        };

        let file = File::open(&path).map_err(|e| TransferError::Sql(format!("ERROR: cannot open {}: {}", path.display(), e)))?;
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut good = Vec::new();
        let mut bad = Vec::new();
        while read_line(&mut reader, &mut buf).map_err(|e| TransferError::Sql(e.to_string()))? {
            let fields = parse_fields(&buf, delimiter, null_token);
            if fields.len() == arity {
                good.push(fields);
            } else {
                bad.push(buf.clone());
                if bad.len() >= max_errors {
                    drop(reader);
                    self.write_logs(log_dir.as_ref(), target, good.len(), &bad);
                    return Err(TransferError::Sql(format!(
                        "ERROR:  External Table : count of bad input rows reached maxerrors limit ({})",
                        max_errors
                    )));
                }
            }
        }
        drop(reader);
        self.write_logs(log_dir.as_ref(), target, good.len(), &bad);
        self.lock().append(target, good)
    }

    fn write_logs(&self, log_dir: Option<&PathBuf>, table: &str, loaded: usize, bad: &[Vec<u8>]) {
        let Some(dir) = log_dir else { return };
        let name = key(table);
        let summary = format!("loaded {} rows, rejected {} rows\n", loaded, bad.len());
        std::fs::write(dir.join(format!("{}.nzlog", name)), summary).unwrap();
        if !bad.is_empty() {
            std::fs::write(dir.join(format!("{}.nzbad", name)), bad.join(&b'\n')).unwrap();
        }
    }

    /// Bulk unload: writes the result of the statement's SELECT into the pipe.
    fn unload(&self, sql: &str, null_token: &str) -> Result<()> {
        let path = PathBuf::from(quoted_after(sql, "EXTERNAL TABLE").ok_or_else(|| unsupported(sql))?);
        let delimiter: u8 = option(sql, "DELIMITER")
            .and_then(|d| d.parse().ok())
            .ok_or_else(|| unsupported(sql))?;
        let (_, select) = split_ci(sql, ") AS ").ok_or_else(|| unsupported(sql))?;
        let rows = self.lock().select(select)?;

        let file = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| TransferError::Sql(format!("ERROR: cannot open {}: {}", path.display(), e)))?;
        let mut writer = BufWriter::new(file);
        let mut buf = Vec::new();
        for row in &rows {
            buf.clear();
            format_fields(row, delimiter, null_token, &mut buf);
            writer
                .write_all(&buf)
                .map_err(|e| TransferError::Sql(format!("ERROR: unload aborted: {}", e)))?;
        }
        writer
            .flush()
            .map_err(|e| TransferError::Sql(format!("ERROR: unload aborted: {}", e)))
    }

    fn catalog(&self, sql: &str, params: &[&str]) -> Result<Vec<Record>> {
        let name = match params {
            [table] => table.to_string(),
            [table, schema, ..] => format!("{}.{}", schema, table),
            [] => return Err(unsupported(sql)),
        };
        let state = self.lock();
        let Some(table) = state.tables.get(&key(&name)) else {
            return Ok(Vec::new());
        };
        if sql.contains("_V_OBJECTS") {
            let objtype = match &table.kind {
                ObjectKind::Table => "TABLE".to_string(),
                ObjectKind::View => "VIEW".to_string(),
                ObjectKind::MaterializedView => "MATERIALIZED VIEW".to_string(),
                ObjectKind::Other(o) => o.clone(),
            };
            Ok(vec![vec![Some(objtype.into_bytes())]])
        } else {
            Ok(table.columns.iter().map(|c| vec![Some(c.clone().into_bytes())]).collect())
        }
    }
}

impl SessionFactory for FakeEdw {
    fn open_session(&self) -> Result<Box<dyn SqlSession>> {
        self.lock().open_sessions += 1;
        Ok(Box::new(FakeSession { edw: self.clone() }))
    }
}

struct FakeSession {
    edw: FakeEdw,
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.edw.lock().open_sessions -= 1;
    }
}

impl SqlSession for FakeSession {
    fn execute(&mut self, sql: &str) -> Result<()> {
        self.edw.run(sql, None)
    }

    fn execute_with_param(&mut self, sql: &str, param: &str) -> Result<()> {
        self.edw.run(sql, Some(param))
    }

    fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Record>> {
        self.edw.record(sql)?;
        if sql.contains("_V_OBJECTS") || sql.contains("_V_RELATION_COLUMN") {
            return self.edw.catalog(sql, params);
        }
        if let Some(table) = strip_prefix_ci(sql.trim(), "SELECT COUNT(*) FROM ") {
            let count = self.edw.lock().table(table)?.rows.len();
            return Ok(vec![vec![Some(count.to_string().into_bytes())]]);
        }
        self.edw.lock().select(sql)
    }

    fn stream_query(&mut self, sql: &str, on_row: &mut dyn FnMut(Record) -> Result<()>) -> Result<u64> {
        self.edw.record(sql)?;
        let rows = self.edw.lock().select(sql)?;
        let count = rows.len() as u64;
        for row in rows {
            on_row(row)?;
        }
        Ok(count)
    }

    fn execute_row(&mut self, sql: &str, values: &[Field]) -> Result<()> {
        self.edw.record(sql)?;
        let table_name = sql.split_whitespace().nth(2).ok_or_else(|| unsupported(sql))?;
        let (head, _) = split_ci(sql, " VALUES ").ok_or_else(|| unsupported(sql))?;
        let mut state = self.edw.lock();
        let table = state.table(table_name)?;
        let row = match (head.find('('), head.rfind(')')) {
            (Some(open), Some(close)) => {
                let mut row = vec![None; table.columns.len()];
                for (name, value) in head[open + 1..close].split(',').zip(values) {
                    let i = table
                        .column_index(name)
                        .ok_or_else(|| TransferError::Sql(format!("ERROR: Attribute '{}' not found", name.trim())))?;
                    row[i] = value.clone();
                }
                row
            }
            _ => values.to_vec(),
        };
        state.append(table_name, vec![row])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::text_record;

    #[test]
    fn test_fake_round_trips_its_own_wire_format() {
        let mut out = Vec::new();
        let mut record = text_record(&[Some("a,b"), None, Some("null"), Some("x\ny")]);
        record.push(Some(vec![0xE9, b',', 0xA4]));
        format_fields(&record, b',', "null", &mut out);
        let mut reader = std::io::Cursor::new(out);
        let mut buf = Vec::new();
        assert!(read_line(&mut reader, &mut buf).unwrap());
        assert_eq!(parse_fields(&buf, b',', "null"), record);
    }

    #[test]
    fn test_fake_where_clauses() {
        let edw = FakeEdw::new();
        edw.create_table("T", ObjectKind::Table, &["ID", "NAME"]);
        for i in 0..8 {
            edw.insert("T", text_record(&[Some(i.to_string().as_str()), Some(format!("n{}", i).as_str())]));
        }
        let state = edw.lock();
        assert_eq!(state.select("SELECT * FROM T WHERE ID >= 6").unwrap().len(), 2);
        assert_eq!(state.select("SELECT NAME FROM T WHERE MOD(DATASLICEID, 2) = 1").unwrap().len(), 4);
        assert_eq!(
            state.select("SELECT ID FROM T WHERE MOD(DATASLICEID, 2) = 0 AND ( ID > 3 )").unwrap(),
            vec![text_record(&[Some("4")]), text_record(&[Some("6")])]
        );
    }
}
