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

//! ODBC-backed implementation of the `SqlSession` port.

use crate::domain::entities::{Field, Record};
use crate::domain::errors::{Result, TransferError};
use crate::infrastructure::edw::connection_manager::EdwConnectionManager;
use crate::ports::sql_port::{SessionFactory, SqlSession};
use log::{debug, info};
use odbc_api::parameter::VarCharSlice;
use odbc_api::{Cursor, IntoParameter, ResultSetMetadata};
use r2d2::{Pool, PooledConnection};
use std::time::Duration;

fn sql_error(e: odbc_api::Error) -> TransferError {
    TransferError::from_sql_message(e.to_string())
}

/// One pooled connection. Returned to the pool on drop.
pub struct OdbcSession {
    conn: PooledConnection<EdwConnectionManager>,
}

impl OdbcSession {
    fn collect_rows(
        &mut self,
        sql: &str,
        params: &[&str],
        on_row: &mut dyn FnMut(Record) -> Result<()>,
    ) -> Result<u64> {
        let params: Vec<_> = params.iter().map(|p| p.into_parameter()).collect();
        let mut count = 0u64;
        if let Some(mut cursor) = self.conn.execute(sql, params.as_slice()).map_err(sql_error)? {
            let cols = cursor.num_result_cols().map_err(sql_error)?.max(0) as u16;
            let mut buf = Vec::new();
            while let Some(mut row) = cursor.next_row().map_err(sql_error)? {
                let mut record = Vec::with_capacity(cols as usize);
                for col in 1..=cols {
                    buf.clear();
                    let present = row.get_text(col, &mut buf).map_err(sql_error)?;
                    // narrow text in the server's encoding, kept byte for byte
                    record.push(present.then(|| buf.clone()));
                }
                on_row(record)?;
                count += 1;
            }
        }
        Ok(count)
    }
}

impl SqlSession for OdbcSession {
    fn execute(&mut self, sql: &str) -> Result<()> {
        debug!("Executing: {}", sql);
        self.conn.execute(sql, ()).map(|_| ()).map_err(sql_error)
    }

    fn execute_with_param(&mut self, sql: &str, param: &str) -> Result<()> {
        debug!("Executing with 1 parameter: {}", sql);
        self.conn
            .execute(sql, &param.into_parameter())
            .map(|_| ())
            .map_err(sql_error)
    }

    fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Record>> {
        let mut rows = Vec::new();
        self.collect_rows(sql, params, &mut |r| {
            rows.push(r);
            Ok(())
        })?;
        Ok(rows)
    }

    fn stream_query(&mut self, sql: &str, on_row: &mut dyn FnMut(Record) -> Result<()>) -> Result<u64> {
        debug!("Streaming: {}", sql);
        self.collect_rows(sql, &[], on_row)
    }

    fn execute_row(&mut self, sql: &str, values: &[Field]) -> Result<()> {
        let params: Vec<VarCharSlice<'_>> = values
            .iter()
            .map(|v| v.as_deref().map_or(VarCharSlice::NULL, VarCharSlice::new))
            .collect();
        self.conn
            .execute(sql, params.as_slice())
            .map(|_| ())
            .map_err(sql_error)
    }
}

/// Hands out pooled ODBC sessions.
///
/// The pool must be sized so that each active partition can hold two
/// connections at once (loader plus metadata or cleanup).
pub struct OdbcSessionFactory {
    pool: Pool<EdwConnectionManager>,
}

impl OdbcSessionFactory {
    pub fn connect(connection_string: &str, max_size: u32, timeout: Duration) -> Result<Self> {
        info!("Creating EDW connection pool (max_size={})", max_size);
        let pool = Pool::builder()
            .max_size(max_size)
            .min_idle(Some(0))
            .connection_timeout(timeout)
            .build(EdwConnectionManager::new(connection_string))?;
        Ok(Self { pool })
    }
}

impl SessionFactory for OdbcSessionFactory {
    fn open_session(&self) -> Result<Box<dyn SqlSession>> {
        let conn = self.pool.get()?;
        Ok(Box::new(OdbcSession { conn }))
    }
}
