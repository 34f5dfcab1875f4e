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

//! # SQL Session Port
//!
//! The contract for talking to the EDW. The loader thread, the temporary table
//! manager and the metadata adapter only ever see these traits, so the ODBC
//! adapter and the in-memory fake used by the tests are interchangeable.

use crate::domain::entities::{Field, Record};
use crate::domain::errors::Result;

/// A single dedicated database connection.
///
/// `Send` because a session is handed over to a loader thread and released
/// there. Dropping the session releases the connection.
pub trait SqlSession: Send {
    /// Executes a statement that produces no rows.
    fn execute(&mut self, sql: &str) -> Result<()>;

    /// Executes a statement with exactly one text parameter bound to `?`.
    ///
    /// Used for the bulk statements, whose NULLVALUE is bound rather than inlined.
    fn execute_with_param(&mut self, sql: &str, param: &str) -> Result<()>;

    /// Runs a query with text parameters and collects every row.
    ///
    /// Column values come back as the driver's raw character bytes.
    ///
    /// Intended for small catalog lookups.
    fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Record>>;

    /// Streams the rows of a query to `on_row`, returning the row count.
    fn stream_query(&mut self, sql: &str, on_row: &mut dyn FnMut(Record) -> Result<()>) -> Result<u64>;

    /// Executes a parameterised single-row statement; `None` binds NULL.
    ///
    /// Values are bound as narrow character data, byte for byte.
    fn execute_row(&mut self, sql: &str, values: &[Field]) -> Result<()>;
}

/// Hands out new sessions. Each call must yield an independent connection.
pub trait SessionFactory: Send + Sync {
    fn open_session(&self) -> Result<Box<dyn SqlSession>>;
}
