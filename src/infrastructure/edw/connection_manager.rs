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

use odbc_api::{Connection, ConnectionOptions, Environment};
use r2d2::ManageConnection;
use std::ops::Deref;
use std::sync::OnceLock;

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

/// Process-wide ODBC environment. Connections borrow it for `'static`.
fn environment() -> Result<&'static Environment, odbc_api::Error> {
    if let Some(env) = ENVIRONMENT.get() {
        return Ok(env);
    }
    let env = Environment::new()?;
    Ok(ENVIRONMENT.get_or_init(|| env))
}

/// A pooled ODBC connection bound to the process-wide environment.
pub struct EdwConnection(Connection<'static>);

impl Deref for EdwConnection {
    type Target = Connection<'static>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// R2D2 connection manager for the EDW's ODBC driver.
#[derive(Debug)]
pub struct EdwConnectionManager {
    connection_string: String,
}

impl EdwConnectionManager {
    pub fn new(connection_string: &str) -> Self {
        Self {
            connection_string: connection_string.to_string(),
        }
    }
}

impl ManageConnection for EdwConnectionManager {
    type Connection = EdwConnection;
    type Error = odbc_api::Error;

    fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        environment()?
            .connect_with_connection_string(&self.connection_string, ConnectionOptions::default())
            .map(EdwConnection)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        // a dead connection surfaces as an error on the next statement anyway
        conn.is_dead().map(|_| ())
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_dead().unwrap_or(true)
    }
}
