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

//! Catalog lookups against the EDW system views.

use crate::domain::entities::ObjectKind;
use crate::domain::errors::{Result, TransferError};
use crate::ports::metadata_port::MetadataPort;
use crate::ports::sql_port::SessionFactory;
use log::debug;
use std::sync::Arc;

const SQL_OBJECT_TYPE: &str = "SELECT OBJTYPE FROM _V_OBJECTS WHERE UPPER(OBJNAME) = UPPER(?)";
const SQL_COLUMN_NAMES: &str = "SELECT ATTNAME FROM _V_RELATION_COLUMN WHERE UPPER(NAME) = UPPER(?)";
const SCHEMA_FILTER: &str = " AND UPPER(SCHEMA) = UPPER(?)";

/// Catalog names are identifiers and must be valid text.
fn catalog_text(raw: Vec<u8>) -> Result<String> {
    String::from_utf8(raw).map_err(|e| {
        TransferError::Metadata(format!(
            "catalog returned a non-text identifier {:?}",
            String::from_utf8_lossy(e.as_bytes())
        ))
    })
}

/// `MetadataPort` over the `_V_*` system views.
///
/// Every lookup borrows a session from the factory for its own duration only.
pub struct EdwMetadataAdapter {
    sessions: Arc<dyn SessionFactory>,
}

impl EdwMetadataAdapter {
    pub fn new(sessions: Arc<dyn SessionFactory>) -> Self {
        Self { sessions }
    }

    fn lookup(
        &self,
        base: &str,
        order_by: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<Option<String>>> {
        let mut sql = base.to_string();
        let mut params = vec![table];
        if let Some(schema) = schema {
            sql.push_str(SCHEMA_FILTER);
            params.push(schema);
        }
        if let Some(order) = order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        let mut session = self.sessions.open_session()?;
        let rows = session.query(&sql, &params)?;
        rows.into_iter()
            .map(|r| r.into_iter().next().flatten().map(catalog_text).transpose())
            .collect()
    }
}

impl MetadataPort for EdwMetadataAdapter {
    fn object_kind(&self, schema: Option<&str>, table: &str) -> Result<ObjectKind> {
        let kinds = self.lookup(SQL_OBJECT_TYPE, None, schema, table)?;
        match kinds.into_iter().flatten().next() {
            Some(objtype) => {
                debug!("Catalog reports {} as {}", table, objtype);
                Ok(ObjectKind::from_catalog(&objtype))
            }
            None => Err(TransferError::ObjectNotFound(match schema {
                Some(s) => format!("{}.{}", s, table),
                None => table.to_string(),
            })),
        }
    }

    fn column_names(&self, schema: Option<&str>, table: &str) -> Result<Vec<String>> {
        let names = self.lookup(SQL_COLUMN_NAMES, Some("ATTNUM"), schema, table)?;
        Ok(names.into_iter().flatten().collect())
    }
}
