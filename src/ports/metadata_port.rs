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

//! # Metadata Port
//!
//! Catalog lookups run before any data moves: what kind of object the target
//! is, and which columns it has.

use crate::domain::entities::ObjectKind;
use crate::domain::errors::Result;

/// `MetadataPort` answers catalog questions about the transfer target.
pub trait MetadataPort: Send + Sync {
    /// Returns the catalog type of `schema.table`, or `ObjectNotFound`.
    fn object_kind(&self, schema: Option<&str>, table: &str) -> Result<ObjectKind>;

    /// Returns the column names of `schema.table` in ordinal order.
    fn column_names(&self, schema: Option<&str>, table: &str) -> Result<Vec<String>>;
}
