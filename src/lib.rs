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

//! # EDW Direct Transfer
//!
//! Bulk transfer between delimited files on local disk and a column-store
//! EDW. Each partition streams through a named pipe while the database runs a
//! single bulk load or unload statement on the other end.
//!
//! The crate follows the **Hexagonal Architecture** (Ports and Adapters):
//! `domain` holds pure types, `ports` the traits at the seams,
//! `infrastructure` the ODBC, FIFO and file adapters, and `application` the
//! worker loops and job orchestration.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ports;

#[cfg(test)]
mod testing;
