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

//! Core error definitions for the direct transfer engine.
//!
//! This module provides a centralized `TransferError` enum and a `Result` type
//! used throughout the crate. Every fatal condition (configuration, pipe I/O,
//! loader SQL failures) ends up here and is propagated to the task boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Error types encountered while moving data to or from the EDW.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Object {object} is a {kind}; direct mode supports only physical tables")]
    UnsupportedObject { object: String, kind: String },

    #[error("Metadata discovery failed: {0}")]
    Metadata(String),

    #[error("Named pipe error at {}: {source}", path.display())]
    Pipe {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {secs}s waiting for the peer to open {}", path.display())]
    PipeTimeout { path: PathBuf, secs: u64 },

    #[error("Object does not exist: {0}")]
    ObjectNotFound(String),

    #[error("SQL error: {0}")]
    Sql(String),

    #[error("Loader thread for partition {partition} failed: {source}")]
    Loader {
        partition: u32,
        #[source]
        source: Box<TransferError>,
    },

    #[error("Malformed input record in {file} at line {line}: {reason}")]
    Input {
        file: String,
        line: u64,
        reason: String,
    },

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report serialization failed: {0}")]
    Report(#[from] serde_json::Error),
}

impl TransferError {
    /// True when the database reported that the target object is absent.
    ///
    /// Drop statements issued before a (re)create swallow exactly this case.
    pub fn is_object_not_found(&self) -> bool {
        matches!(self, TransferError::ObjectNotFound(_))
    }

    /// Classifies a raw driver message into `ObjectNotFound` or a generic SQL error.
    ///
    /// SQLSTATE 42S02 is the ODBC "base table or view not found" class; the
    /// message check covers drivers that report a generic state.
    pub fn from_sql_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if message.contains("42S02") || lower.contains("does not exist") {
            TransferError::ObjectNotFound(message)
        } else {
            TransferError::Sql(message)
        }
    }
}

impl From<r2d2::Error> for TransferError {
    fn from(e: r2d2::Error) -> Self {
        TransferError::Pool(e.to_string())
    }
}

/// A specialized Result type for the direct transfer engine.
pub type Result<T> = std::result::Result<T, TransferError>;
