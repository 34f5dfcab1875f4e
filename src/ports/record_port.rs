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

//! # Record Ports
//!
//! The file-store side of a transfer. Export workers pull records from a
//! `RecordSource`; import workers push them into a `RecordSink`.

use crate::domain::entities::Record;
use crate::domain::errors::Result;

/// Yields the records one export worker must load.
pub trait RecordSource: Send {
    /// Next record, or `None` once the input is exhausted.
    fn next_record(&mut self) -> Result<Option<Record>>;
}

/// Receives the records one import worker unloads.
pub trait RecordSink: Send {
    fn write_record(&mut self, record: &Record) -> Result<()>;

    /// Flushes and closes the output. Called once after the last record.
    fn finish(&mut self) -> Result<()>;
}

/// Creates one source per export partition.
pub trait RecordSourceFactory: Send + Sync {
    fn open_source(&self, partition: u32, total: u32) -> Result<Box<dyn RecordSource>>;
}

/// Creates one sink per import partition.
pub trait RecordSinkFactory: Send + Sync {
    fn create_sink(&self, partition: u32) -> Result<Box<dyn RecordSink>>;
}
