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

//! Test support: an in-memory EDW and job fixtures.

mod fake_edw;

pub use fake_edw::FakeEdw;

use crate::domain::delimiters::{DelimiterFormat, RequestedFormat};
use crate::domain::entities::{
    ChannelKind, Direction, DirectOptions, ExportSettings, ExportStaging, ImportPartitioning, ImportSettings,
    InputLayout, JobSpec, Record,
};
use log::{Level, LevelFilter, Log, Metadata};
use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::Once;

/// Builds a record from text values.
pub fn text_record(values: &[Option<&str>]) -> Record {
    values.iter().map(|v| v.map(|s| s.as_bytes().to_vec())).collect()
}

thread_local! {
    static CAPTURED: RefCell<Option<Vec<(Level, String)>>> = const { RefCell::new(None) };
}

/// Records log lines emitted by a thread while it is capturing.
struct ThreadCapture;

impl Log for ThreadCapture {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        CAPTURED.with(|c| {
            if let Some(lines) = c.borrow_mut().as_mut() {
                lines.push((record.level(), record.args().to_string()));
            }
        });
    }

    fn flush(&self) {}
}

static CAPTURE: ThreadCapture = ThreadCapture;
static INSTALL: Once = Once::new();

/// Runs `f` and returns its value with everything it logged on this thread.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, Vec<(Level, String)>) {
    INSTALL.call_once(|| {
        if log::set_logger(&CAPTURE).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
    CAPTURED.with(|c| *c.borrow_mut() = Some(Vec::new()));
    let value = f();
    let lines = CAPTURED.with(|c| c.borrow_mut().take()).unwrap_or_default();
    (value, lines)
}

/// A two-partition virtual-column import of `table` with default formatting.
///
/// Tests that open pipes must point `work_dir` at their own temp directory.
pub fn sample_job(table: &str) -> JobSpec {
    let format = DelimiterFormat::resolve(&RequestedFormat {
        escaped_by: Some(b'\\'),
        ..Default::default()
    })
    .unwrap();
    JobSpec {
        job_id: "job_test".to_string(),
        direction: Direction::Import,
        table: table.to_string(),
        schema: None,
        columns: Vec::new(),
        where_clause: None,
        partitions: 2,
        attempt: 0,
        work_dir: std::env::temp_dir().join("edw-direct-tests"),
        pipe_open_timeout: None,
        format,
        direct: DirectOptions::default(),
        channel: ChannelKind::Direct,
        import: ImportSettings {
            partitioning: ImportPartitioning::Virtual,
            temp_table_suffix: "_temp".to_string(),
            delete_temp_table: true,
            output_dir: PathBuf::new(),
            compress: false,
        },
        export: ExportSettings {
            staging: ExportStaging::Direct,
            temp_tables_suffix: "_temp_".to_string(),
            delete_temp_tables: true,
            input_dir: PathBuf::new(),
            input: InputLayout {
                delimiter: b',',
                escaped_by: Some(b'\\'),
                enclosed_by: None,
            },
        },
    }
}
