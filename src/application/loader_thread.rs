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

//! # Loader Thread
//!
//! The bulk statement blocks until the database has drained (export) or
//! filled (import) the named pipe, so it runs on its own thread while the
//! worker moves records. Its error is captured, never raised on the loader
//! thread, and handed back through `join`.

use crate::domain::entities::LoaderOutcome;
use crate::domain::errors::{Result, TransferError};
use crate::infrastructure::local_storage::log_uploader::LogUploader;
use crate::ports::sql_port::SqlSession;
use crossbeam_channel::Receiver;
use log::{debug, error, info};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

/// What one loader executes.
#[derive(Debug, Clone)]
pub struct LoaderRequest {
    pub partition: u32,
    /// The bulk statement; its single `?` receives the NULL token.
    pub sql: String,
    pub null_token: String,
    pub log_dir: Option<PathBuf>,
    pub uploader: Option<LogUploader>,
    pub task_attempt_id: String,
}

/// Handle to a running bulk statement.
pub struct LoaderThread {
    partition: u32,
    handle: JoinHandle<LoaderOutcome>,
    done: Receiver<()>,
}

impl LoaderThread {
    /// Starts the statement on a new thread that owns `session`.
    pub fn spawn(session: Box<dyn SqlSession>, request: LoaderRequest) -> Result<Self> {
        let partition = request.partition;
        let (done_tx, done) = crossbeam_channel::bounded::<()>(0);
        let handle = thread::Builder::new()
            .name(format!("edw-loader-{}", partition))
            .spawn(move || {
                // dropped on exit, which disconnects `done`
                let _done = done_tx;
                run(session, request)
            })?;
        Ok(Self {
            partition,
            handle,
            done,
        })
    }

    /// Disconnects once the loader has finished, successfully or not.
    pub fn finished_signal(&self) -> &Receiver<()> {
        &self.done
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the statement and returns its outcome.
    pub fn join(self) -> LoaderOutcome {
        match self.handle.join() {
            Ok(outcome) => outcome,
            Err(_) => LoaderOutcome::Failed(TransferError::Sql(format!(
                "loader thread for partition {} panicked",
                self.partition
            ))),
        }
    }
}

fn run(mut session: Box<dyn SqlSession>, request: LoaderRequest) -> LoaderOutcome {
    info!("Executing SQL statement: {}", request.sql);
    let outcome = match session.execute_with_param(&request.sql, &request.null_token) {
        Ok(()) => {
            debug!("Loader for partition {} completed", request.partition);
            LoaderOutcome::Succeeded
        }
        Err(e) => {
            error!("Saving SQL error from loader thread: {}", e);
            LoaderOutcome::Failed(e)
        }
    };
    // the connection goes back before the logs are copied
    drop(session);

    if let (Some(uploader), Some(log_dir)) = (&request.uploader, &request.log_dir) {
        uploader.upload_quietly(log_dir, &request.task_attempt_id);
    }
    outcome
}
