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

//! The database's own reject/log files.
//!
//! The bulk statements write their logs into a configured directory on this
//! host. That directory is prepared before a loader starts and, when an
//! upload directory is configured, copied away after the loader finishes.

use crate::domain::errors::{Result, TransferError};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Creates `dir` if needed and checks that it is a writable directory.
pub fn prepare_log_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        TransferError::Config(format!("cannot create log directory {}: {}", dir.display(), e))
    })?;
    let meta = std::fs::metadata(dir)?;
    if !meta.is_dir() {
        return Err(TransferError::Config(format!(
            "log directory {} is not a directory",
            dir.display()
        )));
    }
    if meta.permissions().readonly() {
        return Err(TransferError::Config(format!(
            "log directory {} is not writable",
            dir.display()
        )));
    }
    debug!("Log directory {} is ready", dir.display());
    Ok(())
}

/// Copies a loader's log files to durable storage.
#[derive(Debug, Clone)]
pub struct LogUploader {
    upload_dir: PathBuf,
}

impl LogUploader {
    pub fn new(upload_dir: PathBuf) -> Self {
        Self { upload_dir }
    }

    /// Copies every regular file of `log_dir` into `<upload_dir>/<task_attempt_id>/`.
    ///
    /// Returns the number of files copied.
    pub fn upload(&self, log_dir: &Path, task_attempt_id: &str) -> Result<usize> {
        let target = self.upload_dir.join(task_attempt_id);
        std::fs::create_dir_all(&target)?;
        let mut copied = 0;
        for entry in std::fs::read_dir(log_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            std::fs::copy(entry.path(), target.join(entry.file_name()))?;
            copied += 1;
        }
        info!("Uploaded {} log files from {} to {}", copied, log_dir.display(), target.display());
        Ok(copied)
    }

    /// Like `upload`, but only logs failures.
    pub fn upload_quietly(&self, log_dir: &Path, task_attempt_id: &str) {
        if let Err(e) = self.upload(log_dir, task_attempt_id) {
            warn!("Could not upload logs from {}: {}", log_dir.display(), e);
        }
    }
}
