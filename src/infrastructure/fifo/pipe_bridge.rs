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

//! # Pipe Bridge
//!
//! A named pipe on local disk is the rendezvous point between a worker's
//! record loop and the database's bulk statement. No lock is involved: the
//! kernel blocks each `open` until the opposite end is opened too.
//!
//! If the peer never opens (for example the bulk statement fails to parse),
//! an unbounded open blocks forever. `open_timeout` bounds that wait when the
//! job configures it.

use crate::domain::errors::{Result, TransferError};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, warn};
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::os::unix::io::IntoRawFd;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Basename of the FIFO inside a task's working directory.
pub const PIPE_BASENAME: &str = "edw";

const RELEASE_ATTEMPTS: u32 = 100;
const RELEASE_POLL: Duration = Duration::from_millis(20);

/// Deterministic pipe path for one partition of a task.
pub fn pipe_path(task_dir: &Path, partition: u32) -> PathBuf {
    task_dir.join(format!("{}-{}.txt", PIPE_BASENAME, partition))
}

/// Which end of the pipe a caller holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeEnd {
    Read,
    Write,
}

/// Observable state of the pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeHandle {
    pub path: PathBuf,
    pub created: bool,
    pub write_open: bool,
    pub read_open: bool,
}

/// Owns one named pipe for the lifetime of a task.
///
/// The FIFO is removed when the bridge is dropped, whatever the outcome.
#[derive(Debug)]
pub struct PipeBridge {
    handle: PipeHandle,
    open_timeout: Option<Duration>,
}

impl PipeBridge {
    /// Creates the FIFO at `path`. An existing FIFO is reused; any other kind
    /// of existing entry is an error.
    pub fn create(path: impl Into<PathBuf>, open_timeout: Option<Duration>) -> Result<Self> {
        let path = path.into();
        let pipe_err = |source: io::Error| TransferError::Pipe {
            path: path.clone(),
            source,
        };

        match std::fs::symlink_metadata(&path) {
            Ok(meta) if meta.file_type().is_fifo() => {
                debug!("Reusing existing FIFO {}", path.display());
            }
            Ok(_) => {
                return Err(pipe_err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "path exists and is not a named pipe",
                )))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(pipe_err)?;
                }
                nix::unistd::mkfifo(&path, Mode::S_IRUSR | Mode::S_IWUSR)
                    .map_err(|errno| pipe_err(io::Error::from(errno)))?;
                debug!("Created FIFO {}", path.display());
            }
            Err(e) => return Err(pipe_err(e)),
        }

        Ok(Self {
            handle: PipeHandle {
                path,
                created: true,
                write_open: false,
                read_open: false,
            },
            open_timeout,
        })
    }

    pub fn path(&self) -> &Path {
        &self.handle.path
    }

    pub fn handle(&self) -> &PipeHandle {
        &self.handle
    }

    /// Opens the write end. Blocks until a reader opens the pipe.
    ///
    /// `peer_done` disconnects when the party expected to open the other end
    /// has finished; the open then returns instead of blocking forever.
    pub fn open_write(&mut self, peer_done: &Receiver<()>) -> Result<File> {
        let file = self.open_end(PipeEnd::Write, peer_done)?;
        self.handle.write_open = true;
        Ok(file)
    }

    /// Opens the read end. Blocks until a writer opens the pipe.
    pub fn open_read(&mut self, peer_done: &Receiver<()>) -> Result<File> {
        let file = self.open_end(PipeEnd::Read, peer_done)?;
        self.handle.read_open = true;
        Ok(file)
    }

    /// Closes an end explicitly so that close errors can be observed.
    ///
    /// Close errors are logged, never returned: by the time an end is closed
    /// the transfer has already succeeded or failed on its own.
    pub fn close(&mut self, file: File, end: PipeEnd) {
        if let Err(e) = nix::unistd::close(file.into_raw_fd()) {
            warn!("Error closing FIFO {} ({:?} end): {}", self.path().display(), end, e);
        }
        match end {
            PipeEnd::Read => self.handle.read_open = false,
            PipeEnd::Write => self.handle.write_open = false,
        }
    }

    fn open_end(&self, end: PipeEnd, peer_done: &Receiver<()>) -> Result<File> {
        let path = self.handle.path.clone();
        let pipe_err = |source: io::Error| TransferError::Pipe {
            path: path.clone(),
            source,
        };

        let (tx, opened) = crossbeam_channel::bounded(1);
        let opener_path = path.clone();
        thread::Builder::new()
            .name("pipe-open".to_string())
            .spawn(move || {
                // the receiver may be gone after a timeout; the file is then dropped
                let _ = tx.send(open_blocking(&opener_path, end));
            })
            .map_err(pipe_err)?;

        let deadline = match self.open_timeout {
            Some(timeout) => crossbeam_channel::after(timeout),
            None => crossbeam_channel::never(),
        };

        crossbeam_channel::select! {
            recv(opened) -> result => match result {
                Ok(file) => file.map_err(pipe_err),
                Err(_) => Err(pipe_err(opener_vanished())),
            },
            recv(peer_done) -> _ => {
                debug!("Peer of {} finished before opening it", path.display());
                match release_opener(&path, end, &opened) {
                    Some(file) => file.map_err(pipe_err),
                    None => Err(pipe_err(opener_vanished())),
                }
            },
            recv(deadline) -> _ => {
                if release_opener(&path, end, &opened).is_none() {
                    warn!("Pending open on {} could not be released", path.display());
                }
                Err(TransferError::PipeTimeout {
                    path: path.clone(),
                    secs: self.open_timeout.map(|t| t.as_secs()).unwrap_or_default(),
                })
            },
        }
    }
}

impl Drop for PipeBridge {
    fn drop(&mut self) {
        if self.handle.created {
            match std::fs::remove_file(&self.handle.path) {
                Ok(()) => debug!("Removed FIFO {}", self.handle.path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove FIFO {}: {}", self.handle.path.display(), e),
            }
            self.handle.created = false;
        }
    }
}

fn open_blocking(path: &Path, end: PipeEnd) -> io::Result<File> {
    match end {
        PipeEnd::Read => File::open(path),
        PipeEnd::Write => OpenOptions::new().write(true).open(path),
    }
}

/// Opens the end opposite to `end` without blocking and drops it at once.
fn open_peer_nonblocking(path: &Path, end: PipeEnd) -> io::Result<()> {
    let mut options = OpenOptions::new();
    match end {
        PipeEnd::Write => options.read(true),
        PipeEnd::Read => options.write(true),
    };
    options.custom_flags(OFlag::O_NONBLOCK.bits()).open(path).map(drop)
}

/// Unblocks the helper thread stuck in `open()` and collects its result.
///
/// The helper may not have entered `open()` yet, so the peer open is retried
/// until it reports back.
fn release_opener(path: &Path, end: PipeEnd, opened: &Receiver<io::Result<File>>) -> Option<io::Result<File>> {
    for _ in 0..RELEASE_ATTEMPTS {
        if let Err(e) = open_peer_nonblocking(path, end) {
            debug!("Peer open on {} not accepted yet: {}", path.display(), e);
        }
        match opened.recv_timeout(RELEASE_POLL) {
            Ok(result) => return Some(result),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
    warn!(
        "Could not release the pending open of {} after {} attempts; its opener thread stays blocked",
        path.display(),
        RELEASE_ATTEMPTS
    );
    None
}

fn opener_vanished() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "pipe opener thread exited")
}
