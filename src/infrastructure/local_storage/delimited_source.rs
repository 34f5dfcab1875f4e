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

//! Export input: delimited text files on local disk.
//!
//! Files are dealt to partitions round-robin in name order. A `.gz` suffix
//! selects transparent decompression. Files with an enclosing character are
//! parsed as quoted CSV; all others are split on the delimiter with an
//! optional escape byte.

use crate::domain::entities::{InputLayout, Record};
use crate::domain::errors::{Result, TransferError};
use crate::ports::record_port::{RecordSource, RecordSourceFactory};
use flate2::read::MultiGzDecoder;
use log::{debug, info};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

const READ_BUFFER: usize = 128 * 1024;

/// Lists the input files in `dir`, skipping hidden and `_`-prefixed entries.
pub fn list_input_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || name.starts_with('_') {
            continue;
        }
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn open_maybe_gz(path: &Path) -> Result<Box<dyn Read + Send>> {
    let file = File::open(path)?;
    if path.extension().map_or(false, |e| e == "gz") {
        Ok(Box::new(MultiGzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Splits one line on unescaped delimiters. A raw field equal to the NULL
/// token is NULL; other fields are unescaped.
fn split_escaped(line: &[u8], delimiter: u8, escape: Option<u8>, null_token: &str) -> Record {
    let mut fields = Vec::new();
    let mut raw_start = 0;
    let mut value = Vec::new();
    let mut escaped = false;
    let finish = |raw: &[u8], value: &mut Vec<u8>, fields: &mut Record| {
        if raw == null_token.as_bytes() {
            fields.push(None);
            value.clear();
        } else {
            fields.push(Some(std::mem::take(value)));
        }
    };
    for (i, &b) in line.iter().enumerate() {
        if escaped {
            value.push(b);
            escaped = false;
        } else if Some(b) == escape {
            escaped = true;
        } else if b == delimiter {
            finish(&line[raw_start..i], &mut value, &mut fields);
            raw_start = i + 1;
        } else {
            value.push(b);
        }
    }
    finish(&line[raw_start..], &mut value, &mut fields);
    fields
}

enum FileReader {
    Escaped {
        reader: Box<dyn BufRead + Send>,
        buf: Vec<u8>,
    },
    Quoted {
        reader: csv::Reader<Box<dyn Read + Send>>,
        record: csv::ByteRecord,
    },
}

struct OpenFile {
    path: PathBuf,
    line: u64,
    reader: FileReader,
}

/// Reads every record of the files assigned to one partition.
pub struct DelimitedFileSource {
    layout: InputLayout,
    null_token: String,
    pending: VecDeque<PathBuf>,
    current: Option<OpenFile>,
}

impl DelimitedFileSource {
    pub fn new(files: Vec<PathBuf>, layout: InputLayout, null_token: String) -> Self {
        Self {
            layout,
            null_token,
            pending: files.into(),
            current: None,
        }
    }

    fn open(&self, path: PathBuf) -> Result<OpenFile> {
        debug!("Opening input file {}", path.display());
        let raw = open_maybe_gz(&path)?;
        let reader = match self.layout.enclosed_by {
            Some(quote) => {
                let mut builder = csv::ReaderBuilder::new();
                builder
                    .has_headers(false)
                    .flexible(true)
                    .delimiter(self.layout.delimiter)
                    .quote(quote);
                if let Some(esc) = self.layout.escaped_by {
                    builder.escape(Some(esc)).double_quote(false);
                }
                FileReader::Quoted {
                    reader: builder.from_reader(raw),
                    record: csv::ByteRecord::new(),
                }
            }
            None => FileReader::Escaped {
                reader: Box::new(BufReader::with_capacity(READ_BUFFER, raw)),
                buf: Vec::new(),
            },
        };
        Ok(OpenFile { path, line: 0, reader })
    }

    /// Next record of the current file, `None` at its end.
    fn read_current(&mut self) -> Result<Option<Record>> {
        let Some(file) = self.current.as_mut() else {
            return Ok(None);
        };
        file.line += 1;
        let line = file.line;
        let path = &file.path;
        let input_err = |reason: String| TransferError::Input {
            file: path.display().to_string(),
            line,
            reason,
        };
        match &mut file.reader {
            FileReader::Escaped { reader, buf } => {
                if !read_escaped_line(reader, buf, self.layout.escaped_by)
                    .map_err(|e| input_err(e.to_string()))?
                {
                    return Ok(None);
                }
                Ok(Some(split_escaped(
                    buf,
                    self.layout.delimiter,
                    self.layout.escaped_by,
                    &self.null_token,
                )))
            }
            FileReader::Quoted { reader, record } => {
                let more = reader
                    .read_byte_record(record)
                    .map_err(|e| input_err(e.to_string()))?;
                if !more {
                    return Ok(None);
                }
                Ok(Some(
                    record
                        .iter()
                        .map(|f| {
                            if f == self.null_token.as_bytes() {
                                None
                            } else {
                                Some(f.to_vec())
                            }
                        })
                        .collect(),
                ))
            }
        }
    }
}

/// Reads one line, keeping newlines preceded by an odd run of escapes.
/// A trailing `\r\n` is treated as a plain terminator.
fn read_escaped_line(
    reader: &mut (dyn BufRead + Send),
    buf: &mut Vec<u8>,
    escape: Option<u8>,
) -> std::io::Result<bool> {
    buf.clear();
    loop {
        let n = reader.read_until(b'\n', buf)?;
        if n == 0 {
            return Ok(!buf.is_empty());
        }
        if buf.last() != Some(&b'\n') {
            return Ok(true);
        }
        let body = &buf[..buf.len() - 1];
        let escapes = match escape {
            Some(esc) => body.iter().rev().take_while(|&&b| b == esc).count(),
            None => 0,
        };
        if escapes % 2 == 0 {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
            return Ok(true);
        }
    }
}

impl RecordSource for DelimitedFileSource {
    fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            if let Some(record) = self.read_current()? {
                return Ok(Some(record));
            }
            if let Some(done) = self.current.take() {
                info!("Finished input file {} ({} lines)", done.path.display(), done.line - 1);
            }
            match self.pending.pop_front() {
                Some(path) => self.current = Some(self.open(path)?),
                None => return Ok(None),
            }
        }
    }
}

/// Deals the files of an input directory to export partitions.
pub struct DelimitedSourceFactory {
    input_dir: PathBuf,
    layout: InputLayout,
    null_token: String,
}

impl DelimitedSourceFactory {
    pub fn new(input_dir: PathBuf, layout: InputLayout, null_token: String) -> Self {
        Self {
            input_dir,
            layout,
            null_token,
        }
    }
}

impl RecordSourceFactory for DelimitedSourceFactory {
    fn open_source(&self, partition: u32, total: u32) -> Result<Box<dyn RecordSource>> {
        let files: Vec<PathBuf> = list_input_files(&self.input_dir)?
            .into_iter()
            .enumerate()
            .filter(|(i, _)| (*i as u32) % total.max(1) == partition)
            .map(|(_, p)| p)
            .collect();
        debug!("Partition {} reads {} input files", partition, files.len());
        Ok(Box::new(DelimitedFileSource::new(
            files,
            self.layout.clone(),
            self.null_token.clone(),
        )))
    }
}
