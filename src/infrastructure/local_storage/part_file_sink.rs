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

//! Import output: one part file per partition.

use crate::domain::delimiters::DelimiterFormat;
use crate::domain::entities::Record;
use crate::domain::errors::Result;
use crate::ports::record_port::{RecordSink, RecordSinkFactory};
use flate2::write::GzEncoder;
use flate2::Compression as GzipCompression;
use log::{debug, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// `part-m-00000`, with `.gz` appended when compressed.
pub fn part_file_name(partition: u32, compress: bool) -> String {
    let base = format!("part-m-{:05}", partition);
    if compress {
        format!("{}.gz", base)
    } else {
        base
    }
}

enum Output {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Output {
    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Output::Plain(w) => w,
            Output::Gzip(w) => w,
        }
    }
}

/// Writes records in the transfer's delimited format.
pub struct PartFileSink {
    path: PathBuf,
    format: DelimiterFormat,
    output: Option<Output>,
    buf: Vec<u8>,
    rows: u64,
}

impl PartFileSink {
    pub fn create(path: PathBuf, format: DelimiterFormat, compress: bool) -> Result<Self> {
        let buf_writer = BufWriter::with_capacity(128 * 1024, File::create(&path)?);
        let output = if compress {
            Output::Gzip(GzEncoder::new(buf_writer, GzipCompression::fast()))
        } else {
            Output::Plain(buf_writer)
        };
        debug!("Writing part file {}", path.display());
        Ok(Self {
            path,
            format,
            output: Some(output),
            buf: Vec::with_capacity(4096),
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for PartFileSink {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        let Some(output) = self.output.as_mut() else {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "part file already finished").into());
        };
        self.buf.clear();
        self.format.encode_record(record, &mut self.buf);
        output.writer().write_all(&self.buf)?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        match self.output.take() {
            Some(Output::Plain(mut w)) => w.flush()?,
            Some(Output::Gzip(gz)) => gz.finish()?.flush()?,
            None => return Ok(()),
        }
        info!("Wrote {} records to {}", self.rows, self.path.display());
        Ok(())
    }
}

/// Creates `PartFileSink`s under one output directory.
pub struct PartFileSinkFactory {
    output_dir: PathBuf,
    format: DelimiterFormat,
    compress: bool,
}

impl PartFileSinkFactory {
    pub fn new(output_dir: PathBuf, format: DelimiterFormat, compress: bool) -> Result<Self> {
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            format,
            compress,
        })
    }
}

impl RecordSinkFactory for PartFileSinkFactory {
    fn create_sink(&self, partition: u32) -> Result<Box<dyn RecordSink>> {
        let path = self.output_dir.join(part_file_name(partition, self.compress));
        Ok(Box::new(PartFileSink::create(path, self.format.clone(), self.compress)?))
    }
}
