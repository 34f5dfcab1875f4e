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

//! # Delimiter / Format Descriptor
//!
//! The EDW bulk format is plain delimited text with exactly one legal escape
//! byte (`\`), `\n` as the record terminator, no enclosing quotes, and a
//! configurable NULL substitution token.
//!
//! `DelimiterFormat::resolve` turns whatever the operator asked for into a
//! format the database accepts. Unsupported requests are overridden or ignored
//! with a warning; only contradictions are fatal.

use crate::domain::entities::{Field, Record};
use crate::domain::errors::{Result, TransferError};
use log::warn;
use std::io::{self, BufRead};

/// The single escape byte the EDW bulk format understands.
pub const EDW_ESCAPE: u8 = b'\\';

/// Record terminator emitted and expected by the bulk statements.
pub const EDW_RECORD_DELIMITER: u8 = b'\n';

/// NULL token used when the operator does not configure one.
pub const DEFAULT_NULL_STRING: &str = "null";

/// Delimiters exactly as requested by the operator, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestedFormat {
    pub field_delimiter: u8,
    pub escaped_by: Option<u8>,
    pub enclosed_by: Option<u8>,
    pub lines_terminated_by: Option<u8>,
    pub null_string: Option<String>,
    pub null_non_string: Option<String>,
}

impl Default for RequestedFormat {
    fn default() -> Self {
        Self {
            field_delimiter: b',',
            escaped_by: None,
            enclosed_by: None,
            lines_terminated_by: None,
            null_string: None,
            null_non_string: None,
        }
    }
}

/// The normalized wire format shared by a worker and its loader statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DelimiterFormat {
    field_delimiter: u8,
    record_delimiter: u8,
    escape: u8,
    enclose: Option<u8>,
    null_token: String,
}

impl DelimiterFormat {
    /// Validates a request and forces it into the shape the EDW supports.
    pub fn resolve(requested: &RequestedFormat) -> Result<Self> {
        let field = requested.field_delimiter;
        if field == EDW_ESCAPE || field == EDW_RECORD_DELIMITER || field == b'\r' {
            return Err(TransferError::Config(format!(
                "field delimiter {:?} collides with the escape or record delimiter",
                field as char
            )));
        }

        match requested.escaped_by {
            None => warn!(
                "The EDW requires the '\\' escape character. Enabling escaped-by. \
                 Existing parsers for this data must use '\\' as the escape."
            ),
            Some(b) if b != EDW_ESCAPE => warn!(
                "The EDW requires the '\\' escape character. Forcing escaped-by \
                 from {:?} to '\\' for this transfer.",
                b as char
            ),
            Some(_) => {}
        }

        if requested.enclosed_by.is_some() {
            warn!("The EDW does not support --enclosed-by. Ignoring.");
        }
        if matches!(requested.lines_terminated_by, Some(b) if b != EDW_RECORD_DELIMITER) {
            warn!("The EDW does not support --lines-terminated-by. Ignoring.");
        }

        let null_token = resolve_null_token(
            requested.null_string.as_deref(),
            requested.null_non_string.as_deref(),
        )?;
        if null_token.as_bytes().contains(&field)
            || null_token.as_bytes().contains(&EDW_RECORD_DELIMITER)
        {
            return Err(TransferError::Config(format!(
                "null substitution string {:?} contains a delimiter",
                null_token
            )));
        }

        Ok(Self {
            field_delimiter: field,
            record_delimiter: EDW_RECORD_DELIMITER,
            escape: EDW_ESCAPE,
            enclose: None,
            null_token,
        })
    }

    pub fn field_delimiter(&self) -> u8 {
        self.field_delimiter
    }

    pub fn record_delimiter(&self) -> u8 {
        self.record_delimiter
    }

    pub fn escape(&self) -> u8 {
        self.escape
    }

    pub fn enclose(&self) -> Option<u8> {
        self.enclose
    }

    /// The NULL token in its de-escaped (wire) form.
    pub fn null_token(&self) -> &str {
        &self.null_token
    }

    fn is_special(&self, b: u8) -> bool {
        b == self.field_delimiter || b == self.record_delimiter || b == self.escape || b == b'\r'
    }

    /// Appends one field in wire form.
    ///
    /// A value whose escaped form equals the NULL token gets a leading escape
    /// so that it cannot be read back as NULL.
    pub fn encode_field(&self, value: Option<&[u8]>, out: &mut Vec<u8>) {
        let Some(value) = value else {
            out.extend_from_slice(self.null_token.as_bytes());
            return;
        };
        let start = out.len();
        for &b in value {
            if self.is_special(b) {
                out.push(self.escape);
            }
            out.push(b);
        }
        if &out[start..] == self.null_token.as_bytes() {
            out.insert(start, self.escape);
        }
    }

    /// Appends a full record, including its terminator.
    pub fn encode_record(&self, record: &[Field], out: &mut Vec<u8>) {
        for (i, field) in record.iter().enumerate() {
            if i > 0 {
                out.push(self.field_delimiter);
            }
            self.encode_field(field.as_deref(), out);
        }
        out.push(self.record_delimiter);
    }

    /// Decodes one raw field. The raw bytes are compared with the NULL token
    /// before unescaping; the value bytes are kept as they are.
    pub fn decode_field(&self, raw: &[u8]) -> Field {
        if raw == self.null_token.as_bytes() {
            return None;
        }
        let mut value = Vec::with_capacity(raw.len());
        let mut escaped = false;
        for &b in raw {
            if escaped {
                value.push(b);
                escaped = false;
            } else if b == self.escape {
                escaped = true;
            } else {
                value.push(b);
            }
        }
        if escaped {
            // dangling escape at end of field
            value.push(self.escape);
        }
        Some(value)
    }

    /// Splits a record (without its terminator) on unescaped field delimiters.
    pub fn decode_record(&self, line: &[u8]) -> Record {
        let mut fields = Vec::new();
        let mut start = 0;
        let mut escaped = false;
        for (i, &b) in line.iter().enumerate() {
            if escaped {
                escaped = false;
            } else if b == self.escape {
                escaped = true;
            } else if b == self.field_delimiter {
                fields.push(self.decode_field(&line[start..i]));
                start = i + 1;
            }
        }
        fields.push(self.decode_field(&line[start..]));
        fields
    }

    /// Reads the next raw record into `buf`, honouring escaped terminators.
    ///
    /// Returns `Ok(false)` at end of stream. The terminator is not kept.
    pub fn read_raw_record<R: BufRead>(&self, reader: &mut R, buf: &mut Vec<u8>) -> io::Result<bool> {
        buf.clear();
        loop {
            let n = reader.read_until(self.record_delimiter, buf)?;
            if n == 0 {
                return Ok(!buf.is_empty());
            }
            if buf.last() != Some(&self.record_delimiter) {
                // EOF without terminator
                return Ok(true);
            }
            let body = &buf[..buf.len() - 1];
            let trailing_escapes = body.iter().rev().take_while(|&&b| b == self.escape).count();
            if trailing_escapes % 2 == 0 {
                buf.pop();
                return Ok(true);
            }
        }
    }
}

/// Picks the NULL token from the string / non-string requests.
///
/// The bulk format has a single NULLVALUE, so differing requests cannot be honoured.
fn resolve_null_token(null_string: Option<&str>, null_non_string: Option<&str>) -> Result<String> {
    let raw = match (null_string, null_non_string) {
        (Some(s), Some(n)) if s != n => {
            return Err(TransferError::Config(format!(
                "the EDW uses one NULLVALUE for all columns; null-string {:?} and \
                 null-non-string {:?} must be identical",
                s, n
            )))
        }
        (Some(s), _) => s,
        (None, Some(n)) => n,
        (None, None) => DEFAULT_NULL_STRING,
    };
    let token = unescape_null_string(raw)?;
    if token.is_empty() {
        return Err(TransferError::Config(
            "null substitution string must not be empty".to_string(),
        ));
    }
    Ok(token)
}

/// Converts an operator-supplied token in escaped notation to its wire form.
///
/// `\\`, `\t`, `\r`, `\n`, `\b`, `\f` and quotes are understood. Octal
/// sequences such as `\0` or `\012` are rejected. Unknown sequences like `\N`
/// are kept literally.
pub fn unescape_null_string(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some(d) if ('0'..='7').contains(&d) => {
                return Err(TransferError::Config(format!(
                    "octal escape sequences are not supported in null strings: {:?}",
                    raw
                )))
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Ok(out)
}

/// Parses a delimiter given in config or on the command line into one byte.
///
/// Accepts a literal single character, an escape such as `\t`, or a decimal
/// byte value such as `44`.
pub fn parse_delimiter(spec: &str) -> Result<u8> {
    let bytes = spec.as_bytes();
    match bytes {
        [b] => Ok(*b),
        [b'\\', b't'] => Ok(b'\t'),
        [b'\\', b'n'] => Ok(b'\n'),
        [b'\\', b'r'] => Ok(b'\r'),
        [b'\\', b'\\'] => Ok(b'\\'),
        [b'\\', b'0'..=b'7', ..] => Err(TransferError::Config(format!(
            "octal escape sequences are not supported: {:?}",
            spec
        ))),
        _ => spec
            .parse::<u8>()
            .ok()
            .filter(|_| bytes.len() > 1)
            .ok_or_else(|| TransferError::Config(format!("invalid single-byte delimiter: {:?}", spec))),
    }
}
