//! Upload ingestion: raw CSV bytes to a validated [`Table`].
//!
//! The parser covers what a request handler needs from an untrusted upload:
//!
//! - **Size bound**: inputs above `IngestOptions::max_bytes` are rejected
//!   before any parsing work happens.
//! - **Type check**: the declared filename must carry a `.csv` suffix
//!   (case-insensitive); the declared content type is advisory only.
//! - **Encoding**: fields are decoded one at a time via `encoding_rs`,
//!   defaulting to UTF-8, with decode failures reported per encoding.
//! - **Structure**: standard double-quote escaping, quote-termination
//!   checking, blank-line skipping, and exact field-count enforcement with
//!   0-based row indexes in errors.

use anyhow::{Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use log::debug;
use thiserror::Error;

use crate::data::{Cell, Row, Table, validate_columns};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// An upload as the transport layer hands it over: bytes plus the metadata
/// the client declared about them.
#[derive(Debug, Clone)]
pub struct RawUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: Option<String>,
}

impl RawUpload {
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        Self {
            bytes,
            filename: filename.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    pub max_bytes: usize,
    pub encoding: &'static Encoding,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            encoding: UTF_8,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
    #[error("Unsupported upload '{filename}': expected a .csv file")]
    UnsupportedType { filename: String },
    #[error("Duplicate column '{column}' in header")]
    DuplicateColumn { column: String },
    #[error("Header column at position {position} has an empty name")]
    EmptyColumn { position: usize },
    #[error("Malformed row {row_index}: expected {expected} field(s), found {found}")]
    MalformedRow {
        row_index: usize,
        expected: usize,
        found: usize,
    },
    #[error("Failed to decode input with encoding {encoding}")]
    EncodingError { encoding: &'static str },
    #[error("Input contains no data rows")]
    EmptyTable,
}

impl IngestError {
    /// HTTP status an embedding layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            IngestError::TooLarge { .. } => 413,
            _ => 400,
        }
    }
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

/// Parses an upload into a [`Table`], enforcing every ingestion invariant.
///
/// Pure over its inputs: identical upload and options always produce the
/// identical table or the identical error.
pub fn parse(upload: &RawUpload, options: &IngestOptions) -> Result<Table, IngestError> {
    if upload.bytes.len() > options.max_bytes {
        return Err(IngestError::TooLarge {
            size: upload.bytes.len(),
            limit: options.max_bytes,
        });
    }
    if !has_csv_suffix(&upload.filename) {
        return Err(IngestError::UnsupportedType {
            filename: upload.filename.clone(),
        });
    }
    if let Some(content_type) = &upload.content_type {
        debug!(
            "Declared content type for '{}': {content_type}",
            upload.filename
        );
    }
    if upload.bytes.is_empty() {
        return Err(IngestError::EmptyTable);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b',')
        .double_quote(true)
        .flexible(true)
        .from_reader(upload.bytes.as_slice());

    let header_record = match reader.byte_headers() {
        Ok(record) => record.clone(),
        Err(err) => return Err(reader_error(&err, 0, 0, options)),
    };
    let columns: Vec<String> = header_record
        .iter()
        .map(|field| decode_field(field, options.encoding).map(|text| text.trim().to_string()))
        .collect::<Result<_, _>>()?;
    // A lone blank header field is an empty document, not a one-column table.
    if columns.len() == 1 && columns[0].is_empty() {
        return Err(IngestError::EmptyTable);
    }
    validate_columns(&columns)?;
    check_quote_termination(&upload.bytes, columns.len())?;

    let mut rows: Vec<Row> = Vec::new();
    for result in reader.byte_records() {
        let record = match result {
            Ok(record) => record,
            Err(err) => return Err(reader_error(&err, rows.len(), columns.len(), options)),
        };
        let fields = decode_fields(&record, options.encoding)?;
        if is_blank_line(&fields) {
            continue;
        }
        if fields.len() != columns.len() {
            return Err(IngestError::MalformedRow {
                row_index: rows.len(),
                expected: columns.len(),
                found: fields.len(),
            });
        }
        rows.push(Row::new(
            fields.iter().map(|field| Cell::from_field(field)).collect(),
        ));
    }

    debug!(
        "Parsed {} data row(s) across {} column(s) from '{}'",
        rows.len(),
        columns.len(),
        upload.filename
    );
    Table::new(columns, rows)
}

/// Records with a single field that trims to nothing are blank lines; they
/// are skipped and never consume a row index.
fn is_blank_line(fields: &[String]) -> bool {
    fields.len() == 1 && fields[0].trim().is_empty()
}

/// Walks the raw bytes as an RFC 4180 quote-state machine before any record
/// is read. The reader is permissive about quoting: a quote still open at
/// end of input absorbs every remaining record into one field, and when it
/// opens in a row's final field the field count still matches the header.
/// The reported index is the logical row the quote opened in.
fn check_quote_termination(bytes: &[u8], expected: usize) -> Result<(), IngestError> {
    enum State {
        FieldStart,
        Unquoted,
        Quoted,
        QuoteEnd,
    }

    let mut state = State::FieldStart;
    let mut fields = 1usize;
    let mut has_comma = false;
    let mut all_ws = true;
    let mut header_done = false;
    let mut data_rows = 0usize;

    for &byte in bytes {
        let mut boundary = false;
        match state {
            State::FieldStart => match byte {
                b'"' => state = State::Quoted,
                b',' => {
                    fields += 1;
                    has_comma = true;
                }
                b'\r' | b'\n' => boundary = true,
                // A quote after leading content is literal text, not quoting.
                b' ' | b'\t' => state = State::Unquoted,
                _ => {
                    all_ws = false;
                    state = State::Unquoted;
                }
            },
            State::Unquoted => match byte {
                b',' => {
                    fields += 1;
                    has_comma = true;
                    state = State::FieldStart;
                }
                b'\r' | b'\n' => boundary = true,
                b' ' | b'\t' => {}
                _ => all_ws = false,
            },
            State::Quoted => match byte {
                b'"' => state = State::QuoteEnd,
                b' ' | b'\t' | b'\r' | b'\n' => {}
                _ => all_ws = false,
            },
            State::QuoteEnd => match byte {
                b'"' => {
                    all_ws = false;
                    state = State::Quoted;
                }
                b',' => {
                    fields += 1;
                    has_comma = true;
                    state = State::FieldStart;
                }
                b'\r' | b'\n' => boundary = true,
                _ => {
                    all_ws = false;
                    state = State::Unquoted;
                }
            },
        }
        if boundary {
            if !header_done {
                header_done = true;
            } else if has_comma || !all_ws {
                data_rows += 1;
            }
            fields = 1;
            has_comma = false;
            all_ws = true;
            state = State::FieldStart;
        }
    }

    if matches!(state, State::Quoted) {
        return Err(IngestError::MalformedRow {
            row_index: if header_done { data_rows } else { 0 },
            expected,
            found: fields,
        });
    }
    Ok(())
}

fn has_csv_suffix(filename: &str) -> bool {
    filename.trim().to_ascii_lowercase().ends_with(".csv")
}

fn decode_field(bytes: &[u8], encoding: &'static Encoding) -> Result<String, IngestError> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(IngestError::EncodingError {
            encoding: encoding.name(),
        })
    } else {
        Ok(text.into_owned())
    }
}

fn decode_fields(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
) -> Result<Vec<String>, IngestError> {
    record
        .iter()
        .map(|field| decode_field(field, encoding))
        .collect()
}

// With flexible byte records over an in-memory slice the reader cannot
// realistically fail, but the csv error surface still needs a mapping.
fn reader_error(
    err: &csv::Error,
    row_index: usize,
    expected: usize,
    options: &IngestOptions,
) -> IngestError {
    match err.kind() {
        csv::ErrorKind::UnequalLengths { len, .. } => IngestError::MalformedRow {
            row_index,
            expected,
            found: *len as usize,
        },
        _ => IngestError::EncodingError {
            encoding: options.encoding.name(),
        },
    }
}
