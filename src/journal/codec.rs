//! RIFF-style framing of journal container files.
//!
//! A container file is a single RIFF chunk of form type `SJRN`. Its first
//! sub-chunk is the `HDR ` header describing who wrote the file and how the
//! payloads are serialised; every following sub-chunk is a `PBUF` record.
//!
//! # Container Header (little-endian)
//!
//! ```text
//! offset  size  field
//! 0       4     "RIFF"
//! 4       4     riff length   = file size - 8
//! 8       4     "SJRN"
//! 12      4     "HDR "
//! 16      4     hdr length    = header size - 20
//! 20      2     format version
//! 22      ..    producer\0 subject\0 method\0 version\0
//! ..      ..    NUL padding up to the next multiple of 8
//! ```
//!
//! # Record (little-endian)
//!
//! ```text
//! [4 bytes: "PBUF"][4 bytes: length][8 bytes: producer id][8 bytes: timestamp]
//! [length - 16 bytes: payload]
//! ```
//!
//! `length` covers the producer id, the timestamp and the payload, and is
//! always a multiple of 8. No record count is stored anywhere; readers walk
//! the records until the data runs out or a record fails validation.

use super::error::JournalError;
use serde::Serialize;
use thiserror::Error;

/// Tag of the outer RIFF chunk.
pub const RIFF_TAG: [u8; 4] = *b"RIFF";
/// RIFF form type of a journal container.
pub const SJRN_TAG: [u8; 4] = *b"SJRN";
/// Tag of the header sub-chunk.
pub const HDR_TAG: [u8; 4] = *b"HDR ";
/// Tag of a record sub-chunk.
pub const PBUF_TAG: [u8; 4] = *b"PBUF";

/// Size of the RIFF tag plus its length field.
pub const RIFF_HEADER_SIZE: usize = 8;
/// Fixed part of the SJRN header: form tag, `HDR ` tag, length, version.
pub const SJRN_FIXED_SIZE: usize = 14;
/// Smallest possible container header, before the NUL-terminated fields.
pub const HEADER_FIXED_SIZE: usize = RIFF_HEADER_SIZE + SJRN_FIXED_SIZE;
/// Byte offset of the riff length field.
pub const RIFF_LENGTH_OFFSET: u64 = 4;
/// Size of a sub-chunk tag plus its length field.
pub const CHUNK_HEADER_SIZE: usize = 8;
/// Size of the record header: tag, length, producer id, timestamp.
pub const RECORD_HEADER_SIZE: usize = CHUNK_HEADER_SIZE + 8 + 8;

/// Format version written into every new container header.
pub const SJRN_VERSION: u16 = 1;
/// Upper bound accepted for the `HDR ` length field.
pub const MAX_HEADER_LENGTH: usize = 1024;
/// Upper bound for one framed record (header and payload).
pub const MAX_RECORD_SIZE: usize = 1024 * 1024;
/// Every chunk length is a multiple of this.
pub const ALIGNMENT: usize = 8;

const HDR_LENGTH_OFFSET: usize = 16;
const HDR_DATA_OFFSET: usize = 20;
const HEADER_FIELD_COUNT: usize = 4;
const RECORD_BODY_MIN: usize = RECORD_HEADER_SIZE - CHUNK_HEADER_SIZE;

/// Rounds `n` up to the next multiple of [`ALIGNMENT`].
#[inline]
#[must_use]
pub const fn align_up(n: usize) -> usize {
    (n + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

/// Returns `true` if `n` is a multiple of [`ALIGNMENT`].
#[inline]
#[must_use]
pub const fn is_aligned(n: usize) -> bool {
    n % ALIGNMENT == 0
}

/// A decoded container header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerHeader {
    /// Format version of the container layout.
    pub version: u16,
    /// Name of the producer that wrote the file.
    pub producer: String,
    /// Subject (event stream) the file belongs to.
    pub subject: String,
    /// Name of the payload serialisation method.
    pub serialisation_method: String,
    /// Version string of the payload serialisation.
    pub serialisation_version: String,
    /// Bytes taken by the RIFF and SJRN headers, padding included. Records
    /// start at this offset.
    pub header_size: usize,
}

/// Why a container header could not be decoded.
///
/// Header corruption is healed by the writer (the file is replaced), so this
/// type never reaches callers of `insert`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// Fewer bytes than the fixed header part.
    #[error("header needs at least {needed} bytes, only {available} available")]
    TooShort {
        /// Minimum number of bytes required.
        needed: usize,
        /// Number of bytes present.
        available: usize,
    },

    /// A magic tag does not match.
    #[error("expected tag {expected:?} at offset {offset}, found {found:?}")]
    BadTag {
        /// Byte offset of the tag.
        offset: usize,
        /// The tag that should be there.
        expected: &'static str,
        /// The bytes actually found, ASCII-escaped.
        found: String,
    },

    /// The `HDR ` length field is above [`MAX_HEADER_LENGTH`].
    #[error("header length {length} exceeds the 1024 byte ceiling")]
    Oversized {
        /// Declared header length.
        length: usize,
    },

    /// The `HDR ` length field claims more bytes than the file holds.
    #[error("header declares {length} bytes but only {available} follow")]
    LengthOverrun {
        /// Declared header length.
        length: usize,
        /// Bytes present after the length field.
        available: usize,
    },

    /// Fewer than four NUL-terminated fields were found.
    #[error("header holds {found} of 4 NUL-terminated fields")]
    MissingFields {
        /// Number of complete fields found.
        found: usize,
    },

    /// A field is not valid UTF-8.
    #[error("header field {index} is not valid UTF-8")]
    NonUtf8Field {
        /// Zero-based field position.
        index: usize,
    },
}

/// Summary of a walk over the record area of a container file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PbufInfo {
    /// Number of complete records seen.
    pub count: u64,
    /// Producer id of the first complete record.
    pub first_id: Option<u64>,
    /// Producer id of the last complete record.
    pub last_id: Option<u64>,
    /// Timestamp of the first complete record.
    pub first_timestamp: Option<i64>,
    /// Timestamp of the last complete record.
    pub last_timestamp: Option<i64>,
    /// Offset just past the last complete record, relative to the start of
    /// the scanned bytes.
    pub valid_bytes: usize,
    /// The walk stopped before the end of the data.
    pub truncated: bool,
    /// The walk stopped on a record whose length field is unusable.
    pub length_error: bool,
}

impl PbufInfo {
    /// Returns `true` if no complete record was found.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn push(&mut self, record: &RecordRef<'_>) {
        if self.first_id.is_none() {
            self.first_id = Some(record.producer_id);
            self.first_timestamp = Some(record.timestamp);
        }
        self.last_id = Some(record.producer_id);
        self.last_timestamp = Some(record.timestamp);
        self.count = self.count.saturating_add(1);
    }
}

/// A record borrowed from a container's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordRef<'a> {
    /// Producer-local unique id.
    pub producer_id: u64,
    /// Windows-epoch 100ns ticks.
    pub timestamp: i64,
    /// The opaque payload.
    pub payload: &'a [u8],
}

/// Why the record walk stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordFault {
    /// Fewer bytes left than a record header.
    ShortHeader,
    /// The tag is not `PBUF`.
    BadTag,
    /// The length is misaligned, too small, or runs past the data.
    BadLength,
}

/// Computes the size of the container header for these fields without
/// building it.
#[must_use]
pub fn container_header_size(
    producer: &str,
    subject: &str,
    method: &str,
    version: &str,
) -> usize {
    let fields = producer.len() + subject.len() + method.len() + version.len() + HEADER_FIELD_COUNT;
    align_up(HEADER_FIXED_SIZE + fields)
}

/// Builds the RIFF and SJRN headers of a new container file.
///
/// The riff length is set for a file holding no records yet.
///
/// # Errors
///
/// Returns [`JournalError::InvalidConfig`] if a field contains a NUL byte or
/// the header would exceed [`MAX_HEADER_LENGTH`].
pub fn encode_container_header(
    producer: &str,
    subject: &str,
    method: &str,
    version: &str,
) -> Result<Vec<u8>, JournalError> {
    let fields = [
        ("producer", producer),
        ("subject", subject),
        ("serialisation method", method),
        ("serialisation version", version),
    ];
    if let Some((name, _)) = fields.iter().find(|(_, value)| value.as_bytes().contains(&0)) {
        return Err(JournalError::invalid_config(format!(
            "{name} contains a NUL byte"
        )));
    }

    let header_size = container_header_size(producer, subject, method, version);
    let hdr_length = header_size - HDR_DATA_OFFSET;
    if hdr_length > MAX_HEADER_LENGTH {
        return Err(JournalError::invalid_config(format!(
            "container header of {header_size} bytes exceeds the {MAX_HEADER_LENGTH} byte ceiling"
        )));
    }

    let mut buf = Vec::with_capacity(header_size);
    buf.extend_from_slice(&RIFF_TAG);
    buf.extend_from_slice(&len_u32(header_size - RIFF_HEADER_SIZE).to_le_bytes());
    buf.extend_from_slice(&SJRN_TAG);
    buf.extend_from_slice(&HDR_TAG);
    buf.extend_from_slice(&len_u32(hdr_length).to_le_bytes());
    buf.extend_from_slice(&SJRN_VERSION.to_le_bytes());
    for (_, value) in fields {
        buf.extend_from_slice(value.as_bytes());
        buf.push(0);
    }
    buf.resize(header_size, 0);
    Ok(buf)
}

/// Decodes and validates the container header at the start of `bytes`.
///
/// Only the first four NUL-terminated fields are read; any further fields
/// are ignored.
///
/// # Errors
///
/// Returns a [`HeaderError`] describing the first check that failed.
pub fn decode_header(bytes: &[u8]) -> Result<ContainerHeader, HeaderError> {
    if bytes.len() < HEADER_FIXED_SIZE {
        return Err(HeaderError::TooShort {
            needed: HEADER_FIXED_SIZE,
            available: bytes.len(),
        });
    }
    expect_tag(bytes, 0, RIFF_TAG, "RIFF")?;
    expect_tag(bytes, 8, SJRN_TAG, "SJRN")?;
    expect_tag(bytes, 12, HDR_TAG, "HDR ")?;

    let length = read_u32(bytes, HDR_LENGTH_OFFSET) as usize;
    if length > MAX_HEADER_LENGTH {
        return Err(HeaderError::Oversized { length });
    }
    let available = bytes.len() - HDR_DATA_OFFSET;
    if length > available {
        return Err(HeaderError::LengthOverrun { length, available });
    }
    if length < 2 {
        return Err(HeaderError::MissingFields { found: 0 });
    }

    let version = read_u16(bytes, HDR_DATA_OFFSET);
    let mut rest = &bytes[HEADER_FIXED_SIZE..HDR_DATA_OFFSET + length];
    let mut fields = Vec::with_capacity(HEADER_FIELD_COUNT);
    while fields.len() < HEADER_FIELD_COUNT {
        let Some(nul) = rest.iter().position(|&b| b == 0) else {
            break;
        };
        let index = fields.len();
        let field = std::str::from_utf8(&rest[..nul])
            .map_err(|_| HeaderError::NonUtf8Field { index })?;
        fields.push(field.to_owned());
        rest = &rest[nul + 1..];
    }
    if fields.len() < HEADER_FIELD_COUNT {
        return Err(HeaderError::MissingFields {
            found: fields.len(),
        });
    }

    let mut fields = fields.into_iter();
    let mut next = || fields.next().unwrap_or_default();
    Ok(ContainerHeader {
        version,
        producer: next(),
        subject: next(),
        serialisation_method: next(),
        serialisation_version: next(),
        header_size: HDR_DATA_OFFSET + length,
    })
}

/// Reads the riff length field, if the bytes are long enough to hold it.
#[must_use]
pub fn riff_length(bytes: &[u8]) -> Option<u32> {
    (bytes.len() >= RIFF_HEADER_SIZE).then(|| read_u32(bytes, RIFF_LENGTH_OFFSET as usize))
}

/// Checks that a payload of `length` bytes can be framed and returns the
/// size of the framed record.
///
/// # Errors
///
/// Returns [`JournalError::InvalidPayload`] if `length` is not a multiple of
/// [`ALIGNMENT`] or the record would exceed [`MAX_RECORD_SIZE`].
pub fn record_size(length: usize) -> Result<usize, JournalError> {
    if !is_aligned(length) {
        return Err(JournalError::invalid_payload(
            length,
            format!("length is not a multiple of {ALIGNMENT}"),
        ));
    }
    match length.checked_add(RECORD_HEADER_SIZE) {
        Some(size) if size <= MAX_RECORD_SIZE => Ok(size),
        _ => Err(JournalError::invalid_payload(
            length,
            format!("record would exceed the {MAX_RECORD_SIZE} byte maximum"),
        )),
    }
}

/// Frames `payload` as a `PBUF` record.
///
/// The payload must already be aligned; it is never padded here.
///
/// # Errors
///
/// Returns [`JournalError::InvalidPayload`] under the same conditions as
/// [`record_size`].
pub fn encode_record(
    payload: &[u8],
    producer_id: u64,
    timestamp: i64,
) -> Result<Vec<u8>, JournalError> {
    let size = record_size(payload.len())?;
    let mut buf = Vec::with_capacity(size);
    buf.extend_from_slice(&PBUF_TAG);
    buf.extend_from_slice(&len_u32(size - CHUNK_HEADER_SIZE).to_le_bytes());
    buf.extend_from_slice(&producer_id.to_le_bytes());
    buf.extend_from_slice(&timestamp.to_le_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Walks the records in `bytes` (the data following the container header).
///
/// With `limit` set, at most that many records are read, which lets callers
/// peek at a file cheaply. The walk never fails: the first record that does
/// not validate sets [`PbufInfo::truncated`] and ends the scan, and
/// everything read up to that point is reported.
#[must_use]
pub fn scan_records(bytes: &[u8], limit: Option<usize>) -> PbufInfo {
    let mut info = PbufInfo::default();
    let mut offset = 0usize;

    while offset < bytes.len() {
        if limit.is_some_and(|limit| info.count >= limit as u64) {
            break;
        }
        match next_record(bytes, offset) {
            Ok((record, end)) => {
                info.push(&record);
                offset = end;
                info.valid_bytes = end;
            }
            Err(fault) => {
                info.truncated = true;
                info.length_error = fault == RecordFault::BadLength;
                break;
            }
        }
    }

    info
}

/// Iterates over the complete records in `bytes`, stopping silently at the
/// first record that does not validate.
#[must_use]
pub fn records(bytes: &[u8]) -> RecordIter<'_> {
    RecordIter { bytes, offset: 0 }
}

/// Iterator returned by [`records`].
#[derive(Debug, Clone)]
pub struct RecordIter<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = RecordRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.bytes.len() {
            return None;
        }
        match next_record(self.bytes, self.offset) {
            Ok((record, end)) => {
                self.offset = end;
                Some(record)
            }
            Err(_) => {
                self.offset = self.bytes.len();
                None
            }
        }
    }
}

/// Decodes the record starting at `offset` and returns it with the offset
/// just past it.
fn next_record(bytes: &[u8], offset: usize) -> Result<(RecordRef<'_>, usize), RecordFault> {
    let remaining = bytes.len().saturating_sub(offset);
    if remaining < RECORD_HEADER_SIZE {
        return Err(RecordFault::ShortHeader);
    }
    if bytes[offset..offset + 4] != PBUF_TAG {
        return Err(RecordFault::BadTag);
    }

    let length = read_u32(bytes, offset + 4) as usize;
    if length < RECORD_BODY_MIN
        || !is_aligned(length)
        || length > remaining - CHUNK_HEADER_SIZE
    {
        return Err(RecordFault::BadLength);
    }

    let body = offset + CHUNK_HEADER_SIZE;
    let end = body + length;
    let record = RecordRef {
        producer_id: read_u64(bytes, body),
        timestamp: read_u64(bytes, body + 8) as i64,
        payload: &bytes[body + RECORD_BODY_MIN..end],
    };
    Ok((record, end))
}

fn expect_tag(
    bytes: &[u8],
    offset: usize,
    tag: [u8; 4],
    expected: &'static str,
) -> Result<(), HeaderError> {
    let found = &bytes[offset..offset + 4];
    if found == tag {
        Ok(())
    } else {
        Err(HeaderError::BadTag {
            offset,
            expected,
            found: found.escape_ascii().to_string(),
        })
    }
}

/// Chunk lengths are bounded by [`MAX_RECORD_SIZE`] or the file size limit,
/// both far below `u32::MAX`.
#[inline]
fn len_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[inline]
fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

#[inline]
fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

#[inline]
fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}
