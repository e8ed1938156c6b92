//! Per-type binary encoding and decoding of column values.
//!
//! One encode/decode pair exists for each [`ColumnKind`](crate::table::ColumnKind),
//! operating on a plain byte stream; compression is layered underneath by
//! [`frame`](crate::frame) and is invisible here. All multi-byte values are
//! big-endian.
//!
//! | Kind | Layout per row |
//! |---|---|
//! | `Float32` / `Float64` | IEEE754 bits, 4 / 8 bytes |
//! | `Int32` / `Int16` / `Int64` | fixed-width signed integer |
//! | `Date` | i32 days since 1970-01-01 |
//! | `Time` | i32 milliseconds since midnight |
//! | `DateTime` | i64 milliseconds since the epoch, naive value read as UTC |
//! | `Instant` | i64 milliseconds since the epoch, UTC |
//! | `Boolean` | one byte: 0, 1, or 0x80 for missing |
//! | `LongText` | u32 length prefix + UTF-8 bytes |
//!
//! `ShortText` is the one kind with a file header: a u32 distinct-string
//! count, then each dictionary entry as key (native width) + length-prefixed
//! UTF-8, then one key per row. The key width is a pure function of the
//! distinct count, so the reader recovers it from the header alone.
//!
//! Temporal values are stored with millisecond precision; finer precision is
//! truncated on write. Decoders validate what they read — UTF-8, temporal
//! ranges, boolean bytes, dictionary keys — and report anything off as
//! [`CodecError::Corrupt`].

pub mod read;
pub mod write;

pub use read::ColumnReader;
pub use write::ColumnWriter;

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use snafu::{Backtrace, prelude::*};

use crate::dictionary::DictionaryError;

/// Errors produced while encoding or decoding a column stream.
#[derive(Debug, Snafu)]
pub enum CodecError {
    /// The underlying byte stream failed.
    #[snafu(display("column stream I/O error: {source}"))]
    Io {
        /// The underlying I/O error.
        source: io::Error,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// Dictionary construction failed for a short-text column.
    #[snafu(display("{source}"))]
    Dictionary {
        /// The underlying dictionary error.
        #[snafu(backtrace)]
        source: DictionaryError,
    },

    /// A string longer than the format can frame.
    #[snafu(display("string of {len} bytes exceeds the {MAX_STRING_LEN}-byte limit"))]
    OversizedString {
        /// Byte length of the rejected string.
        len: usize,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// The stream decoded to something the declared type cannot hold.
    #[snafu(display("corrupt column stream: {reason}"))]
    Corrupt {
        /// What the decoder found.
        reason: String,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },
}

/// Hard cap on a single string's encoded byte length.
///
/// Keeps a corrupt length prefix from turning into a giant allocation on read.
pub const MAX_STRING_LEN: usize = 1 << 30;

/// Byte marking a missing boolean row (the other rows are 0 or 1).
pub(crate) const BOOL_MISSING: u8 = 0x80;

/// Days between 0001-01-01 (chrono's common-era origin) and 1970-01-01.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub(crate) fn write_string<W: Write>(sink: &mut W, value: &str) -> Result<(), CodecError> {
    ensure!(
        value.len() <= MAX_STRING_LEN,
        OversizedStringSnafu { len: value.len() }
    );
    sink.write_u32::<BigEndian>(value.len() as u32).context(IoSnafu)?;
    sink.write_all(value.as_bytes()).context(IoSnafu)
}

pub(crate) fn read_string<R: Read>(source: &mut R) -> Result<String, CodecError> {
    let len = source.read_u32::<BigEndian>().context(IoSnafu)? as usize;
    ensure!(
        len <= MAX_STRING_LEN,
        CorruptSnafu {
            reason: format!("string length prefix {len} exceeds the {MAX_STRING_LEN}-byte limit"),
        }
    );
    let mut bytes = vec![0u8; len];
    source.read_exact(&mut bytes).context(IoSnafu)?;
    String::from_utf8(bytes).map_err(|e| CodecError::Corrupt {
        reason: format!("string is not valid UTF-8: {e}"),
        backtrace: Backtrace::capture(),
    })
}

pub(crate) fn date_to_epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

pub(crate) fn date_from_epoch_days(days: i32) -> Result<NaiveDate, CodecError> {
    days.checked_add(EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| CodecError::Corrupt {
            reason: format!("{days} is out of range for an epoch day count"),
            backtrace: Backtrace::capture(),
        })
}

pub(crate) fn time_to_millis_of_day(time: NaiveTime) -> i32 {
    // Fold chrono's leap-second representation back into the last millisecond.
    let subsec_millis = time.nanosecond().min(999_999_999) / 1_000_000;
    (time.num_seconds_from_midnight() * 1000 + subsec_millis) as i32
}

pub(crate) fn time_from_millis_of_day(millis: i32) -> Result<NaiveTime, CodecError> {
    u32::try_from(millis)
        .ok()
        .and_then(|ms| {
            NaiveTime::from_num_seconds_from_midnight_opt(ms / 1000, (ms % 1000) * 1_000_000)
        })
        .ok_or_else(|| CodecError::Corrupt {
            reason: format!("{millis} is out of range for a millisecond-of-day"),
            backtrace: Backtrace::capture(),
        })
}

pub(crate) fn datetime_to_epoch_millis(datetime: NaiveDateTime) -> i64 {
    datetime.and_utc().timestamp_millis()
}

pub(crate) fn datetime_from_epoch_millis(millis: i64) -> Result<NaiveDateTime, CodecError> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| CodecError::Corrupt {
            reason: format!("{millis} is out of range for an epoch millisecond count"),
            backtrace: Backtrace::capture(),
        })
}

pub(crate) fn instant_to_epoch_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

pub(crate) fn instant_from_epoch_millis(millis: i64) -> Result<DateTime<Utc>, CodecError> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| CodecError::Corrupt {
        reason: format!("{millis} is out of range for an epoch millisecond count"),
        backtrace: Backtrace::capture(),
    })
}
