//! Column encoders.
//!
//! [`ColumnWriter`] turns one column's values into the byte layout described
//! in the [module docs](crate::codec), flushing the sink every `flush_every`
//! values so long columns reach disk incrementally instead of buffering until
//! stream close. The cadence is a latency/memory knob only; readers never see
//! it.

use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use snafu::prelude::*;

use crate::codec::{
    self, BOOL_MISSING, CodecError, DictionarySnafu, IoSnafu, write_string,
};
use crate::dictionary::{Dictionary, KeyWidth};
use crate::table::ColumnData;

/// Encodes one column into a byte sink.
#[derive(Debug)]
pub struct ColumnWriter<W: Write> {
    sink: W,
    flush_every: usize,
    since_flush: usize,
}

impl<W: Write> ColumnWriter<W> {
    /// Create a writer over `sink`.
    ///
    /// `flush_every` is the number of encoded values between flushes of the
    /// sink; 0 means the sink is only flushed when the stream closes.
    pub fn new(sink: W, flush_every: usize) -> Self {
        ColumnWriter {
            sink,
            flush_every,
            since_flush: 0,
        }
    }

    /// Encode a full column.
    ///
    /// # Errors
    /// Returns [`CodecError::Io`] on sink failure,
    /// [`CodecError::Dictionary`] when a short-text column's cardinality
    /// overflows the key space, and [`CodecError::OversizedString`] for a
    /// string the format cannot frame.
    pub fn write(&mut self, data: &ColumnData) -> Result<(), CodecError> {
        match data {
            ColumnData::Float32(values) => self.write_f32s(values),
            ColumnData::Float64(values) => self.write_f64s(values),
            ColumnData::Int32(values) => self.write_i32s(values),
            ColumnData::Int16(values) => self.write_i16s(values),
            ColumnData::Int64(values) => self.write_i64s(values),
            ColumnData::Boolean(values) => self.write_bools(values),
            ColumnData::Date(values) => self.write_dates(values),
            ColumnData::Time(values) => self.write_times(values),
            ColumnData::DateTime(values) => self.write_datetimes(values),
            ColumnData::Instant(values) => self.write_instants(values),
            ColumnData::ShortText(values) => self.write_short_text(values),
            ColumnData::LongText(values) => self.write_long_text(values),
        }
    }

    /// Consume the writer, returning the sink.
    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Count one encoded value and flush the sink when the cadence is due.
    fn tick(&mut self) -> Result<(), CodecError> {
        if self.flush_every == 0 {
            return Ok(());
        }
        self.since_flush += 1;
        if self.since_flush >= self.flush_every {
            self.sink.flush().context(IoSnafu)?;
            self.since_flush = 0;
        }
        Ok(())
    }

    fn write_f32s(&mut self, values: &[f32]) -> Result<(), CodecError> {
        for &value in values {
            self.sink.write_f32::<BigEndian>(value).context(IoSnafu)?;
            self.tick()?;
        }
        Ok(())
    }

    fn write_f64s(&mut self, values: &[f64]) -> Result<(), CodecError> {
        for &value in values {
            self.sink.write_f64::<BigEndian>(value).context(IoSnafu)?;
            self.tick()?;
        }
        Ok(())
    }

    fn write_i32s(&mut self, values: &[i32]) -> Result<(), CodecError> {
        for &value in values {
            self.sink.write_i32::<BigEndian>(value).context(IoSnafu)?;
            self.tick()?;
        }
        Ok(())
    }

    fn write_i16s(&mut self, values: &[i16]) -> Result<(), CodecError> {
        for &value in values {
            self.sink.write_i16::<BigEndian>(value).context(IoSnafu)?;
            self.tick()?;
        }
        Ok(())
    }

    fn write_i64s(&mut self, values: &[i64]) -> Result<(), CodecError> {
        for &value in values {
            self.sink.write_i64::<BigEndian>(value).context(IoSnafu)?;
            self.tick()?;
        }
        Ok(())
    }

    fn write_bools(&mut self, values: &[Option<bool>]) -> Result<(), CodecError> {
        for &value in values {
            let byte = match value {
                Some(true) => 1,
                Some(false) => 0,
                None => BOOL_MISSING,
            };
            self.sink.write_u8(byte).context(IoSnafu)?;
            self.tick()?;
        }
        Ok(())
    }

    fn write_dates(&mut self, values: &[NaiveDate]) -> Result<(), CodecError> {
        for &value in values {
            self.sink
                .write_i32::<BigEndian>(codec::date_to_epoch_days(value))
                .context(IoSnafu)?;
            self.tick()?;
        }
        Ok(())
    }

    fn write_times(&mut self, values: &[NaiveTime]) -> Result<(), CodecError> {
        for &value in values {
            self.sink
                .write_i32::<BigEndian>(codec::time_to_millis_of_day(value))
                .context(IoSnafu)?;
            self.tick()?;
        }
        Ok(())
    }

    fn write_datetimes(&mut self, values: &[NaiveDateTime]) -> Result<(), CodecError> {
        for &value in values {
            self.sink
                .write_i64::<BigEndian>(codec::datetime_to_epoch_millis(value))
                .context(IoSnafu)?;
            self.tick()?;
        }
        Ok(())
    }

    fn write_instants(&mut self, values: &[DateTime<Utc>]) -> Result<(), CodecError> {
        for &value in values {
            self.sink
                .write_i64::<BigEndian>(codec::instant_to_epoch_millis(value))
                .context(IoSnafu)?;
            self.tick()?;
        }
        Ok(())
    }

    /// Dictionary layout: entries first, then the per-row keys, so a reader
    /// can rebuild the lookup table before it touches a single row.
    fn write_short_text(&mut self, values: &[String]) -> Result<(), CodecError> {
        let dict = Dictionary::build(values).context(DictionarySnafu)?;

        self.sink
            .write_u32::<BigEndian>(dict.entries().len() as u32)
            .context(IoSnafu)?;

        for (key, entry) in dict.entries().iter().enumerate() {
            write_key(&mut self.sink, dict.width(), key as u32)?;
            write_string(&mut self.sink, entry)?;
        }

        for &key in dict.keys() {
            write_key(&mut self.sink, dict.width(), key)?;
            self.tick()?;
        }
        Ok(())
    }

    fn write_long_text(&mut self, values: &[String]) -> Result<(), CodecError> {
        for value in values {
            write_string(&mut self.sink, value)?;
            self.tick()?;
        }
        Ok(())
    }
}

fn write_key<W: Write>(sink: &mut W, width: KeyWidth, key: u32) -> Result<(), CodecError> {
    match width {
        KeyWidth::One => sink.write_u8(key as u8),
        KeyWidth::Two => sink.write_u16::<BigEndian>(key as u16),
        KeyWidth::Four => sink.write_u32::<BigEndian>(key),
    }
    .context(IoSnafu)
}
