//! Column decoders.
//!
//! [`ColumnReader`] is the exact inverse of
//! [`ColumnWriter`](crate::codec::write::ColumnWriter): given the declared
//! kind and the row count from the schema sidecar, it consumes the byte
//! stream and rebuilds the column values. Decoding never depends on where the
//! writer flushed; the row count alone bounds every loop.

use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use snafu::{Backtrace, prelude::*};

use crate::codec::{
    self, BOOL_MISSING, CodecError, CorruptSnafu, DictionarySnafu, IoSnafu, read_string,
};
use crate::dictionary::KeyWidth;
use crate::table::{ColumnData, ColumnKind};

/// Decodes one column from a byte stream.
#[derive(Debug)]
pub struct ColumnReader<R: Read> {
    source: R,
    rows: usize,
}

impl<R: Read> ColumnReader<R> {
    /// Create a reader that will decode exactly `rows` values from `source`.
    pub fn new(source: R, rows: usize) -> Self {
        ColumnReader { source, rows }
    }

    /// Decode a full column of the given kind.
    ///
    /// # Errors
    /// Returns [`CodecError::Io`] when the stream fails or ends early and
    /// [`CodecError::Corrupt`] when the bytes cannot be the declared kind.
    pub fn read(&mut self, kind: ColumnKind) -> Result<ColumnData, CodecError> {
        match kind {
            ColumnKind::Float32 => self.read_f32s().map(ColumnData::Float32),
            ColumnKind::Float64 => self.read_f64s().map(ColumnData::Float64),
            ColumnKind::Int32 => self.read_i32s().map(ColumnData::Int32),
            ColumnKind::Int16 => self.read_i16s().map(ColumnData::Int16),
            ColumnKind::Int64 => self.read_i64s().map(ColumnData::Int64),
            ColumnKind::Boolean => self.read_bools().map(ColumnData::Boolean),
            ColumnKind::Date => self.read_dates().map(ColumnData::Date),
            ColumnKind::Time => self.read_times().map(ColumnData::Time),
            ColumnKind::DateTime => self.read_datetimes().map(ColumnData::DateTime),
            ColumnKind::Instant => self.read_instants().map(ColumnData::Instant),
            ColumnKind::ShortText => self.read_short_text().map(ColumnData::ShortText),
            ColumnKind::LongText => self.read_long_text().map(ColumnData::LongText),
        }
    }

    fn read_f32s(&mut self) -> Result<Vec<f32>, CodecError> {
        let mut values = Vec::with_capacity(self.rows);
        for _ in 0..self.rows {
            values.push(self.source.read_f32::<BigEndian>().context(IoSnafu)?);
        }
        Ok(values)
    }

    fn read_f64s(&mut self) -> Result<Vec<f64>, CodecError> {
        let mut values = Vec::with_capacity(self.rows);
        for _ in 0..self.rows {
            values.push(self.source.read_f64::<BigEndian>().context(IoSnafu)?);
        }
        Ok(values)
    }

    fn read_i32s(&mut self) -> Result<Vec<i32>, CodecError> {
        let mut values = Vec::with_capacity(self.rows);
        for _ in 0..self.rows {
            values.push(self.source.read_i32::<BigEndian>().context(IoSnafu)?);
        }
        Ok(values)
    }

    fn read_i16s(&mut self) -> Result<Vec<i16>, CodecError> {
        let mut values = Vec::with_capacity(self.rows);
        for _ in 0..self.rows {
            values.push(self.source.read_i16::<BigEndian>().context(IoSnafu)?);
        }
        Ok(values)
    }

    fn read_i64s(&mut self) -> Result<Vec<i64>, CodecError> {
        let mut values = Vec::with_capacity(self.rows);
        for _ in 0..self.rows {
            values.push(self.source.read_i64::<BigEndian>().context(IoSnafu)?);
        }
        Ok(values)
    }

    fn read_bools(&mut self) -> Result<Vec<Option<bool>>, CodecError> {
        let mut values = Vec::with_capacity(self.rows);
        for _ in 0..self.rows {
            let byte = self.source.read_u8().context(IoSnafu)?;
            let value = match byte {
                0 => Some(false),
                1 => Some(true),
                BOOL_MISSING => None,
                other => {
                    return CorruptSnafu {
                        reason: format!("{other:#04x} is not a boolean byte"),
                    }
                    .fail();
                }
            };
            values.push(value);
        }
        Ok(values)
    }

    fn read_dates(&mut self) -> Result<Vec<NaiveDate>, CodecError> {
        let mut values = Vec::with_capacity(self.rows);
        for _ in 0..self.rows {
            let days = self.source.read_i32::<BigEndian>().context(IoSnafu)?;
            values.push(codec::date_from_epoch_days(days)?);
        }
        Ok(values)
    }

    fn read_times(&mut self) -> Result<Vec<NaiveTime>, CodecError> {
        let mut values = Vec::with_capacity(self.rows);
        for _ in 0..self.rows {
            let millis = self.source.read_i32::<BigEndian>().context(IoSnafu)?;
            values.push(codec::time_from_millis_of_day(millis)?);
        }
        Ok(values)
    }

    fn read_datetimes(&mut self) -> Result<Vec<NaiveDateTime>, CodecError> {
        let mut values = Vec::with_capacity(self.rows);
        for _ in 0..self.rows {
            let millis = self.source.read_i64::<BigEndian>().context(IoSnafu)?;
            values.push(codec::datetime_from_epoch_millis(millis)?);
        }
        Ok(values)
    }

    fn read_instants(&mut self) -> Result<Vec<DateTime<Utc>>, CodecError> {
        let mut values = Vec::with_capacity(self.rows);
        for _ in 0..self.rows {
            let millis = self.source.read_i64::<BigEndian>().context(IoSnafu)?;
            values.push(codec::instant_from_epoch_millis(millis)?);
        }
        Ok(values)
    }

    /// Rebuild the dictionary from the header, then map the per-row keys
    /// back through it. Entries may arrive in any order but every key slot
    /// below the declared count must be filled exactly once.
    fn read_short_text(&mut self) -> Result<Vec<String>, CodecError> {
        let count = self.source.read_u32::<BigEndian>().context(IoSnafu)? as usize;
        // A dictionary can never hold more distinct strings than rows; a
        // larger count is a corrupt header, caught before any allocation.
        ensure!(
            count <= self.rows,
            CorruptSnafu {
                reason: format!(
                    "dictionary claims {count} distinct strings for {} rows",
                    self.rows
                ),
            }
        );
        // Same width the writer derived from the same cardinality.
        let width = KeyWidth::for_cardinality(count).context(DictionarySnafu)?;

        let mut entries: Vec<Option<String>> = vec![None; count];
        for _ in 0..count {
            let key = read_key(&mut self.source, width)? as usize;
            ensure!(
                key < count,
                CorruptSnafu {
                    reason: format!("dictionary entry key {key} out of range (count {count})"),
                }
            );
            let value = read_string(&mut self.source)?;
            ensure!(
                entries[key].is_none(),
                CorruptSnafu {
                    reason: format!("dictionary entry key {key} appears twice"),
                }
            );
            entries[key] = Some(value);
        }
        let entries: Vec<String> = entries
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| CodecError::Corrupt {
                    reason: "dictionary key space has a gap".to_string(),
                    backtrace: Backtrace::capture(),
                })
            })
            .collect::<Result<_, _>>()?;

        let mut values = Vec::with_capacity(self.rows);
        for _ in 0..self.rows {
            let key = read_key(&mut self.source, width)? as usize;
            let entry = entries.get(key).ok_or_else(|| CodecError::Corrupt {
                reason: format!("row key {key} out of range (count {count})"),
                backtrace: Backtrace::capture(),
            })?;
            values.push(entry.clone());
        }
        Ok(values)
    }

    fn read_long_text(&mut self) -> Result<Vec<String>, CodecError> {
        let mut values = Vec::with_capacity(self.rows);
        for _ in 0..self.rows {
            values.push(read_string(&mut self.source)?);
        }
        Ok(values)
    }
}

fn read_key<R: Read>(source: &mut R, width: KeyWidth) -> Result<u32, CodecError> {
    match width {
        KeyWidth::One => source.read_u8().map(u32::from),
        KeyWidth::Two => source.read_u16::<BigEndian>().map(u32::from),
        KeyWidth::Four => source.read_u32::<BigEndian>(),
    }
    .context(IoSnafu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::write::ColumnWriter;

    fn round_trip(data: &ColumnData) -> ColumnData {
        let mut writer = ColumnWriter::new(Vec::new(), 0);
        writer.write(data).unwrap();
        let bytes = writer.into_inner();
        ColumnReader::new(bytes.as_slice(), data.len())
            .read(data.kind())
            .unwrap()
    }

    #[test]
    fn numeric_boundaries_survive_the_codec() {
        let data = ColumnData::Int16(vec![i16::MIN, -1, 0, 1, i16::MAX]);
        assert_eq!(round_trip(&data), data);

        let data = ColumnData::Int64(vec![i64::MIN, i64::MAX, 0]);
        assert_eq!(round_trip(&data), data);
    }

    #[test]
    fn float_nan_bits_survive_the_codec() {
        let bits = [f64::NAN.to_bits(), f64::INFINITY.to_bits(), 0u64];
        let data = ColumnData::Float64(bits.iter().map(|&b| f64::from_bits(b)).collect());
        match round_trip(&data) {
            ColumnData::Float64(values) => {
                let back: Vec<u64> = values.iter().map(|v| v.to_bits()).collect();
                assert_eq!(back, bits);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn temporal_kinds_survive_the_codec() {
        let data = ColumnData::Date(vec![
            NaiveDate::from_ymd_opt(1969, 7, 20).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(),
        ]);
        assert_eq!(round_trip(&data), data);

        let data = ColumnData::DateTime(vec![
            NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_milli_opt(3, 4, 5, 678)
                .unwrap(),
        ]);
        assert_eq!(round_trip(&data), data);

        let data = ColumnData::Instant(vec![
            DateTime::<Utc>::from_timestamp_millis(-1).unwrap(),
            DateTime::<Utc>::from_timestamp_millis(1_700_000_000_123).unwrap(),
        ]);
        assert_eq!(round_trip(&data), data);
    }

    #[test]
    fn short_text_with_duplicates_and_unicode_survives() {
        let values: Vec<String> = ["naïve", "タコ", "naïve", "", "タコ"]
            .into_iter()
            .map(String::from)
            .collect();
        let data = ColumnData::ShortText(values);
        assert_eq!(round_trip(&data), data);
    }

    #[test]
    fn bad_boolean_byte_is_corrupt() {
        let err = ColumnReader::new([0x7Fu8].as_slice(), 1)
            .read(ColumnKind::Boolean)
            .unwrap_err();
        assert!(matches!(err, CodecError::Corrupt { .. }));
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let mut writer = ColumnWriter::new(Vec::new(), 0);
        writer.write(&ColumnData::Int32(vec![1, 2, 3])).unwrap();
        let mut bytes = writer.into_inner();
        bytes.truncate(bytes.len() - 2);

        let err = ColumnReader::new(bytes.as_slice(), 3)
            .read(ColumnKind::Int32)
            .unwrap_err();
        assert!(matches!(err, CodecError::Io { .. }));
    }

    #[test]
    fn out_of_range_dictionary_row_key_is_corrupt() {
        // Header: one entry ("a" under key 0), then a row key pointing past it.
        let bytes: Vec<u8> = [
            &[0u8, 0, 0, 1][..],
            &[0],
            &[0, 0, 0, 1],
            b"a",
            &[5],
        ]
        .concat();
        let err = ColumnReader::new(bytes.as_slice(), 1)
            .read(ColumnKind::ShortText)
            .unwrap_err();
        assert!(matches!(err, CodecError::Corrupt { .. }));
    }

    #[test]
    fn out_of_range_time_value_is_corrupt() {
        let bytes = (-5i32).to_be_bytes();
        let err = ColumnReader::new(bytes.as_slice(), 1)
            .read(ColumnKind::Time)
            .unwrap_err();
        assert!(matches!(err, CodecError::Corrupt { .. }));
    }
}
