//! Column/parameter descriptions and the value translators attached to them.
//!
//! Each field of a data record sits at a 1-based `buf_pos`; its define byte
//! is the byte before it. `0xFF` marks NULL, `0xFE` the special NULL value
//! the server produces for arithmetic errors. A [`Translator`] is picked
//! from the data type once, when the short field info is parsed, and then
//! converts between the record bytes and [`MaxDbValue`].

use std::str::FromStr;

use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{Error, Result};
use crate::protocol::buffer::{latin1_bytes, utf16_bytes, ByteBuffer};
use crate::protocol::constants::*;
use crate::protocol::number;
use crate::protocol::request::FixedDataPartWriter;

use super::data_type::DataType;
use super::lob::{LongDescriptor, LongKind, LongValue};
use super::value::MaxDbValue;

const TIME_SIZE: usize = 8;
const DATE_SIZE: usize = 10;
const TIMESTAMP_SIZE: usize = 26;
const FLOAT_INPUT_DIGITS: usize = 16;

/// Conversion strategy for one field, chosen from its data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translator {
    /// Single-byte character data. With `space_option` an empty string
    /// reads back as a single blank.
    String { space_option: bool },
    /// UTF-16 character data.
    UnicodeString { space_option: bool },
    Bytes,
    Boolean,
    Numeric,
    Time { unicode: bool },
    Date { unicode: bool },
    Timestamp { unicode: bool },
    AsciiStream,
    BinaryStream,
    UnicodeStream,
}

impl Translator {
    /// Pick the translator for `data_type` in a session with the given
    /// options.
    pub fn for_type(data_type: DataType, space_option: bool, unicode: bool) -> Self {
        match data_type {
            DataType::Cha | DataType::Che | DataType::VarcharA | DataType::VarcharE => {
                if unicode {
                    Translator::UnicodeString { space_option }
                } else {
                    Translator::String { space_option }
                }
            }
            DataType::Chb | DataType::VarcharB => Translator::Bytes,
            DataType::Unicode | DataType::VarcharUni => Translator::UnicodeString { space_option },
            DataType::Boolean => Translator::Boolean,
            DataType::Time => Translator::Time { unicode },
            DataType::Date => Translator::Date { unicode },
            DataType::Timestamp => Translator::Timestamp { unicode },
            DataType::Fixed
            | DataType::Float
            | DataType::VFloat
            | DataType::SmallInt
            | DataType::Integer => Translator::Numeric,
            DataType::StrA | DataType::StrE | DataType::LongA | DataType::LongE => {
                Translator::AsciiStream
            }
            DataType::StrB | DataType::LongB => Translator::BinaryStream,
            DataType::StrUni | DataType::LongUni => Translator::UnicodeStream,
            DataType::Other(_) => Translator::Bytes,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(
            self,
            Translator::AsciiStream | Translator::BinaryStream | Translator::UnicodeStream
        )
    }

    /// Read the value of `field` from `record`.
    ///
    /// `record` has its origin at the start of the row. `part_data` is the
    /// payload of the data part the row came from; long values address
    /// their inline bytes relative to it.
    pub fn get(
        &self,
        field: &FieldInfo,
        record: &ByteBuffer<&[u8]>,
        part_data: &[u8],
    ) -> Result<MaxDbValue> {
        let pos = field.data_pos()?;
        let define = record.read_u8(pos - 1)?;
        if define == UNDEF_BYTE {
            return Ok(MaxDbValue::Null);
        }
        let special_null = define == SPECIAL_NULL_BYTE;

        match self {
            Translator::String { space_option } => {
                let text = record.read_ascii(pos, field.char_len())?;
                Ok(MaxDbValue::String(finish_text(field, text, *space_option)))
            }
            Translator::UnicodeString { space_option } => {
                let text = record.read_unicode(pos, field.char_len() * 2)?;
                Ok(MaxDbValue::String(finish_text(field, text, *space_option)))
            }
            Translator::Bytes => Ok(MaxDbValue::Bytes(record.read_bytes(pos, field.data_len())?)),
            Translator::Boolean => Ok(MaxDbValue::Boolean(record.read_u8(pos)? != 0)),
            Translator::Numeric => {
                if special_null {
                    if field.data_type.is_floating() {
                        return Ok(MaxDbValue::Float(f64::NAN));
                    }
                    return Err(Error::type_conversion(format!(
                        "special null value in {} column",
                        field.data_type
                    )));
                }
                let raw = record.slice(pos, field.data_len())?;
                match field.data_type {
                    DataType::SmallInt | DataType::Integer => {
                        Ok(MaxDbValue::Integer(number::decode_to_i64(raw)?))
                    }
                    DataType::Float | DataType::VFloat => {
                        let value = number::decode_to_decimal(raw)?;
                        value.to_f64().map(MaxDbValue::Float).ok_or_else(|| {
                            Error::numeric("value does not fit into a double", raw)
                        })
                    }
                    _ => Ok(MaxDbValue::Decimal(
                        number::decode_to_decimal(raw)?.with_scale(field.frac as i64),
                    )),
                }
            }
            Translator::Time { unicode } => {
                let text = read_temporal(record, pos, field.data_len(), *unicode, TIME_SIZE)?;
                NaiveTime::parse_from_str(&text, "%H:%M:%S")
                    .map(MaxDbValue::Time)
                    .map_err(|_| parse_error(&text, "time"))
            }
            Translator::Date { unicode } => {
                let text = read_temporal(record, pos, field.data_len(), *unicode, DATE_SIZE)?;
                NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                    .map(MaxDbValue::Date)
                    .map_err(|_| parse_error(&text, "date"))
            }
            Translator::Timestamp { unicode } => {
                let text =
                    read_temporal(record, pos, field.data_len(), *unicode, TIMESTAMP_SIZE)?;
                NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f")
                    .map(MaxDbValue::Timestamp)
                    .map_err(|_| parse_error(&text, "timestamp"))
            }
            Translator::AsciiStream | Translator::BinaryStream | Translator::UnicodeStream => {
                let kind = match self {
                    Translator::AsciiStream => LongKind::Ascii,
                    Translator::BinaryStream => LongKind::Binary,
                    _ => LongKind::Unicode,
                };
                let raw = record.slice(pos, LONG_DESC_SIZE)?;
                let descriptor = LongDescriptor::from_bytes(raw, record.swapped())?;
                if descriptor.has_inline_data() {
                    let data = descriptor.inline_data(part_data)?.to_vec();
                    Ok(MaxDbValue::Long(LongValue::with_data(
                        kind,
                        descriptor,
                        data,
                        record.swapped(),
                    )))
                } else {
                    Ok(MaxDbValue::Long(LongValue::descriptor_only(kind, descriptor)))
                }
            }
        }
    }

    /// Write `value` for `field` into the current record of `writer`.
    /// Output-only fields are skipped.
    pub fn put(
        &self,
        field: &FieldInfo,
        writer: &mut FixedDataPartWriter<'_>,
        value: &MaxDbValue,
    ) -> Result<()> {
        if !field.is_input() {
            return Ok(());
        }
        let pos = field.data_pos()?;
        let len = field.data_len();
        if value.is_null() {
            return writer.write_null(pos, len);
        }

        match self {
            Translator::String { .. } => {
                let bytes = latin1_bytes(&input_text(field, value)?);
                check_fits(field, bytes.len())?;
                writer.write_field(DEFINED_ASCII, pos, &bytes, len, b" ")
            }
            Translator::UnicodeString { .. } => {
                let bytes = utf16_bytes(&input_text(field, value)?, true);
                check_fits(field, bytes.len())?;
                writer.write_field(DEFINED_UNICODE, pos, &bytes, len, &[0x20, 0x00])
            }
            Translator::Bytes => match value {
                MaxDbValue::Bytes(bytes) => {
                    check_fits(field, bytes.len())?;
                    writer.write_field(DEFINED_BINARY, pos, bytes, len, &[0])
                }
                other => Err(set_error(field, other)),
            },
            Translator::Boolean => {
                let flag = match value {
                    MaxDbValue::Boolean(b) => *b,
                    MaxDbValue::Integer(v) => *v != 0,
                    MaxDbValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                        "true" | "1" => true,
                        "false" | "0" => false,
                        _ => return Err(parse_error(s, "boolean")),
                    },
                    other => return Err(set_error(field, other)),
                };
                writer.write_field(DEFINED_BINARY, pos, &[flag as u8], len, &[0])
            }
            Translator::Numeric => {
                let bytes = numeric_input(field, value)?;
                check_fits(field, bytes.len())?;
                writer.write_field(DEFINED_BINARY, pos, &bytes, len, &[0])
            }
            Translator::Time { unicode } => {
                let time = match value {
                    MaxDbValue::Time(t) => *t,
                    MaxDbValue::Timestamp(ts) => ts.time(),
                    MaxDbValue::String(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S")
                        .map_err(|_| parse_error(s, "time"))?,
                    other => return Err(set_error(field, other)),
                };
                put_temporal(field, writer, &time.format("%H:%M:%S").to_string(), *unicode)
            }
            Translator::Date { unicode } => {
                let date = match value {
                    MaxDbValue::Date(d) => *d,
                    MaxDbValue::Timestamp(ts) => ts.date(),
                    MaxDbValue::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                        .map_err(|_| parse_error(s, "date"))?,
                    other => return Err(set_error(field, other)),
                };
                put_temporal(field, writer, &date.format("%Y-%m-%d").to_string(), *unicode)
            }
            Translator::Timestamp { unicode } => {
                let ts = match value {
                    MaxDbValue::Timestamp(ts) => *ts,
                    MaxDbValue::Date(d) => d.and_time(NaiveTime::default()),
                    MaxDbValue::String(s) => {
                        NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S%.f")
                            .map_err(|_| parse_error(s, "timestamp"))?
                    }
                    other => return Err(set_error(field, other)),
                };
                let text = ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string();
                put_temporal(field, writer, &text, *unicode)
            }
            Translator::AsciiStream | Translator::BinaryStream | Translator::UnicodeStream => {
                Err(Error::LongInputUnsupported {
                    data_type: field.data_type.to_string(),
                    value: value.kind_name().to_string(),
                })
            }
        }
    }
}

fn finish_text(field: &FieldInfo, text: String, space_option: bool) -> String {
    let text = if field.data_type.is_varchar() {
        text.trim_end_matches(' ').to_string()
    } else {
        text
    };
    if space_option && text.is_empty() {
        " ".to_string()
    } else {
        text
    }
}

fn read_temporal(
    record: &ByteBuffer<&[u8]>,
    pos: usize,
    data_len: usize,
    unicode: bool,
    chars: usize,
) -> Result<String> {
    let text = if unicode {
        record.read_unicode(pos, data_len.min(chars * 2))?
    } else {
        record.read_ascii(pos, data_len.min(chars))?
    };
    Ok(text.trim_end().to_string())
}

fn put_temporal(
    field: &FieldInfo,
    writer: &mut FixedDataPartWriter<'_>,
    text: &str,
    unicode: bool,
) -> Result<()> {
    let len = field.data_len();
    if unicode {
        let bytes = utf16_bytes(text, true);
        check_fits(field, bytes.len())?;
        writer.write_field(DEFINED_UNICODE, field.data_pos()?, &bytes, len, &[0x20, 0x00])
    } else {
        check_fits(field, text.len())?;
        writer.write_field(DEFINED_ASCII, field.data_pos()?, text.as_bytes(), len, b" ")
    }
}

fn input_text(field: &FieldInfo, value: &MaxDbValue) -> Result<String> {
    match value {
        MaxDbValue::String(s) => Ok(s.clone()),
        MaxDbValue::Bytes(b) => Ok(b.iter().map(|&c| c as char).collect()),
        MaxDbValue::Long(_) => Err(set_error(field, value)),
        other => Ok(other.to_string()),
    }
}

fn numeric_input(field: &FieldInfo, value: &MaxDbValue) -> Result<Vec<u8>> {
    let decimal = match value {
        MaxDbValue::Integer(v) if field.data_type != DataType::Fixed || field.frac == 0 => {
            return number::encode_i64(*v);
        }
        MaxDbValue::Integer(v) => BigDecimal::from(*v),
        MaxDbValue::Boolean(b) => return number::encode_i64(*b as i64),
        MaxDbValue::Decimal(d) => d.clone(),
        MaxDbValue::Float(f) => {
            if !f.is_finite() {
                return Err(Error::type_conversion(format!(
                    "special number {} is not supported",
                    f
                )));
            }
            let d = BigDecimal::from_f64(*f)
                .ok_or_else(|| Error::type_conversion(format!("cannot convert {}", f)))?;
            let d = scale_for(field, d);
            return number::encode_decimal_with_digits(&d, FLOAT_INPUT_DIGITS);
        }
        MaxDbValue::String(s) => {
            BigDecimal::from_str(s.trim()).map_err(|_| parse_error(s, "number"))?
        }
        other => return Err(set_error(field, other)),
    };
    number::encode_decimal(&scale_for(field, decimal))
}

fn scale_for(field: &FieldInfo, value: BigDecimal) -> BigDecimal {
    if field.data_type == DataType::Fixed {
        value.with_scale(field.frac as i64)
    } else {
        value
    }
}

fn check_fits(field: &FieldInfo, len: usize) -> Result<()> {
    if len > field.data_len() {
        return Err(Error::type_conversion(format!(
            "value of {} bytes overflows {} field of {} bytes",
            len,
            field.data_type,
            field.data_len()
        )));
    }
    Ok(())
}

fn set_error(field: &FieldInfo, value: &MaxDbValue) -> Error {
    Error::type_conversion(format!(
        "cannot convert {} to {}",
        value.kind_name(),
        field.data_type
    ))
}

fn parse_error(text: &str, target: &str) -> Error {
    Error::type_conversion(format!("cannot parse '{}' as {}", text, target))
}

/// Description of one column or parameter (`tsp1_param_info`).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub mode: u8,
    pub io_type: u8,
    pub data_type: DataType,
    pub frac: u8,
    /// Logical length in characters or digits.
    pub length: i16,
    /// Physical length including the define byte.
    pub io_length: i16,
    /// 1-based position in the record, or the parameter number for
    /// variable-input parameters.
    pub buf_pos: i32,
    pub translator: Translator,
    pub name: Option<String>,
}

impl FieldInfo {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mode: u8,
        io_type: u8,
        data_type: u8,
        frac: u8,
        length: i16,
        io_length: i16,
        buf_pos: i32,
        space_option: bool,
        unicode: bool,
    ) -> Self {
        let data_type = DataType::from_code(data_type);
        Self {
            mode,
            io_type,
            data_type,
            frac,
            length,
            io_length,
            buf_pos,
            translator: Translator::for_type(data_type, space_option, unicode),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_input(&self) -> bool {
        self.io_type != PARAM_IO_OUTPUT
    }

    pub fn is_output(&self) -> bool {
        self.io_type != PARAM_IO_INPUT
    }

    /// `None` when the server leaves nullability unspecified.
    pub fn is_nullable(&self) -> Option<bool> {
        if self.mode & PARAM_MODE_MANDATORY != 0 {
            Some(false)
        } else if self.mode & PARAM_MODE_OPTIONAL != 0 {
            Some(true)
        } else {
            None
        }
    }

    pub fn is_long(&self) -> bool {
        self.data_type.is_long()
    }

    /// Data bytes behind the define byte.
    pub fn data_len(&self) -> usize {
        (self.io_length.max(1) - 1) as usize
    }

    fn char_len(&self) -> usize {
        (self.length.max(0) as usize).min(self.data_len())
    }

    fn data_pos(&self) -> Result<usize> {
        if self.buf_pos < 1 {
            return Err(Error::framing(
                format!("field position {} in data record", self.buf_pos),
                &[],
            ));
        }
        Ok(self.buf_pos as usize)
    }

    /// Read this field's value from a data record.
    pub fn get(&self, record: &ByteBuffer<&[u8]>, part_data: &[u8]) -> Result<MaxDbValue> {
        self.translator.get(self, record, part_data)
    }

    /// Write a parameter value into the current record.
    pub fn put(&self, writer: &mut FixedDataPartWriter<'_>, value: &MaxDbValue) -> Result<()> {
        self.translator.put(self, writer, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::request::RequestPacket;

    fn field(data_type: u8, frac: u8, length: i16, io_length: i16, buf_pos: i32) -> FieldInfo {
        FieldInfo::new(
            PARAM_MODE_OPTIONAL,
            PARAM_IO_INPUT,
            data_type,
            frac,
            length,
            io_length,
            buf_pos,
            false,
            false,
        )
    }

    /// Record with `data` placed behind `define` at 1-based `buf_pos`.
    fn record(define: u8, buf_pos: usize, data: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; buf_pos + data.len()];
        out[buf_pos - 1] = define;
        out[buf_pos..].copy_from_slice(data);
        out
    }

    fn read(info: &FieldInfo, rec: &[u8]) -> MaxDbValue {
        info.get(&ByteBuffer::new(rec, true), &[]).unwrap()
    }

    #[test]
    fn test_translator_selection() {
        assert_eq!(
            Translator::for_type(DataType::Cha, true, false),
            Translator::String { space_option: true }
        );
        assert_eq!(
            Translator::for_type(DataType::VarcharA, false, true),
            Translator::UnicodeString { space_option: false }
        );
        assert_eq!(Translator::for_type(DataType::Chb, false, true), Translator::Bytes);
        assert_eq!(Translator::for_type(DataType::Integer, false, false), Translator::Numeric);
        assert_eq!(
            Translator::for_type(DataType::Date, false, true),
            Translator::Date { unicode: true }
        );
        assert_eq!(Translator::for_type(DataType::LongUni, false, false), Translator::UnicodeStream);
        assert!(Translator::for_type(DataType::StrB, false, false).is_stream());
        assert_eq!(Translator::for_type(DataType::Other(99), false, false), Translator::Bytes);
    }

    #[test]
    fn test_null_define_byte() {
        let info = field(DT_VARCHARA, 0, 4, 5, 1);
        assert!(read(&info, &record(UNDEF_BYTE, 1, b"abcd")).is_null());
    }

    #[test]
    fn test_string_trimming_and_space_option() {
        let varchar = field(DT_VARCHARA, 0, 5, 6, 3);
        let rec = record(DEFINED_ASCII, 3, b"ab   ");
        assert_eq!(read(&varchar, &rec).as_str(), Some("ab"));

        let fixed = field(DT_CHA, 0, 5, 6, 3);
        assert_eq!(read(&fixed, &rec).as_str(), Some("ab   "));

        let spaced = FieldInfo::new(
            PARAM_MODE_OPTIONAL,
            PARAM_IO_OUTPUT,
            DT_VARCHARA,
            0,
            3,
            4,
            1,
            true,
            false,
        );
        assert_eq!(read(&spaced, &record(DEFINED_ASCII, 1, b"   ")).as_str(), Some(" "));
    }

    #[test]
    fn test_unicode_string() {
        let info = FieldInfo::new(PARAM_MODE_OPTIONAL, PARAM_IO_OUTPUT, DT_VARCHARUNI, 0, 2, 5, 1, false, true);
        let rec = record(DEFINED_UNICODE, 1, &[0xFC, 0x00, 0x20, 0x00]);
        assert_eq!(read(&info, &rec).as_str(), Some("\u{00fc}"));
    }

    #[test]
    fn test_numeric_values() {
        // 12345 as INTEGER(10)
        let int = field(DT_INTEGER, 0, 10, 7, 1);
        let rec = record(DEFINED_BINARY, 1, &[0xC5, 0x12, 0x34, 0x50, 0, 0]);
        assert_eq!(read(&int, &rec), MaxDbValue::Integer(12345));

        // 123.45 as FIXED(10,2) keeps its scale
        let fixed = field(DT_FIXED, 2, 10, 7, 1);
        let rec = record(DEFINED_BINARY, 1, &[0xC3, 0x12, 0x34, 0x50, 0, 0]);
        assert_eq!(read(&fixed, &rec).to_string(), "123.45");

        let float = field(DT_FLOAT, 0, 10, 7, 1);
        assert_eq!(read(&float, &rec), MaxDbValue::Float(123.45));
    }

    #[test]
    fn test_special_null() {
        let fixed = field(DT_FIXED, 0, 10, 7, 1);
        let rec = record(SPECIAL_NULL_BYTE, 1, &[0; 6]);
        let err = fixed.get(&ByteBuffer::new(&rec[..], true), &[]).unwrap_err();
        assert!(matches!(err, Error::TypeConversion { .. }));

        let float = field(DT_VFLOAT, 0, 10, 7, 1);
        assert!(read(&float, &rec).to_f64().unwrap().is_nan());
    }

    #[test]
    fn test_temporal_values() {
        let time = field(DT_TIME, 0, 8, 9, 1);
        let value = read(&time, &record(DEFINED_ASCII, 1, b"13:05:09"));
        assert_eq!(value, MaxDbValue::Time(NaiveTime::from_hms_opt(13, 5, 9).unwrap()));

        let date = field(DT_DATE, 0, 10, 11, 1);
        let value = read(&date, &record(DEFINED_ASCII, 1, b"2024-02-29"));
        assert_eq!(value.to_string(), "2024-02-29");

        let ts = field(DT_TIMESTAMP, 0, 26, 27, 1);
        let value = read(&ts, &record(DEFINED_ASCII, 1, b"2024-02-29 13:05:09.000120"));
        assert_eq!(value.to_string(), "2024-02-29 13:05:09.000120");

        let bad = date.get(&ByteBuffer::new(&record(DEFINED_ASCII, 1, b"2024-13-01")[..], true), &[]);
        assert!(matches!(bad, Err(Error::TypeConversion { .. })));
    }

    #[test]
    fn test_long_descriptor_with_inline_data() {
        let descriptor = LongDescriptor {
            descriptor: [9; 8],
            tab_id: [0; 8],
            max_len: 5,
            intern_pos: 1,
            info_set: 0,
            state: 0,
            val_mode: LONG_VALMODE_ALL_DATA,
            val_ind: 1,
            val_pos: 42,
            val_len: 5,
        };
        let raw = descriptor.to_bytes(true).unwrap();
        let rec = record(DEFINED_BINARY, 1, &raw);
        let mut part = rec.clone();
        part.extend_from_slice(b"hello");

        let info = field(DT_LONGA, 0, 40, 41, 1);
        let value = info.get(&ByteBuffer::new(&rec[..], true), &part).unwrap();
        let long = value.as_long().unwrap();
        assert!(long.is_complete());
        assert_eq!(long.as_string(), Some("hello".to_string()));
    }

    #[test]
    fn test_put_values() {
        let mut packet = RequestPacket::new(4096, false).unwrap();
        packet.init_execute(&[1u8; PARSE_ID_SIZE], false).unwrap();
        let name = field(DT_VARCHARA, 0, 4, 5, 1);
        let amount = field(DT_FIXED, 2, 5, 5, 6);
        let flag = field(DT_BOOLEAN, 0, 1, 2, 11);
        {
            let mut writer = packet.new_data_part(PARTKIND_DATA).unwrap();
            name.put(&mut writer, &MaxDbValue::from("ab")).unwrap();
            amount.put(&mut writer, &MaxDbValue::from(12i64)).unwrap();
            flag.put(&mut writer, &MaxDbValue::Null).unwrap();

            let rec = writer.record();
            assert_eq!(rec.slice(0, 5).unwrap(), b" ab  ");
            // 12.00 -> 0.12E2
            assert_eq!(rec.slice(5, 5).unwrap(), &[0, 0xC2, 0x12, 0, 0]);
            assert_eq!(rec.read_u8(10).unwrap(), UNDEF_BYTE);
            assert_eq!(writer.extent(), 12);
            writer.close().unwrap();
        }

        let mut packet = RequestPacket::new(4096, false).unwrap();
        packet.init_execute(&[1u8; PARSE_ID_SIZE], false).unwrap();
        let mut writer = packet.new_data_part(PARTKIND_DATA).unwrap();
        let err = name.put(&mut writer, &MaxDbValue::from("abcde")).unwrap_err();
        assert!(matches!(err, Error::TypeConversion { .. }));
        let err = amount.put(&mut writer, &MaxDbValue::Float(f64::INFINITY)).unwrap_err();
        assert!(matches!(err, Error::TypeConversion { .. }));
    }

    #[test]
    fn test_long_input_is_rejected_but_null_is_written() {
        let mut packet = RequestPacket::new(4096, false).unwrap();
        packet.init_execute(&[1u8; PARSE_ID_SIZE], false).unwrap();
        let mut writer = packet.new_data_part(PARTKIND_DATA).unwrap();
        let clob = field(DT_LONGA, 0, LONG_DESC_SIZE as i16, LONG_DESC_SIZE as i16 + 1, 1);
        let blob = field(DT_LONGB, 0, LONG_DESC_SIZE as i16, LONG_DESC_SIZE as i16 + 1, 42);

        let err = clob.put(&mut writer, &MaxDbValue::from("text")).unwrap_err();
        match &err {
            Error::LongInputUnsupported { data_type, value } => {
                assert_eq!(data_type, &DataType::LongA.to_string());
                assert_eq!(value, "string");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(err.key(), "LONG_INPUT_UNSUPPORTED");
        assert!(!err.is_fatal_to_session());

        let err = blob.put(&mut writer, &MaxDbValue::from(vec![1u8, 2])).unwrap_err();
        assert!(matches!(err, Error::LongInputUnsupported { .. }));

        clob.put(&mut writer, &MaxDbValue::Null).unwrap();
        assert_eq!(writer.record().read_u8(0).unwrap(), UNDEF_BYTE);
    }

    #[test]
    fn test_put_skips_output_fields() {
        let mut packet = RequestPacket::new(4096, false).unwrap();
        packet.init_execute(&[1u8; PARSE_ID_SIZE], false).unwrap();
        let mut writer = packet.new_data_part(PARTKIND_DATA).unwrap();
        let out = FieldInfo::new(PARAM_MODE_OPTIONAL, PARAM_IO_OUTPUT, DT_INTEGER, 0, 10, 7, 1, false, false);
        out.put(&mut writer, &MaxDbValue::from(1i64)).unwrap();
        assert_eq!(writer.extent(), 0);
    }

    #[test]
    fn test_nullability() {
        let mut info = field(DT_INTEGER, 0, 10, 7, 1);
        assert_eq!(info.is_nullable(), Some(true));
        info.mode = PARAM_MODE_MANDATORY;
        assert_eq!(info.is_nullable(), Some(false));
        info.mode = 0;
        assert_eq!(info.is_nullable(), None);
    }
}
