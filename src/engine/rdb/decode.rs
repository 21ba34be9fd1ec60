//! Чтение примитивных значений: строк (сырых, целочисленных, LZF),
//! чисел с плавающей точкой и меток expiry.
//!
//! Целочисленные строки всегда возвращаются в виде десятичного текста,
//! чтобы модель значений не зависела от кодировки в файле.

use byteorder::{ByteOrder, LittleEndian};
use num_enum::TryFromPrimitive;
use rdbscan_error::{RdbError, RdbResult};
use tracing::trace;

use super::{
    expand, read_length, read_plain_length, ByteCursor, Length, DOUBLE_NAN, DOUBLE_NEG_INF,
    DOUBLE_POS_INF,
};

/// Специальные кодировки строки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum SpecialEncoding {
    Int8 = 0,
    Int16 = 1,
    Int32 = 2,
    Lzf = 3,
}

/// Единица измерения метки expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryUnit {
    Milliseconds,
    Seconds,
}

/// Читает строку в любой из кодировок.
pub fn read_string<C: ByteCursor>(cursor: &mut C) -> RdbResult<Vec<u8>> {
    let start = cursor.position();
    match read_length(cursor)? {
        Length::Plain(len) => read_raw(cursor, len),
        Length::Special(code) => {
            let encoding = SpecialEncoding::try_from(code).map_err(|_| RdbError::UnknownEncoding {
                structure: "string".to_string(),
                encoding: code,
                offset: Some(start),
                key: None,
            })?;
            read_encoded(cursor, encoding)
        }
    }
}

fn read_raw<C: ByteCursor>(
    cursor: &mut C,
    len: u64,
) -> RdbResult<Vec<u8>> {
    let n = usize::try_from(len).map_err(|_| RdbError::TruncatedInput {
        context: "reading raw string".to_string(),
        needed: len,
        available: cursor.remaining(),
        offset: Some(cursor.position()),
        key: None,
    })?;
    cursor.read_exact(n)
}

fn read_encoded<C: ByteCursor>(
    cursor: &mut C,
    encoding: SpecialEncoding,
) -> RdbResult<Vec<u8>> {
    let text = match encoding {
        SpecialEncoding::Int8 => decode_int_encoded(&cursor.read_exact(1)?),
        SpecialEncoding::Int16 => decode_int_encoded(&cursor.read_exact(2)?),
        SpecialEncoding::Int32 => decode_int_encoded(&cursor.read_exact(4)?),
        SpecialEncoding::Lzf => return read_lzf(cursor),
    };
    trace!(?encoding, %text, "integer-encoded string");
    Ok(text.into_bytes())
}

fn read_lzf<C: ByteCursor>(cursor: &mut C) -> RdbResult<Vec<u8>> {
    let offset = cursor.position();
    let clen = read_plain_length(cursor)?;
    let ulen = read_plain_length(cursor)?;
    let compressed = read_raw(cursor, clen)?;
    trace!(clen, ulen, "LZF string");

    let ulen = usize::try_from(ulen).map_err(|_| RdbError::CorruptContainer {
        structure: "LZF string".to_string(),
        reason: format!("uncompressed length {ulen} does not fit in memory"),
        offset: Some(offset),
        key: None,
    })?;
    expand(&compressed, ulen).map_err(|e| {
        match e.downcast_ref::<RdbError>() {
            Some(inner) => inner.clone().with_offset(offset).into(),
            None => e,
        }
    })
}

/// Интерпретирует 1, 2 или 4 байта как знаковое целое (LE) и возвращает
/// его десятичную запись.
pub fn decode_int_encoded(bytes: &[u8]) -> String {
    let value: i64 = match bytes.len() {
        1 => i64::from(bytes[0] as i8),
        2 => i64::from(LittleEndian::read_i16(bytes)),
        4 => i64::from(LittleEndian::read_i32(bytes)),
        0 => 0,
        n => LittleEndian::read_int(&bytes[..n.min(8)], n.min(8)),
    };
    value.to_string()
}

/// Читает число с плавающей точкой в текстовом формате.
///
/// Байт длины 253/254/255 означает NaN/+inf/-inf без последующих данных.
pub fn read_double<C: ByteCursor>(cursor: &mut C) -> RdbResult<f64> {
    let offset = cursor.position();
    let len = cursor.read_u8()?;
    match len {
        DOUBLE_NAN => Ok(f64::NAN),
        DOUBLE_POS_INF => Ok(f64::INFINITY),
        DOUBLE_NEG_INF => Ok(f64::NEG_INFINITY),
        n => {
            let buf = cursor.read_exact(usize::from(n))?;
            parse_double(&buf).ok_or_else(|| {
                RdbError::MalformedNumber {
                    text: String::from_utf8_lossy(&buf).into_owned(),
                    offset: Some(offset),
                    key: None,
                }
                .into()
            })
        }
    }
}

fn parse_double(text: &[u8]) -> Option<f64> {
    std::str::from_utf8(text).ok()?.trim().parse::<f64>().ok()
}

/// Читает 8-байтовую метку expiry (LE) и приводит её к секундам.
pub fn read_expiry<C: ByteCursor>(
    cursor: &mut C,
    unit: ExpiryUnit,
) -> RdbResult<u64> {
    let raw = LittleEndian::read_u64(&cursor.read_exact(8)?);
    Ok(match unit {
        ExpiryUnit::Milliseconds => raw / 1000,
        ExpiryUnit::Seconds => raw,
    })
}
