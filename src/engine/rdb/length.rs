//! Поле длины / специальной кодировки.
//!
//! Старшие 2 бита первого байта выбирают формат:
//!
//! | биты | формат | байт |
//! |------|--------|------|
//! | `00` | 6-битная длина | 1 |
//! | `01` | 14-битная длина | 2 |
//! | `10` | 32-битная длина (BE) в следующих 4 байтах | 5 |
//! | `11` | специальная кодировка в младших 6 битах | 1 |

use byteorder::{BigEndian, ByteOrder};
use rdbscan_error::RdbResult;
use tracing::trace;

use super::{ByteCursor, LEN_14BIT, LEN_32BIT, LEN_6BIT};

/// Результат чтения поля длины.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    /// Обычная длина
    Plain(u64),
    /// Специальная кодировка (младшие 6 бит первого байта)
    Special(u8),
}

impl Length {
    /// Числовое значение без учёта флага кодировки.
    ///
    /// Для счётчиков элементов и вложенных длин LZF флаг не проверяется:
    /// возвращается длина или код кодировки как есть.
    pub fn value(self) -> u64 {
        match self {
            Length::Plain(n) => n,
            Length::Special(enc) => u64::from(enc),
        }
    }

    pub fn is_special(self) -> bool {
        matches!(self, Length::Special(_))
    }
}

/// Читает поле длины с курсора.
pub fn read_length<C: ByteCursor>(cursor: &mut C) -> RdbResult<Length> {
    let first = cursor.read_u8()?;
    let len = match first >> 6 {
        LEN_6BIT => Length::Plain(u64::from(first & 0x3F)),
        LEN_14BIT => {
            let second = cursor.read_u8()?;
            Length::Plain((u64::from(first & 0x3F) << 8) | u64::from(second))
        }
        LEN_32BIT => {
            let buf = cursor.read_exact(4)?;
            Length::Plain(u64::from(BigEndian::read_u32(&buf)))
        }
        // LEN_ENCVAL
        _ => Length::Special(first & 0x3F),
    };
    trace!(?len, "length field");
    Ok(len)
}

/// Читает поле длины и возвращает число, игнорируя флаг кодировки.
pub fn read_plain_length<C: ByteCursor>(cursor: &mut C) -> RdbResult<u64> {
    read_length(cursor).map(Length::value)
}
