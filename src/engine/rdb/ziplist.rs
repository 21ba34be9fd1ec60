//! Декодер ziplist: компактного последовательного контейнера.
//!
//! Структура блоба: `zlbytes(4) zltail(4) zllen(2) entries... 0xFF`.
//! Заголовок `zlbytes`/`zltail` пропускается. Каждая запись состоит из
//! prevlen (1 или 5 байт, не интерпретируется), заголовка кодировки и
//! данных. Целые числа возвращаются как десятичный текст.

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use rdbscan_error::{RdbError, RdbResult};
use tracing::trace;

use super::{
    cursor::BlobReader, ZIPLIST_BIGLEN, ZIPLIST_END, ZIPLIST_HEADER_LEN, ZIP_INT_16B, ZIP_INT_24B,
    ZIP_INT_32B, ZIP_INT_64B, ZIP_INT_8B, ZIP_INT_IMM,
};

const STRUCTURE: &str = "ziplist";

/// Заголовок записи ziplist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryHeader {
    /// Строка указанной длины
    Str(usize),
    /// Целое, хранящееся в указанном числе байт (LE)
    Int(usize),
    /// Значение встроено в заголовок
    Immediate(i64),
}

/// Последовательное чтение записей ziplist.
#[derive(Debug)]
pub struct ZiplistDecoder<'a> {
    reader: BlobReader<'a>,
    remaining: usize,
}

impl<'a> ZiplistDecoder<'a> {
    /// Пропускает заголовок и читает число записей.
    pub fn new(blob: &'a [u8]) -> RdbResult<Self> {
        let mut reader = BlobReader::new(blob, STRUCTURE);
        reader.skip(ZIPLIST_HEADER_LEN)?;
        let count = reader.take(2)?;
        let remaining = (usize::from(count[1] & 0x3F) << 8) | usize::from(count[0]);
        trace!(entries = remaining, "ziplist header");
        Ok(Self { reader, remaining })
    }

    /// Заявленное в заголовке число записей, ещё не прочитанных.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Следующая запись; `None` после последней записи или терминатора.
    pub fn next_entry(&mut self) -> RdbResult<Option<Vec<u8>>> {
        if self.remaining == 0 || self.reader.peek()? == ZIPLIST_END {
            self.remaining = 0;
            return Ok(None);
        }
        self.skip_prevlen()?;
        let header = self.read_header()?;
        let entry = match header {
            EntryHeader::Str(len) => self.reader.take(len)?.to_vec(),
            EntryHeader::Int(width) => {
                let bytes = self.reader.take(width)?;
                LittleEndian::read_int(bytes, width).to_string().into_bytes()
            }
            EntryHeader::Immediate(v) => v.to_string().into_bytes(),
        };
        self.remaining -= 1;
        Ok(Some(entry))
    }

    fn skip_prevlen(&mut self) -> RdbResult<()> {
        let first = self.reader.read_u8()?;
        if first >= ZIPLIST_BIGLEN {
            self.reader.skip(4)?;
        }
        Ok(())
    }

    fn read_header(&mut self) -> RdbResult<EntryHeader> {
        let offset = self.reader.position();
        let b0 = self.reader.read_u8()?;

        // 0xF0 и 0xFE проверяются до общих шаблонов по старшим битам.
        let header = match b0 {
            ZIP_INT_8B => EntryHeader::Int(1),
            ZIP_INT_24B => EntryHeader::Int(3),
            _ => match b0 >> 6 {
                0b00 => EntryHeader::Str(usize::from(b0 & 0x3F)),
                0b01 => {
                    let b1 = self.reader.read_u8()?;
                    EntryHeader::Str((usize::from(b0 & 0x3F) << 8) | usize::from(b1))
                }
                0b10 => {
                    let len = BigEndian::read_u32(self.reader.take(4)?);
                    EntryHeader::Str(len as usize)
                }
                _ => match b0 >> 4 {
                    ZIP_INT_16B => EntryHeader::Int(2),
                    ZIP_INT_32B => EntryHeader::Int(4),
                    ZIP_INT_64B => EntryHeader::Int(8),
                    // 1111xxxx, xxxx в 0001..=1101 хранит значение + 1
                    ZIP_INT_IMM if (0x1..=0xD).contains(&(b0 & 0x0F)) => {
                        EntryHeader::Immediate(i64::from(b0 & 0x0F) - 1)
                    }
                    _ => {
                        return Err(RdbError::UnknownEncoding {
                            structure: STRUCTURE.to_string(),
                            encoding: b0,
                            offset: Some(offset as u64),
                            key: None,
                        }
                        .into())
                    }
                },
            },
        };

        if header == EntryHeader::Str(0) {
            return Err(self
                .reader
                .corrupt(format!("zero-length entry at blob offset {offset}"))
                .into());
        }
        Ok(header)
    }
}

/// Декодирует ziplist в список элементов.
pub fn decode_ziplist(blob: &[u8]) -> RdbResult<Vec<Vec<u8>>> {
    let mut decoder = ZiplistDecoder::new(blob)?;
    let mut entries = Vec::with_capacity(decoder.remaining().min(blob.len()));
    while let Some(entry) = decoder.next_entry()? {
        entries.push(entry);
    }
    Ok(entries)
}

/// Декодирует ziplist как чередующиеся пары ключ/значение.
///
/// Читается `count / 2` пар; нечётный хвост игнорируется.
pub fn decode_ziplist_hash(blob: &[u8]) -> RdbResult<HashMap<Vec<u8>, Vec<u8>>> {
    let mut decoder = ZiplistDecoder::new(blob)?;
    let pairs = decoder.remaining() / 2;
    let mut map = HashMap::with_capacity(pairs.min(blob.len()));
    for _ in 0..pairs {
        let Some(field) = decoder.next_entry()? else {
            break;
        };
        let Some(value) = decoder.next_entry()? else {
            break;
        };
        map.insert(field, value);
    }
    Ok(map)
}
