//! Декодер zipmap: упакованного словаря старых версий формата.
//!
//! Структура блоба: `zmlen(1) (len key len free value padding)* 0xFF`.
//! Длина занимает 1 байт, если она меньше 254, иначе 5 байт, где последние
//! 4 байта содержат длину (LE). Байт `free` задаёт число байт выравнивания
//! после значения.

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};
use rdbscan_error::RdbResult;
use tracing::trace;

use super::{cursor::BlobReader, ZIPMAP_BIGLEN, ZIPMAP_END};

fn read_len(reader: &mut BlobReader<'_>) -> RdbResult<usize> {
    let first = reader.read_u8()?;
    if first < ZIPMAP_BIGLEN {
        return Ok(usize::from(first));
    }
    Ok(LittleEndian::read_u32(reader.take(4)?) as usize)
}

/// Декодирует zipmap в словарь. При повторе ключа побеждает последнее
/// значение.
pub fn decode_zipmap(blob: &[u8]) -> RdbResult<HashMap<Vec<u8>, Vec<u8>>> {
    let mut reader = BlobReader::new(blob, "zipmap");
    // zmlen: только подсказка о размере
    reader.skip(1)?;

    let mut map = HashMap::new();
    while reader.peek()? != ZIPMAP_END {
        let key_len = read_len(&mut reader)?;
        let key = reader.take(key_len)?.to_vec();
        let value_len = read_len(&mut reader)?;
        let free = usize::from(reader.read_u8()?);
        let value = reader.take(value_len)?.to_vec();
        reader.skip(free)?;
        map.insert(key, value);
    }
    trace!(entries = map.len(), "zipmap decoded");
    Ok(map)
}
