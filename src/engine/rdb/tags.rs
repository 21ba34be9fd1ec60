//! Константы бинарного формата RDB.
//!
//! Байты типов записей, опкоды, маркеры длины и кодировок упакованных
//! контейнеров. Используются в модулях `length`, `decode`, `ziplist`,
//! `zipmap` и `reader`.

use crate::database::ValueType;

/// Expiry в миллисекундах (8 байт LE)
pub const OPCODE_EXPIRETIME_MS: u8 = 252;
/// Expiry в секундах (8 байт LE)
pub const OPCODE_EXPIRETIME: u8 = 253;
/// Выбор базы данных
pub const OPCODE_SELECTDB: u8 = 254;
/// Конец дампа
pub const OPCODE_EOF: u8 = 255;

/// Максимальный номер базы данных в SELECTDB
pub const MAX_DB_INDEX: u64 = 63;
/// Размер контрольной суммы после маркера EOF
pub const CHECKSUM_LEN: u64 = 8;

// Старшие 2 бита поля длины
pub const LEN_6BIT: u8 = 0;
pub const LEN_14BIT: u8 = 1;
pub const LEN_32BIT: u8 = 2;
pub const LEN_ENCVAL: u8 = 3;

// Маркеры чисел с плавающей точкой
pub const DOUBLE_NAN: u8 = 253;
pub const DOUBLE_POS_INF: u8 = 254;
pub const DOUBLE_NEG_INF: u8 = 255;

/// Размер заголовка ziplist (zlbytes + zltail)
pub const ZIPLIST_HEADER_LEN: usize = 8;
/// Признак 5-байтового prevlen
pub const ZIPLIST_BIGLEN: u8 = 254;
/// Терминатор ziplist
pub const ZIPLIST_END: u8 = 0xFF;
pub const ZIP_INT_8B: u8 = 0xFE;
pub const ZIP_INT_24B: u8 = 0xF0;
// Старшие 4 бита целочисленных заголовков
pub const ZIP_INT_16B: u8 = 0xC;
pub const ZIP_INT_32B: u8 = 0xD;
pub const ZIP_INT_64B: u8 = 0xE;
pub const ZIP_INT_IMM: u8 = 0xF;

/// Признак 5-байтовой длины в zipmap
pub const ZIPMAP_BIGLEN: u8 = 254;
/// Терминатор zipmap
pub const ZIPMAP_END: u8 = 0xFF;

/// Разобранный байт типа записи.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Запись ключ/значение указанного типа
    Value(ValueType),
    ExpireMs,
    ExpireSec,
    SelectDb,
    Eof,
}

impl Opcode {
    /// Возвращает `None` для байтов, которые не могут быть типом записи.
    pub fn from_byte(tag: u8) -> Option<Self> {
        match tag {
            OPCODE_EXPIRETIME_MS => Some(Self::ExpireMs),
            OPCODE_EXPIRETIME => Some(Self::ExpireSec),
            OPCODE_SELECTDB => Some(Self::SelectDb),
            OPCODE_EOF => Some(Self::Eof),
            other => ValueType::try_from(other).ok().map(Self::Value),
        }
    }

    /// Байт допустим как начало следующей записи.
    pub fn is_valid(tag: u8) -> bool {
        Self::from_byte(tag).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет полный набор допустимых байтов типа: 0–4, 9–13,
    /// 252–255.
    #[test]
    fn test_valid_type_bytes() {
        let valid: Vec<u8> = (0..=255u8).filter(|b| Opcode::is_valid(*b)).collect();
        assert_eq!(valid, vec![0, 1, 2, 3, 4, 9, 10, 11, 12, 13, 252, 253, 254, 255]);
    }

    #[test]
    fn test_opcode_mapping() {
        assert_eq!(Opcode::from_byte(252), Some(Opcode::ExpireMs));
        assert_eq!(Opcode::from_byte(253), Some(Opcode::ExpireSec));
        assert_eq!(Opcode::from_byte(254), Some(Opcode::SelectDb));
        assert_eq!(Opcode::from_byte(255), Some(Opcode::Eof));
        assert_eq!(
            Opcode::from_byte(10),
            Some(Opcode::Value(ValueType::ZiplistList))
        );
        assert_eq!(Opcode::from_byte(7), None);
    }
}
