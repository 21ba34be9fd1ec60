use std::ops::RangeInclusive;

use rdbscan_error::{RdbError, RdbResult};

/// Сигнатура в начале файла: ASCII «REDIS».
pub const FILE_MAGIC: &[u8; 5] = b"REDIS";
/// Размер заголовка: сигнатура + 4 ASCII-цифры версии.
pub const HEADER_LEN: usize = 9;
/// Поддерживаемые версии формата.
pub const SUPPORTED_VERSIONS: RangeInclusive<u32> = 1..=6;
/// Первая версия, в которой после EOF пишется контрольная сумма.
pub const CHECKSUM_SINCE: u32 = 5;

/// Версия формата из заголовка дампа.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RdbVersion(u32);

impl RdbVersion {
    pub fn get(self) -> u32 {
        self.0
    }

    /// Начиная с версии 5 после маркера EOF идут 8 байт контрольной суммы.
    pub fn has_checksum(self) -> bool {
        self.0 >= CHECKSUM_SINCE
    }

    /// Разбирает 9-байтовый заголовок.
    pub fn parse_header(header: &[u8]) -> RdbResult<Self> {
        if header.len() < HEADER_LEN {
            return Err(RdbError::TruncatedInput {
                context: "reading header".to_string(),
                needed: HEADER_LEN as u64,
                available: header.len() as u64,
                offset: Some(0),
                key: None,
            }
            .into());
        }

        let mut got = [0u8; 5];
        got.copy_from_slice(&header[..5]);
        if &got != FILE_MAGIC {
            return Err(RdbError::BadSignature { got }.into());
        }

        Ok(Self::try_from(&header[5..HEADER_LEN])?)
    }
}

impl TryFrom<&[u8]> for RdbVersion {
    type Error = RdbError;

    fn try_from(digits: &[u8]) -> Result<Self, RdbError> {
        let unsupported = || RdbError::UnsupportedVersion {
            found: String::from_utf8_lossy(digits).into_owned(),
            supported: SUPPORTED_VERSIONS,
        };

        if digits.len() != 4 || !digits.iter().all(u8::is_ascii_digit) {
            return Err(unsupported());
        }
        let version = digits
            .iter()
            .fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0'));

        if SUPPORTED_VERSIONS.contains(&version) {
            Ok(Self(version))
        } else {
            Err(unsupported())
        }
    }
}

impl std::fmt::Display for RdbVersion {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{:04}", self.0)
    }
}
