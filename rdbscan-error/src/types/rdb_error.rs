use std::{any::Any, ops::RangeInclusive};

use crate::{ErrorExt, StatusCode};

/// Ошибка декодирования RDB дампа с контекстом для диагностики.
///
/// Любая ошибка фатальна для сессии: частичного восстановления нет.
#[derive(Debug, Clone)]
pub enum RdbError {
    /// Первые 5 байт файла не совпадают с сигнатурой `REDIS`
    BadSignature { got: [u8; 5] },

    /// Версия формата вне поддерживаемого диапазона (или не число)
    UnsupportedVersion {
        found: String,
        supported: RangeInclusive<u32>,
    },

    /// Недостаточно байт для запрошенного чтения
    TruncatedInput {
        context: String,
        needed: u64,
        available: u64,
        offset: Option<u64>,
        key: Option<String>,
    },

    /// Неизвестный байт типа записи
    UnknownRecordType { tag: u8, offset: Option<u64> },

    /// Неизвестная специальная кодировка строки или элемента ziplist
    UnknownEncoding {
        structure: String,
        encoding: u8,
        offset: Option<u64>,
        key: Option<String>,
    },

    /// Номер базы данных в SELECTDB больше допустимого
    DatabaseOutOfRange {
        index: u64,
        max: u64,
        offset: Option<u64>,
    },

    /// Маркер EOF с неверным хвостом или конец данных посреди записи
    UnexpectedEof {
        context: String,
        remaining: u64,
        offset: Option<u64>,
    },

    /// За записью следует байт, который не может быть типом
    TrailingGarbage {
        tag: u8,
        offset: Option<u64>,
        key: Option<String>,
    },

    /// Повреждённый контейнер (ziplist/zipmap) или LZF-блок
    CorruptContainer {
        structure: String,
        reason: String,
        offset: Option<u64>,
        key: Option<String>,
    },

    /// Кодировка контейнера, которую декодер сознательно не поддерживает
    UnsupportedEncoding {
        value_type: String,
        offset: Option<u64>,
        key: Option<String>,
    },

    /// Текст числа с плавающей точкой не разбирается
    MalformedNumber {
        text: String,
        offset: Option<u64>,
        key: Option<String>,
    },
}

impl RdbError {
    /// Добавляет контекст offset к ошибке.
    pub fn with_offset(
        mut self,
        offset: u64,
    ) -> Self {
        match &mut self {
            Self::TruncatedInput { offset: o, .. }
            | Self::UnknownRecordType { offset: o, .. }
            | Self::UnknownEncoding { offset: o, .. }
            | Self::DatabaseOutOfRange { offset: o, .. }
            | Self::UnexpectedEof { offset: o, .. }
            | Self::TrailingGarbage { offset: o, .. }
            | Self::CorruptContainer { offset: o, .. }
            | Self::UnsupportedEncoding { offset: o, .. }
            | Self::MalformedNumber { offset: o, .. } => {
                *o = Some(offset);
            }
            Self::BadSignature { .. } | Self::UnsupportedVersion { .. } => {}
        }
        self
    }

    /// Добавляет контекст ключа к ошибке.
    ///
    /// Не перезаписывает ключ, если он уже был проставлен ближе к месту
    /// возникновения ошибки.
    pub fn with_key(
        mut self,
        key: impl Into<String>,
    ) -> Self {
        match &mut self {
            Self::TruncatedInput { key: k, .. }
            | Self::UnknownEncoding { key: k, .. }
            | Self::TrailingGarbage { key: k, .. }
            | Self::CorruptContainer { key: k, .. }
            | Self::UnsupportedEncoding { key: k, .. }
            | Self::MalformedNumber { key: k, .. } => {
                if k.is_none() {
                    *k = Some(key.into());
                }
            }
            _ => {}
        }
        self
    }

    /// Ключ записи, при декодировании которой возникла ошибка.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::TruncatedInput { key, .. }
            | Self::UnknownEncoding { key, .. }
            | Self::TrailingGarbage { key, .. }
            | Self::CorruptContainer { key, .. }
            | Self::UnsupportedEncoding { key, .. }
            | Self::MalformedNumber { key, .. } => key.as_deref(),
            _ => None,
        }
    }

    /// Ошибка заголовка файла (до первой записи).
    pub fn is_header_error(&self) -> bool {
        matches!(
            self,
            Self::BadSignature { .. } | Self::UnsupportedVersion { .. }
        )
    }

    /// Возвращает подсказку для пользователя.
    pub fn recovery_hint(&self) -> Option<&'static str> {
        match self {
            Self::BadSignature { .. } => Some("The file is not an RDB dump"),
            Self::UnsupportedVersion { .. } => {
                Some("Re-save the dump with a server that writes RDB version 6 or older")
            }
            Self::TruncatedInput { .. } | Self::UnexpectedEof { .. } => {
                Some("File may be truncated. Check that the dump was fully written")
            }
            Self::CorruptContainer { .. } | Self::TrailingGarbage { .. } => {
                Some("File may be corrupted. Try a backup copy of the dump")
            }
            Self::UnsupportedEncoding { .. } => {
                Some("Convert intset and ziplist-encoded sorted sets before dumping")
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for RdbError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::BadSignature { got } => {
                write!(
                    f,
                    "Wrong signature in header: expected \"REDIS\", got {:?}",
                    String::from_utf8_lossy(got)
                )
            }
            Self::UnsupportedVersion { found, supported } => {
                write!(
                    f,
                    "Unknown RDB format version {found:?} (supported: {}..={})",
                    supported.start(),
                    supported.end()
                )
            }
            Self::TruncatedInput {
                context,
                needed,
                available,
                offset,
                key,
            } => {
                write!(
                    f,
                    "Truncated input while {context}: needed {needed} bytes, {available} available"
                )?;
                write_context(f, *offset, key.as_deref())
            }
            Self::UnknownRecordType { tag, offset } => {
                write!(f, "Unknown record type 0x{tag:02X}")?;
                write_context(f, *offset, None)
            }
            Self::UnknownEncoding {
                structure,
                encoding,
                offset,
                key,
            } => {
                write!(f, "Unknown {structure} encoding 0x{encoding:02X}")?;
                write_context(f, *offset, key.as_deref())
            }
            Self::DatabaseOutOfRange { index, max, offset } => {
                write!(f, "Database number out of range ({index} > {max})")?;
                write_context(f, *offset, None)
            }
            Self::UnexpectedEof {
                context,
                remaining,
                offset,
            } => {
                write!(f, "Unexpected EOF: {context} ({remaining} bytes remaining)")?;
                write_context(f, *offset, None)
            }
            Self::TrailingGarbage { tag, offset, key } => {
                write!(f, "Record followed by invalid type 0x{tag:02X}")?;
                write_context(f, *offset, key.as_deref())
            }
            Self::CorruptContainer {
                structure,
                reason,
                offset,
                key,
            } => {
                write!(f, "Corrupt {structure}: {reason}")?;
                write_context(f, *offset, key.as_deref())
            }
            Self::UnsupportedEncoding {
                value_type,
                offset,
                key,
            } => {
                write!(f, "Unsupported value encoding: {value_type}")?;
                write_context(f, *offset, key.as_deref())
            }
            Self::MalformedNumber { text, offset, key } => {
                write!(f, "Malformed floating point number {text:?}")?;
                write_context(f, *offset, key.as_deref())
            }
        }
    }
}

/// Вспомогательная функция для форматирования контекста (offset, key).
fn write_context(
    f: &mut std::fmt::Formatter<'_>,
    offset: Option<u64>,
    key: Option<&str>,
) -> std::fmt::Result {
    let mut parts = Vec::new();
    if let Some(o) = offset {
        parts.push(format!("offset: 0x{o:X}"));
    }
    if let Some(k) = key {
        parts.push(format!("key: {k}"));
    }
    if !parts.is_empty() {
        write!(f, " [{}]", parts.join(", "))?;
    }
    Ok(())
}

impl std::error::Error for RdbError {}

impl ErrorExt for RdbError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadSignature { .. } => StatusCode::InvalidSignature,
            Self::UnsupportedVersion { .. } => StatusCode::UnsupportedVersion,
            Self::TruncatedInput { .. } => StatusCode::UnexpectedEof,
            Self::UnknownRecordType { .. } => StatusCode::InvalidData,
            Self::UnknownEncoding { .. } => StatusCode::DecodingError,
            Self::DatabaseOutOfRange { .. } => StatusCode::IndexOutOfBounds,
            Self::UnexpectedEof { .. } => StatusCode::UnexpectedEof,
            Self::TrailingGarbage { .. } => StatusCode::CorruptedData,
            Self::CorruptContainer { .. } => StatusCode::CorruptedData,
            Self::UnsupportedEncoding { .. } => StatusCode::NotImplemented,
            Self::MalformedNumber { .. } => StatusCode::InvalidFloat,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::BadSignature { .. } => "Not an RDB file".to_string(),
            Self::UnsupportedVersion { found, .. } => {
                format!("Unsupported RDB version {found}")
            }
            Self::TruncatedInput { .. } | Self::UnexpectedEof { .. } => {
                "Incomplete dump file".to_string()
            }
            Self::UnknownRecordType { tag, .. } => format!("Unknown record type {tag}"),
            Self::UnknownEncoding { structure, .. } => {
                format!("Unknown {structure} encoding")
            }
            Self::DatabaseOutOfRange { index, .. } => {
                format!("Database number {index} out of range")
            }
            Self::TrailingGarbage { .. } | Self::CorruptContainer { .. } => {
                "Dump file is corrupted".to_string()
            }
            Self::UnsupportedEncoding { value_type, .. } => {
                format!("{value_type} values are not supported")
            }
            Self::MalformedNumber { .. } => "Malformed number in dump".to_string(),
        }
    }

    fn log_message(&self) -> String {
        let mut msg = format!("{self:?}");
        if let Some(hint) = self.recovery_hint() {
            msg.push_str(&format!(" | Hint: {hint}"));
        }
        msg
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", self.type_name()),
            ("status_code", self.status_code().to_string()),
        ];

        match self {
            Self::UnknownRecordType { tag, .. } | Self::TrailingGarbage { tag, .. } => {
                tags.push(("tag", format!("0x{tag:02X}")));
            }
            Self::UnknownEncoding { encoding, .. } => {
                tags.push(("encoding", format!("0x{encoding:02X}")));
            }
            Self::UnsupportedVersion { found, .. } => {
                tags.push(("version", found.clone()));
            }
            _ => {}
        }

        tags
    }
}

// Конверсия в std::io::Error для кода, работающего с io::Result
impl From<RdbError> for std::io::Error {
    fn from(e: RdbError) -> Self {
        let kind = match &e {
            RdbError::TruncatedInput { .. } | RdbError::UnexpectedEof { .. } => {
                std::io::ErrorKind::UnexpectedEof
            }
            RdbError::UnsupportedVersion { .. } | RdbError::UnsupportedEncoding { .. } => {
                std::io::ErrorKind::Unsupported
            }
            _ => std::io::ErrorKind::InvalidData,
        };

        std::io::Error::new(kind, e.to_string())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
