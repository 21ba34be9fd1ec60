use std::fmt;

use num_enum::TryFromPrimitive;

/// Коды статуса для категоризации ошибок декодера.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Ошибки данных
/// - 5xxx: Повреждение и сжатие
/// - 6xxx: Ввод-вывод
/// - 8xxx: Ошибки формата дампа
///
/// `num_enum::TryFromPrimitive` даёт реализацию `TryFrom<u32>`, что удобно
/// для кода возврата CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unsupported = 1001,
    Unexpected = 1002,
    Internal = 1003,
    InvalidArgs = 1004,
    NotImplemented = 1005,

    // === 2xxx: Ошибки данных ===
    NotFound = 2000,
    IndexOutOfBounds = 2006,
    InvalidData = 2009,

    // === 3xxx: Разрешения ===
    PermissionDenied = 3001,

    // === 5xxx: Повреждение / сжатие ===
    CorruptedData = 5002,
    CompressionFailed = 5005,

    // === 6xxx: Ввод-вывод ===
    Io = 6000,
    UnexpectedEof = 6007,

    // === 8xxx: Формат дампа ===
    InvalidSignature = 8000,
    UnsupportedVersion = 8002,
    InvalidUtf8 = 8004,
    InvalidInteger = 8005,
    InvalidFloat = 8006,
    ParseError = 8009,
    DecodingError = 8011,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Вернёт `true`, если переданный `code` означает успешный результат.
    pub fn is_success(code: u32) -> bool {
        Self::Success as u32 == code
    }

    /// Ошибка формата дампа (диапазон 8xxx).
    pub fn is_format_error(&self) -> bool {
        (8000..=8999).contains(&self.code())
    }

    /// Ошибка, указывающая на испорченный или обрезанный файл.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::CorruptedData | Self::UnexpectedEof | Self::CompressionFailed
        )
    }

    /// Требуется ли логировать как критическую ошибку.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Internal | Self::CorruptedData)
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::NotFound => LogLevel::Debug,
            Self::InvalidArgs | Self::InvalidData | Self::InvalidSignature => LogLevel::Info,
            Self::Internal | Self::CorruptedData => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }

    /// Код завершения процесса для CLI.
    ///
    /// Ошибки формата и повреждения данных отличаются от ошибок
    /// окружения, чтобы скрипты могли их различать.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::InvalidArgs => 2,
            Self::NotFound | Self::PermissionDenied | Self::Io => 3,
            c if c.is_format_error() => 4,
            c if c.is_corruption() => 5,
            _ => 1,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
