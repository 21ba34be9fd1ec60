/// Немедленно возвращает ошибку из текущей функции.
///
/// Поддерживает три формы:
/// - `bail!(err)`: принимает готовый тип ошибки или `StackError`;
/// - `bail!(code, "msg")`: создаёт `GenericError` с кодом и сообщением;
/// - `bail!(code, "fmt {}", arg)`: форматирует сообщение.
///
/// Пример:
///
/// ```ignore
/// use rdbscan_error::{bail, RdbError};
///
/// fn check_db(index: u64) -> rdbscan_error::RdbResult<()> {
///     if index > 63 {
///         bail!(RdbError::DatabaseOutOfRange { index, max: 63, offset: None });
///     }
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! bail {
    ($err:expr) => {
        return Err($crate::StackError::from($err))
    };
    ($code:expr, $msg:expr) => {
        return Err($crate::StackError::new(
            $crate::types::GenericError::new($code, $msg)
        ))
    };
    ($code:expr, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::StackError::new(
            $crate::types::GenericError::new($code, format!($fmt, $($arg)*))
        ))
    };
}

/// Проверяет условие и вызывает `bail!`, если условие ложно.
///
/// Формы аналогичны `bail!`:
/// - `ensure!(cond, err)`;
/// - `ensure!(cond, code, "msg")`;
/// - `ensure!(cond, code, "fmt {}", arg)`.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            $crate::bail!($err);
        }
    };
    ($cond:expr, $code:expr, $msg:expr) => {
        if !($cond) {
            $crate::bail!($code, $msg);
        }
    };
    ($cond:expr, $code:expr, $fmt:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($code, $fmt, $($arg)*);
        }
    };
}

/// Трейт-расширение для `Result`, добавляющее методы контекстирования.
///
/// Позволяет вызывать `.context(...)` и `.with_context(...)` на результатах,
/// превращая ошибку в [`StackError`](crate::StackError) и приклеивая к ней
/// контекст.
pub trait ResultExt<T> {
    /// Если `self`: `Err`, оборачивает ошибку в `StackError` и добавляет
    /// указанный контекст.
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>;

    /// Ленивый контекст (строка формируется только в случае ошибки).
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<crate::StackError>,
{
    #[track_caller]
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
    {
        self.map_err(|e| e.into().context(ctx))
    }

    #[track_caller]
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.into().context(f()))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GenericError, RdbError, RdbResult, StatusCode};

    #[test]
    fn test_bail_simple() {
        fn example() -> RdbResult<()> {
            bail!(RdbError::UnsupportedEncoding {
                value_type: "intset".to_string(),
                offset: None,
                key: None,
            });
        }

        let err = example().unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NotImplemented);
    }

    #[test]
    fn test_bail_with_format() {
        fn example(value: i32) -> RdbResult<()> {
            bail!(StatusCode::InvalidArgs, "Invalid value: {}", value);
        }

        let err = example(42).unwrap_err();
        assert!(err.to_string().contains("Invalid value: 42"));
    }

    #[test]
    fn test_ensure() {
        fn validate(x: u64) -> RdbResult<()> {
            ensure!(
                x <= 63,
                RdbError::DatabaseOutOfRange {
                    index: x,
                    max: 63,
                    offset: None,
                }
            );
            ensure!(x != 13, StatusCode::InvalidArgs, "Unlucky database {}", x);
            Ok(())
        }

        assert!(validate(0).is_ok());
        assert!(validate(13).is_err());
        assert!(validate(64).is_err());
    }

    #[test]
    fn test_result_ext() {
        fn inner() -> Result<(), GenericError> {
            Err(GenericError::new(StatusCode::Internal, "inner error"))
        }

        fn outer() -> RdbResult<()> {
            inner().context("outer context")?;
            Ok(())
        }

        let err = outer().unwrap_err();
        assert_eq!(err.contexts().len(), 1);
        assert_eq!(err.contexts()[0].message, "outer context");
    }

    /// Тест проверяет, что ленивый контекст вычисляется только при ошибке.
    #[test]
    fn test_with_context_lazy() {
        fn example(success: bool) -> RdbResult<u8> {
            let result: Result<u8, GenericError> = if success {
                Ok(7)
            } else {
                Err(GenericError::new(StatusCode::Internal, "error"))
            };
            result.with_context(|| format!("attempt success={success}"))
        }

        assert_eq!(example(true).unwrap(), 7);
        let err = example(false).unwrap_err();
        assert_eq!(err.contexts()[0].message, "attempt success=false");
    }
}
