//! SAX-style парсер RDB дампов.
//!
//! Парсер проходит поток записей и вызывает обработчик для каждого события:
//! - `Header`: заголовок принят, известна версия
//! - `SelectDb`: переключение базы данных
//! - `Record`: запись ключ/значение (expiry уже прикреплён)
//! - `End`: маркер конца дампа
//!
//! Ошибка декодирования прерывает разбор; ошибка обработчика тоже.

use std::{collections::HashMap, path::Path};

use rdbscan_error::{ensure, RdbResult, StatusCode};
use tracing::debug;

use super::{ByteCursor, Entry, FileCursor, RdbVersion, RecordStream, SessionState, SliceCursor};
use crate::database::{Record, ValueType};

/// Трейт для обработки событий парсинга.
pub trait ParseHandler {
    /// Вызывается для каждого события парсинга.
    fn handle_event(
        &mut self,
        event: ParseEvent,
    ) -> RdbResult<()>;

    /// Вызывается один раз после события `End`.
    fn finalize(&mut self) -> RdbResult<()> {
        Ok(())
    }
}

/// События, генерируемые парсером.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    /// Заголовок дампа
    Header { version: RdbVersion },
    /// Запись SELECTDB
    SelectDb { db: u64 },
    /// Запись ключ/значение
    Record(Record),
    /// Конец дампа; контрольная сумма не проверяется
    End { checksum: Option<u64> },
}

/// Статистика чтения дампа.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Кол-во прочитанных байт, включая заголовок
    pub bytes_read: u64,
    /// Кол-во декодированных записей ключ/значение
    pub records_parsed: u64,
    /// Кол-во записей SELECTDB
    pub databases_selected: u64,
    /// Кол-во записей с expiry
    pub expiring_records: u64,
    /// Версия дампа
    pub version: Option<RdbVersion>,
}

/// Event-driven парсер поверх [`RecordStream`].
#[derive(Debug)]
pub struct StreamingParser<C: ByteCursor> {
    stream: RecordStream<C>,
}

impl StreamingParser<Box<dyn ByteCursor + Send>> {
    /// Парсер над файлом; заголовок читается в [`StreamingParser::parse`].
    pub fn open(path: impl AsRef<Path>) -> RdbResult<Self> {
        let cursor = FileCursor::open(path)?;
        Ok(Self::new(Box::new(cursor)))
    }

    /// Парсер над дампом в памяти.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self::new(Box::new(SliceCursor::new(data)))
    }
}

impl<C: ByteCursor> StreamingParser<C> {
    pub fn new(cursor: C) -> Self {
        Self {
            stream: RecordStream::new(cursor),
        }
    }

    /// Разбирает дамп целиком, передавая события в `handler`.
    ///
    /// Повторный вызов после успешного разбора возвращает ошибку.
    pub fn parse<H: ParseHandler>(
        &mut self,
        handler: &mut H,
    ) -> RdbResult<()> {
        ensure!(
            self.stream.state() == SessionState::AwaitingHeader,
            StatusCode::Unexpected,
            "dump cannot be parsed in state {:?}",
            self.stream.state()
        );

        let version = self.stream.read_header()?;
        handler.handle_event(ParseEvent::Header { version })?;

        while let Some(entry) = self.stream.next_entry()? {
            let event = match entry {
                Entry::SelectDb(db) => ParseEvent::SelectDb { db },
                Entry::Record(record) => ParseEvent::Record(record),
                Entry::Eof { checksum } => ParseEvent::End { checksum },
            };
            handler.handle_event(event)?;
        }

        debug!(
            records = self.stream.stats().records_parsed,
            bytes = self.stream.stats().bytes_read,
            "streaming parse finished"
        );
        handler.finalize()
    }

    pub fn stats(&self) -> &ParseStats {
        self.stream.stats()
    }

    pub fn version(&self) -> Option<RdbVersion> {
        self.stream.version()
    }

    pub fn into_inner(self) -> RecordStream<C> {
        self.stream
    }
}

////////////////////////////////////////////////////////////////////////////////
// Обработчики
////////////////////////////////////////////////////////////////////////////////

/// Собирает все записи в `Vec`; эквивалент [`super::read_dump`].
#[derive(Debug, Default)]
pub struct CollectHandler {
    records: Vec<Record>,
}

impl CollectHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Забирает собранные записи.
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl ParseHandler for CollectHandler {
    fn handle_event(
        &mut self,
        event: ParseEvent,
    ) -> RdbResult<()> {
        if let ParseEvent::Record(record) = event {
            self.records.push(record);
        }
        Ok(())
    }
}

/// Считает записи без их сохранения.
#[derive(Debug, Default)]
pub struct CountHandler {
    total: u64,
    expiring: u64,
    by_type: HashMap<ValueType, u64>,
    per_db: HashMap<u64, u64>,
    version: Option<RdbVersion>,
    checksum: Option<u64>,
}

impl CountHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Общее кол-во записей ключ/значение.
    pub fn total_records(&self) -> u64 {
        self.total
    }

    /// Кол-во записей с expiry.
    pub fn expiring_records(&self) -> u64 {
        self.expiring
    }

    /// Кол-во записей с указанным байтом типа.
    pub fn count_of(
        &self,
        value_type: ValueType,
    ) -> u64 {
        self.by_type.get(&value_type).copied().unwrap_or(0)
    }

    /// Кол-во записей по типам, отсортированное по байту типа.
    pub fn by_type(&self) -> Vec<(ValueType, u64)> {
        let mut out: Vec<_> = self.by_type.iter().map(|(t, n)| (*t, *n)).collect();
        out.sort_by_key(|(t, _)| *t as u8);
        out
    }

    /// Кол-во записей по базам данных, отсортированное по номеру базы.
    pub fn by_db(&self) -> Vec<(u64, u64)> {
        let mut out: Vec<_> = self.per_db.iter().map(|(db, n)| (*db, *n)).collect();
        out.sort_unstable();
        out
    }

    pub fn version(&self) -> Option<RdbVersion> {
        self.version
    }

    /// Контрольная сумма из хвоста дампа, если она была.
    pub fn checksum(&self) -> Option<u64> {
        self.checksum
    }
}

impl ParseHandler for CountHandler {
    fn handle_event(
        &mut self,
        event: ParseEvent,
    ) -> RdbResult<()> {
        match event {
            ParseEvent::Header { version } => self.version = Some(version),
            ParseEvent::Record(record) => {
                self.total += 1;
                if record.has_expiry() {
                    self.expiring += 1;
                }
                *self.by_type.entry(record.value_type).or_default() += 1;
                *self.per_db.entry(record.db).or_default() += 1;
            }
            ParseEvent::End { checksum } => self.checksum = checksum,
            ParseEvent::SelectDb { .. } => {}
        }
        Ok(())
    }
}

/// Оставляет только записи, ключ которых удовлетворяет предикату.
pub struct FilterHandler<F>
where
    F: Fn(&[u8]) -> bool,
{
    predicate: F,
    records: Vec<Record>,
}

impl<F> FilterHandler<F>
where
    F: Fn(&[u8]) -> bool,
{
    pub fn new(predicate: F) -> Self {
        Self {
            predicate,
            records: Vec::new(),
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl<F> ParseHandler for FilterHandler<F>
where
    F: Fn(&[u8]) -> bool,
{
    fn handle_event(
        &mut self,
        event: ParseEvent,
    ) -> RdbResult<()> {
        if let ParseEvent::Record(record) = event {
            if (self.predicate)(&record.key) {
                self.records.push(record);
            }
        }
        Ok(())
    }
}

/// Вызывает функцию для каждой записи.
///
/// Ошибка из callback прерывает разбор.
pub struct CallbackHandler<F>
where
    F: FnMut(Record) -> RdbResult<()>,
{
    callback: F,
}

impl<F> CallbackHandler<F>
where
    F: FnMut(Record) -> RdbResult<()>,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ParseHandler for CallbackHandler<F>
where
    F: FnMut(Record) -> RdbResult<()>,
{
    fn handle_event(
        &mut self,
        event: ParseEvent,
    ) -> RdbResult<()> {
        if let ParseEvent::Record(record) = event {
            (self.callback)(record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rdbscan_error::{bail, RdbError};

    use super::*;
    use crate::database::Value;

    /// Дамп версии 6: SELECTDB 0, "a"="1", expiry + "b"="22", SELECTDB 2,
    /// список "c", EOF с контрольной суммой.
    fn sample() -> Vec<u8> {
        let mut out = b"REDIS0006".to_vec();
        out.extend_from_slice(&[0xFE, 0x00]);
        out.extend_from_slice(&[0x00, 0x01, b'a', 0x01, b'1']);
        out.push(0xFD);
        out.extend_from_slice(&1_700_000_000u64.to_le_bytes());
        out.extend_from_slice(&[0x00, 0x01, b'b', 0x02, b'2', b'2']);
        out.extend_from_slice(&[0xFE, 0x02]);
        out.extend_from_slice(&[0x01, 0x01, b'c', 0x02, 0x01, b'x', 0x01, b'y']);
        out.push(0xFF);
        out.extend_from_slice(&7u64.to_le_bytes());
        out
    }

    /// Тест проверяет полную последовательность событий.
    #[test]
    fn test_event_sequence() {
        struct Recorder(Vec<ParseEvent>, bool);
        impl ParseHandler for Recorder {
            fn handle_event(
                &mut self,
                event: ParseEvent,
            ) -> RdbResult<()> {
                self.0.push(event);
                Ok(())
            }

            fn finalize(&mut self) -> RdbResult<()> {
                self.1 = true;
                Ok(())
            }
        }

        let mut parser = StreamingParser::from_bytes(sample());
        let mut rec = Recorder(Vec::new(), false);
        parser.parse(&mut rec).unwrap();

        assert!(rec.1);
        assert_eq!(rec.0.len(), 7);
        assert!(matches!(rec.0[0], ParseEvent::Header { version } if version.get() == 6));
        assert_eq!(rec.0[1], ParseEvent::SelectDb { db: 0 });
        assert_eq!(rec.0[4], ParseEvent::SelectDb { db: 2 });
        assert_eq!(rec.0[6], ParseEvent::End { checksum: Some(7) });
    }

    #[test]
    fn test_collect_handler() {
        let mut parser = StreamingParser::from_bytes(sample());
        let mut handler = CollectHandler::new();
        parser.parse(&mut handler).unwrap();

        let records = handler.into_records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].key, b"a");
        assert_eq!(records[1].expire_at, Some(1_700_000_000));
        assert_eq!(records[2].db, 2);
        assert_eq!(
            records[2].value,
            Value::List(vec![b"x".to_vec(), b"y".to_vec()])
        );
    }

    /// Тест проверяет счётчики по типам, базам и expiry.
    #[test]
    fn test_count_handler() {
        let mut parser = StreamingParser::from_bytes(sample());
        let mut handler = CountHandler::new();
        parser.parse(&mut handler).unwrap();

        assert_eq!(handler.total_records(), 3);
        assert_eq!(handler.expiring_records(), 1);
        assert_eq!(handler.count_of(ValueType::String), 2);
        assert_eq!(handler.count_of(ValueType::List), 1);
        assert_eq!(handler.count_of(ValueType::Hash), 0);
        assert_eq!(
            handler.by_type(),
            vec![(ValueType::String, 2), (ValueType::List, 1)]
        );
        assert_eq!(handler.by_db(), vec![(0, 2), (2, 1)]);
        assert_eq!(handler.version().map(|v| v.get()), Some(6));
        assert_eq!(handler.checksum(), Some(7));
    }

    #[test]
    fn test_filter_handler() {
        let mut parser = StreamingParser::from_bytes(sample());
        let mut handler = FilterHandler::new(|key| key != b"b");
        parser.parse(&mut handler).unwrap();

        let keys: Vec<_> = handler.records().iter().map(|r| r.key_str()).collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    /// Тест проверяет, что ошибка callback прерывает разбор.
    #[test]
    fn test_callback_error_stops_parse() {
        let mut seen = 0;
        let mut parser = StreamingParser::from_bytes(sample());
        let mut handler = CallbackHandler::new(|record: Record| {
            seen += 1;
            if record.key == b"b" {
                bail!(StatusCode::Unexpected, "stop");
            }
            Ok(())
        });
        let err = parser.parse(&mut handler).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::Unexpected);
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_stats() {
        let mut parser = StreamingParser::from_bytes(sample());
        parser.parse(&mut CollectHandler::new()).unwrap();

        let stats = parser.stats();
        assert_eq!(stats.records_parsed, 3);
        assert_eq!(stats.databases_selected, 2);
        assert_eq!(stats.expiring_records, 1);
        assert_eq!(stats.bytes_read, sample().len() as u64);
        assert_eq!(stats.version.map(|v| v.get()), Some(6));
    }

    #[test]
    fn test_decode_error_propagates() {
        let mut data = b"REDIS0006".to_vec();
        data.push(0x07);
        let mut parser = StreamingParser::from_bytes(data);
        let err = parser.parse(&mut CountHandler::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RdbError>(),
            Some(RdbError::UnknownRecordType { tag: 0x07, .. })
        ));
    }

    #[test]
    fn test_parse_twice_rejected() {
        let mut parser = StreamingParser::from_bytes(sample());
        parser.parse(&mut CountHandler::new()).unwrap();
        let err = parser.parse(&mut CountHandler::new()).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::Unexpected);
    }
}
