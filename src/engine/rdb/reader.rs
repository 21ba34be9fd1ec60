//! Поток записей RDB и сессия чтения.
//!
//! Состояния: `AwaitingHeader → Streaming → Eof | Failed`. Любая ошибка
//! декодирования фатальна: после неё сессия переходит в `Failed` и больше
//! не читает данные.

use std::{
    collections::{HashMap, HashSet},
    iter::FusedIterator,
    path::Path,
};

use byteorder::{ByteOrder, LittleEndian};
use ordered_float::OrderedFloat;
use rdbscan_error::{bail, ensure, RdbError, RdbResult, StackError, StatusCode};
use tracing::{debug, trace};

use super::{
    decode_ziplist, decode_ziplist_hash, decode_zipmap, read_double, read_expiry,
    read_plain_length, read_string, ByteCursor, ExpiryUnit, FileCursor, Opcode, ParseStats,
    RdbVersion, SliceCursor, CHECKSUM_LEN, HEADER_LEN, MAX_DB_INDEX,
};
use crate::database::{Record, Value, ValueType};

/// Состояние потока записей.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Заголовок ещё не прочитан
    AwaitingHeader,
    /// Заголовок принят, идёт чтение записей
    Streaming,
    /// Достигнут маркер EOF
    Eof,
    /// Произошла ошибка, дальнейшее чтение невозможно
    Failed,
}

/// Результат одного шага декодирования.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// Запись SELECTDB с номером базы
    SelectDb(u64),
    /// Запись ключ/значение (expiry уже прикреплён)
    Record(Record),
    /// Маркер конца; контрольная сумма, если она присутствует
    Eof { checksum: Option<u64> },
}

/// Декодер потока записей поверх произвольного [`ByteCursor`].
#[derive(Debug)]
pub struct RecordStream<C: ByteCursor> {
    cursor: C,
    state: SessionState,
    version: Option<RdbVersion>,
    current_db: u64,
    stats: ParseStats,
}

/// Сессия чтения дампа из файла или из памяти.
pub type Session = RecordStream<Box<dyn ByteCursor + Send>>;

////////////////////////////////////////////////////////////////////////////////
// Открытие сессий
////////////////////////////////////////////////////////////////////////////////

/// Открывает файл дампа и проверяет заголовок.
///
/// Файл закрывается при drop сессии, в том числе после ошибки.
pub fn open(path: impl AsRef<Path>) -> RdbResult<Session> {
    Session::open(path)
}

/// Читает все записи дампа.
pub fn read_dump(path: impl AsRef<Path>) -> RdbResult<Vec<Record>> {
    open(path)?.collect()
}

impl Session {
    /// Открывает файл дампа и проверяет заголовок.
    pub fn open(path: impl AsRef<Path>) -> RdbResult<Self> {
        let cursor = FileCursor::open(path)?;
        let mut session = RecordStream::new(Box::new(cursor) as Box<dyn ByteCursor + Send>);
        session.read_header()?;
        Ok(session)
    }

    /// Сессия над дампом в памяти; заголовок проверяется сразу.
    pub fn from_bytes(data: Vec<u8>) -> RdbResult<Self> {
        let cursor = SliceCursor::new(data);
        let mut session = RecordStream::new(Box::new(cursor) as Box<dyn ByteCursor + Send>);
        session.read_header()?;
        Ok(session)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<C: ByteCursor> RecordStream<C> {
    /// Создаёт поток; заголовок будет прочитан при первом обращении.
    pub fn new(cursor: C) -> Self {
        Self {
            cursor,
            state: SessionState::AwaitingHeader,
            version: None,
            current_db: 0,
            stats: ParseStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Версия формата (после чтения заголовка).
    pub fn version(&self) -> Option<RdbVersion> {
        self.version
    }

    /// Номер базы из последней записи SELECTDB (0 по умолчанию).
    pub fn current_db(&self) -> u64 {
        self.current_db
    }

    /// Позиция курсора от начала данных.
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    /// Закрывает сессию и освобождает источник данных.
    pub fn close(self) {
        debug!(
            state = ?self.state,
            records = self.stats.records_parsed,
            position = self.cursor.position(),
            "closing RDB session"
        );
    }

    /// Потребляет поток и возвращает курсор.
    pub fn into_inner(self) -> C {
        self.cursor
    }

    /// Читает и проверяет 9-байтовый заголовок.
    ///
    /// Повторный вызов возвращает уже прочитанную версию.
    pub fn read_header(&mut self) -> RdbResult<RdbVersion> {
        if let Some(version) = self.version {
            return Ok(version);
        }
        ensure!(
            self.state == SessionState::AwaitingHeader,
            StatusCode::Unexpected,
            "header cannot be read in state {:?}",
            self.state
        );

        let result = self
            .cursor
            .read_exact(HEADER_LEN)
            .and_then(|header| RdbVersion::parse_header(&header));
        let version = self.guard(result)?;

        debug!(%version, size = self.cursor.len(), "RDB header accepted");
        self.version = Some(version);
        self.stats.version = Some(version);
        self.stats.bytes_read = self.cursor.position();
        self.state = SessionState::Streaming;
        Ok(version)
    }

    /// Следующая запись ключ/значение.
    ///
    /// Записи SELECTDB и expiry поглощаются; `Ok(None)` возвращается на
    /// маркере EOF и при всех последующих вызовах.
    pub fn next_record(&mut self) -> RdbResult<Option<Record>> {
        loop {
            match self.next_entry()? {
                Some(Entry::SelectDb(_)) => continue,
                Some(Entry::Record(record)) => return Ok(Some(record)),
                Some(Entry::Eof { .. }) | None => return Ok(None),
            }
        }
    }

    /// Один шаг декодирования, включая записи SELECTDB и маркер EOF.
    ///
    /// `Entry::Eof` возвращается ровно один раз, после него `Ok(None)`.
    pub fn next_entry(&mut self) -> RdbResult<Option<Entry>> {
        match self.state {
            SessionState::Failed => {
                bail!(
                    StatusCode::Unexpected,
                    "RDB session is unusable after a decode failure"
                );
            }
            SessionState::Eof => return Ok(None),
            SessionState::AwaitingHeader => {
                self.read_header()?;
            }
            SessionState::Streaming => {}
        }

        let result = self.load_entry();
        let entry = self.guard(result)?;
        self.stats.bytes_read = self.cursor.position();
        Ok(Some(entry))
    }

    /// Переводит поток в `Failed`, если `result` содержит ошибку.
    fn guard<T>(
        &mut self,
        result: RdbResult<T>,
    ) -> RdbResult<T> {
        if let Err(e) = &result {
            debug!(
                error = %e,
                position = self.cursor.position(),
                "RDB session failed"
            );
            self.state = SessionState::Failed;
        }
        result
    }

    fn load_entry(&mut self) -> RdbResult<Entry> {
        let offset = self.cursor.position();
        if self.cursor.remaining() == 0 {
            return Err(RdbError::UnexpectedEof {
                context: "data ended before the EOF marker".to_string(),
                remaining: 0,
                offset: Some(offset),
            }
            .into());
        }

        let tag = self.cursor.read_u8()?;
        let opcode = Opcode::from_byte(tag).ok_or(RdbError::UnknownRecordType {
            tag,
            offset: Some(offset),
        })?;

        match opcode {
            Opcode::SelectDb => {
                let index = read_plain_length(&mut self.cursor)?;
                ensure!(
                    index <= MAX_DB_INDEX,
                    RdbError::DatabaseOutOfRange {
                        index,
                        max: MAX_DB_INDEX,
                        offset: Some(offset),
                    }
                );
                debug!(db = index, "SELECTDB");
                self.current_db = index;
                self.stats.databases_selected += 1;
                Ok(Entry::SelectDb(index))
            }
            Opcode::Eof => self.finish(offset),
            Opcode::ExpireMs => self.load_expiring(ExpiryUnit::Milliseconds),
            Opcode::ExpireSec => self.load_expiring(ExpiryUnit::Seconds),
            Opcode::Value(value_type) => self.load_record(value_type, None),
        }
    }

    /// Маркер EOF допустим, если за ним 8 байт контрольной суммы или ничего.
    fn finish(
        &mut self,
        offset: u64,
    ) -> RdbResult<Entry> {
        let remaining = self.cursor.remaining();
        let checksum = match remaining {
            0 => None,
            CHECKSUM_LEN => Some(LittleEndian::read_u64(
                &self.cursor.read_exact(CHECKSUM_LEN as usize)?,
            )),
            _ => {
                return Err(RdbError::UnexpectedEof {
                    context: "EOF marker must be followed by an 8-byte checksum or nothing"
                        .to_string(),
                    remaining,
                    offset: Some(offset),
                }
                .into())
            }
        };
        debug!(
            records = self.stats.records_parsed,
            checksum = checksum.is_some(),
            "RDB end of file"
        );
        self.state = SessionState::Eof;
        Ok(Entry::Eof { checksum })
    }

    fn load_expiring(
        &mut self,
        unit: ExpiryUnit,
    ) -> RdbResult<Entry> {
        let expire_at = read_expiry(&mut self.cursor, unit)?;
        let offset = self.cursor.position();
        let tag = self.cursor.read_u8()?;
        match Opcode::from_byte(tag) {
            Some(Opcode::Value(value_type)) => {
                self.stats.expiring_records += 1;
                self.load_record(value_type, Some(expire_at))
            }
            _ => Err(RdbError::UnknownRecordType {
                tag,
                offset: Some(offset),
            }
            .into()),
        }
    }

    fn load_record(
        &mut self,
        value_type: ValueType,
        expire_at: Option<u64>,
    ) -> RdbResult<Entry> {
        let key = read_string(&mut self.cursor)?;
        let value = self
            .read_value(value_type)
            .map_err(|e| with_key(e, &key))?;

        let next_offset = self.cursor.position();
        let next = self.cursor.peek_byte().map_err(|e| with_key(e, &key))?;
        if !Opcode::is_valid(next) {
            return Err(RdbError::TrailingGarbage {
                tag: next,
                offset: Some(next_offset),
                key: Some(String::from_utf8_lossy(&key).into_owned()),
            }
            .into());
        }

        trace!(
            key_len = key.len(),
            value_type = %value_type,
            expire_at,
            db = self.current_db,
            "record"
        );
        self.stats.records_parsed += 1;
        Ok(Entry::Record(Record {
            key,
            value,
            value_type,
            expire_at,
            db: self.current_db,
        }))
    }

    fn read_value(
        &mut self,
        value_type: ValueType,
    ) -> RdbResult<Value> {
        let offset = self.cursor.position();
        let value = match value_type {
            ValueType::String => Value::Str(read_string(&mut self.cursor)?),
            ValueType::List => {
                let n = read_plain_length(&mut self.cursor)?;
                let mut items = Vec::with_capacity(self.capacity_hint(n));
                for _ in 0..n {
                    items.push(read_string(&mut self.cursor)?);
                }
                Value::List(items)
            }
            ValueType::Set => {
                let n = read_plain_length(&mut self.cursor)?;
                let mut members = HashSet::with_capacity(self.capacity_hint(n));
                for _ in 0..n {
                    members.insert(read_string(&mut self.cursor)?);
                }
                Value::Set(members)
            }
            ValueType::SortedSet => {
                let n = read_plain_length(&mut self.cursor)?;
                let mut members = Vec::with_capacity(self.capacity_hint(n));
                for _ in 0..n {
                    let member = read_string(&mut self.cursor)?;
                    let score = read_double(&mut self.cursor)?;
                    members.push((score, member));
                }
                // Стабильная сортировка: равные score сохраняют порядок в дампе.
                members.sort_by_key(|(score, _)| OrderedFloat(*score));
                Value::SortedSet(members)
            }
            ValueType::Hash => {
                let n = read_plain_length(&mut self.cursor)?;
                let mut map = HashMap::with_capacity(self.capacity_hint(n));
                for _ in 0..n {
                    let field = read_string(&mut self.cursor)?;
                    let value = read_string(&mut self.cursor)?;
                    map.insert(field, value);
                }
                Value::Hash(map)
            }
            ValueType::ZipmapHash => {
                let blob = read_string(&mut self.cursor)?;
                Value::Hash(decode_zipmap(&blob).map_err(|e| at_offset(e, offset))?)
            }
            ValueType::ZiplistList => {
                let blob = read_string(&mut self.cursor)?;
                Value::List(decode_ziplist(&blob).map_err(|e| at_offset(e, offset))?)
            }
            ValueType::ZiplistHash => {
                let blob = read_string(&mut self.cursor)?;
                Value::Hash(decode_ziplist_hash(&blob).map_err(|e| at_offset(e, offset))?)
            }
            ValueType::Intset | ValueType::ZiplistSortedSet => {
                return Err(RdbError::UnsupportedEncoding {
                    value_type: value_type.encoding_name().to_string(),
                    offset: Some(offset),
                    key: None,
                }
                .into());
            }
        };
        Ok(value)
    }

    /// Ёмкость для коллекции из `n` элементов, ограниченная остатком данных.
    fn capacity_hint(
        &self,
        n: u64,
    ) -> usize {
        usize::try_from(n.min(self.cursor.remaining())).unwrap_or(0)
    }
}

/// Прикрепляет ключ записи к ошибке декодирования.
fn with_key(
    err: StackError,
    key: &[u8],
) -> StackError {
    match err.downcast_ref::<RdbError>() {
        Some(inner) => {
            StackError::new(inner.clone().with_key(String::from_utf8_lossy(key).into_owned()))
        }
        None => err,
    }
}

/// Ошибки контейнеров знают только смещение внутри блоба; прикрепляем
/// смещение значения в файле, если оно ещё не задано.
fn at_offset(
    err: StackError,
    offset: u64,
) -> StackError {
    match err.downcast_ref::<RdbError>() {
        Some(inner)
            if matches!(
                inner,
                RdbError::CorruptContainer { offset: None, .. }
                    | RdbError::UnknownEncoding { offset: None, .. }
            ) =>
        {
            StackError::new(inner.clone().with_offset(offset))
        }
        _ => err,
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<C: ByteCursor> Iterator for RecordStream<C> {
    type Item = RdbResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.state, SessionState::Eof | SessionState::Failed) {
            return None;
        }
        self.next_record().transpose()
    }
}

impl<C: ByteCursor> FusedIterator for RecordStream<C> {}
