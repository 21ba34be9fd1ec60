//! Источники байт для декодера.
//!
//! [`ByteCursor`] даёт последовательное чтение с одним байтом lookahead.
//! Любое чтение, кроме `peek_byte`, сдвигает позицию ровно на число
//! прочитанных байт. Перед выделением буфера проверяется остаток, поэтому
//! испорченное поле длины не приводит к огромной аллокации.

use std::{
    fmt::Debug,
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

use rdbscan_error::{RdbError, RdbResult, ResultExt};

/// Ёмкость буфера для файлового курсора.
const FILE_BUFFER_CAPACITY: usize = 64 * 1024;

/// Последовательный доступ к байтам дампа.
pub trait ByteCursor: Debug {
    /// Читает ровно `n` байт или возвращает `TruncatedInput`.
    fn read_exact(
        &mut self,
        n: usize,
    ) -> RdbResult<Vec<u8>>;

    /// Возвращает следующий байт, не сдвигая позицию.
    fn peek_byte(&mut self) -> RdbResult<u8>;

    /// Текущая позиция от начала данных.
    fn position(&self) -> u64;

    /// Общий размер данных.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Сколько байт осталось непрочитанными.
    fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.position())
    }

    fn read_u8(&mut self) -> RdbResult<u8> {
        let buf = self.read_exact(1)?;
        Ok(buf[0])
    }

    /// Читает массив фиксированного размера.
    fn read_array<const N: usize>(&mut self) -> RdbResult<[u8; N]>
    where
        Self: Sized,
    {
        let buf = self.read_exact(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&buf);
        Ok(out)
    }
}

/// Ошибка нехватки байт для чтения в позиции `offset`.
pub(crate) fn truncated(
    context: impl Into<String>,
    needed: u64,
    available: u64,
    offset: u64,
) -> RdbError {
    RdbError::TruncatedInput {
        context: context.into(),
        needed,
        available,
        offset: Some(offset),
        key: None,
    }
}

fn eof_on_peek(offset: u64) -> RdbError {
    RdbError::UnexpectedEof {
        context: "no byte left to peek".to_string(),
        remaining: 0,
        offset: Some(offset),
    }
}

impl<C: ByteCursor + ?Sized> ByteCursor for Box<C> {
    fn read_exact(
        &mut self,
        n: usize,
    ) -> RdbResult<Vec<u8>> {
        (**self).read_exact(n)
    }

    fn peek_byte(&mut self) -> RdbResult<u8> {
        (**self).peek_byte()
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn len(&self) -> u64 {
        (**self).len()
    }
}

////////////////////////////////////////////////////////////////////////////////
// SliceCursor
////////////////////////////////////////////////////////////////////////////////

/// Курсор над байтами в памяти.
#[derive(Debug, Clone)]
pub struct SliceCursor<B: AsRef<[u8]>> {
    data: B,
    pos: usize,
}

impl<B: AsRef<[u8]>> SliceCursor<B> {
    pub fn new(data: B) -> Self {
        Self { data, pos: 0 }
    }

    pub fn into_inner(self) -> B {
        self.data
    }
}

impl<B: AsRef<[u8]> + Debug> ByteCursor for SliceCursor<B> {
    fn read_exact(
        &mut self,
        n: usize,
    ) -> RdbResult<Vec<u8>> {
        let data = self.data.as_ref();
        let available = data.len() - self.pos;
        if n > available {
            return Err(truncated(
                format!("reading {n} bytes"),
                n as u64,
                available as u64,
                self.pos as u64,
            )
            .into());
        }
        let out = data[self.pos..self.pos + n].to_vec();
        self.pos += n;
        Ok(out)
    }

    fn peek_byte(&mut self) -> RdbResult<u8> {
        match self.data.as_ref().get(self.pos) {
            Some(b) => Ok(*b),
            None => Err(eof_on_peek(self.pos as u64).into()),
        }
    }

    fn position(&self) -> u64 {
        self.pos as u64
    }

    fn len(&self) -> u64 {
        self.data.as_ref().len() as u64
    }
}

////////////////////////////////////////////////////////////////////////////////
// FileCursor
////////////////////////////////////////////////////////////////////////////////

/// Буферизованный курсор над файлом.
///
/// Размер берётся из метаданных при открытии; файл закрывается при drop.
#[derive(Debug)]
pub struct FileCursor {
    reader: BufReader<File>,
    pos: u64,
    len: u64,
}

impl FileCursor {
    /// Открывает файл для чтения.
    pub fn open(path: impl AsRef<Path>) -> RdbResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Self::from_file(file)
    }

    pub fn from_file(file: File) -> RdbResult<Self> {
        let len = file
            .metadata()
            .context("reading file metadata")?
            .len();
        Ok(Self {
            reader: BufReader::with_capacity(FILE_BUFFER_CAPACITY, file),
            pos: 0,
            len,
        })
    }
}

impl ByteCursor for FileCursor {
    fn read_exact(
        &mut self,
        n: usize,
    ) -> RdbResult<Vec<u8>> {
        let available = self.remaining();
        if n as u64 > available {
            return Err(truncated(format!("reading {n} bytes"), n as u64, available, self.pos).into());
        }
        let mut buf = vec![0u8; n];
        self.reader
            .read_exact(&mut buf)
            .with_context(|| format!("reading {n} bytes at offset {}", self.pos))?;
        self.pos += n as u64;
        Ok(buf)
    }

    fn peek_byte(&mut self) -> RdbResult<u8> {
        let buf = self.reader.fill_buf().context("peeking next byte")?;
        match buf.first() {
            Some(b) => Ok(*b),
            None => Err(eof_on_peek(self.pos).into()),
        }
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn len(&self) -> u64 {
        self.len
    }
}

////////////////////////////////////////////////////////////////////////////////
// BlobReader
////////////////////////////////////////////////////////////////////////////////

/// Чтение внутри уже материализованного контейнера (ziplist, zipmap).
///
/// Выход за границу буфера означает повреждённый контейнер, поэтому
/// ошибки здесь `CorruptContainer`, а не `TruncatedInput`.
#[derive(Debug)]
pub(crate) struct BlobReader<'a> {
    data: &'a [u8],
    pos: usize,
    structure: &'static str,
}

impl<'a> BlobReader<'a> {
    pub(crate) fn new(
        data: &'a [u8],
        structure: &'static str,
    ) -> Self {
        Self {
            data,
            pos: 0,
            structure,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn corrupt(
        &self,
        reason: impl Into<String>,
    ) -> RdbError {
        RdbError::CorruptContainer {
            structure: self.structure.to_string(),
            reason: reason.into(),
            offset: None,
            key: None,
        }
    }

    /// Следующие `n` байт без копирования.
    pub(crate) fn take(
        &mut self,
        n: usize,
    ) -> RdbResult<&'a [u8]> {
        let available = self.data.len().saturating_sub(self.pos);
        if n > available {
            return Err(self
                .corrupt(format!(
                    "needs {n} bytes at blob offset {}, {available} left",
                    self.pos
                ))
                .into());
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub(crate) fn skip(
        &mut self,
        n: usize,
    ) -> RdbResult<()> {
        self.take(n).map(|_| ())
    }

    pub(crate) fn read_u8(&mut self) -> RdbResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn peek(&self) -> RdbResult<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.corrupt("missing terminator").into())
    }
}
