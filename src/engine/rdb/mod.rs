//! Декодер RDB дампов (версии формата 1..=6).
//!
//! ## Архитектура
//!
//! Модуль предоставляет два подхода к чтению дампов:
//!
//! #### 1. Итератор записей
//!
//! [`Session`] читает записи по одной, прозрачно обрабатывая SELECTDB и
//! маркеры expiry:
//!
//! ```no_run
//! use rdbscan::engine::rdb::open;
//!
//! let mut session = open("dump.rdb")?;
//! while let Some(record) = session.next_record()? {
//!     println!("{} ({})", record.key_str(), record.value_type);
//! }
//! session.close();
//! # Ok::<(), rdbscan_error::StackError>(())
//! ```
//!
//! #### 2. Streaming API
//!
//! Event-driven парсинг с обработчиками:
//!
//! ```no_run
//! use rdbscan::engine::rdb::{CountHandler, StreamingParser};
//!
//! let mut parser = StreamingParser::open("dump.rdb")?;
//! let mut handler = CountHandler::new();
//! parser.parse(&mut handler)?;
//! println!("{} records", handler.total_records());
//! # Ok::<(), rdbscan_error::StackError>(())
//! ```
//!
//! ## Модули
//!
//! - [`cursor`]: источник байт с чтением, peek и позицией
//! - [`compression`]: распаковка LZF-строк
//! - [`length`]: поле длины / специальной кодировки
//! - [`decode`]: строки, числа с плавающей точкой, expiry
//! - [`ziplist`]: упакованный список
//! - [`zipmap`]: упакованный словарь
//! - [`reader`]: поток записей и сессия
//! - [`streaming`]: SAX-style парсер и обработчики
//! - [`file`]: заголовок и версии формата
//! - [`tags`]: константы байтов типов и кодировок

pub mod compression;
pub mod cursor;
pub mod decode;
pub mod file;
pub mod length;
pub mod reader;
pub mod streaming;
pub mod tags;
pub mod ziplist;
pub mod zipmap;

pub use compression::*;
pub use cursor::*;
pub use decode::*;
pub use file::*;
pub use length::*;
pub use reader::*;
pub use streaming::*;
pub use tags::*;
pub use ziplist::*;
pub use zipmap::*;
