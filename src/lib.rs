/// Settings loading (defaults, config file, environment).
pub mod config;
/// Decoded data model: records, values and value types.
pub mod database;
/// RDB decoding engine: cursors, primitive readers, packed containers and the
/// record stream.
pub mod engine;
/// Structured logging on top of `tracing`.
pub mod logging;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Settings.
pub use crate::config::{OutputFormat, Settings, SettingsError};
/// Data model.
pub use crate::database::{Record, Value, ValueType};
/// Sessions, cursors and streaming handlers.
pub use crate::engine::{
    open, read_dump, ByteCursor, CallbackHandler, CollectHandler, CountHandler, FileCursor,
    FilterHandler, ParseEvent, ParseHandler, ParseStats, RdbVersion, RecordStream, Session,
    SessionState, SliceCursor, StreamingParser,
};
/// Error types and result alias.
pub use rdbscan_error::{RdbError, RdbResult, StackError, StatusCode};
