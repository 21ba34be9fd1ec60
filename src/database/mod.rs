//! Data model produced by the decoder.
//!
//! - `types`: [`Record`], [`Value`] and the declared [`ValueType`] of a record.

pub mod types;

pub use types::*;
