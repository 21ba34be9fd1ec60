//! Decoding engine.
//!
//! - `rdb`: cursors, primitive value readers, ziplist/zipmap decoders, the
//!   record stream and the event-driven parser built on top of it.

pub mod rdb;

pub use rdb::*;
