//! MultiGuard Events - JSONL audit log
//!
//! Every guard state transition can be appended to a daily-rotated JSONL
//! file and replayed later for inspection.

pub mod error;
pub mod reader;
pub mod store;

pub use error::EventError;
pub use reader::EventReader;
pub use store::{EventRecord, JsonlEventSink};
