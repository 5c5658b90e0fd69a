//! Port implementations (adapters).
//!
//! 現状はインメモリ実装のみ。永続ストアを足すときはここに並べます。

pub mod memory;
pub mod recording;

pub use self::memory::{InMemoryDefinitionStore, InMemoryHouseholdDirectory, InMemoryOccurrenceStore};
pub use self::recording::RecordingEventSink;
