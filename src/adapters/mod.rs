//! Local implementations of the workflow ports

pub mod fs_cache;
pub mod memory;
pub mod recording;

pub use fs_cache::TokioFileCache;
pub use memory::{InMemoryStore, StoreSnapshot};
pub use recording::{IndexCall, LoggingNotificationSink, RecordingIndexer, SentNotification};
