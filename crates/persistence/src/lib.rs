//! JobQuest Persistence - SQLite storage and in-memory session caches

pub mod cache;
pub mod sqlite;

pub use cache::{InMemorySessionStore, SessionStore, TtlCache};
pub use sqlite::Database;
