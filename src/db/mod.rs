//! Relational persistence.
//!
//! One libsql database holds everything durable: conversations and their
//! messages, clarification questions, memory chunks, the raw embedding rows
//! the in-memory vector index is rebuilt from, and the search-result cache.

pub mod sqlite;

pub use sqlite::Database;
