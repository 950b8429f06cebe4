// Database module
// SQLite metadata store: ingestion ledger and chat history

pub mod sqlite;

pub use sqlite::*;
