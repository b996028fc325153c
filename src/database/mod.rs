// Database module
// SQLite conversation log

pub mod sqlite;

pub use sqlite::*;
