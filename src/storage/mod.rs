pub mod csv;
pub mod sqlite;

pub use sqlite::{SqliteStorage, post_key};
