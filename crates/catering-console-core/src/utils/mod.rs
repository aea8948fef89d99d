//! Small filesystem helpers shared by the session files and config.

pub mod fs;

pub use fs::{read_json, remove_if_exists, write_json_atomic};
