//! Process-level setup for the loader binary.

mod logger;

pub use logger::init_logger_with;
