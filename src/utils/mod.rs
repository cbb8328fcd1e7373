pub mod compression;
pub mod logger;

pub use self::compression::{list_trace_files, stream_lines};
pub use self::logger::Logger;
