pub mod line;
pub mod worker;

pub use line::{parse_line, Provider};
pub use worker::parser_worker;
