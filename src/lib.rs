pub mod aggregate;
pub mod models;
pub mod output;
pub mod parsers;
pub mod utils;

pub use aggregate::{Aggregator, AggregatorConfig, StripeGeometry, TimeRange};
pub use models::{CountPair, IOType, TraceEvent};
pub use parsers::{parse_line, parser_worker, Provider};
