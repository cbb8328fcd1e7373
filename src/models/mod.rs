mod count_pair;
mod event;
mod io_type;

pub use count_pair::CountPair;
pub use event::TraceEvent;
pub use io_type::IOType;
