mod date_range;
mod record;

pub use date_range::{DateRange, TimeChunk};
pub use record::{EntityId, NormalizedRecord, RawRecord};

pub(crate) use date_range::{format_day, parse_day};
