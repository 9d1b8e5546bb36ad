mod record;
mod session;

pub use record::{iso_millis, RawLog, RecordLabels, ResultRecord, RESULT_HEADER};
pub use session::Session;
