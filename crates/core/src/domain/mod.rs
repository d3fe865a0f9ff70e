pub mod record;

pub use record::{Record, RecordId, RecordStatus};
