pub mod driver;
pub mod record;
pub mod writer;

pub use driver::{Outcome, Replay};
pub use record::JobRecord;
pub use writer::{RecordWriter, UtilLog};
