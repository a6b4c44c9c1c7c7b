pub mod error;
pub mod lines;
pub mod track_log;
pub mod dedup;

pub use error::{PersistenceError, Result};
pub use lines::LineWriter;
pub use track_log::{TrackEntry, TrackLog};
pub use dedup::DedupLedger;
