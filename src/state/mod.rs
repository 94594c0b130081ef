//! Run snapshots persisted inside the project directory so an interrupted
//! run can be resumed from its last completed round.

mod snapshot;

pub use snapshot::{RunSnapshot, SNAPSHOT_VERSION, STATE_FILE_NAME};
