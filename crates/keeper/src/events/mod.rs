pub mod block_tracker;
pub mod monitor;

pub use block_tracker::BlockTracker;
pub use monitor::{EventMonitor, EventSource};
