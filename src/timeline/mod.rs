pub mod batching;
pub mod runner;
pub mod source;

pub use batching::{batch_id, group_screenshots};
pub use runner::{BatchOutcome, TimelineRunner};
pub use source::collect_screenshots;
