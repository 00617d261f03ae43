pub mod batch;
pub mod card;
pub mod observation;
pub mod screenshot;

pub use batch::{Batch, BatchRecord, BatchStatus};
pub use card::{ActivityCardData, ActivityGenerationContext, AppSites, Distraction};
pub use observation::Observation;
pub use screenshot::{FrameDescription, SampledFrame, Screenshot};
