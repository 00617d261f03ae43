pub mod logging;
pub mod structured;
