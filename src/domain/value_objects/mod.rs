pub mod job_counter;
pub mod job_state;
pub mod wildcards;

pub use job_counter::JobCounter;
pub use job_state::{JobState, RunReason};
pub use wildcards::WildcardBindings;
