pub mod primitives;
pub mod scheduler;

pub use primitives::{ZoneHandle, SAY_BASE_TICKS, SAY_TICKS_PER_CHAR, WALK_PACE_TICKS};
pub use scheduler::{on_step_thread, Scheduler, Submitter, Task, TaskStatus, SUBMISSION_CAPACITY};
