pub mod scheduler;

pub use scheduler::{place_batch, suggest_next_start_time, ScheduleError, Scheduler};
