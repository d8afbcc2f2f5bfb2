pub mod format;

pub use format::{day_and_time, delivery_time, time_remaining};
