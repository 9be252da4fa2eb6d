pub mod frames;
pub mod rest_fill;
pub mod speedup;

pub use frames::{
    note_frame_durations, phone_frame_durations, plan_phone_starts, total_frames,
    word_frame_durations, PhoneStartPlan,
};
pub use rest_fill::fill_nearest;
pub use speedup::speedup_from_steps;
