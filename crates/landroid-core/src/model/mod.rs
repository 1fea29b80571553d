// ── Device payload model ──
//
// Types exchanged with the mower over the broker. REST-side records
// (`UserProfile`, `DeviceRecord`) live in `landroid-api`.

pub mod command;
pub mod status;

pub use command::CommandEnvelope;
pub use status::{
    Battery, MowerActivity, MowerError, MowerStatus, Schedule, ScheduleSlot, Statistics,
    StatusConfig, StatusData,
};
