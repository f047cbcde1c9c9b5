//! Attendance and leave rules. Engines take `now` and the caller's identity
//! as plain inputs and return [`crate::error::CoreError`] on rejection.

pub mod attendance;
pub mod leave;
