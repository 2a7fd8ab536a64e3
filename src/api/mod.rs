pub mod admin;
pub mod attendance;
pub mod location;
pub mod uploads;
