pub mod platform;
pub mod twilio;
