pub mod job;
pub mod notification;
pub mod status;
pub mod worker;
