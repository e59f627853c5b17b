pub mod account;
pub mod log;
pub mod medication;
pub mod notification;
