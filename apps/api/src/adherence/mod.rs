// Adherence Engine. Everything except `handlers` is pure and shared by the HTTP
// API, the scheduled sweep and the client session monitor.

pub mod calendar;
pub mod detector;
pub mod handlers;
pub mod slots;
pub mod stats;
pub mod status;
