// Caretaker notifications: persistence, the idempotent dispatcher, the mail
// relay and the scheduled sweep that feeds them.

pub mod dispatcher;
pub mod handlers;
pub mod mailer;
pub mod store;
pub mod sweep;
