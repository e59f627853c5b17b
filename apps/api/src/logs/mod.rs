pub mod handlers;
pub mod proof;
pub mod store;
