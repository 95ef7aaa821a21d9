// Public API for integration tests and potential library usage

pub mod broadcast;
pub mod config;
pub mod protocol;
pub mod results;
pub mod session;
pub mod state;
pub mod store;
pub mod types;
pub mod ws;
