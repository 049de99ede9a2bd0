pub mod channel;
pub mod config;
pub mod errors;
pub mod logging;
pub mod mock;
pub mod session;
pub mod ui;
