pub mod config;
pub mod control_system;
pub mod errors;
pub mod global_variables;
pub mod hardware;
pub mod monitoring;
pub mod perception;
pub mod shared_data;
