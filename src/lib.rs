pub mod config;
pub mod constants;
pub mod error;
pub mod inspection;
pub mod logging;
pub mod phases;
pub mod pipeline;
pub mod types;
