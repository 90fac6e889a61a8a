pub mod cli;
pub mod client;
pub mod error;
pub mod monitor;
