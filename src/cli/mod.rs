// CLI module for oggplex
//
// Thin reading/remuxing tool on top of the library: every damaged or lost
// page is reported and processing carries on where the format allows.

pub mod commands;
pub mod config;
pub mod output;

pub use config::{Commands, Config};
pub use output::OutputFormatter;
