//! CLI module - console output for runs

pub mod printer;

pub use printer::{print_event, summary};
