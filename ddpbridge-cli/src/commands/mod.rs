//! Subcommand implementations

pub mod inspect;
pub mod ports;
pub mod run;
pub mod test_pattern;
