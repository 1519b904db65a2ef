//! Command-line front end for halfkp.

pub mod command;
pub mod error;
pub mod runner;

pub use command::{Command, PositionSource, parse_command};
pub use error::CliError;
pub use runner::run;
