//! Command-line errors.

use std::path::PathBuf;

use halfkp_core::FenError;
use halfkp_nnue::{CheckpointError, ConfigError, ExportError, NetworkError};

/// Errors from parsing or running a command.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// No command, or an unknown one.
    #[error("unknown command: {command:?} (try `help`)")]
    UnknownCommand { command: String },

    /// A required positional argument is missing.
    #[error("missing argument: {name}")]
    MissingArgument { name: &'static str },

    /// A `--flag` this command does not take.
    #[error("unknown option: {flag}")]
    UnknownFlag { flag: String },

    /// A `--flag` given without its value.
    #[error("option {flag} needs a value")]
    MissingFlagValue { flag: String },

    /// A positional argument past the ones the command takes.
    #[error("unexpected argument: {arg:?}")]
    UnexpectedArgument { arg: String },

    #[error("option {flag} needs a positive integer, got {value:?}")]
    InvalidNumber { flag: String, value: String },

    /// A positions file with no FEN in it.
    #[error("no positions in {}", path.display())]
    NoPositions { path: PathBuf },

    #[error("invalid FEN {fen:?}: {source}")]
    InvalidFen { fen: String, source: FenError },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("snapshot: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("export failed: {0}")]
    Export(#[from] ExportError),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}
