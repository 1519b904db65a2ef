//! Command-line parsing.

use std::path::PathBuf;

use halfkp_core::Position;
use halfkp_nnue::{FeatureLayout, Preset, QuantScheme};

use crate::error::CliError;

/// Fields in a full FEN record.
const FEN_FIELDS: usize = 6;

/// `bench` repetitions when `--rounds` is not given.
pub const DEFAULT_ROUNDS: usize = 100;

/// `importance` entries when `--top` is not given.
pub const DEFAULT_TOP: usize = 20;

/// Where a command takes its positions from.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionSource {
    /// One FEN on the command line.
    Fen(Position),
    /// One FEN per line; blank lines and lines starting with `#` are skipped.
    File(PathBuf),
}

/// A parsed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `features <fen> [--layout name]` -- print the active feature indices.
    Features { position: Position, layout: FeatureLayout },
    /// `eval <snapshot> (<fen> | --file path) [--preset name]` -- score positions.
    Eval {
        snapshot: PathBuf,
        positions: PositionSource,
        preset: Preset,
    },
    /// `bench <snapshot> (<fen> | --file path) [--preset name] [--rounds n]`
    /// -- single vs batched evaluation throughput.
    Bench {
        snapshot: PathBuf,
        positions: PositionSource,
        preset: Preset,
        rounds: usize,
    },
    /// `importance <snapshot> (<fen> | --file path) [--preset name] [--top n]`
    /// -- rank input features by first-layer weight and activation frequency.
    Importance {
        snapshot: PathBuf,
        positions: PositionSource,
        preset: Preset,
        top: usize,
    },
    /// `export <snapshot> <out> [--preset name] [--scheme name] [--description text]`
    /// -- write a quantized artifact.
    Export {
        snapshot: PathBuf,
        out: PathBuf,
        preset: Preset,
        scheme: QuantScheme,
        description: Option<String>,
    },
    /// `presets` -- list the named configurations.
    Presets,
    /// `help`
    Help,
}

/// Usage text printed by `help`.
pub const USAGE: &str = "\
usage: halfkp <command>

commands:
  features <fen> [--layout compact|king-relative]
  eval <snapshot> (<fen> | --file fens.txt) [--preset name]
  bench <snapshot> (<fen> | --file fens.txt) [--preset name] [--rounds n]
  importance <snapshot> (<fen> | --file fens.txt) [--preset name] [--top n]
  export <snapshot> <out.nnue> [--preset name] [--scheme plain|scaled] [--description text]
  presets
  help";

/// Parse the arguments after the program name.
pub fn parse_command<S: AsRef<str>>(args: &[S]) -> Result<Command, CliError> {
    let tokens: Vec<&str> = args.iter().map(|s| s.as_ref()).collect();
    let Some((&name, rest)) = tokens.split_first() else {
        return Ok(Command::Help);
    };

    match name {
        "features" => parse_features(rest),
        "eval" => parse_eval(rest),
        "bench" => parse_bench(rest),
        "importance" => parse_importance(rest),
        "export" => parse_export(rest),
        "presets" => no_arguments(rest, Command::Presets),
        "help" | "--help" | "-h" => no_arguments(rest, Command::Help),
        other => Err(CliError::UnknownCommand {
            command: other.to_string(),
        }),
    }
}

fn unexpected(arg: &str) -> CliError {
    CliError::UnexpectedArgument {
        arg: arg.to_string(),
    }
}

fn no_arguments(tokens: &[&str], command: Command) -> Result<Command, CliError> {
    match tokens.first() {
        Some(arg) => Err(unexpected(arg)),
        None => Ok(command),
    }
}

/// Positional tokens and `--flag value` pairs, in order.
struct Args<'a> {
    positional: Vec<&'a str>,
    flags: Vec<(&'a str, &'a str)>,
}

impl<'a> Args<'a> {
    fn split(tokens: &[&'a str]) -> Result<Self, CliError> {
        let mut positional = Vec::new();
        let mut flags = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            if tokens[i].starts_with("--") {
                let value = tokens.get(i + 1).ok_or_else(|| CliError::MissingFlagValue {
                    flag: tokens[i].to_string(),
                })?;
                flags.push((tokens[i], *value));
                i += 2;
            } else {
                positional.push(tokens[i]);
                i += 1;
            }
        }
        Ok(Self { positional, flags })
    }

    /// Reject any flag not in `allowed`.
    fn only(&self, allowed: &[&str]) -> Result<(), CliError> {
        match self.flags.iter().find(|(flag, _)| !allowed.contains(flag)) {
            Some((flag, _)) => Err(CliError::UnknownFlag {
                flag: flag.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn flag(&self, name: &str) -> Option<&'a str> {
        self.flags.iter().rev().find(|(flag, _)| *flag == name).map(|(_, v)| *v)
    }

    fn preset(&self) -> Result<Preset, CliError> {
        Ok(match self.flag("--preset") {
            Some(name) => name.parse()?,
            None => Preset::Default,
        })
    }

    /// A positive integer flag, `default` when absent.
    fn count(&self, name: &str, default: usize) -> Result<usize, CliError> {
        let Some(value) = self.flag(name) else {
            return Ok(default);
        };
        value
            .parse::<usize>()
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| CliError::InvalidNumber {
                flag: name.to_string(),
                value: value.to_string(),
            })
    }

    /// `<snapshot>` followed by either FEN fields or `--file`.
    fn snapshot_and_positions(&self) -> Result<(PathBuf, PositionSource), CliError> {
        let (snapshot, fen) = self
            .positional
            .split_first()
            .ok_or(CliError::MissingArgument { name: "snapshot" })?;
        let positions = match (self.flag("--file"), fen.first()) {
            (Some(_), Some(extra)) => return Err(unexpected(extra)),
            (Some(path), None) => PositionSource::File(PathBuf::from(path)),
            (None, _) => PositionSource::Fen(parse_fen(fen)?),
        };
        Ok((PathBuf::from(snapshot), positions))
    }
}

/// Join FEN fields back together and parse them.
fn parse_fen(fields: &[&str]) -> Result<Position, CliError> {
    if fields.is_empty() {
        return Err(CliError::MissingArgument { name: "fen" });
    }
    if let Some(extra) = fields.get(FEN_FIELDS) {
        return Err(unexpected(extra));
    }
    let fen = fields.join(" ");
    fen.parse().map_err(|source| CliError::InvalidFen { fen, source })
}

fn parse_features(tokens: &[&str]) -> Result<Command, CliError> {
    let args = Args::split(tokens)?;
    args.only(&["--layout"])?;
    let layout = match args.flag("--layout") {
        Some(name) => name.parse()?,
        None => FeatureLayout::default(),
    };
    Ok(Command::Features {
        position: parse_fen(&args.positional)?,
        layout,
    })
}

fn parse_eval(tokens: &[&str]) -> Result<Command, CliError> {
    let args = Args::split(tokens)?;
    args.only(&["--preset", "--file"])?;
    let (snapshot, positions) = args.snapshot_and_positions()?;
    Ok(Command::Eval {
        snapshot,
        positions,
        preset: args.preset()?,
    })
}

fn parse_bench(tokens: &[&str]) -> Result<Command, CliError> {
    let args = Args::split(tokens)?;
    args.only(&["--preset", "--file", "--rounds"])?;
    let (snapshot, positions) = args.snapshot_and_positions()?;
    Ok(Command::Bench {
        snapshot,
        positions,
        preset: args.preset()?,
        rounds: args.count("--rounds", DEFAULT_ROUNDS)?,
    })
}

fn parse_importance(tokens: &[&str]) -> Result<Command, CliError> {
    let args = Args::split(tokens)?;
    args.only(&["--preset", "--file", "--top"])?;
    let (snapshot, positions) = args.snapshot_and_positions()?;
    Ok(Command::Importance {
        snapshot,
        positions,
        preset: args.preset()?,
        top: args.count("--top", DEFAULT_TOP)?,
    })
}

fn parse_export(tokens: &[&str]) -> Result<Command, CliError> {
    let args = Args::split(tokens)?;
    args.only(&["--preset", "--scheme", "--description"])?;
    let [snapshot, out, rest @ ..] = args.positional.as_slice() else {
        let name = if args.positional.is_empty() { "snapshot" } else { "out" };
        return Err(CliError::MissingArgument { name });
    };
    if let Some(extra) = rest.first() {
        return Err(unexpected(extra));
    }
    let scheme = match args.flag("--scheme") {
        Some(name) => name.parse()?,
        None => QuantScheme::default(),
    };
    Ok(Command::Export {
        snapshot: PathBuf::from(snapshot),
        out: PathBuf::from(out),
        preset: args.preset()?,
        scheme,
        description: args.flag("--description").map(str::to_string),
    })
}
