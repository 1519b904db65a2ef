//! Running commands against snapshots on disk.

use std::fs;
use std::io::Cursor;

use halfkp_cli::{CliError, parse_command, run};
use halfkp_core::STARTING_FEN;
use halfkp_nnue::{BlobHeader, BlobLayout, NetworkConfig, NetworkParameters, QuantScheme, checkpoint};

fn run_line(line: &str) -> Result<String, CliError> {
    let args: Vec<&str> = line.split_whitespace().collect();
    let mut out: Vec<u8> = Vec::new();
    run(parse_command(&args)?, &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

fn small() -> NetworkConfig {
    NetworkConfig {
        hidden_size: 8,
        ..NetworkConfig::default()
    }
}

#[test]
fn export_writes_artifact_with_default_description() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("net.bin");
    let dest = dir.path().join("net.nnue");
    let mut value = 0.0f32;
    let params = NetworkParameters::from_fn(&small(), || {
        value += 0.001;
        value
    });
    checkpoint::save(&params, &snapshot).unwrap();

    let text = run_line(&format!("export {} {}", snapshot.display(), dest.display())).unwrap();
    assert!(text.starts_with("wrote "));
    assert!(text.contains("feature_in.weights"));

    let bytes = fs::read(&dest).unwrap();
    let header = BlobHeader::read(&mut Cursor::new(&bytes)).unwrap();
    assert_eq!(header.description, "NNUE 768->8->1");
    assert_eq!(header.scheme(), Some(QuantScheme::Scaled));
    assert_eq!(bytes.len(), BlobLayout::for_config(&small(), header.description.len()).total_len);
}

#[test]
fn eval_prints_zero_for_zero_network() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("zero.bin");
    checkpoint::save(&NetworkParameters::zeros(&small()), &snapshot).unwrap();

    let text = run_line(&format!("eval {} {STARTING_FEN}", snapshot.display())).unwrap();
    assert_eq!(text, "0.0 (white-relative, scale 361)\n");
}

#[test]
fn missing_snapshot_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("absent.bin");
    let err = run_line(&format!("eval {} {STARTING_FEN}", snapshot.display())).unwrap_err();
    assert!(matches!(err, CliError::Checkpoint(_)));
}

#[test]
fn export_plain_scheme_is_recorded_in_header() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("net.bin");
    let dest = dir.path().join("plain.nnue");
    checkpoint::save(&NetworkParameters::zeros(&small()), &snapshot).unwrap();

    let text = run_line(&format!(
        "export {} {} --scheme plain",
        snapshot.display(),
        dest.display()
    ))
    .unwrap();
    assert!(text.contains("scheme plain, version 0x7af32f01"));
    let header = BlobHeader::read(&mut Cursor::new(fs::read(&dest).unwrap())).unwrap();
    assert_eq!(header.scheme(), Some(QuantScheme::Plain));
}

#[test]
fn eval_file_scores_each_line_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("zero.bin");
    let fens = dir.path().join("fens.txt");
    checkpoint::save(&NetworkParameters::zeros(&small()), &snapshot).unwrap();
    fs::write(
        &fens,
        format!("{STARTING_FEN}\n8/8/8/8/4r3/8/8/4K3 b - - 0 1\n4k3/8/8/8/8/8/8/4K3 w - - 0 1\n"),
    )
    .unwrap();

    let text = run_line(&format!(
        "eval {} --file {} --preset cpu_only",
        snapshot.display(),
        fens.display()
    ))
    .unwrap();
    assert_eq!(
        text,
        "0.0 (white-relative, scale 361)\n\
         no evaluable position (side to move has no king)\n\
         0.0 (white-relative, scale 361)\n"
    );
}

#[test]
fn bench_and_importance_report() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("net.bin");
    let mut value = 0.0f32;
    let params = NetworkParameters::from_fn(&small(), || {
        value += 0.001;
        value
    });
    checkpoint::save(&params, &snapshot).unwrap();

    let text = run_line(&format!("bench {} {STARTING_FEN} --rounds 2", snapshot.display())).unwrap();
    assert!(text.starts_with("evaluations: 2, threads: "));
    assert!(text.contains("speedup: "));

    let text = run_line(&format!("importance {} {STARTING_FEN} --top 3", snapshot.display())).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "analyzed 1 positions");
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("1. feature "));
}

#[test]
fn stray_argument_is_an_error() {
    let err = run_line("export net.bin out.nnue extra").unwrap_err();
    assert!(matches!(err, CliError::UnexpectedArgument { arg } if arg == "extra"));
}
