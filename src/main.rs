use anyhow::Result;
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = halfkp_cli::parse_command(&args)?;
    info!(?command, "halfkp starting");
    halfkp_cli::run(command, &mut std::io::stdout().lock())?;
    Ok(())
}
