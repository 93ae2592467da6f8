use std::fs::File;
use std::io::{self, BufReader, BufWriter};

use anyhow::{bail, Context, Result};
use clap::Parser;
use phasetrace::{cli::Cli, replay, writer::Verbosity};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let Some(verbosity) = Verbosity::from_level(cli.name_detail) else {
        bail!("--name-detail must be 0, 1, or 2");
    };

    let (log, names) = match &cli.input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("cannot open event log {}", path.display()))?;
            replay::read_log(BufReader::new(file))
                .with_context(|| format!("cannot replay event log {}", path.display()))?
        }
        None => replay::read_log(io::stdin().lock()).context("cannot replay event log (stdin)")?,
    };

    match cli.output_path() {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("cannot create trace file {}", path.display()))?;
            log.write_trace(BufWriter::new(file), names, verbosity)
                .with_context(|| format!("cannot write trace file {}", path.display()))?;
        }
        None => {
            log.write_trace(io::stdout().lock(), names, verbosity)
                .context("cannot write trace document to stdout")?;
        }
    }

    Ok(())
}
