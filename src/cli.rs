//! CLI argument parsing for the phasetrace replay binary

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "phasetrace")]
#[command(version)]
#[command(about = "Turn a phase-boundary event log into a Chrome trace document", long_about = None)]
pub struct Cli {
    /// Event log to replay (JSON lines); reads stdin when omitted
    pub input: Option<PathBuf>,

    /// Trace document destination (default: <input>.trace.json, or stdout
    /// when reading stdin)
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Function name detail level: 0 bare name, 1 add enclosing scope,
    /// 2 add signature detail
    #[arg(long = "name-detail", value_name = "LEVEL", default_value = "1")]
    pub name_detail: u8,

    /// Enable debug logging to stderr
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Where the trace document goes: explicit `--output`, otherwise derived
    /// from the input path, otherwise stdout (`None`).
    pub fn output_path(&self) -> Option<PathBuf> {
        self.output.clone().or_else(|| {
            self.input
                .as_ref()
                .map(|input| input.with_extension("trace.json"))
        })
    }
}
