mod logging;
mod spawn;

use clap::Parser;
use tracing::level_filters::LevelFilter;

use crate::logging::LogFormat;

#[derive(Parser, Debug)]
#[command(
    name = "rankwire-launch",
    version,
    about = "Run a fixed-size rankwire job"
)]
struct Cli {
    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: LevelFilter,

    /// Number of worker processes to spawn.
    #[arg(value_name = "RANKS")]
    ranks: usize,

    /// Worker program; every rank runs the same one.
    #[arg(value_name = "PROGRAM")]
    program: String,

    /// Arguments passed to every worker.
    #[arg(
        value_name = "ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_format, cli.log_level);

    match spawn::run_job(cli.ranks, &cli.program, &cli.args) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}
