//! PhishGuard CLI
//!
//! Parses arguments, installs logging and dispatches one command.

use clap::Parser;

use phishguard::cli::{init_logging, run, Cli, EXIT_FAILURE};

fn main() {
    let cli = Cli::parse();

    // Held until exit so the file writer flushes.
    let guard = match init_logging(cli.log_dir.as_deref(), cli.json_logs) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(EXIT_FAILURE);
        }
    };

    let code = run(cli);
    drop(guard);
    std::process::exit(code);
}
