//! CLI argument parsing
//!
//! ```text
//! phishguard [--config <file>] [--log-dir <dir>] [--json-logs] <command>
//!
//! COMMANDS:
//!   train                         Run the full training pipeline
//!   push-data --file <csv>        Load a CSV into the document collection
//!   predict --input <csv>         Score a CSV with the published model
//!   serve [--host] [--port]       Start the HTTP API
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// PhishGuard: phishing URL classifier training and serving
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "phishguard")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Pipeline configuration file (YAML or TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Also write logs to a timestamped file in this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Emit console logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run ingestion, validation, transformation and model training
    Train,

    /// Insert every row of a CSV into the configured collection
    PushData {
        /// CSV file with a header row
        #[arg(long)]
        file: PathBuf,
    },

    /// Score a CSV with the published preprocessor and model
    Predict {
        #[arg(long)]
        input: PathBuf,

        /// Defaults to `<prediction_dir>/output.csv`
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Serve the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_train_with_global_options() {
        let cli = Cli::parse_from(["phishguard", "train", "--config", "config/pipeline.yaml"]);
        assert_eq!(cli.command, Command::Train);
        assert_eq!(cli.config, Some(PathBuf::from("config/pipeline.yaml")));
        assert!(!cli.json_logs);
    }

    #[test]
    fn test_parse_push_data() {
        let cli = Cli::parse_from(["phishguard", "--json-logs", "push-data", "--file", "data.csv"]);
        assert_eq!(
            cli.command,
            Command::PushData {
                file: PathBuf::from("data.csv")
            }
        );
        assert!(cli.json_logs);
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::parse_from(["phishguard", "serve", "--port", "9000"]);
        assert_eq!(
            cli.command,
            Command::Serve {
                host: None,
                port: Some(9000)
            }
        );
    }

    #[test]
    fn test_predict_requires_input() {
        assert!(Cli::try_parse_from(["phishguard", "predict"]).is_err());
    }
}
