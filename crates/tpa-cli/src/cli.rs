use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tpa", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load and validate a pathway configuration
    Validate {
        /// Path to the configuration (yaml, json or toml)
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: PathBuf,
    },
    /// Print the logistic lower-bound curve between two capacities
    Scurve {
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: PathBuf,
        /// Capacity in the reference year
        #[arg(long)]
        start: f64,
        /// Capacity in the target year
        #[arg(long)]
        end: f64,
        #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
        format: OutputFormat,
    },
    /// Print the minimum schedule of a shared expansion group
    Schedule {
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: PathBuf,
        /// Group id as configured under shared_expansion.groups
        #[arg(long)]
        group: String,
        /// Combined capacity of the group in the target year
        #[arg(long)]
        target_result: f64,
        #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
        format: OutputFormat,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_schedule() {
        let cli = Cli::parse_from([
            "tpa",
            "--log-level",
            "debug",
            "schedule",
            "--config",
            "scenario.yaml",
            "--group",
            "res",
            "--target-result",
            "200",
        ]);
        assert_eq!(cli.log_level, tracing::Level::DEBUG);
        match cli.command {
            Commands::Schedule {
                group,
                target_result,
                format,
                ..
            } => {
                assert_eq!(group, "res");
                assert_eq!(target_result, 200.0);
                assert_eq!(format, OutputFormat::Plain);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
