use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::path::Path;
use tabwriter::TabWriter;
use tpa_cli::{Cli, Commands, OutputFormat};
use tpa_core::{load_config_from_path, PathwayConfig};
use tpa_path::{lower_bound_curve, minimum_schedule};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

fn load_validated(path: &Path) -> Result<PathwayConfig> {
    let config = load_config_from_path(path)?;
    config
        .validate()
        .with_context(|| format!("validating '{}'", path.display()))?;
    Ok(config)
}

fn run_validate(path: &Path) -> Result<()> {
    let config = load_validated(path)?;
    let years = config.years.model_years();
    info!(groups = config.shared_expansion.groups.len(), "configuration valid");
    println!(
        "Configuration valid: {} model years ({})",
        years.len(),
        years
            .iter()
            .map(|y| y.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}

fn run_scurve(path: &Path, start: f64, end: f64, format: OutputFormat) -> Result<()> {
    let config = load_validated(path)?;
    let years = &config.years;
    let curve = lower_bound_curve(&config.s_curve, start, end, years.reference, years.target);

    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = curve
                .iter()
                .map(|(year, lower)| serde_json::json!({ "year": year, "lower": lower }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Plain => {
            let mut writer = TabWriter::new(io::stdout());
            writeln!(writer, "YEAR\tLOWER")?;
            for (year, lower) in curve {
                writeln!(writer, "{year}\t{lower:.4}")?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

fn run_schedule(path: &Path, group: &str, target_result: f64, format: OutputFormat) -> Result<()> {
    let config = load_validated(path)?;
    let group = config
        .shared_expansion
        .group(group)
        .with_context(|| format!("no shared expansion group '{group}' in '{}'", path.display()))?;
    let schedule = minimum_schedule(
        &config.years,
        group.yearly_expansion_cap,
        target_result,
        |_| 0.0,
        |_| 0.0,
    )?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&schedule)?),
        OutputFormat::Plain => {
            println!("Switch year: {}", schedule.switch_year);
            let mut writer = TabWriter::new(io::stdout());
            writeln!(writer, "YEAR\tREQUIRED\tYEARLY MIN")?;
            for (year, min) in &schedule.yearly_min {
                let required = schedule
                    .required
                    .get(year)
                    .map(|r| format!("{r:.4}"))
                    .unwrap_or_else(|| "-".to_string());
                writeln!(writer, "{year}\t{required}\t{min:.4}")?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    match &cli.command {
        Commands::Validate { config } => {
            info!("Validating pathway configuration {}", config.display());
            run_validate(config)
        }
        Commands::Scurve {
            config,
            start,
            end,
            format,
        } => run_scurve(config, *start, *end, *format),
        Commands::Schedule {
            config,
            group,
            target_result,
            format,
        } => run_schedule(config, group, *target_result, *format),
    }
}
