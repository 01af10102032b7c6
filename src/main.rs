use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};

use recruiter_kpi::config::Config;
use recruiter_kpi::error::KpiError;
use recruiter_kpi::logging::init_logging;
use recruiter_kpi::models::Window;
use recruiter_kpi::{metrics, pipeline, report};

#[derive(Parser)]
#[command(name = "recruiter-kpi")]
#[command(about = "Recruitment KPI dashboard data from the weekly team export", long_about = None)]
struct Cli {
    /// Log debug output
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("window")
        .args(["week", "last_weeks"])
        .multiple(false)
))]
struct SourceArgs {
    /// Weekly export (.xlsx, .xls, .ods or .csv)
    #[arg(long, default_value = "KPI Team.xlsx")]
    input: PathBuf,
    /// TOML configuration; defaults to ./kpi.toml when present
    #[arg(long)]
    config: Option<PathBuf>,
    /// Restrict to one ISO week number
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=53))]
    week: Option<u32>,
    /// Restrict to the most recent N weeks
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    last_weeks: Option<u64>,
}

impl SourceArgs {
    fn window(&self) -> Window {
        match (self.week, self.last_weeks) {
            (Some(week), _) => Window::Week(week),
            (None, Some(count)) => Window::Trailing(count as usize),
            (None, None) => Window::All,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Print team averages against targets
    Summary {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value = "kpi-report.md")]
        out: PathBuf,
    },
    /// Export dashboard data (json) or the cleaned table (csv)
    Export {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List the weekly periods present in the export
    Weeks {
        #[command(flatten)]
        source: SourceArgs,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<KpiError>() {
            Some(KpiError::InputNotFound { path }) => {
                eprintln!(
                    "Input file '{}' not found. Place the weekly KPI export at that path or pass --input.",
                    path.display()
                );
                ExitCode::from(2)
            }
            _ => {
                eprintln!("Error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

fn load_config(source: &SourceArgs) -> anyhow::Result<Config> {
    Config::load(source.config.as_deref()).context("failed to load configuration")
}

fn write_output(out: Option<&Path>, content: &[u8]) -> anyhow::Result<()> {
    match out {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            use std::io::Write;
            std::io::stdout().write_all(content)?;
            Ok(())
        }
    }
}

fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Summary { source } => {
            let config = load_config(&source)?;
            let dashboard = pipeline::run(&source.input, &config, source.window())?;
            print!("{}", report::build_summary(&dashboard));
        }
        Commands::Report { source, out } => {
            let config = load_config(&source)?;
            let dashboard = pipeline::run(&source.input, &config, source.window())?;
            let report = report::build_report(&dashboard);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            source,
            format,
            out,
        } => {
            let config = load_config(&source)?;
            let dashboard = pipeline::run(&source.input, &config, source.window())?;
            let content = match format {
                ExportFormat::Json => {
                    let mut json = serde_json::to_vec_pretty(&dashboard)?;
                    json.push(b'\n');
                    json
                }
                ExportFormat::Csv => {
                    let mut buffer = Vec::new();
                    report::write_csv(&dashboard.records, &mut buffer)?;
                    buffer
                }
            };
            write_output(out.as_deref(), &content)?;
        }
        Commands::Weeks { source } => {
            let config = load_config(&source)?;
            let rows = pipeline::load_metrics(&source.input, &config)?;
            let periods = metrics::available_periods(&rows);

            if periods.is_empty() {
                println!("No dated periods found in {}.", source.input.display());
                return Ok(());
            }
            for period in periods {
                let count = rows
                    .iter()
                    .filter(|row| metrics::period_of(row) == Some(period))
                    .count();
                println!("- {period} (week {}): {count} records", period.week);
            }
        }
    }

    Ok(())
}
