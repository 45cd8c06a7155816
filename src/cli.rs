//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{self, CsvAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::svg_chart::SvgChartAdapter;
use crate::domain::bar::EventBar;
use crate::domain::builder::build_bars_with_progress;
use crate::domain::config_validation::{check_threshold, validate_config};
use crate::domain::cusum::{CusumConfig, ZeroClosePolicy};
use crate::domain::error::CusumError;
use crate::domain::observation::Observation;
use crate::domain::summary::BarSummary;
use crate::domain::validator::{validate, ValidationReport};
use crate::ports::chart_port::ChartPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

/// Processed-index stride between progress log events.
const PROGRESS_STRIDE: usize = 100_000;

pub const LINE_CHART_FILE: &str = "cusum_comparison.svg";
pub const CANDLESTICK_CHART_FILE: &str = "cusum_candlestick_comparison.svg";

#[derive(Parser, Debug)]
#[command(name = "cusumbars", about = "Convert OHLC series into CUSUM event bars")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build, validate and export CUSUM bars
    Convert {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        threshold: Option<f64>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        chart_dir: Option<PathBuf>,
        #[arg(long)]
        no_charts: bool,
    },
    /// Validate a previously exported bar file against its source
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        bars: PathBuf,
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        threshold: Option<f64>,
    },
    /// Check a configuration file without running
    CheckConfig {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub input: Option<PathBuf>,
    pub threshold: Option<f64>,
    pub output: Option<PathBuf>,
    pub chart_dir: Option<PathBuf>,
    pub no_charts: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub cusum: CusumConfig,
    pub input_path: PathBuf,
    pub time_format: Option<String>,
    pub bars_path: PathBuf,
    pub chart_dir: PathBuf,
    pub candles: usize,
    pub charts: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub bars: Vec<EventBar>,
    pub report: ValidationReport,
    pub summary: BarSummary,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Convert {
            config,
            input,
            threshold,
            output,
            chart_dir,
            no_charts,
        } => run_convert(
            &config,
            Overrides {
                input,
                threshold,
                output,
                chart_dir,
                no_charts,
            },
        ),
        Command::Validate {
            config,
            bars,
            input,
            threshold,
        } => run_validate(
            &config,
            &bars,
            Overrides {
                input,
                threshold,
                ..Overrides::default()
            },
        ),
        Command::CheckConfig { config } => run_check_config(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, CusumError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    init_logging(adapter.get_string("logging", "level").as_deref());
    Ok(adapter)
}

/// Install the stderr subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(level: Option<&str>) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(level.unwrap_or("info"))
    });
    // Already installed when called twice in one process.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn build_cusum_config(
    adapter: &dyn ConfigPort,
    threshold_override: Option<f64>,
) -> Result<CusumConfig, CusumError> {
    let threshold = match threshold_override {
        Some(t) => t,
        None => {
            let raw = adapter.require_string("cusum", "threshold")?;
            raw.trim().parse().map_err(|_| {
                CusumError::config_invalid("cusum", "threshold", format!("'{raw}' is not a number"))
            })?
        }
    };
    check_threshold(threshold)?;

    let zero_close = match adapter.get_string("cusum", "zero_close") {
        Some(s) => s
            .parse::<ZeroClosePolicy>()
            .map_err(|reason| CusumError::config_invalid("cusum", "zero_close", reason))?,
        None => ZeroClosePolicy::default(),
    };

    Ok(CusumConfig::new(threshold).with_zero_close(zero_close))
}

pub fn build_run_config(
    adapter: &dyn ConfigPort,
    overrides: &Overrides,
) -> Result<RunConfig, CusumError> {
    let cusum = build_cusum_config(adapter, overrides.threshold)?;

    let input_path = match &overrides.input {
        Some(p) => p.clone(),
        None => PathBuf::from(adapter.require_string("input", "path")?),
    };

    let bars_path = overrides.output.clone().unwrap_or_else(|| {
        adapter
            .get_string("output", "bars_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("cusum_bars.csv"))
    });
    let chart_dir = overrides.chart_dir.clone().unwrap_or_else(|| {
        adapter
            .get_string("output", "chart_dir")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    });

    let candles = adapter.get_int("output", "candles", 1000);
    let candles = usize::try_from(candles)
        .ok()
        .filter(|&c| c > 0)
        .ok_or_else(|| CusumError::config_invalid("output", "candles", "candles must be positive"))?;

    Ok(RunConfig {
        cusum,
        input_path,
        time_format: adapter.get_string("input", "time_format"),
        bars_path,
        chart_dir,
        candles,
        charts: !overrides.no_charts && adapter.get_bool("output", "charts", true),
    })
}

fn load_observations(data_port: &dyn DataPort) -> Result<Vec<Observation>, CusumError> {
    let observations = data_port.fetch_observations()?;
    if observations.is_empty() {
        return Err(CusumError::NoData {
            source_name: data_port.source_name(),
        });
    }
    tracing::info!(
        source = %data_port.source_name(),
        observations = observations.len(),
        "loaded observations"
    );
    Ok(observations)
}

/// Load, build, validate, export, and chart. Fatal validation failures abort
/// before anything is written.
pub fn run_pipeline(
    data_port: &dyn DataPort,
    chart_port: Option<&dyn ChartPort>,
    run: &RunConfig,
) -> Result<PipelineOutcome, CusumError> {
    let observations = load_observations(data_port)?;
    eprintln!("Original candles: {}", observations.len());

    let total = observations.len();
    let bars = build_bars_with_progress(&observations, &run.cusum, |i| {
        if i % PROGRESS_STRIDE == 0 {
            tracing::debug!(processed = i, total, "building CUSUM bars");
        }
    })?;

    let report = validate(&observations, &bars, &run.cusum)?;
    print_report(&report);

    let summary = BarSummary::compute(observations.len(), &bars);
    print_summary(&summary);

    csv_adapter::write_bars(&run.bars_path, &observations, &bars)?;
    eprintln!("Bars written to: {}", run.bars_path.display());

    if let Some(chart_port) = chart_port.filter(|_| run.charts) {
        let line_path = run.chart_dir.join(LINE_CHART_FILE);
        chart_port.write_close_comparison(&observations, &bars, &line_path)?;
        eprintln!("Chart saved: {}", line_path.display());

        let candle_path = run.chart_dir.join(CANDLESTICK_CHART_FILE);
        chart_port.write_candlestick_comparison(&observations, &bars, run.candles, &candle_path)?;
        eprintln!("Candlestick chart saved: {}", candle_path.display());
    }

    Ok(PipelineOutcome {
        bars,
        report,
        summary,
    })
}

/// The count check is reported by `validate` through tracing, not here.
fn report_lines(report: &ValidationReport) -> Vec<String> {
    vec![
        format!("Continuity check:  {}", pass_fail(report.continuity)),
        format!("OHLC check:        {}", pass_fail(report.ohlc)),
    ]
}

fn print_report(report: &ValidationReport) {
    for line in report_lines(report) {
        eprintln!("{line}");
    }
}

fn print_summary(summary: &BarSummary) {
    eprintln!("CUSUM candles: {}", summary.bars);
    eprintln!(
        "  up: {}, down: {}, mean span: {:.1} observations",
        summary.bullish, summary.bearish, summary.mean_span
    );
    match summary.compression_ratio {
        Some(ratio) => eprintln!("Compression ratio: {:.2}x", ratio),
        None => eprintln!("Compression ratio: n/a (no bars)"),
    }
}

fn pass_fail(ok: bool) -> &'static str {
    if ok { "passed" } else { "FAILED" }
}

fn source_for(run: &RunConfig) -> CsvAdapter {
    let adapter = CsvAdapter::new(run.input_path.clone());
    match &run.time_format {
        Some(format) => adapter.with_time_format(format.clone()),
        None => adapter,
    }
}

fn run_convert(config_path: &Path, overrides: Overrides) -> Result<(), CusumError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    validate_config(&adapter)?;
    let run = build_run_config(&adapter, &overrides)?;

    tracing::info!(
        input = %run.input_path.display(),
        threshold = run.cusum.threshold,
        zero_close = %run.cusum.zero_close,
        "starting conversion"
    );

    let source = source_for(&run);
    let charts = SvgChartAdapter::new();
    run_pipeline(&source, Some(&charts), &run)?;
    Ok(())
}

/// Validate an exported bar file. A count mismatch is reported but still
/// exits successfully.
pub fn validate_bar_file(
    data_port: &dyn DataPort,
    bars_path: &Path,
    cusum: &CusumConfig,
) -> Result<ValidationReport, CusumError> {
    let observations = load_observations(data_port)?;
    let bars = csv_adapter::read_bars(bars_path)?;
    eprintln!(
        "Validating {} bars against {} observations",
        bars.len(),
        observations.len()
    );

    let report = validate(&observations, &bars, cusum)?;
    print_report(&report);
    Ok(report)
}

fn run_validate(config_path: &Path, bars_path: &Path, overrides: Overrides) -> Result<(), CusumError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    let run = build_run_config(&adapter, &overrides)?;

    validate_bar_file(&source_for(&run), bars_path, &run.cusum)?;
    Ok(())
}

fn run_check_config(config_path: &Path) -> Result<(), CusumError> {
    eprintln!("Checking config: {}", config_path.display());
    let adapter = load_config(config_path)?;
    validate_config(&adapter)?;
    let run = build_run_config(&adapter, &Overrides::default())?;

    eprintln!("  threshold:   {}", run.cusum.threshold);
    eprintln!("  zero_close:  {}", run.cusum.zero_close);
    eprintln!("  input:       {}", run.input_path.display());
    eprintln!("  bars output: {}", run.bars_path.display());
    if run.charts {
        eprintln!("  charts:      {} (last {} candles)", run.chart_dir.display(), run.candles);
    } else {
        eprintln!("  charts:      disabled");
    }
    eprintln!("\nConfiguration is valid.");
    Ok(())
}
