//! Lumen CLI - Command-line interface for Synheart Lumen
//!
//! Commands:
//! - process: Process a recorded session file (batch mode)
//! - run: Record a session from stdin and process it at end of input (streaming mode)
//! - classify: Classify the light source for a context
//! - fit: Fit a model constant from one observation
//! - config: Print or check model configuration
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use synheart_lumen::arbiter::ClassificationContext;
use synheart_lumen::colorimetry::RgbColor;
use synheart_lumen::export;
use synheart_lumen::{
    dose, stimulus, ClassificationResult, LightType, LumenConfig, LumenProcessor,
    ProcessingResult, Sample, LUMEN_VERSION, PRODUCER_NAME,
};

/// Number of leading samples used as the heuristic's recent-illuminance window
const CLASSIFY_WINDOW: usize = 10;

/// Lumen - On-device compute engine for circadian light exposure metrics
#[derive(Parser)]
#[command(name = "lumen")]
#[command(author = "Synheart AI Inc")]
#[command(version = LUMEN_VERSION)]
#[command(about = "Compute circadian light exposure metrics", long_about = None)]
struct Cli {
    /// Log pipeline diagnostics to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a recorded session (batch mode)
    Process {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,

        #[command(flatten)]
        labels: LabelArgs,
    },

    /// Record samples from stdin (NDJSON) and process at end of input
    Run {
        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,

        #[command(flatten)]
        labels: LabelArgs,
    },

    /// Classify the light source for a JSON context
    Classify {
        /// Context file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Model configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Fit a model constant from one observation
    Fit {
        #[arg(value_enum)]
        target: FitTarget,

        /// Melanopic lux (steepness) or dose in stimulus-hours (sensitivity)
        #[arg(long)]
        input: f64,

        /// Observed circadian stimulus or melatonin suppression
        #[arg(long)]
        observed: f64,

        /// Model configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the default configuration, or check a configuration file
    Config {
        /// Configuration file to check
        #[arg(long)]
        check: Option<PathBuf>,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Configuration and light-source options shared by processing commands
#[derive(clap::Args)]
struct LabelArgs {
    /// Model configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Light-source label, skipping classification
    #[arg(long, conflicts_with = "rgb")]
    light_type: Option<LightType>,

    /// Camera color sample as r,g,b in [0, 1]
    #[arg(long, value_parser = parse_rgb)]
    rgb: Option<RgbColor>,

    /// Skip classification and apply the default melanopic ratio
    #[arg(long, conflicts_with_all = ["light_type", "rgb"])]
    no_classify: bool,
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one sample per line)
    Ndjson,
    /// JSON array of samples
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON result
    Json,
    /// Pretty-printed JSON result
    JsonPretty,
    /// Pretty-printed JSON with producer metadata
    Report,
    /// timestamp,lux,melanopic,cs table
    Csv,
}

#[derive(Clone, ValueEnum)]
enum FitTarget {
    /// Stimulus steepness `a`
    Steepness,
    /// Suppression sensitivity `k`
    Sensitivity,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "synheart_lumen=debug"
    } else {
        "synheart_lumen=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), LumenCliError> {
    match cli.command {
        Commands::Process {
            input,
            output,
            input_format,
            output_format,
            labels,
        } => cmd_process(&input, &output, input_format, output_format, &labels),

        Commands::Run {
            output_format,
            labels,
        } => cmd_run(output_format, &labels),

        Commands::Classify { input, config } => cmd_classify(&input, config.as_deref()),

        Commands::Fit {
            target,
            input,
            observed,
            config,
        } => cmd_fit(target, input, observed, config.as_deref()),

        Commands::Config { check } => cmd_config(check.as_deref()),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn cmd_process(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    labels: &LabelArgs,
) -> Result<(), LumenCliError> {
    let input_data = read_input(input)?;
    let samples = match input_format {
        InputFormat::Ndjson => parse_ndjson(&input_data)?,
        InputFormat::Json => serde_json::from_str::<Vec<Sample>>(&input_data)?,
    };

    if samples.is_empty() {
        return Err(LumenCliError::NoSamples);
    }

    let processor = LumenProcessor::with_config(load_config(labels.config.as_deref())?)?;
    let classification = resolve_classification(&processor, labels, &samples);
    let result = processor.process(&samples, classification)?;

    write_output(output, &format_output(&result, &output_format)?)
}

fn cmd_run(output_format: OutputFormat, labels: &LabelArgs) -> Result<(), LumenCliError> {
    let processor = LumenProcessor::with_config(load_config(labels.config.as_deref())?)?;
    let mut session = processor.session();
    session.start()?;

    // Leading samples feed classification once input ends
    let mut head: Vec<Sample> = Vec::with_capacity(CLASSIFY_WINDOW);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let sample: Sample = serde_json::from_str(trimmed).map_err(|e| {
            LumenCliError::ParseError(format!("Failed to parse sample: {}", e))
        })?;
        if head.len() < CLASSIFY_WINDOW {
            head.push(sample.clone());
        }
        session.push(sample)?;
    }

    session.stop();
    if session.is_empty() {
        return Err(LumenCliError::NoSamples);
    }

    let classification = resolve_classification(&processor, labels, &head);
    let result = session.finish(classification)?;
    print!("{}", format_output(&result, &output_format)?);
    Ok(())
}

fn cmd_classify(input: &Path, config: Option<&Path>) -> Result<(), LumenCliError> {
    let ctx: ClassificationContext = serde_json::from_str(&read_input(input)?)?;
    let processor = LumenProcessor::with_config(load_config(config)?)?;
    let result = processor.classify(&ctx)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn cmd_fit(
    target: FitTarget,
    input: f64,
    observed: f64,
    config: Option<&Path>,
) -> Result<(), LumenCliError> {
    let config = load_config(config)?;
    let (name, value, default) = match target {
        FitTarget::Steepness => (
            "steepness",
            stimulus::fit_steepness(
                input,
                observed,
                config.stimulus.ceiling,
                config.stimulus.steepness,
            ),
            config.stimulus.steepness,
        ),
        FitTarget::Sensitivity => (
            "sensitivity",
            dose::fit_sensitivity(input, observed, config.dose.sensitivity),
            config.dose.sensitivity,
        ),
    };

    let report = FitReport {
        parameter: name.to_string(),
        value,
        fell_back_to_default: value == default,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_config(check: Option<&Path>) -> Result<(), LumenCliError> {
    match check {
        Some(path) => {
            load_config(Some(path))?;
            println!("Configuration is valid: {}", path.display());
        }
        None => println!("{}", LumenConfig::default().to_json()?),
    }
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), LumenCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "lumen_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Lumen version {}", LUMEN_VERSION),
    });

    // Check configuration file if provided
    match config {
        Some(path) if path.exists() => {
            let check = match fs::read_to_string(path) {
                Ok(content) => match LumenConfig::from_json(&content) {
                    Ok(cfg) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Configuration valid (steepness {}, sensitivity {})",
                            cfg.stimulus.steepness, cfg.dose.sensitivity
                        ),
                    },
                    Err(e) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: e.to_string(),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read configuration file: {}", e),
                },
            };
            checks.push(check);
        }
        Some(_) => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Configuration file does not exist".to_string(),
        }),
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using built-in defaults".to_string(),
        }),
    }

    // Check stdin is available (for streaming mode)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: LUMEN_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Lumen Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(LumenCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helpers

fn read_input(path: &Path) -> Result<String, LumenCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn write_output(path: &Path, data: &str) -> Result<(), LumenCliError> {
    if path.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(path, data)?;
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<LumenConfig, LumenCliError> {
    match path {
        Some(p) => Ok(LumenConfig::from_json(&fs::read_to_string(p)?)?),
        None => Ok(LumenConfig::default()),
    }
}

fn parse_ndjson(data: &str) -> Result<Vec<Sample>, LumenCliError> {
    data.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line.trim()).map_err(|e| {
                LumenCliError::ParseError(format!("Line {}: {}", i + 1, e))
            })
        })
        .collect()
}

fn parse_rgb(value: &str) -> Result<RgbColor, String> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| e.to_string()))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [r, g, b] => RgbColor::new(*r, *g, *b).map_err(|e| e.to_string()),
        _ => Err(format!("expected r,g,b but got '{}'", value)),
    }
}

/// Label the session from flags, or classify it from its leading samples
fn resolve_classification(
    processor: &LumenProcessor,
    labels: &LabelArgs,
    samples: &[Sample],
) -> Option<ClassificationResult> {
    if labels.no_classify {
        return None;
    }
    if let Some(light_type) = labels.light_type {
        return Some(ClassificationResult::manual(light_type));
    }

    let first = samples.first()?;
    let mut ctx = ClassificationContext::new(first.timestamp, first.ambient_lux).with_recent(
        samples
            .iter()
            .take(CLASSIFY_WINDOW)
            .map(|s| s.ambient_lux)
            .collect(),
    );
    ctx.screen_on = first.screen_on;
    ctx.screen_brightness = first.screen_brightness;
    ctx.pitch_rad = first.pitch_rad;
    ctx.rgb = labels.rgb;

    processor.classify_or_default(&ctx)
}

fn format_output(
    result: &ProcessingResult,
    format: &OutputFormat,
) -> Result<String, LumenCliError> {
    let data = match format {
        OutputFormat::Json => {
            let mut json = export::to_json(result)?;
            json.push('\n');
            json
        }
        OutputFormat::JsonPretty => {
            let mut json = export::to_json_pretty(result)?;
            json.push('\n');
            json
        }
        OutputFormat::Report => {
            let mut json = export::to_report_json(result)?;
            json.push('\n');
            json
        }
        OutputFormat::Csv => export::to_csv(result),
    };
    Ok(data)
}

// Error types

#[derive(Debug)]
enum LumenCliError {
    Io(io::Error),
    Compute(synheart_lumen::ComputeError),
    Json(serde_json::Error),
    NoSamples,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for LumenCliError {
    fn from(e: io::Error) -> Self {
        LumenCliError::Io(e)
    }
}

impl From<synheart_lumen::ComputeError> for LumenCliError {
    fn from(e: synheart_lumen::ComputeError) -> Self {
        LumenCliError::Compute(e)
    }
}

impl From<serde_json::Error> for LumenCliError {
    fn from(e: serde_json::Error) -> Self {
        LumenCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<LumenCliError> for CliError {
    fn from(e: LumenCliError) -> Self {
        match e {
            LumenCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            LumenCliError::Compute(synheart_lumen::ComputeError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'lumen config' to see the default configuration".to_string()),
            },
            LumenCliError::Compute(e) => CliError {
                code: "COMPUTE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure samples carry timestamps and finite ambient_lux".to_string()),
            },
            LumenCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            LumenCliError::NoSamples => CliError {
                code: "NO_SAMPLES".to_string(),
                message: "No samples found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            LumenCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            LumenCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct FitReport {
    parameter: String,
    value: f64,
    fell_back_to_default: bool,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
