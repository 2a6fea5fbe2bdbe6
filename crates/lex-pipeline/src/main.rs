//! CLI entry point for the filter pipeline.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use lex_pipeline::{
    FilterSpec, Pipeline, PipelineDefinition, Registry, RunConfig, RunOutcome, Severity,
    ValidationReport,
};
use polars::prelude::*;
use std::fs::File;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    author = "Lex Machina Team",
    version,
    about = "Validated pipe-and-filter preprocessing for tabular datasets",
    long_about = "Runs an ordered list of preprocessing filters over a CSV dataset.\n\
                  The pipeline is validated against the dataset before anything runs.\n\n\
                  EXAMPLES:\n  \
                  # List available filters and their parameters\n  \
                  lex-pipeline --list-filters\n\n  \
                  # Run filters given on the command line\n  \
                  lex-pipeline -i data.csv --steps impute,encode,scale,pca --param pca.n_components=3\n\n  \
                  # Run a pipeline definition exported from the UI\n  \
                  lex-pipeline -i data.csv -p pipeline.json -o processed.csv\n\n  \
                  # Only validate\n  \
                  lex-pipeline -i data.csv -p pipeline.json --validate-only"
)]
struct Args {
    /// Path to the CSV file to process
    #[arg(short, long, required_unless_present = "list_filters")]
    input: Option<PathBuf>,

    /// Pipeline definition JSON file
    #[arg(short, long, conflicts_with = "steps")]
    pipeline: Option<PathBuf>,

    /// Comma separated filter kinds, applied in the given order
    #[arg(short, long, value_delimiter = ',')]
    steps: Vec<String>,

    /// Filter parameter as kind.name=value (repeatable, used with --steps)
    #[arg(long = "param", value_name = "KIND.NAME=VALUE")]
    params: Vec<String>,

    /// Write the final dataset to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Validate the pipeline against the dataset without running it
    #[arg(long)]
    validate_only: bool,

    /// Print the registered filter kinds and exit
    #[arg(long)]
    list_filters: bool,

    /// Rows kept in each stage preview
    #[arg(long, default_value = "8")]
    preview_rows: usize,

    /// Missing fraction above which a column triggers a warning (0.0 - 1.0)
    #[arg(long, default_value = "0.5")]
    missing_threshold: f64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all logs; only the JSON result is written.
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout only carries JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.quiet, args.json);

    if args.list_filters {
        return list_filters(args.json);
    }

    let input = args
        .input
        .as_ref()
        .ok_or_else(|| anyhow!("--input is required"))?;
    if !input.exists() {
        bail!("Input file not found: {}", input.display());
    }

    let specs = load_specs(&args)?;
    debug!("Pipeline: {:?}", specs);

    info!("Loading dataset from: {}", input.display());
    let data = load_csv(input)?;
    info!("Dataset loaded successfully: {:?}", data.shape());

    let config = RunConfig::builder()
        .preview_rows(args.preview_rows)
        .missing_warning_threshold(args.missing_threshold)
        .build()?;

    let mut builder = Pipeline::builder().config(config);
    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.state.display_name(),
                update.message
            );
        });
    }
    let pipeline = builder.build()?;

    if args.validate_only {
        let report = pipeline.validate(&data, &specs)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
        if report.has_errors() {
            bail!("Pipeline rejected");
        }
        return Ok(());
    }

    let outcome = pipeline.run(data, &specs)?;
    handle_outcome(&outcome, &args)
}

/// Resolve the filter list from `--pipeline` or `--steps`/`--param`.
fn load_specs(args: &Args) -> Result<Vec<FilterSpec>> {
    if let Some(ref path) = args.pipeline {
        if !args.params.is_empty() {
            bail!("--param can only be used together with --steps");
        }
        let definition = PipelineDefinition::from_path(path)?;
        return Ok(definition.filters);
    }

    let mut specs = FilterSpec::sequence(args.steps.iter().map(String::as_str));
    for raw in &args.params {
        let (kind, name, value) = parse_param(raw)?;
        let spec = specs
            .iter_mut()
            .find(|s| s.kind == kind)
            .ok_or_else(|| anyhow!("--param '{raw}' refers to '{kind}', which is not in --steps"))?;
        spec.parameters.insert(name, value);
    }
    Ok(specs)
}

/// Split `kind.name=value`. Values are read as JSON when possible, otherwise as strings.
fn parse_param(raw: &str) -> Result<(String, String, serde_json::Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid --param '{raw}': expected KIND.NAME=VALUE"))?;
    let (kind, name) = key
        .split_once('.')
        .ok_or_else(|| anyhow!("Invalid --param '{raw}': expected KIND.NAME=VALUE"))?;

    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((kind.trim().to_string(), name.trim().to_string(), value))
}

/// Print the registry as a table, or as JSON descriptors.
///
/// Uses `println!` because this listing is the command's output, not a log.
fn list_filters(json: bool) -> Result<()> {
    let registry = Registry::shared();
    let descriptors = registry.list_kinds();

    if json {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    println!("{:<10} {:<32} {:<10} Parameters", "Kind", "Name", "Singleton");
    println!("{}", "-".repeat(80));
    for descriptor in &descriptors {
        let params: Vec<String> = descriptor
            .parameters
            .parameters
            .iter()
            .map(|p| format!("{}={}", p.name, p.default))
            .collect();
        println!(
            "{:<10} {:<32} {:<10} {}",
            descriptor.kind,
            descriptor.display_name,
            if descriptor.singleton { "yes" } else { "no" },
            params.join(", ")
        );
    }
    Ok(())
}

fn handle_outcome(outcome: &RunOutcome, args: &Args) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome_json(outcome))?);
    }

    match outcome {
        RunOutcome::Rejected { report } => {
            if !args.json {
                print_report(report);
            }
            bail!("Pipeline rejected with {} error(s)", report.errors().count())
        }
        RunOutcome::Failed { failure, packet, .. } => {
            if !args.json {
                print_history(packet.history());
            }
            Err(anyhow!("{failure}"))
        }
        RunOutcome::Completed { packet, report } => {
            if !args.json {
                if !report.issues.is_empty() {
                    print_report(report);
                }
                print_history(packet.history());
            }
            if let Some(ref path) = args.output {
                write_csv(packet.table(), path)?;
                info!("Dataset saved: {}", path.display());
            }
            Ok(())
        }
    }
}

fn outcome_json(outcome: &RunOutcome) -> serde_json::Value {
    serde_json::json!({
        "state": outcome.state(),
        "report": outcome.report(),
        "failure": outcome.failure(),
        "history": outcome.packet().map(|p| p.history()),
        "final_shape": outcome.packet().map(|p| p.shape()),
    })
}

fn print_report(report: &ValidationReport) {
    println!();
    println!("VALIDATION");
    println!("{}", "-".repeat(40));
    if report.issues.is_empty() {
        println!("  No issues found");
    }
    for issue in &report.issues {
        let marker = match issue.severity {
            Severity::Error => "x",
            Severity::Warning => "!",
        };
        let stage = issue
            .stage_index
            .map(|s| format!("stage {s}: "))
            .unwrap_or_default();
        println!("  {marker} [{}] {stage}{}", issue.code, issue.message);
    }
    println!();
}

fn print_history(history: &[lex_pipeline::StageRecord]) {
    println!("STAGES");
    println!("{}", "-".repeat(40));
    for record in history {
        println!(
            "  {}. {:<32} {} -> {}  ({}ms)",
            record.position, record.display_name, record.input_shape, record.output_shape, record.duration_ms
        );
        if !record.columns_added.is_empty() {
            println!("       + {}", record.columns_added.join(", "));
        }
        if !record.columns_removed.is_empty() {
            println!("       - {}", record.columns_removed.join(", "));
        }
        if !record.columns_modified.is_empty() {
            println!("       ~ {}", record.columns_modified.join(", "));
        }
    }
    println!();
}

fn load_csv(path: &PathBuf) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.clone()))?
        .finish()
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn write_csv(df: &DataFrame, path: &PathBuf) -> Result<()> {
    let mut df = df.clone();
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(&mut df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param_reads_json_values() {
        let (kind, name, value) = parse_param("pca.n_components=3").unwrap();
        assert_eq!(kind, "pca");
        assert_eq!(name, "n_components");
        assert_eq!(value, serde_json::json!(3));

        let (_, _, value) = parse_param("scale.method=minmax").unwrap();
        assert_eq!(value, serde_json::json!("minmax"));
    }

    #[test]
    fn test_parse_param_rejects_malformed() {
        assert!(parse_param("n_components=3").is_err());
        assert!(parse_param("pca.n_components").is_err());
    }

    #[test]
    fn test_steps_and_params_build_specs() {
        let args = Args::parse_from([
            "lex-pipeline",
            "-i",
            "data.csv",
            "--steps",
            "impute,scale,pca",
            "--param",
            "pca.n_components=2",
        ]);
        let specs = load_specs(&args).unwrap();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[2].order, 2);
        assert_eq!(specs[2].parameters["n_components"], 2);

        let args = Args::parse_from(["lex-pipeline", "-i", "d.csv", "--steps", "scale", "--param", "pca.n_components=2"]);
        assert!(load_specs(&args).is_err());
    }
}
