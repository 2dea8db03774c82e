//! deskmirror-intents - intent coverage report over mirrored messages
//!
//! Classifies every mirrored message through a Rasa server and compares the
//! predicted intents with those defined in the training `nlu.yml`.
//!
//! Option precedence: command line, then environment, then config file,
//! then defaults.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use deskmirror_core::format::format_intent_coverage;
use deskmirror_core::intents::{
    load_nlu_intents, secs_to_duration, IntentCoverageAggregator, RasaIntentClassifier,
};
use deskmirror_core::{Config, Database};
use std::path::PathBuf;
use std::process;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "deskmirror-intents")]
#[command(about = "Report how well real messages cover the Rasa training intents")]
#[command(version)]
struct Args {
    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Observations needed for an intent to count as covered
    #[arg(long, allow_negative_numbers = true)]
    min_count: Option<i64>,

    /// URL of Rasa's /model/parse endpoint
    #[arg(long)]
    parse_url: Option<String>,

    /// Path to the nlu.yml defining the training intents
    #[arg(long)]
    nlu_file: Option<PathBuf>,

    /// Timeout in seconds for each parse request
    #[arg(long)]
    timeout: Option<f64>,

    /// Timeout in seconds for the Rasa connectivity check
    #[arg(long)]
    preflight_timeout: Option<f64>,

    /// Skip the Rasa connectivity check
    #[arg(long)]
    skip_preflight: bool,

    /// Only read the first N messages
    #[arg(long)]
    limit: Option<usize>,

    /// Number of predictions to show as samples
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    samples: i64,

    /// Number of conversations to summarize (0 = none)
    #[arg(long, default_value_t = 0)]
    conversation_summary: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let mut config = Config::load().context("failed to load configuration")?;
    if args.debug {
        config.logging.level = "debug".to_string();
    }

    let _log_guard =
        deskmirror_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("deskmirror-intents starting");
    config.report_env_warnings();

    let nlu_path = args
        .nlu_file
        .clone()
        .unwrap_or_else(|| config.intents.nlu_path());
    let training_intents = load_nlu_intents(&nlu_path)
        .map_err(|e| anyhow::anyhow!("Failed to load Rasa intents: {}", e))?;
    tracing::info!(
        path = %nlu_path.display(),
        count = training_intents.len(),
        "Training intents loaded"
    );

    if let Some(min_count) = args.min_count {
        config.intents.min_count = min_count;
    }
    let options = config.intents.coverage_options(args.samples);

    if let Some(parse_url) = &args.parse_url {
        config.rasa.parse_url = parse_url.clone();
    }
    if let Some(timeout) = args.timeout {
        config.rasa.timeout_secs = timeout;
    }
    if let Some(timeout) = args.preflight_timeout {
        config.rasa.preflight_timeout_secs = timeout;
    }
    let preflight_timeout = secs_to_duration(config.rasa.preflight_timeout_secs)
        .context("invalid preflight timeout")?;

    let classifier =
        RasaIntentClassifier::from_config(&config.rasa).context("failed to create Rasa client")?;

    if !args.skip_preflight {
        eprintln!("Checking Rasa connectivity...");
        classifier.preflight(preflight_timeout).map_err(|e| {
            anyhow::anyhow!("Could not connect to Rasa ({}): {}", classifier.parse_url(), e)
        })?;
    }

    ctrlc::set_handler(|| {
        eprintln!("\nCancelled by user.");
        process::exit(1);
    })
    .context("failed to set Ctrl+C handler")?;

    let db_path = Config::database_path();
    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let records = db
        .list_message_records(args.limit)
        .context("failed to read messages")?;

    let min_count = options.min_count;
    let aggregator = IntentCoverageAggregator::new(classifier, training_intents, options);
    let report = aggregator.execute(records);

    match args.format {
        OutputFormat::Text => {
            println!(
                "{}",
                format_intent_coverage(&report, min_count, args.conversation_summary)
            );
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize report")?
            );
        }
    }

    tracing::info!(
        messages = report.total_rows,
        named = report.named_predictions,
        failures = report.parse_failures,
        "deskmirror-intents complete"
    );

    Ok(())
}
