//! deskmirror-sync - CLI tool to mirror a Chatwoot account into the database
//!
//! Pulls the account, its inboxes, conversations and messages from the
//! Chatwoot API and upserts them into the local SQLite mirror.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/deskmirror/data.db (~/.local/share/deskmirror/data.db)
//! - Logs: $XDG_STATE_HOME/deskmirror/deskmirror.<date>.log
//! - Config: $XDG_CONFIG_HOME/deskmirror/config.toml (~/.config/deskmirror/config.toml)

mod process_lock;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use deskmirror_core::chatwoot::{BlockingChatwootClient, ConnectionStatus, HelpdeskApi};
use deskmirror_core::sync::{database_status, HealthReport, SyncProgress};
use deskmirror_core::{Config, Database, SyncCoordinator, SyncResult};
use indicatif::{ProgressBar, ProgressStyle};
use process_lock::acquire_sync_guard;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "deskmirror-sync")]
#[command(about = "Mirror a Chatwoot account into the local database")]
#[command(version)]
struct Args {
    /// Verbose output (-v warnings, -vv per-page progress)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Page size sent to list endpoints (defaults to chatwoot.per_page)
    #[arg(long)]
    per_page: Option<u32>,

    /// Watch mode - sync repeatedly until Ctrl+C
    #[arg(short, long)]
    watch: bool,

    /// Poll interval in seconds (only with --watch, defaults to sync.poll_secs)
    #[arg(long)]
    poll: Option<u64>,

    /// Check Chatwoot and database connectivity, then exit
    #[arg(long)]
    check: bool,

    /// Create the database schema, then exit
    #[arg(long)]
    init_only: bool,

    /// Only re-fetch messages of conversations already in the database
    #[arg(long)]
    messages_only: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard =
        deskmirror_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("deskmirror-sync starting");
    config.report_env_warnings();

    let db_path = Config::database_path();

    if args.check {
        return run_check(&config, &db_path);
    }

    let _sync_guard = acquire_sync_guard(&db_path).context("failed to acquire process lock")?;

    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    println!("Database: {}", db_path.display());

    if args.init_only {
        println!("Schema ready.");
        tracing::info!("Init-only run complete");
        return Ok(());
    }

    let api = BlockingChatwootClient::new(&config.chatwoot)
        .context("failed to create Chatwoot client")?;
    let coordinator = SyncCoordinator::new(api, db);
    let per_page = args.per_page.or(config.chatwoot.per_page);

    if args.watch {
        let poll_secs = args.poll.unwrap_or(config.sync.poll_secs);
        run_watch_mode(&coordinator, &args, per_page, poll_secs)
    } else {
        run_single_sync(&coordinator, &args, per_page)
    }
}

/// Print connectivity of Chatwoot and the database
fn run_check(config: &Config, db_path: &Path) -> Result<()> {
    let client = if config.chatwoot.is_ready() {
        BlockingChatwootClient::new(&config.chatwoot).map_err(|e| e.to_string())
    } else {
        Err("missing Chatwoot configuration".to_string())
    };
    let db = Database::open(&db_path.to_path_buf()).map_err(|e| e.to_string());

    let report = match (client, db) {
        (Ok(client), Ok(db)) => SyncCoordinator::new(client, db).health_check(),
        (client, db) => HealthReport::new(
            client
                .map(|c| c.check_connection())
                .unwrap_or_else(ConnectionStatus::failed),
            db.map(|d| database_status(&d))
                .unwrap_or_else(ConnectionStatus::failed),
        ),
    };

    print_status("Chatwoot", &report.helpdesk);
    print_status("Database", &report.database);

    tracing::info!(ok = report.ok, "Health check complete");
    if !report.ok {
        anyhow::bail!("health check failed");
    }
    Ok(())
}

fn print_status(name: &str, status: &ConnectionStatus) {
    let state = if status.ok { "OK" } else { "FAIL" };
    let code = status
        .status_code
        .map(|c| format!(" ({})", c))
        .unwrap_or_default();
    match &status.error {
        Some(error) => println!("{:<10} {}{}: {}", name, state, code, error),
        None => println!("{:<10} {}{}", name, state, code),
    }
}

/// Run a single sync operation with a spinner
fn run_single_sync(
    coordinator: &SyncCoordinator<BlockingChatwootClient>,
    args: &Args,
    per_page: Option<u32>,
) -> Result<()> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let verbose = args.verbose;
    let result = run_pipelines(coordinator, args, per_page, |progress| {
        let message = describe_progress(progress);
        if verbose >= 2 {
            pb.println(&message);
        }
        pb.set_message(message);
    })?;

    pb.finish_and_clear();

    print_sync_result(&result, args.verbose);

    if args.verbose >= 1 {
        let counts = coordinator
            .database()
            .table_counts()
            .context("failed to count mirrored rows")?;
        println!("\nMirror totals:");
        for (table, count) in counts {
            println!("  {:<14} {}", format!("{}:", table), count);
        }
    }

    tracing::info!(
        conversations = result.conversations,
        messages = result.messages,
        errors = result.errors.len(),
        "deskmirror-sync complete"
    );

    Ok(())
}

/// Run continuous watch mode
fn run_watch_mode(
    coordinator: &SyncCoordinator<BlockingChatwootClient>,
    args: &Args,
    per_page: Option<u32>,
    poll_secs: u64,
) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    println!(
        "Watch mode active (poll every {}s). Press Ctrl+C to stop.",
        poll_secs
    );
    println!();

    let mut iteration = 0u64;

    while running.load(Ordering::SeqCst) {
        iteration += 1;

        let result = run_pipelines(coordinator, args, per_page, |_progress| {
            // Silent progress in watch mode
        })?;

        let timestamp = chrono::Local::now().format("%H:%M:%S");
        println!(
            "[{}] Synced: {} inboxes, {} conversations, {} messages ({} errors)",
            timestamp,
            result.inboxes,
            result.conversations,
            result.messages,
            result.errors.len()
        );

        if args.verbose >= 1 {
            for error in &result.errors {
                println!("  Error: {}", error);
            }
            for warning in &result.warnings {
                println!("  Warning: {}", warning);
            }
        }

        tracing::info!(
            iteration,
            conversations = result.conversations,
            messages = result.messages,
            "watch sync iteration"
        );

        // Sleep in short steps so Ctrl+C is honored promptly
        for _ in 0..poll_secs.max(1) {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            thread::sleep(Duration::from_secs(1));
        }
    }

    println!("Watch mode stopped.");
    tracing::info!("deskmirror-sync watch mode stopped");

    Ok(())
}

/// Full mirror, or messages of already mirrored conversations with `--messages-only`
fn run_pipelines<F>(
    coordinator: &SyncCoordinator<BlockingChatwootClient>,
    args: &Args,
    per_page: Option<u32>,
    on_progress: F,
) -> Result<SyncResult>
where
    F: FnMut(&SyncProgress),
{
    let result = if args.messages_only {
        coordinator.sync_mirrored_messages(per_page, on_progress)
    } else {
        coordinator.sync_all_with_progress(per_page, on_progress)
    };
    result.context("sync failed")
}

fn describe_progress(progress: &SyncProgress) -> String {
    match progress {
        SyncProgress::Account => "Fetching account...".to_string(),
        SyncProgress::Inboxes { synced } => format!("Inboxes synced: {}", synced),
        SyncProgress::ConversationPage { page, synced } => {
            format!("Conversations page {} ({} synced)", page, synced)
        }
        SyncProgress::Messages {
            conversation_id,
            done,
            total,
            synced,
            errors,
        } => format!(
            "Messages {}/{} (conversation {}, {} synced, {} errors)",
            done, total, conversation_id, synced, errors
        ),
    }
}

/// Print sync result summary
fn print_sync_result(result: &SyncResult, verbose: u8) {
    println!("\nSync complete:");
    println!("  Accounts:      {}", result.accounts);
    println!("  Inboxes:       {}", result.inboxes);
    println!("  Conversations: {}", result.conversations);
    println!("  Messages:      {}", result.messages);

    if verbose >= 1 && !result.warnings.is_empty() {
        println!("\nWarnings ({}):", result.warnings.len());
        for warning in &result.warnings {
            println!("  {}", warning);
        }
    }

    if !result.errors.is_empty() {
        println!("\nErrors ({}):", result.errors.len());
        for error in &result.errors {
            println!("  {}", error);
        }
    }
}
