//! SitePulse - guided web performance and SSL analysis
//!
//! A CLI tool that walks a URL through a fixed sequence of analysis
//! steps, shows live progress and writes a Markdown or JSON report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (invalid input, config, storage, I/O, etc.)
//!   2 - Analysis aborted on a failed step (partial report written)

mod analysis;
mod cli;
mod config;
mod content;
mod device;
mod error;
mod models;
mod progress;
mod report;
mod sequencer;
mod ssl;
mod storage;
mod url;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{AdminAction, AnalyzeArgs, Args, Command, OutputFormat};
use config::Config;
use content::ContentCatalog;
use sequencer::{ReportSlot, RunOutcome, RunTracker, Sequencer, StepContext};
use ssl::{SslLabsProbe, SslProbe};
use std::sync::Arc;
use storage::{DashboardStats, FileStore, PeriodStats};
use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    // Config comes first so `[general] verbose` can raise the log level
    let (config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(args.log_level(config.general.verbose));

    info!("SitePulse v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {}", source);
    debug!("Arguments: {:?}", args);

    let result = match args.command {
        Command::Analyze(ref analyze) => run_analyze(config, &args, analyze).await,
        Command::Admin { action } => run_admin(config, action),
        Command::InitConfig => handle_init_config().map(|()| 0),
    };

    match result {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .sitepulse.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE_NAME);
    println!("   Edit it to customize device, language, step delays and the SSL probe.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so it returns a description of where the
/// configuration came from instead of logging it.
fn load_config(args: &Args) -> Result<(Config, String)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let mut config = Config::load(config_path)?;
        config.merge_with_globals(args);
        return Ok((config, config_path.display().to_string()));
    }

    // Try default location
    let (mut config, source) = match Config::load_default() {
        Ok(Some(config)) => (config, config::CONFIG_FILE_NAME.to_string()),
        Ok(None) => (Config::default(), "defaults".to_string()),
        Err(e) => {
            eprintln!(
                "⚠️  Failed to load {}: {:#}. Using defaults.",
                config::CONFIG_FILE_NAME,
                e
            );
            (Config::default(), "defaults".to_string())
        }
    };
    config.merge_with_globals(args);
    Ok((config, source))
}

fn open_store(config: &Config) -> Result<FileStore> {
    let dir = config.storage.resolve_data_dir();
    let store = FileStore::open(&dir)
        .with_context(|| format!("Failed to open data directory {}", dir.display()))?;
    Ok(store.with_lock_timeout(config.storage.lock_timeout()))
}

/// Run one analysis and write its report. Returns exit code (0 or 2).
async fn run_analyze(mut config: Config, args: &Args, analyze: &AnalyzeArgs) -> Result<i32> {
    config.merge_with_args(analyze);

    let url = url::normalize_url(&analyze.url)?;
    let device = config.general.device;
    let locale = config.general.locale;

    // Counters are best-effort and never block an analysis.
    match open_store(&config) {
        Ok(store) => {
            let now = Utc::now();
            if let Err(e) = storage::record_visit(&store, now) {
                warn!("Failed to record visit: {}", e);
            }
            if let Err(e) = storage::record_search(&store, &url, device, now) {
                warn!("Failed to record search: {}", e);
            }
        }
        Err(e) => warn!("{:#}", e),
    }

    let profile = device::profile(device);
    println!("🔍 Analyzing {}", url);
    println!(
        "   Device: {} ({}x{}, {})",
        device, profile.viewport.width, profile.viewport.height, profile.network_speed
    );
    println!("   Language: {}\n", locale);

    let catalog = Arc::new(ContentCatalog::builtin().context("Failed to parse built-in content")?);
    let probe: Arc<dyn SslProbe> =
        Arc::new(SslLabsProbe::new(&config.ssl).context("Failed to create HTTP client")?);
    let plan = sequencer::default_plan(&config.analysis, catalog, probe, locale)?;

    let tracker = Arc::new(RunTracker::new());
    let sequencer = Sequencer::new(plan, tracker.clone());
    let slot = ReportSlot::new(tracker);

    let (tx, rx) = unbounded_channel();
    let progress = progress::spawn_progress(rx, !args.quiet);

    let ctx = StepContext { url, device };
    let outcome = sequencer.run(&ctx, &tx).await;
    drop(tx);
    if let Err(e) = progress.await {
        debug!("Progress task ended abnormally: {}", e);
    }

    match outcome {
        RunOutcome::Finished(report) => {
            slot.offer(report);
        }
        RunOutcome::Superseded { token } => warn!("Run {} was superseded", token),
    }
    let report = slot
        .take()
        .context("Analysis was superseded before it produced a report")?;

    let output = match analyze.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };
    let output_path = analyze.output_path(&config.general.output);
    report::write_report(&output, &output_path)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    println!("\n📊 Analysis Summary:");
    println!(
        "   Steps completed: {}/{}",
        report.completed_steps(),
        report.steps.len()
    );
    if let Some(ref ssl) = report.ssl {
        println!("   SSL security score: {}/100", ssl.security_score);
    }
    if let Some(score) = report.performance_score {
        println!(
            "   Performance score: {} ({})",
            score,
            analysis::score_label(score)
        );
    }
    if let Some(ref diagnostics) = report.diagnostics {
        println!(
            "   Total load time: {} ms, critical issues: {}",
            diagnostics.total_load_time_ms,
            diagnostics.critical_issues.len()
        );
    }
    println!("   Duration: {:.1}s", report.metadata.duration_seconds);

    if let Some(step) = report.failed() {
        eprintln!(
            "\n⛔ Analysis aborted at \"{}\": {}. Partial report saved to: {} (exit code 2).",
            step.name,
            report.error.as_deref().unwrap_or("unknown error"),
            output_path.display()
        );
        return Ok(2);
    }

    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        output_path.display()
    );
    Ok(0)
}

/// Run an admin action. Returns exit code (0 or 1).
fn run_admin(config: Config, action: AdminAction) -> Result<i32> {
    let store = open_store(&config)?;
    debug!("Data directory: {}", store.dir().display());

    match action {
        AdminAction::Login => {
            storage::set_admin(&store, true)?;
            println!("🔓 Admin mode enabled.");
        }
        AdminAction::Logout => {
            storage::set_admin(&store, false)?;
            println!("🔒 Admin mode disabled.");
        }
        AdminAction::Stats { reset, json } => {
            if !storage::is_admin(&store)? {
                eprintln!("⛔ Admin mode required. Run `sitepulse admin login` first.");
                return Ok(1);
            }

            if reset {
                storage::reset_stats(&store)?;
                println!("🧹 Search log and visitor counters cleared.");
                return Ok(0);
            }

            let stats = storage::dashboard_stats(&store, Utc::now())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_dashboard(&stats);
            }
        }
    }

    Ok(0)
}

fn print_dashboard(stats: &DashboardStats) {
    println!("📈 Dashboard");

    match stats.visitors {
        Some(ref visitors) => {
            println!("\n👥 Visitors:");
            println!("   Today ({}): {}", visitors.daily.period, visitors.daily.count);
            println!(
                "   This month ({}): {}",
                visitors.monthly.period, visitors.monthly.count
            );
            println!(
                "   This year ({}): {}",
                visitors.yearly.period, visitors.yearly.count
            );
        }
        None => println!("\n👥 Visitors: none recorded"),
    }

    for (label, period) in [
        ("Today", &stats.daily),
        ("This month", &stats.monthly),
        ("This year", &stats.yearly),
    ] {
        print_period(label, period);
    }
}

fn print_period(label: &str, period: &PeriodStats) {
    println!("\n🔎 {}: {} searches", label, period.total_searches);
    for url in &period.analyzed_sites {
        println!("   - {}", url);
    }
}
