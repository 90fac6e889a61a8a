pub mod config;

pub use config::RunWatchConfig;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::client::http::{ApiClient, DEFAULT_TIMEOUT_S};
use crate::client::{PreferenceStore, RetryService, RunFeed};
use crate::monitor::navigation::MemoryRouter;
use crate::monitor::page::{RunsPage, RunsPageDeps};
use crate::monitor::query_state::RUNS_PATH;
use crate::monitor::retry::is_retry_eligible;
use crate::monitor::types::*;

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_REFRESH_INTERVAL_S: f64 = 15.0;

#[derive(Parser)]
#[command(name = "runwatch", version, about = "Monitor and retry workflow runs")]
pub struct Cli {
    /// Path to a .env file to load (default: auto-detect .env in cwd)
    #[arg(long, global = true)]
    dotenv: Option<PathBuf>,

    /// Path to a config file (default: auto-detect runwatch.yaml in cwd)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the platform API
    #[arg(long, global = true, env = "RUNWATCH_API_URL")]
    api_url: Option<String>,

    /// Project whose runs are shown
    #[arg(long, global = true, env = "RUNWATCH_PROJECT")]
    project: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print one page of runs
    Runs {
        /// Filter by status (e.g. failed, internal_error)
        #[arg(short, long)]
        status: Option<String>,

        /// Page size
        #[arg(short, long)]
        limit: Option<usize>,

        /// Cursor returned by a previous page
        #[arg(long)]
        cursor: Option<String>,

        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Retry a failed run
    Retry {
        run_id: String,

        #[arg(long, value_enum, default_value = "on-latest-version")]
        strategy: StrategyArg,
    },

    /// Show or change the project's failure notifications
    Notifications {
        #[arg(value_enum)]
        state: Option<Toggle>,
    },

    /// Live runs table with interactive commands on stdin
    Watch {
        /// Initial status filter
        #[arg(short, long)]
        status: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StrategyArg {
    OnLatestVersion,
    FromFailedStep,
}

impl From<StrategyArg> for RetryStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::OnLatestVersion => RetryStrategy::OnLatestVersion,
            StrategyArg::FromFailedStep => RetryStrategy::FromFailedStep,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

/// Effective settings after merging flags, env, config file and defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_url: String,
    pub project_id: String,
    pub page_size: usize,
    pub refresh_interval: Duration,
    pub timeout_s: f64,
}

impl Settings {
    pub fn resolve(
        api_url: Option<String>,
        project: Option<String>,
        config: RunWatchConfig,
    ) -> Result<Self> {
        let project_id = project.or(config.project_id).ok_or_else(|| {
            anyhow::anyhow!("No project given; pass --project or set RUNWATCH_PROJECT")
        })?;
        let refresh_s = config
            .refresh_interval_s
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_S);
        let Ok(refresh_interval) = Duration::try_from_secs_f64(refresh_s) else {
            bail!("Invalid refresh_interval_s: {}", refresh_s);
        };
        let timeout_s = config.timeout_s.unwrap_or(DEFAULT_TIMEOUT_S);
        if Duration::try_from_secs_f64(timeout_s).is_err() {
            bail!("Invalid timeout_s: {}", timeout_s);
        }
        Ok(Self {
            api_url: api_url
                .or(config.api_url)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            project_id,
            page_size: config.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1),
            refresh_interval: refresh_interval.max(Duration::from_secs(1)),
            timeout_s,
        })
    }
}

/// Canonical spelling of a user-typed status, e.g. `internal-error` to `INTERNAL_ERROR`.
pub fn normalize_status(input: &str) -> String {
    input.trim().to_uppercase().replace('-', "_")
}

/// Parse a status as typed by a user: case-insensitive, `-` or `_`.
pub fn parse_status(input: &str) -> Result<RunStatus> {
    normalize_status(input).parse()
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Load .env file
    load_dotenv(cli.dotenv.as_deref());

    let config = RunWatchConfig::load(cli.config.as_deref())?;
    let settings = Settings::resolve(cli.api_url, cli.project, config)?;
    let client = Arc::new(ApiClient::new(&settings.api_url, settings.timeout_s)?);

    match cli.command {
        Commands::Runs {
            status,
            limit,
            cursor,
            format,
        } => cmd_runs(&client, &settings, status, limit, cursor, format).await,
        Commands::Retry { run_id, strategy } => {
            cmd_retry(&client, &run_id, strategy.into()).await
        }
        Commands::Notifications { state } => cmd_notifications(&client, &settings, state).await,
        Commands::Watch { status } => cmd_watch(client, settings, status).await,
    }
}

/// Load environment variables from a .env file.
/// If an explicit path is given, load from that path (error if missing).
/// Otherwise, auto-detect .env in the current working directory (silently skip if absent).
fn load_dotenv(explicit_path: Option<&std::path::Path>) {
    match explicit_path {
        Some(path) => match dotenvy::from_path(path) {
            Ok(()) => info!("Loaded env from {}", path.display()),
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load dotenv file '{}': {}",
                    path.display(),
                    e
                );
            }
        },
        None => match dotenvy::dotenv() {
            Ok(path) => info!("Loaded env from {}", path.display()),
            Err(dotenvy::Error::Io(_)) => {}
            Err(e) => {
                eprintln!("Warning: Failed to parse .env file: {}", e);
            }
        },
    }
}

async fn cmd_runs(
    client: &ApiClient,
    settings: &Settings,
    status: Option<String>,
    limit: Option<usize>,
    cursor: Option<String>,
    format: String,
) -> Result<()> {
    let filter = FilterState::new(status.as_deref().map(parse_status).transpose()?);
    let request = PageRequest {
        cursor,
        limit: limit.unwrap_or(settings.page_size).max(1),
    };
    let project = ProjectContext::new(settings.project_id.clone());

    let page = client.fetch_page(&project, &filter, &request).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    let rows: Vec<RunRow> = page.data.into_iter().map(RunRow::from).collect();
    if rows.is_empty() {
        println!("No runs found.");
    } else {
        print_rows(&rows);
    }
    if let Some(next) = page.next {
        println!("\nNext cursor: {}", next);
    }
    if let Some(previous) = page.previous {
        println!("Previous cursor: {}", previous);
    }
    Ok(())
}

async fn cmd_retry(client: &ApiClient, run_id: &str, strategy: RetryStrategy) -> Result<()> {
    client
        .retry(run_id, strategy)
        .await
        .with_context(|| format!("Retry of {} failed", run_id))?;
    println!("Retry requested for {} ({})", run_id, strategy.label());
    Ok(())
}

async fn cmd_notifications(
    client: &ApiClient,
    settings: &Settings,
    state: Option<Toggle>,
) -> Result<()> {
    let project = match state {
        Some(toggle) => {
            let setting = NotificationStatus::from_enabled(matches!(toggle, Toggle::On));
            client.write(&settings.project_id, setting).await?
        }
        None => client.read(&settings.project_id).await?,
    };

    if project.edition == Edition::Community {
        println!("Notifications are not available in the community edition.");
        return Ok(());
    }
    let enabled = project.notify_status.is_enabled();
    println!(
        "Failure notifications for {}: {}",
        project.id,
        if enabled { "on" } else { "off" }
    );
    Ok(())
}

async fn cmd_watch(client: Arc<ApiClient>, settings: Settings, status: Option<String>) -> Result<()> {
    let mut query = QueryParams::new();
    if let Some(raw) = status.as_deref() {
        query.insert(STATUS_PARAM.to_string(), parse_status(raw)?.as_str().to_string());
    }
    let router = MemoryRouter::new(RUNS_PATH, query);

    let page = RunsPage::init(RunsPageDeps {
        navigator: router.clone(),
        feed: client.clone() as Arc<dyn RunFeed>,
        preferences: client.clone() as Arc<dyn PreferenceStore>,
        retries: client.clone() as Arc<dyn RetryService>,
        project: ProjectContext::new(settings.project_id.clone()),
        page_size: settings.page_size,
    })
    .await;

    let mut pages = page.pages();
    let mut errors = page.errors();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(settings.refresh_interval);
    ticker.tick().await;

    print_help();
    loop {
        tokio::select! {
            changed = pages.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = pages.borrow_and_update().clone();
                render_view(&view, &page);
            }
            Ok(error) = errors.recv() => {
                eprintln!("! {}", error);
            }
            _ = ticker.tick() => {
                page.paginator().refresh();
                let client = Arc::clone(&client);
                let project_id = settings.project_id.clone();
                tokio::spawn(async move {
                    if let Err(e) = client.refresh_project(&project_id).await {
                        warn!(error = %format!("{:#}", e), "Project refresh failed");
                    }
                });
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !handle_command(&page, router.as_ref(), line.trim()) {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    Ok(())
}

fn print_help() {
    println!("Commands: n (next)  p (previous)  s [STATUS] (filter)  r RUN_ID [from-failed-step]");
    println!("          t on|off (notifications)  o RUN_ID (open)  q (quit)");
}

/// Apply one interactive command. Returns `false` to quit.
fn handle_command(page: &RunsPage, router: &MemoryRouter, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return true;
    };
    match command {
        "q" | "quit" => return false,
        "n" | "next" => {
            if !page.paginator().next() {
                println!("Already on the last page.");
            }
        }
        "p" | "prev" => {
            if !page.paginator().previous() {
                println!("Already on the first page.");
            }
        }
        "s" | "status" => page.select_status(parts.next().map(normalize_status).as_deref()),
        "r" | "retry" => {
            let Some(run_id) = parts.next() else {
                println!("Usage: r RUN_ID [from-failed-step]");
                return true;
            };
            let strategy = match parts.next() {
                Some("from-failed-step") => RetryStrategy::FromFailedStep,
                _ => RetryStrategy::OnLatestVersion,
            };
            if let Err(e) = page.retry(run_id, strategy) {
                println!("{}", e);
            }
        }
        "t" | "notify" => {
            if !page.show_notification_toggle() {
                println!("Notifications are not available in this edition.");
                return true;
            }
            match parts.next() {
                Some("on") => page.set_notifications(true),
                Some("off") => page.set_notifications(false),
                _ => println!(
                    "Notifications are {}",
                    if page.notifications_enabled().value() { "on" } else { "off" }
                ),
            }
        }
        "o" | "open" => match parts.next() {
            Some(run_id) => {
                page.open_run(run_id, true);
                if let Some(opened) = router.history().last() {
                    println!("Opened {}", opened.path);
                }
            }
            None => println!("Usage: o RUN_ID"),
        },
        _ => print_help(),
    }
    true
}

fn render_view(view: &RunsView, page: &RunsPage) {
    if view.loading {
        println!("Loading...");
        return;
    }
    let filter = view
        .filter
        .status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "ALL".to_string());
    println!("\nStatus: {}", filter);

    if view.rows().is_empty() {
        println!("No runs found.");
    } else {
        print_rows(view.rows());
    }

    let paginator = page.paginator();
    println!(
        "[{}prev] [{}next]",
        if paginator.has_previous() { "" } else { "no " },
        if paginator.has_next() { "" } else { "no " }
    );
    if let Some(err) = &view.error {
        println!("! {}", err);
    }
}

fn print_rows(rows: &[RunRow]) {
    println!(
        "{:<38} {:<24} {:<16} {:<20} {:<20}",
        "RUN ID", "FLOW", "STATUS", "STARTED", "FINISHED"
    );
    println!("{}", "-".repeat(122));

    for row in rows {
        let fmt_time = |t: Option<chrono::DateTime<chrono::Utc>>| {
            t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        let mut status = row.current_status().to_string();
        if row.status.is_optimistic() {
            status.push('*');
        }
        if is_retry_eligible(row) {
            status.push_str(" ↻");
        }
        println!(
            "{:<38} {:<24} {:<16} {:<20} {:<20}",
            row.run.id,
            row.run.flow_name,
            status,
            fmt_time(row.run.started_at),
            fmt_time(row.run.finished_at)
        );
    }

    println!("\nTotal: {} run(s)", rows.len());
}
