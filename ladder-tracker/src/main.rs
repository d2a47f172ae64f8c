//! ladder-tracker - league ladder scanner
//!
//! Fetches the top characters of each class category, looks up single
//! characters, and follows a character's race against its ladder neighbors.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ladder_common::config::{default_config_path, resolve_config_path, write_toml_config, TomlConfig};
use ladder_common::events::{EventBus, ScanEvent};
use ladder_common::{LadderMode, League};
use ladder_tracker::report::{format_lookup, format_race, format_standings};
use ladder_tracker::scan::{
    LookupOutcome, LookupRequest, NeighborResolver, RaceTracker, ScanSession, StopReason,
};
use ladder_tracker::services::PoeLadderClient;
use ladder_tracker::{ScanError, TrackerState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "ladder-tracker")]
#[command(about = "League ladder scanner and race tracker")]
#[command(version)]
struct Args {
    /// Configuration file (overrides LADDER_TRACKER_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available leagues
    Leagues,

    /// Fetch the top characters per category
    Fetch {
        /// League id or name; unknown names are treated as private league ids
        #[arg(short, long)]
        league: Option<String>,

        /// Restrict to one category (ascendancy)
        #[arg(short = 'k', long)]
        category: Option<String>,

        /// Characters per category
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Use the authenticated API (no depth ceiling)
        #[arg(long)]
        deep: bool,

        /// Continue the scan this many times, raising the limit each time
        #[arg(long, default_value_t = 0)]
        show_more: usize,

        /// Afterwards, look up this character in the fetched entries first
        #[arg(long)]
        find: Option<String>,
    },

    /// Find one character by name
    Search {
        #[arg(short, long)]
        league: Option<String>,

        /// Character name (case-insensitive)
        name: String,

        #[arg(long)]
        deep: bool,

        /// Give up after this many seconds (0 disables the limit)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Follow a character's neighbors until interrupted (Enter refreshes now)
    Race {
        #[arg(short, long)]
        league: Option<String>,

        name: String,

        #[arg(long)]
        deep: bool,

        /// Seconds between refreshes
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Write a configuration file with default values
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Command::InitConfig { force } = &args.command {
        return init_config(args.config.clone(), *force);
    }

    let config_path = resolve_config_path(args.config.as_deref())?;
    let mut config = TomlConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    init_tracing(&config.logging.level);

    info!(
        "Starting ladder-tracker v{}",
        env!("CARGO_PKG_VERSION")
    );
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("No configuration file found, using defaults"),
    }

    match &args.command {
        Command::Search { timeout: Some(secs), .. } => config.scan.search_timeout_secs = *secs,
        Command::Race { interval: Some(secs), .. } => config.race.refresh_interval_secs = *secs,
        _ => {}
    }

    let client = PoeLadderClient::new(&config.api).context("Failed to create ladder API client")?;
    let state = TrackerState::new(Arc::new(client), config, EventBus::default());
    cancel_on_ctrl_c(state.shutdown.clone());

    match args.command {
        Command::Leagues => list_leagues(&state).await,
        Command::Fetch {
            league,
            category,
            limit,
            deep,
            show_more,
            find,
        } => {
            let mode = ladder_mode(&state, deep)?;
            fetch(&state, league.as_deref(), category.as_deref(), limit, mode, show_more, find).await
        }
        Command::Search {
            league, name, deep, ..
        } => {
            let mode = ladder_mode(&state, deep)?;
            search(&state, league.as_deref(), &name, mode).await
        }
        Command::Race {
            league, name, deep, ..
        } => {
            let mode = ladder_mode(&state, deep)?;
            race(&state, league.as_deref(), &name, mode).await
        }
        Command::InitConfig { .. } => Ok(()),
    }
}

fn init_tracing(default_level: &str) {
    // Logs go to stderr; stdout carries the reports
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn ladder_mode(state: &TrackerState, deep: bool) -> Result<LadderMode> {
    if !deep {
        return Ok(LadderMode::Public);
    }
    if state.config.access_token().is_none() {
        bail!(
            "Deep mode needs an access token: set api.access_token or {}",
            ladder_common::config::ACCESS_TOKEN_ENV_VAR
        );
    }
    Ok(LadderMode::Authenticated)
}

/// Cancel `token` on Ctrl+C
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping");
            token.cancel();
        }
    });
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path.or_else(default_config_path) {
        Some(path) => path,
        None => bail!("No config directory on this platform; pass --config"),
    };

    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    write_toml_config(&TomlConfig::default(), &path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn list_leagues(state: &TrackerState) -> Result<()> {
    let leagues = state
        .source
        .fetch_leagues()
        .await
        .context("Failed to fetch league list")?;

    let default = League::default_choice(&leagues).map(|l| l.id.clone());
    for league in &leagues {
        let marker = if Some(&league.id) == default.as_ref() { "*" } else { " " };
        if league.display_name == league.id {
            println!("{} {}", marker, league.id);
        } else {
            println!("{} {} ({})", marker, league.id, league.display_name);
        }
    }
    Ok(())
}

async fn fetch(
    state: &TrackerState,
    league: Option<&str>,
    category: Option<&str>,
    limit: Option<usize>,
    mode: LadderMode,
    show_more: usize,
    find: Option<String>,
) -> Result<()> {
    let league = state.resolve_league(league).await;
    let (request, vocabulary) = state.scan_request(league, category, limit, mode)?;
    info!(
        league = %request.league.id,
        vocabulary = %vocabulary.name,
        "Fetching ladder"
    );

    let mut task = state.start_fetch(ScanSession::new(request, &vocabulary)?).await;
    let mut runs_left = show_more + 1;

    let (session, outcome) = loop {
        let report = task.join().await.context("Scan task failed")?;
        runs_left -= 1;

        match report.outcome {
            Ok(StopReason::Saturated) if runs_left > 0 => {
                task = state.show_more(report.session).await;
            }
            outcome => break (report.session, outcome),
        }
    };

    print!("{}", format_standings(&session.standings()));
    println!(
        "{} entries scanned in {} pages",
        session.all_seen_entries().len(),
        session.pages_fetched()
    );

    let reason = outcome.context("Scan did not complete; partial results shown")?;
    info!(reason = %reason, "Scan finished");

    if let Some(name) = find {
        let request = LookupRequest {
            league: session.league.clone(),
            name,
            mode,
        };
        let report = state.lookup.find(&request, Some(&session), &state.shutdown).await;
        println!("{}", format_lookup(&request.name, &report.result?));
    }

    Ok(())
}

async fn search(state: &TrackerState, league: Option<&str>, name: &str, mode: LadderMode) -> Result<()> {
    let league = state.resolve_league(league).await;
    if mode.is_deep() && league.user_supplied {
        return Err(ScanError::InvalidRequest("deep mode is only available for listed leagues".to_string()).into());
    }

    let request = LookupRequest {
        league,
        name: name.to_string(),
        mode,
    };

    let progress = spawn_progress_printer(&state.event_bus);
    let report = state.lookup.find(&request, None, &state.shutdown).await;
    progress.abort();

    let outcome = report.result?;
    println!("{}", format_lookup(name, &outcome));
    Ok(())
}

async fn race(state: &TrackerState, league: Option<&str>, name: &str, mode: LadderMode) -> Result<()> {
    let league = state.resolve_league(league).await;
    if mode.is_deep() && league.user_supplied {
        return Err(ScanError::InvalidRequest("deep mode is only available for listed leagues".to_string()).into());
    }

    let request = LookupRequest {
        league: league.clone(),
        name: name.to_string(),
        mode,
    };

    let progress = spawn_progress_printer(&state.event_bus);
    let report = state.lookup.find(&request, None, &state.shutdown).await;
    progress.abort();

    let outcome = report.result?;
    println!("{}", format_lookup(name, &outcome));
    let found = match outcome {
        LookupOutcome::Found { context, .. } => context,
        LookupOutcome::NotFound { .. } => bail!("{} is not on the ladder, nothing to race", name),
    };

    let resolver = Arc::new(NeighborResolver::new(
        Arc::clone(&state.source),
        &league,
        mode,
        &state.config.race,
        &found,
        report.scanned,
    ));

    let mut updates = state.event_bus.subscribe();
    let tracker = RaceTracker::new(resolver, &state.config.race, state.event_bus.clone()).spawn();

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            line = input.next_line(), if input_open => match line {
                Ok(Some(_)) => {
                    if !tracker.request_refresh() {
                        info!("Refresh already pending");
                    }
                }
                Ok(None) | Err(_) => input_open = false,
            },
            event = updates.recv() => match event {
                Ok(ScanEvent::RaceUpdated { standings, timestamp }) => {
                    println!("[{}]", timestamp.format("%H:%M:%S"));
                    print!("{}", format_race(&standings));
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Race display fell behind");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    tracker.stop();
    tokio::time::timeout(Duration::from_secs(5), tracker.join())
        .await
        .context("Race tracker did not stop")?
        .context("Race tracker task failed")?;
    Ok(())
}

/// Print search progress to stderr until aborted
fn spawn_progress_printer(bus: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if let ScanEvent::LookupProgress { name, scanned } = event {
                eprintln!("Searching for {}: {} entries scanned", name, scanned);
            }
        }
    })
}
