use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use icemon_lite::config::{DashboardConfig, MonitorConfig};
use icemon_lite::dashboard::{run_dashboard, DashboardState};
use icemon_lite::feed::{pump_events, FeedEnd};
use icemon_lite::job::JobState;
use icemon_lite::monitor::{Monitor, MonitorHandle, MonitorSnapshot};
use icemon_lite::shutdown::cancel_on_signal;
use icemon_lite::view::{JobTable, LogView};

#[derive(Parser, Debug)]
#[command(name = "icemon-lite")]
#[command(version)]
#[command(about = "Live slot and timeline monitor for a compile cluster")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Follow a scheduler feed (JSON lines) and track every host's slots
    Watch(WatchArgs),
}

// =============================================================================
// Watch Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct WatchArgs {
    /// Feed to read, one JSON event per line ("-" for stdin)
    #[arg(long, short = 'i', default_value = "-")]
    input: String,

    /// Logical clock period in milliseconds
    #[arg(long, default_value = "200")]
    clock_ms: u64,

    /// Aging sweep period in milliseconds
    #[arg(long, default_value = "1000")]
    aging_ms: u64,

    /// Remove a host after this many aging ticks without events
    #[arg(long, default_value = "5")]
    stale_after: u32,

    /// Clock ticks of history kept per slot
    #[arg(long, default_value = "600")]
    window: u64,

    /// Maximum number of remembered jobs
    #[arg(long, default_value = "10000")]
    max_jobs: usize,

    /// Start with the timers stopped
    #[arg(long)]
    paused: bool,

    /// Manual node checks to run at startup (format: "host:max_kids")
    #[arg(long = "check-node", value_name = "HOST:MAX_KIDS")]
    check_nodes: Vec<String>,

    /// Port for the JSON dashboard (optional)
    #[arg(long)]
    dashboard_port: Option<u16>,

    /// Log every job transition
    #[arg(long)]
    log_jobs: bool,

    /// Keep running after the feed ends until interrupted
    #[arg(long)]
    linger: bool,

    /// Summary format printed on exit
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct SlotSummary {
    slot: u64,
    state: String,
    job_id: Option<u32>,
    file_name: Option<String>,
    entries: usize,
}

#[derive(Serialize)]
struct NodeSummary {
    host: String,
    color: String,
    capacity: u32,
    busy: usize,
    age: u32,
    slots: Vec<SlotSummary>,
}

#[derive(Serialize)]
struct WatchSummary {
    clock: u64,
    connected: bool,
    tracked_jobs: usize,
    finished: usize,
    failed: usize,
    dropped_updates: u64,
    malformed_events: u64,
    nodes: Vec<NodeSummary>,
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_check_node(arg: &str) -> Option<(String, u32)> {
    let (host, max_kids) = arg.trim().rsplit_once(':')?;
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), max_kids.parse().ok()?))
}

fn summarize(snapshot: &MonitorSnapshot, jobs: &JobTable) -> WatchSummary {
    let rows = jobs.rows();
    let count_state = |state: JobState| rows.iter().filter(|j| j.state() == state).count();

    WatchSummary {
        clock: snapshot.registry.clock,
        connected: snapshot.connected,
        tracked_jobs: snapshot.tracked_jobs,
        finished: count_state(JobState::Finished),
        failed: count_state(JobState::Failed),
        dropped_updates: snapshot.registry.dropped_updates,
        malformed_events: snapshot.malformed_events,
        nodes: snapshot
            .registry
            .nodes
            .iter()
            .map(|node| NodeSummary {
                host: node.host.clone(),
                color: node.color.to_string(),
                capacity: node.capacity,
                busy: node.busy_slots(),
                age: node.last_seen_age,
                slots: node
                    .slots
                    .iter()
                    .map(|slot| {
                        let last = slot.entries.last().map(|e| &e.job);
                        let job = last.filter(|j| !j.is_placeholder());
                        SlotSummary {
                            slot: slot.id.0,
                            state: last
                                .map(|j| j.state().to_string())
                                .unwrap_or_else(|| "-".to_string()),
                            job_id: job.map(|j| j.id),
                            file_name: job
                                .map(|j| j.file_name.clone())
                                .filter(|f| !f.is_empty()),
                            entries: slot.entries.len(),
                        }
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn print_table(summary: &WatchSummary) {
    println!(
        "clock {}  connected {}  jobs {} (finished {}, failed {})  dropped {}  malformed {}",
        summary.clock,
        summary.connected,
        summary.tracked_jobs,
        summary.finished,
        summary.failed,
        summary.dropped_updates,
        summary.malformed_events
    );
    println!();
    println!(
        "{:<24} {:<8} {:>8} {:>6} {:>4}",
        "HOST", "COLOR", "CAPACITY", "BUSY", "AGE"
    );
    for node in &summary.nodes {
        println!(
            "{:<24} {:<8} {:>8} {:>6} {:>4}",
            node.host, node.color, node.capacity, node.busy, node.age
        );
        for slot in &node.slots {
            println!(
                "  slot {:<6} {:<10} {:>8} {}",
                slot.slot,
                slot.state,
                slot.job_id.map(|id| id.to_string()).unwrap_or_default(),
                slot.file_name.as_deref().unwrap_or("")
            );
        }
    }
}

async fn run_feed(
    input: &str,
    handle: &MonitorHandle,
    cancel: CancellationToken,
) -> Result<FeedEnd, Box<dyn std::error::Error>> {
    let end = if input == "-" {
        pump_events(BufReader::new(tokio::io::stdin()), handle, cancel).await?
    } else {
        let file = tokio::fs::File::open(PathBuf::from(input)).await?;
        pump_events(BufReader::new(file), handle, cancel).await?
    };
    Ok(end)
}

async fn run_watch(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = MonitorConfig::new()
        .with_clock_interval_ms(args.clock_ms)
        .with_aging_interval_ms(args.aging_ms)
        .with_stale_after_ticks(args.stale_after)
        .with_window_ticks(args.window)
        .with_max_jobs(args.max_jobs)
        .with_autostart(!args.paused);

    tracing::info!(
        input = %args.input,
        clock_ms = config.clock_interval_ms,
        aging_ms = config.aging_interval_ms,
        stale_after = config.stale_after_ticks,
        window = config.window_ticks,
        "Starting monitor"
    );

    let handle = Monitor::spawn(config);
    let jobs = JobTable::with_capacity(args.max_jobs);
    handle.attach_view(jobs.clone()).await?;
    if args.log_jobs {
        handle.attach_view(LogView).await?;
    }

    for arg in &args.check_nodes {
        match parse_check_node(arg) {
            Some((host, max_kids)) => {
                if let Err(e) = handle.request_node_check(host, max_kids).await {
                    tracing::warn!(value = %arg, error = %e, "Node check rejected");
                }
            }
            None => tracing::warn!(value = %arg, "Invalid node check, expected host:max_kids"),
        }
    }

    if let Some(port) = args.dashboard_port {
        let mut dashboard = DashboardConfig::default();
        dashboard.addr.set_port(port);
        let addr = dashboard.addr;
        let state = DashboardState {
            monitor: handle.clone(),
            jobs: jobs.clone(),
        };
        tokio::spawn(async move {
            run_dashboard(addr, state).await;
        });
    }

    let cancel = CancellationToken::new();
    cancel_on_signal(cancel.clone());

    let end = run_feed(&args.input, &handle, cancel.clone()).await?;
    tracing::info!(?end, "Feed finished");

    if args.linger && end != FeedEnd::Cancelled {
        tracing::info!("Feed ended, keeping last known state until interrupted");
        cancel.cancelled().await;
    }

    let snapshot = handle.snapshot().await?;
    handle.shutdown();

    let summary = summarize(&snapshot, &jobs);
    match args.output {
        OutputFormat::Table => print_table(&summary),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Watch(watch) => run_watch(watch).await,
    }
}
