//! Dashboard Store CLI
//!
//! Command-line access to the store outside a browser:
//! - Resolve time expressions
//! - Build deep links
//! - Bootstrap a headless dashboard and fetch every source
//! - Trigger a collector reload

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use futures_util::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dashboard_store::alerts::AlertLevel;
use dashboard_store::config::{generate_default_config, Config, LoggingConfig};
use dashboard_store::dashboard::{Dashboard, PagePayloads};
use dashboard_store::fetch::{FetchState, HttpTransport};
use dashboard_store::store::Store;
use dashboard_store::time::{format_timestamp, TimeRange};
use dashboard_store::url::{query_string, MemoryHistory};

#[derive(Parser)]
#[command(name = "dashboard-store")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Headless dashboard state store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the usual locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a time expression to a timestamp
    Resolve {
        /// Expression, e.g. "now-1h", "now/d", "2024-03-15"
        expression: String,
        /// Round to the end of the unit instead of its start
        #[arg(long)]
        round_up: bool,
    },

    /// Print the deep link for a time range
    Link {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Page path
        #[arg(long, default_value = "/")]
        path: String,
    },

    /// Bootstrap a dashboard from a payload file and fetch every source
    Load {
        /// Combined page payload document (JSON)
        payloads: PathBuf,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Give up waiting on pending requests after this many seconds
        #[arg(long, default_value = "30")]
        wait_secs: u64,
    },

    /// Ask the backend to reload its collector
    Reload,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load_default(),
    };
    init_logging(&config.logging);

    match cli.command {
        Commands::Resolve {
            expression,
            round_up,
        } => {
            let resolver = config.store.resolver()?;
            let time = resolver.resolve(&expression, round_up)?;
            println!("{}", format_timestamp(&time, &config.store.timestamp_format));
        }

        Commands::Link { from, to, path } => {
            let range = TimeRange::new(from, to);
            range.validate(&config.store.resolver()?)?;
            println!("{}?{}", path, query_string::serialize(&range));
        }

        Commands::Load {
            payloads,
            from,
            to,
            wait_secs,
        } => {
            let payloads = PagePayloads::from_file(&payloads)
                .with_context(|| format!("reading payloads from {}", payloads.display()))?;

            let defaults = config.store.default_range();
            let range = TimeRange::new(
                from.unwrap_or(defaults.from),
                to.unwrap_or(defaults.to),
            );
            let location = format!("/?{}", query_string::serialize(&range));

            let store = headless_store(&config, &location)?;
            let (dashboard, report) =
                Dashboard::bootstrap_with_config(store, payloads, &config.http).await?;

            println!(
                "Loaded {} data sources for {} (reload #{})",
                report.registered, range, report.seq
            );
            for problem in &report.problems {
                println!("  skipped: {}", problem);
            }
            println!();

            wait_for_sources(&dashboard, Duration::from_secs(wait_secs)).await;

            let alerts = dashboard.store().alert_messages().await;
            if !alerts.is_empty() {
                println!();
                println!("Alerts:");
                for alert in alerts {
                    println!("  [{}] {}", alert.level, alert.message);
                }
            }
        }

        Commands::Reload => {
            let store = headless_store(&config, "/")?;
            let (dashboard, _) =
                Dashboard::bootstrap_with_config(store, PagePayloads::default(), &config.http)
                    .await?;

            let level = dashboard.reload_collector().await;
            for alert in dashboard.store().alert_messages().await {
                println!("[{}] {}", alert.level, alert.message);
            }
            if level != AlertLevel::Success {
                bail!("collector reload failed");
            }
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, &content)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Config written to: {}", path.display());
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dashboard_store={}", config.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn headless_store(config: &Config, location: &str) -> anyhow::Result<Store> {
    let transport = Arc::new(HttpTransport::new(&config.http)?);
    let history = Arc::new(MemoryHistory::new(location));
    Ok(Store::new(&config.store, transport, history)?)
}

/// Wait for every handle, then print one line per source
async fn wait_for_sources(dashboard: &Dashboard, limit: Duration) {
    let store = dashboard.store();
    let sources = store.data_sources().await;

    let waits = sources.iter().filter_map(|source| {
        let handle = source.handle()?.clone();
        let name = source.name.clone();
        Some(async move { (name, handle.settled().await) })
    });

    match tokio::time::timeout(limit, join_all(waits)).await {
        Ok(results) => {
            for (name, state) in results {
                print_state(&name, &state, body_size);
            }
        }
        Err(_) => {
            println!("Gave up waiting after {}s", limit.as_secs());
            for source in &sources {
                if let Some(handle) = source.handle() {
                    print_state(&source.name, &handle.state(), body_size);
                }
            }
        }
    }

    if let Some(changes) = store.changes().await {
        if let Some(handle) = changes.data() {
            let state = match tokio::time::timeout(limit, handle.settled()).await {
                Ok(state) => state,
                Err(_) => handle.state(),
            };
            print_state("changes timeline", &state, |changes| match changes.as_array() {
                Some(list) => format!("{} changes", list.len()),
                None => "1 document".to_string(),
            });
        }
    }
}

fn print_state<T>(name: &str, state: &FetchState<T>, describe: impl Fn(&T) -> String) {
    match state {
        FetchState::Resolved(value) => println!("  {:<30} resolved ({})", name, describe(&**value)),
        FetchState::Rejected(err) => println!("  {:<30} rejected: {}", name, err),
        FetchState::Pending => println!("  {:<30} pending", name),
    }
}

fn body_size(body: &String) -> String {
    format!("{} bytes", body.len())
}
