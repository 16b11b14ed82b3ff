use anyhow::{Context, Result};
use clap::Parser;
use newsdesk::aggregate::{AggregationStore, FeedView, UniqueView};
use newsdesk::broadcast::Broadcaster;
use newsdesk::config::Config;
use newsdesk::feed::{build_client, FeedFetcher};
use newsdesk::model::{ErrorRecord, SortDirection, ViewFilter};
use newsdesk::refresh::{RefreshLoop, RefreshPhase};
use newsdesk::util::truncate_summary;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

/// Summary length in the text rendering.
const SUMMARY_CHARS: usize = 150;

/// Get the default config file path (~/.config/newsdesk/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("newsdesk")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(
    name = "newsdesk",
    version,
    about = "Live news aggregator for RSS, RDF and Atom feeds"
)]
struct Args {
    /// Config file (default: ~/.config/newsdesk/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run a single refresh pass, print the visible view and exit
    #[arg(long)]
    once: bool,

    /// Print the --once view as JSON instead of text
    #[arg(long, requires = "once")]
    json: bool,

    /// Override the recency window of the visible view
    #[arg(long, value_name = "N")]
    max_age_hours: Option<i64>,

    /// Override the sort direction (asc or desc)
    #[arg(long, value_name = "DIR")]
    sort: Option<SortDirection>,
}

#[derive(Serialize)]
struct Snapshot<'a> {
    view: &'a FeedView,
    channels: &'a UniqueView,
    errors: &'a [ErrorRecord],
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so --json output stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("newsdesk=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config at {}", config_path.display()))?;

    let mut filter = config.view_filter();
    if let Some(hours) = args.max_age_hours {
        filter = ViewFilter::hours(hours, filter.direction);
    }
    if let Some(direction) = args.sort {
        filter.direction = direction;
    }

    let client = build_client().context("Failed to build HTTP client")?;
    let fetcher = Arc::new(FeedFetcher::new(client, config.fetch_settings()));
    let store = Arc::new(AggregationStore::new(filter));
    let broadcaster = Broadcaster::new(config.subscriber_buffer);
    let mut refresh = RefreshLoop::new(
        config.sources(),
        Arc::clone(&fetcher),
        Arc::clone(&store),
        broadcaster.clone(),
        config.refresh_settings(),
    );

    if args.once {
        refresh.run_pass().await;
        let view = store.view();
        let channels = store.unique_view();
        let errors = fetcher.errors().snapshot();
        if args.json {
            let snapshot = Snapshot {
                view: &view,
                channels: &channels,
                errors: &errors,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&snapshot).context("Failed to serialize view")?
            );
        } else {
            print!("{}", render_text(&view, &channels));
        }
        return Ok(());
    }

    let mut updates = broadcaster.subscribe();
    let mut phases = refresh.phases();
    let handle = refresh.spawn();

    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(update) = update else { break };
                tracing::info!(
                    source = %update.source,
                    total = update.total_items,
                    visible = update.visible_items,
                    "News updated"
                );
            }
            changed = phases.changed() => {
                if changed.is_err() {
                    break;
                }
                let phase = *phases.borrow_and_update();
                if phase == RefreshPhase::Idle {
                    print!("{}", render_text(&store.view(), &store.unique_view()));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    handle.abort();
    Ok(())
}

fn render_text(view: &FeedView, channels: &UniqueView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", view.title);
    let _ = writeln!(out, "{}", "=".repeat(view.title.chars().count()));

    if view.loading {
        let _ = writeln!(out, "Loading news...");
        return out;
    }

    for item in &view.items {
        let _ = writeln!(
            out,
            "\n[{}] {} ({})",
            item.pub_date.format("%Y-%m-%d %H:%M"),
            item.title,
            item.channel_title
        );
        if !item.description.is_empty() {
            let _ = writeln!(out, "  {}", truncate_summary(&item.description, SUMMARY_CHARS));
        }
        if !item.item_link.is_empty() {
            let _ = writeln!(out, "  {}", item.item_link);
        }
    }

    let _ = writeln!(out, "\nSources");
    for rep in &channels.representatives {
        let count = channels.counts.get(&rep.channel_link).copied().unwrap_or(0);
        let _ = writeln!(out, "{:>5}  {}  {}", count, rep.channel_title, rep.channel_link);
    }
    let _ = writeln!(
        out,
        "\n{} of {} items shown",
        view.items.len(),
        view.total_count
    );
    out
}
