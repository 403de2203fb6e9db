use anyhow::{bail, Context, Result};
use calendar_reconciler::infrastructure::config::{parse_time_zone, ReconcilerConfig};
use calendar_reconciler::{
    bootstrap_workspace, format_for_display, CalendarEvent, DisplayStyle, DisplayText,
    EventReconciler, NoExternalProvider, OfflineCalendarStore, RemoteEventRecord,
    ReqwestCalendarStore, TemporalNormalizer,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "calendar-reconciler")]
#[command(about = "Reconcile calendar events into one duplicate-free list")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a JSON array of event records as one refetch batch, offline
    Merge {
        snapshot: PathBuf,

        /// Zone that offset-bearing times are converted into (IANA name)
        #[arg(long, default_value = "UTC")]
        timezone: String,

        /// Print ISO-style dates and 24-hour times
        #[arg(long)]
        compact: bool,
    },
    /// Fetch the owner's events from the configured store
    Refresh {
        /// Workspace holding config/app.json and config/remote.json
        #[arg(long, default_value = ".")]
        workspace: PathBuf,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventView<'a> {
    #[serde(flatten)]
    event: &'a CalendarEvent,
    display: DisplayText,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Commands::Merge {
            snapshot,
            timezone,
            compact,
        } => {
            let raw = fs::read_to_string(&snapshot)
                .with_context(|| format!("failed to read {}", snapshot.display()))?;
            let records: Vec<RemoteEventRecord> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a JSON array of event records", snapshot.display()))?;

            let reconciler = EventReconciler::new(
                Arc::new(OfflineCalendarStore),
                Arc::new(NoExternalProvider),
                "",
            )
            .with_normalizer(TemporalNormalizer::new(parse_time_zone(&timezone)?));
            reconciler.merge_refetch_batch(&records);

            let style = if compact {
                DisplayStyle::Compact
            } else {
                DisplayStyle::Long
            };
            print_events(&reconciler.events(), style)
        }
        Commands::Refresh { workspace } => {
            let bootstrap = bootstrap_workspace(&workspace)
                .with_context(|| format!("failed to prepare workspace {}", workspace.display()))?;
            let config = bootstrap.config;
            info!(workspace = %workspace.display(), time_zone = %config.time_zone, "loaded configuration");

            let Some(owner_id) = config.owner_id.clone() else {
                bail!("no owner id configured (set ownerId in config/app.json or CALENDAR_OWNER_ID)");
            };
            let reconciler = build_reconciler(&config, owner_id)?;
            reconciler.refresh().await?;
            print_events(&reconciler.events(), config.display_style)
        }
    }
}

fn build_reconciler(
    config: &ReconcilerConfig,
    owner_id: String,
) -> Result<EventReconciler<ReqwestCalendarStore, ReqwestCalendarStore>> {
    let mut store = ReqwestCalendarStore::new(
        &config.remote.base_url,
        config.remote.access_token.clone(),
        config.remote.timeout,
    )?;
    if let Some(path) = config.remote.external_events_path.as_deref() {
        store = store.with_external_events_path(path);
    }
    let store = Arc::new(store);

    Ok(
        EventReconciler::new(Arc::clone(&store), store, owner_id)
            .with_normalizer(TemporalNormalizer::new(config.time_zone)),
    )
}

fn print_events(events: &[CalendarEvent], style: DisplayStyle) -> Result<()> {
    let views: Vec<EventView<'_>> = events
        .iter()
        .map(|event| EventView {
            event,
            display: format_for_display(&event.occurrence, style),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&views)?);
    Ok(())
}
