use anyhow::{Context, Result};
use clap::Parser;
use client_core::{CollectionEvent, FilterSet, FilterValue, LabClient};
use shared::protocol::SortOrder;
use tokio::time::{timeout, Duration};
use transport::HttpApi;
use url::Url;

mod config;

#[derive(Parser, Debug)]
struct Args {
    /// Base URL of the LIMS API; overrides labdesk.toml and environment.
    #[arg(long)]
    api_url: Option<String>,
    /// Only list samples with this status (registered, in_progress, ...).
    #[arg(long)]
    status: Option<String>,
    /// Column to sort by.
    #[arg(long)]
    sort_by: Option<String>,
    #[arg(long, default_value_t = 0)]
    offset: u32,
    #[arg(long)]
    limit: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();
    let settings = config::load_settings();

    let api_url = args.api_url.unwrap_or(settings.api_url);
    Url::parse(&api_url).with_context(|| format!("invalid api url: {api_url}"))?;
    let limit = args.limit.unwrap_or(settings.page_limit);

    let api = HttpApi::new(api_url);
    let client = LabClient::new(&api);
    let samples = &client.samples;
    let mut events = samples.list.subscribe_events();

    let mut filters = FilterSet::new();
    if let Some(status) = &args.status {
        filters.set("status", FilterValue::new(status.clone()));
    }
    samples.list.set_filters(filters).await;
    if let Some(sort_by) = args.sort_by {
        samples.list.set_sort(Some(sort_by), Some(SortOrder::Asc)).await;
    }
    samples
        .list
        .set_page(args.offset, limit)
        .await
        .context("rejected page parameters")?;

    timeout(Duration::from_secs(10), async {
        loop {
            match events.recv().await {
                Ok(CollectionEvent::Updated { .. }) => break Ok(()),
                Ok(CollectionEvent::FetchFailed { error, .. }) => {
                    break Err(anyhow::anyhow!("{:?}: {}", error.code, error.message))
                }
                Err(err) => break Err(anyhow::anyhow!("event stream closed: {err}")),
            }
        }
    })
    .await
    .context("timed out waiting for the sample listing")??;

    let view = samples.list.page_view().await;
    println!(
        "samples {}..{} of {} ({} active filters)",
        view.page.offset,
        view.page.offset + view.items.len() as u32,
        view.total_count,
        view.filters.active_count()
    );
    for sample in &view.items {
        println!(
            "  #{:<6} {:<32} {:?}",
            sample.sample_id.0, sample.name, sample.status
        );
    }

    Ok(())
}
