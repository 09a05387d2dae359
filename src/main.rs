use clap::Parser;
use news_aggregator::{EngineConfig, ErrorResponse, NewsService};
use tokio_stream::StreamExt;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "news-aggregator", about = "Fetch categorized news from the upstream feed")]
struct Cli {
    /// Category to fetch; "all" aggregates every category.
    #[arg(default_value = "all")]
    category: String,

    /// Number of items to return (defaults to the configured limit).
    #[arg(short, long)]
    limit: Option<usize>,

    /// List the available categories and exit.
    #[arg(long)]
    categories: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env();
    info!(
        "starting news aggregator (default limit {}, max limit {})",
        config.default_limit, config.max_limit
    );

    let service = NewsService::new(config);

    if cli.categories {
        for name in service.list_categories() {
            println!("{}", name);
        }
        return Ok(());
    }

    let session = service.open_session();
    let mut events = service
        .subscribe_progress(session.id())
        .ok_or_else(|| anyhow::anyhow!("session {} was not registered", session.id()))?;

    let printer = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let Ok(event) = event else { continue };
            info!(
                "progress: {} {}/{}{}",
                event.category,
                event.items_fetched,
                event.target,
                if event.done { " (done)" } else { "" }
            );
            if event.done {
                break;
            }
        }
    });

    match service
        .get_news_session(&cli.category, cli.limit, &session)
        .await
    {
        Ok(response) => {
            info!("fetched {} items for {}", response.data.len(), response.category);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Err(err) => {
            warn!("fetch failed: {}", err);
            println!("{}", serde_json::to_string_pretty(&ErrorResponse::from(&err))?);
        }
    }

    let _ = printer.await;
    Ok(())
}
