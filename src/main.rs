use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use favicon_resolver::{config::Config, service::IconResolverService};

#[derive(Parser)]
#[command(name = "favicon-resolver")]
#[command(version)]
#[command(about = "Resolve and cache the best favicon for one or more site URLs")]
struct Cli {
    /// Site URLs to resolve icons for
    #[arg(required = true)]
    urls: Vec<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Clear all cached icon state before resolving
    #[arg(long)]
    clear: bool,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("favicon_resolver={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting favicon-resolver v{}", env!("CARGO_PKG_VERSION"));

    std::env::set_var("CONFIG_FILE", &cli.config);
    let config = Config::load()?;

    let service = IconResolverService::with_default_collaborators(&config)?;

    if cli.clear {
        service.clear_all_cache().await;
    } else {
        service.load().await;
    }

    for url in &cli.urls {
        // Stream incremental improvements as probes settle; the final
        // answer follows once detection completes.
        let printed = url.clone();
        let subscription = service.on_icon_update(url, move |icon| {
            println!("{} -> {} (update)", printed, icon);
        });

        let best = service.detect_best_icon(url).await;
        println!("{} -> {}", url, best);

        service.unsubscribe(&subscription);
    }

    let stats = service.cache_stats();
    info!(
        "Cache: {} entries, mean score {:.1}",
        stats.entries, stats.mean_score
    );

    // Don't lose the last debounce window's writes on exit.
    service.flush().await;
    Ok(())
}
