use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use woostore::cache::{DiskCacheStore, HttpImageFetcher, ImageCache};
use woostore::catalog::{
  apply_webhook, CacheService, CacheServiceConfig, CachedApi, ResourceKind, WebhookPayload,
};
use woostore::config::Config;
use woostore::wp::WordPressClient;

#[derive(Parser, Debug)]
#[command(name = "woostore")]
#[command(about = "Headless WooCommerce storefront cache and sync")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/woostore/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Refresh the catalog cache from origin
  Refresh {
    /// Refresh a single kind (products, categories, pages, posts, menus,
    /// site-info) instead of everything
    #[arg(short, long)]
    kind: Option<String>,
  },
  /// Apply a webhook payload from a JSON file ("-" reads stdin)
  Webhook {
    #[arg(short, long)]
    file: PathBuf,
  },
  /// Image cache maintenance
  Images {
    #[command(subcommand)]
    command: ImagesCommand,
  },
  /// Show cache statistics and refresh metadata
  Status,
  /// Search the cached catalog (read-through: populates on miss)
  Search { query: String },
}

#[derive(Subcommand, Debug)]
enum ImagesCommand {
  /// Evict images not accessed within the age threshold
  Cleanup {
    /// Override the configured max age
    #[arg(long)]
    max_age_days: Option<i64>,
  },
}

fn init_tracing(log_dir: &std::path::Path) -> tracing_appender::non_blocking::WorkerGuard {
  let _ = std::fs::create_dir_all(log_dir);
  let file_appender = tracing_appender::rolling::daily(log_dir, "woostore.log");
  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

  use tracing_subscriber::layer::SubscriberExt;
  use tracing_subscriber::util::SubscriberInitExt;

  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("woostore=info")),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .with(tracing_subscriber::fmt::layer().with_writer(file_writer).with_ansi(false))
    .init();

  guard
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;

  let cache_dir = config.cache_dir()?;
  let _log_guard = init_tracing(&cache_dir.join("logs"));

  // Composition root: every service is constructed here and passed down,
  // so nothing holds hidden global state.
  let store = Arc::new(
    DiskCacheStore::open(cache_dir.clone())?.with_default_expiry(config.cache.expiry_minutes),
  );
  let images = Arc::new(ImageCache::open(
    cache_dir.join("images"),
    config.images.public_prefix.clone(),
    config.image_hosts(),
    Arc::new(HttpImageFetcher::new()?),
  )?);
  let origin = Arc::new(WordPressClient::new(
    &config.origin.url,
    Config::consumer_credentials(),
  )?);
  let service = Arc::new(CacheService::new(
    Arc::clone(&store),
    origin,
    Some(Arc::clone(&images)),
    CacheServiceConfig {
      enabled: config.cache.enabled,
      origin_url: config.origin.url.clone(),
      expiry_minutes: config.cache.expiry_minutes,
    },
  ));

  match args.command {
    Command::Refresh { kind } => match kind {
      Some(kind) => {
        let kind = ResourceKind::from_str(&kind).map_err(|e| eyre!(e))?;
        service.refresh_partial(kind).await;
        println!("Refreshed {}", kind.key());
      }
      None => {
        service.refresh_all().await;
        println!("Full refresh complete");
      }
    },

    Command::Webhook { file } => {
      let json = if file.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin())?
      } else {
        std::fs::read_to_string(&file)
          .map_err(|e| eyre!("Failed to read {}: {}", file.display(), e))?
      };
      let payload: WebhookPayload =
        serde_json::from_str(&json).map_err(|e| eyre!("Invalid webhook payload: {}", e))?;

      let outcome = apply_webhook(&service, payload).await;
      println!("{:?}", outcome);
    }

    Command::Images { command } => match command {
      ImagesCommand::Cleanup { max_age_days } => {
        let days = max_age_days.unwrap_or(config.images.max_age_days);
        let removed = images.cleanup(chrono::Duration::days(days));
        println!("Evicted {} cached images older than {} days", removed, days);
      }
    },

    Command::Status => {
      let stats = store.stats();
      println!("cache: {} hits, {} misses", stats.hits, stats.misses);

      let metadata = service.metadata();
      match metadata.last_full_refresh {
        Some(at) => println!("last full refresh: {}", at),
        None => println!("last full refresh: never"),
      }
      if let Some(partial) = metadata.last_partial_refresh {
        println!("last partial refresh: {} at {}", partial.kind, partial.at);
      }
      if !metadata.checksum.is_empty() {
        println!("checksum: {}", metadata.checksum);
      }

      let image_stats = images.stats();
      println!(
        "images: {} cached ({} bytes), {} hits, {} misses, {} errors",
        image_stats.count,
        image_stats.total_size,
        image_stats.hits,
        image_stats.misses,
        image_stats.errors
      );
    }

    Command::Search { query } => {
      let api = CachedApi::new(Arc::clone(&service));
      for product in api.search_products(&query).await {
        println!("{}\t{}\t{}", product.id, product.name, product.price);
      }
    }
  }

  Ok(())
}
