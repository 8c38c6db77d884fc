//! herodb server: serves every store under `--stores-root` over HTTP.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use herodb::config::Config;
use herodb::gc::spawn_background_gc;
use herodb::http::{router, AppState};
use herodb::query_cache::{LruBackend, QueryCache};
use herodb::registry::Registry;

#[derive(Parser)]
#[command(name = "herodb")]
#[command(about = "hierarchical key/value store over HTTP")]
#[command(version)]
struct Cli {
    /// directory containing one subdirectory per store
    stores_root: PathBuf,

    /// address to bind the HTTP server to
    #[arg(long, env = "HERODB_BIND")]
    bind: Option<String>,

    /// seconds between background gc sweeps (0 disables)
    #[arg(long, env = "HERODB_GC_INTERVAL")]
    gc_interval: Option<u64>,

    /// config file to load defaults from (CLI flags override it)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error loading config {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => Config::new(&cli.stores_root),
    };
    config.stores_root = cli.stores_root;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(interval) = cli.gc_interval {
        config.gc_interval_secs = interval;
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error building tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> herodb::Result<()> {
    std::fs::create_dir_all(&config.stores_root).map_err(|e| herodb::Error::Io {
        path: config.stores_root.clone(),
        source: e,
    })?;

    let registry = Arc::new(Registry::new(&config.stores_root));
    let cache = Arc::new(QueryCache::new(Box::new(LruBackend::new(config.cache_capacity))));

    if config.gc_interval_secs > 0 {
        let registry = registry.clone();
        spawn_background_gc(registry, Duration::from_secs(config.gc_interval_secs));
        info!(interval_secs = config.gc_interval_secs, "background gc enabled");
    }

    let state = AppState { registry, cache };
    let app = router(state);

    let addr: std::net::SocketAddr = config
        .bind_addr
        .parse()
        .map_err(|_| herodb::Error::InvalidArgument(format!("invalid bind address: {}", config.bind_addr)))?;

    info!(%addr, stores_root = %config.stores_root.display(), "herodb listening");
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| herodb::Error::Io {
        path: PathBuf::from(config.bind_addr.clone()),
        source: e,
    })?;
    axum::serve(listener, app.into_make_service())
        .await
        .map_err(|e| herodb::Error::Io {
            path: PathBuf::from("<server>"),
            source: e,
        })?;
    Ok(())
}
