//! OptiKV Server Binary
//!
//! Starts the TCP server for OptiKV.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use optikv::config::{EngineKind, SyncStrategy};
use optikv::network::Server;
use optikv::{Config, Database, Shutdown, ShutdownBarrier};
use tracing_subscriber::{fmt, EnvFilter};

/// OptiKV Server
#[derive(Parser, Debug)]
#[command(name = "optikv-server")]
#[command(about = "Key-value store with optimistic multi-key transactions")]
#[command(version)]
struct Args {
    /// Storage engine: swap, disk or hybrid
    #[arg(short, long, default_value = "swap")]
    engine: EngineKind,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7070")]
    listen: String,

    /// Persistence directory (required by the disk engine)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Binlog file (disk-backed engines default to {data_dir}/binlog)
    #[arg(short, long)]
    binlog: Option<PathBuf>,

    /// fsync the binlog after every N records (1 = every record)
    #[arg(long, default_value = "100")]
    sync_every: usize,

    /// Number of dictionary shards
    #[arg(long, default_value = "16")]
    shards: usize,

    /// Soft memory limit for caches in MB
    #[arg(long, default_value = "256")]
    soft_limit_mb: usize,

    /// MemTable size limit in MB before a checkpoint
    #[arg(short = 'm', long, default_value = "16")]
    memtable_mb: usize,

    /// Young generation bucket count
    #[arg(long, default_value = "64")]
    young_buckets: usize,

    /// Old generation bucket count
    #[arg(long, default_value = "256")]
    old_buckets: usize,

    /// Swap bucket size in KB
    #[arg(long, default_value = "4096")]
    bucket_kb: usize,

    /// Allocator instances per generation
    #[arg(long, default_value = "4")]
    allocator_shards: usize,

    /// Seconds before a young swap value is promoted on access
    #[arg(long, default_value = "60")]
    promotion_delay: u64,

    /// Use the flushing cache for the hybrid engine without a data dir
    #[arg(long)]
    hybrid_flushing: bool,

    /// Background flush interval in ms (0 disables it)
    #[arg(long, default_value = "1000")]
    flush_interval_ms: u64,
}

impl Args {
    fn into_config(self) -> Config {
        let sync_strategy = if self.sync_every <= 1 {
            SyncStrategy::EveryWrite
        } else {
            SyncStrategy::EveryNEntries {
                count: self.sync_every,
            }
        };
        let flush_interval =
            (self.flush_interval_ms > 0).then(|| Duration::from_millis(self.flush_interval_ms));

        let mut builder = Config::builder()
            .engine(self.engine)
            .listen_addr(self.listen)
            .shards(self.shards)
            .soft_limit(self.soft_limit_mb * 1024 * 1024)
            .memtable_size_limit(self.memtable_mb * 1024 * 1024)
            .buckets(self.young_buckets, self.old_buckets)
            .bucket_capacity(self.bucket_kb * 1024)
            .allocator_shards(self.allocator_shards)
            .promotion_delay(Duration::from_secs(self.promotion_delay))
            .hybrid_flushing(self.hybrid_flushing)
            .binlog_sync_strategy(sync_strategy)
            .flush_interval(flush_interval);

        if let Some(dir) = self.data_dir {
            builder = builder.data_dir(dir);
        }
        if let Some(path) = self.binlog {
            builder = builder.binlog_path(path);
        }
        builder.build()
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,optikv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let config = Args::parse().into_config();

    tracing::info!("OptiKV Server v{}", optikv::VERSION);
    tracing::info!("Engine: {:?}", config.engine);
    tracing::info!("Listen address: {}", config.listen_addr);

    let db = match Database::open(config.clone()).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Database initialized successfully");

    let barrier = ShutdownBarrier::new();
    let server = match Server::bind(&config.listen_addr, Arc::clone(&db), barrier.clone()).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.listen_addr, e);
            if let Err(e) = db.close().await {
                tracing::error!("Failed to close database: {}", e);
            }
            std::process::exit(1);
        }
    };
    let maintenance = db.spawn_maintenance();

    // Registered in construction order, torn down in reverse
    let mut shutdown = Shutdown::new();
    shutdown.register(Arc::clone(&db));
    shutdown.register(barrier);
    shutdown.register(server.handle());

    let mut server_task = tokio::spawn(server.run());

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
            }
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("Server error: {}", e),
                Err(e) => tracing::error!("Server task failed: {}", e),
            }
        }
    }

    if let Some(task) = maintenance {
        task.abort();
    }

    let exit_code = match shutdown.run().await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("Shutdown incomplete: {}", e);
            1
        }
    };

    tracing::info!("Server stopped");
    std::process::exit(exit_code);
}
