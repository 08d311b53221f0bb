//! Arca worker - one process per stage.

use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use arca_common::logging::{init_logging, LogConfig};
use arca_workers::config::Config;
use arca_workers::context::Context;
use arca_workers::queue::{LocalQueue, Queue};
use arca_workers::stages::delete::DeleteStage;
use arca_workers::stages::dpn::{CopyStage, PackageStage, PeerRecordStage, PeerStoreStage};
use arca_workers::stages::fetch::FetchStage;
use arca_workers::stages::glacier::ColdRestoreStage;
use arca_workers::stages::record::RecordStage;
use arca_workers::stages::restore::RestoreStage;
use arca_workers::stages::store::StoreStage;
use arca_workers::worker::{Stage, StageRunner};

#[derive(Parser)]
#[command(
    name = "arca-workers",
    about = "Arca preservation work stages",
    version
)]
struct Cli {
    /// Path to the worker configuration file (JSON)
    #[arg(long, global = true, default_value = "/etc/arca/workers.json")]
    config: String,

    /// Work-item ids to process directly, bypassing the broker
    #[arg(long = "item", global = true)]
    items: Vec<i64>,

    #[command(subcommand)]
    stage: Option<StageCommand>,
}

#[derive(Subcommand, Clone, Copy)]
enum StageCommand {
    /// Download deposited bags and validate them
    Fetch,
    /// Copy validated files into long-term storage
    Store,
    /// Write objects, files, and events into the registry
    Record,
    /// Initiate and track cold-tier thaw requests
    ColdRestore,
    /// Rebuild bags and deliver them to restore buckets
    Restore,
    /// Delete preserved files on request
    Delete,
    /// Package ingested objects for the peer network
    PeerPackage,
    /// Copy and validate bags arriving from peers
    PeerCopy,
    /// Store validated peer bags
    PeerStore,
    /// Record replication receipts with the peer registry
    PeerRecord,
}

impl StageCommand {
    fn build(self) -> Arc<dyn Stage> {
        match self {
            StageCommand::Fetch => Arc::new(FetchStage),
            StageCommand::Store => Arc::new(StoreStage),
            StageCommand::Record => Arc::new(RecordStage),
            StageCommand::ColdRestore => Arc::new(ColdRestoreStage),
            StageCommand::Restore => Arc::new(RestoreStage),
            StageCommand::Delete => Arc::new(DeleteStage),
            StageCommand::PeerPackage => Arc::new(PackageStage),
            StageCommand::PeerCopy => Arc::new(CopyStage),
            StageCommand::PeerStore => Arc::new(PeerStoreStage),
            StageCommand::PeerRecord => Arc::new(PeerRecordStage),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let Some(command) = cli.stage else {
        eprintln!("Error: a stage subcommand is required");
        eprintln!();
        eprintln!("For more information, try '--help'.");
        process::exit(2);
    };

    let stage = command.build();
    let log_config = LogConfig::from_env()
        .unwrap_or_default()
        .with_prefix(format!("arca-{}", stage.topic()));
    let _ = init_logging(&log_config);

    if let Err(e) = run(&cli, stage).await {
        error!(error = %e, "Worker failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: &Cli, stage: Arc<dyn Stage>) -> arca_workers::Result<()> {
    let config = Config::load(&cli.config)?;
    // Seeded items are published before the runner starts consuming,
    // so the channel must hold all of them.
    let capacity = (config.max_in_flight.max(1) * 2).max(cli.items.len() + 1);
    let queue = LocalQueue::new(capacity);
    let ctx = Context::new(config, queue.clone())?;

    info!(
        topic = stage.topic(),
        node = %ctx.node,
        pid = ctx.pid,
        "Worker starting"
    );

    // Subscribe before seeding so directly-passed items are delivered.
    let receiver = queue.subscribe(stage.topic());
    if !cli.items.is_empty() {
        for id in &cli.items {
            queue.publish(stage.topic(), *id).await?;
        }
        // One-shot run: drain the seeded items, then exit.
        queue.close_topic(stage.topic());
    }

    StageRunner::new(stage, ctx).run(receiver).await;
    Ok(())
}
