mod config;
mod server;

use clap::{Parser, Subcommand};
use config::Config;
use dataputter_core::{
    run_write_node, ChunkStore, MetadataStore, PutterError, RouterClient, WriteNodeState,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "dataputter")]
#[command(about = "Small object store for trusted private networks")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the router: ingest, object read, and ticket read listeners
    Router,
    /// Run a write node
    WriteNode,
    /// Run a write node and the router in one process
    StandAlone,
    /// Upload a file through the router and print its ObjectID
    Put { file: PathBuf },
    /// Read an object to stdout
    Get { object_id: String },
    /// Delete an object
    Delete { object_id: String },
    /// Ingest a fixed payload and read it back
    Loopback,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dataputter=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            std::process::exit(1);
        }
    };

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("Failed to load config: {}", error);
            std::process::exit(1);
        }
    };

    if let Err(error) = run(cli.command, config).await {
        tracing::error!("{}", error);
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: Config) -> dataputter_core::Result<()> {
    match command {
        Commands::Router => {
            let metadata = MetadataStore::connect(&config.metadata.url()).await?;
            server::run_router(config, metadata).await
        }
        Commands::WriteNode => {
            let state = write_node_state(&config)?;
            run_write_node(&config.write_node.bind_addr, state).await
        }
        Commands::StandAlone => {
            let metadata = MetadataStore::connect(&config.metadata.url()).await?;
            let state = write_node_state(&config)?;
            let bind_addr = config.write_node.bind_addr.clone();
            tokio::select! {
                result = run_write_node(&bind_addr, state) => result,
                result = server::run_router(config, metadata) => result,
            }
        }
        Commands::Put { file } => {
            let payload = tokio::fs::read(&file).await?;
            let object_id = router_client(&config).put(&payload).await?;
            println!("{}", object_id);
            Ok(())
        }
        Commands::Get { object_id } => {
            let body = router_client(&config).read(&object_id).await?;
            use std::io::Write;
            std::io::stdout().write_all(&body)?;
            Ok(())
        }
        Commands::Delete { object_id } => {
            let token = config.router.delete_token_bytes()?;
            let deleted = router_client(&config).delete(&object_id, &token).await?;
            println!("{}", deleted);
            Ok(())
        }
        Commands::Loopback => {
            let client = router_client(&config);
            let payload = b"So much data to write";

            let object_id = client.put(payload).await?;
            let echoed = client.read(&object_id).await?;
            if echoed.as_ref() != payload {
                return Err(PutterError::Internal(
                    "loopback payload mismatch".to_string(),
                ));
            }

            tracing::info!(
                "Loopback object {} round-tripped {} bytes",
                object_id,
                payload.len()
            );
            println!("{}", object_id);
            Ok(())
        }
    }
}

fn write_node_state(config: &Config) -> dataputter_core::Result<Arc<WriteNodeState>> {
    Ok(Arc::new(WriteNodeState {
        chunk_store: ChunkStore::new(&config.write_node.data_root)?,
        node_id: config.write_node.node_id(),
    }))
}

fn router_client(config: &Config) -> RouterClient {
    RouterClient::new(
        config.router.ingest_bind.clone(),
        config.router.object_read_bind.clone(),
        config.router.ticket_read_bind.clone(),
    )
}
