use clap::{Parser, Subcommand};
use pocketq::backend::http::HttpBackend;
use pocketq::config::Config;
use pocketq::orchestrator::local::{LocalCompute, PocketGeometry};
use pocketq::orchestrator::poller::Poller;
use pocketq::orchestrator::submission::{InvalidInput, SubmissionService, SubmitOutcome};
use pocketq::store::file::FileTaskStore;
use pocketq::store::{CollectionKey, PredictionId, TaskStore};
use pocketq::tasks::fingerprint::fingerprint;
use pocketq::tasks::record::{TaskKind, TaskRecord, TaskStatus};
use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use chrono::DateTime;
use clap::ValueEnum;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Prediction database name
    #[arg(long, global = true, default_value = "v3")]
    database: String,

    /// Prediction identifier
    #[arg(long, global = true, default_value = "")]
    id: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Docking,
    Tunnels,
    Volume,
}

impl From<KindArg> for TaskKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Docking => TaskKind::Docking,
            KindArg::Tunnels => TaskKind::Tunnels,
            KindArg::Volume => TaskKind::Volume,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a task to the remote worker pool
    Submit {
        /// Task kind
        #[arg(long, value_enum)]
        kind: KindArg,

        /// 1-based pocket rank
        #[arg(long)]
        pocket: u32,

        /// Task parameters in order (e.g. SMILES, exhaustiveness)
        #[arg(long, short = 'p')]
        param: Vec<String>,

        /// User-facing task name
        #[arg(long, default_value = "")]
        name: String,
    },

    /// Poll the backend until every server task is terminal
    Watch,

    /// Print all stored task records for the prediction
    List,

    /// Delete one record by its creation timestamp (RFC 3339)
    Remove {
        #[arg(long)]
        created: String,

        /// Remove from the client collection instead of the server one
        #[arg(long)]
        client: bool,
    },

    /// Run a client-side computation (e.g. pocket volume)
    Compute {
        #[arg(long, value_enum)]
        kind: KindArg,

        #[arg(long)]
        pocket: u32,

        /// Atom radii of the pocket, in Angstroms
        #[arg(long, short = 'r')]
        radius: Vec<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_yaml_file(path)?,
        None => Config::default(),
    };

    let prediction = PredictionId::new(cli.database.clone(), cli.id.clone());
    let store = Arc::new(FileTaskStore::new(&config.store_root));
    let backend = Arc::new(HttpBackend::new(config.base_url.clone()));

    match cli.command {
        Commands::Submit {
            kind,
            pocket,
            param,
            name,
        } => {
            let service = SubmissionService::new(store, backend).with_invalid_input_sink(
                Box::new(|input: InvalidInput| {
                    eprintln!("{}", input.message);
                    if let Some(command) = input.local_command {
                        eprintln!("Run locally instead:\n  {}", command);
                    }
                }),
            );

            let outcome = service
                .submit(
                    &prediction,
                    kind.into(),
                    &param,
                    &name,
                    pocket.saturating_sub(1),
                )
                .await?;
            if outcome == SubmitOutcome::Submitted {
                info!("Task submitted; run `pocketq watch` to follow it");
            }
        }

        Commands::Watch => {
            let key = CollectionKey::server(&prediction);
            if all_terminal(&*store, &key).await? {
                info!("All server tasks already terminal");
                return Ok(());
            }

            let poller = Poller::new(store.clone(), backend, prediction.clone())
                .with_interval(Duration::from_secs(config.poll_interval_secs));
            let mut handle = poller.spawn();

            info!("Polling every {}s (Ctrl+C to stop)", config.poll_interval_secs);
            while handle.changed().await.is_some() {
                print_records(&store.load(&key).await?);
                if all_terminal(&*store, &key).await? {
                    info!("All server tasks terminal");
                    handle.stop();
                    break;
                }
            }
        }

        Commands::List => {
            let server = store.load(&CollectionKey::server(&prediction)).await?;
            let client = store.load(&CollectionKey::client(&prediction)).await?;
            print_records(&server);
            print_records(&client);

            // Failed tasks keep no payload; point at the diagnostic log.
            for record in server.iter().filter_map(|r| r.as_server()) {
                if record.status == TaskStatus::Failed {
                    let hash = fingerprint(record.kind, record.pocket, &record.params);
                    println!(
                        "log for failed {} (pocket {}): {}",
                        record.kind.label(),
                        record.pocket,
                        backend.log_url(&prediction, record.kind, &hash)
                    );
                }
            }
        }

        Commands::Remove { created, client } => {
            let created = DateTime::parse_from_rfc3339(&created)?.to_utc();
            let key = if client {
                CollectionKey::client(&prediction)
            } else {
                CollectionKey::server(&prediction)
            };
            store.remove(&key, created).await?;
        }

        Commands::Compute {
            kind,
            pocket,
            radius,
        } => {
            let compute = LocalCompute::new(store);
            let geometry = PocketGeometry { atom_radii: radius };
            let value = compute
                .compute(&prediction, kind.into(), pocket.saturating_sub(1), &geometry)
                .await?;
            println!("{}", value);
        }
    }

    Ok(())
}

async fn all_terminal(store: &FileTaskStore, key: &CollectionKey) -> Result<bool> {
    let records = store.load(key).await?;
    Ok(records
        .iter()
        .filter_map(|r| r.as_server())
        .all(|r| r.status.is_terminal()))
}

fn print_records(records: &[TaskRecord]) {
    for record in records {
        match record {
            TaskRecord::Server(r) => println!(
                "{}\t{}\tpocket {}\t{}\t{}",
                r.created,
                r.kind.label(),
                r.pocket,
                r.name,
                r.display_status()
            ),
            TaskRecord::Client(r) => println!(
                "{}\t{}\tpocket {}\t{}",
                r.created,
                r.kind.label(),
                r.pocket,
                r.value
            ),
        }
    }
}
