use facevote::{
    common::{Config, DevMode},
    core::OnnxComparator,
    service::VoteServer,
    storage::VoterStore,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "facevote")]
#[command(about = "Face-verified voter check-in service")]
struct Cli {
    /// Enable development mode (keeps all data under ./dev_data)
    #[arg(long, global = true)]
    dev: bool,

    /// Config file (default: configs/facevote.toml, then /etc/facevote/facevote.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve,
    /// Create the voter database and enroll every photo in a folder
    InitDb {
        /// Folder of `<voter_id>.jpg` photos, relative to the photo root
        #[arg(short, long, default_value = "stored_photos")]
        photos: PathBuf,
    },
    /// Enroll a single voter
    Enroll {
        #[arg(short, long)]
        voter_id: String,
        /// Reference photo, relative to the photo root
        #[arg(short, long)]
        photo: PathBuf,
    },
    /// List every voter and whether they have voted
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.dev);

    let dev_mode = DevMode::new(cli.dev)?;
    let mut config = Config::load(cli.config.as_deref())?;
    dev_mode.apply(&mut config);
    if dev_mode.is_enabled() {
        tracing::info!(
            "Dev mode: database {}, photo root {}",
            config.storage.database_path.display(),
            config.storage.photo_root.display()
        );
    }

    match cli.command {
        Commands::Serve => serve(config)?,
        Commands::InitDb { photos } => {
            let store = open_store(&config)?;
            println!("Initializing database at {}...", store.db_path().display());

            let summary = store.enroll_directory(&photos)?;
            if summary.added > 0 {
                println!("✅ Database initialized/updated with {} new voters.", summary.added);
            } else {
                println!("ℹ️ No new voters added. Database may already be up to date.");
            }
            if summary.existing > 0 {
                println!("   {} voter(s) were already enrolled.", summary.existing);
            }
        }
        Commands::Enroll { voter_id, photo } => {
            let store = open_store(&config)?;
            let stored_path = store.relative_to_root(&photo)?;

            if store.register(&voter_id, &stored_path)? {
                println!("➕ Added voter: {} with photo {}", voter_id, stored_path);
            } else {
                println!("ℹ️ Voter {} already exists. Skipping.", voter_id);
            }
        }
        Commands::List => {
            let store = open_store(&config)?;
            let voters = store.list()?;

            if voters.is_empty() {
                println!("No voters found in the database.");
            }
            for voter in voters {
                println!(
                    "Voter ID: {}, Photo Path: {}, Has Voted: {}",
                    voter.voter_id, voter.reference_photo_path, voter.has_voted
                );
            }
        }
    }

    Ok(())
}

fn serve(config: Config) -> Result<()> {
    tracing::info!("Starting facevote service");

    let comparator = OnnxComparator::new(&config).context("Failed to load face models")?;
    let server = VoteServer::new(config, Arc::new(comparator))?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(server.run())?;
    Ok(())
}

fn open_store(config: &Config) -> Result<VoterStore> {
    let store = VoterStore::open(
        config.storage.database_path.clone(),
        config.storage.photo_root.clone(),
    )?;
    Ok(store)
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }
}
