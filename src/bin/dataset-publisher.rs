//! Dataset Publisher CLI
//!
//! Releases the draft version of a dataset held in a local JSON store

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dataset_publisher::adapters::{InMemoryStore, LoggingNotificationSink, RecordingIndexer};
use dataset_publisher::{
    ConfigLoadOptions, ConfigLoader, DOI_PROVIDER_SETTING, DatasetPublisher, PublishConfig,
    PublishError, PublishServices, VersionNumber, VersioningPolicy,
};
use log::debug;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// Dataset publication command line
#[derive(Parser)]
#[command(name = "dataset-publisher")]
#[command(version = "0.1.0")]
#[command(about = "Release draft dataset versions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Release the draft version of a dataset
    Publish {
        /// JSON store holding datasets, collections and role assignments
        #[arg(long, value_name = "FILE")]
        store: PathBuf,

        /// Dataset id
        #[arg(short, long)]
        dataset: u64,

        /// Releasing user (`@alice` or `alice`)
        #[arg(short, long)]
        user: String,

        /// Minor instead of major release
        #[arg(long)]
        minor: bool,

        /// Override the :DoiProvider setting (EZID, DataCite, none)
        #[arg(long)]
        doi_provider: Option<String>,

        /// Directory holding .dataset-publisher.yaml
        #[arg(long, value_name = "PATH")]
        project_path: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether a dataset can be released, without changing anything
    Check {
        #[arg(long, value_name = "FILE")]
        store: PathBuf,

        #[arg(short, long)]
        dataset: u64,

        #[arg(long)]
        minor: bool,

        #[arg(long, value_name = "PATH")]
        project_path: Option<PathBuf>,
    },

    /// Print the version number the next release would get
    NextVersion {
        /// Major number of the last released version
        #[arg(long, default_value = "0")]
        major: u64,

        /// Minor number of the last released version
        #[arg(long, default_value = "0")]
        minor: u64,

        /// The dataset has never been published
        #[arg(long)]
        first: bool,

        /// Minor instead of major release
        #[arg(long)]
        minor_release: bool,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run().await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Publish {
            store,
            dataset,
            user,
            minor,
            doi_provider,
            project_path,
            json,
        } => {
            let path = project_path.unwrap_or_else(|| PathBuf::from("."));
            publish_command(store, dataset, user, minor, doi_provider, path, json).await
        }
        Commands::Check {
            store,
            dataset,
            minor,
            project_path,
        } => {
            let path = project_path.unwrap_or_else(|| PathBuf::from("."));
            check_command(store, dataset, minor, path).await
        }
        Commands::NextVersion {
            major,
            minor,
            first,
            minor_release,
        } => {
            let version: VersionNumber = VersioningPolicy::new()
                .next(major, minor, !first, minor_release)
                .into();
            println!("{}", version);
            Ok(0)
        }
    }
}

async fn load_config(project_path: PathBuf, doi_provider: Option<String>) -> Result<PublishConfig> {
    let mut options = ConfigLoadOptions::from_environment(project_path);
    if let Some(provider) = doi_provider {
        let mut overrides = PublishConfig::default();
        overrides
            .settings
            .insert(DOI_PROVIDER_SETTING.to_string(), provider);
        options.cli_args = Some(overrides);
    }

    let config = ConfigLoader::load(options)
        .await
        .context("failed to load configuration")?;
    debug!("Loaded configuration: {:?}", config);
    Ok(config)
}

fn build_publisher(config: &PublishConfig, store: Arc<InMemoryStore>) -> Result<DatasetPublisher> {
    let services = PublishServices::local(
        config,
        store,
        Arc::new(RecordingIndexer::new()),
        Arc::new(LoggingNotificationSink::new()),
    )?;
    Ok(DatasetPublisher::new(services))
}

async fn publish_command(
    store_path: PathBuf,
    dataset_id: u64,
    user: String,
    minor: bool,
    doi_provider: Option<String>,
    project_path: PathBuf,
    json: bool,
) -> Result<i32> {
    println!("\n📦 dataset-publisher\n");

    let config = load_config(project_path, doi_provider).await?;
    let store = Arc::new(
        InMemoryStore::load_json(&store_path)
            .await
            .with_context(|| format!("failed to load store {}", store_path.display()))?,
    );
    let publisher = build_publisher(&config, store.clone())?;

    let result = publisher.publish_by_id(dataset_id, &user, minor).await;

    // Written back after rejections too: identifier sequence counters may have advanced
    store
        .save_json(&store_path)
        .await
        .with_context(|| format!("failed to save store {}", store_path.display()))?;

    match result {
        Ok((_, report)) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.summary());
                println!("\n✅ Publishing completed successfully!");
            }
            Ok(0)
        }
        Err(e) => {
            print_error(&e);
            Ok(if e.is_partial_state() { 2 } else { 1 })
        }
    }
}

async fn check_command(
    store_path: PathBuf,
    dataset_id: u64,
    minor: bool,
    project_path: PathBuf,
) -> Result<i32> {
    println!("\n🔍 Dataset Check\n");

    let config = load_config(project_path, None).await?;
    let store = Arc::new(
        InMemoryStore::load_json(&store_path)
            .await
            .with_context(|| format!("failed to load store {}", store_path.display()))?,
    );
    let Some(dataset) = store.snapshot().await.datasets.into_iter().find(|d| d.id == dataset_id)
    else {
        bail!("dataset {} not found in {}", dataset_id, store_path.display());
    };
    let publisher = build_publisher(&config, store)?;

    match publisher.check(&dataset, minor).await {
        Ok(()) => {
            println!("✅ {} can be released", dataset.label());
            Ok(0)
        }
        Err(e) => {
            print_error(&e);
            Ok(1)
        }
    }
}

fn print_error(error: &PublishError) {
    if error.is_partial_state() {
        eprintln!("\n⚠️  Published with errors [{}]", error.code());
    } else {
        eprintln!("\n❌ Publishing failed [{}]", error.code());
    }
    eprintln!("{}", error);
    for action in error.suggested_actions() {
        eprintln!("  - {}", action);
    }
}
