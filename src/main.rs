use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use feedly_sync::annotations::sync_annotations;
use feedly_sync::checkpoint::{self, CheckpointStore, SqliteCheckpointStore};
use feedly_sync::config::{self, Config};
use feedly_sync::export::{clean_archives, export_articles};
use feedly_sync::feedly::FeedlyClient;
use feedly_sync::store::FsDocumentStore;
use feedly_sync::Error;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Pull new highlights and comments into notes; resumes an interrupted run
    Sync,
    /// Bundle unread and saved articles into an EPUB in the vault
    Export,
    /// Move previously exported archives to the vault trash
    Clean,
    /// Print the stored sync checkpoint
    Status,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;
    let documents = FsDocumentStore::new(cfg.vault_path());

    match args.command {
        Command::Sync => {
            let checkpoints = open_checkpoints(&cfg).await?;
            let feedly = FeedlyClient::from_config(&cfg)?;
            let result =
                sync_annotations(&cfg, &feedly, &checkpoints, &documents, Utc::now()).await;
            match result {
                Ok(report) => {
                    info!(
                        entries = report.entries_processed,
                        pages = report.pages,
                        created = report.documents_created,
                        "annotation sync finished"
                    );
                    println!("{}", report.notice());
                    Ok(exit_code(report.is_complete()))
                }
                Err(err) => Ok(report_failure(err)),
            }
        }
        Command::Export => {
            let feedly = FeedlyClient::from_config(&cfg)?;
            match export_articles(&cfg, &feedly, &documents, Utc::now()).await {
                Ok(report) => {
                    println!("{}", report.notice());
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => Ok(report_failure(err)),
            }
        }
        Command::Clean => {
            let removed = clean_archives(&documents).await?;
            println!("Moved {removed} exported archives to the trash");
            Ok(ExitCode::SUCCESS)
        }
        Command::Status => {
            let checkpoints = open_checkpoints(&cfg).await?;
            let cp = checkpoints.load().await?;
            let fmt = |t: Option<chrono::DateTime<Utc>>| {
                t.map(|t| t.to_rfc3339()).unwrap_or_else(|| "never".to_string())
            };
            println!("last sync:       {}", fmt(cp.last_sync));
            println!("in-flight since: {}", fmt(cp.continuation_time));
            println!(
                "resuming:        {}",
                if cp.is_resuming() { "yes" } else { "no" }
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn open_checkpoints(cfg: &Config) -> Result<SqliteCheckpointStore> {
    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        format!("sqlite://{}/feedly-sync.db", cfg.data_path().display())
    });
    let pool = checkpoint::init_pool(&database_url).await?;
    checkpoint::run_migrations(&pool).await?;
    Ok(SqliteCheckpointStore::new(pool))
}

/// Print one notice for a command that stopped early.
fn report_failure(err: Error) -> ExitCode {
    let notice = match &err {
        Error::ConfigMissing => err.to_string(),
        Error::AuthExpired => {
            "Feedly access token expired. Update feedly.access_token and try again.".to_string()
        }
        Error::RateLimited => "Feedly rate limit reached. Try again later.".to_string(),
        other => format!("Command failed: {other}"),
    };
    error!(error = %err, "command stopped");
    println!("{notice}");
    ExitCode::FAILURE
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
