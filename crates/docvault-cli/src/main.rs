//! DocVault operator CLI.
//!
//! Reads configuration from the environment (and `.env`). The caller identity
//! used for authorization comes from `--service`, `--user` and `--role`.

use std::path::PathBuf;

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use docvault_cli::{
    build_service, filters_to_map, init_tracing, parse_filter, parse_metadata, request_context,
};
use docvault_core::models::{DocumentType, SearchRequest, SortDirection, SortField};
use docvault_core::{AppError, Config, ErrorMetadata};
use docvault_db::setup_database;
use docvault_services::{UploadedFile, VirusScanClient};
use serde::Serialize;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "docvault", about = "DocVault document management CLI")]
struct Cli {
    /// Calling service name; defaults to SERVICE_NAME
    #[arg(long, env = "DOCVAULT_SERVICE", global = true)]
    service: Option<String>,
    /// End user the call is made for
    #[arg(long, env = "DOCVAULT_USER", global = true)]
    user: Option<String>,
    /// Role grants, comma-separated or repeated
    #[arg(long = "role", env = "DOCVAULT_ROLES", value_delimiter = ',', global = true)]
    roles: Vec<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Check that the virus scanner answers
    Ping,
    /// Scan a local file without storing it
    Scan {
        file: PathBuf,
    },
    /// Scan and store a document
    Upload {
        file: PathBuf,
        #[arg(long = "type")]
        document_type: DocumentType,
        /// Document UUID; generated when omitted
        #[arg(long)]
        uuid: Option<Uuid>,
        #[arg(long, default_value = "application/octet-stream")]
        mime_type: String,
        /// Metadata as a JSON object
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Show a document
    Get {
        uuid: Uuid,
    },
    /// Write a document's bytes to a file
    Download {
        uuid: Uuid,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Replace a document's metadata
    ReplaceMetadata {
        uuid: Uuid,
        /// New metadata as a JSON object
        metadata: String,
    },
    /// Soft-delete a document
    Delete {
        uuid: Uuid,
    },
    /// Show superseded metadata, most recent first
    History {
        uuid: Uuid,
    },
    /// Search documents by type and metadata
    Search {
        #[arg(long = "type")]
        document_type: Option<DocumentType>,
        /// Metadata filter as key=value; repeatable
        #[arg(long = "meta", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
        #[arg(long, default_value = "0")]
        page: u32,
        #[arg(long, default_value = "20")]
        page_size: u32,
        #[arg(long, default_value = "created_at")]
        order_by: SortField,
        #[arg(long, default_value = "desc")]
        direction: SortDirection,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

fn report(err: &AppError) {
    tracing::debug!(
        error_type = err.error_type(),
        details = %err.detailed_message(),
        "Command failed"
    );
    eprintln!(
        "{} ({}): {}",
        err.error_code(),
        err.http_status_code(),
        err.client_message()
    );
    if let Some(action) = err.suggested_action() {
        eprintln!("hint: {}", action);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    match run(cli, &config).await {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<AppError>() {
            Some(app_error) => {
                report(app_error);
                std::process::exit(1);
            }
            None => Err(e),
        },
    }
}

async fn run(cli: Cli, config: &Config) -> anyhow::Result<()> {
    let service_name = cli
        .service
        .clone()
        .unwrap_or_else(|| config.service_name().to_string());
    let context = request_context(&service_name, cli.user.as_deref(), &cli.roles);

    match &cli.command {
        Commands::Ping => {
            let alive = VirusScanClient::from_config(config).ping().await;
            print_json(&serde_json::json!({ "alive": alive }))?;
            return Ok(());
        }
        Commands::Scan { file } => {
            let handle = tokio::fs::File::open(file)
                .await
                .with_context(|| format!("Failed to open {}", file.display()))?;
            let outcome = VirusScanClient::from_config(config).scan(handle).await?;
            print_json(&serde_json::json!({
                "status": format!("{:?}", outcome.status).to_lowercase(),
                "signature": outcome.signature,
                "reply": outcome.reply,
            }))?;
            return Ok(());
        }
        Commands::Migrate => {
            setup_database(config).await?;
            tracing::info!("Schema is up to date");
            return Ok(());
        }
        _ => {}
    }

    let pool = setup_database(config).await?;
    let service = build_service(config, pool).await?;

    match cli.command {
        Commands::Upload {
            file,
            document_type,
            uuid,
            mime_type,
            metadata,
        } => {
            let content = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let filename = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .with_context(|| format!("{} does not name a file", file.display()))?;
            let upload = UploadedFile {
                filename,
                mime_type,
                content: Bytes::from(content),
            };
            let document = service
                .upload(
                    &context,
                    document_type,
                    uuid.unwrap_or_else(Uuid::new_v4),
                    upload,
                    parse_metadata(metadata.as_deref())?,
                )
                .await?;
            print_json(&document)?;
        }
        Commands::Get { uuid } => {
            print_json(&service.get(&context, uuid).await?)?;
        }
        Commands::Download { uuid, output } => {
            let (document, content) = service.download(&context, uuid).await?;
            tokio::fs::write(&output, &content)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            print_json(&serde_json::json!({
                "uuid": document.uuid,
                "filename": document.file.filename,
                "bytes": content.len(),
                "output": output.display().to_string(),
            }))?;
        }
        Commands::ReplaceMetadata { uuid, metadata } => {
            let document = service
                .replace_metadata(&context, uuid, parse_metadata(Some(&metadata))?)
                .await?;
            print_json(&document)?;
        }
        Commands::Delete { uuid } => {
            service.delete(&context, uuid).await?;
            print_json(&serde_json::json!({ "success": true }))?;
        }
        Commands::History { uuid } => {
            print_json(&service.history(&context, uuid).await?)?;
        }
        Commands::Search {
            document_type,
            filters,
            page,
            page_size,
            order_by,
            direction,
        } => {
            let request = SearchRequest {
                document_type,
                metadata: filters_to_map(&filters),
                page,
                page_size,
                order_by,
                direction,
            };
            print_json(&service.search(&context, &request).await?)?;
        }
        Commands::Migrate | Commands::Ping | Commands::Scan { .. } => {}
    }

    Ok(())
}
