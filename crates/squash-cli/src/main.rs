//! Squash CLI: compress images and PDFs to a size budget on the local
//! staging directories.
//!
//! Configuration comes from SQUASH_* environment variables (or `.env`).

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use squash_cli::{content_type_for, init_tracing};
use squash_core::{ArtifactId, CompressionRequest, Config};
use squash_services::{init_services, Services};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "squash", about = "Size-targeted image and PDF compression")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file and register the output artifact
    Compress {
        /// Path to the image or PDF
        file: PathBuf,
        /// Target size in kilobytes
        #[arg(long)]
        target_kb: Option<u64>,
        /// Override the content type guessed from the extension
        #[arg(long)]
        content_type: Option<String>,
        /// Deliver the output straight to this path
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Deliver an output artifact once and delete it
    Deliver {
        /// Output artifact ID
        id: String,
        /// Where to write the bytes
        #[arg(long)]
        out: PathBuf,
    },
    /// Run a single reaper sweep
    Reap,
    /// Run the reaper loop until interrupted
    Reaper,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

async fn deliver_to(services: &Services, id: &ArtifactId, out: &Path) -> anyhow::Result<()> {
    let size_bytes = services
        .lifecycle
        .deliver_with(id, |data| async move {
            tokio::fs::write(out, &data)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))
        })
        .await?;
    tracing::info!(path = %out.display(), size_bytes, "Output written");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let services = init_services(&config).await?;

    match cli.command {
        Commands::Compress {
            file,
            target_kb,
            content_type,
            out,
        } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let content_type =
                content_type.unwrap_or_else(|| content_type_for(&file).to_string());

            let mut request = CompressionRequest::new(data, content_type);
            if let Some(name) = file.file_name().and_then(|n| n.to_str()) {
                request = request.with_filename(name);
            }
            if let Some(kb) = target_kb {
                request = request.with_target_kb(kb)?;
            }

            let result = services.lifecycle.compress(request).await?;
            if let Some(out) = out {
                deliver_to(&services, &result.output_artifact_id, &out).await?;
            }
            print_json(&result)?;
        }
        Commands::Deliver { id, out } => {
            let id = ArtifactId::parse(&id)?;
            deliver_to(&services, &id, &out).await?;
        }
        Commands::Reap => {
            let report = services.reaper.sweep().await;
            print_json(&report)?;
        }
        Commands::Reaper => {
            let handle = services.reaper.clone().start();
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutdown signal received");
            handle.shutdown().await;
        }
    }

    Ok(())
}
