use std::path::{Path, PathBuf};

use anyhow::Context;
use colored::Colorize;
use serde_json::json;
use stow_server::{ServerConfig, StowServer};
use stow_store::{BackendOptions, FileSystemBackend, StorageBackend};
use stow_types::VirtualPath;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    let root = cli.root;
    match cli.command {
        Command::Serve(args) => cmd_serve(args, root).await,
        Command::Put(args) => cmd_put(args, open_backend(root).await?, format).await,
        Command::Get(args) => cmd_get(args, open_backend(root).await?).await,
        Command::Meta(args) => cmd_meta(args, open_backend(root).await?, format).await,
        Command::Exists(args) => cmd_exists(args, open_backend(root).await?, format).await,
    }
}

async fn open_backend(root: Option<PathBuf>) -> anyhow::Result<FileSystemBackend> {
    let root = root.unwrap_or_else(|| ServerConfig::default().store_root);
    FileSystemBackend::open(&root, BackendOptions::default())
        .await
        .with_context(|| format!("cannot open store at {}", root.display()))
}

async fn cmd_serve(args: ServeArgs, root: Option<PathBuf>) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(root) = root {
        config.store_root = root;
    }
    if let Some(limit) = args.max_upload_size {
        config.max_upload_size = limit;
    }
    eprintln!(
        "Stow server on {} (root: {})",
        config.bind_addr.to_string().bold(),
        config.store_root.display()
    );
    StowServer::new(config).serve().await?;
    Ok(())
}

async fn cmd_put(
    args: PutArgs,
    backend: FileSystemBackend,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let path = VirtualPath::parse(&args.path)?;
    let outcome = match &args.file {
        Some(file) => {
            let mut input = tokio::fs::File::open(file)
                .await
                .with_context(|| format!("cannot open {}", file.display()))?;
            backend.store_data(&path, &mut input).await?
        }
        None => backend.store_data(&path, &mut tokio::io::stdin()).await?,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Text => {
            let short = outcome.strong_digest.short_hex();
            if outcome.updated {
                let kind = if outcome.new_file { "new blob" } else { "deduplicated" };
                println!("{} {} {} ({})", "✓".green().bold(), path.to_string().bold(), short.yellow(), kind);
            } else {
                println!("{} {} unchanged", "=".dimmed(), path.to_string().bold());
            }
        }
    }
    Ok(())
}

async fn cmd_get(args: GetArgs, backend: FileSystemBackend) -> anyhow::Result<()> {
    let path = VirtualPath::parse(&args.path)?;
    let outcome = match &args.output {
        Some(file) => {
            let mut sink = tokio::fs::File::create(file)
                .await
                .with_context(|| format!("cannot create {}", file.display()))?;
            let written = async {
                let outcome = backend.retrieve_data(&path, &mut sink).await?;
                sink.sync_all().await?;
                anyhow::Ok(outcome)
            }
            .await;
            if !matches!(&written, Ok(outcome) if outcome.found) {
                drop(sink);
                remove_output(file).await;
            }
            written?
        }
        None => {
            let mut stdout = tokio::io::stdout();
            let outcome = backend.retrieve_data(&path, &mut stdout).await?;
            stdout.flush().await?;
            outcome
        }
    };

    if !outcome.found {
        anyhow::bail!("{} does not exist", path);
    }
    if let (Some(file), Some(digest)) = (&args.output, &outcome.strong_digest) {
        eprintln!("{} {} → {} ({})", "✓".green().bold(), path, file.display(), digest.short_hex().yellow());
    }
    Ok(())
}

async fn remove_output(file: &Path) {
    if let Err(e) = tokio::fs::remove_file(file).await {
        warn!(path = %file.display(), error = %e, "failed to remove output file");
    }
}

async fn cmd_meta(
    args: MetaArgs,
    backend: FileSystemBackend,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let path = VirtualPath::parse(&args.path)?;
    let document = backend.retrieve_meta(&path).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&document)?),
        OutputFormat::Text => {
            if document.is_empty() {
                println!("{} has no history.", path.to_string().bold());
                return Ok(());
            }
            let latest = document.len() - 1;
            for (i, record) in document.iter().enumerate() {
                let marker = if i == latest { "*".green().bold() } else { " ".normal() };
                let when = record
                    .created_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{} v{}  {}  md5:{}  {}",
                    marker,
                    i + 1,
                    record.strong.short_hex().yellow(),
                    record.weak.as_hex().dimmed(),
                    when
                );
            }
        }
    }
    Ok(())
}

async fn cmd_exists(
    args: ExistsArgs,
    backend: FileSystemBackend,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let exists = backend.hash_exists(&args.digest).await?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "exists": exists })),
        OutputFormat::Text if exists => println!("{} stored", "✓".green().bold()),
        OutputFormat::Text => println!("{} not stored", "✗".red().bold()),
    }
    Ok(())
}
