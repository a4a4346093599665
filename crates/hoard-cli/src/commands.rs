use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use colored::Colorize;
use serde_json::json;

use hoard_crypto::ContentHasher;
use hoard_server::{HoardConfig, HoardServer};
use hoard_store::FsObjectStore;
use hoard_types::ContentHash;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args),
        Command::Upload(args) => cmd_upload(&config, args, format),
        Command::Download(args) => cmd_download(&config, args, format),
        Command::Remove(args) => cmd_remove(&config, args, format),
        Command::Hash(args) => cmd_hash(&config, args, format),
    }
}

/// Config file (or defaults), then `HOARD_*` environment overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<HoardConfig> {
    let mut config = match path {
        Some(path) => HoardConfig::load(path)?,
        None => HoardConfig::default(),
    };
    config.apply_env_overrides()?;
    tracing::debug!(?config, "resolved configuration");
    Ok(config)
}

fn open_store(config: &HoardConfig) -> anyhow::Result<FsObjectStore> {
    FsObjectStore::open(config.store.clone())
        .with_context(|| format!("cannot open store at {}", config.store.root.display()))
}

fn parse_hash(raw: &str) -> anyhow::Result<ContentHash> {
    ContentHash::parse(raw).with_context(|| format!("the string '{raw}' isn't a hash"))
}

fn cmd_serve(mut config: HoardConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind
            .parse()
            .with_context(|| format!("invalid bind address {bind:?}"))?;
    }
    if let Some(root) = args.root {
        config.store.root = root;
    }
    println!(
        "Hoard server on {} (root: {})",
        config.server.bind_addr.to_string().bold(),
        config.store.root.display()
    );
    let server = HoardServer::new(config)?;
    let runtime = tokio::runtime::Runtime::new().context("cannot start async runtime")?;
    runtime.block_on(server.serve())?;
    Ok(())
}

fn cmd_upload(config: &HoardConfig, args: UploadArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let hash = store
        .upload_file(&args.path)
        .with_context(|| format!("cannot upload {}", args.path.display()))?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "file_hash": hash })),
        OutputFormat::Text => println!(
            "{} Stored {} as {}",
            "✓".green().bold(),
            args.path.display(),
            hash.as_str().yellow()
        ),
    }
    Ok(())
}

fn cmd_download(config: &HoardConfig, args: DownloadArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let hash = parse_hash(&args.hash)?;
    let (stored, mut source) = store
        .open_object(&hash)
        .with_context(|| format!("cannot download {hash}"))?;
    let output = args.output.unwrap_or_else(|| PathBuf::from(stored.file_name()));
    let mut target =
        File::create(&output).with_context(|| format!("cannot create {}", output.display()))?;
    let bytes = std::io::copy(&mut source, &mut target)
        .with_context(|| format!("cannot write {}", output.display()))?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({ "file_hash": hash, "path": output.display().to_string(), "bytes": bytes })
        ),
        OutputFormat::Text => println!(
            "{} Wrote {} ({} bytes)",
            "✓".green().bold(),
            output.display().to_string().bold(),
            bytes
        ),
    }
    Ok(())
}

fn cmd_remove(config: &HoardConfig, args: RemoveArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let hash = parse_hash(&args.hash)?;
    store
        .remove(&hash)
        .with_context(|| format!("cannot remove {hash}"))?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "removed": hash })),
        OutputFormat::Text => println!("{} Removed {}", "✓".green().bold(), hash.as_str().yellow()),
    }
    Ok(())
}

fn cmd_hash(config: &HoardConfig, args: HashArgs, format: OutputFormat) -> anyhow::Result<()> {
    let hasher = ContentHasher::new(config.store.algorithm);
    let hash = hasher
        .hash_file(&args.path)
        .with_context(|| format!("cannot read {}", args.path.display()))?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({ "file_hash": hash, "algorithm": hasher.algorithm() })
        ),
        OutputFormat::Text => println!("{}  {}", hash.as_str().yellow(), args.path.display()),
    }
    Ok(())
}
