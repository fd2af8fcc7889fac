#![forbid(unsafe_code)]

//! Actor entry point: wires configuration, tool probes, storage clients, job
//! input parsing, and the batch driver together. Runs on the hosting platform
//! (environment-injected token and store ids) or locally against a filesystem
//! storage emulation with `--input`.

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vimeo_downloader::batch::run_batch;
use vimeo_downloader::config::{ActorConfig, ConfigOverrides, load_config};
use vimeo_downloader::download::probe_transcoder;
use vimeo_downloader::input::{RawActorInput, parse_input, valid_vimeo_urls};
use vimeo_downloader::processor::ProcessorContext;
use vimeo_downloader::proxy::ProxySelection;
use vimeo_downloader::storage::{Dataset, KeyValueStore};
use vimeo_downloader::ytdlp::YtdlpRunner;

const YTDLP_BINARY: &str = "yt-dlp";
const FFMPEG_BINARY: &str = "ffmpeg";

#[derive(Debug, Parser)]
#[command(
    name = "vimeo-downloader",
    about = "Extracts Vimeo metadata and optionally downloads media to the platform key-value store"
)]
struct ActorArgs {
    /// Read the job input from a local JSON file instead of the input key.
    #[arg(long)]
    input: Option<PathBuf>,
    /// Root directory for the local storage emulation.
    #[arg(long)]
    storage_dir: Option<PathBuf>,
    /// Enable debug logging.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
    /// Only log warnings and errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = ActorArgs::parse();
    init_logging(args.verbose, args.quiet);

    let config = load_config(ConfigOverrides {
        local_storage_dir: args.storage_dir.clone(),
        input_key: None,
    });

    let runner = YtdlpRunner::new(YTDLP_BINARY);
    runner
        .ensure_available()
        .await
        .context("yt-dlp is required")?;
    let transcode = probe_transcoder(FFMPEG_BINARY).await;

    let (store, dataset) = open_storage(&config)?;

    let raw = load_raw_input(&args, &config, &store).await?;
    let input = parse_input(raw);

    if input.urls.is_empty() {
        error!("no URLs provided in input; expected a 'urls' field with a string or list of Vimeo URLs");
        return Ok(());
    }

    info!(
        "download mode: {}, quality: {}, max items: {}",
        input.mode.as_str(),
        input.quality.as_str(),
        input.max_items
    );

    let urls = valid_vimeo_urls(input.urls.clone());
    if urls.is_empty() {
        error!("no valid Vimeo URLs found");
        return Ok(());
    }

    if input.cookies.is_some() {
        info!("cookies provided in input; will use for authenticated downloads");
    } else {
        warn!("no authentication method provided; Vimeo may require login for some videos");
    }

    let proxy = ProxySelection::resolve(&config, input.proxy_configuration.as_ref());

    let ctx = ProcessorContext {
        runner: &runner,
        store: &store,
        public_api_base: &config.public_api_base,
        mode: input.mode,
        quality: input.quality,
        max_items: input.max_items,
        cookies: input.cookies.as_deref(),
        transcode,
    };

    run_batch(&urls, &ctx, &dataset, &proxy).await?;
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vimeo_downloader={default_level},actor={default_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Opens the platform storage clients when the environment carries everything
/// they need; otherwise falls back to the local filesystem emulation.
fn open_storage(config: &ActorConfig) -> Result<(KeyValueStore, Dataset)> {
    if config.is_at_home
        && let (Some(token), Some(store_id), Some(dataset_id)) = (
            &config.token,
            &config.default_key_value_store_id,
            &config.default_dataset_id,
        )
    {
        let client = Client::new();
        let store = KeyValueStore::platform(client.clone(), &config.api_base, token, store_id);
        let dataset = Dataset::platform(client, &config.api_base, token, dataset_id);
        return Ok((store, dataset));
    }

    info!(
        "using local storage emulation at {}",
        config.local_storage_dir.display()
    );
    let store = KeyValueStore::local(&config.local_storage_dir)?;
    let dataset = Dataset::local(&config.local_storage_dir)?;
    Ok((store, dataset))
}

/// Reads the raw job input from `--input` or the configured input key.
/// A missing input degrades to an empty record, which the URL validation
/// then rejects with a clean exit.
async fn load_raw_input(
    args: &ActorArgs,
    config: &ActorConfig,
    store: &KeyValueStore,
) -> Result<RawActorInput> {
    let bytes = if let Some(path) = &args.input {
        fs::read(path).with_context(|| format!("reading input file {}", path.display()))?
    } else {
        match store.get_value(&config.input_key).await? {
            Some(bytes) => bytes,
            None => {
                warn!("no job input found under key {}", config.input_key);
                return Ok(RawActorInput::default());
            }
        }
    };
    serde_json::from_slice(&bytes).context("parsing job input JSON")
}
