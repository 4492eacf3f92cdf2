mod probe;
mod reader;
mod resolver;

use std::{sync::OnceLock, time::Duration};

use anyhow::Context;
use capture_engine::{CaptureConfig, CaptureEngine, StreamSource};
use clap::Parser;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};
use violation_notifier::{Credentials, SenderConfig, ViolationRecord, ViolationSender};

use crate::{probe::HttpBandwidthProbe, reader::HttpFrameReader, resolver::HlsVariantResolver};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Stream URL to capture frames from
    #[arg(short, long)]
    url: String,

    /// Seconds between emitted frames
    #[arg(short, long, default_value_t = 15)]
    interval: u64,

    /// URL of a test object for the bandwidth probe
    #[arg(long)]
    probe_url: Option<String>,

    /// Violation API base URL; when set, captured frames are uploaded
    #[arg(long)]
    api_url: Option<String>,

    /// Site identifier attached to uploads
    #[arg(long, default_value = "default")]
    site: String,

    /// Stream name attached to uploads
    #[arg(long, default_value = "camera")]
    stream_name: String,

    /// Violation API username
    #[arg(long, env = "SITEWATCH_USERNAME", default_value = "")]
    username: String,

    /// Violation API password
    #[arg(long, env = "SITEWATCH_PASSWORD", default_value = "")]
    password: String,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);
    run(args).await
}

fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

async fn run(args: Args) -> anyhow::Result<()> {
    install_rustls_provider();

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("failed to build HTTP client")?;

    let probe_url = args
        .probe_url
        .clone()
        .unwrap_or_else(|| args.url.clone());

    let sender = match &args.api_url {
        Some(api_url) => {
            let credentials = Credentials {
                username: args.username.clone(),
                password: args.password.clone(),
            };
            let config = SenderConfig::new(credentials).with_api_url(api_url);
            Some(ViolationSender::new(config).context("failed to build violation sender")?)
        }
        None => None,
    };

    let engine = CaptureEngine::new(
        HttpFrameReader::new(client.clone()),
        HlsVariantResolver::new(client.clone()),
        HttpBandwidthProbe::new(client, probe_url),
        StreamSource::new(&args.url),
        CaptureConfig::with_interval(Duration::from_secs(args.interval)),
    );

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            shutdown.cancel();
        }
    });

    info!(url = %args.url, interval_secs = args.interval, "starting capture");
    let mut frames = engine.into_stream(token);

    while let Some(captured) = frames.next().await {
        info!(
            bytes = captured.frame.len(),
            at = %captured.captured_at,
            "frame captured"
        );

        if let Some(sender) = &sender {
            let record = ViolationRecord::new(&args.site, &args.stream_name, captured.frame)
                .detection_time(captured.captured_at);
            match sender.send(&record).await {
                Ok(Some(id)) => info!(violation_id = %id, "frame uploaded"),
                Ok(None) => info!("frame uploaded"),
                Err(err) => error!(error = %err, "frame upload failed"),
            }
        }
    }

    warn!("capture stream ended");
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}
