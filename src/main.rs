use anyhow::Result;
use clap::Parser;
use dropzone_uploader::controller::{BatchController, DispatchMode};
use dropzone_uploader::models::{Config, DroppedFile};
use dropzone_uploader::upload::CloudinaryClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "dropzone-uploader")]
#[command(about = "Upload a batch of images and print their preview URLs")]
struct CliArgs {
    /// Image files, uploaded as one batch.
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Upload this many files at once instead of one after another.
    #[arg(long, value_parser = parse_concurrency)]
    concurrency: Option<usize>,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,
}

fn parse_concurrency(input: &str) -> std::result::Result<usize, String> {
    match input.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!(
            "Invalid concurrency '{}'. Expected a positive integer",
            input
        )),
    }
}

async fn run(args: CliArgs) -> Result<bool> {
    let config = Config::from_env()?;
    let client = CloudinaryClient::new(&config)?;
    let mode = DispatchMode::from_concurrency(args.concurrency.or(config.concurrency));

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        files.push(DroppedFile::from_path(path).await?);
    }

    let mut controller = BatchController::new(Arc::new(client), mode);
    let handle = controller.drop_files(files);

    tokio::select! {
        _ = handle.wait() => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling remaining uploads");
            controller.teardown();
        }
    }

    let snapshot = controller.snapshot();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot.results)?);
    } else {
        for result in &snapshot.results {
            println!("{}\t{}", result.file_name, result.preview_url);
        }
    }

    info!(
        "{} uploaded, {} failed",
        snapshot.results.len(),
        snapshot.failures.len()
    );
    Ok(snapshot.failures.is_empty() && !snapshot.is_uploading())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dropzone_uploader=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    match run(args).await {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Upload failed: {}", e);
            std::process::exit(1);
        }
    }
}
