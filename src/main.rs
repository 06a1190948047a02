use clap::{Args, Parser, Subcommand};
use futures_util::{FutureExt, Stream, StreamExt};
use std::path::{Path, PathBuf};
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lutwatch::error::ConfigError;
use lutwatch::lattice_lut::DitherMode;
use lutwatch::models::AppConfig;
use lutwatch::services::lut_cache::is_lut_file;
use lutwatch::services::{load_lut, DirectoryWatcher, Orchestrator, PipelineEvent};

#[derive(Parser)]
#[command(name = "lutwatch")]
#[command(about = "Apply 3D LUT color grades to photos as they arrive")]
struct Cli {
    /// YAML configuration file (falls back to LUTWATCH_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory and grade every image that arrives, until Ctrl-C
    Watch {
        /// Directory to watch for new images
        #[arg(short, long)]
        watch_dir: Option<PathBuf>,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Grade the given images one after another
    Process {
        #[command(flatten)]
        run: RunArgs,

        /// Images to process, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Parse a LUT file and print a few sample lookups
    Inspect {
        /// LUT file (.cube)
        lut: PathBuf,
    },
}

/// Run parameters that override the configuration file.
#[derive(Args)]
struct RunArgs {
    /// Directory processed images are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// LUT file to apply
    #[arg(short, long)]
    lut: Option<PathBuf>,

    /// Blend strength 0-100
    #[arg(short, long)]
    strength: Option<u8>,

    /// JPEG quality 1-100
    #[arg(short, long)]
    quality: Option<u8>,

    /// Dither mode: none, floyd or random
    #[arg(short, long)]
    dither: Option<DitherMode>,
}

impl RunArgs {
    fn apply(self, config: &mut AppConfig) {
        if let Some(dir) = self.output_dir {
            config.output_dir = Some(dir);
        }
        if let Some(lut) = self.lut {
            config.lut = Some(lut);
        }
        if let Some(strength) = self.strength {
            config.strength = strength;
        }
        if let Some(quality) = self.quality {
            config.quality = quality;
        }
        if let Some(dither) = self.dither {
            config.dither = dither;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { watch_dir, run } => {
            run_watch_command(cli.config.as_deref(), watch_dir, run).await
        }
        Commands::Process { run, files } => {
            run_process_command(cli.config.as_deref(), run, files).await
        }
        Commands::Inspect { lut } => run_inspect_command(&lut).await,
    }
}

fn init_tracing() {
    // stdout carries the event stream, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lutwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load the configuration file, apply overrides and set up an orchestrator.
async fn prepare(config_path: Option<&Path>, run: RunArgs) -> anyhow::Result<(AppConfig, Orchestrator)> {
    let mut config = AppConfig::load_or_default(config_path)?;
    run.apply(&mut config);
    warn_unusual_lut(config.lut.as_deref());

    let orchestrator = Orchestrator::new(config.pipeline_settings());
    orchestrator.configure(config.run_config()?).await?;
    Ok((config, orchestrator))
}

fn warn_unusual_lut(path: Option<&Path>) {
    if let Some(path) = path.filter(|p| !is_lut_file(p)) {
        tracing::warn!(path = %path.display(), "LUT file has an unexpected extension");
    }
}

/// Print events as JSON lines until `done` fires, then flush what is left.
async fn print_events<S>(events: S, mut done: oneshot::Receiver<()>)
where
    S: Stream<Item = PipelineEvent> + Send,
{
    tokio::pin!(events);
    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => print_event(&event),
                None => return,
            },
            _ = &mut done => break,
        }
    }
    while let Some(Some(event)) = events.next().now_or_never() {
        print_event(&event);
    }
}

fn print_event(event: &PipelineEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
    }
}

async fn run_watch_command(
    config_path: Option<&Path>,
    watch_dir: Option<PathBuf>,
    run: RunArgs,
) -> anyhow::Result<()> {
    init_tracing();

    let (config, orchestrator) = prepare(config_path, run).await?;
    let watch_dir = watch_dir
        .or(config.watch_dir)
        .ok_or(ConfigError::MissingWatchDir)?;
    let watch_dir = orchestrator.check_watch_dir(&watch_dir).await?;

    let (done_tx, done_rx) = oneshot::channel();
    let printer = tokio::spawn(print_events(orchestrator.events().stream(), done_rx));

    let source = DirectoryWatcher::new(&watch_dir)?;
    let handle = orchestrator.start_watching(source).await?;
    tracing::info!(dir = %watch_dir.display(), "Watching for images, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    handle.stop().await;
    orchestrator.drain().await;

    let _ = done_tx.send(());
    let _ = printer.await;
    Ok(())
}

async fn run_process_command(
    config_path: Option<&Path>,
    run: RunArgs,
    files: Vec<PathBuf>,
) -> anyhow::Result<()> {
    init_tracing();

    let (_config, orchestrator) = prepare(config_path, run).await?;

    let (done_tx, done_rx) = oneshot::channel();
    let printer = tokio::spawn(print_events(orchestrator.events().stream(), done_rx));

    let report = orchestrator.submit_batch(files).await?.wait().await?;

    let _ = done_tx.send(());
    let _ = printer.await;

    if report.failed > 0 {
        anyhow::bail!("{} of {} images failed", report.failed, report.total());
    }
    Ok(())
}

async fn run_inspect_command(path: &Path) -> anyhow::Result<()> {
    // Minimal logging for CLI
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lutwatch=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    warn_unusual_lut(Some(path));
    let table = load_lut(path).await?;
    let size = table.size();

    println!("{}", path.display());
    println!("  size    = {size}");
    println!("  entries = {}", table.entries().len());
    println!("\nGray ramp:");
    for step in 0..=4 {
        let v = step as f32 / 4.0;
        let [r, g, b] = table.lookup(v, v, v);
        println!("  {v:.2} -> ({r:.4}, {g:.4}, {b:.4})");
    }
    println!("\nPrimaries:");
    for (name, rgb) in [
        ("red", [1.0, 0.0, 0.0]),
        ("green", [0.0, 1.0, 0.0]),
        ("blue", [0.0, 0.0, 1.0]),
    ] {
        let [r, g, b] = table.lookup(rgb[0], rgb[1], rgb[2]);
        println!("  {name:<5} -> ({r:.4}, {g:.4}, {b:.4})");
    }
    Ok(())
}
