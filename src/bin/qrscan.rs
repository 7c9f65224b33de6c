use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use rust_qr_live::camera::{DeviceArbiter, ImageSequenceCamera};
use rust_qr_live::controller::ControllerState;
use rust_qr_live::history::JsonFileHistory;
use rust_qr_live::preprocess::Preprocessor;
use rust_qr_live::tools::{
    bench_limit_from_env, dataset_iter, dataset_root_from_env, grayscale_stats, load_frame,
    parse_expected_qr_count, save_frame, smoke_from_env,
};
use rust_qr_live::{ScanConfig, ScanController, ScanError, ScanEvent, ScanPipeline};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qrscan", version, about = "Continuous QR scanning tools")]
struct Cli {
    /// JSON config file; QR_SCAN_* variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory of frames as if it were a live camera
    Scan {
        #[arg(long)]
        frames: PathBuf,
        /// Stop after this many ticks instead of waiting for Ctrl-C
        #[arg(long)]
        max_ticks: Option<u64>,
        /// Append the session to this JSON history file on exit
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Run a single tick on one image
    Frame {
        #[arg(long)]
        image: PathBuf,
    },
    /// Write the preprocessed version of an image
    Preprocess {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Reading rate of the pipeline on a labelled dataset
    ReadingRate {
        #[arg(long)]
        root: Option<PathBuf>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        smoke: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Scan {
            frames,
            max_ticks,
            history,
        } => scan_cmd(config, &frames, max_ticks, history.as_deref()).await,
        Command::Frame { image } => frame_cmd(&config, &image),
        Command::Preprocess { image, out } => preprocess_cmd(&config, &image, &out),
        Command::ReadingRate { root, limit, smoke } => {
            reading_rate_cmd(&config, root, limit, smoke);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "qrscan failed");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ScanConfig, ScanError> {
    let config = match path {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

async fn scan_cmd(
    config: ScanConfig,
    frames: &Path,
    max_ticks: Option<u64>,
    history: Option<&Path>,
) -> Result<(), ScanError> {
    let camera = ImageSequenceCamera::from_dir(frames)?;
    info!(frames = camera.len(), "image sequence loaded");
    let mut controller =
        ScanController::from_config(config, Box::new(camera), DeviceArbiter::new());

    let mut events = controller.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ScanEvent::Detected(code) => match serde_json::to_string(&code) {
                    Ok(line) => println!("{line}"),
                    Err(err) => warn!(error = %err, "could not serialize detection"),
                },
                ScanEvent::Status(status) => info!(%status, "status"),
                ScanEvent::Feedback { payload } => info!(%payload, "beep"),
                _ => {}
            }
        }
    });

    let handle = controller.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.stop();
        }
    });

    match max_ticks {
        Some(limit) => {
            controller.start().await?;
            let mut ticks = 0;
            while ticks < limit && controller.state() == ControllerState::Scanning {
                controller.tick().await;
                ticks += 1;
                tokio::time::sleep(controller.interval()).await;
                controller.poll_commands().await?;
            }
            controller.stop();
        }
        None => controller.run().await?,
    }

    let stats = controller.stats();
    info!(
        codes = controller.session().len(),
        completed = stats.completed,
        skipped = stats.skipped_busy,
        aborted = stats.aborted,
        "scan finished"
    );
    if let Some(path) = history {
        let mut sink = JsonFileHistory::new(path);
        let committed = controller.commit(&mut sink)?;
        info!(committed, path = %path.display(), "history written");
    }

    drop(controller);
    let _ = printer.await;
    Ok(())
}

fn frame_cmd(config: &ScanConfig, image: &Path) -> Result<(), ScanError> {
    let frame = load_frame(image)?;
    let stats = grayscale_stats(&frame.luma());
    println!(
        "Image: {} ({}x{}) gray min={} max={} avg={}",
        image.display(),
        frame.width(),
        frame.height(),
        stats.min,
        stats.max,
        stats.avg
    );

    let mut pipeline = ScanPipeline::from_config(config);
    let tick = pipeline.run(&frame)?;
    for (stage, elapsed) in &tick.telemetry.preprocess.applied {
        println!("  {stage:<12} {:>8.2} ms", elapsed.as_secs_f64() * 1000.0);
    }
    for stage in &tick.telemetry.preprocess.skipped_for_budget {
        println!("  {stage:<12} skipped (budget)");
    }
    println!(
        "  decode       {:>8.2} ms ({} of {} regions, {} backend failures)",
        tick.telemetry.decode.as_secs_f64() * 1000.0,
        tick.telemetry.regions_scanned,
        tick.telemetry.regions,
        tick.telemetry.backend_failures
    );
    println!("Found {} candidates", tick.candidates.len());
    for candidate in &tick.candidates {
        println!(
            "  [{}] {} via {} ({:.2}) region {}x{}+{}+{}",
            candidate.region.priority,
            candidate.payload,
            candidate.backend_name,
            candidate.raw_confidence,
            candidate.region.rect.width,
            candidate.region.rect.height,
            candidate.region.rect.x,
            candidate.region.rect.y
        );
    }
    Ok(())
}

fn preprocess_cmd(config: &ScanConfig, image: &Path, out: &Path) -> Result<(), ScanError> {
    let frame = load_frame(image)?;
    let mut preprocessor = Preprocessor::new(config.preprocessing.clone());
    let (processed, report) = preprocessor.process_with_report(&frame)?;
    save_frame(&processed, out)?;
    println!(
        "Wrote {} ({} stages, {:.2} ms)",
        out.display(),
        report.applied.len(),
        report.elapsed.as_secs_f64() * 1000.0
    );
    Ok(())
}

#[derive(Default)]
struct CategoryRate {
    images: usize,
    expected: usize,
    decoded: usize,
}

fn reading_rate_cmd(config: &ScanConfig, root: Option<PathBuf>, limit: Option<usize>, smoke: bool) {
    let root = root.unwrap_or_else(dataset_root_from_env);
    let limit = limit.or_else(bench_limit_from_env);
    let smoke = smoke || smoke_from_env();
    if !root.exists() {
        eprintln!("Dataset root not found: {}", root.display());
        return;
    }

    let config = ScanConfig {
        stop_on_first_hit: false,
        ..config.clone()
    };
    let mut pipeline = ScanPipeline::from_config(&config);
    let mut categories: BTreeMap<String, CategoryRate> = BTreeMap::new();
    let started = Instant::now();

    for path in dataset_iter(&root, limit, smoke) {
        let category = path
            .strip_prefix(&root)
            .ok()
            .and_then(|rel| rel.parent())
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| ".".to_string());
        let expected = parse_expected_qr_count(path.with_extension("txt")).max(1);
        let decoded = match load_frame(&path)
            .and_then(|frame| pipeline.run(&frame).map_err(ScanError::from))
        {
            Ok(tick) => tick
                .candidates
                .iter()
                .map(|c| c.payload.as_str())
                .collect::<HashSet<_>>()
                .len()
                .min(expected),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "image skipped");
                0
            }
        };
        let entry = categories.entry(category).or_default();
        entry.images += 1;
        entry.expected += expected;
        entry.decoded += decoded;
    }

    if categories.is_empty() {
        println!("No images found under {}", root.display());
        return;
    }

    println!("Reading rate ({})", pipeline.chain().names().join(" -> "));
    println!("=====================================");
    let mut total = CategoryRate::default();
    for (name, rate) in &categories {
        println!(
            "  {:<16} {:>4}/{:<4} = {:>6.2}%  ({} images)",
            name,
            rate.decoded,
            rate.expected,
            rate.decoded as f64 * 100.0 / rate.expected as f64,
            rate.images
        );
        total.images += rate.images;
        total.expected += rate.expected;
        total.decoded += rate.decoded;
    }
    println!("=====================================");
    println!(
        "  {:<16} {:>4}/{:<4} = {:>6.2}%  in {:.1}s",
        "total",
        total.decoded,
        total.expected,
        total.decoded as f64 * 100.0 / total.expected as f64,
        started.elapsed().as_secs_f64()
    );
}
