//! CLI entry point for audio-fanout
//!
//! Parses command line arguments, runs one conversion job and logs its events.

use audio_fanout::{
    new_shared_telemetry, parse_listen_addr, resolve_worker_count, run_startup_checks,
    run_telemetry_server, spawn_telemetry, Config, EncodeOptions, ExtensionFilter, FfmpegEncoder,
    FileOutcome, JobCoordinator, JobEvent, JobRequest, JobSummary, OutputFormat, ProfileError,
    QualityTier, SharedTelemetry, TelemetrySampler,
};
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Convert a lossless audio library to another format, in parallel
#[derive(Parser, Debug)]
#[command(name = "audio-fanout")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Folder containing the lossless source files
    source: PathBuf,

    /// Folder receiving the converted files
    dest: PathBuf,

    /// Number of parallel workers (default from config, else one per core)
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Output format: mp3, aac, ogg, opus, flac, alac, wav, aiff
    #[arg(short, long)]
    format: Option<String>,

    /// Quality tier: low, medium, high
    #[arg(short, long)]
    quality: Option<String>,

    /// Output sample rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Output channel count
    #[arg(long)]
    channels: Option<u16>,

    /// Path to the configuration file (config.toml)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Skip the ffmpeg availability check
    #[arg(long, default_value = "false")]
    skip_checks: bool,

    /// Serve telemetry as JSON on this address, e.g. 127.0.0.1:7879
    #[arg(long)]
    telemetry_listen: Option<String>,
}

/// Merges command line flags over the configured defaults.
fn build_request(args: &Args, config: &Config) -> Result<JobRequest, ProfileError> {
    let format = args.format.as_deref().unwrap_or(&config.job.format);
    let format = format.parse::<OutputFormat>()?;

    let tier = args
        .quality
        .as_deref()
        .or(config.job.quality.as_deref())
        .map(str::parse::<QualityTier>)
        .transpose()?;

    Ok(JobRequest {
        source_root: args.source.clone(),
        dest_root: args.dest.clone(),
        workers: resolve_worker_count(args.workers, config.job.workers),
        format: Some(format),
        tier,
        options: EncodeOptions {
            sample_rate: args.sample_rate.or(config.job.sample_rate),
            channels: args.channels.or(config.job.channels),
        },
    })
}

fn outcome_label(outcome: &FileOutcome) -> &'static str {
    match outcome {
        FileOutcome::Encoded => "converted",
        FileOutcome::Skipped => "already converted",
        FileOutcome::EncoderFailed(_) => "failed",
    }
}

async fn render_event(event: &JobEvent, telemetry: &SharedTelemetry) {
    match event {
        JobEvent::FilesDiscovered { counts, total } => {
            for (ext, count) in counts {
                info!("Found {} {} files", count, ext);
            }
            info!("Found {} files in total", total);
        }
        JobEvent::JobStarted {
            total_files,
            workers,
            profile,
        } => {
            info!(
                "Converting {} files to {} using {} workers",
                total_files, profile, workers
            );
        }
        JobEvent::Progress {
            remaining,
            total,
            file,
            outcome,
        } => {
            let snapshot = telemetry.read().await;
            info!(
                cpu = %format!("{:.0}%", snapshot.cpu_usage_percent),
                files_per_tick = %format!("{:.1}", snapshot.mean_throughput),
                elapsed = %snapshot.elapsed,
                "[{}/{}] {} ({})",
                total - remaining,
                total,
                file.display(),
                outcome_label(outcome)
            );
        }
        JobEvent::WorkerFinished { worker, cancelled } => {
            if *cancelled {
                info!("Worker {} stopped", worker);
            } else {
                info!("Worker {} finished its batch", worker);
            }
        }
        JobEvent::JobComplete(summary) => {
            info!(
                "Done: {} converted, {} already converted, {} failed in {}",
                summary.encoded,
                summary.skipped,
                summary.failed,
                audio_fanout::format_elapsed(summary.elapsed)
            );
        }
        JobEvent::Warning(msg) => warn!("{}", msg),
        JobEvent::Error(msg) => error!("{}", msg),
    }
}

/// Runs the configured post-job command through the platform shell.
async fn run_post_job(command: &str) {
    let mut cmd = if cfg!(windows) {
        let mut cmd = tokio::process::Command::new("cmd");
        cmd.arg("/C");
        cmd
    } else {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c");
        cmd
    };
    cmd.arg(command);

    info!("Running post-job command: {}", command);
    match cmd.status().await {
        Ok(status) if status.success() => {}
        Ok(status) => warn!("Post-job command exited with {}", status),
        Err(e) => warn!("Failed to run post-job command: {}", e),
    }
}

async fn run(args: Args) -> Result<JobSummary, Box<dyn Error>> {
    let config = Config::load_or_default(&args.config)?;
    info!("Config file: {}", args.config.display());

    if args.skip_checks {
        warn!("Skipping startup checks (--skip-checks enabled)");
    } else {
        run_startup_checks(&config)?;
    }

    let request = build_request(&args, &config)?;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let coordinator = JobCoordinator::new(
        FfmpegEncoder::new(&config.encoder.ffmpeg),
        ExtensionFilter::from_config(&config.discovery),
        events_tx,
    );

    let telemetry = new_shared_telemetry();
    let sampler = spawn_telemetry(
        TelemetrySampler::new(coordinator.status(), coordinator.progress()),
        telemetry.clone(),
        Duration::from_millis(config.telemetry.interval_ms.max(1)),
    );

    let server = match args.telemetry_listen.as_ref().or(config.telemetry.listen.as_ref()) {
        Some(listen) => {
            let addr = parse_listen_addr(listen)?;
            let telemetry = telemetry.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = run_telemetry_server(telemetry, addr).await {
                    error!("Telemetry server error: {}", e);
                }
            }))
        }
        None => None,
    };

    let handle = coordinator.start(request).await?;

    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping workers");
            cancel.cancel();
        }
    });

    while let Some(event) = events_rx.recv().await {
        render_event(&event, &telemetry).await;
        if matches!(event, JobEvent::JobComplete(_)) {
            break;
        }
    }

    let summary = handle.wait().await?;

    sampler.abort();
    if let Some(server) = server {
        server.abort();
    }

    if !summary.cancelled {
        if let Some(command) = &config.post_job.command {
            run_post_job(command).await;
        }
    }

    Ok(summary)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(summary) if summary.cancelled => {
            warn!("Conversion cancelled");
            ExitCode::from(130)
        }
        Ok(summary) if summary.failed > 0 => {
            warn!("{} files could not be converted; rerun to retry them", summary.failed);
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
