use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

use rocket_telemetry::filters::FilterKind;
use rocket_telemetry::live_status::LiveStatus;
use rocket_telemetry::pipeline::{PipelineConfig, TelemetryPipeline};
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(name = "rocket_telemetry")]
#[command(about = "Live rocket telemetry orientation from newline-delimited JSON on stdin", long_about = None)]
struct Args {
    /// JSON pipeline config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Filter kind (complementary, kalman, madgwick, fullmadgwick)
    #[arg(long)]
    filter: Option<String>,

    /// Use the device quaternion when a record carries one
    #[arg(long, default_value_t = false)]
    use_device_quaternion: bool,

    /// Disable filtering (accelerometer tilt + integrated yaw)
    #[arg(long, default_value_t = false)]
    no_filter: bool,

    /// Seconds between status lines
    #[arg(long, default_value = "1")]
    status_interval: u64,

    /// Also write the status snapshot to this JSON file
    #[arg(long)]
    status_file: Option<PathBuf>,

    /// Echo every estimated record as JSON on stdout
    #[arg(long, default_value_t = false)]
    echo: bool,

    /// Export the session as CSV when the stream ends
    #[arg(long)]
    export: Option<PathBuf>,
}

enum Line {
    Record(Value),
    Rejected,
}

/// Reads stdin line by line until EOF.
async fn stdin_loop(tx: mpsc::Sender<Line>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let msg = match serde_json::from_str::<Value>(line) {
            Ok(value) => Line::Record(value),
            Err(e) => {
                log::warn!("rejected telemetry line: {}", e);
                Line::Rejected
            }
        };
        if tx.send(msg).await.is_err() {
            break;
        }
    }
    Ok(())
}

fn build_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match args.config.as_ref() {
        Some(path) => PipelineConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(name) = args.filter.as_deref() {
        config.filter_kind = name.parse::<FilterKind>()?;
    }
    config.use_device_quaternion |= args.use_device_quaternion;
    if args.no_filter {
        config.filter_enabled = false;
    }
    Ok(config)
}

fn report(pipeline: &TelemetryPipeline, args: &Args, uptime: u64, rejected: u64) {
    let status = LiveStatus::from_pipeline(pipeline, uptime, rejected);
    eprintln!("[{}] {}", ts_now(), status.summary());
    if let Some(path) = args.status_file.as_ref() {
        if let Err(e) = status.save(path) {
            log::warn!("failed to write status file {}: {}", path.display(), e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = build_config(&args)?;

    eprintln!("[{}] Rocket telemetry live ingest starting", ts_now());
    eprintln!("  Filter: {}", config.filter_kind);
    eprintln!("  Filter enabled: {}", config.filter_enabled);
    eprintln!("  Device quaternion: {}", config.use_device_quaternion);

    let mut pipeline = TelemetryPipeline::new(config);

    let (tx, mut rx) = mpsc::channel::<Line>(500);
    let reader = tokio::spawn(stdin_loop(tx));

    let start = Utc::now();
    let mut ticker = interval(Duration::from_secs(args.status_interval.max(1)));
    let mut rejected = 0u64;

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Some(Line::Record(value)) => {
                        let record = pipeline.ingest(&value)?;
                        if args.echo {
                            println!("{}", serde_json::to_string(record)?);
                        }
                    }
                    Some(Line::Rejected) => rejected += 1,
                    None => break,
                }
            }
            _ = ticker.tick() => {
                let uptime = Utc::now().signed_duration_since(start).num_seconds().max(0) as u64;
                report(&pipeline, &args, uptime, rejected);
            }
        }
    }

    reader.await??;

    let uptime = Utc::now().signed_duration_since(start).num_seconds().max(0) as u64;
    report(&pipeline, &args, uptime, rejected);
    eprintln!("[{}] Stream ended after {} records", ts_now(), pipeline.dataset().len());

    if let Some(path) = args.export.as_ref() {
        let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
        pipeline.dataset().write_csv(file)?;
        eprintln!("[{}] Exported session to {}", ts_now(), path.display());
    }

    Ok(())
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
