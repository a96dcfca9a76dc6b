use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use flate2::read::GzDecoder;
use rocket_telemetry::dataset::{Axis, SeriesKind};
use rocket_telemetry::filters::{FilterKind, FilterParamPatch};
use rocket_telemetry::pipeline::{PipelineConfig, TelemetryPipeline};
use serde_json::{json, Value};

#[derive(Parser, Debug)]
#[command(name = "replay")]
#[command(about = "Batch orientation recompute over recorded rocket telemetry", long_about = None)]
struct Args {
    /// Recording to replay (.csv, .json, .ndjson, optionally .gz)
    #[arg(long, conflicts_with = "dir")]
    log: Option<PathBuf>,

    /// Directory of recordings to replay in one go
    #[arg(long)]
    dir: Option<PathBuf>,

    /// JSON pipeline config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Filter kind (complementary, kalman, madgwick, fullmadgwick)
    #[arg(long)]
    filter: Option<String>,

    /// Run every filter kind and report each
    #[arg(long, default_value_t = false)]
    compare: bool,

    /// Use the device quaternion when a record carries one
    #[arg(long, default_value_t = false)]
    use_device_quaternion: bool,

    /// Disable filtering (accelerometer tilt + integrated yaw)
    #[arg(long, default_value_t = false)]
    no_filter: bool,

    /// Complementary blend weight
    #[arg(long)]
    alpha: Option<f64>,

    /// Madgwick gain
    #[arg(long)]
    beta: Option<f64>,

    /// Simplified Kalman process noise
    #[arg(long)]
    process_noise: Option<f64>,

    /// Simplified Kalman measurement noise
    #[arg(long)]
    measurement_noise: Option<f64>,

    /// Write the recomputed dataset as CSV (single --log only)
    #[arg(long)]
    export: Option<PathBuf>,

    /// Also emit one series (accel, gyro, orientation, altitude)
    #[arg(long)]
    series: Option<String>,

    /// Axis for --series (x, y, z)
    #[arg(long, default_value = "x")]
    axis: String,
}

enum Recording {
    Csv(String),
    Records(Vec<Value>),
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    let file = File::open(path)?;
    let mut text = String::new();
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        BufReader::new(GzDecoder::new(file)).read_to_string(&mut text)?;
    } else {
        BufReader::new(file).read_to_string(&mut text)?;
    }
    Ok(text)
}

/// Extension of the payload, looking through a trailing `.gz`.
fn inner_extension(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let name = name.strip_suffix(".gz").unwrap_or(name);
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn is_recording(path: &Path) -> bool {
    matches!(inner_extension(path).as_deref(), Some("csv" | "json" | "ndjson" | "jsonl"))
}

fn load_recording(path: &Path) -> anyhow::Result<Recording> {
    let text = read_text(path).with_context(|| format!("reading {}", path.display()))?;
    if inner_extension(path).as_deref() == Some("csv") {
        return Ok(Recording::Csv(text));
    }

    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return Ok(Recording::Records(serde_json::from_str(trimmed)?));
    }

    // newline-delimited JSON; blank and unparsable lines are skipped
    let mut records = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => records.push(value),
            Err(e) => log::warn!("{}:{}: skipping line ({})", path.display(), line_no + 1, e),
        }
    }
    Ok(Recording::Records(records))
}

fn build_config(args: &Args) -> anyhow::Result<PipelineConfig> {
    let mut config = match args.config.as_ref() {
        Some(path) => PipelineConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(name) = args.filter.as_deref() {
        config.filter_kind = name.parse()?;
    }
    config.use_device_quaternion |= args.use_device_quaternion;
    if args.no_filter {
        config.filter_enabled = false;
    }

    let patch = FilterParamPatch {
        alpha: args.alpha,
        process_noise: args.process_noise,
        measurement_noise: args.measurement_noise,
        beta: args.beta,
        sample_freq: None,
        max_step_secs: None,
    };
    for kind in [FilterKind::Complementary, FilterKind::Kalman, FilterKind::Madgwick] {
        config.filters.apply(kind, &patch)?;
    }
    Ok(config)
}

fn run_once(path: &Path, args: &Args, config: &PipelineConfig) -> anyhow::Result<Value> {
    let mut pipeline = TelemetryPipeline::new(config.clone());
    let loaded = match load_recording(path)? {
        Recording::Csv(text) => pipeline.load_csv(&text)?,
        Recording::Records(records) => pipeline.load_records(&records),
    };
    log::info!("{}: {} records", path.display(), loaded);

    let kinds: Vec<FilterKind> = if args.compare {
        vec![FilterKind::Complementary, FilterKind::Kalman, FilterKind::Madgwick]
    } else {
        vec![config.filter_kind]
    };

    let mut runs = Vec::new();
    for kind in &kinds {
        pipeline.set_filter_kind(*kind);
        let last = pipeline.dataset().records().last();
        runs.push(json!({
            "filter": kind.as_str(),
            "statistics": pipeline.statistics(),
            "final_orientation": last.map(|r| r.orientation),
            "final_quaternion": last.and_then(|r| r.calculated_quaternion),
        }));
    }
    if pipeline.bank().kind() != config.filter_kind {
        pipeline.set_filter_kind(config.filter_kind);
    }

    let mut result = json!({
        "file": path.display().to_string(),
        "records": loaded,
        "metadata": pipeline.dataset().metadata(),
        "use_device_quaternion": pipeline.bank().use_device_quaternion(),
        "filter_enabled": pipeline.bank().enabled(),
        "runs": runs,
    });

    if let Some(series) = args.series.as_deref() {
        let kind: SeriesKind = series.parse()?;
        let axis: Axis = args.axis.parse()?;
        let points: Vec<_> = pipeline.dataset().data_series(kind, axis).collect();
        result["series"] = json!({ "kind": kind.to_string(), "points": points });
    }

    if let Some(out) = args.export.as_ref() {
        let file = File::create(out).with_context(|| format!("creating {}", out.display()))?;
        pipeline.dataset().write_csv(file)?;
        log::info!("exported {} records to {}", pipeline.dataset().len(), out.display());
    }

    Ok(result)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = build_config(&args)?;
    let mut results = Vec::new();

    if let Some(dir) = args.dir.as_ref() {
        if args.export.is_some() {
            anyhow::bail!("--export needs a single --log");
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_recording(p))
            .collect();
        paths.sort();
        for path in paths {
            match run_once(&path, &args, &config) {
                Ok(res) => results.push(res),
                Err(e) => eprintln!("Failed {}: {}", path.display(), e),
            }
        }
    } else if let Some(log) = args.log.as_ref() {
        results.push(run_once(log, &args, &config)?);
    } else {
        anyhow::bail!("Provide --log or --dir");
    }

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
