use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local};
use clap::Parser;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use vehicle_counter::{
    AppConfig, CounterUpdate, CountingPipeline, FrameInput, JsonLinesSink, SummaryLog,
    TelemetryDispatcher, TelemetrySink, WindowAggregator,
};

#[derive(Parser, Debug)]
#[command(
    name = "vehicle-counter",
    about = "Replay recorded detections through the tracker and count line crossings"
)]
struct Args {
    /// JSON-lines recording, one frame of detections per line
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
    /// JSON config file; built-in defaults when omitted
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Append window summaries to this JSON-lines file
    #[arg(long, value_name = "PATH")]
    summary_out: Option<PathBuf>,
    /// Append every counter update to this JSON-lines file
    #[arg(long, value_name = "PATH")]
    telemetry_out: Option<PathBuf>,
    /// POST counter updates to this URL (overrides the config file)
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,
    /// Stamp frames at this rate instead of the wall clock
    #[arg(long)]
    fps: Option<f64>,
}

fn frame_clock(fps: Option<f64>) -> Result<impl FnMut(u64) -> DateTime<Local>> {
    if let Some(fps) = fps {
        anyhow::ensure!(fps.is_finite() && fps > 0.0, "--fps must be positive, got {}", fps);
    }
    let start = Local::now();
    Ok(move |index: u64| match fps {
        Some(fps) => start + Duration::microseconds((index as f64 / fps * 1e6) as i64),
        None => Local::now(),
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AppConfig::default(),
    };
    if args.endpoint.is_some() {
        config.telemetry.endpoint = args.endpoint.clone();
    }

    let mut pipeline = CountingPipeline::new(&config)?;
    let mut aggregator = WindowAggregator::new(config.summary.window_secs);
    let mut summary_log = match &args.summary_out {
        Some(path) => Some(
            SummaryLog::open(path)
                .with_context(|| format!("Failed to open summary log {}", path.display()))?,
        ),
        None => None,
    };

    let mut extra_sinks: Vec<Box<dyn TelemetrySink>> = Vec::new();
    if let Some(path) = &args.telemetry_out {
        let file = File::create(path)
            .with_context(|| format!("Failed to create telemetry log {}", path.display()))?;
        extra_sinks.push(Box::new(JsonLinesSink::new(file)));
    }
    let mut telemetry = TelemetryDispatcher::from_config(&config.telemetry, extra_sinks);

    let input = File::open(&args.input)
        .with_context(|| format!("Failed to open input {}", args.input.display()))?;
    let mut clock = frame_clock(args.fps)?;

    log::info!("Replaying detections from {}", args.input.display());
    let mut now = clock(0);
    for (line_no, line) in BufReader::new(input).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", args.input.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let frame: FrameInput = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Skipping line {}: {}", line_no + 1, e);
                continue;
            }
        };

        now = clock(pipeline.frames_processed());
        let report = match pipeline.process_frame(&frame, now) {
            Ok(report) => report,
            Err(e) => {
                log::warn!("Skipping line {}: {}", line_no + 1, e);
                continue;
            }
        };

        for event in &report.events {
            log::debug!(
                "Track {} crossed '{}' {} at {}",
                event.track_id,
                event.line_name,
                event.direction,
                event.timestamp.format("%H:%M:%S")
            );
        }
        for update in report.counter_updates(now) {
            telemetry.publish(update);
        }

        if let Some(summary) = aggregator.record_frame(now, frame.width, frame.height, report.totals)
        {
            if let Some(writer) = summary_log.as_mut() {
                writer.append(&summary)?;
            }
        }
    }

    if let Some(summary) = aggregator.finish(now) {
        if let Some(writer) = summary_log.as_mut() {
            writer.append(&summary)?;
        }
    }

    let totals = pipeline.totals();
    telemetry.publish_final(CounterUpdate::new(totals, now));
    telemetry.shutdown();
    if telemetry.dropped() > 0 {
        log::warn!("{} counter updates were dropped", telemetry.dropped());
    }

    log::info!(
        "Processed {} frames, {} telemetry updates delivered",
        pipeline.frames_processed(),
        telemetry.delivered()
    );
    println!(
        "UP={} DOWN={} TOTAL={}",
        totals.up,
        totals.down,
        totals.total()
    );
    Ok(())
}
