//! PPG Monitor - headless acquisition with periodic HRV summaries

use anyhow::Context;
use clap::Parser;
use ppg_acquisition::{
    AcquisitionLoop, JsonFileSink, LineSource, PipelineEvent, PipelineHandle, PpgSimulator,
    SampleSource, SimulatorConfig,
};
use ppg_core::{ConditionId, MetricName};
use ppg_processing::{PipelineConfig, SummaryScale};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "ppg-monitor", about = "Real-time PPG acquisition and HRV monitoring")]
struct Args {
    /// Pipeline configuration (JSON); defaults are used when omitted
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Serial device node or file emitting one sample per line; simulates when omitted
    #[arg(long, value_name = "PATH")]
    device: Option<PathBuf>,

    /// Condition to record metrics under; the first configured one when omitted
    #[arg(long)]
    condition: Option<String>,

    /// Capture the filtered signal from the start and save it on exit
    #[arg(long)]
    record: bool,

    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,

    /// Summary logging interval in milliseconds
    #[arg(long, default_value = "1000")]
    summary_ms: u64,

    /// Simulated heart rate (bpm)
    #[arg(long, default_value = "72")]
    simulate_bpm: f64,

    /// Probability of a garbled simulated line
    #[arg(long, default_value = "0")]
    garble: f64,

    /// Simulator random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Write the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.validate().context("invalid pipeline configuration")?;

    if args.print_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    let source = open_source(&args, &config)?;
    info!(source = %source.describe(), experiment = %config.experiment_name, "starting pipeline");

    let sink = Arc::new(JsonFileSink::new(config.data_dir.clone()));
    let mut handle = AcquisitionLoop::spawn(config.clone(), source, sink)?;

    tokio::spawn(log_events(handle.subscribe_events()));
    if let Some(mut display) = handle.take_display() {
        // No plot attached: keep the display channel drained
        tokio::spawn(async move { while display.recv().await.is_some() {} });
    }

    let condition = match &args.condition {
        Some(name) => ConditionId::from(name.as_str()),
        None => config
            .conditions
            .first()
            .cloned()
            .context("no experiment conditions configured")?,
    };
    handle.select_condition(condition.clone()).await?;
    handle.start().await?;
    if args.record {
        handle.begin_recording().await?;
    }

    let deadline = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut scale = SummaryScale::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(args.summary_ms.max(50)));

    loop {
        tokio::select! {
            _ = ticker.tick() => report(&handle, &mut scale, &condition).await,
            _ = &mut deadline => {
                info!("run duration elapsed");
                break;
            }
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for Ctrl+C")?;
                info!("shutdown signal received");
                break;
            }
        }
    }

    let stats = handle.extraction_stats();
    info!(
        dispatched = stats.dispatched,
        recorded = stats.recorded,
        skipped = stats.skipped,
        dropped = stats.dropped,
        "feature windows"
    );
    handle.shutdown().await?;
    Ok(())
}

fn open_source(args: &Args, config: &PipelineConfig) -> anyhow::Result<Box<dyn SampleSource>> {
    if let Some(path) = &args.device {
        let file = File::open(path).with_context(|| format!("opening device {}", path.display()))?;
        let name = path.display().to_string();
        return Ok(Box::new(LineSource::named(BufReader::new(file), name)));
    }

    let simulator = PpgSimulator::new(SimulatorConfig {
        sample_rate: config.sample_rate,
        heart_rate_bpm: args.simulate_bpm,
        garble_probability: args.garble,
        seed: args.seed,
        ..SimulatorConfig::default()
    })?;
    Ok(Box::new(simulator))
}

async fn report(handle: &PipelineHandle, scale: &mut SummaryScale, selected: &ConditionId) {
    let summaries = handle.summary_all().await;
    scale.update(summaries.values());

    let sample = handle.latest_sample();
    let range = handle.display_range();
    debug!(
        index = sample.index,
        filtered = sample.filtered,
        min = range.min,
        max = range.max,
        "live signal"
    );

    for (condition, metrics) in &summaries {
        let marker = if condition == selected { "*" } else { " " };
        info!(
            "{}{:<12} bpm {:>6.1}  ibi {:>6.1}  sdnn {:>6.1}  sdsd {:>6.1}  rmssd {:>6.1}  pnn50 {:>5.2}",
            marker,
            condition,
            metrics.bpm,
            metrics.ibi,
            metrics.sdnn,
            metrics.sdsd,
            metrics.rmssd,
            metrics.pnn50
        );
    }

    let bpm = scale.bounds(MetricName::Bpm);
    debug!(min = bpm.min, max = bpm.max, "{} axis", MetricName::Bpm.label());
}

async fn log_events(mut events: broadcast::Receiver<PipelineEvent>) {
    loop {
        match events.recv().await {
            Ok(PipelineEvent::StateChanged(state)) => info!(?state, "state"),
            Ok(PipelineEvent::WindowRecorded { sequence, condition, metrics }) => {
                debug!(sequence, %condition, bpm = metrics.bpm, "window recorded")
            }
            Ok(PipelineEvent::WindowSkipped { sequence, reason }) => {
                debug!(sequence, ?reason, "window skipped")
            }
            Ok(PipelineEvent::RecordingSaved { raw_path, samples, .. }) => {
                info!(path = %raw_path.display(), samples, "recording saved")
            }
            Ok(PipelineEvent::RecordingFailed { reason }) => warn!(%reason, "recording failed"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event log lagged")
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
