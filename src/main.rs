//! Lab Monitor CLI
//!
//! Runs capture-and-analyze cycles against an uploaded image, an uploaded
//! video or a camera, then prints the published results, the history log
//! and the recent trend.

use clap::Parser;
use lab_monitor::{
    analysis::{AnalysisClient, HttpAnalysisClient, MockAnalysisClient, ReasoningDepth},
    capture::{CameraDevice, Upload},
    history::HistoryEntry,
    monitor::{CycleOutcome, Monitor, MonitorEvent, Publication},
    telemetry::TelemetryMode,
    FileConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    Notify,
};
use tracing::{info, warn};

/// Watches a lab experiment and asks a vision-reasoning service about it.
#[derive(Parser, Debug)]
#[command(name = "lab-monitor", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Experiment description sent with every frame.
    #[arg(long, conflicts_with = "context_file")]
    context: Option<String>,

    /// Read the experiment description from a file.
    #[arg(long)]
    context_file: Option<PathBuf>,

    /// Analyze an image file.
    #[arg(long, conflicts_with_all = ["video", "camera"])]
    image: Option<PathBuf>,

    /// Analyze a video file (animated GIF, APNG and WebP; MP4, WebM, MOV
    /// and MKV with the `video` feature).
    #[arg(long, conflicts_with = "camera")]
    video: Option<PathBuf>,

    /// Analyze the live camera.
    #[arg(long)]
    camera: bool,

    /// Keep analyzing on the configured interval until stopped.
    #[arg(long)]
    auto: bool,

    /// Stop after this many published results or errors.
    #[arg(long)]
    cycles: Option<usize>,

    /// Reasoning depth: low or high.
    #[arg(long)]
    depth: Option<ReasoningDepth>,

    /// Analysis service URL.
    #[arg(long)]
    endpoint: Option<String>,

    /// Manual temperature in °C (switches telemetry to manual).
    #[arg(long)]
    temperature: Option<String>,

    /// Manual pressure in kPa (switches telemetry to manual).
    #[arg(long)]
    pressure: Option<String>,

    /// Print history entries as JSON lines.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    info!("Lab Monitor v{}", lab_monitor::VERSION);

    let mut config = match &cli.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    if let Some(endpoint) = &cli.endpoint {
        config.analysis.endpoint = Some(endpoint.clone());
    }
    if let Some(depth) = cli.depth {
        config.monitor.reasoning_depth = depth;
    }
    if let Some(context) = &cli.context {
        config.monitor.context = context.clone();
    } else if let Some(path) = &cli.context_file {
        config.monitor.context = std::fs::read_to_string(path)?;
    }
    if cli.temperature.is_some() || cli.pressure.is_some() {
        config.telemetry.mode = TelemetryMode::Manual;
    }
    if cli.json {
        config.output.json = true;
    }
    config.validate()?;

    let client: Arc<dyn AnalysisClient> = match HttpAnalysisClient::from_config(&config.analysis)? {
        Some(client) => {
            info!(endpoint = client.endpoint(), "using remote analysis service");
            Arc::new(client)
        }
        None => {
            warn!("no analysis endpoint configured, using the offline analyzer");
            Arc::new(MockAnalysisClient::new())
        }
    };

    let monitor = Monitor::builder()
        .monitor_config(config.monitor.clone())
        .telemetry_config(config.telemetry.clone())
        .capture_config(config.capture.clone())
        .preprocess_config(config.preprocess.clone())
        .client(client)
        .camera(camera_device())
        .build();

    if let Some(value) = &cli.temperature {
        monitor.telemetry().set_temperature_input(value);
    }
    if let Some(value) = &cli.pressure {
        monitor.telemetry().set_pressure_input(value);
    }

    #[cfg(feature = "metrics")]
    spawn_metrics_exporter(&monitor, config.output.metrics_port)?;

    if let Some(path) = &cli.image {
        monitor.select_upload(Upload::from_path(path)?).await?;
    } else if let Some(path) = &cli.video {
        monitor.select_upload(Upload::video_from_path(path)?).await?;
    } else if cli.camera {
        #[cfg(not(feature = "camera"))]
        warn!("built without the camera feature, using a synthetic camera stream");
        monitor.select_camera().await?;
    } else {
        return Err("choose an input with --image, --video or --camera".into());
    }

    let stop = Arc::new(Notify::new());
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.notify_one())?;
    }

    let json = config.output.json;
    let events = monitor.subscribe();
    if cli.auto && monitor.set_auto_monitoring(true) {
        watch(&monitor, events, &stop, cli.cycles, json).await;
    } else {
        if cli.auto {
            warn!("auto-monitoring needs --camera or --video; running a single analysis");
        }
        match monitor.analyze_now().await {
            CycleOutcome::Published(entry) => print_entry(&entry, json),
            CycleOutcome::Failed(message) => eprintln!("analysis failed: {message}"),
            CycleOutcome::Skipped(reason) => eprintln!("nothing analyzed: {reason}"),
        }
    }

    monitor.shutdown().await;
    print_summary(&monitor, json);
    Ok(())
}

/// Prints results as they are published until stopped or `limit` is reached.
async fn watch(
    monitor: &Monitor,
    mut events: broadcast::Receiver<MonitorEvent>,
    stop: &Notify,
    limit: Option<usize>,
    json: bool,
) {
    let mut published = 0usize;

    loop {
        tokio::select! {
            _ = stop.notified() => {
                info!("interrupted, stopping auto-monitoring");
                break;
            }
            event = events.recv() => match event {
                Ok(MonitorEvent::ResultPublished { entry, .. }) => {
                    print_entry(&entry, json);
                    published += 1;
                }
                Ok(MonitorEvent::AnalysisFailed { message, .. }) => {
                    eprintln!("analysis failed: {message}");
                    published += 1;
                }
                Ok(MonitorEvent::AutoMonitoringChanged(false)) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }

        if limit.is_some_and(|n| published >= n) {
            break;
        }
    }
    monitor.set_auto_monitoring(false);
}

fn print_entry(entry: &HistoryEntry, json: bool) {
    if json {
        match serde_json::to_string(entry) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "failed to serialize history entry"),
        }
        return;
    }

    println!(
        "[{}] {:<8} {}",
        format_timestamp(entry.timestamp),
        entry.analysis.status,
        entry.telemetry
    );
    println!("  Observation:    {}", entry.analysis.observation);
    println!("  Deduction:      {}", entry.analysis.deduction);
    println!("  Recommendation: {}", entry.analysis.recommendation);
}

fn print_summary(monitor: &Monitor, json: bool) {
    if json {
        return;
    }
    if let Some(Publication::Error(message)) = monitor.publication() {
        println!("\nLast error: {message}");
    }

    let log = monitor.history_log();
    if log.is_empty() {
        return;
    }

    println!("\nLog (newest first):");
    for entry in &log {
        println!(
            "  {}  {:<8} {}",
            format_timestamp(entry.timestamp),
            entry.analysis.status,
            entry.analysis.observation
        );
    }

    let counts = monitor.status_counts();
    println!(
        "\nTrend ({} normal, {} warning, {} critical):",
        counts.normal, counts.warning, counts.critical
    );
    for point in monitor.trend() {
        println!(
            "  {}  {:>7.2} °C  {:>7.2} kPa  {}",
            format_timestamp(point.timestamp),
            point.temperature,
            point.pressure,
            point.status
        );
    }
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(feature = "camera")]
fn camera_device() -> Box<dyn CameraDevice> {
    Box::new(lab_monitor::capture::NokhwaCamera::new())
}

#[cfg(not(feature = "camera"))]
fn camera_device() -> Box<dyn CameraDevice> {
    Box::new(lab_monitor::MockCamera::new())
}

#[cfg(feature = "metrics")]
fn spawn_metrics_exporter(monitor: &Monitor, port: u16) -> Result<(), lab_monitor::metrics::MetricsError> {
    use lab_monitor::metrics::{MetricsRegistry, MetricsServer, MetricsServerConfig};

    if port == 0 {
        return Ok(());
    }

    let server = MetricsServer::new(MetricsServerConfig::with_port(port), MetricsRegistry::new()?);
    let handle = server.handle();
    let monitor = monitor.clone();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        loop {
            interval.tick().await;
            handle.update(&monitor.metrics_snapshot()).await;
        }
    });
    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            warn!(error = %e, "metrics server stopped");
        }
    });
    Ok(())
}
