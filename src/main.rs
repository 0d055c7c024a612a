use anyhow::{Context, Result};
use clap::Parser;
use handsoff::alert::{AlertEvent, ChannelAlertSink};
use handsoff::capture::{FrameSource, WebcamCapture};
use handsoff::config::{Config, ConfigFile, ConfigOverrides};
use handsoff::frame::Orientation;
use handsoff::inference::{
    Embedder, FeaturePrintModel, HandSegmentationModel, HandSegmenter,
};
use handsoff::output::{PreviewMode, PreviewSink, V4L2Output};
use handsoff::pipeline::{Cycle, Pipeline};
use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const STATS_EVERY: u64 = 30;
const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Path to the image embedding model (ONNX file) used for movement detection
    #[arg(long)]
    feature_model: PathBuf,

    /// Path to the hand segmentation model (ONNX file)
    #[arg(long)]
    hand_model: PathBuf,

    /// TOML file with tuning values; re-read when it changes
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sampling rate while still (Hz)
    #[arg(long)]
    slow_hz: Option<f64>,

    /// Sampling rate after movement (Hz)
    #[arg(long)]
    fast_hz: Option<f64>,

    /// Fingerprint distance that counts as movement (lower is more sensitive)
    #[arg(long)]
    movement_threshold: Option<f32>,

    /// Mean hand-mask intensity per pixel (0-255) that counts as a touch
    #[arg(long)]
    coverage_threshold: Option<f64>,

    /// Seconds after movement before the scene is compared again
    #[arg(long)]
    movement_cooldown: Option<f64>,

    /// Seconds the touch suppression window runs after each touching frame
    #[arg(long)]
    touch_cooldown: Option<f64>,

    /// Mirror frames before hand segmentation and in the preview
    #[arg(long)]
    mirror: bool,

    /// v4l2loopback device to write a preview to
    #[arg(long)]
    preview_device: Option<PathBuf>,

    /// Preview resolution width
    #[arg(long, default_value_t = 640)]
    preview_width: u32,

    /// Preview resolution height
    #[arg(long, default_value_t = 480)]
    preview_height: u32,

    /// Show the hand mask instead of the camera image in the preview
    #[arg(long)]
    preview_mask: bool,

    /// Ring the terminal bell when a touch is detected
    #[arg(long)]
    bell: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            slow_hz: self.slow_hz,
            fast_hz: self.fast_hz,
            movement_threshold: self.movement_threshold,
            coverage_threshold: self.coverage_threshold,
            movement_cooldown_secs: self.movement_cooldown,
            touch_cooldown_secs: self.touch_cooldown,
        }
    }
}

/// Re-reads the config file now and then, keeping command line values on top
struct ConfigReloader {
    file: ConfigFile,
    cli: ConfigOverrides,
    last_poll: Instant,
}

impl ConfigReloader {
    fn poll(&mut self) -> Option<Config> {
        if self.last_poll.elapsed() < CONFIG_POLL_INTERVAL {
            return None;
        }
        self.last_poll = Instant::now();

        let overrides = match self.file.poll_changed()? {
            Ok(overrides) => overrides,
            Err(err) => {
                tracing::warn!("Keeping current configuration: {:#}", anyhow::Error::new(err));
                return None;
            }
        };
        tracing::info!("Reloading configuration from {}", self.file.path().display());

        match Config::default()
            .with_overrides(&overrides)
            .and_then(|config| config.with_overrides(&self.cli))
        {
            Ok(config) => Some(config),
            Err(err) => {
                tracing::warn!("Keeping current configuration: {}", err);
                None
            }
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("handsoff starting");

    // Defaults, then the config file, then the command line
    let cli = args.overrides();
    let (file, file_overrides) = match &args.config {
        Some(path) => {
            let (file, overrides) = ConfigFile::open(path).context("Failed to load config file")?;
            (Some(file), overrides)
        }
        None => (None, ConfigOverrides::default()),
    };
    let config = Config::default()
        .with_overrides(&file_overrides)
        .and_then(|config| config.with_overrides(&cli))
        .context("Invalid configuration")?;
    tracing::info!("Configuration: {:?}", config);

    let orientation = if args.mirror {
        Orientation::Mirrored
    } else {
        Orientation::Upright
    };

    // Initialize capture
    let mut capture = WebcamCapture::new(args.input_device, orientation)
        .context("Failed to initialize webcam capture")?;

    // Initialize models
    let embedder =
        FeaturePrintModel::new(&args.feature_model).context("Failed to load feature model")?;
    let segmenter = HandSegmentationModel::new(&args.hand_model)
        .context("Failed to load hand segmentation model")?
        .mirrored(args.mirror);
    let (in_w, in_h) = segmenter.input_size();
    let (out_w, out_h) = segmenter.output_size();
    tracing::info!(
        "Hand segmentation: {}x{} input, {}x{} mask",
        in_w,
        in_h,
        out_w,
        out_h
    );

    // Alerts are presented on their own thread
    let (alerts, events) = ChannelAlertSink::new();
    let _presenter = spawn_presenter(events, args.bell)?;

    let mut pipeline = Pipeline::new(config, embedder, segmenter, alerts)?;

    if let Some(device) = &args.preview_device {
        let mode = if args.preview_mask {
            PreviewMode::Mask
        } else {
            PreviewMode::Frame
        };
        let preview = V4L2Output::new(device, args.preview_width, args.preview_height, mode)
            .context("Failed to initialize v4l2loopback preview")?;
        let (width, height) = preview.resolution();
        tracing::info!("Preview at {}x{}", width, height);
        pipeline = pipeline.with_preview(Box::new(preview));
    }

    let reloader = file.map(|file| ConfigReloader {
        file,
        cli,
        last_poll: Instant::now(),
    });

    // Main loop
    run_pipeline(&mut capture, &mut pipeline, reloader)
}

fn spawn_presenter(events: Receiver<AlertEvent>, bell: bool) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("presenter".into())
        .spawn(move || {
            for event in events {
                match event {
                    AlertEvent::Movement(true) => tracing::info!("Movement detected, watching closely"),
                    AlertEvent::Movement(false) => tracing::info!("Scene still, idling"),
                    AlertEvent::Touch(true) => {
                        tracing::warn!("Stop touching your face!");
                        if bell {
                            let mut stdout = std::io::stdout();
                            let _ = stdout.write_all(b"\x07").and_then(|_| stdout.flush());
                        }
                    }
                    AlertEvent::Touch(false) => tracing::info!("Touch alert cleared"),
                }
            }
        })
        .context("Failed to start presenter thread")
}

fn run_pipeline<F, E, S>(
    capture: &mut F,
    pipeline: &mut Pipeline<E, S, ChannelAlertSink>,
    mut reloader: Option<ConfigReloader>,
) -> Result<()>
where
    F: FrameSource,
    E: Embedder,
    S: HandSegmenter,
{
    let started = Instant::now();
    let (width, height) = capture.resolution();

    tracing::info!("Starting main pipeline loop on {}x{} frames", width, height);
    tracing::info!("Press Ctrl+C to stop");

    loop {
        let frame = capture
            .next_frame()
            .context("Failed to capture frame")?;

        let cycle = pipeline.process(&frame);

        if let Some(config) = reloader.as_mut().and_then(ConfigReloader::poll) {
            // Already validated; a failure here has been logged by the pipeline
            let _ = pipeline.reconfigure(config);
        }

        if cycle == Cycle::Dropped {
            continue;
        }

        // Log stats every 30 analysed frames
        let stats = pipeline.stats();
        if stats.accepted % STATS_EVERY == 0 {
            let snapshot = pipeline.snapshot();
            let effective_hz = stats.accepted as f64 / started.elapsed().as_secs_f64();
            tracing::info!(
                "Frame {}: dropped={}, embed={:.1}ms, segment={:.1}ms, failures={}, rate={:?} target={:.1}Hz effective={:.1}Hz",
                stats.accepted,
                stats.dropped,
                stats.avg_embed_ms(),
                stats.avg_segment_ms(),
                stats.inference_failures,
                snapshot.level,
                snapshot.target_hz,
                effective_hz
            );
        }
    }
}
