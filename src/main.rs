use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use lampwatch::annotate::AnnotateOptions;
use lampwatch::capture::{self, CaptureSource, FrameRead, ImageSequence};
use lampwatch::output::{DirectorySink, OutputSink};
use lampwatch::{DetectorConfig, Detector, FrameState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Consecutive empty reads tolerated before a watch run gives up.
const MAX_CONSECUTIVE_RETRIES: u32 = 300;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Detector configuration (JSON). Missing fields take profile defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Built-in parameter profile, used when no --config is given
    #[arg(long, value_enum, default_value_t = Profile::Standard, global = true)]
    profile: Profile,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Profile {
    /// Median blur, ratio scoring with saturation/value gating
    Standard,
    /// Gaussian blur, raw pixel-count scoring
    Legacy,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect lamps in one image
    Detect {
        /// Input image
        #[arg(short, long)]
        image: PathBuf,

        /// Write the annotated image here
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Print the detection as JSON instead of a summary line
        #[arg(long)]
        json: bool,
    },

    /// Run detection continuously over a frame source
    Watch(WatchArgs),

    /// Serve the HTTP detection endpoint
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:5000")]
        bind: String,
    },
}

#[derive(clap::Args, Debug)]
struct WatchArgs {
    /// Directory of still frames (or a single image)
    #[arg(long, conflicts_with = "camera")]
    source: Option<PathBuf>,

    /// Camera device index (requires the `camera` feature)
    #[arg(long)]
    camera: Option<u32>,

    /// Rewind the frame directory when it runs out
    #[arg(long = "loop")]
    looping: bool,

    /// Frames are resized to this width before detection (0 keeps them as-is)
    #[arg(long, default_value_t = 800)]
    frame_width: u32,

    /// Target frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Save annotated frames and detections to this directory
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Save every Nth frame
    #[arg(long, default_value_t = 1)]
    save_every: u64,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,
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

    tracing::info!("lampwatch starting");

    let config = load_config(args.config.as_deref(), args.profile)?;
    let detector = Detector::new(config).context("Invalid detector configuration")?;
    tracing::debug!("Detector config: {:?}", detector.config());

    match args.command {
        Command::Detect { image, out, json } => detect_one(&detector, &image, out.as_deref(), json),
        Command::Watch(watch) => watch_source(&detector, &watch),
        Command::Serve { bind } => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            runtime.block_on(lampwatch::server::serve(Arc::new(detector), &bind))
        }
    }
}

fn load_config(path: Option<&Path>, profile: Profile) -> Result<DetectorConfig> {
    match path {
        Some(path) => {
            tracing::info!("Loading detector config from {}", path.display());
            DetectorConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))
        }
        None => {
            tracing::info!("Using {:?} profile", profile);
            Ok(match profile {
                Profile::Standard => DetectorConfig::standard(),
                Profile::Legacy => DetectorConfig::legacy(),
            })
        }
    }
}

fn detect_one(detector: &Detector, image: &Path, out: Option<&Path>, json: bool) -> Result<()> {
    let frame = image::open(image)
        .with_context(|| format!("Failed to read {}", image.display()))?
        .to_rgb8();
    tracing::info!("Loaded {} ({}x{})", image.display(), frame.width(), frame.height());

    let start = Instant::now();
    let (annotated, detection) = detector
        .process(&frame, &AnnotateOptions::default())
        .context("Detection failed")?;
    tracing::info!(
        "Detection took {:.1}ms, {} candidate regions",
        start.elapsed().as_secs_f64() * 1000.0,
        detection.verdicts.len()
    );

    if let Some(out) = out {
        annotated
            .save(out)
            .with_context(|| format!("Failed to write {}", out.display()))?;
        tracing::info!("Annotated image written to {}", out.display());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&detection)?);
    } else {
        let colors: Vec<&str> = detection.detected_colors.iter().map(|c| c.name()).collect();
        println!("{} [{}]", detection.state.status_message(), colors.join(", "));
    }
    Ok(())
}

fn watch_source(detector: &Detector, args: &WatchArgs) -> Result<()> {
    let mut source = open_source(args)?;
    let mut sink = args
        .save_dir
        .as_ref()
        .map(|dir| DirectorySink::new(dir, args.save_every))
        .transpose()?;

    run_pipeline(
        &mut *source,
        sink.as_mut().map(|s| s as &mut dyn OutputSink),
        detector,
        args,
    )?;

    if let Some(sink) = sink {
        tracing::info!("Saved {} frames", sink.written());
    }
    Ok(())
}

fn open_source(args: &WatchArgs) -> Result<Box<dyn CaptureSource>> {
    if let Some(dir) = &args.source {
        let source = ImageSequence::open(dir, args.looping).context("Failed to open frame source")?;
        return Ok(Box::new(source));
    }
    match args.camera {
        Some(index) => open_camera(index),
        None => bail!("watch needs --source <DIR> or --camera <INDEX>"),
    }
}

#[cfg(feature = "camera")]
fn open_camera(index: u32) -> Result<Box<dyn CaptureSource>> {
    let camera = capture::WebcamCapture::new(index).context("Failed to initialize camera capture")?;
    Ok(Box::new(camera))
}

#[cfg(not(feature = "camera"))]
fn open_camera(_index: u32) -> Result<Box<dyn CaptureSource>> {
    bail!("Camera input is not compiled in; rebuild with --features camera")
}

fn run_pipeline(
    source: &mut dyn CaptureSource,
    mut output: Option<&mut dyn OutputSink>,
    detector: &Detector,
    args: &WatchArgs,
) -> Result<()> {
    let frame_duration = Duration::from_secs_f32(1.0 / args.fps.max(1) as f32);
    let options = AnnotateOptions::default();
    let mut frame_count = 0u64;
    let mut retries = 0u32;
    let mut last_state: Option<FrameState> = None;
    let mut total_capture_time = Duration::ZERO;
    let mut total_detect_time = Duration::ZERO;
    let mut total_output_time = Duration::ZERO;

    tracing::info!("Starting main pipeline loop");
    tracing::info!("Press Ctrl+C to stop");

    loop {
        if args.max_frames.is_some_and(|max| frame_count >= max) {
            tracing::info!("Reached {} frames, stopping", frame_count);
            break;
        }
        let loop_start = Instant::now();

        // Capture frame
        let capture_start = Instant::now();
        let frame = match source.capture_frame().context("Failed to capture frame")? {
            FrameRead::Frame(frame) => {
                retries = 0;
                if frame_count == 0 {
                    let (width, height) = source.resolution();
                    tracing::info!("Source resolution: {}x{}", width, height);
                }
                capture::fit_width(frame, args.frame_width)
            }
            FrameRead::Retry => {
                retries += 1;
                if retries >= MAX_CONSECUTIVE_RETRIES {
                    bail!("No usable frame after {} attempts", retries);
                }
                continue;
            }
            FrameRead::EndOfStream => {
                tracing::info!("Frame source exhausted after {} frames", frame_count);
                break;
            }
        };
        total_capture_time += capture_start.elapsed();

        // Detect
        let detect_start = Instant::now();
        let (annotated, detection) = detector
            .process(&frame, &options)
            .context("Failed to process frame")?;
        total_detect_time += detect_start.elapsed();

        if last_state != Some(detection.state) {
            tracing::info!(
                "Frame {}: state {} (colors {:?})",
                frame_count + 1,
                detection.state,
                detection.detected_colors
            );
            last_state = Some(detection.state);
        }

        // Output frame
        let output_start = Instant::now();
        if let Some(output) = output.as_deref_mut() {
            output
                .write_frame(&annotated, &detection)
                .context("Failed to write frame")?;
        }
        total_output_time += output_start.elapsed();

        frame_count += 1;

        // Log stats every 30 frames
        if frame_count % 30 == 0 {
            let avg_capture_ms = total_capture_time.as_secs_f64() * 1000.0 / frame_count as f64;
            let avg_detect_ms = total_detect_time.as_secs_f64() * 1000.0 / frame_count as f64;
            let avg_output_ms = total_output_time.as_secs_f64() * 1000.0 / frame_count as f64;
            let total_ms = avg_capture_ms + avg_detect_ms + avg_output_ms;

            tracing::info!(
                "Frame {}: capture={:.1}ms, detect={:.1}ms, output={:.1}ms, total={:.1}ms, fps={:.1}",
                frame_count,
                avg_capture_ms,
                avg_detect_ms,
                avg_output_ms,
                total_ms,
                1000.0 / total_ms.max(f64::EPSILON)
            );
        }

        // Frame rate limiting
        let elapsed = loop_start.elapsed();
        if elapsed < frame_duration {
            std::thread::sleep(frame_duration - elapsed);
        }
    }

    Ok(())
}
