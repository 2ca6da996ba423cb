use anyhow::Result;
use clap::Parser;
use roadcount::cli::Args;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();
    run(args)
}

#[cfg(feature = "opencv")]
fn run(args: Args) -> Result<()> {
    use roadcount::{
        detection::DetectorSet,
        json_log::{timestamp_now, JsonLogger, SessionLog},
        opencv_backend::{CascadeDetector, ColorFrame, VideoFileSource, Window},
        pipeline::{FrameDisplay, FrameProcessor, HeadlessDisplay, StopReason},
    };

    let config = args.processor_config()?;

    let detectors = DetectorSet::new(
        CascadeDetector::load(&args.car_cascade)?,
        CascadeDetector::load(&args.pedestrian_cascade)?,
        CascadeDetector::load(&args.bus_cascade)?,
    );
    tracing::info!(
        "Loaded cascades: car={}, pedestrian={}, bus={}",
        args.car_cascade.display(),
        args.pedestrian_cascade.display(),
        args.bus_cascade.display()
    );

    let mut source = VideoFileSource::open(&args.video)?;

    let mut json_logger = match args.log_json.as_ref() {
        Some(path) => Some(JsonLogger::create(path)?),
        None => None,
    };

    if let Some(logger) = json_logger.as_mut() {
        let session = SessionLog {
            event: "session_start",
            timestamp: timestamp_now(),
            source: args.video.display().to_string(),
            car_cascade: args.car_cascade.display().to_string(),
            pedestrian_cascade: args.pedestrian_cascade.display().to_string(),
            bus_cascade: args.bus_cascade.display().to_string(),
            scale_factor: config.params.scale_factor,
            min_neighbors: config.params.min_neighbors,
            interactive_abort: config.interactive_abort,
            headless: args.headless,
        };
        logger.write_event(&session)?;
        logger.flush()?;
    }

    let window_name = "Video";
    let mut display: Box<dyn FrameDisplay<ColorFrame>> = if args.headless {
        Box::new(HeadlessDisplay)
    } else {
        match Window::open(window_name, args.frame_delay_ms) {
            Ok(window) => Box::new(window),
            Err(err) => {
                tracing::warn!("Failed to open display window: {}. Running headless.", err);
                Box::new(HeadlessDisplay)
            }
        }
    };

    let mut processor = FrameProcessor::new(detectors, config);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let outcome = processor.run(&mut source, &mut display, &mut out, json_logger.as_mut())?;

    match outcome.stop_reason {
        StopReason::EndOfStream => tracing::info!("Reached end of {}", args.video.display()),
        StopReason::Aborted => tracing::info!("Stopped early by user"),
    }
    Ok(())
}

#[cfg(not(feature = "opencv"))]
fn run(_args: Args) -> Result<()> {
    anyhow::bail!("roadcount was built without the `opencv` feature; video processing is unavailable")
}
