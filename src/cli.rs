use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::detection::DetectorParams;
use crate::pipeline::ProcessorConfig;

#[derive(Parser, Debug)]
#[command(name = "roadcount", about = "Haar cascade car, pedestrian and bus counting")]
pub struct Args {
    #[arg(long, value_name = "PATH", env = "ROADCOUNT_VIDEO", default_value = "video.mp4")]
    pub video: PathBuf,
    #[arg(long, value_name = "PATH", env = "ROADCOUNT_CAR_CASCADE", default_value = "cars.xml")]
    pub car_cascade: PathBuf,
    #[arg(
        long,
        value_name = "PATH",
        env = "ROADCOUNT_PEDESTRIAN_CASCADE",
        default_value = "pedestrian.xml"
    )]
    pub pedestrian_cascade: PathBuf,
    #[arg(long, value_name = "PATH", env = "ROADCOUNT_BUS_CASCADE", default_value = "bus.xml")]
    pub bus_cascade: PathBuf,
    #[arg(long, default_value_t = 1.1)]
    pub scale_factor: f64,
    #[arg(long, default_value_t = 1)]
    pub min_neighbors: i32,
    /// Milliseconds to wait for a key press after each displayed frame
    #[arg(long, default_value_t = 33)]
    pub frame_delay_ms: i32,
    /// Ignore the Esc key instead of stopping early
    #[arg(long)]
    pub no_abort: bool,
    #[arg(long)]
    pub headless: bool,
    #[arg(long, value_name = "PATH", env = "ROADCOUNT_LOG_JSON")]
    pub log_json: Option<PathBuf>,
}

impl Args {
    pub fn processor_config(&self) -> Result<ProcessorConfig> {
        if !(self.scale_factor > 1.0) {
            bail!("--scale-factor must be greater than 1.0, got {}", self.scale_factor);
        }
        if self.min_neighbors < 0 {
            bail!("--min-neighbors must not be negative, got {}", self.min_neighbors);
        }
        // wait_key(0) blocks until a key press
        if self.frame_delay_ms < 1 {
            bail!("--frame-delay-ms must be at least 1, got {}", self.frame_delay_ms);
        }
        Ok(ProcessorConfig {
            params: DetectorParams {
                scale_factor: self.scale_factor,
                min_neighbors: self.min_neighbors,
            },
            interactive_abort: !self.no_abort,
        })
    }
}
