//! Optional JSON Lines event log, one object per line.

use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use crate::pipeline::StopReason;
use crate::stats::{AggregateStats, FrameStats};

#[derive(Serialize)]
pub struct SessionLog {
    pub event: &'static str,
    pub timestamp: String,
    pub source: String,
    pub car_cascade: String,
    pub pedestrian_cascade: String,
    pub bus_cascade: String,
    pub scale_factor: f64,
    pub min_neighbors: i32,
    pub interactive_abort: bool,
    pub headless: bool,
}

#[derive(Serialize)]
pub struct FrameLog {
    pub event: &'static str,
    pub timestamp: String,
    pub frame_index: u64,
    pub cars: usize,
    pub pedestrians: usize,
    pub buses: usize,
    pub processing_time_secs: f64,
    // Cumulative totals
    pub total_cars: u64,
    pub total_pedestrians: u64,
    pub total_buses: u64,
}

impl FrameLog {
    pub fn new(frame: &FrameStats, totals: &AggregateStats) -> Self {
        Self {
            event: "frame",
            timestamp: timestamp_now(),
            frame_index: frame.frame_index,
            cars: frame.car_count,
            pedestrians: frame.pedestrian_count,
            buses: frame.bus_count,
            processing_time_secs: frame.processing_time.as_secs_f64(),
            total_cars: totals.total_car_count,
            total_pedestrians: totals.total_pedestrian_count,
            total_buses: totals.total_bus_count,
        }
    }
}

#[derive(Serialize)]
pub struct SummaryLog {
    pub event: &'static str,
    pub timestamp: String,
    pub total_frames: u64,
    pub total_cars: u64,
    pub total_pedestrians: u64,
    pub total_buses: u64,
    pub total_processing_time_secs: f64,
    // Null when no frame was processed
    pub fastest_frame_time_secs: Option<f64>,
    pub slowest_frame_time_secs: Option<f64>,
    pub average_processing_time_secs: Option<f64>,
    pub stop_reason: StopReason,
}

impl SummaryLog {
    pub fn new(stats: &AggregateStats, stop_reason: StopReason) -> Self {
        Self {
            event: "summary",
            timestamp: timestamp_now(),
            total_frames: stats.total_frames,
            total_cars: stats.total_car_count,
            total_pedestrians: stats.total_pedestrian_count,
            total_buses: stats.total_bus_count,
            total_processing_time_secs: stats.total_processing_time.as_secs_f64(),
            fastest_frame_time_secs: stats.fastest_frame_time().map(|t| t.as_secs_f64()),
            slowest_frame_time_secs: stats.slowest_frame_time().map(|t| t.as_secs_f64()),
            average_processing_time_secs: stats.average_processing_time(),
            stop_reason,
        }
    }
}

pub struct JsonLogger {
    writer: Box<dyn Write>,
}

impl JsonLogger {
    pub fn create(path: &Path) -> Result<Self> {
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(Self {
            writer: Box::new(BufWriter::new(file)),
        })
    }

    pub fn write_event<T: Serialize>(&mut self, event: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339()
}
