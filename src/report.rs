use anyhow::Result;
use std::io::Write;

use crate::stats::{AggregateStats, FrameStats};

pub fn write_frame_line<W: Write + ?Sized>(out: &mut W, frame: &FrameStats) -> Result<()> {
    writeln!(
        out,
        "Frame {} - Cars detected: {}, Pedestrians detected: {}, Buses detected: {}",
        frame.frame_index, frame.car_count, frame.pedestrian_count, frame.bus_count
    )?;
    Ok(())
}

/// Writes the end-of-run block. Timing lines other than the total are
/// replaced by a notice when no frame was processed.
pub fn write_summary<W: Write + ?Sized>(out: &mut W, stats: &AggregateStats) -> Result<()> {
    writeln!(out, "Total # of Frames:  {}", stats.total_frames)?;
    writeln!(
        out,
        "Total objects detected - Cars: {}, Pedestrians: {}, Buses: {}",
        stats.total_car_count, stats.total_pedestrian_count, stats.total_bus_count
    )?;
    writeln!(
        out,
        "Total Processing Time for all frames: {:.2} seconds",
        stats.total_processing_time.as_secs_f64()
    )?;

    match (
        stats.fastest_frame_time(),
        stats.slowest_frame_time(),
        stats.average_processing_time(),
    ) {
        (Some(fastest), Some(slowest), Some(average)) => {
            writeln!(
                out,
                "Fastest frame processing time: {:.2} seconds",
                fastest.as_secs_f64()
            )?;
            writeln!(
                out,
                "Slowest frame processing time: {:.2} seconds",
                slowest.as_secs_f64()
            )?;
            writeln!(out, "Average processing time per frame: {:.2} seconds", average)?;
        }
        _ => {
            writeln!(
                out,
                "No frames processed; frame timing statistics are unavailable."
            )?;
        }
    }
    out.flush()?;
    Ok(())
}
