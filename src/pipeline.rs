//! The read, detect, draw, display and report loop.
//!
//! The loop is written against small traits so it can run over OpenCV
//! (`crate::opencv_backend`) or over scripted frames in tests.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::time::Instant;

use crate::detection::{DetectorParams, DetectorSet, FrameDetections, ObjectDetector, OUTLINE_THICKNESS};
use crate::geometry::{Bgr, BoundingBox};
use crate::json_log::{FrameLog, JsonLogger, SummaryLog};
use crate::report;
use crate::stats::{AggregateStats, FrameStats};

/// A decoded color frame.
pub trait Frame {
    /// Single-channel image the detectors run on.
    type Intensity;

    fn to_intensity(&self) -> Result<Self::Intensity>;

    /// Draws a rectangle outline with corners `bbox.top_left()` and
    /// `bbox.bottom_right()` onto this frame.
    fn draw_outline(&mut self, bbox: &BoundingBox, color: Bgr, thickness: i32) -> Result<()>;
}

pub trait FrameSource {
    type Frame: Frame;

    /// Next frame in arrival order, `None` at end of stream. Decode
    /// failures also end the stream.
    fn next_frame(&mut self) -> Option<Self::Frame>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayEvent {
    Continue,
    AbortRequested,
}

pub trait FrameDisplay<F: ?Sized> {
    fn present(&mut self, frame: &F) -> Result<DisplayEvent>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<F: ?Sized, V: FrameDisplay<F> + ?Sized> FrameDisplay<F> for Box<V> {
    fn present(&mut self, frame: &F) -> Result<DisplayEvent> {
        (**self).present(frame)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Display that shows nothing and never asks to stop.
#[derive(Debug, Default)]
pub struct HeadlessDisplay;

impl<F: ?Sized> FrameDisplay<F> for HeadlessDisplay {
    fn present(&mut self, _frame: &F) -> Result<DisplayEvent> {
        Ok(DisplayEvent::Continue)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProcessorConfig {
    pub params: DetectorParams,
    /// Stop when the display reports an abort key.
    pub interactive_abort: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            params: DetectorParams::default(),
            interactive_abort: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndOfStream,
    Aborted,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOutcome {
    pub stats: AggregateStats,
    pub stop_reason: StopReason,
}

pub struct FrameProcessor<D> {
    detectors: DetectorSet<D>,
    config: ProcessorConfig,
    stats: AggregateStats,
}

impl<D> FrameProcessor<D> {
    pub fn new(detectors: DetectorSet<D>, config: ProcessorConfig) -> Self {
        Self {
            detectors,
            config,
            stats: AggregateStats::default(),
        }
    }

    /// Detects, records and draws one frame. Only the detector calls are timed.
    pub fn process_frame<F>(&mut self, frame: &mut F) -> Result<FrameStats>
    where
        F: Frame,
        D: ObjectDetector<F::Intensity>,
    {
        let intensity = frame
            .to_intensity()
            .context("Failed to convert to grayscale")?;

        let started = Instant::now();
        let detections = self.detectors.detect_all(&intensity, &self.config.params)?;
        let processing_time = started.elapsed();

        let frame_stats = FrameStats::new(self.stats.total_frames + 1, &detections, processing_time);
        self.stats.record(&frame_stats);

        draw_detections(frame, &detections)?;
        Ok(frame_stats)
    }

    /// Runs until the source is exhausted or an abort is requested, then
    /// closes the display and writes the summary. The display is also
    /// closed when a frame fails.
    pub fn run<S, V, W>(
        &mut self,
        source: &mut S,
        display: &mut V,
        out: &mut W,
        mut json_log: Option<&mut JsonLogger>,
    ) -> Result<RunOutcome>
    where
        S: FrameSource + ?Sized,
        V: FrameDisplay<S::Frame> + ?Sized,
        W: Write + ?Sized,
        D: ObjectDetector<<S::Frame as Frame>::Intensity>,
    {
        let stop_reason = match self.process_stream(source, display, out, json_log.as_deref_mut()) {
            Ok(stop_reason) => stop_reason,
            Err(err) => {
                if let Err(close_err) = display.close() {
                    tracing::warn!("Failed to release display: {}", close_err);
                }
                return Err(err);
            }
        };

        display.close()?;

        report::write_summary(out, &self.stats)?;
        if let Some(logger) = json_log.as_deref_mut() {
            logger.write_event(&SummaryLog::new(&self.stats, stop_reason))?;
            logger.flush()?;
        }

        Ok(RunOutcome {
            stats: self.stats.clone(),
            stop_reason,
        })
    }

    fn process_stream<S, V, W>(
        &mut self,
        source: &mut S,
        display: &mut V,
        out: &mut W,
        mut json_log: Option<&mut JsonLogger>,
    ) -> Result<StopReason>
    where
        S: FrameSource + ?Sized,
        V: FrameDisplay<S::Frame> + ?Sized,
        W: Write + ?Sized,
        D: ObjectDetector<<S::Frame as Frame>::Intensity>,
    {
        while let Some(mut frame) = source.next_frame() {
            let frame_stats = self.process_frame(&mut frame)?;

            let event = display.present(&frame)?;
            report::write_frame_line(out, &frame_stats)?;
            if let Some(logger) = json_log.as_deref_mut() {
                logger.write_event(&FrameLog::new(&frame_stats, &self.stats))?;
            }

            if event == DisplayEvent::AbortRequested {
                if self.config.interactive_abort {
                    tracing::info!("Abort requested after frame {}", frame_stats.frame_index);
                    return Ok(StopReason::Aborted);
                }
                tracing::debug!("Ignoring abort key, interactive abort is disabled");
            }
        }
        Ok(StopReason::EndOfStream)
    }
}

/// Outlines every detection in its class color, in class order.
pub fn draw_detections<F: Frame + ?Sized>(frame: &mut F, detections: &FrameDetections) -> Result<()> {
    for (class, rects) in detections.iter() {
        let color = class.outline_color();
        for rect in rects {
            frame.draw_outline(rect, color, OUTLINE_THICKNESS)?;
        }
    }
    Ok(())
}
