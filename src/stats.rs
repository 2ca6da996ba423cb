use std::time::Duration;

use crate::detection::{FrameDetections, ObjectClass};

/// Counts and detection time for a single frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameStats {
    /// 1-based position of the frame in the stream.
    pub frame_index: u64,
    pub car_count: usize,
    pub pedestrian_count: usize,
    pub bus_count: usize,
    /// Combined wall-clock time of the three detector calls.
    pub processing_time: Duration,
}

impl FrameStats {
    pub fn new(frame_index: u64, detections: &FrameDetections, processing_time: Duration) -> Self {
        Self {
            frame_index,
            car_count: detections.count(ObjectClass::Car),
            pedestrian_count: detections.count(ObjectClass::Pedestrian),
            bus_count: detections.count(ObjectClass::Bus),
            processing_time,
        }
    }
}

/// Running totals over every processed frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub total_frames: u64,
    pub total_car_count: u64,
    pub total_pedestrian_count: u64,
    pub total_bus_count: u64,
    pub total_processing_time: Duration,
    fastest: Option<Duration>,
    slowest: Option<Duration>,
}

impl AggregateStats {
    pub fn record(&mut self, frame: &FrameStats) {
        self.total_frames += 1;
        self.total_car_count += frame.car_count as u64;
        self.total_pedestrian_count += frame.pedestrian_count as u64;
        self.total_bus_count += frame.bus_count as u64;
        self.total_processing_time += frame.processing_time;

        let time = frame.processing_time;
        self.fastest = Some(self.fastest.map_or(time, |fastest| fastest.min(time)));
        self.slowest = Some(self.slowest.map_or(time, |slowest| slowest.max(time)));
    }

    /// `None` until a frame has been recorded.
    pub fn fastest_frame_time(&self) -> Option<Duration> {
        self.fastest
    }

    /// `None` until a frame has been recorded.
    pub fn slowest_frame_time(&self) -> Option<Duration> {
        self.slowest
    }

    /// Mean detection time in seconds, `None` when no frames were processed.
    pub fn average_processing_time(&self) -> Option<f64> {
        if self.total_frames == 0 {
            return None;
        }
        Some(self.total_processing_time.as_secs_f64() / self.total_frames as f64)
    }
}
