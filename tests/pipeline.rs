use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::{bail, Result};
use roadcount::detection::{DetectorParams, DetectorSet, ObjectDetector};
use roadcount::geometry::{Bgr, BoundingBox};
use roadcount::json_log::JsonLogger;
use roadcount::pipeline::{
    DisplayEvent, Frame, FrameDisplay, FrameProcessor, FrameSource, HeadlessDisplay,
    ProcessorConfig, StopReason,
};

/// What each detector should report for one synthetic frame.
#[derive(Clone, Default)]
struct Scene {
    cars: Vec<BoundingBox>,
    pedestrians: Vec<BoundingBox>,
    buses: Vec<BoundingBox>,
}

struct SyntheticFrame {
    scene: Scene,
    outlines: Vec<(BoundingBox, Bgr, i32)>,
}

impl Frame for SyntheticFrame {
    type Intensity = Scene;

    fn to_intensity(&self) -> Result<Scene> {
        Ok(self.scene.clone())
    }

    fn draw_outline(&mut self, bbox: &BoundingBox, color: Bgr, thickness: i32) -> Result<()> {
        self.outlines.push((*bbox, color, thickness));
        Ok(())
    }
}

struct SyntheticVideo {
    frames: VecDeque<Scene>,
}

impl SyntheticVideo {
    fn new(scenes: Vec<Scene>) -> Self {
        Self {
            frames: scenes.into(),
        }
    }

    fn blank(n: usize) -> Self {
        Self::new(vec![Scene::default(); n])
    }
}

impl FrameSource for SyntheticVideo {
    type Frame = SyntheticFrame;

    fn next_frame(&mut self) -> Option<SyntheticFrame> {
        self.frames.pop_front().map(|scene| SyntheticFrame {
            scene,
            outlines: Vec::new(),
        })
    }
}

#[derive(Clone, Copy)]
enum Which {
    Car,
    Pedestrian,
    Bus,
}

/// Reads the scripted answer for its class out of the intensity image.
struct ScriptedDetector {
    which: Which,
    calls: Rc<RefCell<Vec<DetectorParams>>>,
}

impl ObjectDetector<Scene> for ScriptedDetector {
    fn detect(&mut self, image: &Scene, params: &DetectorParams) -> Result<Vec<BoundingBox>> {
        self.calls.borrow_mut().push(*params);
        Ok(match self.which {
            Which::Car => image.cars.clone(),
            Which::Pedestrian => image.pedestrians.clone(),
            Which::Bus => image.buses.clone(),
        })
    }
}

fn detectors(calls: &Rc<RefCell<Vec<DetectorParams>>>) -> DetectorSet<ScriptedDetector> {
    let make = |which| ScriptedDetector {
        which,
        calls: Rc::clone(calls),
    };
    DetectorSet::new(make(Which::Car), make(Which::Pedestrian), make(Which::Bus))
}

/// Records presented frames and asks to stop after a given frame.
struct RecordingDisplay {
    abort_after: Option<usize>,
    fail_on: Option<usize>,
    presented: Vec<Vec<(BoundingBox, Bgr, i32)>>,
    closed: bool,
}

impl RecordingDisplay {
    fn new(abort_after: Option<usize>) -> Self {
        Self {
            abort_after,
            fail_on: None,
            presented: Vec::new(),
            closed: false,
        }
    }
}

impl FrameDisplay<SyntheticFrame> for RecordingDisplay {
    fn present(&mut self, frame: &SyntheticFrame) -> Result<DisplayEvent> {
        self.presented.push(frame.outlines.clone());
        if self.fail_on == Some(self.presented.len()) {
            bail!("window lost");
        }
        if self.abort_after == Some(self.presented.len()) {
            Ok(DisplayEvent::AbortRequested)
        } else {
            Ok(DisplayEvent::Continue)
        }
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

fn three_frame_video() -> SyntheticVideo {
    SyntheticVideo::new(vec![
        Scene::default(),
        Scene {
            cars: vec![BoundingBox::new(12, 30, 40, 20)],
            ..Scene::default()
        },
        Scene {
            pedestrians: vec![BoundingBox::new(200, 80, 16, 48)],
            buses: vec![BoundingBox::new(5, 5, 120, 90)],
            ..Scene::default()
        },
    ])
}

#[test]
fn three_frame_video_reports_each_frame_and_totals() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let mut processor = FrameProcessor::new(detectors(&calls), ProcessorConfig::default());
    let mut source = three_frame_video();
    let mut display = RecordingDisplay::new(None);
    let mut out = Vec::new();

    let outcome = processor
        .run(&mut source, &mut display, &mut out, None)
        .unwrap();

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        &lines[..3],
        &[
            "Frame 1 - Cars detected: 0, Pedestrians detected: 0, Buses detected: 0",
            "Frame 2 - Cars detected: 1, Pedestrians detected: 0, Buses detected: 0",
            "Frame 3 - Cars detected: 0, Pedestrians detected: 1, Buses detected: 1",
        ]
    );
    assert_eq!(lines[3], "Total # of Frames:  3");
    assert_eq!(
        lines[4],
        "Total objects detected - Cars: 1, Pedestrians: 1, Buses: 1"
    );
    assert!(lines[8].starts_with("Average processing time per frame: "));

    assert_eq!(outcome.stop_reason, StopReason::EndOfStream);
    let stats = &outcome.stats;
    assert_eq!(stats.total_frames, 3);
    assert_eq!(stats.total_car_count, 1);
    assert_eq!(stats.total_pedestrian_count, 1);
    assert_eq!(stats.total_bus_count, 1);
    assert!(stats.fastest_frame_time().unwrap() <= stats.slowest_frame_time().unwrap());
    let average = stats.average_processing_time().unwrap();
    assert!((average - stats.total_processing_time.as_secs_f64() / 3.0).abs() < 1e-12);

    assert!(display.closed);
}

#[test]
fn every_detector_gets_default_params_every_frame() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let mut processor = FrameProcessor::new(detectors(&calls), ProcessorConfig::default());
    processor
        .run(&mut three_frame_video(), &mut HeadlessDisplay, &mut Vec::new(), None)
        .unwrap();

    let calls = calls.borrow();
    assert_eq!(calls.len(), 9);
    assert!(calls.iter().all(|params| *params == DetectorParams::default()));
}

#[test]
fn annotated_frames_are_presented_with_class_colors() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let mut processor = FrameProcessor::new(detectors(&calls), ProcessorConfig::default());
    let mut display = RecordingDisplay::new(None);
    processor
        .run(&mut three_frame_video(), &mut display, &mut Vec::new(), None)
        .unwrap();

    assert_eq!(
        display.presented,
        vec![
            vec![],
            vec![(BoundingBox::new(12, 30, 40, 20), Bgr::RED, 2)],
            vec![
                (BoundingBox::new(200, 80, 16, 48), Bgr::BLUE, 2),
                (BoundingBox::new(5, 5, 120, 90), Bgr::WHITE, 2),
            ],
        ]
    );
}

#[test]
fn abort_after_second_frame_stops_the_run() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let mut processor = FrameProcessor::new(detectors(&calls), ProcessorConfig::default());
    let mut source = SyntheticVideo::new(vec![
        Scene {
            cars: vec![BoundingBox::new(0, 0, 10, 10)],
            ..Scene::default()
        },
        Scene {
            buses: vec![BoundingBox::new(0, 0, 50, 30)],
            ..Scene::default()
        },
        Scene {
            cars: vec![BoundingBox::new(0, 0, 10, 10); 4],
            ..Scene::default()
        },
        Scene::default(),
        Scene::default(),
    ]);
    let mut display = RecordingDisplay::new(Some(2));
    let mut out = Vec::new();

    let outcome = processor
        .run(&mut source, &mut display, &mut out, None)
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::Aborted);
    assert_eq!(outcome.stats.total_frames, 2);
    assert_eq!(outcome.stats.total_car_count, 1);
    assert_eq!(outcome.stats.total_bus_count, 1);
    assert_eq!(display.presented.len(), 2);
    assert!(display.closed);

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Frame 2 - "));
    assert!(!text.contains("Frame 3 - "));
    assert!(text.contains("Total # of Frames:  2"));
}

#[test]
fn abort_key_is_ignored_when_disabled() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let config = ProcessorConfig {
        interactive_abort: false,
        ..ProcessorConfig::default()
    };
    let mut processor = FrameProcessor::new(detectors(&calls), config);
    let mut display = RecordingDisplay::new(Some(2));

    let outcome = processor
        .run(&mut SyntheticVideo::blank(5), &mut display, &mut Vec::new(), None)
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::EndOfStream);
    assert_eq!(outcome.stats.total_frames, 5);
}

#[test]
fn empty_video_reports_no_frames_without_average() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let mut processor = FrameProcessor::new(detectors(&calls), ProcessorConfig::default());
    let mut display = RecordingDisplay::new(None);
    let mut out = Vec::new();

    let outcome = processor
        .run(&mut SyntheticVideo::blank(0), &mut display, &mut out, None)
        .unwrap();

    assert_eq!(outcome.stats.total_frames, 0);
    assert_eq!(outcome.stats.average_processing_time(), None);
    assert!(display.closed);
    assert!(calls.borrow().is_empty());

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Total # of Frames:  0"));
    assert!(text.contains("No frames processed"));
    assert!(!text.contains("Average processing time"));
}

#[test]
fn json_log_has_one_event_per_frame_then_summary() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.jsonl");
    let mut logger = JsonLogger::create(&path).unwrap();

    let calls = Rc::new(RefCell::new(Vec::new()));
    let mut processor = FrameProcessor::new(detectors(&calls), ProcessorConfig::default());
    processor
        .run(
            &mut three_frame_video(),
            &mut HeadlessDisplay,
            &mut Vec::new(),
            Some(&mut logger),
        )
        .unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let events: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(events.len(), 4);
    for (i, event) in events[..3].iter().enumerate() {
        assert_eq!(event["event"], "frame");
        assert_eq!(event["frame_index"], i as u64 + 1);
    }
    assert_eq!(events[1]["cars"], 1);
    assert_eq!(events[2]["total_buses"], 1);

    let summary = &events[3];
    assert_eq!(summary["event"], "summary");
    assert_eq!(summary["total_frames"], 3);
    assert_eq!(summary["stop_reason"], "end_of_stream");
    assert!(summary["average_processing_time_secs"].is_f64());
}

#[test]
fn failed_frame_still_releases_display() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let mut processor = FrameProcessor::new(detectors(&calls), ProcessorConfig::default());
    let mut display = RecordingDisplay {
        fail_on: Some(2),
        ..RecordingDisplay::new(None)
    };
    let mut out = Vec::new();

    let err = processor
        .run(&mut SyntheticVideo::blank(4), &mut display, &mut out, None)
        .unwrap_err();

    assert_eq!(err.to_string(), "window lost");
    assert!(display.closed);
    assert_eq!(display.presented.len(), 2);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Frame 1 - "));
    assert!(!text.contains("Total # of Frames"));
}
