//! OpenCV implementations of the pipeline traits: video decoding, Haar
//! cascade detection, drawing and the highgui window.

use anyhow::{bail, Context, Result};
use opencv::{
    core::{self, Mat, Rect, Scalar, Size},
    highgui, imgproc, objdetect,
    prelude::*,
    videoio,
};
use std::path::Path;

use crate::detection::{DetectorParams, ObjectDetector};
use crate::geometry::{Bgr, BoundingBox, Point};
use crate::pipeline::{DisplayEvent, Frame, FrameDisplay, FrameSource};

const ESCAPE_KEY: i32 = 27;

impl From<Rect> for BoundingBox {
    fn from(rect: Rect) -> Self {
        BoundingBox::new(rect.x, rect.y, rect.width, rect.height)
    }
}

impl From<Point> for core::Point {
    fn from(point: Point) -> Self {
        core::Point::new(point.x, point.y)
    }
}

impl From<Bgr> for Scalar {
    fn from(color: Bgr) -> Self {
        Scalar::new(color.b as f64, color.g as f64, color.r as f64, 0.0)
    }
}

pub fn ensure_file_exists(path: &Path, what: &str) -> Result<()> {
    if !path.is_file() {
        bail!("Required {} file missing: {}", what, path.display());
    }
    Ok(())
}

/// BGR frame as decoded from the video.
pub struct ColorFrame(Mat);

impl ColorFrame {
    pub fn mat(&self) -> &Mat {
        &self.0
    }
}

/// Single-channel frame handed to the cascades.
pub struct GrayFrame(Mat);

impl Frame for ColorFrame {
    type Intensity = GrayFrame;

    fn to_intensity(&self) -> Result<GrayFrame> {
        let mut gray = Mat::default();
        imgproc::cvt_color(
            &self.0,
            &mut gray,
            imgproc::COLOR_BGR2GRAY,
            0,
            core::AlgorithmHint::ALGO_HINT_DEFAULT,
        )?;
        Ok(GrayFrame(gray))
    }

    fn draw_outline(&mut self, bbox: &BoundingBox, color: Bgr, thickness: i32) -> Result<()> {
        imgproc::rectangle_points(
            &mut self.0,
            bbox.top_left().into(),
            bbox.bottom_right().into(),
            color.into(),
            thickness,
            imgproc::LINE_8,
            0,
        )?;
        Ok(())
    }
}

pub struct VideoFileSource {
    capture: videoio::VideoCapture,
    source: String,
}

impl VideoFileSource {
    pub fn open(path: &Path) -> Result<Self> {
        ensure_file_exists(path, "video")?;
        let source = path.to_string_lossy().to_string();
        let capture = videoio::VideoCapture::from_file(&source, videoio::CAP_ANY)
            .with_context(|| format!("Failed to open input source: {}", source))?;
        if !capture.is_opened()? {
            bail!("Failed to open input source: {}", source);
        }
        Ok(Self { capture, source })
    }
}

impl FrameSource for VideoFileSource {
    type Frame = ColorFrame;

    fn next_frame(&mut self) -> Option<ColorFrame> {
        let mut frame = Mat::default();
        match self.capture.read(&mut frame) {
            Ok(true) if !frame.empty() => Some(ColorFrame(frame)),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!("Failed to decode frame from {}: {}. Treating as end of stream.", self.source, err);
                None
            }
        }
    }
}

pub struct CascadeDetector {
    classifier: objdetect::CascadeClassifier,
    hits: core::Vector<Rect>,
}

impl CascadeDetector {
    pub fn load(path: &Path) -> Result<Self> {
        ensure_file_exists(path, "cascade")?;
        let classifier = objdetect::CascadeClassifier::new(
            path.to_str()
                .with_context(|| format!("Cascade path is invalid: {}", path.display()))?,
        )
        .with_context(|| format!("Failed to load cascade {}", path.display()))?;
        if classifier.empty()? {
            bail!("Cascade {} could not be parsed", path.display());
        }
        Ok(Self {
            classifier,
            hits: core::Vector::new(),
        })
    }
}

impl ObjectDetector<GrayFrame> for CascadeDetector {
    fn detect(&mut self, image: &GrayFrame, params: &DetectorParams) -> Result<Vec<BoundingBox>> {
        self.hits.clear();
        self.classifier.detect_multi_scale(
            &image.0,
            &mut self.hits,
            params.scale_factor,
            params.min_neighbors,
            0,
            Size::default(),
            Size::default(),
        )?;
        Ok(self.hits.iter().map(BoundingBox::from).collect())
    }
}

/// highgui window that polls the keyboard after each frame.
pub struct Window {
    name: String,
    delay_ms: i32,
}

impl Window {
    pub fn open(name: &str, delay_ms: i32) -> Result<Self> {
        highgui::named_window(name, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self {
            name: name.to_string(),
            delay_ms,
        })
    }
}

impl FrameDisplay<ColorFrame> for Window {
    fn present(&mut self, frame: &ColorFrame) -> Result<DisplayEvent> {
        highgui::imshow(&self.name, frame.mat())?;
        let key = highgui::wait_key(self.delay_ms)?;
        if key == ESCAPE_KEY {
            Ok(DisplayEvent::AbortRequested)
        } else {
            Ok(DisplayEvent::Continue)
        }
    }

    fn close(&mut self) -> Result<()> {
        highgui::destroy_window(&self.name)?;
        Ok(())
    }
}
