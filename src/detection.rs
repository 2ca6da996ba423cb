use anyhow::{Context, Result};
use std::fmt;

use crate::geometry::{Bgr, BoundingBox};

/// Line thickness used for every detection outline.
pub const OUTLINE_THICKNESS: i32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    Car,
    Pedestrian,
    Bus,
}

impl ObjectClass {
    pub const ALL: [ObjectClass; 3] = [ObjectClass::Car, ObjectClass::Pedestrian, ObjectClass::Bus];

    pub fn label(self) -> &'static str {
        match self {
            ObjectClass::Car => "car",
            ObjectClass::Pedestrian => "pedestrian",
            ObjectClass::Bus => "bus",
        }
    }

    pub fn outline_color(self) -> Bgr {
        match self {
            ObjectClass::Car => Bgr::RED,
            ObjectClass::Pedestrian => Bgr::BLUE,
            ObjectClass::Bus => Bgr::WHITE,
        }
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Multi-scale cascade parameters. No size filtering is applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorParams {
    pub scale_factor: f64,
    pub min_neighbors: i32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 1,
        }
    }
}

/// A pre-trained single-class detector run over intensity images of type `I`.
pub trait ObjectDetector<I: ?Sized> {
    fn detect(&mut self, image: &I, params: &DetectorParams) -> Result<Vec<BoundingBox>>;
}

impl<I: ?Sized, D: ObjectDetector<I> + ?Sized> ObjectDetector<I> for Box<D> {
    fn detect(&mut self, image: &I, params: &DetectorParams) -> Result<Vec<BoundingBox>> {
        (**self).detect(image, params)
    }
}

/// One detector per object class.
pub struct DetectorSet<D> {
    pub car: D,
    pub pedestrian: D,
    pub bus: D,
}

impl<D> DetectorSet<D> {
    pub fn new(car: D, pedestrian: D, bus: D) -> Self {
        Self {
            car,
            pedestrian,
            bus,
        }
    }

    pub fn get_mut(&mut self, class: ObjectClass) -> &mut D {
        match class {
            ObjectClass::Car => &mut self.car,
            ObjectClass::Pedestrian => &mut self.pedestrian,
            ObjectClass::Bus => &mut self.bus,
        }
    }

    /// Runs the three detectors in class order over the same image.
    pub fn detect_all<I: ?Sized>(
        &mut self,
        image: &I,
        params: &DetectorParams,
    ) -> Result<FrameDetections>
    where
        D: ObjectDetector<I>,
    {
        let mut detections = FrameDetections::default();
        for class in ObjectClass::ALL {
            let rects = self
                .get_mut(class)
                .detect(image, params)
                .with_context(|| format!("{} detection failed", class))?;
            *detections.get_mut(class) = rects;
        }
        Ok(detections)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameDetections {
    pub cars: Vec<BoundingBox>,
    pub pedestrians: Vec<BoundingBox>,
    pub buses: Vec<BoundingBox>,
}

impl FrameDetections {
    pub fn get(&self, class: ObjectClass) -> &[BoundingBox] {
        match class {
            ObjectClass::Car => &self.cars,
            ObjectClass::Pedestrian => &self.pedestrians,
            ObjectClass::Bus => &self.buses,
        }
    }

    fn get_mut(&mut self, class: ObjectClass) -> &mut Vec<BoundingBox> {
        match class {
            ObjectClass::Car => &mut self.cars,
            ObjectClass::Pedestrian => &mut self.pedestrians,
            ObjectClass::Bus => &mut self.buses,
        }
    }

    pub fn count(&self, class: ObjectClass) -> usize {
        self.get(class).len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectClass, &[BoundingBox])> + '_ {
        ObjectClass::ALL
            .into_iter()
            .map(move |class| (class, self.get(class)))
    }
}
