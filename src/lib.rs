//! Car, pedestrian and bus counting over video with Haar cascades.

pub mod cli;
pub mod detection;
pub mod geometry;
pub mod json_log;
#[cfg(feature = "opencv")]
pub mod opencv_backend;
pub mod pipeline;
pub mod report;
pub mod stats;
