//! Interface to the structure-from-motion backend.
//!
//! The backend is opaque: it receives keypoints, verified matches and a seed
//! camera per image and returns candidate reconstructions with poses in the
//! world-to-camera convention. [`adapter::EngineAdapter`] owns all interaction
//! with it; [`colmap::ColmapEngine`] drives the `colmap` executable.

pub mod adapter;
pub mod colmap;
pub mod colmap_model;

use std::collections::BTreeMap;
use std::path::PathBuf;

use nalgebra as na;

use crate::graph::{ImagePairMatches, Keypoint};
use crate::pose::{WorldToCamera, pinhole_matrix};

pub use adapter::EngineAdapter;

/// Initial guess for a single-focal pinhole camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplePinhole {
    pub focal: f64,
    pub cx: f64,
    pub cy: f64,
}

impl SimplePinhole {
    pub fn matrix(&self) -> na::Matrix3<f64> {
        pinhole_matrix(self.focal, self.cx, self.cy)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub camera: SimplePinhole,
    pub keypoints: Vec<Keypoint>,
}

/// Everything the engine gets. Image `i` of `images` is image index `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInput {
    pub images: Vec<EngineImage>,
    pub matches: Vec<ImagePairMatches>,
}

/// A registered image inside one candidate reconstruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisteredView {
    pub intrinsics: na::Matrix3<f64>,
    pub pose: WorldToCamera,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconstruction {
    pub views: BTreeMap<usize, RegisteredView>,
    pub points3d: Vec<na::Point3<f64>>,
}

impl Reconstruction {
    pub fn num_registered(&self) -> usize {
        self.views.len()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("failed to stage {path}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` failed: {detail}")]
    Invocation { command: String, detail: String },
    #[error("malformed reconstruction output {file}:{line}: {reason}")]
    MalformedOutput {
        file: String,
        line: usize,
        reason: String,
    },
}

/// A structure-from-motion backend.
pub trait ReconstructionEngine {
    fn reconstruct(&self, input: &EngineInput) -> Result<Vec<Reconstruction>, EngineError>;
}

impl<E: ReconstructionEngine + ?Sized> ReconstructionEngine for &E {
    fn reconstruct(&self, input: &EngineInput) -> Result<Vec<Reconstruction>, EngineError> {
        (**self).reconstruct(input)
    }
}

impl<E: ReconstructionEngine + ?Sized> ReconstructionEngine for Box<E> {
    fn reconstruct(&self, input: &EngineInput) -> Result<Vec<Reconstruction>, EngineError> {
        (**self).reconstruct(input)
    }
}
