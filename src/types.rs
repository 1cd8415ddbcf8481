use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::pose::CameraToWorld;

/// Identity of a locator: its position in the loaded locator list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocatorId(pub usize);

/// A position inside an image, both coordinates in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub fn new(x: f64, y: f64) -> NormalizedPoint {
        NormalizedPoint { x, y }
    }

    pub fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && (0.0..=1.0).contains(&self.x)
            && (0.0..=1.0).contains(&self.y)
    }

    /// Scales into pixel space of an image with the given size.
    pub fn to_pixel(&self, width: u32, height: u32) -> na::Vector2<f64> {
        na::Vector2::new(self.x * width as f64, self.y * height as f64)
    }
}

/// The same physical feature marked across several images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locator {
    pub name: String,
    pub positions: BTreeMap<usize, NormalizedPoint>,
    /// Mean reprojection error of the last calibration; never read from input.
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub error: Option<f64>,
}

impl Locator {
    pub fn new(name: impl Into<String>) -> Locator {
        Locator {
            name: name.into(),
            positions: BTreeMap::new(),
            error: None,
        }
    }

    pub fn with_position(mut self, image_index: usize, x: f64, y: f64) -> Locator {
        self.positions
            .insert(image_index, NormalizedPoint::new(x, y));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl ImageRecord {
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32) -> ImageRecord {
        ImageRecord {
            path: path.into(),
            width,
            height,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string())
    }
}

/// Intrinsics and camera-to-world pose of one registered image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraParameters {
    pub intrinsics: na::Matrix3<f64>,
    pub rotation: na::Matrix3<f64>,
    pub translation: na::Vector3<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationResult {
    pub intrinsics_by_image: BTreeMap<usize, na::Matrix3<f64>>,
    pub poses_by_image: BTreeMap<usize, CameraToWorld>,
    pub registered_image_indices: BTreeSet<usize>,
    pub points3d: Vec<na::Point3<f64>>,
}

impl CalibrationResult {
    pub fn camera(&self, image_index: usize) -> Option<CameraParameters> {
        let intrinsics = self.intrinsics_by_image.get(&image_index)?;
        let pose = self.poses_by_image.get(&image_index)?;
        Some(CameraParameters {
            intrinsics: *intrinsics,
            rotation: pose.rotation,
            translation: pose.translation,
        })
    }

    /// Parameters of every registered image, ordered by image index.
    pub fn camera_parameters(&self) -> Vec<(usize, CameraParameters)> {
        self.registered_image_indices
            .iter()
            .filter_map(|&idx| self.camera(idx).map(|c| (idx, c)))
            .collect()
    }

    pub fn is_registered(&self, image_index: usize) -> bool {
        self.registered_image_indices.contains(&image_index)
    }
}
