use log::{debug, info, warn};

use crate::calibrator::check_preconditions;
use crate::error::CalibrationError;
use crate::graph::CorrespondenceGraph;
use crate::types::{CalibrationResult, ImageRecord};

use super::{EngineImage, EngineInput, Reconstruction, ReconstructionEngine, SimplePinhole};

/// Seed focal length as a multiple of the larger image side.
pub const FOCAL_LENGTH_FACTOR: f64 = 1.2;
/// A reconstruction below this is not a calibration.
pub const MIN_REGISTERED_IMAGES: usize = 2;

/// Initial camera: `f = 1.2 * max(w, h)`, principal point at the image center.
pub fn seed_camera(width: u32, height: u32) -> SimplePinhole {
    SimplePinhole {
        focal: FOCAL_LENGTH_FACTOR * width.max(height) as f64,
        cx: width as f64 / 2.0,
        cy: height as f64 / 2.0,
    }
}

pub fn prepare_input(images: &[ImageRecord], graph: &CorrespondenceGraph) -> EngineInput {
    let images = images
        .iter()
        .enumerate()
        .map(|(idx, image)| EngineImage {
            path: image.path.clone(),
            width: image.width,
            height: image.height,
            camera: seed_camera(image.width, image.height),
            keypoints: graph.keypoints.get(idx).cloned().unwrap_or_default(),
        })
        .collect();
    EngineInput {
        images,
        matches: graph.matches.clone(),
    }
}

/// Picks the candidate with the most registered images; the first one wins ties.
pub fn select_best(candidates: Vec<Reconstruction>) -> Result<Reconstruction, CalibrationError> {
    let mut best: Option<Reconstruction> = None;
    for candidate in candidates {
        debug!("candidate with {} registered images", candidate.num_registered());
        let better = best
            .as_ref()
            .is_none_or(|b| candidate.num_registered() > b.num_registered());
        if better {
            best = Some(candidate);
        }
    }
    match best {
        Some(rec) if rec.num_registered() >= MIN_REGISTERED_IMAGES => Ok(rec),
        other => Err(CalibrationError::NoReconstruction {
            best_registered: other.map_or(0, |r| r.num_registered()),
        }),
    }
}

/// Converts engine poses to camera-to-world and drops views outside `0..image_count`.
pub fn extract_result(reconstruction: Reconstruction, image_count: usize) -> CalibrationResult {
    let mut result = CalibrationResult {
        points3d: reconstruction.points3d,
        ..Default::default()
    };
    for (idx, view) in reconstruction.views {
        if idx >= image_count {
            warn!("engine registered unknown image index {}", idx);
            continue;
        }
        result.intrinsics_by_image.insert(idx, view.intrinsics);
        result
            .poses_by_image
            .insert(idx, view.pose.to_camera_to_world());
        result.registered_image_indices.insert(idx);
    }
    result
}

/// Owns every interaction with a [`ReconstructionEngine`].
pub struct EngineAdapter<E> {
    engine: E,
}

impl<E: ReconstructionEngine> EngineAdapter<E> {
    pub fn new(engine: E) -> EngineAdapter<E> {
        EngineAdapter { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn run(
        &self,
        images: &[ImageRecord],
        graph: &CorrespondenceGraph,
        locator_count: usize,
    ) -> Result<CalibrationResult, CalibrationError> {
        check_preconditions(images.len(), locator_count)?;
        let input = prepare_input(images, graph);
        info!(
            "invoking reconstruction engine: {} images, {} matched pairs, {} matches",
            input.images.len(),
            input.matches.len(),
            graph.match_count()
        );
        let candidates = self.engine.reconstruct(&input)?;
        info!("engine returned {} candidate reconstructions", candidates.len());
        let best = select_best(candidates)?;
        let result = extract_result(best, images.len());
        if result.registered_image_indices.len() < MIN_REGISTERED_IMAGES {
            return Err(CalibrationError::NoReconstruction {
                best_registered: result.registered_image_indices.len(),
            });
        }
        Ok(result)
    }
}
