#![allow(dead_code)]

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};

use locator_calibration::engine::{
    EngineError, EngineInput, Reconstruction, ReconstructionEngine, RegisteredView,
};
use locator_calibration::synthetic::{SceneConfig, SyntheticScene};
use nalgebra as na;

/// Registers every image that takes part in at least one match, with the
/// scene's true camera.
pub struct GroundTruthEngine {
    pub intrinsics: na::Matrix3<f64>,
    pub poses: Vec<locator_calibration::pose::WorldToCamera>,
    pub points: Vec<na::Point3<f64>>,
    pub calls: Cell<usize>,
}

impl GroundTruthEngine {
    pub fn new(scene: &SyntheticScene) -> GroundTruthEngine {
        GroundTruthEngine {
            intrinsics: scene.intrinsics,
            poses: scene.poses.clone(),
            points: scene.points.clone(),
            calls: Cell::new(0),
        }
    }
}

impl ReconstructionEngine for GroundTruthEngine {
    fn reconstruct(&self, input: &EngineInput) -> Result<Vec<Reconstruction>, EngineError> {
        self.calls.set(self.calls.get() + 1);
        let matched: BTreeSet<usize> = input
            .matches
            .iter()
            .flat_map(|m| [m.image_a, m.image_b])
            .collect();
        if matched.is_empty() {
            return Ok(Vec::new());
        }
        let views = matched
            .into_iter()
            .filter_map(|idx| {
                self.poses.get(idx).map(|pose| {
                    (
                        idx,
                        RegisteredView {
                            intrinsics: self.intrinsics,
                            pose: *pose,
                        },
                    )
                })
            })
            .collect();
        Ok(vec![Reconstruction {
            views,
            points3d: self.points.clone(),
        }])
    }
}

/// Returns a fixed answer and counts calls.
pub struct ScriptedEngine {
    pub answer: Box<dyn Fn() -> Result<Vec<Reconstruction>, EngineError>>,
    pub calls: Cell<usize>,
    pub last_input: std::cell::RefCell<Option<EngineInput>>,
}

impl ScriptedEngine {
    pub fn new(
        answer: impl Fn() -> Result<Vec<Reconstruction>, EngineError> + 'static,
    ) -> ScriptedEngine {
        ScriptedEngine {
            answer: Box::new(answer),
            calls: Cell::new(0),
            last_input: std::cell::RefCell::new(None),
        }
    }

    pub fn failing() -> ScriptedEngine {
        ScriptedEngine::new(|| {
            Err(EngineError::Invocation {
                command: "colmap mapper".to_string(),
                detail: "exit status: 1".to_string(),
            })
        })
    }
}

impl ReconstructionEngine for ScriptedEngine {
    fn reconstruct(&self, input: &EngineInput) -> Result<Vec<Reconstruction>, EngineError> {
        self.calls.set(self.calls.get() + 1);
        *self.last_input.borrow_mut() = Some(input.clone());
        (self.answer)()
    }
}

pub fn two_camera_scene(num_locators: usize, pixel_noise: f64) -> SyntheticScene {
    SyntheticScene::generate(&SceneConfig {
        num_cameras: 2,
        num_locators,
        pixel_noise,
        extent: 0.5,
        seed: 7,
        ..Default::default()
    })
}

pub fn reconstruction_from(scene: &SyntheticScene, registered: &[usize]) -> Reconstruction {
    let views: BTreeMap<usize, RegisteredView> = registered
        .iter()
        .map(|&idx| {
            (
                idx,
                RegisteredView {
                    intrinsics: scene.intrinsics,
                    pose: scene.poses[idx],
                },
            )
        })
        .collect();
    Reconstruction {
        views,
        points3d: scene.points.clone(),
    }
}
