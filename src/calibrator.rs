//! Calibration orchestrator.
//!
//! A [`CalibrationSession`] is owned by the caller and holds the loaded
//! images and locators, the state machine and the last successful result.
//! [`Calibrator`] owns the reconstruction engine and runs the pipeline on a
//! session: validation, graph building, engine invocation, pose conversion
//! and error analysis.

use std::collections::BTreeMap;

use log::{info, warn};

use crate::correspondence::{CorrespondenceStore, validate_images};
use crate::engine::{EngineAdapter, ReconstructionEngine};
use crate::error::{CalibrationError, FailureKind};
use crate::graph::CorrespondenceGraph;
use crate::reprojection::ErrorAnalysis;
use crate::types::{CalibrationResult, ImageRecord, Locator, LocatorId};

pub const MIN_IMAGES: usize = 2;
pub const MIN_LOCATORS: usize = 3;

pub fn check_preconditions(images: usize, locators: usize) -> Result<(), CalibrationError> {
    if images < MIN_IMAGES || locators < MIN_LOCATORS {
        return Err(CalibrationError::InsufficientData { images, locators });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    Idle,
    Loaded,
    Running,
    Calibrated,
    Failed(FailureKind),
}

#[derive(Debug, Clone)]
pub struct CalibrationSession {
    images: Vec<ImageRecord>,
    locators: Vec<Locator>,
    state: CalibrationState,
    result: Option<CalibrationResult>,
    image_errors: BTreeMap<usize, f64>,
}

impl Default for CalibrationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationSession {
    pub fn new() -> CalibrationSession {
        CalibrationSession {
            images: Vec::new(),
            locators: Vec::new(),
            state: CalibrationState::Idle,
            result: None,
            image_errors: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn locators(&self) -> &[Locator] {
        &self.locators
    }

    /// Result of the last successful run.
    pub fn result(&self) -> Option<&CalibrationResult> {
        self.result.as_ref()
    }

    pub fn image_errors(&self) -> &BTreeMap<usize, f64> {
        &self.image_errors
    }

    pub fn locator_error(&self, name: &str) -> Option<f64> {
        self.locators
            .iter()
            .find(|l| l.name == name)
            .and_then(|l| l.error)
    }
}

struct RunOutput {
    result: CalibrationResult,
    locator_errors: BTreeMap<LocatorId, f64>,
    image_errors: BTreeMap<usize, f64>,
}

pub struct Calibrator<E> {
    adapter: EngineAdapter<E>,
}

impl<E: ReconstructionEngine> Calibrator<E> {
    pub fn new(engine: E) -> Calibrator<E> {
        Calibrator {
            adapter: EngineAdapter::new(engine),
        }
    }

    pub fn engine(&self) -> &E {
        self.adapter.engine()
    }

    /// Stages images and locators in the session.
    ///
    /// Invalid input leaves the session unchanged. Valid input replaces the
    /// previous image set, so the result and errors of earlier runs are
    /// dropped along with it.
    pub fn load(
        &self,
        session: &mut CalibrationSession,
        images: Vec<ImageRecord>,
        mut locators: Vec<Locator>,
    ) -> Result<(), CalibrationError> {
        validate_images(&images)?;
        CorrespondenceStore::from_locators(&locators, images.len())?;
        info!("loaded {} images and {} locators", images.len(), locators.len());
        for locator in &mut locators {
            locator.error = None;
        }
        session.images = images;
        session.locators = locators;
        session.result = None;
        session.image_errors.clear();
        session.state = CalibrationState::Loaded;
        Ok(())
    }

    /// Runs a full calibration from the session's current correspondences.
    ///
    /// On success every locator carries an error and every image has an
    /// entry in the per-image table. On failure the session keeps the
    /// previous result and errors and moves to [`CalibrationState::Failed`].
    pub fn calibrate<'s>(
        &self,
        session: &'s mut CalibrationSession,
    ) -> Result<&'s CalibrationResult, CalibrationError> {
        match self.run(session) {
            Ok(RunOutput {
                result,
                locator_errors,
                image_errors,
            }) => {
                for (id, err) in locator_errors {
                    if let Some(locator) = session.locators.get_mut(id.0) {
                        locator.error = Some(err);
                    }
                }
                session.image_errors = image_errors;
                session.state = CalibrationState::Calibrated;
                info!(
                    "calibration succeeded: {} of {} images registered, {} points",
                    result.registered_image_indices.len(),
                    session.images.len(),
                    result.points3d.len()
                );
                Ok(session.result.insert(result))
            }
            Err(e) => {
                warn!("calibration failed: {}", e);
                session.state = CalibrationState::Failed(e.kind());
                Err(e)
            }
        }
    }

    fn run(&self, session: &mut CalibrationSession) -> Result<RunOutput, CalibrationError> {
        check_preconditions(session.images.len(), session.locators.len())?;
        let store = CorrespondenceStore::from_locators(&session.locators, session.images.len())?;
        session.state = CalibrationState::Running;

        let graph = CorrespondenceGraph::build(&session.images, &store);
        let result = self.adapter.run(&session.images, &graph, store.len())?;

        let analysis = ErrorAnalysis::new(&result, &session.images, &store);
        let locator_errors = analysis.locator_errors();
        let image_errors = analysis.image_errors();
        Ok(RunOutput {
            result,
            locator_errors,
            image_errors,
        })
    }
}
