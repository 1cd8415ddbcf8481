use serde::{Deserialize, Serialize};

use crate::calibrator::{MIN_IMAGES, MIN_LOCATORS};
use crate::engine::EngineError;

/// Errors returned by the calibration orchestrator.
#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error(
        "insufficient data: got {images} images and {locators} locators, need at least {} and {}",
        MIN_IMAGES,
        MIN_LOCATORS
    )]
    InsufficientData { images: usize, locators: usize },
    #[error("invalid image {index}: {reason}")]
    InvalidImage { index: usize, reason: String },
    #[error("invalid locator `{name}`: {reason}")]
    InvalidLocator { name: String, reason: String },
    #[error("reconstruction engine failed")]
    EngineInvocationFailed(#[source] EngineError),
    #[error("no usable reconstruction (best candidate registered {best_registered} images)")]
    NoReconstruction { best_registered: usize },
    #[error("staging engine inputs failed")]
    DataIOFailed(#[source] EngineError),
}

impl From<EngineError> for CalibrationError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Staging { .. } => CalibrationError::DataIOFailed(e),
            other => CalibrationError::EngineInvocationFailed(other),
        }
    }
}

/// Copyable summary of a [`CalibrationError`], kept in the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    InsufficientData,
    InvalidInput,
    EngineInvocationFailed,
    NoReconstruction,
    DataIOFailed,
}

impl CalibrationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CalibrationError::InsufficientData { .. } => FailureKind::InsufficientData,
            CalibrationError::InvalidImage { .. } | CalibrationError::InvalidLocator { .. } => {
                FailureKind::InvalidInput
            }
            CalibrationError::EngineInvocationFailed(_) => FailureKind::EngineInvocationFailed,
            CalibrationError::NoReconstruction { .. } => FailureKind::NoReconstruction,
            CalibrationError::DataIOFailed(_) => FailureKind::DataIOFailed,
        }
    }
}
