pub mod calibrator;
pub mod config;
pub mod correspondence;
pub mod engine;
pub mod error;
pub mod graph;
pub mod io;
pub mod pose;
pub mod reprojection;
pub mod synthetic;
pub mod triangulation;
pub mod types;
pub mod util;

pub use calibrator::{CalibrationSession, CalibrationState, Calibrator};
pub use error::{CalibrationError, FailureKind};
pub use types::{CalibrationResult, CameraParameters, ImageRecord, Locator, LocatorId};
