use std::collections::{BTreeMap, HashSet};

use nalgebra as na;

use crate::error::CalibrationError;
use crate::types::{ImageRecord, Locator, LocatorId, NormalizedPoint};

/// Validated observations of every locator, keyed by [`LocatorId`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrespondenceStore {
    observations: BTreeMap<LocatorId, BTreeMap<usize, NormalizedPoint>>,
}

/// Checks image records coming from the image provider.
pub fn validate_images(images: &[ImageRecord]) -> Result<(), CalibrationError> {
    for (index, image) in images.iter().enumerate() {
        if image.width == 0 || image.height == 0 {
            return Err(CalibrationError::InvalidImage {
                index,
                reason: format!("empty dimensions {}x{}", image.width, image.height),
            });
        }
    }
    Ok(())
}

impl CorrespondenceStore {
    /// Builds the store from the locators of a session.
    ///
    /// Rejects empty position maps, duplicate names, image indices outside
    /// `0..image_count` and coordinates outside the unit square.
    pub fn from_locators(
        locators: &[Locator],
        image_count: usize,
    ) -> Result<CorrespondenceStore, CalibrationError> {
        let mut names = HashSet::new();
        let mut observations = BTreeMap::new();
        for (idx, locator) in locators.iter().enumerate() {
            let invalid = |reason: String| CalibrationError::InvalidLocator {
                name: locator.name.clone(),
                reason,
            };
            if !names.insert(locator.name.as_str()) {
                return Err(invalid("duplicate locator name".to_string()));
            }
            if locator.positions.is_empty() {
                return Err(invalid("no positions".to_string()));
            }
            for (&image_index, p) in &locator.positions {
                if image_index >= image_count {
                    return Err(invalid(format!(
                        "image index {} out of range ({} images)",
                        image_index, image_count
                    )));
                }
                if !p.is_valid() {
                    return Err(invalid(format!(
                        "position ({}, {}) in image {} is not normalized",
                        p.x, p.y, image_index
                    )));
                }
            }
            observations.insert(LocatorId(idx), locator.positions.clone());
        }
        Ok(CorrespondenceStore { observations })
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Iterates locators in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (LocatorId, &BTreeMap<usize, NormalizedPoint>)> {
        self.observations.iter().map(|(id, obs)| (*id, obs))
    }

    pub fn get(&self, id: LocatorId) -> Option<&BTreeMap<usize, NormalizedPoint>> {
        self.observations.get(&id)
    }

    /// Observations of one locator converted to pixel coordinates.
    pub fn pixel_observations(
        &self,
        id: LocatorId,
        images: &[ImageRecord],
    ) -> Vec<(usize, na::Vector2<f64>)> {
        self.observations
            .get(&id)
            .map(|obs| {
                obs.iter()
                    .filter_map(|(&image_index, p)| {
                        images
                            .get(image_index)
                            .map(|img| (image_index, p.to_pixel(img.width, img.height)))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
