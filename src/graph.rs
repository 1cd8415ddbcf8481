//! Keypoints and pairwise matches built from locator correspondences.
//!
//! Reconstruction engines address observations by per-image keypoint index.
//! The [`KeypointMap`] is the join between those indices and locator ids.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::correspondence::CorrespondenceStore;
use crate::types::{ImageRecord, LocatorId};

/// `image_index -> locator -> keypoint_index`.
pub type KeypointMap = BTreeMap<usize, BTreeMap<LocatorId, usize>>;

/// Fixed-format keypoint record. Scale and orientation are placeholders since
/// locators carry no feature descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub orientation: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64) -> Keypoint {
        Keypoint {
            x,
            y,
            scale: 1.0,
            orientation: 0.0,
        }
    }
}

/// Matches between two images, `image_a < image_b`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePairMatches {
    pub image_a: usize,
    pub image_b: usize,
    pub matches: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrespondenceGraph {
    pub keypoints: Vec<Vec<Keypoint>>,
    pub keypoint_map: KeypointMap,
    pub matches: Vec<ImagePairMatches>,
}

impl CorrespondenceGraph {
    /// Converts the store into per-image keypoints and pairwise matches.
    ///
    /// Locators are visited in ascending id order so that keypoint indices
    /// are reproducible for identical input.
    pub fn build(images: &[ImageRecord], store: &CorrespondenceStore) -> CorrespondenceGraph {
        let mut keypoints: Vec<Vec<Keypoint>> = vec![Vec::new(); images.len()];
        let mut keypoint_map: KeypointMap = (0..images.len()).map(|i| (i, BTreeMap::new())).collect();

        for (locator_id, observations) in store.iter() {
            for (&image_index, p) in observations {
                let Some(image) = images.get(image_index) else {
                    continue;
                };
                let pixel = p.to_pixel(image.width, image.height);
                let kps = &mut keypoints[image_index];
                keypoint_map
                    .entry(image_index)
                    .or_default()
                    .insert(locator_id, kps.len());
                kps.push(Keypoint::new(pixel.x, pixel.y));
            }
        }

        let matches = pairwise_matches(&keypoint_map, images.len());
        debug!(
            "built {} keypoints and {} matched image pairs",
            keypoints.iter().map(Vec::len).sum::<usize>(),
            matches.len()
        );
        CorrespondenceGraph {
            keypoints,
            keypoint_map,
            matches,
        }
    }

    pub fn match_count(&self) -> usize {
        self.matches.iter().map(|m| m.matches.len()).sum()
    }
}

fn pairwise_matches(keypoint_map: &KeypointMap, image_count: usize) -> Vec<ImagePairMatches> {
    let mut pairs = Vec::new();
    for i in 0..image_count {
        let Some(kp_i) = keypoint_map.get(&i) else {
            continue;
        };
        for j in (i + 1)..image_count {
            let Some(kp_j) = keypoint_map.get(&j) else {
                continue;
            };
            let matches: Vec<_> = kp_i
                .iter()
                .filter_map(|(locator_id, &a)| kp_j.get(locator_id).map(|&b| (a, b)))
                .collect();
            if matches.is_empty() {
                continue;
            }
            pairs.push(ImagePairMatches {
                image_a: i,
                image_b: j,
                matches,
            });
        }
    }
    pairs
}
