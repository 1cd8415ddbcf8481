//! Per-locator and per-image reprojection error.
//!
//! Both passes triangulate each locator from its observations on registered
//! images and score the same observations against the triangulated point.
//! Anything that cannot be scored reports `f64::INFINITY`; callers decide
//! whether that means "exclude" or "broken".

use std::collections::BTreeMap;

use log::debug;
use nalgebra as na;
use rayon::prelude::*;

use crate::correspondence::CorrespondenceStore;
use crate::triangulation::{reprojection_error, triangulate_dlt};
use crate::types::{CalibrationResult, ImageRecord, LocatorId};

/// `P = K * [R_w2c | t_w2c]` for every registered image.
pub fn projection_matrices(result: &CalibrationResult) -> BTreeMap<usize, na::Matrix3x4<f64>> {
    result
        .registered_image_indices
        .iter()
        .filter_map(|&idx| {
            let k = result.intrinsics_by_image.get(&idx)?;
            let pose = result.poses_by_image.get(&idx)?;
            Some((idx, pose.to_world_to_camera().projection_matrix(k)))
        })
        .collect()
}

pub struct ErrorAnalysis<'a> {
    projections: BTreeMap<usize, na::Matrix3x4<f64>>,
    images: &'a [ImageRecord],
    store: &'a CorrespondenceStore,
}

/// One observation on a registered image, ready for triangulation.
type View = (usize, na::Matrix3x4<f64>, na::Vector2<f64>);

impl<'a> ErrorAnalysis<'a> {
    pub fn new(
        result: &CalibrationResult,
        images: &'a [ImageRecord],
        store: &'a CorrespondenceStore,
    ) -> ErrorAnalysis<'a> {
        ErrorAnalysis {
            projections: projection_matrices(result),
            images,
            store,
        }
    }

    fn registered_views(&self, id: LocatorId) -> Vec<View> {
        self.store
            .pixel_observations(id, self.images)
            .into_iter()
            .filter_map(|(idx, pixel)| self.projections.get(&idx).map(|p| (idx, *p, pixel)))
            .collect()
    }

    fn triangulate_views(views: &[View]) -> Option<na::Point3<f64>> {
        let pairs: Vec<_> = views.iter().map(|(_, p, px)| (*p, *px)).collect();
        triangulate_dlt(&pairs)
    }

    /// Triangulated position of a locator, `None` if unresolvable.
    pub fn triangulate(&self, id: LocatorId) -> Option<na::Point3<f64>> {
        Self::triangulate_views(&self.registered_views(id))
    }

    /// Error of every observation of `id` on a registered image, or `None`
    /// when the locator cannot be triangulated.
    fn scored_views(&self, id: LocatorId) -> Option<Vec<(usize, f64)>> {
        let views = self.registered_views(id);
        let point = Self::triangulate_views(&views)?;
        Some(
            views
                .iter()
                .map(|(idx, p, pixel)| (*idx, reprojection_error(p, &point, pixel)))
                .collect(),
        )
    }

    /// Mean reprojection error of each locator.
    pub fn locator_errors(&self) -> BTreeMap<LocatorId, f64> {
        let ids: Vec<LocatorId> = self.store.iter().map(|(id, _)| id).collect();
        let errors: BTreeMap<_, _> = ids
            .par_iter()
            .map(|&id| {
                let err = match self.scored_views(id) {
                    Some(scores) if !scores.is_empty() => {
                        scores.iter().map(|(_, e)| e).sum::<f64>() / scores.len() as f64
                    }
                    _ => f64::INFINITY,
                };
                (id, err)
            })
            .collect();
        debug!(
            "{} of {} locators unresolved",
            errors.values().filter(|e| e.is_infinite()).count(),
            errors.len()
        );
        errors
    }

    /// Mean reprojection error of each image over the locators it sees.
    ///
    /// Every image gets an entry; unregistered images and images without a
    /// triangulated locator are infinite.
    pub fn image_errors(&self) -> BTreeMap<usize, f64> {
        let ids: Vec<LocatorId> = self.store.iter().map(|(id, _)| id).collect();
        let scored: Vec<Vec<(usize, f64)>> = ids
            .par_iter()
            .filter_map(|&id| self.scored_views(id))
            .collect();

        let mut totals = vec![0.0; self.images.len()];
        let mut counts = vec![0usize; self.images.len()];
        for (idx, err) in scored.into_iter().flatten() {
            if idx < totals.len() {
                totals[idx] += err;
                counts[idx] += 1;
            }
        }
        totals
            .into_iter()
            .zip(counts)
            .enumerate()
            .map(|(idx, (total, count))| {
                let err = if count > 0 {
                    total / count as f64
                } else {
                    f64::INFINITY
                };
                (idx, err)
            })
            .collect()
    }
}
