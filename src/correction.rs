//! Color-guided click correction.
//! Capture the action's search area, match the target color, cluster the
//! matches and return the center of the cluster nearest the recorded click.

use crate::action::ColorTarget;
use crate::capture::ScreenSource;
use crate::cluster::{build_clusters, nearest_cluster};
use crate::error::MacroResult;
use crate::pixel::{match_mask, matching_points, mean_position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub point: (i32, i32),
    pub cluster_size: usize,
    /// `point` minus the recorded position
    pub offset: (i32, i32),
    pub clusters_seen: usize,
}

pub struct ColorLocator<S> {
    source: S,
    min_cluster_size: usize,
}

impl<S: ScreenSource> ColorLocator<S> {
    pub fn new(source: S, min_cluster_size: usize) -> Self {
        Self {
            source,
            min_cluster_size: min_cluster_size.max(1),
        }
    }

    #[cfg(test)]
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// `Ok(None)` means the capture succeeded but no cluster of the color survived.
    pub fn locate(&mut self, target: &ColorTarget, recorded: (i32, i32)) -> MacroResult<Option<Located>> {
        let capture = self.source.capture_region(target.area)?;
        let mask = match_mask(&capture.image, target.color, target.tolerance);
        let clusters = build_clusters(&mask, capture.origin, self.min_cluster_size);

        let Some(best) = nearest_cluster(&clusters, recorded) else {
            // matches may exist but all sit in clusters below the size floor
            let stray = matching_points(&capture.image, target.color, target.tolerance, capture.origin);
            tracing::debug!(
                color = ?target.color,
                tolerance = target.tolerance,
                stray_pixels = stray.len(),
                stray_mean = ?mean_position(&stray),
                min_cluster_size = self.min_cluster_size,
                "no matching cluster"
            );
            return Ok(None);
        };
        tracing::debug!(
            size = best.size,
            bounds = ?best.bounds,
            clusters = clusters.len(),
            "nearest cluster"
        );

        let point = best.center();
        Ok(Some(Located {
            point,
            cluster_size: best.size,
            offset: (point.0 - recorded.0, point.1 - recorded.1),
            clusters_seen: clusters.len(),
        }))
    }
}
