//! Spatial clustering of matching pixels.
//! Matches are grouped into 8-connected components with `imageproc`'s
//! connected-component labelling (a flood fill over the match mask). Each
//! cluster reports its size, centroid and bounding box in screen coordinates.
//! The selector then picks the cluster whose centroid is nearest the point the
//! user originally clicked, so a second patch of the same color elsewhere in the
//! search area does not drag the click away.

use image::GrayImage;
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::action::Region;
use crate::pixel::NO_MATCH;

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub size: usize,
    pub centroid: (f64, f64),
    pub bounds: Region,
}

impl Cluster {
    pub fn distance_sq(&self, point: (i32, i32)) -> f64 {
        let dx = self.centroid.0 - point.0 as f64;
        let dy = self.centroid.1 - point.1 as f64;
        dx * dx + dy * dy
    }

    /// Centroid snapped to the nearest pixel.
    pub fn center(&self) -> (i32, i32) {
        (self.centroid.0.round() as i32, self.centroid.1.round() as i32)
    }
}

#[derive(Clone, Copy)]
struct Accum {
    count: usize,
    sum_x: u64,
    sum_y: u64,
    min: (u32, u32),
    max: (u32, u32),
    first_seen: usize,
}

/// Groups the non-zero pixels of `mask` into 8-connected clusters.
///
/// Clusters with fewer than `min_size` pixels are dropped. The result is ordered
/// by each cluster's first pixel in raster order. `origin` is added to every
/// coordinate so centroids come out in screen space.
pub fn build_clusters(mask: &GrayImage, origin: (i32, i32), min_size: usize) -> Vec<Cluster> {
    let labels = connected_components(mask, Connectivity::Eight, NO_MATCH);

    let mut accums: Vec<Option<Accum>> = Vec::new();
    let mut seen = 0usize;
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0] as usize;
        if label == 0 {
            continue;
        }
        if accums.len() <= label {
            accums.resize(label + 1, None);
        }
        if let Some(acc) = &mut accums[label] {
            acc.count += 1;
            acc.sum_x += x as u64;
            acc.sum_y += y as u64;
            acc.min = (acc.min.0.min(x), acc.min.1.min(y));
            acc.max = (acc.max.0.max(x), acc.max.1.max(y));
        } else {
            accums[label] = Some(Accum {
                count: 1,
                sum_x: x as u64,
                sum_y: y as u64,
                min: (x, y),
                max: (x, y),
                first_seen: seen,
            });
            seen += 1;
        }
    }

    let mut found: Vec<Accum> = accums
        .into_iter()
        .flatten()
        .filter(|acc| acc.count >= min_size.max(1))
        .collect();
    found.sort_by_key(|acc| acc.first_seen);

    found
        .into_iter()
        .map(|acc| {
            let n = acc.count as f64;
            Cluster {
                size: acc.count,
                centroid: (
                    origin.0 as f64 + acc.sum_x as f64 / n,
                    origin.1 as f64 + acc.sum_y as f64 / n,
                ),
                bounds: Region::new(
                    origin.0 + acc.min.0 as i32,
                    origin.1 + acc.min.1 as i32,
                    acc.max.0 - acc.min.0 + 1,
                    acc.max.1 - acc.min.1 + 1,
                ),
            }
        })
        .collect()
}

/// The cluster whose centroid is closest to `reference`; the earliest one wins ties.
pub fn nearest_cluster(clusters: &[Cluster], reference: (i32, i32)) -> Option<&Cluster> {
    let mut best: Option<(&Cluster, f64)> = None;
    for cluster in clusters {
        let d = cluster.distance_sq(reference);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((cluster, d)),
        }
    }
    best.map(|(cluster, _)| cluster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::MATCH;

    fn mask_with(w: u32, h: u32, on: &[(u32, u32)]) -> GrayImage {
        let mut mask = GrayImage::from_pixel(w, h, NO_MATCH);
        for &(x, y) in on {
            mask.put_pixel(x, y, MATCH);
        }
        mask
    }

    #[test]
    fn test_empty_mask_has_no_clusters() {
        let mask = mask_with(8, 8, &[]);
        assert!(build_clusters(&mask, (0, 0), 1).is_empty());
        assert!(nearest_cluster(&[], (0, 0)).is_none());
    }

    #[test]
    fn test_diagonal_pixels_join_one_cluster() {
        let mask = mask_with(8, 8, &[(1, 1), (2, 2), (3, 3)]);
        let clusters = build_clusters(&mask, (0, 0), 1);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size, 3);
        assert_eq!(clusters[0].centroid, (2.0, 2.0));
        assert_eq!(clusters[0].bounds, Region::new(1, 1, 3, 3));
    }

    #[test]
    fn test_separate_blobs_and_origin_offset() {
        // 2x2 block at top-left, single pixel at bottom-right
        let mask = mask_with(10, 10, &[(0, 0), (1, 0), (0, 1), (1, 1), (8, 8)]);
        let clusters = build_clusters(&mask, (100, 50), 1);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].size, 4);
        assert_eq!(clusters[0].centroid, (100.5, 50.5));
        assert_eq!(clusters[1].size, 1);
        assert_eq!(clusters[1].centroid, (108.0, 58.0));
        assert_eq!(clusters[1].center(), (108, 58));
    }

    #[test]
    fn test_min_size_drops_noise() {
        let mask = mask_with(10, 10, &[(0, 0), (1, 0), (0, 1), (1, 1), (8, 8)]);
        let clusters = build_clusters(&mask, (0, 0), 2);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size, 4);
    }

    #[test]
    fn test_nearest_cluster_picks_closest_centroid() {
        let mask = mask_with(20, 20, &[(1, 1), (18, 18), (10, 2)]);
        let clusters = build_clusters(&mask, (0, 0), 1);
        assert_eq!(clusters.len(), 3);
        let near = nearest_cluster(&clusters, (17, 16)).unwrap();
        assert_eq!(near.center(), (18, 18));
        let near = nearest_cluster(&clusters, (9, 0)).unwrap();
        assert_eq!(near.center(), (10, 2));
    }

    #[test]
    fn test_nearest_cluster_tie_prefers_first() {
        let mask = mask_with(11, 1, &[(0, 0), (10, 0)]);
        let clusters = build_clusters(&mask, (0, 0), 1);
        let near = nearest_cluster(&clusters, (5, 0)).unwrap();
        assert_eq!(near.center(), (0, 0));
    }
}
