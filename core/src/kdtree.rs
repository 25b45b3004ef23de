//! Median-split KD-tree over the 18 raw feature dimensions (§4.1). Build-once,
//! never mutated — per §9's redesign note, no incremental-update machinery is
//! attempted; a future live-update mode would add an overlay searched
//! linearly rather than rebuilding this tree.

use drift_types::{FeatureVector, NUM_FEATURES, PcaDiscriminator, Track, TrackId};

use crate::errors::EngineError;

struct Node {
    track_index: usize,
    split_dimension: usize,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

/// A scored search hit: the track and its distance under whatever metric the
/// search method used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredTrack {
    pub track_index: usize,
    pub distance: f32,
}

/// Spatial index over a fixed corpus of tracks. Holds no owned track data;
/// every query takes the backing slice so the index and the corpus can be
/// stored side by side without duplicating tracks.
pub struct KdTree {
    root: Option<Box<Node>>,
    len: usize,
}

impl KdTree {
    /// Build a median-split KD-tree over `tracks`' 18 raw feature
    /// dimensions, cycling the split dimension with tree depth.
    #[must_use]
    pub fn build(tracks: &[Track]) -> Self {
        let mut indices: Vec<usize> = (0..tracks.len()).collect();
        log::info!("building kd-tree over {} tracks", tracks.len());
        let root = Self::build_recursive(tracks, &mut indices, 0);
        let tree = Self { root, len: tracks.len() };
        log::info!("kd-tree built, depth ~{}", tree.approx_depth());
        tree
    }

    fn approx_depth(&self) -> u32 {
        (self.len.max(1) as f32).log2().ceil() as u32
    }

    fn build_recursive(tracks: &[Track], indices: &mut [usize], depth: usize) -> Option<Box<Node>> {
        if indices.is_empty() {
            return None;
        }
        let dim = depth % NUM_FEATURES;
        indices.sort_by(|&a, &b| {
            tracks[a].features[dim]
                .partial_cmp(&tracks[b].features[dim])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mid = indices.len() / 2;
        let track_index = indices[mid];
        let (left_indices, rest) = indices.split_at_mut(mid);
        let right_indices = &mut rest[1..];
        Some(Box::new(Node {
            track_index,
            split_dimension: dim,
            left: Self::build_recursive(tracks, left_indices, depth + 1),
            right: Self::build_recursive(tracks, right_indices, depth + 1),
        }))
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.root.is_some()
    }

    fn require_root(&self) -> Result<&Node, EngineError> {
        self.root.as_deref().ok_or(EngineError::IndexNotInitialized)
    }

    /// Weighted feature-space radius search (§4.1): `radius_search`.
    /// `weights` defaults to [`FeatureVector::default_weights`] when `None`.
    /// Results are sorted ascending by distance and truncated to `limit`;
    /// the center track is never included.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IndexNotInitialized`] if the tree is empty.
    pub fn radius_search(
        &self,
        tracks: &[Track],
        center: &FeatureVector,
        center_index: Option<usize>,
        radius: f32,
        weights: Option<&[f32; NUM_FEATURES]>,
        limit: usize,
    ) -> Result<Vec<ScoredTrack>, EngineError> {
        let root = self.require_root()?;
        let default_weights = FeatureVector::default_weights();
        let weights = weights.unwrap_or(&default_weights);
        let mut hits = Vec::new();
        Self::walk_feature(root, tracks, center, center_index, radius, weights, &mut hits);
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    fn walk_feature(
        node: &Node,
        tracks: &[Track],
        center: &FeatureVector,
        center_index: Option<usize>,
        radius: f32,
        weights: &[f32; NUM_FEATURES],
        out: &mut Vec<ScoredTrack>,
    ) {
        let point = &tracks[node.track_index].features;
        let distance = weighted_feature_distance(center, point, weights);
        if distance <= radius && Some(node.track_index) != center_index {
            out.push(ScoredTrack { track_index: node.track_index, distance });
        }

        let dim = node.split_dimension;
        let gap = center[dim] - point[dim];
        let (near, far) = if gap < 0.0 { (&node.left, &node.right) } else { (&node.right, &node.left) };
        if let Some(near) = near {
            Self::walk_feature(near, tracks, center, center_index, radius, weights, out);
        }
        // standard KD-tree pruning: only descend into the far side if the
        // split-dimension gap (scaled by that dimension's weight) could still
        // be within radius.
        if gap.abs() * weights[dim] <= radius
            && let Some(far) = far
        {
            Self::walk_feature(far, tracks, center, center_index, radius, weights, out);
        }
    }

    /// Annular PCA radius search (§4.1): `pca_radius_search`. Keeps only
    /// tracks whose PCA distance on `discriminator` lies in
    /// `[inner, outer]`. Because the tree is organized by raw feature
    /// dimensions, pruning uses a conservative subtree radius estimate
    /// (`conservative_subtree_radius`) rather than an exact bound.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IndexNotInitialized`] if the tree is empty.
    pub fn pca_radius_search(
        &self,
        tracks: &[Track],
        center: &Track,
        discriminator: PcaDiscriminator,
        inner: f32,
        outer: f32,
        conservative_subtree_radius: f32,
        limit: usize,
    ) -> Result<Vec<ScoredTrack>, EngineError> {
        let root = self.require_root()?;
        let mut hits = Vec::new();
        Self::walk_pca(root, tracks, center, discriminator, inner, outer, conservative_subtree_radius, &mut hits);
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_pca(
        node: &Node,
        tracks: &[Track],
        center: &Track,
        discriminator: PcaDiscriminator,
        inner: f32,
        outer: f32,
        conservative_subtree_radius: f32,
        out: &mut Vec<ScoredTrack>,
    ) {
        let candidate = &tracks[node.track_index];
        if candidate.id != center.id {
            let distance = pca_distance(&center.pca, &candidate.pca, discriminator);
            if distance >= inner && distance <= outer {
                out.push(ScoredTrack { track_index: node.track_index, distance });
            }
        }

        let dim = node.split_dimension;
        let gap = center.features[dim] - candidate.features[dim];
        let (near, far) = if gap < 0.0 { (&node.left, &node.right) } else { (&node.right, &node.left) };
        if let Some(near) = near {
            Self::walk_pca(near, tracks, center, discriminator, inner, outer, conservative_subtree_radius, out);
        }
        if gap.abs() <= conservative_subtree_radius
            && let Some(far) = far
        {
            Self::walk_pca(far, tracks, center, discriminator, inner, outer, conservative_subtree_radius, out);
        }
    }

    /// VAE-latent radius search (§4.1): `vae_radius_search`. Traversal
    /// visitation matches `radius_search`; scoring is Euclidean distance over
    /// the 8-D latent. Nodes lacking a latent are skipped but their children
    /// are still visited. Cross-pruning uses a generous `radius * 10`
    /// threshold since the tree isn't organized by latent dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IndexNotInitialized`] if the tree is empty.
    pub fn vae_radius_search(
        &self,
        tracks: &[Track],
        center: &FeatureVector,
        center_index: Option<usize>,
        latent: &[f32; 8],
        radius: f32,
        limit: usize,
    ) -> Result<Vec<ScoredTrack>, EngineError> {
        let root = self.require_root()?;
        let mut hits = Vec::new();
        Self::walk_vae(root, tracks, center, center_index, latent, radius, &mut hits);
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    fn walk_vae(
        node: &Node,
        tracks: &[Track],
        center: &FeatureVector,
        center_index: Option<usize>,
        latent: &[f32; 8],
        radius: f32,
        out: &mut Vec<ScoredTrack>,
    ) {
        let candidate = &tracks[node.track_index];
        if Some(node.track_index) != center_index
            && let Some(vae) = &candidate.vae
        {
            let distance = euclidean(&latent[..], &vae.values[..]);
            if distance <= radius {
                out.push(ScoredTrack { track_index: node.track_index, distance });
            }
        }

        let dim = node.split_dimension;
        let gap = center[dim] - candidate.features[dim];
        let (near, far) = if gap < 0.0 { (&node.left, &node.right) } else { (&node.right, &node.left) };
        if let Some(near) = near {
            Self::walk_vae(near, tracks, center, center_index, latent, radius, out);
        }
        if gap.abs() <= radius * 10.0
            && let Some(far) = far
        {
            Self::walk_vae(far, tracks, center, center_index, latent, radius, out);
        }
    }
}

/// `Σ wᵢ · |aᵢ − bᵢ|` over the 18 raw feature dimensions (§4.1).
#[must_use]
pub fn weighted_feature_distance(a: &FeatureVector, b: &FeatureVector, weights: &[f32; NUM_FEATURES]) -> f32 {
    (0..NUM_FEATURES).map(|i| weights[i] * (a[i] - b[i]).abs()).sum()
}

/// PCA distance for a discriminator: absolute difference for `primary_d`,
/// Euclidean for the three 3-vector domains.
#[must_use]
pub fn pca_distance(a: &drift_types::PcaProjection, b: &drift_types::PcaProjection, discriminator: PcaDiscriminator) -> f32 {
    match discriminator {
        PcaDiscriminator::PrimaryD => (a.primary_d - b.primary_d).abs(),
        PcaDiscriminator::Tonal | PcaDiscriminator::Spectral | PcaDiscriminator::Rhythmic => {
            let domain = discriminator.domain().expect("non-primary discriminator always has a domain");
            let av = a.domain(domain).unwrap_or([0.0; 3]);
            let bv = b.domain(domain).unwrap_or([0.0; 3]);
            euclidean(&av, &bv)
        }
    }
}

#[must_use]
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt()
}

/// Resolve a [`TrackId`] to its index in the backing slice. Used by callers
/// that only have an id (e.g. a session's current-track pointer).
#[must_use]
pub fn index_of(tracks: &[Track], id: &TrackId) -> Option<usize> {
    tracks.iter().position(|t| &t.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_types::{PcaProjection, Track, TrackId, TrackMetadataBlob};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn track(id: &str, bpm: f32, centroid: f32) -> Track {
        let mut features = FeatureVector::zero();
        features[drift_types::FeatureIndex::Bpm] = bpm;
        features[drift_types::FeatureIndex::SpectralCentroid] = centroid;
        Track {
            id: TrackId::new(id),
            title: "t".into(),
            artist: "a".into(),
            album: "al".into(),
            album_cover_path: None,
            file_path: PathBuf::from("/x"),
            duration_seconds: 180.0,
            features,
            pca: PcaProjection { primary_d: bpm, tonal: [0.0; 3], spectral: [0.0; 3], rhythmic: [0.0; 3] },
            vae: None,
            metadata: TrackMetadataBlob::default(),
        }
    }

    #[test]
    fn radius_zero_excludes_center_and_returns_empty() {
        let tracks = vec![track("a", 120.0, 2000.0), track("b", 121.0, 2000.0)];
        let tree = KdTree::build(&tracks);
        let hits = tree
            .radius_search(&tracks, &tracks[0].features, Some(0), 0.0, None, 10)
            .unwrap();
        assert_eq!(hits, Vec::new());
    }

    #[test]
    fn radius_search_finds_nearby_and_excludes_far() {
        let tracks = vec![track("a", 120.0, 2000.0), track("b", 121.0, 2000.0), track("c", 200.0, 2000.0)];
        let tree = KdTree::build(&tracks);
        let hits = tree
            .radius_search(&tracks, &tracks[0].features, Some(0), 5.0, None, 10)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].track_index, 1);
    }

    #[test]
    fn uninitialized_tree_errors() {
        let tracks: Vec<Track> = Vec::new();
        let tree = KdTree::build(&tracks);
        assert!(!tree.is_initialized());
        let center = FeatureVector::zero();
        assert!(matches!(
            tree.radius_search(&tracks, &center, None, 1.0, None, 10),
            Err(EngineError::IndexNotInitialized)
        ));
    }

    #[test]
    fn pca_radius_search_respects_annulus() {
        let tracks = vec![track("a", 120.0, 2000.0), track("b", 121.0, 2000.0), track("c", 130.0, 2000.0)];
        let tree = KdTree::build(&tracks);
        let hits = tree
            .pca_radius_search(&tracks, &tracks[0], PcaDiscriminator::PrimaryD, 5.0, 15.0, 50.0, 10)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].track_index, 2);
    }
}
