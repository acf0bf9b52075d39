//! Splitting plane selection

use crate::arena::Arena;
use crate::float_types::{Real, tolerance};
use crate::plane::{INSIDE, ON, OUTSIDE, Plane};
use crate::triangle::{Triangle, TriangleId};

/// Trait for picking the plane that splits a set of pending triangles
pub trait SplittingPlaneStrategy {
    /// Pick a splitting plane among the supporting planes of `candidates`.
    ///
    /// Returns `None` only when no candidate has a plane.
    fn pick_splitting_plane(&self, triangles: &Arena<Triangle>, candidates: &[TriangleId]) -> Option<Plane>;
}

/// Default splitting plane strategy using balanced heuristic
///
/// Scores the planes of the first `sample_size` candidates by
/// `span_weight * spanning + balance_weight * |inside - outside|` and keeps
/// the lowest score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalancedSplittingStrategy {
    pub span_weight: Real,
    pub balance_weight: Real,
    pub sample_size: usize,
}

impl Default for BalancedSplittingStrategy {
    fn default() -> Self {
        Self {
            span_weight: 8.0,
            balance_weight: 1.0,
            sample_size: 20,
        }
    }
}

impl SplittingPlaneStrategy for BalancedSplittingStrategy {
    fn pick_splitting_plane(&self, triangles: &Arena<Triangle>, candidates: &[TriangleId]) -> Option<Plane> {
        let mut best: Option<(Real, Plane)> = None;

        for plane in candidates
            .iter()
            .filter_map(|&t| triangles[t].plane())
            .take(self.sample_size.max(1))
        {
            let (num_inside, num_outside, num_spanning) = candidates
                .iter()
                .map(|&t| match plane.classify_points(&triangles[t].points) {
                    ON => (0, 0, 0),
                    INSIDE => (1, 0, 0),
                    OUTSIDE => (0, 1, 0),
                    _ => (0, 0, 1),
                })
                .fold((0i64, 0i64, 0i64), |acc, x| (acc.0 + x.0, acc.1 + x.1, acc.2 + x.2));

            let score = self.span_weight * num_spanning as Real
                + self.balance_weight * ((num_inside - num_outside) as Real).abs();

            if best.as_ref().is_none_or(|(s, _)| score < *s) {
                best = Some((score, plane));
            }
        }
        best.map(|(_, plane)| plane)
    }
}

/// Use the plane of the first usable candidate, in insertion order.
///
/// Cheap and deterministic; the tree shape follows the input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FirstTriangleStrategy;

impl SplittingPlaneStrategy for FirstTriangleStrategy {
    fn pick_splitting_plane(&self, triangles: &Arena<Triangle>, candidates: &[TriangleId]) -> Option<Plane> {
        candidates.iter().find_map(|&t| {
            let tri = &triangles[t];
            if tri.is_degenerate(tolerance()) {
                None
            } else {
                tri.plane()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn tri(points: [[Real; 3]; 3]) -> Triangle {
        Triangle::new(points.map(|[x, y, z]| Point3::new(x, y, z)))
    }

    #[test]
    fn balanced_prefers_a_plane_that_spans_nothing() {
        let mut arena = Arena::new();
        // a vertical wall crossing two floor triangles, plus a floor triangle
        let ids = [
            arena.alloc(tri([[0.5, -1.0, -1.0], [0.5, 1.0, -1.0], [0.5, 0.0, 1.0]])).unwrap(),
            arena.alloc(tri([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])).unwrap(),
            arena.alloc(tri([[0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]])).unwrap(),
        ];
        let plane = BalancedSplittingStrategy::default()
            .pick_splitting_plane(&arena, &ids)
            .unwrap();
        // the wall would cut both floor triangles
        assert!(plane.normal.x.abs() < 1e-9);
    }

    #[test]
    fn first_triangle_skips_degenerate_candidates() {
        let mut arena = Arena::new();
        let ids = [
            arena.alloc(tri([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]])).unwrap(),
            arena.alloc(tri([[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0]])).unwrap(),
        ];
        let plane = FirstTriangleStrategy.pick_splitting_plane(&arena, &ids).unwrap();
        assert!((plane.offset() - 1.0).abs() < 1e-12);
    }
}
