//! Spatial queries driven by script predicates.
//!
//! The index itself lives in the engine. Scripts only supply the overlap
//! test and the per-match callback, which reach the index as plain closures.

use crate::delegate::FunctionDelegate;
use crate::marshal::Native;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl BoundingBox {
    pub fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self { min, max }
    }

    pub fn from_center(center: [f32; 3], half_extents: [f32; 3]) -> Self {
        Self {
            min: std::array::from_fn(|i| center[i] - half_extents[i]),
            max: std::array::from_fn(|i| center[i] + half_extents[i]),
        }
    }

    pub fn center(&self) -> [f32; 3] {
        std::array::from_fn(|i| (self.min[i] + self.max[i]) * 0.5)
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        (0..3).all(|i| self.min[i] <= other.max[i] && other.min[i] <= self.max[i])
    }

    pub fn contains_point(&self, point: [f32; 3]) -> bool {
        (0..3).all(|i| self.min[i] <= point[i] && point[i] <= self.max[i])
    }

    /// Smallest box containing both.
    pub fn merge(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: std::array::from_fn(|i| self.min[i].min(other.min[i])),
            max: std::array::from_fn(|i| self.max[i].max(other.max[i])),
        }
    }
}

/// An engine-side spatial index.
///
/// `overlaps` decides whether a node's volume is worth descending into;
/// `on_match` receives the id of every item whose volume passed.
pub trait SpatialIndex {
    fn query(
        &self,
        overlaps: &mut dyn FnMut(&BoundingBox) -> bool,
        on_match: &mut dyn FnMut(u64),
    );
}

/// Query `index` with a script predicate and a script match callback.
///
/// The predicate receives the volume inline and returns a boolean; anything
/// else counts as no overlap. The callback receives the item id. Returns the
/// number of matches reported by the index.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn query_index<I>(index: &I, overlap: &FunctionDelegate, on_match: &FunctionDelegate) -> usize
where
    I: SpatialIndex + ?Sized,
{
    let mut matches = 0;
    index.query(
        &mut |bounds| overlap.call_bool((Native(*bounds),)),
        &mut |item| {
            matches += 1;
            on_match.call((item,));
        },
    );
    matches
}
