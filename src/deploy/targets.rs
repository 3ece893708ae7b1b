//! Deployment target pools
//!
//! Drop points are calibrated for a fully zoomed-out 1600x900 view.
//! The troop pool traces the bottom-left map edge; heroes go to a
//! shorter arc behind it, spells over the likely storage area.

use rand::seq::SliceRandom;
use rand::Rng;

/// Troop drop points along the bottom-left edge
pub const TROOP_POOL: [(i32, i32); 14] = [
    (214, 404),
    (259, 441),
    (304, 478),
    (349, 515),
    (394, 552),
    (439, 589),
    (484, 626),
    (529, 663),
    (608, 700),
    (698, 721),
    (788, 735),
    (878, 721),
    (968, 700),
    (1047, 663),
];

/// Hero drop points, slightly behind the troop line
pub const HERO_POOL: [(i32, i32); 5] = [
    (381, 486),
    (471, 560),
    (561, 634),
    (651, 686),
    (741, 710),
];

/// Spell cast points over the base interior
pub const SPELL_POOL: [(i32, i32); 5] = [
    (620, 330),
    (720, 380),
    (820, 430),
    (920, 380),
    (1020, 330),
];

/// A pool of drop points walked in random order
///
/// Repeated drops on one point are a bot tell, so a sequence covers a
/// full shuffled permutation of the pool before any point repeats.
pub struct TargetPool {
    points: Vec<(i32, i32)>,
}

impl TargetPool {
    pub fn new(points: Vec<(i32, i32)>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Draw `count` drop points
    pub fn sequence<R: Rng>(&self, rng: &mut R, count: usize) -> Vec<(i32, i32)> {
        if self.points.is_empty() || count == 0 {
            return Vec::new();
        }
        let mut order = self.points.clone();
        order.shuffle(rng);
        (0..count).map(|i| order[i % order.len()]).collect()
    }
}
