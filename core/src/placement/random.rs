use std::collections::BTreeSet;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use super::BombPlacement;
use crate::{CellCount, Coord2, GameError, Position, Result, area};

/// Uniform random placement over the whole board, with an optional single
/// position that must end up bomb-free. Draws land in a set, so duplicates
/// collapse and drawing continues until `count` distinct indices exist; a
/// draw hitting the excluded position is discarded and redrawn.
#[derive(Clone, Debug)]
pub struct RandomPlacement<R> {
    rng: R,
    exclude: Option<Position>,
}

impl<R: Rng> RandomPlacement<R> {
    pub fn new(rng: R) -> Self {
        Self { rng, exclude: None }
    }

    pub fn excluding(rng: R, exclude: impl Into<Position>) -> Self {
        Self {
            rng,
            exclude: Some(exclude.into()),
        }
    }
}

impl RandomPlacement<SmallRng> {
    /// Deterministic placement for a given seed.
    pub fn from_seed(seed: u64) -> Self {
        Self::new(SmallRng::seed_from_u64(seed))
    }

    pub fn from_seed_excluding(seed: u64, exclude: impl Into<Position>) -> Self {
        Self::excluding(SmallRng::seed_from_u64(seed), exclude)
    }
}

impl<R: Rng> BombPlacement for RandomPlacement<R> {
    fn place(&mut self, size: Coord2, count: CellCount) -> Result<BTreeSet<CellCount>> {
        let total = area(size.0, size.1);
        if count > total.saturating_sub(1) {
            return Err(GameError::TooManyBombs);
        }

        let excluded = self.exclude.map(|pos| pos.flatten(size.0));
        if let Some(index) = excluded {
            if index >= total {
                log::warn!("Excluded position {} outside {:?} board, ignoring", index, size);
            }
        }

        let mut bombs = BTreeSet::new();
        while (bombs.len() as CellCount) < count {
            let draw = self.rng.random_range(0..total);
            if excluded == Some(draw) {
                log::trace!("Redrawing bomb that landed on excluded position {}", draw);
                continue;
            }
            bombs.insert(draw);
        }

        Ok(bombs)
    }
}
