use std::collections::BTreeSet;

use crate::{CellCount, Coord, Coord2, GameError, Position, Result, area};

pub use random::*;

mod random;

/// Strategy producing the set of flattened bomb indices for a board.
///
/// [`crate::Board::plant_bombs`] consumes one of these, so callers pick
/// between random and explicit placement (and tests stay deterministic)
/// without the board knowing the difference.
pub trait BombPlacement {
    fn place(&mut self, size: Coord2, count: CellCount) -> Result<BTreeSet<CellCount>>;
}

/// Adopts a caller-supplied bomb set verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExplicitPlacement(pub BTreeSet<CellCount>);

impl ExplicitPlacement {
    /// Builds the set from positions in either address form, flattened
    /// against the given board width.
    pub fn from_positions<P: Into<Position>>(
        width: Coord,
        positions: impl IntoIterator<Item = P>,
    ) -> Self {
        Self(
            positions
                .into_iter()
                .map(|pos| pos.into().flatten(width))
                .collect(),
        )
    }
}

impl BombPlacement for ExplicitPlacement {
    fn place(&mut self, size: Coord2, count: CellCount) -> Result<BTreeSet<CellCount>> {
        if self.0.len() as CellCount != count {
            return Err(GameError::BombCountMismatch);
        }

        let total = area(size.0, size.1);
        if self.0.iter().any(|&index| index >= total) {
            return Err(GameError::OutOfBounds);
        }

        Ok(self.0.clone())
    }
}
