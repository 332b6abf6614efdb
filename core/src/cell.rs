use serde::{Deserialize, Serialize};

/// Cell value marking a planted bomb. Non-bomb cells hold `0..=8`.
pub const BOMB: i8 = -1;

/// One grid position's state, returned by [`crate::Board::get`] as a
/// read-only snapshot.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// [`BOMB`], or the number of bombs in the 8-neighborhood. Fixed once
    /// bombs are planted.
    pub value: i8,
    /// Monotonic, never reverts to hidden.
    pub is_revealed: bool,
    /// Player-set suspected-bomb marker; blocks reveal while set.
    pub is_checked: bool,
}

impl Cell {
    pub const fn is_bomb(self) -> bool {
        self.value == BOMB
    }

    /// Whether a reveal would be a no-op on this cell.
    pub const fn is_settled(self) -> bool {
        self.is_revealed || self.is_checked
    }
}
