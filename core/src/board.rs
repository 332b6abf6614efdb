use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::ops::BitOr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::placement::BombPlacement;
use crate::{
    BOMB, Cell, CellCount, Coord, Coord2, GameError, NeighborIter, Position, Result, RevealOutcome,
    ToGridIndex, area,
};

/// Board lifecycle. Bombs are planted exactly once, then the board is in
/// play until a reveal settles it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoardState {
    /// Created, bombs not planted yet.
    Ready,
    /// Planted and playable.
    Active,
    Won,
    Lost,
}

impl BoardState {
    pub const fn is_planted(self) -> bool {
        !matches!(self, Self::Ready)
    }

    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

impl Default for BoardState {
    fn default() -> Self {
        Self::Ready
    }
}

/// The rule engine: a `width × height` grid of [`Cell`]s plus the planted
/// bomb set. Owns every state transition; callers only render and forward
/// intent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Board {
    size: Coord2,
    grid: Array2<Cell>,
    bomb_positions: BTreeSet<CellCount>,
    checked_count: CellCount,
    state: BoardState,
}

impl Board {
    /// Creates an empty board; dimensions are clamped to at least 1.
    pub fn new(width: Coord, height: Coord) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            size: (width, height),
            grid: Array2::default((width, height).to_grid_index()),
            bomb_positions: BTreeSet::new(),
            checked_count: 0,
            state: Default::default(),
        }
    }

    pub fn width(&self) -> Coord {
        self.size.0
    }

    pub fn height(&self) -> Coord {
        self.size.1
    }

    pub fn size(&self) -> Coord2 {
        self.size
    }

    pub fn total_cells(&self) -> CellCount {
        area(self.size.0, self.size.1)
    }

    pub fn state(&self) -> BoardState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// Flattened indices of the planted bombs; empty while [`BoardState::Ready`].
    pub fn bomb_positions(&self) -> &BTreeSet<CellCount> {
        &self.bomb_positions
    }

    pub fn bomb_count(&self) -> CellCount {
        self.bomb_positions.len() as CellCount
    }

    pub fn checked_count(&self) -> CellCount {
        self.checked_count
    }

    /// How many bombs have not been checked yet; negative when over-checked.
    pub fn bombs_left(&self) -> isize {
        self.bomb_count() as isize - self.checked_count as isize
    }

    /// Read-only snapshot of one cell.
    pub fn get(&self, pos: impl Into<Position>) -> Result<Cell> {
        let coords = self.validate(pos.into())?;
        Ok(self.grid[coords.to_grid_index()])
    }

    /// All in-bounds positions of the 8-neighborhood around `pos`.
    pub fn iter_neighbors(&self, pos: impl Into<Position>) -> Result<NeighborIter> {
        let coords = self.validate(pos.into())?;
        Ok(NeighborIter::new(coords, self.size))
    }

    /// The neighbors of `pos` that have not been revealed yet. The cascade
    /// walks these, and chord-style gestures inspect them.
    pub fn unrevealed_neighbors(
        &self,
        pos: impl Into<Position>,
    ) -> Result<impl Iterator<Item = Coord2> + '_> {
        let coords = self.validate(pos.into())?;
        Ok(NeighborIter::new(coords, self.size)
            .filter(|&pos| !self.grid[pos.to_grid_index()].is_revealed))
    }

    /// Plants `count` bombs using `placement`, then computes every hint
    /// value in one pass over the grid (at most 8 neighbor probes per cell).
    /// Exactly once per board; values are fixed afterwards.
    pub fn plant_bombs(
        &mut self,
        count: CellCount,
        mut placement: impl BombPlacement,
    ) -> Result<()> {
        if self.state.is_planted() {
            return Err(GameError::AlreadyPlanted);
        }

        let bombs = placement.place(self.size, count)?;

        for &index in &bombs {
            let coords = Position::Flat(index).coords(self.size.0);
            self.grid[coords.to_grid_index()].value = BOMB;
        }

        let (width, height) = self.size;
        for y in 0..height {
            for x in 0..width {
                if self.grid[(x, y).to_grid_index()].is_bomb() {
                    continue;
                }
                let count = self.adjacent_bomb_count((x, y)) as i8;
                self.grid[(x, y).to_grid_index()].value = count;
            }
        }

        log::debug!("Planted {} bombs on {}x{}", bombs.len(), width, height);
        self.bomb_positions = bombs;
        self.state = BoardState::Active;
        Ok(())
    }

    /// Reveals a cell and classifies the outcome.
    ///
    /// Already revealed or checked cells are a silent [`RevealOutcome::NoChange`].
    /// Revealing a zero-valued cell runs the flood cascade before returning,
    /// so a single call settles the whole connected empty region; if the
    /// cascade (or the reveal itself) leaves no safe cell hidden the result
    /// is [`RevealOutcome::Win`].
    pub fn reveal(&mut self, pos: impl Into<Position>) -> Result<RevealOutcome> {
        let coords = self.validate(pos.into())?;
        self.check_playable()?;

        let outcome = self.reveal_single_cell(coords);
        Ok(self.settle(outcome))
    }

    /// Reveals every neighbor of a revealed numbered cell whose
    /// checked-neighbor count matches its value; behaves as a plain
    /// [`Board::reveal`] on any other cell. A misplaced check makes this
    /// gesture able to reveal a bomb, exactly like a direct reveal.
    pub fn chord_reveal(&mut self, pos: impl Into<Position>) -> Result<RevealOutcome> {
        let coords = self.validate(pos.into())?;
        self.check_playable()?;

        let cell = self.grid[coords.to_grid_index()];
        let outcome = match cell {
            Cell {
                value,
                is_revealed: true,
                ..
            } if value > 0 && value as u8 == self.checked_neighbor_count(coords) => {
                NeighborIter::new(coords, self.size)
                    .map(|neighbor_coords| self.reveal_single_cell(neighbor_coords))
                    .reduce(BitOr::bitor)
                    .unwrap_or(RevealOutcome::NoChange)
            }
            _ => self.reveal_single_cell(coords),
        };
        Ok(self.settle(outcome))
    }

    /// Flips the suspected-bomb marker and returns the new value. Purely a
    /// caller-assist flag; callers are expected not to toggle revealed cells.
    pub fn toggle_check(&mut self, pos: impl Into<Position>) -> Result<bool> {
        let coords = self.validate(pos.into())?;
        self.check_playable()?;

        let cell = &mut self.grid[coords.to_grid_index()];
        cell.is_checked = !cell.is_checked;
        let checked = cell.is_checked;
        if checked {
            self.checked_count += 1;
        } else {
            self.checked_count -= 1;
        }
        Ok(checked)
    }

    /// Resolves a position in either address form to in-bounds coordinates.
    fn validate(&self, pos: Position) -> Result<Coord2> {
        let (width, height) = self.size;
        let (x, y) = pos.coords(width);
        if x < width && y < height {
            Ok((x, y))
        } else {
            Err(GameError::OutOfBounds)
        }
    }

    fn check_playable(&self) -> Result<()> {
        match self.state {
            BoardState::Ready => Err(GameError::NotPlanted),
            BoardState::Active => Ok(()),
            BoardState::Won | BoardState::Lost => Err(GameError::AlreadyEnded),
        }
    }

    /// Reveals one cell without the win scan; flood-fills when it is empty.
    fn reveal_single_cell(&mut self, coords: Coord2) -> RevealOutcome {
        let cell = self.grid[coords.to_grid_index()];
        if cell.is_settled() {
            return RevealOutcome::NoChange;
        }

        self.grid[coords.to_grid_index()].is_revealed = true;

        if cell.is_bomb() {
            log::debug!("Revealed bomb at {:?}", coords);
            self.state = BoardState::Lost;
            return RevealOutcome::Bomb;
        }

        log::debug!("Revealed cell at {:?}, value {}", coords, cell.value);
        if cell.value == 0 {
            self.flood_reveal(coords);
            RevealOutcome::Zero
        } else {
            RevealOutcome::Tip
        }
    }

    /// Worklist flood over the connected zero region and its numbered
    /// border. Cells adjacent to a zero cell cannot be bombs, so the cascade
    /// never reveals one; checked cells stay hidden.
    fn flood_reveal(&mut self, coords: Coord2) {
        let mut visited = BTreeSet::from([coords]);
        let mut to_visit: VecDeque<_> = NeighborIter::new(coords, self.size)
            .filter(|&pos| !self.grid[pos.to_grid_index()].is_settled())
            .collect();
        log::trace!(
            "Starting flood from {:?}, initial neighbors: {:?}",
            coords,
            to_visit
        );

        while let Some(visit_coords) = to_visit.pop_front() {
            if !visited.insert(visit_coords) {
                continue;
            }

            let cell = self.grid[visit_coords.to_grid_index()];
            if cell.is_settled() {
                continue;
            }

            self.grid[visit_coords.to_grid_index()].is_revealed = true;
            log::trace!("Flood revealed {:?}, value {}", visit_coords, cell.value);

            if cell.value == 0 {
                to_visit.extend(
                    NeighborIter::new(visit_coords, self.size)
                        .filter(|&pos| !self.grid[pos.to_grid_index()].is_settled())
                        .filter(|pos| !visited.contains(pos)),
                );
            }
        }
    }

    /// Upgrades the outcome to a win when no safe cell is left hidden. One
    /// full-board scan per player call, after any cascade has finished.
    fn settle(&mut self, outcome: RevealOutcome) -> RevealOutcome {
        use RevealOutcome::*;
        match outcome {
            Tip | Zero if self.all_safe_revealed() => {
                self.state = BoardState::Won;
                Win
            }
            _ => outcome,
        }
    }

    fn all_safe_revealed(&self) -> bool {
        !self
            .grid
            .iter()
            .any(|cell| !cell.is_revealed && !cell.is_bomb())
    }

    fn adjacent_bomb_count(&self, coords: Coord2) -> u8 {
        NeighborIter::new(coords, self.size)
            .filter(|&pos| self.grid[pos.to_grid_index()].is_bomb())
            .count()
            .try_into()
            .unwrap()
    }

    fn checked_neighbor_count(&self, coords: Coord2) -> u8 {
        NeighborIter::new(coords, self.size)
            .filter(|&pos| self.grid[pos.to_grid_index()].is_checked)
            .count()
            .try_into()
            .unwrap()
    }
}

/// Debug rendering: one line per row, each value right-aligned to width 2.
impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (width, height) = self.size;
        for y in 0..height {
            if y > 0 {
                writeln!(f)?;
            }
            for x in 0..width {
                if x > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{:>2}", self.grid[(x, y).to_grid_index()].value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::{ExplicitPlacement, RandomPlacement};

    fn board(size: Coord2, bombs: &[CellCount]) -> Board {
        let mut board = Board::new(size.0, size.1);
        board
            .plant_bombs(
                bombs.len() as CellCount,
                ExplicitPlacement(bombs.iter().copied().collect()),
            )
            .unwrap();
        board
    }

    #[test]
    fn hint_values_match_neighbor_counts() {
        let board = board((3, 3), &[4]);

        assert_eq!(board.get(4).unwrap().value, BOMB);
        for index in [0u32, 1, 2, 3, 5, 6, 7, 8] {
            assert_eq!(board.get(index).unwrap().value, 1);
        }
    }

    #[test]
    fn planted_bomb_count_matches_request() {
        let mut board = Board::new(9, 9);
        board
            .plant_bombs(10, RandomPlacement::from_seed(11))
            .unwrap();

        assert_eq!(board.bomb_count(), 10);
        let bombs_on_grid = (0..board.total_cells())
            .filter(|&index| board.get(index).unwrap().is_bomb())
            .count();
        assert_eq!(bombs_on_grid, 10);

        for index in 0..board.total_cells() {
            let cell = board.get(index).unwrap();
            if !cell.is_bomb() {
                let expected = board
                    .iter_neighbors(index)
                    .unwrap()
                    .filter(|&pos| board.get(pos).unwrap().is_bomb())
                    .count() as i8;
                assert_eq!(cell.value, expected);
            }
        }
    }

    #[test]
    fn planting_twice_is_rejected() {
        let mut board = board((3, 3), &[4]);

        assert_eq!(
            board.plant_bombs(1, ExplicitPlacement(BTreeSet::from([0]))),
            Err(GameError::AlreadyPlanted)
        );
    }

    #[test]
    fn full_board_of_bombs_is_rejected() {
        let mut board = Board::new(4, 4);

        assert_eq!(
            board.plant_bombs(16, RandomPlacement::from_seed(0)),
            Err(GameError::TooManyBombs)
        );
        assert_eq!(board.state(), BoardState::Ready);
    }

    #[test]
    fn mismatched_explicit_count_leaves_board_unplanted() {
        let mut board = Board::new(3, 3);

        assert_eq!(
            board.plant_bombs(2, ExplicitPlacement(BTreeSet::from([4]))),
            Err(GameError::BombCountMismatch)
        );
        assert_eq!(board.state(), BoardState::Ready);
        assert_eq!(board.reveal(0), Err(GameError::NotPlanted));
    }

    #[test]
    fn revealing_a_numbered_cell_is_a_tip() {
        let mut board = board((3, 3), &[4]);

        assert_eq!(board.reveal((0, 0)).unwrap(), RevealOutcome::Tip);
        assert!(board.get((0, 0)).unwrap().is_revealed);
        assert_eq!(board.state(), BoardState::Active);
    }

    #[test]
    fn second_reveal_is_a_noop() {
        let mut board = board((3, 3), &[4]);

        board.reveal((0, 0)).unwrap();
        let before = board.clone();

        assert_eq!(board.reveal((0, 0)).unwrap(), RevealOutcome::NoChange);
        assert_eq!(board, before);
    }

    #[test]
    fn revealing_a_bomb_loses_without_cascade() {
        let mut board = board((3, 3), &[4]);

        assert_eq!(board.reveal((1, 1)).unwrap(), RevealOutcome::Bomb);
        assert_eq!(board.state(), BoardState::Lost);
        assert!(board.get(4).unwrap().is_revealed);
        for index in [0u32, 1, 2, 3, 5, 6, 7, 8] {
            assert!(!board.get(index).unwrap().is_revealed);
        }
    }

    #[test]
    fn zero_reveal_cascades_region_and_border() {
        // a full column of bombs splits the board into two zero regions
        let mut board = board((5, 5), &[2, 7, 12, 17, 22]);

        assert_eq!(board.reveal((0, 0)).unwrap(), RevealOutcome::Zero);

        for y in 0..5 {
            // left zero region and its numbered border are open
            assert!(board.get((0, y)).unwrap().is_revealed);
            assert!(board.get((1, y)).unwrap().is_revealed);
            // bombs and the right-hand region are untouched
            assert!(!board.get((2, y)).unwrap().is_revealed);
            assert!(!board.get((3, y)).unwrap().is_revealed);
            assert!(!board.get((4, y)).unwrap().is_revealed);
        }
        assert_eq!(board.state(), BoardState::Active);
    }

    #[test]
    fn cascade_never_reveals_a_bomb() {
        let mut board = board((8, 8), &[63]);

        board.reveal((0, 0)).unwrap();

        assert!(!board.get(63).unwrap().is_revealed);
    }

    #[test]
    fn checked_cell_blocks_reveal_and_cascade() {
        let mut board = board((5, 5), &[24]);

        assert!(board.toggle_check((1, 1)).unwrap());
        assert_eq!(board.reveal((1, 1)).unwrap(), RevealOutcome::NoChange);

        board.reveal((0, 0)).unwrap();

        let checked = board.get((1, 1)).unwrap();
        assert!(checked.is_checked);
        assert!(!checked.is_revealed);
    }

    #[test]
    fn revealing_last_safe_cell_wins() {
        let mut board = board((2, 1), &[0]);

        assert_eq!(board.reveal((1, 0)).unwrap(), RevealOutcome::Win);
        assert_eq!(board.state(), BoardState::Won);
        assert!(board.is_finished());
    }

    #[test]
    fn cascade_win_is_reported_on_the_initiating_reveal() {
        // 1x3 board [0, 1, bomb]: revealing the zero cell floods to the
        // border and settles every safe cell in one call
        let mut board = board((3, 1), &[2]);

        assert_eq!(board.get(0).unwrap().value, 0);
        assert_eq!(board.get(1).unwrap().value, 1);

        assert_eq!(board.reveal(0).unwrap(), RevealOutcome::Win);
        assert!(board.get(1).unwrap().is_revealed);
        assert!(!board.get(2).unwrap().is_revealed);
    }

    #[test]
    fn moves_after_the_end_are_rejected() {
        let mut board = board((3, 3), &[4]);

        board.reveal(4).unwrap();

        assert_eq!(board.reveal(0), Err(GameError::AlreadyEnded));
        assert_eq!(board.toggle_check(0), Err(GameError::AlreadyEnded));
        assert_eq!(board.chord_reveal(0), Err(GameError::AlreadyEnded));
    }

    #[test]
    fn out_of_bounds_positions_are_rejected_in_both_forms() {
        let mut board = board((3, 3), &[4]);

        assert_eq!(board.reveal(9), Err(GameError::OutOfBounds));
        assert_eq!(board.reveal((3, 0)), Err(GameError::OutOfBounds));
        assert_eq!(board.get((0, 3)), Err(GameError::OutOfBounds));
        assert_eq!(board.toggle_check(100), Err(GameError::OutOfBounds));
    }

    #[test]
    fn both_address_forms_reach_the_same_cell() {
        let mut board = board((3, 3), &[4]);

        board.toggle_check((1, 1)).unwrap();

        assert!(board.get(4).unwrap().is_checked);
    }

    #[test]
    fn toggle_check_flips_back_to_the_original_state() {
        let mut board = board((3, 3), &[4]);

        assert!(board.toggle_check(0).unwrap());
        assert_eq!(board.checked_count(), 1);
        assert!(!board.toggle_check(0).unwrap());
        assert_eq!(board.checked_count(), 0);
        assert!(!board.get(0).unwrap().is_checked);
    }

    #[test]
    fn bombs_left_goes_negative_when_over_checked() {
        let mut board = board((3, 3), &[4]);

        board.toggle_check(0).unwrap();
        board.toggle_check(1).unwrap();

        assert_eq!(board.bombs_left(), -1);
    }

    #[test]
    fn chord_reveal_opens_unchecked_neighbors_when_checks_match() {
        let mut board = board((3, 3), &[4]);

        assert_eq!(board.reveal((0, 0)).unwrap(), RevealOutcome::Tip);
        board.toggle_check((1, 1)).unwrap();

        assert_eq!(board.chord_reveal((0, 0)).unwrap(), RevealOutcome::Tip);
        assert!(board.get((1, 0)).unwrap().is_revealed);
        assert!(board.get((0, 1)).unwrap().is_revealed);
        assert!(!board.get((1, 1)).unwrap().is_revealed);
        assert!(!board.get((2, 2)).unwrap().is_revealed);
    }

    #[test]
    fn chord_reveal_wins_when_it_settles_the_board() {
        let mut board = board((2, 2), &[0]);

        assert_eq!(board.reveal((1, 1)).unwrap(), RevealOutcome::Tip);
        board.toggle_check((0, 0)).unwrap();

        assert_eq!(board.chord_reveal((1, 1)).unwrap(), RevealOutcome::Win);
        assert!(board.get((1, 0)).unwrap().is_revealed);
        assert!(board.get((0, 1)).unwrap().is_revealed);
        assert_eq!(board.state(), BoardState::Won);
    }

    #[test]
    fn chord_reveal_on_a_misplaced_check_hits_the_bomb() {
        let mut board = board((2, 2), &[0]);

        board.reveal((1, 1)).unwrap();
        board.toggle_check((1, 0)).unwrap();

        assert_eq!(board.chord_reveal((1, 1)).unwrap(), RevealOutcome::Bomb);
        assert_eq!(board.state(), BoardState::Lost);
        assert!(!board.get((1, 0)).unwrap().is_revealed);
    }

    #[test]
    fn chord_reveal_on_an_unsatisfied_cell_is_a_plain_reveal() {
        let mut board = board((3, 3), &[4]);

        assert_eq!(board.chord_reveal((0, 0)).unwrap(), RevealOutcome::Tip);
        assert!(!board.get((1, 0)).unwrap().is_revealed);
    }

    #[test]
    fn unrevealed_neighbors_shrink_as_cells_open() {
        let mut board = board((3, 3), &[4]);

        assert_eq!(board.unrevealed_neighbors(4).unwrap().count(), 8);
        board.reveal((0, 0)).unwrap();
        assert_eq!(board.unrevealed_neighbors(4).unwrap().count(), 7);
    }

    #[test]
    fn debug_rendering_right_aligns_values() {
        let board = board((3, 3), &[4]);

        assert_eq!(board.to_string(), " 1  1  1\n 1 -1  1\n 1  1  1");
    }

    #[test]
    fn zero_bomb_board_wins_on_first_reveal() {
        let mut board = Board::new(3, 3);
        board
            .plant_bombs(0, RandomPlacement::from_seed(0))
            .unwrap();

        assert_eq!(board.reveal((1, 1)).unwrap(), RevealOutcome::Win);
    }
}
