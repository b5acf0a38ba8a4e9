use crate::error::Error;
use bit_set::BitSet;
use rand::Rng;
use std::collections::VecDeque;
use tracing::{debug, info};

/// A `(column, row)` position on the board.
pub(crate) type Coordinate = (usize, usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum GameState {
    Playing,
    Won,
    Lost,
}

impl GameState {
    /// Both `Won` and `Lost` are terminal.
    pub(crate) fn is_finished(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Tile {
    mine: bool,
    revealed: bool,
    flagged: bool,
    // unknown until the tile is revealed
    neighbouring_mines: Option<u8>,
}

impl Tile {
    pub(crate) fn is_mine(&self) -> bool {
        self.mine
    }

    pub(crate) fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub(crate) fn is_flagged(&self) -> bool {
        self.flagged
    }

    /// The number of mines in the tile's neighbourhood, available once the
    /// tile has been revealed. Revealed mines never carry a count.
    pub(crate) fn neighbouring_mines(&self) -> Option<u8> {
        self.neighbouring_mines
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum Increment {
    One,
    NegOne,
    Zero,
}

impl Increment {
    fn offset(self, value: usize) -> Option<usize> {
        match self {
            Self::One => value.checked_add(1),
            Self::NegOne => value.checked_sub(1),
            Self::Zero => Some(value),
        }
    }
}

/// Iterate over the up to eight tiles surrounding `(column, row)`, clipped at
/// the edges of a `width` by `height` board.
pub(crate) fn neighbours(
    (column, row): Coordinate,
    width: usize,
    height: usize,
) -> impl Iterator<Item = Coordinate> {
    const INCREMENTS: [Increment; 3] = [Increment::NegOne, Increment::Zero, Increment::One];

    INCREMENTS
        .iter()
        .copied()
        .flat_map(|column_incr| std::iter::repeat(column_incr).zip(INCREMENTS))
        .filter(|&increments| increments != (Increment::Zero, Increment::Zero))
        .filter_map(move |(column_incr, row_incr)| {
            let column = column_incr.offset(column)?;
            let row = row_incr.offset(row)?;
            (column < width && row < height).then_some((column, row))
        })
}

fn index_from_coord((column, row): Coordinate, width: usize) -> usize {
    row * width + column
}

/// Check board parameters, returning the number of cells on success.
pub(crate) fn validate(width: usize, height: usize, mines: usize) -> Result<usize, Error> {
    if width == 0 || height == 0 {
        return Err(Error::EmptyBoard { width, height });
    }

    let cells = width
        .checked_mul(height)
        .ok_or(Error::BoardTooLarge { width, height })?;

    if mines >= cells {
        return Err(Error::TooManyMines { mines, cells });
    }

    Ok(cells)
}

pub(crate) struct MineField {
    tiles: Vec<Tile>,
    width: usize,
    height: usize,
    mines: usize,
    // revealed tiles that are not mines
    revealed: usize,
    state: GameState,
}

impl MineField {
    pub(crate) fn new(width: usize, height: usize, mines: usize) -> Result<Self, Error> {
        Self::with_rng(width, height, mines, &mut rand::thread_rng())
    }

    /// Place `mines` mines uniformly at random using `rng`.
    pub(crate) fn with_rng<R: Rng>(
        width: usize,
        height: usize,
        mines: usize,
        rng: &mut R,
    ) -> Result<Self, Error> {
        let cells = validate(width, height, mines)?;

        // draws landing on an existing mine are simply discarded
        let mut layout = BitSet::with_capacity(cells);
        while layout.len() < mines {
            let column = rng.gen_range(0..width);
            let row = rng.gen_range(0..height);
            layout.insert(index_from_coord((column, row), width));
        }

        Self::from_layout(width, height, &layout)
    }

    /// Build a board whose mines sit at the given row-major tile indices.
    pub(crate) fn from_layout(width: usize, height: usize, layout: &BitSet) -> Result<Self, Error> {
        let mines = layout.len();
        let cells = validate(width, height, mines)?;

        if let Some(index) = layout.iter().find(|&index| index >= cells) {
            return Err(Error::MineOutOfBounds { index, cells });
        }

        let tiles = (0..cells)
            .map(|index| Tile {
                mine: layout.contains(index),
                ..Default::default()
            })
            .collect::<Vec<_>>();

        debug!(width, height, mines, "constructed minefield");

        Ok(Self {
            tiles,
            width,
            height,
            mines,
            revealed: 0,
            state: GameState::Playing,
        })
    }

    pub(crate) fn width(&self) -> usize {
        self.width
    }

    pub(crate) fn height(&self) -> usize {
        self.height
    }

    pub(crate) fn mine_count(&self) -> usize {
        self.mines
    }

    pub(crate) fn revealed_count(&self) -> usize {
        self.revealed
    }

    pub(crate) fn game_state(&self) -> GameState {
        self.state
    }

    fn cells(&self) -> usize {
        self.tiles.len()
    }

    fn index(&self, (column, row): Coordinate) -> usize {
        assert!(
            column < self.width && row < self.height,
            "tile ({column}, {row}) is outside a {}x{} board",
            self.width,
            self.height
        );
        index_from_coord((column, row), self.width)
    }

    /// Unchecked accessor: panics when `(column, row)` is off the board.
    /// Callers crossing an input boundary check [`MineField::is_valid_tile`]
    /// first.
    pub(crate) fn tile(&self, column: usize, row: usize) -> &Tile {
        &self.tiles[self.index((column, row))]
    }

    fn tile_mut(&mut self, column: usize, row: usize) -> &mut Tile {
        let index = self.index((column, row));
        &mut self.tiles[index]
    }

    pub(crate) fn is_valid_tile(&self, column: i64, row: i64) -> bool {
        let within = |value: i64, bound: usize| usize::try_from(value).map_or(false, |v| v < bound);
        within(column, self.width) && within(row, self.height)
    }

    fn adjacent_mines(&self, coordinate: Coordinate) -> u8 {
        neighbours(coordinate, self.width, self.height)
            .fold(0, |total, (column, row)| {
                total + u8::from(self.tile(column, row).mine)
            })
    }

    /// Reveal the tile at `(column, row)`, flooding outward through tiles with
    /// no neighbouring mines. Returns the game state once the reveal settles.
    ///
    /// Flagged and already revealed tiles are left alone, as is everything
    /// once the game is over.
    pub(crate) fn reveal_tile(&mut self, column: usize, row: usize) -> GameState {
        if self.state.is_finished() {
            return self.state;
        }

        let tile = self.tile(column, row);
        if tile.flagged || tile.revealed {
            return self.state;
        }

        if tile.mine {
            self.tile_mut(column, row).revealed = true;
            self.state = GameState::Lost;
            info!(column, row, "revealed a mine, game lost");
            return self.state;
        }

        let (width, height) = (self.width, self.height);
        let mut pending = VecDeque::from([(column, row)]);

        while let Some((c, r)) = pending.pop_front() {
            let tile = self.tile(c, r);
            if tile.revealed || tile.flagged {
                continue;
            }
            // a tile is only queued from a neighbour with no adjacent mines
            debug_assert!(!tile.mine);

            let adjacent = self.adjacent_mines((c, r));
            let tile = self.tile_mut(c, r);
            tile.neighbouring_mines = Some(adjacent);
            tile.revealed = true;
            self.revealed += 1;

            if adjacent == 0 {
                pending.extend(neighbours((c, r), width, height).filter(|&(c, r)| {
                    let neighbour = self.tile(c, r);
                    !(neighbour.revealed || neighbour.flagged)
                }));
            }
        }

        debug!(column, row, revealed = self.revealed, "revealed tile");

        if self.cells() - self.revealed == self.mines {
            self.state = GameState::Won;
            info!(revealed = self.revealed, "all safe tiles revealed, game won");
        }

        self.state
    }

    /// Flip the flag on an unrevealed tile. Returns whether anything changed.
    pub(crate) fn toggle_flag(&mut self, column: usize, row: usize) -> bool {
        if self.state.is_finished() {
            return false;
        }

        let tile = self.tile_mut(column, row);
        if tile.revealed {
            return false;
        }

        tile.flagged = !tile.flagged;
        debug!(column, row, flagged = tile.flagged, "toggled flag");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn layout(width: usize, mines: &[Coordinate]) -> BitSet {
        mines
            .iter()
            .map(|&coordinate| index_from_coord(coordinate, width))
            .collect()
    }

    fn field(width: usize, height: usize, mines: &[Coordinate]) -> MineField {
        MineField::from_layout(width, height, &layout(width, mines)).unwrap()
    }

    fn revealed_tiles(field: &MineField) -> Vec<Coordinate> {
        (0..field.height())
            .flat_map(|row| (0..field.width()).map(move |column| (column, row)))
            .filter(|&(column, row)| field.tile(column, row).is_revealed())
            .collect()
    }

    fn brute_force_count(field: &MineField, column: usize, row: usize) -> u8 {
        let mut count = 0;
        for dc in -1..=1i64 {
            for dr in -1..=1i64 {
                if dc == 0 && dr == 0 {
                    continue;
                }
                let (c, r) = (column as i64 + dc, row as i64 + dr);
                if field.is_valid_tile(c, r) && field.tile(c as usize, r as usize).is_mine() {
                    count += 1;
                }
            }
        }
        count
    }

    #[test]
    fn construction_places_exact_mine_count() {
        for (seed, (width, height, mines)) in [(4, 4, 0), (9, 9, 10), (20, 20, 40), (3, 5, 14), (1, 2, 1)]
            .into_iter()
            .enumerate()
        {
            let mut rng = StdRng::seed_from_u64(seed as u64);
            let field = MineField::with_rng(width, height, mines, &mut rng).unwrap();

            assert_eq!(field.tiles.len(), width * height);
            assert_eq!(field.tiles.iter().filter(|t| t.is_mine()).count(), mines);
            assert!(field.tiles.iter().all(|t| !t.is_revealed() && !t.is_flagged()));
            assert!(field.tiles.iter().all(|t| t.neighbouring_mines().is_none()));
            assert_eq!(field.game_state(), GameState::Playing);
            assert_eq!(field.revealed_count(), 0);
            assert_eq!(field.mine_count(), mines);
        }
    }

    #[test]
    fn thread_rng_construction() {
        let field = MineField::new(16, 16, 40).unwrap();
        assert_eq!(field.tiles.iter().filter(|t| t.is_mine()).count(), 40);
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        assert!(matches!(
            MineField::new(0, 5, 1),
            Err(Error::EmptyBoard { width: 0, height: 5 })
        ));
        assert!(matches!(
            MineField::new(5, 0, 0),
            Err(Error::EmptyBoard { width: 5, height: 0 })
        ));
        assert!(matches!(
            MineField::new(3, 3, 9),
            Err(Error::TooManyMines { mines: 9, cells: 9 })
        ));
        assert!(matches!(
            MineField::new(3, 3, 100),
            Err(Error::TooManyMines { .. })
        ));
        assert!(matches!(
            validate(usize::MAX, 2, 0),
            Err(Error::BoardTooLarge { .. })
        ));
        assert_eq!(validate(3, 3, 8).unwrap(), 9);
    }

    #[test]
    fn layout_outside_board_is_rejected() {
        let layout = [12].into_iter().collect::<BitSet>();
        assert!(matches!(
            MineField::from_layout(3, 3, &layout),
            Err(Error::MineOutOfBounds { index: 12, cells: 9 })
        ));
    }

    #[test]
    fn neighbours_are_clipped() {
        let mut corner = neighbours((0, 0), 3, 3).collect::<Vec<_>>();
        corner.sort_unstable();
        assert_eq!(corner, vec![(0, 1), (1, 0), (1, 1)]);

        assert_eq!(neighbours((1, 0), 3, 3).count(), 5);
        assert_eq!(neighbours((1, 1), 3, 3).count(), 8);
        assert_eq!(neighbours((2, 2), 3, 3).count(), 3);
        assert_eq!(neighbours((0, 0), 1, 1).count(), 0);
        assert_eq!(neighbours((1, 0), 2, 1).collect::<Vec<_>>(), vec![(0, 0)]);
        assert!(neighbours((1, 1), 3, 3).all(|coordinate| coordinate != (1, 1)));
    }

    #[test]
    fn valid_tile_bounds() {
        let field = field(4, 2, &[]);
        assert!(field.is_valid_tile(0, 0));
        assert!(field.is_valid_tile(3, 1));
        assert!(!field.is_valid_tile(4, 0));
        assert!(!field.is_valid_tile(0, 2));
        assert!(!field.is_valid_tile(-1, 0));
        assert!(!field.is_valid_tile(0, -1));
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn tile_out_of_bounds_panics() {
        // (3, 0) would alias (0, 1) in row-major storage
        let field = field(3, 2, &[]);
        field.tile(3, 0);
    }

    #[test]
    fn single_tile_board_is_won_immediately() {
        let mut field = field(1, 1, &[]);
        assert_eq!(field.reveal_tile(0, 0), GameState::Won);
        assert_eq!(field.tile(0, 0).neighbouring_mines(), Some(0));
        assert_eq!(field.revealed_count(), 1);
    }

    #[test]
    fn two_by_one_with_one_mine() {
        let mut field = field(2, 1, &[(0, 0)]);
        assert_eq!(field.reveal_tile(1, 0), GameState::Won);
        assert_eq!(field.tile(1, 0).neighbouring_mines(), Some(1));
        assert!(!field.tile(0, 0).is_revealed());
    }

    #[test]
    fn numbered_tile_does_not_cascade() {
        let mut field = field(3, 3, &[(1, 1)]);
        assert_eq!(field.reveal_tile(0, 0), GameState::Playing);
        assert_eq!(field.tile(0, 0).neighbouring_mines(), Some(1));
        assert_eq!(revealed_tiles(&field), vec![(0, 0)]);
        assert_eq!(field.revealed_count(), 1);
    }

    #[test]
    fn revealing_a_mine_loses_without_cascade() {
        let mut field = field(3, 3, &[(0, 0)]);
        assert_eq!(field.reveal_tile(0, 0), GameState::Lost);
        assert_eq!(revealed_tiles(&field), vec![(0, 0)]);
        assert_eq!(field.revealed_count(), 0);
        assert_eq!(field.tile(0, 0).neighbouring_mines(), None);
    }

    #[test]
    fn cascade_floods_open_board() {
        let mut field = field(5, 5, &[(4, 4)]);
        assert_eq!(field.reveal_tile(0, 0), GameState::Won);
        assert_eq!(field.revealed_count(), 24);
        assert!(!field.tile(4, 4).is_revealed());
        assert_eq!(field.tile(3, 3).neighbouring_mines(), Some(1));
        assert_eq!(field.tile(4, 3).neighbouring_mines(), Some(1));
        assert_eq!(field.tile(2, 2).neighbouring_mines(), Some(0));
    }

    #[test]
    fn cascade_stops_at_numbered_border() {
        // a wall of mines down the middle column
        let mut field = field(5, 3, &[(2, 0), (2, 1), (2, 2)]);
        assert_eq!(field.reveal_tile(0, 0), GameState::Playing);

        let mut expected = vec![(0, 0), (1, 0), (0, 1), (1, 1), (0, 2), (1, 2)];
        expected.sort_unstable_by_key(|&(c, r)| (r, c));
        assert_eq!(revealed_tiles(&field), expected);
        assert_eq!(field.revealed_count(), 6);
        assert_eq!(field.tile(1, 0).neighbouring_mines(), Some(2));
        assert_eq!(field.tile(1, 1).neighbouring_mines(), Some(3));
        assert_eq!(field.tile(1, 2).neighbouring_mines(), Some(2));
        assert!((0..3).all(|row| !field.tile(2, row).is_revealed()));
    }

    #[test]
    fn cascade_skips_flagged_tiles() {
        let mut field = field(3, 3, &[]);
        assert!(field.toggle_flag(2, 2));
        assert_eq!(field.reveal_tile(0, 0), GameState::Playing);
        assert_eq!(field.revealed_count(), 8);
        assert!(!field.tile(2, 2).is_revealed());
        assert!(field.tile(2, 2).is_flagged());

        assert!(field.toggle_flag(2, 2));
        assert_eq!(field.reveal_tile(2, 2), GameState::Won);
        assert_eq!(field.revealed_count(), 9);
    }

    #[test]
    fn flagged_tile_cannot_be_revealed() {
        let mut field = field(2, 2, &[(1, 1)]);
        field.toggle_flag(0, 0);
        assert_eq!(field.reveal_tile(0, 0), GameState::Playing);
        assert!(!field.tile(0, 0).is_revealed());

        field.toggle_flag(1, 1);
        assert_eq!(field.reveal_tile(1, 1), GameState::Playing);
        assert!(!field.tile(1, 1).is_revealed());
    }

    #[test]
    fn flag_toggles_and_ignores_revealed_tiles() {
        let mut field = field(3, 3, &[(1, 1)]);
        assert!(field.toggle_flag(2, 2));
        assert!(field.tile(2, 2).is_flagged());
        assert!(field.toggle_flag(2, 2));
        assert!(!field.tile(2, 2).is_flagged());

        assert_eq!(field.reveal_tile(0, 0), GameState::Playing);
        assert!(!field.toggle_flag(0, 0));
        assert!(!field.tile(0, 0).is_flagged());
    }

    #[test]
    fn flags_are_not_limited_by_mine_count() {
        let mut field = field(3, 3, &[(1, 1)]);
        for (column, row) in [(0, 0), (1, 0), (2, 0), (0, 1)] {
            assert!(field.toggle_flag(column, row));
        }
        assert_eq!(field.tiles.iter().filter(|t| t.is_flagged()).count(), 4);
    }

    #[test]
    fn revealing_twice_is_a_no_op() {
        let mut field = field(3, 3, &[(1, 1)]);
        field.reveal_tile(0, 0);
        field.reveal_tile(0, 0);
        assert_eq!(field.revealed_count(), 1);
    }

    #[test]
    fn finished_games_are_frozen() {
        let mut lost = field(3, 3, &[(1, 1)]);
        lost.toggle_flag(2, 2);
        assert_eq!(lost.reveal_tile(1, 1), GameState::Lost);
        let snapshot = lost.tiles.clone();

        assert_eq!(lost.reveal_tile(0, 0), GameState::Lost);
        assert!(!lost.toggle_flag(0, 1));
        assert!(!lost.toggle_flag(2, 2));
        assert_eq!(lost.tiles, snapshot);
        assert_eq!(lost.revealed_count(), 0);

        let mut won = field(2, 1, &[(0, 0)]);
        assert_eq!(won.reveal_tile(1, 0), GameState::Won);
        let snapshot = won.tiles.clone();

        assert_eq!(won.reveal_tile(0, 0), GameState::Won);
        assert!(!won.toggle_flag(0, 0));
        assert_eq!(won.tiles, snapshot);
    }

    #[test]
    fn counts_match_neighbourhood_on_random_boards() {
        for seed in 0..8 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut field = MineField::with_rng(12, 7, 15, &mut rng).unwrap();

            for row in 0..field.height() {
                for column in 0..field.width() {
                    if !field.tile(column, row).is_mine() {
                        field.reveal_tile(column, row);
                    }
                }
            }

            assert_eq!(field.game_state(), GameState::Won);
            assert_eq!(field.revealed_count(), 12 * 7 - 15);

            for row in 0..field.height() {
                for column in 0..field.width() {
                    let tile = field.tile(column, row);
                    assert_eq!(tile.is_revealed(), !tile.is_mine());
                    if tile.is_revealed() {
                        assert_eq!(
                            tile.neighbouring_mines(),
                            Some(brute_force_count(&field, column, row)),
                            "mismatch at ({column}, {row})"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn cascade_across_large_empty_board() {
        let mut field = field(1000, 1000, &[]);
        assert_eq!(field.reveal_tile(500, 500), GameState::Won);
        assert_eq!(field.revealed_count(), 1000 * 1000);
        assert!(field.tiles.iter().all(|t| t.neighbouring_mines() == Some(0)));
    }

    #[test]
    fn revealed_count_tracks_safe_revealed_tiles() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut field = MineField::with_rng(10, 10, 20, &mut rng).unwrap();

        for (column, row) in [(0, 0), (9, 9), (5, 5), (3, 7), (7, 2)] {
            if field.tile(column, row).is_mine() {
                continue;
            }
            field.reveal_tile(column, row);
            let safe_revealed = field
                .tiles
                .iter()
                .filter(|t| t.is_revealed() && !t.is_mine())
                .count();
            assert_eq!(field.revealed_count(), safe_revealed);
            assert!(field.tiles.iter().all(|t| !(t.is_mine() && t.is_revealed())));
        }
    }
}
