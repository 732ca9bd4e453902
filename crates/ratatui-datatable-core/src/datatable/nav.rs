/// Arrow-key direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Position in the navigable grid: row index on the current page, index among selectable columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridPos {
    pub row: usize,
    pub col: usize,
}

/// One step from `from`, clamped at the edges. Never wraps across rows.
pub fn step(from: GridPos, dir: Direction, rows: usize, cols: usize) -> Option<GridPos> {
    if rows == 0 || cols == 0 {
        return None;
    }
    let row = from.row.min(rows - 1);
    let col = from.col.min(cols - 1);
    Some(match dir {
        Direction::Up => GridPos {
            row: row.saturating_sub(1),
            col,
        },
        Direction::Down => GridPos {
            row: (row + 1).min(rows - 1),
            col,
        },
        Direction::Left => GridPos {
            row,
            col: col.saturating_sub(1),
        },
        Direction::Right => GridPos {
            row,
            col: (col + 1).min(cols - 1),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn right_at_the_last_column_stays_in_the_row() {
        let at = GridPos { row: 0, col: 2 };
        assert_eq!(step(at, Direction::Right, 3, 3), Some(at));
    }

    #[test]
    fn vertical_moves_keep_the_column() {
        let at = GridPos { row: 1, col: 2 };
        assert_eq!(
            step(at, Direction::Down, 3, 3),
            Some(GridPos { row: 2, col: 2 })
        );
        assert_eq!(
            step(GridPos { row: 2, col: 2 }, Direction::Down, 3, 3),
            Some(GridPos { row: 2, col: 2 })
        );
        assert_eq!(step(at, Direction::Up, 3, 3), Some(GridPos { row: 0, col: 2 }));
    }

    #[test]
    fn empty_grid_has_no_position() {
        assert_eq!(step(GridPos { row: 0, col: 0 }, Direction::Left, 0, 4), None);
    }
}
