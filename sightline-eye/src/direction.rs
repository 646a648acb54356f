//! Grid-based direction wording from a box center
//!
//! The 3x3 grid is data: which cells get a name is a policy choice and lives
//! in [`DirectionGrid`], not in the code that reads it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Named screen region. Declaration order is the order directions are listed in speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    UpperLeft,
    UpperRight,
    Left,
    DirectlyAhead,
    Right,
    LowerLeft,
    LowerRight,
    Above,
    Below,
}

impl Direction {
    pub fn phrase(self) -> &'static str {
        match self {
            Direction::UpperLeft => "upper left",
            Direction::UpperRight => "upper right",
            Direction::Left => "left",
            Direction::DirectlyAhead => "directly ahead",
            Direction::Right => "right",
            Direction::LowerLeft => "lower left",
            Direction::LowerRight => "lower right",
            Direction::Above => "above",
            Direction::Below => "below",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Direction::UpperLeft => "upper_left",
            Direction::UpperRight => "upper_right",
            Direction::Left => "left",
            Direction::DirectlyAhead => "directly_ahead",
            Direction::Right => "right",
            Direction::LowerLeft => "lower_left",
            Direction::LowerRight => "lower_right",
            Direction::Above => "above",
            Direction::Below => "below",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        let dir = match key {
            "upper_left" => Direction::UpperLeft,
            "upper_right" => Direction::UpperRight,
            "left" => Direction::Left,
            "directly_ahead" => Direction::DirectlyAhead,
            "right" => Direction::Right,
            "lower_left" => Direction::LowerLeft,
            "lower_right" => Direction::LowerRight,
            "above" => Direction::Above,
            "below" => Direction::Below,
            _ => return None,
        };
        Some(dir)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.phrase())
    }
}

const UNNAMED: &str = "none";

/// Rows top to bottom, columns left to right. `None` cells are never spoken.
///
/// Serialized as nine cell keys so it can live in a TOML file, with
/// `"none"` marking an unnamed cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<String>>", into = "Vec<Vec<String>>")]
pub struct DirectionGrid {
    pub cells: [[Option<Direction>; 3]; 3],
}

impl Default for DirectionGrid {
    fn default() -> Self {
        use Direction::*;
        Self {
            cells: [
                [Some(UpperLeft), None, Some(UpperRight)],
                [Some(Left), Some(DirectlyAhead), Some(Right)],
                [Some(LowerLeft), None, Some(LowerRight)],
            ],
        }
    }
}

impl DirectionGrid {
    /// Direction of a normalized center point, or `None` for unnamed cells
    /// and non-finite input.
    pub fn classify(&self, xc: f32, yc: f32) -> Option<Direction> {
        if !xc.is_finite() || !yc.is_finite() {
            return None;
        }
        self.cells[band(yc)][band(xc)]
    }
}

fn band(v: f32) -> usize {
    if v < 1.0 / 3.0 {
        0
    } else if v < 2.0 / 3.0 {
        1
    } else {
        2
    }
}

impl TryFrom<Vec<Vec<String>>> for DirectionGrid {
    type Error = String;

    fn try_from(rows: Vec<Vec<String>>) -> Result<Self, Self::Error> {
        if rows.len() != 3 || rows.iter().any(|r| r.len() != 3) {
            return Err("Direction grid must be 3x3".to_string());
        }
        let mut cells = [[None; 3]; 3];
        for (r, row) in rows.iter().enumerate() {
            for (c, key) in row.iter().enumerate() {
                cells[r][c] = if key == UNNAMED {
                    None
                } else {
                    Some(
                        Direction::from_key(key)
                            .ok_or_else(|| format!("Unknown direction '{}'", key))?,
                    )
                };
            }
        }
        Ok(Self { cells })
    }
}

impl From<DirectionGrid> for Vec<Vec<String>> {
    fn from(grid: DirectionGrid) -> Self {
        grid.cells
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.map(Direction::key).unwrap_or(UNNAMED).to_string())
                    .collect()
            })
            .collect()
    }
}
