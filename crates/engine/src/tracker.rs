//! Per-cycle position resolution: readout text in, highlight decision out.

use std::sync::OnceLock;

use regex::Regex;
use wayfarer_protocol::{Coord, Direction, PageSnapshot};

use crate::path::DensePath;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackError {
    #[error("no route selected")]
    NoRouteSelected,

    #[error("current-location readout not present")]
    ReadoutMissing,

    #[error("failed to extract current coordinates from {0:?}")]
    ReadoutParse(String),

    #[error("no move control found for direction: {0}")]
    ControlMissing(Direction),
}

/// Position as the game page reports it, relative to the town.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalPos {
    pub x: i64,
    pub y: i64,
}

fn readout_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Position: (-?\d+) / (-?\d+)").expect("readout regex"))
}

/// Extracts the two signed integers from a `Position: <x> / <y>` readout.
pub fn parse_readout(text: &str) -> Result<LocalPos, TrackError> {
    let caps = readout_re()
        .captures(text)
        .ok_or_else(|| TrackError::ReadoutParse(text.to_string()))?;
    let x = caps[1]
        .parse()
        .map_err(|_| TrackError::ReadoutParse(text.to_string()))?;
    let y = caps[2]
        .parse()
        .map_err(|_| TrackError::ReadoutParse(text.to_string()))?;
    Ok(LocalPos { x, y })
}

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// The player should take this move next.
    Highlight(Direction),
    /// The live position is not on the path; nothing to highlight.
    OffPath,
    /// The player stands on the last cell of the path.
    Complete,
}

/// Resolves live positions against a dense path. Holds no mutable state;
/// every refresh recomputes from the snapshot it is given.
#[derive(Debug, Clone)]
pub struct Tracker {
    path: DensePath,
    origin: Coord,
}

impl Tracker {
    pub fn new(path: DensePath, origin: Coord) -> Self {
        Self { path, origin }
    }

    pub fn path(&self) -> &DensePath {
        &self.path
    }

    /// Converts a town-relative position to map-absolute coordinates. The
    /// readout's y axis points the other way, hence the subtraction.
    pub fn absolute(&self, local: LocalPos) -> Coord {
        Coord::new(self.origin.x + local.x, self.origin.y - local.y)
    }

    /// Cursor lookup plus direction decision for an absolute position.
    pub fn decide(&self, at: Coord) -> Refresh {
        let Some(cursor) = self.path.cursor(at) else {
            return Refresh::OffPath;
        };
        let cells = self.path.cells();
        if cursor + 1 == cells.len() {
            return Refresh::Complete;
        }
        match step_direction(cells[cursor], cells[cursor + 1]) {
            Some(direction) => Refresh::Highlight(direction),
            // Unreachable for a well-formed path; consecutive cells differ.
            None => Refresh::Complete,
        }
    }

    /// One full refresh cycle: parse the readout, convert to absolute
    /// coordinates, locate the cursor, and decide the next direction. The
    /// decided control must be present in the snapshot to count as a
    /// highlight.
    pub fn refresh(&self, snapshot: &PageSnapshot) -> Result<Refresh, TrackError> {
        let text = snapshot.readout.as_deref().ok_or(TrackError::ReadoutMissing)?;
        let local = parse_readout(text)?;
        let refresh = self.decide(self.absolute(local));
        if let Refresh::Highlight(direction) = refresh {
            if !snapshot.has_control(direction) {
                return Err(TrackError::ControlMissing(direction));
            }
        }
        Ok(refresh)
    }
}

/// Direction of the step from `current` to `next`, x axis taking priority.
/// A diagonal step is reported by its x component alone.
fn step_direction(current: Coord, next: Coord) -> Option<Direction> {
    if next.x > current.x {
        Some(Direction::East)
    } else if next.x < current.x {
        Some(Direction::West)
    } else if next.y > current.y {
        Some(Direction::South)
    } else if next.y < current.y {
        Some(Direction::North)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::expand;

    fn tracker(waypoints: &[(i64, i64)], origin: (i64, i64)) -> Tracker {
        let waypoints: Vec<Coord> = waypoints.iter().map(|&(x, y)| Coord::new(x, y)).collect();
        Tracker::new(expand(&waypoints), Coord::new(origin.0, origin.1))
    }

    fn snapshot(readout: &str) -> PageSnapshot {
        PageSnapshot {
            readout: Some(readout.to_string()),
            controls: Direction::ALL.to_vec(),
        }
    }

    #[test]
    fn parses_signed_readout() {
        let local = parse_readout("Position: -3 / 12 - Zone info").unwrap();
        assert_eq!(local, LocalPos { x: -3, y: 12 });
    }

    #[test]
    fn rejects_readout_without_position() {
        let err = parse_readout("Zone: ruins").unwrap_err();
        assert!(matches!(err, TrackError::ReadoutParse(_)));
    }

    #[test]
    fn origin_conversion_inverts_y() {
        let t = tracker(&[(0, 0)], (100, 100));
        assert_eq!(
            t.absolute(LocalPos { x: 3, y: 5 }),
            Coord::new(103, 95)
        );
    }

    #[test]
    fn mid_path_cell_highlights_south() {
        // Dense path [(0,0), (1,0), (1,1)]; player at absolute (1, 0).
        let t = tracker(&[(0, 0), (1, 0), (1, 1)], (0, 0));
        let refresh = t.refresh(&snapshot("Position: 1 / 0")).unwrap();
        assert_eq!(refresh, Refresh::Highlight(Direction::South));
    }

    #[test]
    fn diagonal_step_reports_x_component() {
        let t = tracker(&[(0, 0), (2, 2)], (0, 0));
        let refresh = t.refresh(&snapshot("Position: 0 / 0")).unwrap();
        assert_eq!(refresh, Refresh::Highlight(Direction::East));
    }

    #[test]
    fn last_cell_is_complete() {
        let t = tracker(&[(0, 0), (1, 0), (1, 1)], (0, 0));
        assert_eq!(t.decide(Coord::new(1, 1)), Refresh::Complete);
    }

    #[test]
    fn position_off_the_path_is_not_an_error() {
        let t = tracker(&[(0, 0), (1, 0)], (0, 0));
        assert_eq!(t.decide(Coord::new(7, 7)), Refresh::OffPath);
    }

    #[test]
    fn missing_control_fails_the_cycle() {
        let t = tracker(&[(0, 0), (1, 0)], (0, 0));
        let snap = PageSnapshot {
            readout: Some("Position: 0 / 0".to_string()),
            controls: vec![Direction::North, Direction::South, Direction::West],
        };
        assert_eq!(
            t.refresh(&snap),
            Err(TrackError::ControlMissing(Direction::East))
        );
    }

    #[test]
    fn missing_readout_fails_the_cycle() {
        let t = tracker(&[(0, 0), (1, 0)], (0, 0));
        let snap = PageSnapshot {
            readout: None,
            controls: Direction::ALL.to_vec(),
        };
        assert_eq!(t.refresh(&snap), Err(TrackError::ReadoutMissing));
    }
}
