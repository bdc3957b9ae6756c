//! Waypoint routes and their dense expansion.

use std::sync::OnceLock;

use regex::Regex;
use wayfarer_protocol::Coord;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteParseError {
    #[error("route string contains no waypoints")]
    Empty,

    #[error("malformed waypoint pair `{0}`")]
    MalformedPair(String),
}

fn pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(-?\d+)-(-?\d+)$").expect("waypoint pair regex"))
}

/// Parses a recorded route string of the form `x1-y1_x2-y2_..._xn-yn`.
///
/// Empty segments (doubled or trailing separators) are skipped. A segment
/// that is not a coordinate pair is an error rather than a silent NaN cell.
pub fn parse_route(route: &str) -> Result<Vec<Coord>, RouteParseError> {
    let mut waypoints = Vec::new();
    for segment in route.split('_').filter(|segment| !segment.is_empty()) {
        let caps = pair_re()
            .captures(segment)
            .ok_or_else(|| RouteParseError::MalformedPair(segment.to_string()))?;
        let x = caps[1]
            .parse()
            .map_err(|_| RouteParseError::MalformedPair(segment.to_string()))?;
        let y = caps[2]
            .parse()
            .map_err(|_| RouteParseError::MalformedPair(segment.to_string()))?;
        waypoints.push(Coord::new(x, y));
    }
    if waypoints.is_empty() {
        return Err(RouteParseError::Empty);
    }
    Ok(waypoints)
}

/// Fully interpolated expansion of a waypoint route.
///
/// Invariants: consecutive cells are Chebyshev-adjacent and never identical.
/// A dense path is immutable; a changed route string means building a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DensePath {
    cells: Vec<Coord>,
}

impl DensePath {
    pub fn cells(&self) -> &[Coord] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Index of `at` within the path; the first occurrence wins when a route
    /// revisits a cell.
    pub fn cursor(&self, at: Coord) -> Option<usize> {
        self.cells.iter().position(|&cell| cell == at)
    }
}

/// Expands sparse waypoints into a dense path, one cell per unit step.
///
/// Between consecutive waypoints each axis steps toward the target
/// independently and simultaneously, so a leg that differs in both axes walks
/// diagonally. Adjacent duplicate waypoints never produce duplicate
/// consecutive cells.
pub fn expand(waypoints: &[Coord]) -> DensePath {
    let mut cells: Vec<Coord> = Vec::new();
    for pair in waypoints.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        if cells.last() != Some(&start) {
            cells.push(start);
        }
        let mut current = start;
        while current != end {
            current.x += (end.x - current.x).signum();
            current.y += (end.y - current.y).signum();
            if cells.last() != Some(&current) {
                cells.push(current);
            }
        }
    }
    // Single waypoint: the path is just that cell.
    if cells.is_empty() {
        if let Some(&only) = waypoints.first() {
            cells.push(only);
        }
    }
    DensePath { cells }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(pairs: &[(i64, i64)]) -> Vec<Coord> {
        pairs.iter().map(|&(x, y)| Coord::new(x, y)).collect()
    }

    #[test]
    fn parses_route_string() {
        let waypoints = parse_route("0-0_3-0_3--2").unwrap();
        assert_eq!(waypoints, coords(&[(0, 0), (3, 0), (3, -2)]));
    }

    #[test]
    fn skips_empty_segments() {
        let waypoints = parse_route("_1-1__2-2_").unwrap();
        assert_eq!(waypoints, coords(&[(1, 1), (2, 2)]));
    }

    #[test]
    fn rejects_malformed_pair() {
        assert_eq!(
            parse_route("0-x_3-0"),
            Err(RouteParseError::MalformedPair("0-x".to_string()))
        );
        assert_eq!(parse_route("__"), Err(RouteParseError::Empty));
    }

    #[test]
    fn single_waypoint_expands_to_itself() {
        assert_eq!(expand(&coords(&[(0, 0)])).cells(), coords(&[(0, 0)]));
    }

    #[test]
    fn straight_leg_expands_cell_by_cell() {
        assert_eq!(
            expand(&coords(&[(0, 0), (3, 0)])).cells(),
            coords(&[(0, 0), (1, 0), (2, 0), (3, 0)])
        );
    }

    #[test]
    fn diagonal_leg_decomposes_into_diagonal_steps() {
        assert_eq!(
            expand(&coords(&[(0, 0), (2, 2)])).cells(),
            coords(&[(0, 0), (1, 1), (2, 2)])
        );
    }

    #[test]
    fn duplicate_waypoints_collapse() {
        assert_eq!(
            expand(&coords(&[(0, 0), (0, 0), (1, 0)])).cells(),
            coords(&[(0, 0), (1, 0)])
        );
    }

    #[test]
    fn waypoints_appear_in_order_as_a_subsequence() {
        let waypoints = coords(&[(0, 0), (4, 2), (4, -1), (-2, -1)]);
        let path = expand(&waypoints);
        let mut cells = path.cells().iter();
        for waypoint in &waypoints {
            assert!(
                cells.any(|cell| cell == waypoint),
                "waypoint {waypoint} missing from expansion"
            );
        }
    }

    #[test]
    fn consecutive_cells_are_adjacent_and_distinct() {
        let path = expand(&coords(&[(0, 0), (5, 3), (5, 3), (2, 3), (2, -4)]));
        for pair in path.cells().windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!((a.x - b.x).abs() <= 1 && (a.y - b.y).abs() <= 1);
            assert_ne!(a, b);
        }
    }

    #[test]
    fn cursor_returns_first_occurrence() {
        // Route doubles back through (1, 0).
        let path = expand(&coords(&[(0, 0), (2, 0), (0, 0)]));
        assert_eq!(path.cursor(Coord::new(1, 0)), Some(1));
        assert_eq!(path.cursor(Coord::new(9, 9)), None);
    }
}
