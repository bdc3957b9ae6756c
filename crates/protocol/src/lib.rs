use std::fmt;

use serde::{Deserialize, Serialize};

/// Absolute map coordinate on the world grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i64,
    pub y: i64,
}

impl Coord {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the four orthogonal move controls the game renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Background color applied to the highlighted move control.
pub const HIGHLIGHT_COLOR: &str = "#afcf9dd9";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Swap {
    /// Set the inline background style on the target.
    Style,
    /// Remove any inline background style from the target.
    Clear,
}

impl Default for Swap {
    fn default() -> Self {
        Self::Style
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patch {
    pub target: String,
    #[serde(default)]
    pub swap: Swap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiUpdate {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub patches: Vec<Patch>,
}

impl UiUpdate {
    pub fn new(event: impl Into<String>, patches: Vec<Patch>) -> Self {
        Self {
            event: event.into(),
            payload: None,
            patches,
        }
    }

    /// Patch highlighting the move control for `direction`.
    pub fn highlight(direction: Direction) -> Self {
        let mut update = Self::new(
            "track.highlight",
            vec![Patch {
                target: targets::move_control(direction),
                swap: Swap::Style,
                background: Some(HIGHLIGHT_COLOR.to_string()),
            }],
        );
        update.payload = Some(serde_json::json!({ "direction": direction }));
        update
    }

    /// Patches removing the highlight from every move control. Published when
    /// the path is complete or the player is off the path, so the page never
    /// keeps reapplying a stale direction.
    pub fn clear() -> Self {
        Self::new(
            "track.clear",
            Direction::ALL
                .iter()
                .map(|&direction| Patch {
                    target: targets::move_control(direction),
                    swap: Swap::Clear,
                    background: None,
                })
                .collect(),
        )
    }
}

/// What the page glue observed in the game DOM at one instant. Posted on
/// every mutation of the move-controls container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// Text of the current-location readout, if the element is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readout: Option<String>,
    /// Move controls currently rendered (a direction may be missing when the
    /// corresponding move is blocked).
    #[serde(default)]
    pub controls: Vec<Direction>,
}

impl PageSnapshot {
    pub fn has_control(&self, direction: Direction) -> bool {
        self.controls.contains(&direction)
    }
}

/// One recorded expedition route from the planning site's catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expedition {
    pub day: u32,
    pub name: String,
    pub route: String,
}

pub mod targets {
    use super::Direction;

    /// Element carrying the `Position: x / y` readout.
    pub const CURRENT_LOCATION: &str = "current-location";
    /// Container the game rebuilds after every move.
    pub const MOVE_CONTROLS: &str = "zone-plane-controls";

    pub fn move_control(direction: Direction) -> String {
        format!("action-move-{}", direction.as_str())
    }
}

/// Store keys written by the route picker and read back at activation.
pub mod keys {
    pub const ROUTE: &str = "route";
    pub const ORIGIN_X: &str = "originX";
    pub const ORIGIN_Y: &str = "originY";
}
