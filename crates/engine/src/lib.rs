//! Core of the Wayfarer expedition tracker.
//!
//! `path` turns a recorded waypoint route into a dense step-by-step grid
//! path. `tracker` resolves the player's live position against that path and
//! decides which move control to highlight. `session` runs the tracker as a
//! reactive task fed by page snapshots. `store` is the SQLite key/value store
//! that carries the chosen route from the planning site to the game page.

pub mod path;
pub mod session;
pub mod store;
pub mod tracker;

pub use path::{expand, parse_route, DensePath, RouteParseError};
pub use session::{Session, SessionHandle};
pub use store::{SelectedRoute, Store};
pub use tracker::{parse_readout, LocalPos, Refresh, TrackError, Tracker};
