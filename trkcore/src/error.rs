//! Error types for geometry construction and hit flag parsing.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("tracker description has no panels")]
    Empty,

    #[error("station {station} has {found} panels, expected {expected}")]
    PanelCount { station: usize, found: usize, expected: usize },

    #[error("stations are not contiguous: station {0} is missing")]
    MissingStation(usize),

    #[error("panel (station {station}, plane {plane}, panel {panel}) is out of range")]
    PanelOutOfRange { station: usize, plane: usize, panel: usize },

    #[error("panel (station {station}, plane {plane}, panel {panel}) is defined twice")]
    DuplicatePanel { station: usize, plane: usize, panel: usize },

    #[error("panel (station {station}, plane {plane}, panel {panel}) has a degenerate {what} vector")]
    DegenerateVector { station: usize, plane: usize, panel: usize, what: &'static str },

    #[error("unknown hit flag: {0}")]
    UnknownFlag(String),
}
