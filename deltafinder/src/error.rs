use thiserror::Error;
use trkcore::TrackerError;

#[derive(Error, Debug)]
pub enum DeltaFinderError {
    /// A required input collection is absent; the event is not processed.
    #[error("event {event}: data missing or incomplete: {what}")]
    MissingData { event: u64, what: &'static str },

    #[error("event {event}: combo hit {index} (station {station}, plane {plane}, panel {panel}) is outside the tracker")]
    HitOutOfRange { event: u64, index: usize, station: usize, plane: usize, panel: usize },

    #[error("event {event}: combo hit {index} refers to straw hit {straw_hit}, only {n_straw_hits} straw hits present")]
    StrawHitOutOfRange { event: u64, index: usize, straw_hit: usize, n_straw_hits: usize },

    #[error("unsupported event file version {found}, expected {expected}")]
    EventFileVersion { found: u32, expected: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DeltaFinderError>;
