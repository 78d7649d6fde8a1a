// tracker module
pub mod tracker {
    pub mod description;
    pub mod geometry;
}

// data module
pub mod data {
    pub mod combo_hit;
    pub mod hit_flag;
    pub mod time_peak;
}

pub mod error;

pub use error::TrackerError;
