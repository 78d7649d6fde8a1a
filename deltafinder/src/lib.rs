// src/lib.rs
pub mod delta;
pub mod error;
pub mod io;
pub mod synthetic;

pub use delta::{DeltaFinder, DeltaFinderConfig, DeltaFinderOutput};
pub use error::{DeltaFinderError, Result};
pub use io::EventData;
