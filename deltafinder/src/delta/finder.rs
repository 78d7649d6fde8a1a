use log::debug;
use rayon::prelude::*;
use trkcore::tracker::geometry::TrackerGeometry;

use crate::delta::config::{DeltaFinderConfig, HitMasks};
use crate::delta::event::DeltaEvent;
use crate::delta::hit_table::build_hit_table;
use crate::delta::output::DeltaFinderOutput;
use crate::error::{DeltaFinderError, Result};
use crate::io::EventData;

/// Delta electron finder for one tracker geometry and configuration.
/// Holds no per-event state and can be shared between threads.
#[derive(Clone, Debug)]
pub struct DeltaFinder {
    config: DeltaFinderConfig,
    geometry: TrackerGeometry,
    masks: HitMasks,
}

impl DeltaFinder {
    pub fn new(config: DeltaFinderConfig, geometry: TrackerGeometry) -> Result<Self> {
        config.validate()?;
        let masks = config.masks()?;
        Ok(DeltaFinder { config, geometry, masks })
    }

    pub fn config(&self) -> &DeltaFinderConfig {
        &self.config
    }

    pub fn geometry(&self) -> &TrackerGeometry {
        &self.geometry
    }

    /// Run the full pass on one event and keep the working state for inspection.
    pub fn reconstruct<'a>(&'a self, data: &EventData) -> Result<DeltaEvent<'a>> {
        let event = data.event;
        let hits = data
            .combo_hits
            .as_deref()
            .ok_or(DeltaFinderError::MissingData { event, what: "combo hits" })?;
        if data.n_straw_hits.is_none() {
            return Err(DeltaFinderError::MissingData { event, what: "straw hit count" });
        }
        let time_peaks = match (&data.time_peaks, self.config.use_time_peaks) {
            (Some(tp), _) => tp.as_slice(),
            (None, false) => &[],
            (None, true) => return Err(DeltaFinderError::MissingData { event, what: "time peaks" }),
        };

        let table = build_hit_table(&self.geometry, &self.config, &self.masks, event, hits, time_peaks)?;
        let mut ev = DeltaEvent::new(event, &self.geometry, &self.config, table);
        ev.stats.n_combo_hits = hits.len();
        ev.run();
        Ok(ev)
    }

    pub fn run(&self, data: &EventData) -> Result<DeltaFinderOutput> {
        let mut ev = self.reconstruct(data)?;
        let hits = data.combo_hits.as_deref().unwrap_or_default();
        let out = ev.output(&self.masks, hits, data.n_straw_hits.unwrap_or_default())?;
        debug!(
            "event {}: {} of {} hits flagged in {} candidates",
            out.event,
            out.n_delta_hits(),
            hits.len(),
            out.candidates.len()
        );
        Ok(out)
    }

    /// Independent events in parallel; results are in input order.
    pub fn run_batch(&self, events: &[EventData]) -> Vec<Result<DeltaFinderOutput>> {
        events.par_iter().map(|data| self.run(data)).collect()
    }
}
