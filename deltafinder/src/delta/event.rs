//! Per-event working state: hits, seeds and candidates of one event.

use std::fmt;

use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use trkcore::tracker::geometry::TrackerGeometry;

use crate::delta::candidate::DeltaCandidate;
use crate::delta::config::DeltaFinderConfig;
use crate::delta::hit_table::StationHits;
use crate::delta::prune::prune_seeds;
use crate::delta::seed::DeltaSeed;
use crate::delta::seed_builder::find_seeds;

/// Hits and seeds of one station.
#[derive(Clone, Debug)]
pub struct StationRecord {
    pub hits: StationHits,
    pub seeds: Vec<DeltaSeed>,
    /// good seeds, candidates for chaining
    pub compton: Vec<usize>,
    /// seeds energetic enough to come from a proton
    pub proton: Vec<usize>,
}

impl StationRecord {
    pub fn new(hits: StationHits) -> Self {
        StationRecord { hits, seeds: Vec::new(), compton: Vec::new(), proton: Vec::new() }
    }

    #[inline]
    pub fn station(&self) -> usize {
        self.hits.station
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaFinderStats {
    pub n_combo_hits: usize,
    pub n_selected_hits: usize,
    pub n_seeds: usize,
    pub n_good_seeds: usize,
    pub n_proton_seeds: usize,
    pub n_candidates: usize,
    pub n_merged: usize,
    pub n_emitted: usize,
    /// inconsistencies met and skipped during the pass
    pub n_anomalies: usize,
}

pub struct DeltaEvent<'a> {
    pub event: u64,
    pub geometry: &'a TrackerGeometry,
    pub config: &'a DeltaFinderConfig,
    pub stations: Vec<StationRecord>,
    pub candidates: Vec<DeltaCandidate>,
    pub stats: DeltaFinderStats,
}

impl<'a> DeltaEvent<'a> {
    pub fn new(
        event: u64,
        geometry: &'a TrackerGeometry,
        config: &'a DeltaFinderConfig,
        hits: Vec<StationHits>,
    ) -> Self {
        let stations: Vec<StationRecord> = hits.into_iter().map(StationRecord::new).collect();
        let stats = DeltaFinderStats {
            n_selected_hits: stations.iter().map(|s| s.hits.n_hits()).sum(),
            ..Default::default()
        };
        DeltaEvent { event, geometry, config, stations, candidates: Vec::new(), stats }
    }

    #[inline]
    pub fn n_stations(&self) -> usize {
        self.stations.len()
    }

    #[inline]
    pub fn seed(&self, station: usize, index: usize) -> &DeltaSeed {
        &self.stations[station].seeds[index]
    }

    #[inline]
    pub fn seed_mut(&mut self, station: usize, index: usize) -> &mut DeltaSeed {
        &mut self.stations[station].seeds[index]
    }

    /// Count an inconsistency and report it if asked to.
    pub(crate) fn anomaly(&mut self, args: fmt::Arguments<'_>) {
        self.stats.n_anomalies += 1;
        if self.config.print_errors {
            warn!("event {}: {}", self.event, args);
        }
    }

    /// Seed every station; stations are independent of each other.
    pub fn find_seeds(&mut self) {
        let (geom, cfg) = (self.geometry, self.config);
        self.stations.par_iter_mut().for_each(|rec| {
            find_seeds(geom, cfg, rec);
            prune_seeds(cfg, rec);
        });

        self.stats.n_seeds = self.stations.iter().map(|s| s.seeds.len()).sum();
        self.stats.n_good_seeds = self
            .stations
            .iter()
            .map(|s| s.compton.iter().filter(|&&i| s.seeds[i].is_good()).count())
            .sum();
        self.stats.n_proton_seeds = self.stations.iter().map(|s| s.proton.len()).sum();
        debug!(
            "event {}: {} seeds, {} good, {} proton-like",
            self.event, self.stats.n_seeds, self.stats.n_good_seeds, self.stats.n_proton_seeds
        );
    }

    /// Full pass: seeding, chaining, merging, gap filling and a second merge.
    pub fn run(&mut self) {
        self.find_seeds();
        self.connect_seeds();
        let n1 = self.merge_candidates();
        self.recover_missing_hits();
        let n2 = self.merge_candidates();
        self.stats.n_candidates = self.candidates.len();
        debug!(
            "event {}: {} candidates, {} merges ({} + {})",
            self.event,
            self.candidates.len(),
            n1 + n2,
            n1,
            n2
        );
    }
}
