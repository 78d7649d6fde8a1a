//! Event results: emitted candidates and the per-hit classification.

use serde::{Deserialize, Serialize};
use trkcore::data::combo_hit::ComboHit;
use trkcore::data::hit_flag::HitFlag;
use trkcore::tracker::geometry::N_FACES;

use crate::delta::config::HitMasks;
use crate::delta::event::{DeltaEvent, DeltaFinderStats};
use crate::error::{DeltaFinderError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceHit {
    pub face: usize,
    /// index into the input combo hit collection
    pub hit: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StationHitGroup {
    pub station: usize,
    pub seed: usize,
    pub hits: Vec<FaceHit>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeltaCandidateSummary {
    pub index: i32,
    pub first_station: usize,
    pub last_station: usize,
    pub n_seeds: usize,
    pub n_hits: usize,
    pub center: [f64; 2],
    pub mean_time: f64,
    pub first_time: f64,
    pub last_time: f64,
    /// mean energy per hit (MeV)
    pub edep: f64,
    pub stations: Vec<StationHitGroup>,
}

impl DeltaCandidateSummary {
    /// input indices of all hits of the candidate, in station and face order
    pub fn hit_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.stations.iter().flat_map(|g| g.hits.iter().map(|h| h.hit))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeltaFinderOutput {
    pub event: u64,
    pub candidates: Vec<DeltaCandidateSummary>,
    /// one entry per input combo hit
    pub is_delta: Vec<bool>,
    /// input flags, plus `BKG` for hits of emitted candidates
    pub flags: Vec<HitFlag>,
    /// input indices of hits whose output flags pass the background mask
    pub filtered_hits: Vec<usize>,
    /// output flags propagated to the straw hits of every combo hit
    pub straw_hit_flags: Vec<HitFlag>,
    pub stats: DeltaFinderStats,
}

impl DeltaFinderOutput {
    pub fn n_delta_hits(&self) -> usize {
        self.is_delta.iter().filter(|&&d| d).count()
    }
}

impl DeltaEvent<'_> {
    /// Select the candidates to emit and classify the input hits.
    pub fn output(&mut self, masks: &HitMasks, hits: &[ComboHit], n_straw_hits: usize) -> Result<DeltaFinderOutput> {
        let cfg = self.config;
        let mut is_delta = vec![false; hits.len()];
        let mut candidates = Vec::new();

        for dc in self.candidates.iter() {
            if !dc.active || dc.n_hits < cfg.min_delta_n_hits || dc.edep() > cfg.max_delta_edep {
                continue;
            }

            let mut stations = Vec::with_capacity(dc.n_seeds);
            let mut time_sum = 0.0;
            let mut n_hits = 0;
            for (station, si) in dc.station_seeds() {
                let rec = &self.stations[station];
                let seed = &rec.seeds[si];
                let mut group = StationHitGroup { station, seed: si, hits: Vec::with_capacity(N_FACES) };
                for sh in seed.face_hits() {
                    let input = rec.hits.hit(&sh.id).input_index;
                    time_sum += sh.time;
                    n_hits += 1;
                    // claimed by an earlier candidate
                    if is_delta[input] {
                        continue;
                    }
                    is_delta[input] = true;
                    group.hits.push(FaceHit { face: sh.id.face, hit: input });
                }
                stations.push(group);
            }

            candidates.push(DeltaCandidateSummary {
                index: dc.index,
                first_station: dc.first_station,
                last_station: dc.last_station,
                n_seeds: dc.n_seeds,
                n_hits: dc.n_hits,
                center: [dc.center.x, dc.center.y],
                mean_time: if n_hits > 0 { time_sum / n_hits as f64 } else { 0.0 },
                first_time: dc.t0(dc.first_station),
                last_time: dc.t0(dc.last_station),
                edep: dc.edep(),
                stations,
            });
        }

        let flags: Vec<HitFlag> = hits
            .iter()
            .zip(is_delta.iter())
            .map(|(h, &d)| if d { h.flag.merged(HitFlag::BKG) } else { h.flag })
            .collect();

        let filtered_hits = flags
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.has_any_property(masks.bkg))
            .map(|(i, _)| i)
            .collect();

        let mut straw_hit_flags = vec![HitFlag::empty(); n_straw_hits];
        for (index, (h, flag)) in hits.iter().zip(flags.iter()).enumerate() {
            for &sh in &h.straw_hit_indices {
                let Some(f) = straw_hit_flags.get_mut(sh) else {
                    return Err(DeltaFinderError::StrawHitOutOfRange {
                        event: self.event,
                        index,
                        straw_hit: sh,
                        n_straw_hits,
                    });
                };
                f.merge(*flag);
            }
        }

        self.stats.n_emitted = candidates.len();
        Ok(DeltaFinderOutput {
            event: self.event,
            candidates,
            is_delta,
            flags,
            filtered_hits,
            straw_hit_flags,
            stats: self.stats.clone(),
        })
    }
}
