//! Linking seeds of consecutive stations into delta candidates.

use crate::delta::candidate::DeltaCandidate;
use crate::delta::event::DeltaEvent;
use crate::delta::seed::DeltaSeed;

/// How far before its first station a new candidate looks for single hits.
pub const BACKWARD_RECOVERY_DEPTH: usize = 2;

/// Consistency of a seed with a candidate: both centers compared with the
/// center fitted to the wires of the two together, in units of `max_dxy`.
pub fn seed_delta_chi2(seed: &DeltaSeed, dc: &DeltaCandidate, max_dxy: f64) -> f64 {
    let Some(c) = (dc.sums + seed.sums).center() else {
        return f64::INFINITY;
    };
    ((c - seed.center).norm_squared() + (c - dc.center).norm_squared()) / (max_dxy * max_dxy)
}

impl DeltaEvent<'_> {
    /// Station loop: attach every good free seed to the best active candidate,
    /// or start a new candidate from it.
    pub fn connect_seeds(&mut self) {
        let cfg = self.config;
        let n_stations = self.n_stations();

        for is in 0..n_stations {
            for k in 0..self.stations[is].compton.len() {
                let si = self.stations[is].compton[k];
                let seed = &self.stations[is].seeds[si];
                if !seed.is_good() || seed.used() {
                    continue;
                }

                let tmean = seed.tmean();
                let mut closest: Option<usize> = None;
                let mut chi2min = cfg.max_chi2_seed_delta;
                for dc in self.candidates.iter() {
                    if !dc.active || dc.seed_at(is).is_some() || dc.last_station >= is {
                        continue;
                    }
                    let gap = is - dc.last_station;
                    if gap > cfg.max_gap {
                        continue;
                    }
                    if (dc.t0(is) - tmean).abs() > cfg.max_seed_dt + cfg.max_dt_ds * gap as f64 {
                        continue;
                    }
                    let chi2 = seed_delta_chi2(seed, dc, cfg.max_dxy);
                    if chi2 < chi2min {
                        closest = Some(dc.id);
                        chi2min = chi2;
                    }
                }

                if let Some(id) = closest {
                    let seed = &mut self.stations[is].seeds[si];
                    self.candidates[id].add_seed(seed);
                    seed.chi2_delta = chi2min;
                    continue;
                }

                // nothing to attach to: try a new candidate
                let mut delta = DeltaCandidate::new(self.candidates.len(), &mut self.stations[is].seeds[si], n_stations);
                for is2 in (0..is).rev() {
                    if delta.first_station - is2 > BACKWARD_RECOVERY_DEPTH {
                        break;
                    }
                    let first = delta.first_station;
                    self.recover_station(&mut delta, first, is2, true, false);
                }
                if is + 1 < n_stations {
                    self.recover_station(&mut delta, is, is + 1, true, true);
                }

                if delta.n_seeds >= cfg.min_n_seeds {
                    self.candidates.push(delta);
                } else {
                    self.release(&delta);
                }
            }

            // chains which ended in the previous station may pick up single hits here
            if is == 0 {
                continue;
            }
            for id in 0..self.candidates.len() {
                let dc = &self.candidates[id];
                if !dc.active || dc.last_station + 1 != is {
                    continue;
                }
                let last = dc.last_station;
                let mut dc = std::mem::take(&mut self.candidates[id]);
                self.recover_station(&mut dc, last, is, true, false);
                self.candidates[id] = dc;
            }
        }
    }

    /// Best free seed of `station` compatible with the candidate; attaches it.
    pub fn recover_seed(&mut self, dc: &mut DeltaCandidate, last: usize, station: usize) -> bool {
        let cfg = self.config;
        let tdelta = dc.t0(station);
        let dt = cfg.max_seed_dt + cfg.max_dt_ds * station.abs_diff(last) as f64;

        let rec = &self.stations[station];
        let mut closest: Option<usize> = None;
        let mut chi2min = cfg.max_chi2_seed_delta;
        for &si in &rec.compton {
            let seed = &rec.seeds[si];
            if !seed.is_good() || seed.used() {
                continue;
            }
            if (tdelta - seed.tmean()).abs() > dt {
                continue;
            }
            let chi2 = seed_delta_chi2(seed, dc, cfg.max_dxy);
            if chi2 < chi2min {
                closest = Some(si);
                chi2min = chi2;
            }
        }

        match closest {
            Some(si) => {
                let seed = &mut self.stations[station].seeds[si];
                if dc.add_seed(seed) {
                    seed.chi2_delta = chi2min;
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    /// Detach all seeds of a candidate that is not kept.
    pub(crate) fn release(&mut self, dc: &DeltaCandidate) {
        for (station, si) in dc.station_seeds() {
            self.stations[station].seeds[si].delta_index = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::test_utils::*;

    #[test]
    fn test_seed_delta_chi2() {
        let p = point(450.0, 150.0);
        let mut s0 = synthetic_seed(0, 0, p, &[0, 1], &[0.0, 0.0]);
        let dc = DeltaCandidate::new(0, &mut s0, 3);

        let same = synthetic_seed(1, 0, p, &[0, 2], &[0.0, 0.0]);
        assert!(seed_delta_chi2(&same, &dc, 40.0) < 1e-9);

        let q = point(470.0, 150.0);
        let shifted = synthetic_seed(1, 0, q, &[0, 2], &[0.0, 0.0]);
        let chi2 = seed_delta_chi2(&shifted, &dc, 40.0);
        // four crossing wires, two through each point: the fit lands in between
        let c = (dc.sums + shifted.sums).center().unwrap();
        let expected = ((c - q).norm_squared() + (c - p).norm_squared()) / 1600.0;
        assert!((chi2 - expected).abs() < 1e-9);
        assert!(chi2 > 0.0);
    }

    #[test]
    fn test_simple_chain() {
        let geom = regular_geometry(5);
        let p = point(450.0, 150.0);
        let mut hits = Vec::new();
        for station in 0..3 {
            hits.push(hit_at(&geom, station, 0, p, 800.0));
            hits.push(hit_at(&geom, station, 1, p, 800.0));
        }
        let cfg = test_config();
        let mut ev = event_context(&geom, &cfg, &hits);
        ev.find_seeds();
        ev.connect_seeds();

        assert_eq!(ev.candidates.len(), 1);
        let dc = &ev.candidates[0];
        assert!(dc.active);
        assert_eq!((dc.first_station, dc.last_station), (0, 2));
        assert_eq!(dc.n_seeds, 3);
        assert_eq!(dc.n_hits, 6);
        assert!((dc.center - p).norm() < 1e-6);
        for (station, si) in dc.station_seeds() {
            assert_eq!(ev.seed(station, si).delta_index, Some(0));
        }
    }

    #[test]
    fn test_lonely_seed_is_released() {
        let geom = regular_geometry(3);
        let p = point(450.0, 150.0);
        let hits = vec![hit_at(&geom, 1, 0, p, 800.0), hit_at(&geom, 1, 1, p, 800.0)];
        let cfg = test_config();
        let mut ev = event_context(&geom, &cfg, &hits);
        ev.find_seeds();
        ev.connect_seeds();
        assert!(ev.candidates.is_empty());
        assert!(!ev.seed(1, 0).used());
        assert!(ev.seed(1, 0).is_good());
    }

    #[test]
    fn test_time_gap_starts_new_candidate() {
        let geom = regular_geometry(6);
        let p = point(450.0, 150.0);
        let mut hits = Vec::new();
        for (station, t) in [(0, 800.0), (1, 800.0), (3, 1200.0), (4, 1200.0)] {
            hits.push(hit_at(&geom, station, 0, p, t));
            hits.push(hit_at(&geom, station, 1, p, t));
        }
        let cfg = test_config();
        let mut ev = event_context(&geom, &cfg, &hits);
        ev.find_seeds();
        ev.connect_seeds();
        assert_eq!(ev.candidates.len(), 2);
        assert_eq!((ev.candidates[0].first_station, ev.candidates[0].last_station), (0, 1));
        assert_eq!((ev.candidates[1].first_station, ev.candidates[1].last_station), (3, 4));
    }
}
