//! Merging of candidates which are pieces of one delta electron.

use itertools::Itertools;
use log::trace;

use crate::delta::event::DeltaEvent;

/// Largest squared distance between candidate centers still considered for a merge, mm^2.
pub const MAX_MERGE_D2: f64 = 400.0;

impl DeltaEvent<'_> {
    /// One pass over all pairs of active candidates. Close, compatible pairs
    /// are merged into the lower index one, the other one is deactivated.
    /// Returns the number of merges.
    pub fn merge_candidates(&mut self) -> usize {
        let cfg = self.config;
        let n = self.candidates.len();
        let mut n_merged = 0;

        for (i1, i2) in (0..n).tuple_combinations() {
            let (dc1, dc2) = (&self.candidates[i1], &self.candidates[i2]);
            if !dc1.active || !dc2.active {
                continue;
            }
            let d2 = (dc1.center - dc2.center).norm_squared();
            if d2 > MAX_MERGE_D2 {
                continue;
            }

            let dt = dc1.t0(dc1.last_station) - dc2.t0(dc2.first_station);
            if dt.abs() > cfg.max_dt_dc {
                continue;
            }

            // the lower index candidate has to end before the other one starts
            let dds = dc2.first_station as i64 - dc1.last_station as i64;
            if dds < 0 {
                let (a, b) = (dc1.index, dc2.index);
                self.anomaly(format_args!("candidates {} and {} overlap in stations, not merged", a, b));
                continue;
            }
            if dds as usize > cfg.max_gap {
                continue;
            }

            trace!("event {}: merging candidate {} into {}", self.event, i2, i1);
            self.absorb(i1, i2);
            n_merged += 1;
        }

        self.stats.n_merged += n_merged;
        n_merged
    }

    /// Move the seeds of candidate `i2` into candidate `i1` (`i1 < i2`).
    /// Where both have a seed in a station, `i1` keeps its own.
    fn absorb(&mut self, i1: usize, i2: usize) {
        let (head, tail) = self.candidates.split_at_mut(i2);
        let (dc1, dc2) = (&mut head[i1], &mut tail[0]);

        let moved: Vec<(usize, usize)> = dc2.station_seeds().collect();
        for (station, si) in moved {
            let seed = &mut self.stations[station].seeds[si];
            if !dc1.add_seed(seed) {
                seed.delta_index = None;
            }
        }
        dc2.active = false;
        dc2.index = -1000 - dc1.index;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::candidate::DeltaCandidate;
    use crate::delta::test_utils::*;
    use trkcore::data::combo_hit::ComboHit;
    use trkcore::tracker::geometry::TrackerGeometry;

    /// hits of one delta crossing stations 0, 1, 3 and 4
    fn split_event_hits(geom: &TrackerGeometry) -> Vec<ComboHit> {
        let p = point(450.0, 150.0);
        let mut hits = Vec::new();
        for station in [0, 1, 3, 4] {
            hits.push(hit_at(geom, station, 0, p, 800.0 + station as f64));
            hits.push(hit_at(geom, station, 1, p, 800.0 + station as f64));
        }
        hits
    }

    #[test]
    fn test_merge_two_pieces() {
        let geom = regular_geometry(5);
        let cfg = test_config();
        let hits = split_event_hits(&geom);
        let mut ev = event_context(&geom, &cfg, &hits);
        ev.find_seeds();

        let mut a = DeltaCandidate::new(0, ev.seed_mut(0, 0), 5);
        a.add_seed(ev.seed_mut(1, 0));
        let mut b = DeltaCandidate::new(1, ev.seed_mut(3, 0), 5);
        b.add_seed(ev.seed_mut(4, 0));
        ev.candidates.push(a);
        ev.candidates.push(b);

        assert_eq!(ev.merge_candidates(), 1);
        let (a, b) = (&ev.candidates[0], &ev.candidates[1]);
        assert!(a.active && !b.active);
        assert_eq!(b.index, -1000);
        assert_eq!((a.first_station, a.last_station, a.n_seeds, a.n_hits), (0, 4, 4, 8));
        for station in [0, 1, 3, 4] {
            assert_eq!(ev.seed(station, 0).delta_index, Some(0));
        }
        assert_eq!(ev.stats.n_merged, 1);

        // nothing left to merge
        assert_eq!(ev.merge_candidates(), 0);
        assert_eq!(ev.stats.n_merged, 1);
    }

    #[test]
    fn test_distant_pieces_stay_apart() {
        let geom = regular_geometry(5);
        let cfg = test_config();
        let p = point(450.0, 150.0);
        let q = point(450.0, 180.0);
        let hits = vec![
            hit_at(&geom, 0, 0, p, 800.0),
            hit_at(&geom, 0, 1, p, 800.0),
            hit_at(&geom, 2, 0, q, 800.0),
            hit_at(&geom, 2, 1, q, 800.0),
        ];
        let mut ev = event_context(&geom, &cfg, &hits);
        ev.find_seeds();
        let a = DeltaCandidate::new(0, ev.seed_mut(0, 0), 5);
        let b = DeltaCandidate::new(1, ev.seed_mut(2, 0), 5);
        ev.candidates.push(a);
        ev.candidates.push(b);
        assert_eq!(ev.merge_candidates(), 0);
        assert!(ev.candidates.iter().all(|dc| dc.active));
    }

    #[test]
    fn test_inverted_pieces_are_reported() {
        let geom = regular_geometry(5);
        let cfg = test_config();
        let p = point(450.0, 150.0);
        let mut hits = Vec::new();
        for station in 0..4 {
            hits.push(hit_at(&geom, station, 0, p, 800.0));
            hits.push(hit_at(&geom, station, 1, p, 800.0));
        }
        let mut ev = event_context(&geom, &cfg, &hits);
        ev.find_seeds();

        // the lower index candidate covers the later stations
        let mut a = DeltaCandidate::new(0, ev.seed_mut(2, 0), 5);
        a.add_seed(ev.seed_mut(3, 0));
        let mut b = DeltaCandidate::new(1, ev.seed_mut(0, 0), 5);
        b.add_seed(ev.seed_mut(1, 0));
        ev.candidates.push(a);
        ev.candidates.push(b);

        assert_eq!(ev.merge_candidates(), 0);
        assert_eq!(ev.stats.n_anomalies, 1);
        assert!(ev.candidates.iter().all(|dc| dc.active));
        assert_eq!(ev.candidates[1].index, 1);
    }
}
