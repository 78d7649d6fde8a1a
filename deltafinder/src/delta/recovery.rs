//! Filling stations of a candidate with seeds or single hits found near its
//! predicted position and time.

use trkcore::tracker::geometry::{N_FACES, N_PANELS_PER_FACE};

use crate::delta::candidate::DeltaCandidate;
use crate::delta::event::DeltaEvent;
use crate::delta::hit_table::{HitId, SeedId};
use crate::delta::seed::{DeltaSeed, SeedHit};
use crate::delta::seed_builder::MIN_PANEL_COS;

impl DeltaEvent<'_> {
    /// Extend `dc` into `station`, `last` being the station it is extrapolated
    /// from. With `recover_seeds` a free seed is tried first, otherwise (or if
    /// none fits) compatible hits are collected into a new seed.
    /// Returns true if the candidate gained a seed.
    pub fn recover_station(
        &mut self,
        dc: &mut DeltaCandidate,
        last: usize,
        station: usize,
        use_used_hits: bool,
        recover_seeds: bool,
    ) -> bool {
        if dc.seed_at(station).is_some() {
            return false;
        }
        if recover_seeds && self.recover_seed(dc, last, station) {
            return true;
        }

        let found = self.collect_hits(dc, last, station, use_used_hits);
        if found.is_empty() {
            return false;
        }
        if found.len() > 1 {
            self.anomaly(format_args!(
                "station {}: {} faces recovered for candidate {}",
                station,
                found.len(),
                dc.index
            ));
        }
        self.commit_hits(dc, station, &found);
        true
    }

    /// Best hit of every face compatible with the candidate.
    fn collect_hits(&self, dc: &DeltaCandidate, last: usize, station: usize, use_used_hits: bool) -> Vec<(HitId, f64)> {
        let cfg = self.config;
        let Some(ndelta) = dc.direction() else {
            return Vec::new();
        };
        let sigma_r2 = cfg.sigma_r2();
        let seed_res2 = cfg.seed_res2();
        let tdelta = dc.t0(station);
        let dt_hit = cfg.max_hit_dt + cfg.max_dt_ds * station.abs_diff(last) as f64;
        let rec = &self.stations[station];

        let mut found = Vec::new();
        for face in 0..N_FACES {
            let mut best: Option<(HitId, f64)> = None;
            let mut best_chi2 = cfg.max_chi2_radial;

            for ip in 0..N_PANELS_PER_FACE {
                let pz = self.geometry.panel(station, face, ip);
                if ndelta.dot(&pz.ndir) < MIN_PANEL_COS {
                    continue;
                }
                let ph = rec.hits.panel(face, ip);
                if ph.tmin > tdelta + dt_hit || ph.tmax < tdelta - dt_hit {
                    continue;
                }

                for (ih, hd) in ph.hits.iter().enumerate() {
                    if hd.used() && !use_used_hits {
                        continue;
                    }
                    if hd.time > tdelta + dt_hit {
                        break;
                    }
                    if hd.time < tdelta - dt_hit {
                        continue;
                    }

                    let d = hd.pos - dc.center;
                    let dw = d.dot(&pz.wdir);
                    let dperp2 = (d - dw * pz.wdir).norm_squared();
                    let chi2 = dw * dw / (hd.sig_w2 + seed_res2) + dperp2 / sigma_r2;
                    if chi2 >= best_chi2 {
                        continue;
                    }

                    if let Some(owner) = hd.seed {
                        let seed = &rec.seeds[owner.index];
                        if seed.used() {
                            continue;
                        }
                        if seed.n_hits >= 3 && !(chi2 < hd.chi2_min) {
                            continue;
                        }
                    }

                    best_chi2 = chi2;
                    best = Some((HitId { station, face, panel: ip, index: ih }, chi2));
                }
            }
            if let Some(b) = best {
                found.push(b);
            }
        }
        found
    }

    /// Move the hits into a new seed of `station` and attach it to `dc`.
    fn commit_hits(&mut self, dc: &mut DeltaCandidate, station: usize, found: &[(HitId, f64)]) {
        let sigma_r2 = self.config.sigma_r2();
        let geom = self.geometry;
        let rec = &mut self.stations[station];
        let sid = SeedId { station, index: rec.seeds.len() };

        let mut seed: Option<DeltaSeed> = None;
        for &(id, chi2) in found {
            let previous = {
                let hd = rec.hits.hit_mut(&id);
                let previous = hd.seed.replace(sid);
                hd.chi2_min = chi2;
                previous
            };

            if let Some(owner) = previous {
                let old = &mut rec.seeds[owner.index];
                if old.hit_id(id.face) == Some(id) {
                    old.remove_hit(id.face);
                    old.calculate_cog_and_chi2(sigma_r2);
                }
                if old.n_faces_with_hits() < 2 {
                    old.mark_lost_hits();
                    let remaining: Vec<HitId> = old.face_hits().map(|h| h.id).collect();
                    for rid in remaining {
                        let hd = rec.hits.hit_mut(&rid);
                        if hd.seed == Some(owner) {
                            hd.seed = None;
                        }
                    }
                }
            }

            let sh = SeedHit::new(id, rec.hits.hit(&id), geom.panel(station, id.face, id.panel));
            match seed.as_mut() {
                None => seed = Some(DeltaSeed::from_single(station, sid.index, sh)),
                Some(s) => s.add_hit(sh),
            }
        }

        let Some(mut seed) = seed else { return };
        if seed.n_hits == 1 {
            // a single wire: take the point of it closest to the candidate center
            let first = seed.face_hits().next().copied();
            if let Some(h) = first {
                seed.center = h.pos + (dc.center - h.pos).dot(&h.wdir) * h.wdir;
            }
        }
        seed.calculate_cog_and_chi2(sigma_r2);
        dc.add_seed(&mut seed);
        rec.seeds.push(seed);
    }

    /// For every candidate, fill stations without seed inside the chain, then
    /// grow it outward while the next station is within `max_gap` of its end.
    /// Hits of free small seeds may be taken over.
    pub fn recover_missing_hits(&mut self) {
        let max_gap = self.config.max_gap;
        let n_stations = self.n_stations();

        for id in 0..self.candidates.len() {
            if !self.candidates[id].active {
                continue;
            }
            let mut dc = std::mem::take(&mut self.candidates[id]);

            let mut last = dc.first_station;
            for i in dc.first_station + 1..dc.last_station {
                if dc.seed_at(i).is_some() {
                    last = i;
                    continue;
                }
                self.recover_station(&mut dc, last, i, true, false);
            }

            for i in (0..dc.first_station).rev() {
                let from = dc.first_station;
                if from - i > max_gap {
                    break;
                }
                self.recover_station(&mut dc, from, i, true, false);
            }

            for i in dc.last_station + 1..n_stations {
                let from = dc.last_station;
                if i - from > max_gap {
                    break;
                }
                self.recover_station(&mut dc, from, i, true, false);
            }

            self.candidates[id] = dc;
        }
    }
}
