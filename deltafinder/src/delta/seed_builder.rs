//! Stereo seeds: pairs of near-simultaneous hits on crossing wires of one
//! station, completed with the best hit of every remaining face.

use nalgebra::Vector2;
use trkcore::tracker::geometry::{PanelZ, TrackerGeometry, N_FACES, N_PANELS_PER_FACE};

use crate::delta::config::DeltaFinderConfig;
use crate::delta::event::StationRecord;
use crate::delta::hit_table::{HitId, SeedId, StationHits};
use crate::delta::seed::{DeltaSeed, SeedHit};

/// Minimal cosine between a panel direction and the seed (or candidate) direction.
pub const MIN_PANEL_COS: f64 = 0.5;

/// sin^2 of the smallest crossing angle that still gives a usable intersection
const MIN_Q12: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WireIntersection {
    pub point: Vector2<f64>,
    /// signed distance from the first hit to the intersection, along its wire
    pub wd1: f64,
    /// signed distance from the second hit to the intersection, along its wire
    pub wd2: f64,
}

/// Intersect the wire through `p1` (direction `w1`) with the wire through `p2`.
/// Directions must be unit vectors; (anti)parallel wires give `None`.
pub fn intersect_wires(
    p1: &Vector2<f64>,
    w1: &Vector2<f64>,
    p2: &Vector2<f64>,
    w2: &Vector2<f64>,
) -> Option<WireIntersection> {
    let n1n2 = w1.dot(w2);
    let q12 = 1.0 - n1n2 * n1n2;
    if q12 < MIN_Q12 {
        return None;
    }
    let r12 = p1 - p2;
    let r12n1 = r12.dot(w1);
    let r12n2 = r12.dot(w2);

    let wd1 = (r12n1 - n1n2 * r12n2) / q12;
    let wd2 = -(r12n2 - n1n2 * r12n1) / q12;

    Some(WireIntersection { point: p1 - wd1 * w1, wd1, wd2 })
}

/// true if a seed of the station already holds exactly these two hits in these faces
pub fn check_duplicates(seeds: &[DeltaSeed], face1: usize, hit1: HitId, face2: usize, hit2: HitId) -> bool {
    seeds
        .iter()
        .any(|s| s.hit_id(face1) == Some(hit1) && s.hit_id(face2) == Some(hit2))
}

/// Build all seeds of one station. Seeds are appended in scan order, so a
/// seed's index is its position in `rec.seeds`.
pub fn find_seeds(geom: &TrackerGeometry, cfg: &DeltaFinderConfig, rec: &mut StationRecord) {
    for face in 0..N_FACES - 1 {
        find_seeds_in_face(geom, cfg, rec, face);
    }
}

fn find_seeds_in_face(geom: &TrackerGeometry, cfg: &DeltaFinderConfig, rec: &mut StationRecord, face: usize) {
    let station = rec.hits.station;

    for ip1 in 0..N_PANELS_PER_FACE {
        let pz1 = geom.panel(station, face, ip1);
        let nh1 = rec.hits.panel(face, ip1).hits.len();

        for h1 in 0..nh1 {
            let id1 = HitId { station, face, panel: ip1, index: h1 };
            let (ct1, p1, sig_w2_1) = {
                let hd1 = rec.hits.hit(&id1);
                (hd1.time, hd1.pos, hd1.sig_w2)
            };

            for f2 in face + 1..N_FACES {
                for ip2 in 0..N_PANELS_PER_FACE {
                    let pz2 = geom.panel(station, f2, ip2);
                    if !geom.panels_overlap(station, pz1.uid, pz2.uid) {
                        continue;
                    }
                    // also rejects panels without hits
                    let (tmin, tmax, nh2) = {
                        let ph2 = rec.hits.panel(f2, ip2);
                        (ph2.tmin, ph2.tmax, ph2.hits.len())
                    };
                    if tmin - ct1 > cfg.max_drift_time || ct1 - tmax > cfg.max_drift_time {
                        continue;
                    }

                    for h2 in 0..nh2 {
                        let id2 = HitId { station, face: f2, panel: ip2, index: h2 };
                        let (ct2, p2, sig_w2_2) = {
                            let hd2 = rec.hits.hit(&id2);
                            (hd2.time, hd2.pos, hd2.sig_w2)
                        };
                        // buckets are time ordered
                        if ct2 - ct1 > cfg.max_drift_time {
                            break;
                        }
                        if ct1 - ct2 > cfg.max_drift_time {
                            continue;
                        }

                        let Some(x) = intersect_wires(&p1, &pz1.wdir, &p2, &pz2.wdir) else {
                            continue;
                        };
                        let chi2_1 = x.wd1 * x.wd1 / sig_w2_1;
                        let chi2_2 = x.wd2 * x.wd2 / sig_w2_2;
                        if chi2_1 > cfg.max_chi2_seed || chi2_2 > cfg.max_chi2_seed {
                            continue;
                        }
                        if (chi2_1 + chi2_2) / 2.0 > cfg.max_chi2_seed {
                            continue;
                        }
                        if check_duplicates(&rec.seeds, face, id1, f2, id2) {
                            continue;
                        }

                        let index = rec.seeds.len();
                        let sid = SeedId { station, index };
                        let sh1 = claim(&mut rec.hits, id1, sid, chi2_1, pz1);
                        let sh2 = claim(&mut rec.hits, id2, sid, chi2_2, pz2);

                        let mut seed = DeltaSeed::from_pair(station, index, sh1, sh2, x.point);
                        seed.z = (pz1.z + pz2.z) / 2.0;
                        complete_seed(geom, cfg, &mut rec.hits, &mut seed);

                        let edep = seed.edep();
                        if edep > cfg.max_seed_edep {
                            seed.mark_energy_rejected();
                        } else {
                            rec.compton.push(index);
                        }
                        if edep > cfg.min_proton_seed_edep {
                            rec.proton.push(index);
                        }
                        rec.seeds.push(seed);
                    }
                }
            }
        }
    }
}

fn claim(hits: &mut StationHits, id: HitId, sid: SeedId, chi2: f64, pz: &PanelZ) -> SeedHit {
    let hd = hits.hit_mut(&id);
    hd.chi2_min = chi2;
    hd.seed = Some(sid);
    SeedHit::new(id, hd, pz)
}

/// Add to a two-hit seed the best hit of every face it does not use yet,
/// then refit its center and chi2.
pub fn complete_seed(geom: &TrackerGeometry, cfg: &DeltaFinderConfig, hits: &mut StationHits, seed: &mut DeltaSeed) {
    let station = seed.station;
    let sigma_r2 = cfg.sigma_r2();
    let seed_res2 = cfg.seed_res2();
    let center = seed.center;

    let Some(nseed) = center.try_normalize(1e-9) else {
        seed.calculate_cog_and_chi2(sigma_r2);
        return;
    };

    for face in 0..N_FACES {
        if seed.face_processed[face] {
            continue;
        }
        let mut best: Option<(HitId, f64)> = None;
        let mut best_chi2 = cfg.max_chi2_radial;

        for ip in 0..N_PANELS_PER_FACE {
            let pz = geom.panel(station, face, ip);
            if nseed.dot(&pz.ndir) < MIN_PANEL_COS {
                continue;
            }
            for (ih, hd) in hits.panel(face, ip).hits.iter().enumerate() {
                if hd.time - seed.max_hit_time > cfg.max_hit_seed_dt {
                    break;
                }
                if seed.min_hit_time - hd.time > cfg.max_hit_seed_dt {
                    continue;
                }

                let chi2 = if cfg.update_seed_cog {
                    // chi2 per hit of the seed refitted with this hit included
                    let mut sums = seed.sums;
                    sums.add_wire(&hd.pos, &pz.wdir);
                    let Some(c1) = sums.center() else { continue };
                    let (par, perp) = seed.chi2_at(&c1, sigma_r2);
                    let d = hd.pos - c1;
                    let dw = d.dot(&pz.wdir);
                    let dperp2 = (d - dw * pz.wdir).norm_squared();
                    (par + dw * dw / (hd.sig_w2 + sigma_r2) + perp + dperp2 / sigma_r2) / (seed.n_hits + 1) as f64
                } else {
                    let d = hd.pos - center;
                    let dw = d.dot(&pz.wdir);
                    let dperp2 = (d - dw * pz.wdir).norm_squared();
                    dw * dw / (hd.sig_w2 + seed_res2) + dperp2 / sigma_r2
                };

                if chi2 < best_chi2 {
                    best_chi2 = chi2;
                    best = Some((HitId { station, face, panel: ip, index: ih }, chi2));
                }
            }
        }

        if let Some((id, chi2)) = best {
            let sid = SeedId { station, index: seed.index };
            let sh = claim(hits, id, sid, chi2, geom.panel(station, id.face, id.panel));
            seed.add_hit(sh);
        }
    }
    seed.calculate_cog_and_chi2(sigma_r2);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::test_utils::*;

    #[test]
    fn test_intersection_of_known_wires() {
        let x = Vector2::new(350.0, -120.0);
        let w1 = Vector2::new(1.0, 0.0);
        let w2 = Vector2::new(0.5, 3f64.sqrt() / 2.0);
        let p1 = x + 40.0 * w1;
        let p2 = x - 25.0 * w2;
        let r = intersect_wires(&p1, &w1, &p2, &w2).unwrap();
        assert!((r.point - x).norm() < 1e-9);
        assert!((r.wd1 - 40.0).abs() < 1e-9);
        assert!((r.wd2 + 25.0).abs() < 1e-9);
        // the point is also reachable from the second hit
        assert!((p2 - r.wd2 * w2 - x).norm() < 1e-9);

        let exact = intersect_wires(&x, &w1, &x, &w2).unwrap();
        assert!(exact.wd1.abs() < 1e-12 && exact.wd2.abs() < 1e-12);

        assert!(intersect_wires(&p1, &w1, &p2, &(-w1)).is_none());
    }

    #[test]
    fn test_two_hit_seed() {
        let geom = regular_geometry(2);
        let p = point(450.0, 150.0);
        let hits = vec![hit_at(&geom, 0, 0, p, 800.0), hit_at(&geom, 0, 1, p, 805.0)];
        let cfg = test_config();
        let mut rec = station_record(&geom, &cfg, &hits, 0);
        find_seeds(&geom, &cfg, &mut rec);

        assert_eq!(rec.seeds.len(), 1);
        let s = &rec.seeds[0];
        assert_eq!(s.n_hits, 2);
        assert_eq!(s.sface, [Some(0), Some(1)]);
        assert!((s.center - p).norm() < 1e-6);
        assert!(s.chi2_all < 1e-9);
        assert!(s.is_good());
        assert_eq!(rec.compton, vec![0]);
        assert!(rec.proton.is_empty());
        for sh in s.face_hits() {
            let hd = rec.hits.hit(&sh.id);
            assert_eq!(hd.seed, Some(SeedId { station: 0, index: 0 }));
            assert!(hd.chi2_min < 1e-9);
        }
    }

    #[test]
    fn test_seed_rejects_far_and_late_hits() {
        let geom = regular_geometry(1);
        let p = point(450.0, 150.0);
        let cfg = test_config();

        // too far apart in time
        let hits = vec![hit_at(&geom, 0, 0, p, 800.0), hit_at(&geom, 0, 1, p, 800.0 + cfg.max_drift_time + 1.0)];
        let mut rec = station_record(&geom, &cfg, &hits, 0);
        find_seeds(&geom, &cfg, &mut rec);
        assert!(rec.seeds.is_empty());

        // second hit displaced along its wire well beyond its resolution
        let mut far = hit_at(&geom, 0, 1, p, 805.0);
        let (f, k) = geom.locate(&far.straw_id).unwrap();
        let w = geom.panel(0, f, k).wdir;
        far.pos.x += 200.0 * w.x;
        far.pos.y += 200.0 * w.y;
        let hits = vec![hit_at(&geom, 0, 0, p, 800.0), far];
        let mut rec = station_record(&geom, &cfg, &hits, 0);
        find_seeds(&geom, &cfg, &mut rec);
        assert!(rec.seeds.is_empty());
    }

    #[test]
    fn test_check_duplicates() {
        let geom = regular_geometry(1);
        let p = point(450.0, 150.0);
        let hits = vec![hit_at(&geom, 0, 0, p, 800.0), hit_at(&geom, 0, 2, p, 805.0)];
        let cfg = test_config();
        let mut rec = station_record(&geom, &cfg, &hits, 0);
        find_seeds(&geom, &cfg, &mut rec);
        assert_eq!(rec.seeds.len(), 1);
        let a = rec.seeds[0].hit_id(0).unwrap();
        let b = rec.seeds[0].hit_id(2).unwrap();
        assert!(check_duplicates(&rec.seeds, 0, a, 2, b));
        assert!(!check_duplicates(&rec.seeds, 0, a, 1, b));
        // another hit of the same face is not a duplicate
        let other = HitId { index: b.index + 1, ..b };
        assert!(!check_duplicates(&rec.seeds, 0, a, 2, other));
    }

    #[test]
    fn test_completion_adds_one_hit_per_face() {
        let geom = regular_geometry(1);
        let p = point(450.0, 150.0);
        let mut off = hit_at(&geom, 0, 2, p, 806.0);
        let (f, k) = geom.locate(&off.straw_id).unwrap();
        let w = geom.panel(0, f, k).wdir;
        off.pos.x += 30.0 * w.x;
        off.pos.y += 30.0 * w.y;
        let hits = vec![
            hit_at(&geom, 0, 0, p, 800.0),
            hit_at(&geom, 0, 1, p, 805.0),
            off,                           // worse candidate in face 2
            hit_at(&geom, 0, 2, p, 804.0), // exact candidate in face 2
            hit_at(&geom, 0, 3, p, 802.0),
        ];
        let cfg = test_config();
        let mut rec = station_record(&geom, &cfg, &hits, 0);
        find_seeds(&geom, &cfg, &mut rec);

        let s = &rec.seeds[0];
        assert_eq!(s.n_hits, 4);
        let in_face2 = rec.hits.hit(&s.hit_id(2).unwrap()).input_index;
        assert_eq!(in_face2, 3);
        assert!((s.center - p).norm() < 1e-6);
        assert!((s.max_hit_time - 805.0).abs() < 1e-12);

        // with the refitted center the same hit is picked
        let cfg = DeltaFinderConfig { update_seed_cog: true, ..test_config() };
        let mut rec = station_record(&geom, &cfg, &hits, 0);
        find_seeds(&geom, &cfg, &mut rec);
        let s = &rec.seeds[0];
        assert_eq!(s.n_hits, 4);
        assert_eq!(rec.hits.hit(&s.hit_id(2).unwrap()).input_index, 3);
    }

    #[test]
    fn test_energy_classification() {
        let geom = regular_geometry(1);
        let p = point(450.0, 150.0);
        let mut hits = vec![hit_at(&geom, 0, 0, p, 800.0), hit_at(&geom, 0, 1, p, 805.0)];
        let cfg = test_config();

        hits[0].edep = 0.004;
        hits[1].edep = 0.004;
        let mut rec = station_record(&geom, &cfg, &hits, 0);
        find_seeds(&geom, &cfg, &mut rec);
        assert!(rec.seeds[0].is_good());
        assert_eq!((rec.compton.len(), rec.proton.len()), (1, 1));

        hits[0].edep = 0.008;
        hits[1].edep = 0.008;
        let mut rec = station_record(&geom, &cfg, &hits, 0);
        find_seeds(&geom, &cfg, &mut rec);
        assert_eq!(rec.seeds[0].good, -2000);
        assert!(rec.compton.is_empty());
        assert_eq!(rec.proton, vec![0]);
    }
}
