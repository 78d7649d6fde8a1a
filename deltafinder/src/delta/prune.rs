//! Removal of ghost and duplicate seeds within one station.

use trkcore::tracker::geometry::N_FACES;

use crate::delta::config::DeltaFinderConfig;
use crate::delta::event::StationRecord;
use crate::delta::hit_table::SeedId;
use crate::delta::seed::DeltaSeed;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Loser {
    First,
    Second,
}

/// Number of faces in which both seeds hold the very same hit.
pub fn n_shared_faces(s1: &DeltaSeed, s2: &DeltaSeed) -> usize {
    (0..N_FACES)
        .filter(|&f| matches!((s1.hit_id(f), s2.hit_id(f)), (Some(a), Some(b)) if a == b))
        .count()
}

/// Which of two overlapping seeds has to go, `None` if both stay.
/// `s1` comes first in scan order and wins exact ties.
pub fn contest(s1: &DeltaSeed, s2: &DeltaSeed) -> Option<Loser> {
    let shared = n_shared_faces(s1, s2);
    let (n1, n2) = (s1.n_faces_with_hits(), s2.n_faces_with_hits());
    let by_chi2 = || {
        if s1.chi2_all_n() <= s2.chi2_all_n() {
            Loser::Second
        } else {
            Loser::First
        }
    };

    match shared {
        0 => None,
        1 => {
            if n1 == 2 {
                if n2 > 2 {
                    Some(Loser::First)
                } else {
                    Some(by_chi2())
                }
            } else if n2 == 2 {
                Some(Loser::Second)
            } else {
                // two large seeds touching in a single face: keep both
                None
            }
        }
        _ => {
            if n1 > n2 {
                Some(Loser::Second)
            } else if n2 > n1 {
                Some(Loser::First)
            } else {
                Some(by_chi2())
            }
        }
    }
}

pub fn prune_seeds(cfg: &DeltaFinderConfig, rec: &mut StationRecord) {
    let seeds = &mut rec.seeds;
    let n = seeds.len();

    for (i, s) in seeds.iter_mut().enumerate() {
        if s.is_good() && s.chi2_all_n() > cfg.max_chi2_all {
            s.mark_pruned_by(i);
        }
    }

    for i1 in 0..n {
        if !seeds[i1].is_good() {
            continue;
        }
        let tmean1 = seeds[i1].tmean();
        for i2 in i1 + 1..n {
            if !seeds[i2].is_good() {
                continue;
            }
            if (tmean1 - seeds[i2].tmean()).abs() > cfg.max_seed_dt {
                continue;
            }
            match contest(&seeds[i1], &seeds[i2]) {
                Some(Loser::First) => {
                    seeds[i1].mark_pruned_by(i2);
                    break;
                }
                Some(Loser::Second) => seeds[i2].mark_pruned_by(i1),
                None => {}
            }
        }
    }

    // back-references point at surviving and proton-like seeds only, good
    // seeds win shared hits and among them the later one
    let station = rec.hits.station;
    for ph in rec.hits.panels.iter_mut().flatten() {
        for h in ph.hits.iter_mut() {
            h.seed = None;
        }
    }
    let rejected = seeds.iter().filter(|s| s.is_energy_rejected());
    for s in rejected.chain(seeds.iter().filter(|s| s.is_good())) {
        for sh in s.face_hits() {
            rec.hits.hit_mut(&sh.id).seed = Some(SeedId { station, index: s.index });
        }
    }
}
