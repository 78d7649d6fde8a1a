use nalgebra::Vector2;
use trkcore::tracker::geometry::{PanelZ, N_FACES};

use crate::delta::hit_table::{HitData, HitId};
use crate::delta::lsq::WireSums;

/// Copy of the hit quantities a seed fit needs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeedHit {
    pub id: HitId,
    pub pos: Vector2<f64>,
    pub wdir: Vector2<f64>,
    pub z: f64,
    pub time: f64,
    pub edep: f64,
    pub sig_w2: f64,
}

impl SeedHit {
    pub fn new(id: HitId, hit: &HitData, pz: &PanelZ) -> Self {
        SeedHit {
            id,
            pos: hit.pos,
            wdir: pz.wdir,
            z: hit.z,
            time: hit.time,
            edep: hit.edep,
            sig_w2: hit.sig_w2,
        }
    }

    /// (along-wire, perpendicular squared) residuals with respect to `center`
    #[inline]
    pub fn residuals(&self, center: &Vector2<f64>) -> (f64, f64) {
        let d = self.pos - center;
        let dw = d.dot(&self.wdir);
        let perp = d - dw * self.wdir;
        (dw, perp.norm_squared())
    }
}

/// Up to four hits of one station, at most one per face.
///
/// `good >= 0` marks a usable seed. Rejected seeds keep their data and carry
/// a negative code: `-1000 - i` pruned in favor of seed `i` (or by the chi2
/// cut when `i` is the seed itself), `-2000 - index` too much energy,
/// `-3000 - index` lost its hits during recovery.
#[derive(Clone, Debug)]
pub struct DeltaSeed {
    pub station: usize,
    pub index: usize,
    pub hits: [Option<SeedHit>; N_FACES],
    /// faces of the founding hits; a recovered single-hit seed has only the first
    pub sface: [Option<usize>; 2],
    pub face_processed: [bool; N_FACES],
    pub n_hits: usize,
    pub center: Vector2<f64>,
    pub z: f64,
    pub min_hit_time: f64,
    pub max_hit_time: f64,
    pub sums: WireSums,
    pub chi2_par: f64,
    pub chi2_perp: f64,
    pub chi2_all: f64,
    pub good: i32,
    pub delta_index: Option<usize>,
    pub chi2_delta: f64,
}

impl DeltaSeed {
    fn empty(station: usize, index: usize) -> Self {
        DeltaSeed {
            station,
            index,
            hits: [None; N_FACES],
            sface: [None; 2],
            face_processed: [false; N_FACES],
            n_hits: 0,
            center: Vector2::zeros(),
            z: 0.0,
            min_hit_time: f64::INFINITY,
            max_hit_time: f64::NEG_INFINITY,
            sums: WireSums::default(),
            chi2_par: 0.0,
            chi2_perp: 0.0,
            chi2_all: 0.0,
            good: 0,
            delta_index: None,
            chi2_delta: -1.0,
        }
    }

    /// Stereo seed from two hits crossing at `center`.
    pub fn from_pair(station: usize, index: usize, h1: SeedHit, h2: SeedHit, center: Vector2<f64>) -> Self {
        let mut seed = DeltaSeed::empty(station, index);
        seed.sface = [Some(h1.id.face), Some(h2.id.face)];
        seed.add_hit(h1);
        seed.add_hit(h2);
        seed.center = center;
        seed.z = (h1.z + h2.z) / 2.0;
        seed
    }

    /// Seed made of one recovered hit; the center is set by the caller.
    pub fn from_single(station: usize, index: usize, hit: SeedHit) -> Self {
        let mut seed = DeltaSeed::empty(station, index);
        seed.sface[0] = Some(hit.id.face);
        seed.add_hit(hit);
        seed.center = hit.pos;
        seed.z = hit.z;
        seed
    }

    /// Put `hit` into its face slot. The slot must be free.
    pub fn add_hit(&mut self, hit: SeedHit) {
        let face = hit.id.face;
        debug_assert!(self.hits[face].is_none());
        self.hits[face] = Some(hit);
        self.face_processed[face] = true;
        self.n_hits += 1;
        self.sums.add_wire(&hit.pos, &hit.wdir);
        self.min_hit_time = self.min_hit_time.min(hit.time);
        self.max_hit_time = self.max_hit_time.max(hit.time);
    }

    /// Drop the hit of `face`; sums and fit are refreshed by
    /// [`DeltaSeed::calculate_cog_and_chi2`].
    pub fn remove_hit(&mut self, face: usize) -> Option<SeedHit> {
        let hit = self.hits[face].take()?;
        self.n_hits -= 1;
        let mut remaining = self.hits.iter().flatten().map(|h| h.id.face);
        self.sface = [remaining.next(), remaining.next()];
        Some(hit)
    }

    #[inline]
    pub fn hit(&self, face: usize) -> Option<&SeedHit> {
        self.hits[face].as_ref()
    }

    #[inline]
    pub fn hit_id(&self, face: usize) -> Option<HitId> {
        self.hits[face].map(|h| h.id)
    }

    pub fn face_hits(&self) -> impl Iterator<Item = &SeedHit> + '_ {
        self.hits.iter().flatten()
    }

    #[inline]
    pub fn n_faces_with_hits(&self) -> usize {
        self.n_hits
    }

    #[inline]
    pub fn is_good(&self) -> bool {
        self.good >= 0
    }

    /// rejected as proton-like, kept for hit bookkeeping
    #[inline]
    pub fn is_energy_rejected(&self) -> bool {
        (-2999..=-2000).contains(&self.good)
    }

    /// attached to a delta candidate
    #[inline]
    pub fn used(&self) -> bool {
        self.delta_index.is_some()
    }

    pub fn tmean(&self) -> f64 {
        if self.n_hits == 0 {
            return 0.0;
        }
        self.face_hits().map(|h| h.time).sum::<f64>() / self.n_hits as f64
    }

    pub fn edep_sum(&self) -> f64 {
        self.face_hits().map(|h| h.edep).sum()
    }

    /// mean deposited energy per hit
    pub fn edep(&self) -> f64 {
        if self.n_hits == 0 {
            return 0.0;
        }
        self.edep_sum() / self.n_hits as f64
    }

    pub fn chi2_all_n(&self) -> f64 {
        if self.n_hits == 0 {
            return 0.0;
        }
        self.chi2_all / self.n_hits as f64
    }

    /// Summed (parallel, perpendicular) chi2 of the seed hits for a trial center.
    pub fn chi2_at(&self, center: &Vector2<f64>, sigma_r2: f64) -> (f64, f64) {
        self.face_hits().fold((0.0, 0.0), |(par, perp), h| {
            let (dw, dperp2) = h.residuals(center);
            (par + dw * dw / (h.sig_w2 + sigma_r2), perp + dperp2 / sigma_r2)
        })
    }

    /// Refit the center from the hit wires and recompute time range and chi2.
    /// With fewer than two crossing wires the current center is kept.
    pub fn calculate_cog_and_chi2(&mut self, sigma_r2: f64) {
        let mut sums = WireSums::default();
        let mut tmin = f64::INFINITY;
        let mut tmax = f64::NEG_INFINITY;
        let mut zsum = 0.0;
        for h in self.hits.iter().flatten() {
            sums.add_wire(&h.pos, &h.wdir);
            tmin = tmin.min(h.time);
            tmax = tmax.max(h.time);
            zsum += h.z;
        }
        self.sums = sums;
        self.min_hit_time = tmin;
        self.max_hit_time = tmax;
        if self.n_hits > 0 {
            self.z = zsum / self.n_hits as f64;
        }
        if let Some(c) = sums.center() {
            self.center = c;
        }
        let (par, perp) = self.chi2_at(&self.center, sigma_r2);
        self.chi2_par = par;
        self.chi2_perp = perp;
        self.chi2_all = par + perp;
    }

    #[inline]
    pub fn mark_pruned_by(&mut self, winner: usize) {
        self.good = -1000 - winner as i32;
    }

    #[inline]
    pub fn mark_energy_rejected(&mut self) {
        self.good = -2000 - self.index as i32;
    }

    #[inline]
    pub fn mark_lost_hits(&mut self) {
        self.good = -3000 - self.index as i32;
    }
}
