use nalgebra::Vector2;

use crate::delta::lsq::WireSums;
use crate::delta::seed::DeltaSeed;

/// A chain of seeds, at most one per station, forming one delta electron candidate.
#[derive(Clone, Debug)]
pub struct DeltaCandidate {
    /// position in the event candidate list
    pub id: usize,
    /// identity; `-1000 - survivor` once merged into another candidate
    pub index: i32,
    pub active: bool,
    /// seed index of every station, `None` where the chain has no seed
    pub seeds: Vec<Option<usize>>,
    seed_times: Vec<Option<f64>>,
    pub first_station: usize,
    pub last_station: usize,
    pub n_seeds: usize,
    pub n_hits: usize,
    pub sums: WireSums,
    pub center: Vector2<f64>,
    pub edep_sum: f64,
}

impl Default for DeltaCandidate {
    fn default() -> Self {
        DeltaCandidate {
            id: 0,
            index: 0,
            active: false,
            seeds: Vec::new(),
            seed_times: Vec::new(),
            first_station: 0,
            last_station: 0,
            n_seeds: 0,
            n_hits: 0,
            sums: WireSums::default(),
            center: Vector2::zeros(),
            edep_sum: 0.0,
        }
    }
}

impl DeltaCandidate {
    /// Speculative candidate made of one seed. `id` is the position the
    /// candidate will take if it is kept.
    pub fn new(id: usize, seed: &mut DeltaSeed, n_stations: usize) -> Self {
        let mut dc = DeltaCandidate {
            id,
            index: id as i32,
            active: true,
            seeds: vec![None; n_stations],
            seed_times: vec![None; n_stations],
            first_station: seed.station,
            last_station: seed.station,
            center: seed.center,
            ..Default::default()
        };
        dc.add_seed(seed);
        dc
    }

    /// Attach `seed` in its station. Returns false if the station is taken.
    pub fn add_seed(&mut self, seed: &mut DeltaSeed) -> bool {
        let station = seed.station;
        if self.seeds[station].is_some() {
            return false;
        }
        self.seeds[station] = Some(seed.index);
        self.seed_times[station] = Some(seed.tmean());
        if self.n_seeds == 0 {
            self.first_station = station;
            self.last_station = station;
        } else {
            self.first_station = self.first_station.min(station);
            self.last_station = self.last_station.max(station);
        }
        self.n_seeds += 1;
        self.n_hits += seed.n_hits;
        self.edep_sum += seed.edep_sum();
        self.sums += seed.sums;
        if let Some(c) = self.sums.center() {
            self.center = c;
        }
        seed.delta_index = Some(self.id);
        true
    }

    #[inline]
    pub fn seed_at(&self, station: usize) -> Option<usize> {
        self.seeds.get(station).copied().flatten()
    }

    /// (station, seed index) pairs in station order
    pub fn station_seeds(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.seeds
            .iter()
            .enumerate()
            .filter_map(|(s, seed)| seed.map(|i| (s, i)))
    }

    /// Expected time of the candidate in `station`: the seed time where there is
    /// a seed, linear interpolation between neighbors inside the chain, the time
    /// of the nearest end outside of it.
    pub fn t0(&self, station: usize) -> f64 {
        if self.n_seeds == 0 {
            return 0.0;
        }
        let time = |s: usize| self.seed_times[s].unwrap_or(0.0);
        if let Some(t) = self.seed_times.get(station).copied().flatten() {
            return t;
        }
        if station <= self.first_station {
            return time(self.first_station);
        }
        if station >= self.last_station {
            return time(self.last_station);
        }
        let before = (self.first_station..station)
            .rev()
            .find_map(|s| self.seed_times[s].map(|t| (s, t)));
        let after = (station + 1..=self.last_station).find_map(|s| self.seed_times[s].map(|t| (s, t)));
        match (before, after) {
            (Some((s1, t1)), Some((s2, t2))) => t1 + (t2 - t1) * (station - s1) as f64 / (s2 - s1) as f64,
            (Some((_, t)), None) | (None, Some((_, t))) => t,
            (None, None) => 0.0,
        }
    }

    /// mean deposited energy per hit
    pub fn edep(&self) -> f64 {
        if self.n_hits == 0 {
            return 0.0;
        }
        self.edep_sum / self.n_hits as f64
    }

    /// Unit vector pointing from the tracker axis to the candidate center.
    pub fn direction(&self) -> Option<Vector2<f64>> {
        self.center.try_normalize(1e-9)
    }
}
