//! Synthetic events: low energy electrons spiralling through a few stations
//! at a fixed transverse position, on top of uniform noise hits.
//!
//! Every generated hit carries its truth label, which makes the generator
//! usable both in tests and for quick efficiency checks from the command line.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use nalgebra::{Vector2, Vector3};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use trkcore::data::combo_hit::{ComboHit, StrawId};
use trkcore::data::hit_flag::HitFlag;
use trkcore::tracker::geometry::{PanelZ, TrackerGeometry, N_FACES};

use crate::io::EventData;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticOpts {
    pub n_deltas: usize,
    pub n_noise: usize,
    /// stations crossed by one delta electron
    pub min_stations: usize,
    pub max_stations: usize,
    /// faces with a hit in every crossed station
    pub min_faces: usize,
    /// radius of the delta centers (mm)
    pub min_radius: f64,
    pub max_radius: f64,
    pub min_time: f64,
    pub max_time: f64,
    /// spread of the hit times of one delta (ns)
    pub time_jitter: f64,
    /// spread of the hit positions along the wire (mm)
    pub wire_jitter: f64,
    pub wire_res: f64,
    /// energy per delta hit (MeV)
    pub delta_edep: (f64, f64),
    pub noise_edep: (f64, f64),
    pub seed: u64,
}

impl Default for SyntheticOpts {
    fn default() -> Self {
        Self {
            n_deltas: 3,
            n_noise: 40,
            min_stations: 3,
            max_stations: 6,
            min_faces: 2,
            min_radius: 400.0,
            max_radius: 650.0,
            min_time: 600.0,
            max_time: 1700.0,
            time_jitter: 3.0,
            wire_jitter: 5.0,
            wire_res: 30.0,
            delta_edep: (0.0008, 0.0015),
            noise_edep: (0.001, 0.004),
            seed: 42,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyntheticEvent {
    pub data: EventData,
    /// generating delta of every combo hit, `None` for noise
    pub truth: Vec<Option<usize>>,
}

impl SyntheticEvent {
    pub fn n_delta_hits(&self) -> usize {
        self.truth.iter().filter(|t| t.is_some()).count()
    }
}

fn panel_facing<'g>(geom: &'g TrackerGeometry, station: usize, face: usize, dir: &Vector2<f64>) -> &'g PanelZ {
    let panels = geom.face_panels(station, face);
    panels
        .iter()
        .max_by_key(|pz| OrderedFloat(pz.ndir.dot(dir)))
        .unwrap_or(&panels[0])
}

fn make_hit(pz: &PanelZ, pos: Vector2<f64>, time: f64, edep: f64, wire_res: f64, straw_hit: usize) -> ComboHit {
    ComboHit {
        straw_id: StrawId::new(pz.station, pz.plane, pz.panel, 0),
        time,
        corrected_time: time,
        edep,
        pos: Vector3::new(pos.x, pos.y, pz.z),
        wire_res,
        flag: HitFlag::empty(),
        straw_hit_indices: vec![straw_hit],
    }
}

pub fn generate_event(geom: &TrackerGeometry, opts: &SyntheticOpts, event: u64, rng: &mut StdRng) -> SyntheticEvent {
    let n_stations = geom.n_stations();
    let mut hits = Vec::new();
    let mut truth = Vec::new();

    let max_len = opts.max_stations.min(n_stations).max(1);
    let min_len = opts.min_stations.clamp(1, max_len);
    let min_faces = opts.min_faces.clamp(1, N_FACES);

    for delta in 0..opts.n_deltas {
        let phi = rng.gen_range(0.0..std::f64::consts::TAU);
        let dir = Vector2::new(phi.cos(), phi.sin());
        let center = rng.gen_range(opts.min_radius..=opts.max_radius) * dir;
        let t0 = rng.gen_range(opts.min_time..=opts.max_time);
        let len = rng.gen_range(min_len..=max_len);
        let first = rng.gen_range(0..=n_stations - len);

        for station in first..first + len {
            let mut faces: Vec<usize> = (0..N_FACES).collect();
            faces.shuffle(rng);
            let n_faces = rng.gen_range(min_faces..=N_FACES);
            faces.truncate(n_faces);
            faces.sort_unstable();

            for face in faces {
                let pz = panel_facing(geom, station, face, &dir);
                let pos = center + rng.gen_range(-opts.wire_jitter..=opts.wire_jitter) * pz.wdir;
                let time = t0 + rng.gen_range(0.0..=opts.time_jitter);
                let edep = rng.gen_range(opts.delta_edep.0..=opts.delta_edep.1);
                hits.push(make_hit(pz, pos, time, edep, opts.wire_res, hits.len()));
                truth.push(Some(delta));
            }
        }
    }

    for _ in 0..opts.n_noise {
        let station = rng.gen_range(0..n_stations);
        let face = rng.gen_range(0..N_FACES);
        let pz = &geom.face_panels(station, face)[rng.gen_range(0..3)];
        let radius = rng.gen_range(opts.min_radius..=opts.max_radius);
        let pos = radius * pz.ndir + rng.gen_range(-300.0..=300.0) * pz.wdir;
        let time = rng.gen_range(opts.min_time..=opts.max_time);
        let edep = rng.gen_range(opts.noise_edep.0..=opts.noise_edep.1);
        hits.push(make_hit(pz, pos, time, edep, opts.wire_res, hits.len()));
        truth.push(None);
    }

    SyntheticEvent { data: EventData::from_hits(event, hits), truth }
}

/// `n_events` events from one random stream seeded with `opts.seed`.
pub fn generate_events(geom: &TrackerGeometry, opts: &SyntheticOpts, n_events: usize) -> Vec<SyntheticEvent> {
    let mut rng = StdRng::seed_from_u64(opts.seed);
    (0..n_events)
        .map(|event| generate_event(geom, opts, event as u64, &mut rng))
        .collect()
}
