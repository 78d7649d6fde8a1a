//! Fixtures shared by the unit tests: regular geometries, hits placed at
//! known points and hand-made seeds.

use std::f64::consts::PI;

use nalgebra::{Vector2, Vector3};
use trkcore::data::combo_hit::{ComboHit, StrawId};
use trkcore::data::hit_flag::HitFlag;
use trkcore::tracker::description::TrackerDescription;
use trkcore::tracker::geometry::TrackerGeometry;

use crate::delta::config::DeltaFinderConfig;
use crate::delta::event::{DeltaEvent, StationRecord};
use crate::delta::hit_table::{build_hit_table, HitId};
use crate::delta::seed::{DeltaSeed, SeedHit};

pub const TEST_SIGMA_R2: f64 = 100.0;

pub fn regular_geometry(n_stations: usize) -> TrackerGeometry {
    TrackerGeometry::build(&TrackerDescription::regular(n_stations)).unwrap()
}

pub fn point(x: f64, y: f64) -> Vector2<f64> {
    Vector2::new(x, y)
}

pub fn test_config() -> DeltaFinderConfig {
    DeltaFinderConfig { print_errors: true, ..Default::default() }
}

/// Hit exactly at `p`, on the panel of `face` pointing closest to `p`.
pub fn hit_at(geom: &TrackerGeometry, station: usize, face: usize, p: Vector2<f64>, time: f64) -> ComboHit {
    let dir = p.normalize();
    let pz = geom
        .face_panels(station, face)
        .iter()
        .max_by(|a, b| a.ndir.dot(&dir).total_cmp(&b.ndir.dot(&dir)))
        .unwrap();
    ComboHit {
        straw_id: StrawId::new(station, pz.plane, pz.panel, 0),
        time,
        corrected_time: time,
        edep: 0.001,
        pos: Vector3::new(p.x, p.y, pz.z),
        wire_res: 30.0,
        flag: HitFlag::empty(),
        straw_hit_indices: Vec::new(),
    }
}

pub fn station_record(geom: &TrackerGeometry, cfg: &DeltaFinderConfig, hits: &[ComboHit], station: usize) -> StationRecord {
    let table = build_hit_table(geom, cfg, &cfg.masks().unwrap(), 0, hits, &[]).unwrap();
    StationRecord::new(table.into_iter().nth(station).unwrap())
}

pub fn event_context<'a>(geom: &'a TrackerGeometry, cfg: &'a DeltaFinderConfig, hits: &[ComboHit]) -> DeltaEvent<'a> {
    let table = build_hit_table(geom, cfg, &cfg.masks().unwrap(), 0, hits, &[]).unwrap();
    DeltaEvent::new(0, geom, cfg, table)
}

/// Seed with one hit per listed face, each wire through `p` and the hit
/// moved by `along` on it. A hit moved off `p` gets a different hit index.
pub fn synthetic_seed(station: usize, index: usize, p: Vector2<f64>, faces: &[usize], along: &[f64]) -> DeltaSeed {
    assert!(faces.len() >= 2 && faces.len() == along.len());
    let hits: Vec<SeedHit> = faces
        .iter()
        .zip(along)
        .map(|(&face, &a)| {
            let phi = face as f64 * PI / 4.0 + 0.2;
            let wdir = Vector2::new(phi.cos(), phi.sin());
            SeedHit {
                id: HitId { station, face, panel: 0, index: if a == 0.0 { 0 } else { 1 } },
                pos: p + a * wdir,
                wdir,
                z: face as f64 * 10.0,
                time: 800.0,
                edep: 0.001,
                sig_w2: 900.0,
            }
        })
        .collect();

    let mut seed = DeltaSeed::from_pair(station, index, hits[0], hits[1], p);
    for h in &hits[2..] {
        seed.add_hit(*h);
    }
    seed.calculate_cog_and_chi2(TEST_SIGMA_R2);
    seed
}

pub fn shift_time(seed: &mut DeltaSeed, time: f64) {
    for h in seed.hits.iter_mut().flatten() {
        h.time = time;
    }
    seed.calculate_cog_and_chi2(TEST_SIGMA_R2);
}
