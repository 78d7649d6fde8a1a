//! Per-event hit records bucketed by (station, face, panel).

use std::array;

use nalgebra::Vector2;
use ordered_float::OrderedFloat;
use trkcore::data::combo_hit::ComboHit;
use trkcore::data::time_peak::TimePeak;
use trkcore::tracker::geometry::{TrackerGeometry, N_FACES, N_PANELS_PER_FACE};

use crate::delta::config::{DeltaFinderConfig, HitMasks};
use crate::error::{DeltaFinderError, Result};

/// Location of a hit record: z-ordered panel plus position in its time-sorted bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HitId {
    pub station: usize,
    pub face: usize,
    pub panel: usize,
    pub index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeedId {
    pub station: usize,
    pub index: usize,
}

#[derive(Clone, Debug)]
pub struct HitData {
    /// position of the hit in the input combo hit collection
    pub input_index: usize,
    /// corrected time
    pub time: f64,
    pub pos: Vector2<f64>,
    pub z: f64,
    pub sig_w2: f64,
    pub edep: f64,
    /// seed currently claiming the hit
    pub seed: Option<SeedId>,
    /// chi2 of the hit in its best seed so far
    pub chi2_min: f64,
}

impl HitData {
    #[inline]
    pub fn used(&self) -> bool {
        self.seed.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct PanelHits {
    pub hits: Vec<HitData>,
    pub tmin: f64,
    pub tmax: f64,
}

impl Default for PanelHits {
    fn default() -> Self {
        PanelHits { hits: Vec::new(), tmin: f64::INFINITY, tmax: f64::NEG_INFINITY }
    }
}

impl PanelHits {
    fn finalize(&mut self) {
        self.hits.sort_by_key(|h| (OrderedFloat(h.time), h.input_index));
        self.tmin = self.hits.first().map_or(f64::INFINITY, |h| h.time);
        self.tmax = self.hits.last().map_or(f64::NEG_INFINITY, |h| h.time);
    }
}

/// All selected hits of one station, `[face][panel]`.
#[derive(Clone, Debug)]
pub struct StationHits {
    pub station: usize,
    pub panels: [[PanelHits; N_PANELS_PER_FACE]; N_FACES],
}

impl StationHits {
    pub fn new(station: usize) -> Self {
        StationHits {
            station,
            panels: array::from_fn(|_| array::from_fn(|_| PanelHits::default())),
        }
    }

    #[inline]
    pub fn panel(&self, face: usize, panel: usize) -> &PanelHits {
        &self.panels[face][panel]
    }

    #[inline]
    pub fn hit(&self, id: &HitId) -> &HitData {
        &self.panels[id.face][id.panel].hits[id.index]
    }

    #[inline]
    pub fn hit_mut(&mut self, id: &HitId) -> &mut HitData {
        &mut self.panels[id.face][id.panel].hits[id.index]
    }

    pub fn n_hits(&self) -> usize {
        self.panels.iter().flatten().map(|p| p.hits.len()).sum()
    }

    /// Ids of all hits in (face, panel, time) order.
    pub fn hit_ids(&self) -> impl Iterator<Item = HitId> + '_ {
        let station = self.station;
        self.panels.iter().enumerate().flat_map(move |(face, row)| {
            row.iter().enumerate().flat_map(move |(panel, ph)| {
                (0..ph.hits.len()).map(move |index| HitId { station, face, panel, index })
            })
        })
    }
}

/// true if some calorimeter time peak is compatible with a hit at `time` in `station`
fn in_time_peak(geom: &TrackerGeometry, cfg: &DeltaFinderConfig, peaks: &[TimePeak], station: usize, time: f64) -> bool {
    peaks.iter().any(|tp| match geom.station_to_calo_tof(tp.disk, station, cfg.mean_pitch_angle) {
        Some(tof) => {
            let dt = tp.time - (time + tof);
            dt > cfg.min_calo_dt && dt < cfg.max_calo_dt
        }
        None => false,
    })
}

/// Select the event's hits and sort them into time-ordered panel buckets.
///
/// `time_peaks` is only consulted when the time-peak gate is enabled.
pub fn build_hit_table(
    geom: &TrackerGeometry,
    cfg: &DeltaFinderConfig,
    masks: &HitMasks,
    event: u64,
    hits: &[ComboHit],
    time_peaks: &[TimePeak],
) -> Result<Vec<StationHits>> {
    let mut stations: Vec<StationHits> = (0..geom.n_stations()).map(StationHits::new).collect();

    for (i, ch) in hits.iter().enumerate() {
        if cfg.test_hit_mask && !masks.accepts(ch.flag) {
            continue;
        }
        let t = ch.corrected_time;
        if t < cfg.min_hit_time || t > cfg.max_hit_time {
            continue;
        }
        let (face, panel) = geom.locate(&ch.straw_id).map_err(|_| DeltaFinderError::HitOutOfRange {
            event,
            index: i,
            station: ch.straw_id.station,
            plane: ch.straw_id.plane,
            panel: ch.straw_id.panel,
        })?;
        let station = ch.straw_id.station;
        if cfg.use_time_peaks && !in_time_peak(geom, cfg, time_peaks, station, t) {
            continue;
        }
        stations[station].panels[face][panel].hits.push(HitData {
            input_index: i,
            time: t,
            pos: ch.xy(),
            z: ch.pos.z,
            sig_w2: ch.sig_w2(),
            edep: ch.edep,
            seed: None,
            chi2_min: f64::INFINITY,
        });
    }

    for ph in stations.iter_mut().flat_map(|s| s.panels.iter_mut().flatten()) {
        ph.finalize();
    }
    Ok(stations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::test_utils::*;
    use trkcore::data::combo_hit::StrawId;
    use trkcore::data::hit_flag::HitFlag;

    #[test]
    fn test_buckets_are_time_sorted() {
        let geom = regular_geometry(3);
        let p = point(420.0, 60.0);
        let hits = vec![
            hit_at(&geom, 1, 0, p, 900.0),
            hit_at(&geom, 1, 0, p, 850.0),
            hit_at(&geom, 1, 0, p, 850.0),
            hit_at(&geom, 2, 3, p, 870.0),
        ];
        let cfg = test_config();
        let table = build_hit_table(&geom, &cfg, &cfg.masks().unwrap(), 0, &hits, &[]).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table[0].n_hits(), 0);
        assert_eq!(table[1].n_hits(), 3);

        let (_, panel) = geom.locate(&hits[0].straw_id).unwrap();
        let ph = table[1].panel(0, panel);
        let order: Vec<usize> = ph.hits.iter().map(|h| h.input_index).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert_eq!((ph.tmin, ph.tmax), (850.0, 900.0));

        // empty buckets never pass a time window test
        let empty = table[0].panel(2, 1);
        assert!(empty.tmin > empty.tmax);
    }

    #[test]
    fn test_flag_and_time_gates() {
        let geom = regular_geometry(2);
        let p = point(420.0, 60.0);
        let mut hits = vec![
            hit_at(&geom, 0, 0, p, 900.0),
            hit_at(&geom, 0, 1, p, 100.0), // too early
            hit_at(&geom, 0, 2, p, 900.0),
            hit_at(&geom, 0, 3, p, 900.0),
        ];
        hits[2].flag = HitFlag::ENERGY_SEL.merged(HitFlag::DEAD);
        hits[3].flag = HitFlag::ENERGY_SEL;
        let cfg = DeltaFinderConfig {
            good_hit_mask: vec!["EnergySelection".into()],
            bkg_hit_mask: vec!["Dead".into()],
            ..test_config()
        };
        let table = build_hit_table(&geom, &cfg, &cfg.masks().unwrap(), 0, &hits, &[]).unwrap();
        let kept: Vec<usize> = table[0].hit_ids().map(|id| table[0].hit(&id).input_index).collect();
        assert_eq!(kept, vec![3]);

        let cfg = DeltaFinderConfig { test_hit_mask: false, ..cfg };
        let table = build_hit_table(&geom, &cfg, &cfg.masks().unwrap(), 0, &hits, &[]).unwrap();
        assert_eq!(table[0].n_hits(), 3);
    }

    #[test]
    fn test_time_peak_gate() {
        let geom = regular_geometry(2);
        let p = point(420.0, 60.0);
        let hits = vec![hit_at(&geom, 0, 0, p, 900.0), hit_at(&geom, 1, 0, p, 1300.0)];
        let cfg = DeltaFinderConfig { use_time_peaks: true, ..test_config() };
        let tof = geom.station_to_calo_tof(0, 0, cfg.mean_pitch_angle).unwrap();
        let peaks = vec![TimePeak { time: 900.0 + tof + 10.0, disk: 0 }];
        let table = build_hit_table(&geom, &cfg, &cfg.masks().unwrap(), 0, &hits, &peaks).unwrap();
        assert_eq!(table[0].n_hits(), 1);
        assert_eq!(table[1].n_hits(), 0);
    }

    #[test]
    fn test_hit_outside_tracker() {
        let geom = regular_geometry(2);
        let mut h = hit_at(&geom, 0, 0, point(420.0, 60.0), 900.0);
        h.straw_id = StrawId::new(7, 0, 1, 0);
        let cfg = test_config();
        let err = build_hit_table(&geom, &cfg, &cfg.masks().unwrap(), 42, &[h], &[]).unwrap_err();
        assert!(matches!(err, DeltaFinderError::HitOutOfRange { event: 42, index: 0, station: 7, .. }));
    }
}
