//! Z-ordered tracker index: stations x faces x panels.
//!
//! Faces are the four wire-orientation layers of a station, ordered by z.
//! Each face holds three panels. The index is built once per configuration
//! and is read-only afterwards, so it can be shared freely across events.

use std::array;
use std::collections::BTreeMap;

use itertools::iproduct;
use nalgebra::Vector2;
use ordered_float::OrderedFloat;

use crate::data::combo_hit::StrawId;
use crate::error::TrackerError;
use crate::tracker::description::{PanelDescription, TrackerDescription};

pub const N_FACES: usize = 4;
pub const N_PANELS_PER_FACE: usize = 3;
pub const N_PLANES_PER_STATION: usize = 2;
pub const N_PANELS_PER_PLANE: usize = 6;
pub const N_PANELS_PER_STATION: usize = N_PLANES_PER_STATION * N_PANELS_PER_PLANE;

/// speed of light, mm/ns
pub const C_LIGHT: f64 = 299.792458;

/// Panels whose centers are more than this far apart in azimuth can't share a seed.
const MAX_OVERLAP_DPHI: f64 = 2.0 * std::f64::consts::PI / 3.0;

#[derive(Clone, Debug, PartialEq)]
pub struct PanelZ {
    pub station: usize,
    pub plane: usize,
    pub panel: usize,
    pub face: usize,
    pub panel_in_face: usize,
    /// plane * 6 + panel, index into the overlap table
    pub uid: usize,
    /// unit straw direction
    pub wdir: Vector2<f64>,
    /// unit vector pointing from the axis to the panel center
    pub ndir: Vector2<f64>,
    pub z: f64,
}

impl PanelZ {
    fn from_description(d: &PanelDescription) -> Result<Self, TrackerError> {
        let wdir = Vector2::new(d.wire_dir[0], d.wire_dir[1]);
        let ndir = Vector2::new(d.center[0], d.center[1]);
        let degenerate = |what| TrackerError::DegenerateVector {
            station: d.station,
            plane: d.plane,
            panel: d.panel,
            what,
        };
        let wdir = wdir.try_normalize(1e-9).ok_or_else(|| degenerate("wire direction"))?;
        let ndir = ndir.try_normalize(1e-9).ok_or_else(|| degenerate("panel center"))?;
        Ok(PanelZ {
            station: d.station,
            plane: d.plane,
            panel: d.panel,
            face: 0,
            panel_in_face: 0,
            uid: d.plane * N_PANELS_PER_PLANE + d.panel,
            wdir,
            ndir,
            z: d.center[2],
        })
    }
}

#[derive(Clone, Debug)]
pub struct TrackerGeometry {
    /// [station][face][panel]
    panels: Vec<[[PanelZ; N_PANELS_PER_FACE]; N_FACES]>,
    /// [station][uid] -> (face, panel in face)
    location: Vec<[(usize, usize); N_PANELS_PER_STATION]>,
    /// [station parity][uid1][uid2]
    panel_overlap: [[[bool; N_PANELS_PER_STATION]; N_PANELS_PER_STATION]; 2],
    station_z: Vec<f64>,
    calo_disk_z: Vec<f64>,
}

impl TrackerGeometry {
    pub fn build(desc: &TrackerDescription) -> Result<Self, TrackerError> {
        let n_stations = desc.n_stations();
        if n_stations == 0 {
            return Err(TrackerError::Empty);
        }

        let mut by_station: Vec<Vec<Option<PanelZ>>> = vec![vec![None; N_PANELS_PER_STATION]; n_stations];
        for d in &desc.panels {
            if d.plane >= N_PLANES_PER_STATION || d.panel >= N_PANELS_PER_PLANE {
                return Err(TrackerError::PanelOutOfRange { station: d.station, plane: d.plane, panel: d.panel });
            }
            let pz = PanelZ::from_description(d)?;
            let slot = &mut by_station[d.station][pz.uid];
            if slot.is_some() {
                return Err(TrackerError::DuplicatePanel { station: d.station, plane: d.plane, panel: d.panel });
            }
            *slot = Some(pz);
        }

        let mut panels = Vec::with_capacity(n_stations);
        let mut location = Vec::with_capacity(n_stations);
        let mut station_z = Vec::with_capacity(n_stations);

        for (station, slots) in by_station.into_iter().enumerate() {
            let found = slots.iter().filter(|s| s.is_some()).count();
            if found == 0 {
                return Err(TrackerError::MissingStation(station));
            }
            if found != N_PANELS_PER_STATION {
                return Err(TrackerError::PanelCount { station, found, expected: N_PANELS_PER_STATION });
            }
            let mut station_panels: Vec<PanelZ> = slots.into_iter().flatten().collect();

            // a face is one (plane, panel parity) layer; faces are numbered in z order
            let mut groups: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
            for (i, p) in station_panels.iter().enumerate() {
                groups.entry((p.plane, p.panel % 2)).or_default().push(i);
            }
            let mut ordered: Vec<((usize, usize), Vec<usize>)> = groups.into_iter().collect();
            ordered.sort_by_key(|(key, members)| {
                let zsum: f64 = members.iter().map(|&i| station_panels[i].z).sum();
                (OrderedFloat(zsum / members.len() as f64), *key)
            });

            let mut loc = [(0usize, 0usize); N_PANELS_PER_STATION];
            for (face, (_, mut members)) in ordered.into_iter().enumerate() {
                members.sort_by_key(|&i| station_panels[i].panel);
                for (k, &i) in members.iter().enumerate() {
                    station_panels[i].face = face;
                    station_panels[i].panel_in_face = k;
                    loc[station_panels[i].uid] = (face, k);
                }
            }

            station_z.push(station_panels.iter().map(|p| p.z).sum::<f64>() / N_PANELS_PER_STATION as f64);

            let find = |f: usize, k: usize| {
                station_panels
                    .iter()
                    .find(|p| p.face == f && p.panel_in_face == k)
                    .cloned()
            };
            let mut faces: Vec<[PanelZ; N_PANELS_PER_FACE]> = Vec::with_capacity(N_FACES);
            for f in 0..N_FACES {
                let mut row = Vec::with_capacity(N_PANELS_PER_FACE);
                for k in 0..N_PANELS_PER_FACE {
                    row.push(find(f, k).ok_or(TrackerError::PanelCount {
                        station,
                        found,
                        expected: N_PANELS_PER_STATION,
                    })?);
                }
                faces.push(array::from_fn(|k| row[k].clone()));
            }
            panels.push(array::from_fn(|f| faces[f].clone()));
            location.push(loc);
        }

        let mut panel_overlap = [[[false; N_PANELS_PER_STATION]; N_PANELS_PER_STATION]; 2];
        let cos_max = MAX_OVERLAP_DPHI.cos();
        for parity in 0..2 {
            let station = if parity < n_stations { parity } else { 0 };
            let by_uid: Vec<&PanelZ> = {
                let mut v: Vec<&PanelZ> = panels[station].iter().flatten().collect();
                v.sort_by_key(|p| p.uid);
                v
            };
            for (a, b) in iproduct!(0..N_PANELS_PER_STATION, 0..N_PANELS_PER_STATION) {
                panel_overlap[parity][a][b] = by_uid[a].ndir.dot(&by_uid[b].ndir) > cos_max;
            }
        }

        Ok(TrackerGeometry {
            panels,
            location,
            panel_overlap,
            station_z,
            calo_disk_z: desc.calo_disk_z.clone(),
        })
    }

    #[inline]
    pub fn n_stations(&self) -> usize {
        self.panels.len()
    }

    #[inline]
    pub fn panel(&self, station: usize, face: usize, panel: usize) -> &PanelZ {
        &self.panels[station][face][panel]
    }

    #[inline]
    pub fn face_panels(&self, station: usize, face: usize) -> &[PanelZ; N_PANELS_PER_FACE] {
        &self.panels[station][face]
    }

    /// Z-ordered (face, panel) of a straw.
    pub fn locate(&self, id: &StrawId) -> Result<(usize, usize), TrackerError> {
        if id.station >= self.n_stations() || id.plane >= N_PLANES_PER_STATION || id.panel >= N_PANELS_PER_PLANE {
            return Err(TrackerError::PanelOutOfRange { station: id.station, plane: id.plane, panel: id.panel });
        }
        Ok(self.location[id.station][id.plane * N_PANELS_PER_PLANE + id.panel])
    }

    /// True if panels `uid1` and `uid2` of `station` can share a stereo seed.
    #[inline]
    pub fn panels_overlap(&self, station: usize, uid1: usize, uid2: usize) -> bool {
        self.panel_overlap[station % 2][uid1][uid2]
    }

    #[inline]
    pub fn station_z(&self, station: usize) -> f64 {
        self.station_z[station]
    }

    pub fn n_calo_disks(&self) -> usize {
        self.calo_disk_z.len()
    }

    /// Flight time (ns) of a particle with the given pitch from `station` to calorimeter `disk`.
    pub fn station_to_calo_tof(&self, disk: usize, station: usize, mean_pitch_angle: f64) -> Option<f64> {
        let zc = *self.calo_disk_z.get(disk)?;
        let zs = *self.station_z.get(station)?;
        let s = mean_pitch_angle.sin();
        if s <= 0.0 {
            return None;
        }
        Some((zc - zs) / s / C_LIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regular(n: usize) -> TrackerGeometry {
        TrackerGeometry::build(&TrackerDescription::regular(n)).unwrap()
    }

    #[test]
    fn test_faces_are_z_ordered() {
        let g = regular(3);
        for s in 0..3 {
            for f in 1..N_FACES {
                assert!(g.panel(s, f, 0).z > g.panel(s, f - 1, 0).z);
            }
            for f in 0..N_FACES {
                // all panels of a face share the face z and the panel parity
                let ps = g.face_panels(s, f);
                assert!(ps.iter().all(|p| p.panel % 2 == ps[0].panel % 2 && p.plane == ps[0].plane));
                assert!(ps.windows(2).all(|w| w[0].panel < w[1].panel));
            }
        }
    }

    #[test]
    fn test_locate_matches_panel() {
        let g = regular(2);
        for plane in 0..N_PLANES_PER_STATION {
            for panel in 0..N_PANELS_PER_PLANE {
                let id = StrawId::new(1, plane, panel, 0);
                let (f, p) = g.locate(&id).unwrap();
                let pz = g.panel(1, f, p);
                assert_eq!((pz.plane, pz.panel), (plane, panel));
            }
        }
        assert!(g.locate(&StrawId::new(2, 0, 0, 0)).is_err());
        assert!(g.locate(&StrawId::new(0, 0, 6, 0)).is_err());
    }

    #[test]
    fn test_panel_overlap() {
        let g = regular(2);
        let p0 = g.panel(0, 0, 0); // phi = 0
        let mut n_overlapping = 0;
        for p in g.face_panels(0, 1) {
            let expected = p0.ndir.dot(&p.ndir) > -0.5;
            assert_eq!(g.panels_overlap(0, p0.uid, p.uid), expected);
            if expected {
                n_overlapping += 1;
            }
        }
        assert_eq!(n_overlapping, 2);
        // opposite panels never overlap
        let opposite = g.face_panels(0, 1).iter().find(|p| p0.ndir.dot(&p.ndir) < -0.99).unwrap();
        assert!(!g.panels_overlap(1, p0.uid, opposite.uid));
    }

    #[test]
    fn test_malformed_description() {
        let mut d = TrackerDescription::regular(2);
        d.panels.pop();
        assert!(matches!(TrackerGeometry::build(&d), Err(TrackerError::PanelCount { station: 1, .. })));

        let mut d = TrackerDescription::regular(1);
        d.panels[3].wire_dir = [0.0, 0.0];
        assert!(matches!(TrackerGeometry::build(&d), Err(TrackerError::DegenerateVector { .. })));

        let mut d = TrackerDescription::regular(3);
        d.panels.retain(|p| p.station != 1);
        assert_eq!(TrackerGeometry::build(&d).unwrap_err(), TrackerError::MissingStation(1));

        assert_eq!(TrackerGeometry::build(&TrackerDescription::default()).unwrap_err(), TrackerError::Empty);
    }

    #[test]
    fn test_calo_tof() {
        let g = regular(2);
        let tof0 = g.station_to_calo_tof(0, 0, 0.67).unwrap();
        let tof1 = g.station_to_calo_tof(0, 1, 0.67).unwrap();
        assert!(tof0 > tof1 && tof1 > 0.0);
        assert!(g.station_to_calo_tof(5, 0, 0.67).is_none());
    }
}
