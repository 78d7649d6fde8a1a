//! Serializable tracker layout as delivered by the geometry service.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::tracker::geometry::{N_PANELS_PER_PLANE, N_PLANES_PER_STATION};

/// One panel of the tracker, in tracker coordinates (mm).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PanelDescription {
    pub station: usize,
    pub plane: usize,
    pub panel: usize,
    /// Panel center; x/y give the radial direction, z the panel position along the axis.
    pub center: [f64; 3],
    /// Straw direction in the transverse plane (normalized on build).
    pub wire_dir: [f64; 2],
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerDescription {
    pub panels: Vec<PanelDescription>,
    /// z positions of the calorimeter disks (mm), used for hit-to-calorimeter flight times.
    #[serde(default)]
    pub calo_disk_z: Vec<f64>,
}

/// Knobs of the regular synthetic tracker layout.
#[derive(Clone, Debug)]
pub struct RegularTrackerOpts {
    pub n_stations: usize,
    /// z of the first station center (mm).
    pub first_station_z: f64,
    /// distance between station centers (mm).
    pub station_pitch: f64,
    /// distance between the two planes of a station (mm).
    pub plane_separation: f64,
    /// distance between the two faces of a plane (mm).
    pub face_separation: f64,
    /// radius of the panel centers (mm).
    pub panel_radius: f64,
    /// rotation of the second plane with respect to the first (rad).
    pub plane_rotation: f64,
    /// extra rotation applied to odd stations (rad).
    pub odd_station_rotation: f64,
    pub calo_disk_z: Vec<f64>,
}

impl Default for RegularTrackerOpts {
    fn default() -> Self {
        Self {
            n_stations: 18,
            first_station_z: -1445.0,
            station_pitch: 170.0,
            plane_separation: 40.0,
            face_separation: 10.0,
            panel_radius: 540.0,
            plane_rotation: PI / 6.0,      // 30 deg
            odd_station_rotation: 0.0,
            calo_disk_z: vec![1940.0, 2640.0],
        }
    }
}

impl TrackerDescription {
    /// Regular layout with `n_stations` stations and default spacing.
    pub fn regular(n_stations: usize) -> Self {
        Self::regular_with(&RegularTrackerOpts { n_stations, ..Default::default() })
    }

    /// Regular layout: panels of a plane 60 deg apart, straws tangential to the panel circle.
    pub fn regular_with(opts: &RegularTrackerOpts) -> Self {
        let mut panels = Vec::with_capacity(opts.n_stations * N_PLANES_PER_STATION * N_PANELS_PER_PLANE);
        for station in 0..opts.n_stations {
            let z_station = opts.first_station_z + station as f64 * opts.station_pitch;
            let station_rot = if station % 2 == 1 { opts.odd_station_rotation } else { 0.0 };
            for plane in 0..N_PLANES_PER_STATION {
                let z_plane = z_station + (plane as f64 - 0.5) * opts.plane_separation;
                for panel in 0..N_PANELS_PER_PLANE {
                    let phi = station_rot + plane as f64 * opts.plane_rotation + panel as f64 * PI / 3.0;
                    let z = z_plane + ((panel % 2) as f64 - 0.5) * opts.face_separation;
                    panels.push(PanelDescription {
                        station,
                        plane,
                        panel,
                        center: [opts.panel_radius * phi.cos(), opts.panel_radius * phi.sin(), z],
                        wire_dir: [-phi.sin(), phi.cos()],
                    });
                }
            }
        }
        TrackerDescription { panels, calo_disk_z: opts.calo_disk_z.clone() }
    }

    pub fn n_stations(&self) -> usize {
        self.panels.iter().map(|p| p.station + 1).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_layout() {
        let d = TrackerDescription::regular(4);
        assert_eq!(d.panels.len(), 4 * 12);
        assert_eq!(d.n_stations(), 4);
        for p in &d.panels {
            let r = (p.center[0].powi(2) + p.center[1].powi(2)).sqrt();
            assert!((r - 540.0).abs() < 1e-9);
            // straws are perpendicular to the radial direction
            let dot = p.center[0] * p.wire_dir[0] + p.center[1] * p.wire_dir[1];
            assert!(dot.abs() < 1e-9);
        }
    }

    #[test]
    fn test_description_json_roundtrip() {
        let d = TrackerDescription::regular(1);
        let s = serde_json::to_string(&d).unwrap();
        let back: TrackerDescription = serde_json::from_str(&s).unwrap();
        assert_eq!(back.panels.len(), 12);
        assert_eq!(back.calo_disk_z, d.calo_disk_z);
    }
}
