use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::data::hit_flag::HitFlag;

/// Location of a straw in the tracker numbering scheme.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrawId {
    pub station: usize,
    pub plane: usize,     // plane within the station, 0..2
    pub panel: usize,     // panel within the plane, 0..6
    #[serde(default)]
    pub straw: usize,
}

impl StrawId {
    pub fn new(station: usize, plane: usize, panel: usize, straw: usize) -> Self {
        StrawId { station, plane, panel, straw }
    }
}

/// A reconstructed tracker hit, possibly combining several straw hits of one panel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComboHit {
    pub straw_id: StrawId,
    /// Measured time (ns).
    pub time: f64,
    /// Time corrected for propagation along the wire (ns).
    pub corrected_time: f64,
    /// Deposited energy (MeV).
    pub edep: f64,
    /// Position; x/y are the transverse coordinates, z along the tracker axis (mm).
    pub pos: Vector3<f64>,
    /// Position resolution along the wire (mm).
    pub wire_res: f64,
    #[serde(default)]
    pub flag: HitFlag,
    /// Indices of the straw hits this combo hit was built from.
    #[serde(default)]
    pub straw_hit_indices: Vec<usize>,
}

impl ComboHit {
    #[inline]
    pub fn xy(&self) -> Vector2<f64> {
        Vector2::new(self.pos.x, self.pos.y)
    }

    /// Variance of the position along the wire.
    #[inline]
    pub fn sig_w2(&self) -> f64 {
        self.wire_res * self.wire_res
    }

    #[inline]
    pub fn n_straw_hits(&self) -> usize {
        self.straw_hit_indices.len().max(1)
    }
}
