//! Running least-squares sums for the point closest to a set of wire lines.
//!
//! A hit at `p` on a wire with unit direction `w` constrains the center `c` to
//! the line `(c - p) x w = 0`. With `nr = p.x*w.y - p.y*w.x` the sums below give
//! the 2x2 normal equations; sums of independent groups simply add.

use std::ops::{Add, AddAssign};

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WireSums {
    pub snx2: f64,
    pub snxy: f64,
    pub sny2: f64,
    pub snxr: f64,
    pub snyr: f64,
}

impl WireSums {
    #[inline]
    pub fn from_wire(pos: &Vector2<f64>, wdir: &Vector2<f64>) -> Self {
        let nr = pos.x * wdir.y - pos.y * wdir.x;
        WireSums {
            snx2: wdir.x * wdir.x,
            snxy: wdir.x * wdir.y,
            sny2: wdir.y * wdir.y,
            snxr: wdir.x * nr,
            snyr: wdir.y * nr,
        }
    }

    #[inline]
    pub fn add_wire(&mut self, pos: &Vector2<f64>, wdir: &Vector2<f64>) {
        *self += WireSums::from_wire(pos, wdir);
    }

    /// Least-squares center, `None` when all wires are (nearly) parallel.
    pub fn center(&self) -> Option<Vector2<f64>> {
        let d = self.snx2 * self.sny2 - self.snxy * self.snxy;
        let scale = self.snx2 + self.sny2;
        if scale <= 0.0 || d.abs() <= 1e-9 * scale * scale {
            return None;
        }
        let xc = (self.snyr * self.snx2 - self.snxr * self.snxy) / d;
        let yc = (self.snyr * self.snxy - self.snxr * self.sny2) / d;
        Some(Vector2::new(xc, yc))
    }
}

impl Add for WireSums {
    type Output = WireSums;

    fn add(self, o: WireSums) -> WireSums {
        WireSums {
            snx2: self.snx2 + o.snx2,
            snxy: self.snxy + o.snxy,
            sny2: self.sny2 + o.sny2,
            snxr: self.snxr + o.snxr,
            snyr: self.snyr + o.snyr,
        }
    }
}

impl AddAssign for WireSums {
    fn add_assign(&mut self, o: WireSums) {
        *self = *self + o;
    }
}
