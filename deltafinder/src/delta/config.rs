use serde::{Deserialize, Serialize};
use trkcore::data::hit_flag::HitFlag;

use crate::error::{DeltaFinderError, Result};

/// All knobs of the delta finder. Times in ns, distances in mm, energies in MeV.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DeltaFinderConfig {
    // ---- ingestion ----
    pub test_hit_mask: bool,
    /// flag names a hit must carry, all of them
    pub good_hit_mask: Vec<String>,
    /// flag names a hit must not carry, any of them
    pub bkg_hit_mask: Vec<String>,
    pub min_hit_time: f64,
    pub max_hit_time: f64,

    // ---- calorimeter time peak gate ----
    pub use_time_peaks: bool,
    pub min_calo_dt: f64,
    pub max_calo_dt: f64,
    pub mean_pitch_angle: f64, // rad

    // ---- seeding ----
    pub max_drift_time: f64,
    pub max_chi2_seed: f64,
    pub max_chi2_radial: f64,
    pub max_chi2_all: f64,
    pub max_hit_seed_dt: f64,
    pub seed_res: f64,
    pub sigma_r: f64,
    pub max_seed_edep: f64,
    pub min_proton_seed_edep: f64,
    pub update_seed_cog: bool,

    // ---- chaining ----
    pub max_seed_dt: f64,
    pub max_hit_dt: f64,
    pub max_dt_ds: f64,
    pub max_dt_dc: f64,
    pub max_gap: usize,
    pub max_chi2_seed_delta: f64,
    pub max_dxy: f64,
    pub min_n_seeds: usize,

    // ---- output ----
    pub min_delta_n_hits: usize,
    pub max_delta_edep: f64,

    pub print_errors: bool,
}

impl Default for DeltaFinderConfig {
    fn default() -> Self {
        Self {
            test_hit_mask: true,
            good_hit_mask: Vec::new(),
            bkg_hit_mask: Vec::new(),
            min_hit_time: 500.0,
            max_hit_time: 2000.0,

            use_time_peaks: false,
            min_calo_dt: -50.0,
            max_calo_dt: 100.0,
            mean_pitch_angle: 0.67,

            max_drift_time: 40.0,
            max_chi2_seed: 16.0,
            max_chi2_radial: 16.0,
            max_chi2_all: 16.0,
            max_hit_seed_dt: 50.0,
            seed_res: 5.0,
            sigma_r: 10.0,
            max_seed_edep: 0.005,         // 5 keV per hit
            min_proton_seed_edep: 0.003,  // 3 keV per hit
            update_seed_cog: false,

            max_seed_dt: 50.0,
            max_hit_dt: 50.0,
            max_dt_ds: 10.0,
            max_dt_dc: 50.0,
            max_gap: 2,
            max_chi2_seed_delta: 25.0,
            max_dxy: 40.0,
            min_n_seeds: 2,

            min_delta_n_hits: 5,
            max_delta_edep: 0.005,

            print_errors: false,
        }
    }
}

/// Flag masks resolved from their names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HitMasks {
    pub good: HitFlag,
    pub bkg: HitFlag,
}

impl HitMasks {
    /// true if `flag` passes the quality gate
    #[inline]
    pub fn accepts(&self, flag: HitFlag) -> bool {
        flag.has_all_properties(self.good) && !flag.has_any_property(self.bkg)
    }
}

impl DeltaFinderConfig {
    #[inline]
    pub fn sigma_r2(&self) -> f64 {
        self.sigma_r * self.sigma_r
    }

    #[inline]
    pub fn seed_res2(&self) -> f64 {
        self.seed_res * self.seed_res
    }

    pub fn masks(&self) -> Result<HitMasks> {
        Ok(HitMasks {
            good: HitFlag::from_names(&self.good_hit_mask)?,
            bkg: HitFlag::from_names(&self.bkg_hit_mask)?,
        })
    }

    /// Reject settings the finder cannot work with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("seed_res", self.seed_res),
            ("sigma_r", self.sigma_r),
            ("max_dxy", self.max_dxy),
            ("max_chi2_seed", self.max_chi2_seed),
            ("max_chi2_radial", self.max_chi2_radial),
            ("max_chi2_all", self.max_chi2_all),
            ("max_chi2_seed_delta", self.max_chi2_seed_delta),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(DeltaFinderError::InvalidConfig(format!("{name} must be positive, got {value}")));
            }
        }
        let non_negative = [
            ("max_drift_time", self.max_drift_time),
            ("max_hit_seed_dt", self.max_hit_seed_dt),
            ("max_seed_dt", self.max_seed_dt),
            ("max_hit_dt", self.max_hit_dt),
            ("max_dt_ds", self.max_dt_ds),
            ("max_dt_dc", self.max_dt_dc),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                return Err(DeltaFinderError::InvalidConfig(format!("{name} must not be negative, got {value}")));
            }
        }
        if self.min_n_seeds == 0 {
            return Err(DeltaFinderError::InvalidConfig("min_n_seeds must be at least 1".to_string()));
        }
        if self.min_hit_time > self.max_hit_time {
            return Err(DeltaFinderError::InvalidConfig(format!(
                "hit time window is inverted: [{}, {}]",
                self.min_hit_time, self.max_hit_time
            )));
        }
        if self.use_time_peaks && self.min_calo_dt > self.max_calo_dt {
            return Err(DeltaFinderError::InvalidConfig(format!(
                "calorimeter time window is inverted: [{}, {}]",
                self.min_calo_dt, self.max_calo_dt
            )));
        }
        if self.use_time_peaks && !(self.mean_pitch_angle > 0.0) {
            return Err(DeltaFinderError::InvalidConfig("mean_pitch_angle must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let cfg = DeltaFinderConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.masks().unwrap(), HitMasks::default());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: DeltaFinderConfig =
            serde_json::from_str(r#"{"max_gap": 1, "good_hit_mask": ["EnergySelection"]}"#).unwrap();
        assert_eq!(cfg.max_gap, 1);
        assert_eq!(cfg.min_n_seeds, 2);
        let masks = cfg.masks().unwrap();
        assert!(masks.accepts(HitFlag::ENERGY_SEL.merged(HitFlag::STEREO)));
        assert!(!masks.accepts(HitFlag::STEREO));
    }

    #[test]
    fn test_validate_rejects() {
        let cfg = DeltaFinderConfig { sigma_r: 0.0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(DeltaFinderError::InvalidConfig(_))));

        let cfg = DeltaFinderConfig { min_n_seeds: 0, ..Default::default() };
        assert!(cfg.validate().is_err());

        let cfg = DeltaFinderConfig { min_hit_time: 10.0, max_hit_time: 5.0, ..Default::default() };
        assert!(cfg.validate().is_err());

        let cfg = DeltaFinderConfig { bkg_hit_mask: vec!["Bogus".into()], ..Default::default() };
        assert!(matches!(cfg.masks(), Err(DeltaFinderError::Tracker(_))));
    }
}
