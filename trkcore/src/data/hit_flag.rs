use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

/// Bit mask of hit quality / classification properties.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HitFlag(pub u32);

impl HitFlag {
    pub const STEREO: HitFlag = HitFlag(1 << 0);
    pub const PANEL_COMBO: HitFlag = HitFlag(1 << 1);
    pub const TDIV: HitFlag = HitFlag(1 << 2);
    pub const ENERGY_SEL: HitFlag = HitFlag(1 << 3);
    pub const RAD_SEL: HitFlag = HitFlag(1 << 4);
    pub const TIME_SEL: HitFlag = HitFlag(1 << 5);
    pub const ISOLATED: HitFlag = HitFlag(1 << 6);
    pub const BKG: HitFlag = HitFlag(1 << 7);
    pub const BKG_CLUSTER: HitFlag = HitFlag(1 << 8);
    pub const CALO_SEL: HitFlag = HitFlag(1 << 9);
    pub const ACTIVE: HitFlag = HitFlag(1 << 10);
    pub const DEAD: HitFlag = HitFlag(1 << 11);
    pub const NOISE: HitFlag = HitFlag(1 << 12);

    /// (name, flag) pairs accepted by [`HitFlag::from_str`].
    pub const NAMES: [(&'static str, HitFlag); 13] = [
        ("Stereo", HitFlag::STEREO),
        ("PanelCombo", HitFlag::PANEL_COMBO),
        ("TimeDivision", HitFlag::TDIV),
        ("EnergySelection", HitFlag::ENERGY_SEL),
        ("RadiusSelection", HitFlag::RAD_SEL),
        ("TimeSelection", HitFlag::TIME_SEL),
        ("Isolated", HitFlag::ISOLATED),
        ("Background", HitFlag::BKG),
        ("BackgroundCluster", HitFlag::BKG_CLUSTER),
        ("CaloSelection", HitFlag::CALO_SEL),
        ("Active", HitFlag::ACTIVE),
        ("Dead", HitFlag::DEAD),
        ("Noise", HitFlag::NOISE),
    ];

    #[inline]
    pub fn empty() -> Self {
        HitFlag(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn has_all_properties(&self, mask: HitFlag) -> bool {
        self.0 & mask.0 == mask.0
    }

    #[inline]
    pub fn has_any_property(&self, mask: HitFlag) -> bool {
        self.0 & mask.0 != 0
    }

    #[inline]
    pub fn merge(&mut self, other: HitFlag) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn merged(self, other: HitFlag) -> HitFlag {
        HitFlag(self.0 | other.0)
    }

    /// Combine a list of flag names into one mask. An empty list gives an empty mask.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<HitFlag, TrackerError> {
        let mut mask = HitFlag::empty();
        for name in names {
            mask.merge(name.as_ref().parse()?);
        }
        Ok(mask)
    }
}

impl FromStr for HitFlag {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        HitFlag::NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|&(_, flag)| flag)
            .ok_or_else(|| TrackerError::UnknownFlag(s.to_string()))
    }
}

impl fmt::Display for HitFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = HitFlag::NAMES
            .iter()
            .filter(|(_, flag)| self.has_all_properties(*flag))
            .map(|(name, _)| *name)
            .collect();
        write!(f, "[{}]", names.join(","))
    }
}
