use serde::{Deserialize, Serialize};

/// A calorimeter cluster time used to gate tracker hits.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimePeak {
    /// Calorimeter cluster time (ns).
    pub time: f64,
    /// Calorimeter disk which registered the cluster.
    pub disk: usize,
}
