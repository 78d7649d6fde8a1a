use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use trkcore::data::combo_hit::ComboHit;
use trkcore::data::time_peak::TimePeak;
use trkcore::tracker::description::TrackerDescription;
use trkcore::tracker::geometry::TrackerGeometry;

use crate::delta::config::DeltaFinderConfig;
use crate::delta::output::DeltaFinderOutput;
use crate::error::{DeltaFinderError, Result};

/// Input collections of one event. A collection missing from the file stays
/// `None` and makes the event fail, an empty one is fine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub event: u64,
    #[serde(default)]
    pub combo_hits: Option<Vec<ComboHit>>,
    #[serde(default)]
    pub n_straw_hits: Option<usize>,
    #[serde(default)]
    pub time_peaks: Option<Vec<TimePeak>>,
}

impl EventData {
    /// Event with all collections present; the straw hit count is taken from the hits.
    pub fn from_hits(event: u64, combo_hits: Vec<ComboHit>) -> Self {
        let n_straw_hits = combo_hits
            .iter()
            .flat_map(|h| h.straw_hit_indices.iter().map(|&i| i + 1))
            .max()
            .unwrap_or(0);
        EventData { event, combo_hits: Some(combo_hits), n_straw_hits: Some(n_straw_hits), time_peaks: Some(Vec::new()) }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventFile {
    pub version: u32,
    pub events: Vec<EventData>,
}

pub const EVENT_FILE_VERSION: u32 = 1;

pub fn save_json<T: Serialize, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

pub fn save_events<P: AsRef<Path>>(path: P, events: &[EventData]) -> Result<()> {
    save_json(path, &EventFile { version: EVENT_FILE_VERSION, events: events.to_vec() })
}

pub fn load_events<P: AsRef<Path>>(path: P) -> Result<Vec<EventData>> {
    let file: EventFile = load_json(path)?;
    if file.version != EVENT_FILE_VERSION {
        return Err(DeltaFinderError::EventFileVersion { found: file.version, expected: EVENT_FILE_VERSION });
    }
    Ok(file.events)
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<DeltaFinderConfig> {
    load_json(path)
}

pub fn load_geometry<P: AsRef<Path>>(path: P) -> Result<TrackerGeometry> {
    let desc: TrackerDescription = load_json(path)?;
    Ok(TrackerGeometry::build(&desc)?)
}

pub fn save_outputs<P: AsRef<Path>>(path: P, outputs: &[DeltaFinderOutput]) -> Result<()> {
    save_json(path, &outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("deltafinder_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_missing_collections_stay_none() {
        let ev: EventData = serde_json::from_str(r#"{"event": 3, "n_straw_hits": 0}"#).unwrap();
        assert_eq!(ev.event, 3);
        assert!(ev.combo_hits.is_none());
        assert!(ev.time_peaks.is_none());
        assert_eq!(ev.n_straw_hits, Some(0));
    }

    #[test]
    fn test_events_file() {
        let path = tmp_path("events.json");
        let events = vec![EventData::from_hits(1, Vec::new()), EventData { event: 2, ..Default::default() }];
        save_events(&path, &events).unwrap();
        let back = load_events(&path).unwrap();
        assert_eq!(back, events);

        save_json(&path, &EventFile { version: EVENT_FILE_VERSION + 1, events }).unwrap();
        assert!(matches!(
            load_events(&path),
            Err(DeltaFinderError::EventFileVersion { found, .. }) if found == EVENT_FILE_VERSION + 1
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_geometry_file() {
        let path = tmp_path("geometry.json");
        save_json(&path, &TrackerDescription::regular(2)).unwrap();
        let geom = load_geometry(&path).unwrap();
        assert_eq!(geom.n_stations(), 2);

        save_json(&path, &TrackerDescription::default()).unwrap();
        assert!(matches!(load_geometry(&path), Err(DeltaFinderError::Tracker(_))));
        std::fs::remove_file(&path).ok();

        assert!(matches!(load_config(tmp_path("does_not_exist.json")), Err(DeltaFinderError::Io(_))));
    }
}
