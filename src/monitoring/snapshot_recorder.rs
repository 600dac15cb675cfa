use crate::shared_data::{ControlMode, ControllerSnapshot, LightColor};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Flat CSV row for one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub timestamp: u64,
    pub mode: ControlMode,
    pub north: u32,
    pub south: u32,
    pub east: u32,
    pub west: u32,
    pub ns_total: u64,
    pub ew_total: u64,
    pub s1: LightColor,
    pub s1_remaining: u64,
    pub s2: LightColor,
    pub s2_remaining: u64,
    pub s3: LightColor,
    pub s3_remaining: u64,
    pub s4: LightColor,
    pub s4_remaining: u64,
}

impl From<&ControllerSnapshot> for SnapshotRecord {
    fn from(s: &ControllerSnapshot) -> Self {
        let [s1, s2, s3, s4] = s.lights;
        Self {
            timestamp: s.timestamp,
            mode: s.mode,
            north: s.counts.north,
            south: s.counts.south,
            east: s.counts.east,
            west: s.counts.west,
            ns_total: s.ns_total,
            ew_total: s.ew_total,
            s1: s1.color,
            s1_remaining: s1.remaining_secs.ceil() as u64,
            s2: s2.color,
            s2_remaining: s2.remaining_secs.ceil() as u64,
            s3: s3.color,
            s3_remaining: s3.remaining_secs.ceil() as u64,
            s4: s4.color,
            s4_remaining: s4.remaining_secs.ceil() as u64,
        }
    }
}

/// Appends a row to a CSV file whenever the lights or the mode change.
pub struct SnapshotRecorder {
    writer: csv::Writer<File>,
    last: Option<(ControlMode, [LightColor; 4])>,
}

impl SnapshotRecorder {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, csv::Error> {
        let path = path.as_ref();
        let file_exists = path.exists();
        let file = OpenOptions::new().append(true).create(true).open(path)?;
        let writer = csv::WriterBuilder::new()
            .has_headers(!file_exists)
            .from_writer(file);
        Ok(Self { writer, last: None })
    }

    /// Returns whether a row was written.
    pub fn record(&mut self, snapshot: &ControllerSnapshot) -> Result<bool, csv::Error> {
        let key = (snapshot.mode, snapshot.lights.map(|l| l.color));
        if self.last == Some(key) {
            return Ok(false);
        }
        self.writer.serialize(SnapshotRecord::from(snapshot))?;
        self.writer.flush()?;
        self.last = Some(key);
        Ok(true)
    }
}

/// Reads back every row of a recorder file.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<SnapshotRecord>, csv::Error> {
    let mut rdr = csv::Reader::from_path(path)?;
    rdr.deserialize().collect()
}
