// src/shared_data.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// One of the two opposing directions that turn green together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    EW,
    NS,
}

impl Axis {
    pub fn opposite(self) -> Self {
        match self {
            Axis::EW => Axis::NS,
            Axis::NS => Axis::EW,
        }
    }

    /// The paired light groups wired to this axis.
    pub fn lanes(self) -> (Lane, Lane) {
        match self {
            Axis::EW => (Lane::S1, Lane::S4),
            Axis::NS => (Lane::S2, Lane::S3),
        }
    }

    /// The busiest single approach on this axis.
    pub fn max_count(self, counts: &SampleCounts) -> u32 {
        match self {
            Axis::EW => counts.east.max(counts.west),
            Axis::NS => counts.north.max(counts.south),
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Axis::EW => 0,
            Axis::NS => 1,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Axis::EW => write!(f, "E-W"),
            Axis::NS => write!(f, "N-S"),
        }
    }
}

/// A physically addressable light group on the hardware board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lane {
    S1,
    S2,
    S3,
    S4,
}

impl Lane {
    pub const ALL: [Lane; 4] = [Lane::S1, Lane::S2, Lane::S3, Lane::S4];

    pub fn axis(self) -> Axis {
        match self {
            Lane::S1 | Lane::S4 => Axis::EW,
            Lane::S2 | Lane::S3 => Axis::NS,
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            Lane::S1 => "S1",
            Lane::S2 => "S2",
            Lane::S3 => "S3",
            Lane::S4 => "S4",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightColor {
    Green,
    Red,
}

impl LightColor {
    pub fn wire_name(self) -> &'static str {
        match self {
            LightColor::Green => "GREEN",
            LightColor::Red => "RED",
        }
    }
}

impl fmt::Display for LightColor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Vehicle counts per approach, delivered once per tick by the perception side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCounts {
    #[serde(default)]
    pub north: u32,
    #[serde(default)]
    pub south: u32,
    #[serde(default)]
    pub east: u32,
    #[serde(default)]
    pub west: u32,
}

impl SampleCounts {
    pub fn new(north: u32, south: u32, east: u32, west: u32) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    /// Widened so two full `u32` approaches cannot overflow.
    pub fn ns_total(&self) -> u64 {
        u64::from(self.north) + u64::from(self.south)
    }

    pub fn ew_total(&self) -> u64 {
        u64::from(self.east) + u64::from(self.west)
    }
}

/// Whether the worker is cycling automatically or held all-red by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    Auto,
    ForcedRed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LightStatus {
    pub lane: Lane,
    pub color: LightColor,
    pub remaining_secs: f64,
}

/// A copy of the controller state taken at emission time. Presentation code
/// only ever sees these, never the worker's live state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerSnapshot {
    pub timestamp: u64,
    pub counts: SampleCounts,
    pub ns_total: u64,
    pub ew_total: u64,
    pub mode: ControlMode,
    pub lights: [LightStatus; 4],
}

/// Everything the worker sends to the presentation side.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Snapshot(ControllerSnapshot),
    Log(String),
}

pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
