use crate::control_system::manual_override::OperatorCommand;
use crate::shared_data::SampleCounts;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc::{self, error::TryRecvError};

/// Result of asking the perception side for this tick's counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplePoll {
    Fresh(SampleCounts),
    /// Nothing new this tick; the controller keeps the last known counts.
    Pending,
    /// The feed has ended for good.
    Closed,
}

pub trait SampleSource {
    fn poll(&mut self) -> SamplePoll;
}

/// Counts pushed by another task (the stdin reader in the binary). Several
/// samples queued since the last tick collapse to the newest one.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<SampleCounts>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<SampleCounts>) -> Self {
        Self { rx }
    }
}

impl SampleSource for ChannelSource {
    fn poll(&mut self) -> SamplePoll {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(counts) => latest = Some(counts),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if latest.is_none() {
                        return SamplePoll::Closed;
                    }
                    break;
                }
            }
        }
        latest.map_or(SamplePoll::Pending, SamplePoll::Fresh)
    }
}

/// Synthetic traffic for running the controller without a camera.
#[derive(Debug)]
pub struct RandomSource {
    rng: SmallRng,
    max_per_approach: u32,
}

impl RandomSource {
    pub fn new(max_per_approach: u32) -> Self {
        Self {
            rng: SmallRng::from_rng(&mut rand::rng()),
            max_per_approach,
        }
    }

    pub fn seeded(seed: u64, max_per_approach: u32) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            max_per_approach,
        }
    }
}

impl SampleSource for RandomSource {
    fn poll(&mut self) -> SamplePoll {
        let max = self.max_per_approach;
        SamplePoll::Fresh(SampleCounts {
            north: self.rng.random_range(0..=max),
            south: self.rng.random_range(0..=max),
            east: self.rng.random_range(0..=max),
            west: self.rng.random_range(0..=max),
        })
    }
}

/// One line of controller input: either a JSON sample or an operator word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLine {
    Sample(SampleCounts),
    Operator(OperatorCommand),
}

pub fn parse_input_line(line: &str) -> Result<InputLine, String> {
    let line = line.trim();
    if line.starts_with('{') {
        return serde_json::from_str::<SampleCounts>(line)
            .map(InputLine::Sample)
            .map_err(|e| format!("bad sample '{}': {}", line, e));
    }
    line.parse::<OperatorCommand>().map(InputLine::Operator)
}
