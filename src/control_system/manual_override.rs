use crate::control_system::phase_scheduler::PhaseScheduler;
use crate::hardware::command_channel::Command;
use crate::shared_data::{Axis, ControlMode, Lane, LightColor, LightStatus};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Instant;

/// Operator requests. They are routed into the controller worker as
/// messages; nothing outside the worker touches the lights directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorCommand {
    ForceRedAll,
    ResumeAuto,
}

impl FromStr for OperatorCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "force-red" | "force_red_all" | "red" => Ok(OperatorCommand::ForceRedAll),
            "auto" | "resume_auto" | "resume" => Ok(OperatorCommand::ResumeAuto),
            other => Err(format!("unknown operator command '{}'", other)),
        }
    }
}

/// Tracks whether the operator is holding the intersection all-red.
///
/// While forced red, automatic scheduling and the safety check are
/// suspended and the cycle state is left as it was. Resuming always starts
/// over from the initial condition, so a stale expired phase can never
/// re-assert green on its own.
#[derive(Debug, Clone)]
pub struct ManualOverride {
    mode: ControlMode,
}

impl Default for ManualOverride {
    fn default() -> Self {
        Self {
            mode: ControlMode::Auto,
        }
    }
}

impl ManualOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn is_forced_red(&self) -> bool {
        self.mode == ControlMode::ForcedRed
    }

    pub fn force_red_all(&mut self) -> [Command; 2] {
        self.mode = ControlMode::ForcedRed;
        [
            Command::for_axis(Axis::EW, LightColor::Red),
            Command::for_axis(Axis::NS, LightColor::Red),
        ]
    }

    pub fn resume_auto(&mut self, scheduler: &mut PhaseScheduler, now: Instant) -> [Command; 2] {
        self.mode = ControlMode::Auto;
        scheduler.reset(now);
        [
            Command::for_axis(Axis::EW, LightColor::Green),
            Command::for_axis(Axis::NS, LightColor::Red),
        ]
    }

    /// What the lights should be showing right now.
    pub fn light_statuses(&self, scheduler: &PhaseScheduler, now: Instant) -> [LightStatus; 4] {
        match self.mode {
            ControlMode::Auto => scheduler.light_statuses(now),
            ControlMode::ForcedRed => Lane::ALL.map(|lane| LightStatus {
                lane,
                color: LightColor::Red,
                remaining_secs: 0.0,
            }),
        }
    }
}
