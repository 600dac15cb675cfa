use crate::control_system::direction_scorer::score_axis;
use crate::global_variables::BASE_GREEN_SECS;
use crate::hardware::command_channel::Command;
use crate::shared_data::{Axis, Lane, LightColor, LightStatus, SampleCounts};
use std::time::{Duration, Instant};

/// Color, start and allotted time shared by both lights of one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisPhase {
    pub color: LightColor,
    pub started_at: Instant,
    pub duration_secs: u64,
}

impl AxisPhase {
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.elapsed(now) >= Duration::from_secs(self.duration_secs)
    }

    /// Seconds left on a green phase; red lights always report zero.
    pub fn remaining_secs(&self, now: Instant) -> f64 {
        match self.color {
            LightColor::Green => {
                (self.duration_secs as f64 - self.elapsed(now).as_secs_f64()).max(0.0)
            }
            LightColor::Red => 0.0,
        }
    }
}

/// Software-side view of the intersection. Phases are stored per axis, so
/// the two lights of a pair can never disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleState {
    active: Axis,
    phases: [AxisPhase; 2],
}

impl CycleState {
    /// EW green for the base time, NS red.
    pub fn new(now: Instant) -> Self {
        let mut state = Self {
            active: Axis::EW,
            phases: [AxisPhase {
                color: LightColor::Red,
                started_at: now,
                duration_secs: BASE_GREEN_SECS,
            }; 2],
        };
        state.start_phase(Axis::EW, BASE_GREEN_SECS, now);
        state
    }

    pub fn active(&self) -> Axis {
        self.active
    }

    pub fn phase(&self, axis: Axis) -> &AxisPhase {
        &self.phases[axis.index()]
    }

    fn phase_mut(&mut self, axis: Axis) -> &mut AxisPhase {
        &mut self.phases[axis.index()]
    }

    pub fn green_axes(&self) -> usize {
        self.phases
            .iter()
            .filter(|p| p.color == LightColor::Green)
            .count()
    }

    /// Makes `axis` green from `now` for `duration_secs` and turns the other
    /// axis red. The other axis keeps its last start and duration.
    pub(crate) fn start_phase(&mut self, axis: Axis, duration_secs: u64, now: Instant) {
        self.active = axis;
        let phase = self.phase_mut(axis);
        phase.color = LightColor::Green;
        phase.started_at = now;
        phase.duration_secs = duration_secs;
        self.phase_mut(axis.opposite()).color = LightColor::Red;
    }

    /// Overwrites a color without any transition logic. Only corruption
    /// recovery paths and their tests go through here.
    pub(crate) fn set_color(&mut self, axis: Axis, color: LightColor) {
        self.phase_mut(axis).color = color;
    }

    pub fn light_status(&self, lane: Lane, now: Instant) -> LightStatus {
        let phase = self.phase(lane.axis());
        LightStatus {
            lane,
            color: phase.color,
            remaining_secs: phase.remaining_secs(now),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extension {
    pub axis: Axis,
    pub from_secs: u64,
    pub to_secs: u64,
}

/// An automatic axis change. `commands` go out in order: old axis RED first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSwitch {
    pub from: Axis,
    pub to: Axis,
    pub duration_secs: u64,
    pub commands: [Command; 2],
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub extension: Option<Extension>,
    pub switch: Option<PhaseSwitch>,
}

/// Extend-or-switch state machine over `CycleState`.
#[derive(Debug, Clone)]
pub struct PhaseScheduler {
    state: CycleState,
}

impl PhaseScheduler {
    pub fn new(now: Instant) -> Self {
        Self {
            state: CycleState::new(now),
        }
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut CycleState {
        &mut self.state
    }

    pub fn active_axis(&self) -> Axis {
        self.state.active()
    }

    pub fn active_duration_secs(&self) -> u64 {
        self.state.phase(self.state.active()).duration_secs
    }

    pub fn remaining_secs(&self, axis: Axis, now: Instant) -> f64 {
        self.state.phase(axis).remaining_secs(now)
    }

    /// Back to the start condition: EW green for the base time from `now`.
    pub fn reset(&mut self, now: Instant) {
        self.state = CycleState::new(now);
    }

    /// Runs one tick. The active phase may only grow; it hands over to the
    /// other axis once its (possibly extended) time has run out.
    pub fn evaluate(&mut self, counts: &SampleCounts, now: Instant) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        let active = self.state.active();

        let candidate = score_axis(active, counts);
        let phase = self.state.phase_mut(active);
        if candidate > phase.duration_secs {
            outcome.extension = Some(Extension {
                axis: active,
                from_secs: phase.duration_secs,
                to_secs: candidate,
            });
            phase.duration_secs = candidate;
        }

        // A phase started this tick is never expired, so re-running the same
        // sample after a switch does not switch back.
        let phase = *self.state.phase(active);
        if phase.color == LightColor::Green && phase.is_expired(now) {
            let next = active.opposite();
            let duration_secs = score_axis(next, counts);
            self.state.start_phase(next, duration_secs, now);
            outcome.switch = Some(PhaseSwitch {
                from: active,
                to: next,
                duration_secs,
                commands: [
                    Command::for_axis(active, LightColor::Red),
                    Command::for_axis(next, LightColor::Green),
                ],
            });
        }

        outcome
    }

    pub fn light_statuses(&self, now: Instant) -> [LightStatus; 4] {
        Lane::ALL.map(|lane| self.state.light_status(lane, now))
    }
}
