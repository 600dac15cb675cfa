use crate::control_system::direction_scorer::score_axis;
use crate::control_system::phase_scheduler::PhaseScheduler;
use crate::hardware::command_channel::Command;
use crate::shared_data::{Axis, LightColor, SampleCounts};
use std::time::Instant;

/// A forced return to EW green after the one-green-axis rule was found broken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyCorrection {
    /// How many axes were green when the check ran (0 or 2).
    pub green_axes_found: usize,
    pub duration_secs: u64,
    pub commands: [Command; 2],
}

/// Checks that exactly one axis is green, every `interval_ticks` ticks.
#[derive(Debug, Clone)]
pub struct SafetyMonitor {
    interval_ticks: u64,
    ticks: u64,
}

impl SafetyMonitor {
    pub fn new(interval_ticks: u64) -> Self {
        Self {
            interval_ticks: interval_ticks.max(1),
            ticks: 0,
        }
    }

    /// Counts one tick and runs the check when the cadence comes round.
    pub fn on_tick(
        &mut self,
        scheduler: &mut PhaseScheduler,
        counts: &SampleCounts,
        now: Instant,
    ) -> Option<SafetyCorrection> {
        let due = self.ticks % self.interval_ticks == 0;
        self.ticks = self.ticks.wrapping_add(1);
        if due {
            Self::check(scheduler, counts, now)
        } else {
            None
        }
    }

    /// Unconditional check. Scheduler transitions never leave the lights in
    /// a bad state, so a correction here means something else corrupted it.
    pub fn check(
        scheduler: &mut PhaseScheduler,
        counts: &SampleCounts,
        now: Instant,
    ) -> Option<SafetyCorrection> {
        let green_axes_found = scheduler.state().green_axes();
        if green_axes_found == 1 {
            return None;
        }

        let duration_secs = score_axis(Axis::EW, counts);
        scheduler.state_mut().start_phase(Axis::EW, duration_secs, now);
        Some(SafetyCorrection {
            green_axes_found,
            duration_secs,
            commands: [
                Command::for_axis(Axis::EW, LightColor::Green),
                Command::for_axis(Axis::NS, LightColor::Red),
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn healthy_state_is_left_alone() {
        let t0 = Instant::now();
        let mut scheduler = PhaseScheduler::new(t0);
        let before = scheduler.state().clone();
        assert!(SafetyMonitor::check(&mut scheduler, &SampleCounts::default(), t0).is_none());
        assert_eq!(scheduler.state(), &before);
    }

    #[test]
    fn all_red_forces_ew_green() {
        let t0 = Instant::now();
        let mut scheduler = PhaseScheduler::new(t0);
        scheduler.evaluate(&SampleCounts::default(), t0 + Duration::from_secs(5));
        assert_eq!(scheduler.active_axis(), Axis::NS);
        scheduler.state_mut().set_color(Axis::NS, LightColor::Red);

        let now = t0 + Duration::from_secs(7);
        let counts = SampleCounts::new(0, 0, 2, 0);
        let correction = SafetyMonitor::check(&mut scheduler, &counts, now).unwrap();

        assert_eq!(correction.green_axes_found, 0);
        assert_eq!(correction.duration_secs, 20);
        assert_eq!(correction.commands[0].encode(), "S1:S4:GREEN\n");
        assert_eq!(correction.commands[1].encode(), "S2:S3:RED\n");
        assert_eq!(scheduler.active_axis(), Axis::EW);
        assert_eq!(scheduler.state().phase(Axis::EW).started_at, now);
        assert_eq!(scheduler.state().green_axes(), 1);
    }

    #[test]
    fn both_green_is_also_corrected() {
        let t0 = Instant::now();
        let mut scheduler = PhaseScheduler::new(t0);
        scheduler.state_mut().set_color(Axis::NS, LightColor::Green);
        let correction =
            SafetyMonitor::check(&mut scheduler, &SampleCounts::default(), t0).unwrap();
        assert_eq!(correction.green_axes_found, 2);
        assert_eq!(scheduler.state().phase(Axis::NS).color, LightColor::Red);
    }

    #[test]
    fn checks_only_on_cadence() {
        let t0 = Instant::now();
        let mut scheduler = PhaseScheduler::new(t0);
        let mut monitor = SafetyMonitor::new(30);
        let counts = SampleCounts::default();

        // First tick is a check tick.
        assert!(monitor.on_tick(&mut scheduler, &counts, t0).is_none());

        scheduler.state_mut().set_color(Axis::EW, LightColor::Red);
        for _ in 1..30 {
            assert!(monitor.on_tick(&mut scheduler, &counts, t0).is_none());
        }
        assert!(monitor.on_tick(&mut scheduler, &counts, t0).is_some());
    }
}
