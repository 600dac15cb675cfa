use crate::config::ControllerConfig;
use crate::control_system::manual_override::{ManualOverride, OperatorCommand};
use crate::control_system::phase_scheduler::PhaseScheduler;
use crate::control_system::safety_monitor::SafetyMonitor;
use crate::hardware::command_channel::{Command, CommandChannel};
use crate::hardware::connector::Connector;
use crate::monitoring::log_feed::LogFeed;
use crate::perception::sample_source::{SamplePoll, SampleSource};
use crate::shared_data::{
    current_timestamp, ControlMode, ControllerEvent, ControllerSnapshot, LightColor,
    SampleCounts,
};
use log::{debug, info, log, Level};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    Continue,
    SourceClosed,
}

/// The scheduling worker. It is the only owner of the cycle state and the
/// command channel; operator requests come in as messages and everything
/// going out to the presentation side is a copy.
pub struct Controller<C: Connector> {
    scheduler: PhaseScheduler,
    safety: SafetyMonitor,
    manual: ManualOverride,
    channel: CommandChannel<C>,
    source: Box<dyn SampleSource + Send>,
    operator_rx: mpsc::Receiver<OperatorCommand>,
    events: mpsc::Sender<ControllerEvent>,
    feed: LogFeed,
    counts: SampleCounts,
    tick_interval: Duration,
}

impl<C: Connector> Controller<C> {
    pub fn new(
        channel: CommandChannel<C>,
        source: Box<dyn SampleSource + Send>,
        operator_rx: mpsc::Receiver<OperatorCommand>,
        events: mpsc::Sender<ControllerEvent>,
        config: &ControllerConfig,
        now: Instant,
    ) -> Self {
        Self {
            scheduler: PhaseScheduler::new(now),
            safety: SafetyMonitor::new(config.safety_check_interval_ticks),
            manual: ManualOverride::new(),
            channel,
            source,
            operator_rx,
            events,
            feed: LogFeed::default(),
            counts: SampleCounts::default(),
            tick_interval: config.tick_interval(),
        }
    }

    pub fn scheduler(&self) -> &PhaseScheduler {
        &self.scheduler
    }

    pub fn mode(&self) -> ControlMode {
        self.manual.mode()
    }

    pub fn feed(&self) -> &LogFeed {
        &self.feed
    }

    pub fn last_counts(&self) -> SampleCounts {
        self.counts
    }

    /// Puts the board into the state the scheduler starts from.
    pub fn start(&mut self, now: Instant) {
        let axis = self.scheduler.active_axis();
        self.note(
            Level::Info,
            format!(
                "[SYSTEM] Controller started, {} GREEN for {}s",
                axis,
                self.scheduler.active_duration_secs()
            ),
        );
        let commands = [
            Command::for_axis(axis, LightColor::Green),
            Command::for_axis(axis.opposite(), LightColor::Red),
        ];
        self.send_all(&commands);
        self.emit_snapshot(now);
    }

    /// One evaluation cycle.
    pub fn tick(&mut self, now: Instant) -> TickStatus {
        while let Ok(request) = self.operator_rx.try_recv() {
            self.apply_operator(request, now);
        }

        match self.source.poll() {
            SamplePoll::Fresh(counts) => self.counts = counts,
            SamplePoll::Pending => {}
            SamplePoll::Closed => {
                self.note(Level::Error, "[ERROR] Perception feed closed".to_string());
                return TickStatus::SourceClosed;
            }
        }

        if !self.manual.is_forced_red() {
            self.run_schedule(now);
        }

        self.emit_snapshot(now);
        TickStatus::Continue
    }

    fn run_schedule(&mut self, now: Instant) {
        let outcome = self.scheduler.evaluate(&self.counts, now);
        if let Some(ext) = outcome.extension {
            self.note(
                Level::Info,
                format!(
                    "[AUTO] {} extended {}s -> {}s",
                    ext.axis, ext.from_secs, ext.to_secs
                ),
            );
        }
        if let Some(switch) = outcome.switch {
            self.send_all(&switch.commands);
            self.note(
                Level::Info,
                format!(
                    "[AUTO] {} -> {} GREEN ({}s)",
                    switch.from, switch.to, switch.duration_secs
                ),
            );
        }

        if let Some(correction) = self.safety.on_tick(&mut self.scheduler, &self.counts, now) {
            self.note(
                Level::Warn,
                format!(
                    "[SAFETY] {} axes green, forcing E-W GREEN ({}s)",
                    correction.green_axes_found, correction.duration_secs
                ),
            );
            self.send_all(&correction.commands);
        }
    }

    pub fn apply_operator(&mut self, request: OperatorCommand, now: Instant) {
        match request {
            OperatorCommand::ForceRedAll => {
                let commands = self.manual.force_red_all();
                self.note(Level::Warn, "[MANUAL] Force red on all lights".to_string());
                self.send_all(&commands);
            }
            OperatorCommand::ResumeAuto => {
                let commands = self.manual.resume_auto(&mut self.scheduler, now);
                self.note(Level::Info, "[MANUAL] Automatic cycling resumed".to_string());
                self.send_all(&commands);
            }
        }
    }

    /// Sends each command in order. A failure is logged and the rest still
    /// go out; the cycle state has already moved on either way.
    fn send_all(&mut self, commands: &[Command]) {
        for command in commands {
            match self.channel.send_command(command) {
                Ok(()) => self.note(Level::Debug, format!("[SENT] {}", command.describe())),
                Err(e) => self.note(
                    Level::Error,
                    format!("[ERROR] {} dropped: {}", command.describe(), e),
                ),
            }
        }
    }

    fn note(&mut self, level: Level, message: String) {
        log!(level, "{}", message);
        self.feed.push(message.clone());
        self.publish(ControllerEvent::Log(message));
    }

    /// Never blocks the worker: when the presentation side falls behind,
    /// the event is dropped.
    fn publish(&self, event: ControllerEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("Presentation side behind, event dropped"),
            Err(TrySendError::Closed(_)) => debug!("Presentation side gone, event dropped"),
        }
    }

    fn emit_snapshot(&mut self, now: Instant) {
        let snapshot = ControllerSnapshot {
            timestamp: current_timestamp(),
            counts: self.counts,
            ns_total: self.counts.ns_total(),
            ew_total: self.counts.ew_total(),
            mode: self.manual.mode(),
            lights: self.manual.light_statuses(&self.scheduler, now),
        };
        self.publish(ControllerEvent::Snapshot(snapshot));
    }

    /// Runs until `stop` is set or the perception feed closes, then releases
    /// the hardware link.
    pub fn run(mut self, stop: &AtomicBool) {
        self.start(Instant::now());
        while !stop.load(Ordering::Relaxed) {
            if self.tick(Instant::now()) == TickStatus::SourceClosed {
                break;
            }
            thread::sleep(self.tick_interval);
        }
        self.channel.close();
        info!("Controller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::connector::RecordingConnector;
    use crate::perception::sample_source::{parse_input_line, InputLine};
    use crate::shared_data::Axis;

    struct Script(Vec<SamplePoll>);

    impl SampleSource for Script {
        fn poll(&mut self) -> SamplePoll {
            if self.0.is_empty() {
                SamplePoll::Pending
            } else {
                self.0.remove(0)
            }
        }
    }

    struct Rig {
        controller: Controller<RecordingConnector>,
        recorder: RecordingConnector,
        operator_tx: mpsc::Sender<OperatorCommand>,
        events: mpsc::Receiver<ControllerEvent>,
        t0: Instant,
    }

    fn rig(script: Vec<SamplePoll>) -> Rig {
        rig_with_queue(script, 64)
    }

    fn rig_with_queue(script: Vec<SamplePoll>, queue: usize) -> Rig {
        let recorder = RecordingConnector::new();
        let channel =
            CommandChannel::open(recorder.clone(), Duration::ZERO, Duration::ZERO).unwrap();
        let (operator_tx, operator_rx) = mpsc::channel(4);
        let (events_tx, events) = mpsc::channel(queue);
        let t0 = Instant::now();
        let controller = Controller::new(
            channel,
            Box::new(Script(script)),
            operator_rx,
            events_tx,
            &ControllerConfig::default(),
            t0,
        );
        Rig {
            controller,
            recorder,
            operator_tx,
            events,
            t0,
        }
    }

    fn secs(t0: Instant, s: u64) -> Instant {
        t0 + Duration::from_secs(s)
    }

    #[test]
    fn start_sends_initial_pair() {
        let mut rig = rig(vec![]);
        rig.controller.start(rig.t0);
        assert_eq!(rig.recorder.lines(), vec!["S1:S4:GREEN", "S2:S3:RED"]);
    }

    #[test]
    fn pending_sample_holds_last_counts() {
        let counts = SampleCounts::new(0, 0, 1, 0);
        let mut rig = rig(vec![SamplePoll::Fresh(counts), SamplePoll::Pending]);
        rig.controller.tick(secs(rig.t0, 1));
        rig.controller.tick(secs(rig.t0, 2));
        assert_eq!(rig.controller.last_counts(), counts);
        assert_eq!(rig.controller.scheduler().active_duration_secs(), 10);
    }

    #[test]
    fn closed_feed_stops_the_worker() {
        let mut rig = rig(vec![SamplePoll::Closed]);
        assert_eq!(rig.controller.tick(rig.t0), TickStatus::SourceClosed);
        assert_eq!(rig.controller.feed().latest(), Some("[ERROR] Perception feed closed"));
    }

    #[test]
    fn send_failure_still_advances_state() {
        let mut rig = rig(vec![]);
        rig.recorder.fail_next_writes(1);
        rig.recorder.refuse_next_connects(1);
        rig.controller.tick(secs(rig.t0, 5));

        assert_eq!(rig.controller.scheduler().active_axis(), Axis::NS);
        // RED was dropped, GREEN went out after its own reconnect.
        assert_eq!(rig.recorder.lines(), vec!["S2:S3:GREEN"]);
        assert!(rig
            .controller
            .feed()
            .entries()
            .any(|line| line.starts_with("[ERROR] S1 & S4 RED dropped")));
    }

    #[test]
    fn operator_requests_are_applied_at_tick_start() {
        let mut rig = rig(vec![]);
        rig.operator_tx.try_send(OperatorCommand::ForceRedAll).unwrap();
        rig.controller.tick(secs(rig.t0, 1));
        assert_eq!(rig.controller.mode(), ControlMode::ForcedRed);
        assert_eq!(rig.recorder.lines(), vec!["S1:S4:RED", "S2:S3:RED"]);
    }

    #[test]
    fn snapshots_are_emitted_every_tick() {
        let mut rig = rig(vec![SamplePoll::Fresh(SampleCounts::new(1, 2, 3, 4))]);
        rig.controller.tick(secs(rig.t0, 1));

        let mut snapshot = None;
        while let Ok(event) = rig.events.try_recv() {
            if let ControllerEvent::Snapshot(s) = event {
                snapshot = Some(s);
            }
        }
        let snapshot = snapshot.expect("snapshot emitted");
        assert_eq!(snapshot.ns_total, 3);
        assert_eq!(snapshot.ew_total, 7);
        assert_eq!(snapshot.lights[0].color, LightColor::Green);
        assert_eq!(snapshot.mode, ControlMode::Auto);
    }

    #[test]
    fn safety_correction_restores_ew_green_on_check_ticks() {
        let mut rig = rig(vec![]);
        let corrupt = |controller: &mut Controller<RecordingConnector>| {
            controller.scheduler.state_mut().set_color(Axis::EW, LightColor::Red);
            controller.scheduler.state_mut().set_color(Axis::NS, LightColor::Red);
        };

        // The very first tick is a check tick.
        corrupt(&mut rig.controller);
        rig.controller.tick(secs(rig.t0, 1));
        assert_eq!(rig.controller.scheduler().state().green_axes(), 1);
        assert_eq!(rig.controller.scheduler().active_axis(), Axis::EW);
        assert_eq!(rig.recorder.lines(), vec!["S1:S4:GREEN", "S2:S3:RED"]);
        assert!(rig
            .controller
            .feed()
            .entries()
            .any(|line| line == "[SAFETY] 0 axes green, forcing E-W GREEN (5s)"));

        // Between checks the corruption goes unnoticed.
        corrupt(&mut rig.controller);
        let t0 = rig.t0;
        let at = move |i: u64| t0 + Duration::from_millis(1_000 + i * 10);
        for i in 1..30 {
            rig.controller.tick(at(i));
        }
        assert_eq!(rig.controller.scheduler().state().green_axes(), 0);
        assert_eq!(rig.recorder.lines().len(), 2);

        rig.controller.tick(at(30));
        assert_eq!(rig.controller.scheduler().state().green_axes(), 1);
        assert_eq!(
            rig.recorder.lines()[2..],
            ["S1:S4:GREEN".to_string(), "S2:S3:RED".to_string()]
        );
    }

    #[test]
    fn counts_at_the_u32_limit_do_not_stop_the_worker() {
        let line = r#"{"north":4294967295,"south":1,"east":0,"west":0}"#;
        let Ok(InputLine::Sample(counts)) = parse_input_line(line) else {
            panic!("sample line rejected");
        };
        let mut rig = rig(vec![SamplePoll::Fresh(counts)]);

        assert_eq!(rig.controller.tick(secs(rig.t0, 1)), TickStatus::Continue);
        let mut snapshot = None;
        while let Ok(event) = rig.events.try_recv() {
            if let ControllerEvent::Snapshot(s) = event {
                snapshot = Some(s);
            }
        }
        assert_eq!(
            snapshot.expect("snapshot emitted").ns_total,
            u64::from(u32::MAX) + 1
        );
    }

    #[test]
    fn full_event_queue_drops_instead_of_blocking() {
        let mut rig = rig_with_queue(vec![], 1);
        rig.controller.tick(secs(rig.t0, 1));
        rig.controller.tick(secs(rig.t0, 2));
        rig.controller.tick(secs(rig.t0, 5));

        // The switch at 5s still reached the board.
        assert_eq!(rig.recorder.lines(), vec!["S1:S4:RED", "S2:S3:GREEN"]);
        assert!(matches!(
            rig.events.try_recv(),
            Ok(ControllerEvent::Snapshot(_))
        ));
        assert!(rig.events.try_recv().is_err());
    }
}
