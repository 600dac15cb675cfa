use adaptive_signal::config::{ControllerConfig, LinkConfig, SourceKind};
use adaptive_signal::control_system::controller::Controller;
use adaptive_signal::control_system::manual_override::OperatorCommand;
use adaptive_signal::errors::ControllerError;
use adaptive_signal::global_variables::EVENT_QUEUE_CAPACITY;
use adaptive_signal::hardware::command_channel::CommandChannel;
use adaptive_signal::hardware::connector::{
    Connector, DeviceConnector, RecordingConnector, TcpConnector,
};
use adaptive_signal::monitoring::log_feed::LogFeed;
use adaptive_signal::monitoring::snapshot_publisher::SnapshotPublisher;
use adaptive_signal::monitoring::snapshot_recorder::SnapshotRecorder;
use adaptive_signal::perception::sample_source::{
    parse_input_line, ChannelSource, InputLine, RandomSource, SampleSource,
};
use adaptive_signal::shared_data::{ControllerEvent, ControllerSnapshot, SampleCounts};
use log::{debug, error, info, warn};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const RANDOM_MAX_PER_APPROACH: u32 = 4;

#[tokio::main]
async fn main() {
    env_logger::init();

    let config_path = std::env::args().nth(1);
    let config = match ControllerConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(2);
        }
    };

    let result = match config.link.clone() {
        LinkConfig::Device { path, baud_rate } => {
            run(DeviceConnector::new(path, baud_rate), config).await
        }
        LinkConfig::Tcp { address } => run(TcpConnector::new(address), config).await,
        LinkConfig::DryRun => run(RecordingConnector::new(), config).await,
    };

    // Exit explicitly: the stdin reader may still be parked on a blocking read.
    match result {
        Ok(()) => process::exit(0),
        Err(e) => {
            error!("Controller error: {}", e);
            process::exit(1);
        }
    }
}

async fn run<C>(connector: C, config: ControllerConfig) -> Result<(), ControllerError>
where
    C: Connector + Send + 'static,
    C::Link: Send + 'static,
{
    let (settle, reconnect_settle) = (config.connect_settle(), config.reconnect_settle());
    let channel =
        tokio::task::spawn_blocking(move || CommandChannel::open(connector, settle, reconnect_settle))
            .await
            .map_err(|e| ControllerError::Worker(e.to_string()))??;

    let (sample_tx, sample_rx) = mpsc::channel::<SampleCounts>(64);
    let (operator_tx, operator_rx) = mpsc::channel::<OperatorCommand>(8);
    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);

    let (source, sample_tx) = match config.source {
        SourceKind::Stdin => (
            Box::new(ChannelSource::new(sample_rx)) as Box<dyn SampleSource + Send>,
            Some(sample_tx),
        ),
        SourceKind::Random => (
            Box::new(RandomSource::new(RANDOM_MAX_PER_APPROACH)) as Box<dyn SampleSource + Send>,
            None,
        ),
    };
    tokio::spawn(read_stdin(sample_tx, operator_tx));

    let csv_path = config.snapshot_csv.clone();
    let amqp = config
        .amqp_url()
        .map(|url| (url.to_string(), config.amqp_queue.clone()));
    let presentation = tokio::task::spawn_blocking(move || present(events_rx, csv_path, amqp));

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Stop requested");
                stop.store(true, Ordering::Relaxed);
            }
        });
    }

    let controller = Controller::new(
        channel,
        source,
        operator_rx,
        events_tx,
        &config,
        Instant::now(),
    );
    tokio::task::spawn_blocking(move || controller.run(&stop))
        .await
        .map_err(|e| ControllerError::Worker(e.to_string()))?;

    presentation
        .await
        .map_err(|e| ControllerError::Worker(e.to_string()))?;
    Ok(())
}

// Stdin carries JSON sample lines and the operator words `force-red` / `auto`.
async fn read_stdin(
    samples: Option<mpsc::Sender<SampleCounts>>,
    operator: mpsc::Sender<OperatorCommand>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match parse_input_line(&line) {
                Ok(InputLine::Sample(counts)) => match &samples {
                    Some(tx) => {
                        if tx.send(counts).await.is_err() {
                            break;
                        }
                    }
                    None => debug!("Sample ignored, using synthetic counts"),
                },
                Ok(InputLine::Operator(request)) => {
                    if operator.send(request).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("{}", e),
            },
            Ok(None) => {
                info!("Input closed");
                break;
            }
            Err(e) => {
                error!("Reading input failed: {}", e);
                break;
            }
        }
    }
}

// Presentation side: consumes copies only, never touches controller state.
fn present(
    mut events: mpsc::Receiver<ControllerEvent>,
    csv_path: Option<String>,
    amqp: Option<(String, String)>,
) {
    let mut recorder = csv_path.and_then(|path| match SnapshotRecorder::open(&path) {
        Ok(recorder) => Some(recorder),
        Err(e) => {
            warn!("Snapshot CSV {} disabled: {}", path, e);
            None
        }
    });
    let publisher = amqp.and_then(|(url, queue)| match SnapshotPublisher::connect(&url, &queue) {
        Ok(publisher) => {
            info!("Publishing snapshots to queue '{}'", queue);
            Some(publisher)
        }
        Err(e) => {
            warn!("Snapshot publishing disabled: {}", e);
            None
        }
    });

    let mut feed = LogFeed::default();
    let mut last: Option<ControllerSnapshot> = None;
    while let Some(event) = events.blocking_recv() {
        match event {
            ControllerEvent::Log(line) => {
                feed.push(line);
                if let Some(snapshot) = &last {
                    println!("{}\n{}\n", status_board(snapshot), feed.render());
                }
            }
            ControllerEvent::Snapshot(snapshot) => {
                if let Some(recorder) = recorder.as_mut() {
                    if let Err(e) = recorder.record(&snapshot) {
                        warn!("Error recording snapshot: {}", e);
                    }
                }
                if let Some(publisher) = &publisher {
                    if let Err(e) = publisher.publish(&snapshot) {
                        warn!("Error publishing snapshot: {}", e);
                    }
                }
                last = Some(snapshot);
            }
        }
    }

    if let Some(publisher) = publisher {
        if let Err(e) = publisher.close() {
            warn!("Error closing AMQP connection: {}", e);
        }
    }
}

fn status_board(s: &ControllerSnapshot) -> String {
    let lights: Vec<String> = s
        .lights
        .iter()
        .map(|l| format!("{} {} {:.0}s", l.lane, l.color, l.remaining_secs.ceil()))
        .collect();
    format!(
        "N:{} S:{} E:{} W:{} (N-S {}, E-W {}) | {:?} | {}",
        s.counts.north,
        s.counts.south,
        s.counts.east,
        s.counts.west,
        s.ns_total,
        s.ew_total,
        s.mode,
        lights.join(" | ")
    )
}
