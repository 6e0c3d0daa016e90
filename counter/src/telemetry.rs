//! Counter update delivery
//!
//! Updates are queued on a bounded channel and delivered by a single worker
//! thread, so a slow or unreachable endpoint never stalls frame processing.

use crate::config::TelemetryConfig;
use crate::error::{CounterError, Result};
use chrono::{DateTime, Local};
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use ioutrack::CrossingTotals;
use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Payload sent to the display endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterUpdate {
    pub count_up: u64,
    pub count_down: u64,
    pub timestamp: String,
}

impl CounterUpdate {
    pub fn new(totals: CrossingTotals, at: DateTime<Local>) -> Self {
        Self {
            count_up: totals.up,
            count_down: totals.down,
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Destination for counter updates
pub trait TelemetrySink: Send {
    fn name(&self) -> &str;
    fn send(&mut self, update: &CounterUpdate) -> Result<()>;
}

/// JSON POST to an HTTP endpoint
pub struct HttpSink {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpSink {
    pub fn new<S: Into<String>>(endpoint: S, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            endpoint: endpoint.into(),
        }
    }
}

impl TelemetrySink for HttpSink {
    fn name(&self) -> &str {
        &self.endpoint
    }

    fn send(&mut self, update: &CounterUpdate) -> Result<()> {
        match self.agent.post(&self.endpoint).send_json(update) {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, _)) => Err(CounterError::telemetry(format!(
                "{} answered HTTP {}",
                self.endpoint, code
            ))),
            Err(e) => Err(CounterError::telemetry(e.to_string())),
        }
    }
}

/// Writes each update to the log at info level
#[derive(Debug, Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn send(&mut self, update: &CounterUpdate) -> Result<()> {
        log::info!(
            "Counter update at {}: UP={} DOWN={}",
            update.timestamp,
            update.count_up,
            update.count_down
        );
        Ok(())
    }
}

/// Appends each update as one JSON object per line
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> TelemetrySink for JsonLinesSink<W> {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn send(&mut self, update: &CounterUpdate) -> Result<()> {
        serde_json::to_writer(&mut self.writer, update)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Check that the display device answers on its status URL
pub fn check_device_status(url: &str, timeout: Duration) -> Result<()> {
    let agent = ureq::AgentBuilder::new().timeout(timeout).build();
    match agent.get(url).call() {
        Ok(_) => Ok(()),
        Err(ureq::Error::Status(code, _)) => Err(CounterError::telemetry(format!(
            "{} answered HTTP {}",
            url, code
        ))),
        Err(e) => Err(CounterError::telemetry(e.to_string())),
    }
}

/// Log sink first, then HTTP delivery if configured and reachable, then `extra`
pub fn build_sinks(
    config: &TelemetryConfig,
    mut extra: Vec<Box<dyn TelemetrySink>>,
) -> Vec<Box<dyn TelemetrySink>> {
    let timeout = Duration::from_millis(config.timeout_ms);
    let mut sinks: Vec<Box<dyn TelemetrySink>> = vec![Box::new(LogSink)];

    if let Some(endpoint) = &config.endpoint {
        let reachable = match &config.status_endpoint {
            Some(status) => match check_device_status(status, timeout) {
                Ok(()) => {
                    log::info!("Display device reachable at {}", status);
                    true
                }
                Err(e) => {
                    log::warn!("Display device unreachable, HTTP updates disabled: {}", e);
                    false
                }
            },
            None => true,
        };
        if reachable {
            sinks.push(Box::new(HttpSink::new(endpoint.clone(), timeout)));
        }
    }

    sinks.append(&mut extra);
    sinks
}

enum TelemetryCommand {
    Publish(CounterUpdate),
    Shutdown,
}

/// Background delivery of counter updates to a set of sinks
pub struct TelemetryDispatcher {
    command_tx: Sender<TelemetryCommand>,
    dropped: Arc<AtomicU64>,
    delivered: Arc<AtomicU64>,
    worker_handle: Option<thread::JoinHandle<()>>,
}

impl TelemetryDispatcher {
    pub fn new(sinks: Vec<Box<dyn TelemetrySink>>, queue_capacity: usize) -> Self {
        let (command_tx, command_rx) = bounded::<TelemetryCommand>(queue_capacity.max(1));
        let delivered = Arc::new(AtomicU64::new(0));

        let worker_delivered = Arc::clone(&delivered);
        let worker_handle = thread::spawn(move || {
            Self::worker_thread(sinks, command_rx, worker_delivered);
        });

        Self {
            command_tx,
            dropped: Arc::new(AtomicU64::new(0)),
            delivered,
            worker_handle: Some(worker_handle),
        }
    }

    /// Build the sinks described by the config plus any extra ones
    pub fn from_config(config: &TelemetryConfig, extra: Vec<Box<dyn TelemetrySink>>) -> Self {
        Self::new(build_sinks(config, extra), config.queue_capacity)
    }

    /// Queue an update without blocking. Returns false if it was dropped.
    pub fn publish(&self, update: CounterUpdate) -> bool {
        match self.command_tx.try_send(TelemetryCommand::Publish(update)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!("Telemetry queue full, dropping counter update");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                log::error!("Telemetry worker is gone, dropping counter update");
                false
            }
        }
    }

    /// Queue an update, waiting for room if the queue is full.
    /// Used for the last update of a run, which must not be dropped.
    pub fn publish_final(&self, update: CounterUpdate) -> bool {
        match self.command_tx.send(TelemetryCommand::Publish(update)) {
            Ok(()) => true,
            Err(_) => {
                log::error!("Telemetry worker is gone, final counter update lost");
                false
            }
        }
    }

    /// Updates dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Updates handed to every sink so far
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Deliver everything already queued, then stop the worker
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.worker_handle.take() {
            let _ = self.command_tx.send(TelemetryCommand::Shutdown);
            if handle.join().is_err() {
                log::error!("Telemetry worker panicked");
            }
        }
    }

    fn worker_thread(
        mut sinks: Vec<Box<dyn TelemetrySink>>,
        command_rx: Receiver<TelemetryCommand>,
        delivered: Arc<AtomicU64>,
    ) {
        log::debug!("Telemetry worker started with {} sinks", sinks.len());

        while let Ok(command) = command_rx.recv() {
            match command {
                TelemetryCommand::Publish(update) => {
                    for sink in sinks.iter_mut() {
                        if let Err(e) = sink.send(&update) {
                            log::warn!("Telemetry sink '{}' failed: {}", sink.name(), e);
                        }
                    }
                    delivered.fetch_add(1, Ordering::Relaxed);
                }
                TelemetryCommand::Shutdown => break,
            }
        }

        log::debug!("Telemetry worker stopped");
    }
}

impl Drop for TelemetryDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
