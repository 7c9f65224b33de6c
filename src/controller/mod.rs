//! The scanning state machine
//!
//! ```text
//! Idle --start--> Starting --ok--> Scanning --stop--> Stopping --> Idle
//!                    \--err--> Idle
//! ```
//!
//! While `Scanning`, each tick takes the latest frame, runs the
//! [`ScanPipeline`] on a blocking worker, and merges the candidates into the
//! session. A tick that fires while the previous one is still processing is
//! dropped. Results of a tick that completes after `stop` are discarded.
//!
//! The pipeline value itself is handed to the worker and returned with the
//! result, so at most one tick can ever hold it.

pub mod debounce;
pub mod events;
pub mod schedule;

pub use debounce::Debouncer;
pub use events::{ScanEvent, ScanStatus};
pub use schedule::AdaptiveInterval;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::aggregate::{MergeOutcome, ResultAggregator};
use crate::camera::{
    AcquireTiming, CameraDevice, ConstraintLadder, DeviceArbiter, DeviceInfo, FrameSource,
    StreamInfo,
};
use crate::config::ScanConfig;
use crate::error::{PipelineError, Result, ScanError};
use crate::history::HistorySink;
use crate::models::{DetectedCode, Frame};
use crate::pipeline::{ScanPipeline, TickCandidates};
use crate::session::ScanSession;

/// Top-level controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Starting,
    Scanning,
    Stopping,
}

/// Counters over the life of a controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Ticks merged into the session
    pub completed: u64,
    /// Ticks dropped because the previous one was still processing
    pub skipped_busy: u64,
    /// Ticks with no frame available
    pub no_frame: u64,
    /// Ticks aborted by a pipeline error
    pub aborted: u64,
    /// Ticks whose results arrived after stop
    pub discarded: u64,
}

/// Work for one tick, detached from the controller
pub struct TickJob {
    generation: u64,
    frame: Frame,
    pipeline: ScanPipeline,
}

/// What a finished [`TickJob`] hands back
pub struct TickOutput {
    generation: u64,
    pipeline: ScanPipeline,
    result: std::result::Result<TickCandidates, PipelineError>,
    elapsed: Duration,
}

impl TickJob {
    /// Run the pipeline synchronously
    pub fn run(self) -> TickOutput {
        let TickJob {
            generation,
            frame,
            mut pipeline,
        } = self;
        let started = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(|| pipeline.run(&frame)))
            .unwrap_or(Err(PipelineError::Panicked));
        TickOutput {
            generation,
            pipeline,
            result,
            elapsed: started.elapsed(),
        }
    }
}

impl TickOutput {
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Outcome of trying to begin a tick
pub enum TickStart {
    /// Processing flag set; run the job and pass its output to `finish_tick`
    Ready(TickJob),
    /// The previous tick is still processing
    Busy,
    /// The camera has no usable frame yet
    NoFrame,
    /// Not in `Scanning`
    NotScanning,
}

/// Requests sent to a running controller
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Stop,
    Clear,
    Remove(Uuid),
    SwitchDevice(Option<String>),
}

/// Cloneable remote for a controller inside [`ScanController::run`]
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: UnboundedSender<Command>,
}

impl ControllerHandle {
    pub fn stop(&self) {
        let _ = self.tx.send(Command::Stop);
    }

    pub fn clear(&self) {
        let _ = self.tx.send(Command::Clear);
    }

    pub fn remove(&self, id: Uuid) {
        let _ = self.tx.send(Command::Remove(id));
    }

    pub fn switch_device(&self, device_id: Option<String>) {
        let _ = self.tx.send(Command::SwitchDevice(device_id));
    }
}

/// Drives acquisition, the tick loop, and the session
pub struct ScanController {
    config: ScanConfig,
    source: FrameSource,
    pipeline: Option<ScanPipeline>,
    aggregator: ResultAggregator,
    session: ScanSession,
    schedule: AdaptiveInterval,
    debouncer: Debouncer,
    state: ControllerState,
    status: ScanStatus,
    processing: bool,
    generation: u64,
    stats: TickStats,
    subscribers: Vec<UnboundedSender<ScanEvent>>,
    command_tx: UnboundedSender<Command>,
    command_rx: UnboundedReceiver<Command>,
}

impl ScanController {
    pub fn new(config: ScanConfig, source: FrameSource, pipeline: ScanPipeline) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        Self {
            aggregator: ResultAggregator::new(
                config.aggregation.clone(),
                config.confidence_threshold,
            ),
            session: ScanSession::new(config.initial_tick_interval()),
            schedule: AdaptiveInterval::from_config(&config),
            debouncer: Debouncer::new(config.debounce()),
            config,
            source,
            pipeline: Some(pipeline),
            state: ControllerState::Idle,
            status: ScanStatus::Idle,
            processing: false,
            generation: 0,
            stats: TickStats::default(),
            subscribers: Vec::new(),
            command_tx,
            command_rx,
        }
    }

    /// Controller over `device` with the built-in decode backends
    pub fn from_config(
        config: ScanConfig,
        device: Box<dyn CameraDevice>,
        arbiter: DeviceArbiter,
    ) -> Self {
        let source = FrameSource::new(
            "scanner",
            device,
            arbiter,
            AcquireTiming::from_config(&config.camera),
        );
        let pipeline = ScanPipeline::from_config(&config);
        Self::new(config, source, pipeline)
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Last reported status
    pub fn status(&self) -> &ScanStatus {
        &self.status
    }

    /// True while a tick's decode work is in flight
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn stats(&self) -> TickStats {
        self.stats
    }

    pub fn interval(&self) -> Duration {
        self.schedule.current()
    }

    pub fn source(&self) -> &FrameSource {
        &self.source
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&mut self) -> UnboundedReceiver<ScanEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Remote used to stop or steer [`ScanController::run`]
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            tx: self.command_tx.clone(),
        }
    }

    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self.source.list_devices().await?)
    }

    fn emit(&mut self, event: ScanEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn set_status(&mut self, status: ScanStatus) {
        self.status = status.clone();
        self.emit(ScanEvent::Status(status));
    }

    /// Acquire the camera and enter `Scanning` with a fresh session
    pub async fn start(&mut self) -> Result<StreamInfo> {
        self.start_inner(true).await
    }

    #[instrument(skip(self))]
    async fn start_inner(&mut self, fresh_session: bool) -> Result<StreamInfo> {
        if self.state != ControllerState::Idle {
            return Err(ScanError::AlreadyRunning);
        }
        self.state = ControllerState::Starting;
        self.set_status(ScanStatus::Starting);

        let ladder = ConstraintLadder::from_config(&self.config.camera);
        match self.source.acquire(&ladder).await {
            Ok(stream) => {
                if fresh_session {
                    self.session = ScanSession::new(self.config.initial_tick_interval());
                    self.aggregator.reset();
                    self.schedule.reset(self.config.initial_tick_interval());
                }
                self.generation += 1;
                self.processing = false;
                self.state = ControllerState::Scanning;
                self.set_status(ScanStatus::Scanning);
                info!(device = %stream.device_id, session = %self.session.id(), "scanning started");
                Ok(stream)
            }
            Err(err) => {
                warn!(reason = err.reason(), "scanner failed to start");
                self.state = ControllerState::Idle;
                self.set_status(ScanStatus::Error {
                    reason: err.reason().to_string(),
                    recovery_advised: err.recovery_advised(),
                });
                Err(err.into())
            }
        }
    }

    /// Leave `Scanning`: release the camera and forget any tick in flight
    ///
    /// The session is kept until it is committed, cleared, or a new scan
    /// starts.
    pub fn stop(&mut self) {
        if self.state == ControllerState::Idle {
            return;
        }
        self.state = ControllerState::Stopping;
        self.set_status(ScanStatus::Stopping);
        self.source.release();
        self.processing = false;
        self.generation += 1;
        self.debouncer.reset();
        self.state = ControllerState::Idle;
        self.set_status(ScanStatus::Stopped);
        info!(codes = self.session.len(), "scanning stopped");
    }

    /// Empty the session without leaving the current state
    pub fn clear(&mut self) {
        self.session.clear();
        self.emit(ScanEvent::Cleared);
    }

    /// Drop one code from the session
    pub fn remove(&mut self, id: Uuid) -> Option<DetectedCode> {
        let removed = self.session.remove(id);
        if removed.is_some() {
            self.emit(ScanEvent::Removed(id));
        }
        removed
    }

    /// Release the current camera and acquire `device_id` instead
    ///
    /// The session survives the switch. When the controller was idle only the
    /// configured device changes.
    pub async fn switch_device(&mut self, device_id: Option<String>) -> Result<Option<StreamInfo>> {
        self.config.camera.device_id = device_id;
        if self.state != ControllerState::Scanning {
            return Ok(None);
        }
        self.stop();
        sleep(self.source.timing().settle_delay).await;
        self.start_inner(false).await.map(Some)
    }

    /// Hand the session to `sink` and clear it
    ///
    /// Returns the number of records committed. An empty session commits
    /// nothing and does not call the sink.
    pub fn commit(&mut self, sink: &mut impl HistorySink) -> Result<usize> {
        let records = self.session.to_history_records();
        if records.is_empty() {
            return Ok(0);
        }
        sink.save(&records)?;
        info!(records = records.len(), "session committed");
        self.clear();
        Ok(records.len())
    }

    /// Start a tick if none is in flight
    pub fn begin_tick(&mut self) -> TickStart {
        if self.state != ControllerState::Scanning {
            return TickStart::NotScanning;
        }
        if self.processing {
            self.stats.skipped_busy += 1;
            debug!("tick skipped, previous tick still processing");
            return TickStart::Busy;
        }
        let frame = match self.source.current_frame() {
            Ok(frame) => frame,
            Err(err) => {
                self.stats.no_frame += 1;
                self.aggregator.skip_tick();
                debug!(error = %err, "tick without frame");
                return TickStart::NoFrame;
            }
        };
        // still held by a tick that outlived a stop
        let Some(pipeline) = self.pipeline.take() else {
            self.stats.skipped_busy += 1;
            return TickStart::Busy;
        };
        self.processing = true;
        TickStart::Ready(TickJob {
            generation: self.generation,
            frame,
            pipeline,
        })
    }

    /// Merge a finished tick; `None` when its results were discarded
    pub fn finish_tick(&mut self, output: TickOutput) -> Option<MergeOutcome> {
        let TickOutput {
            generation,
            pipeline,
            result,
            elapsed,
        } = output;
        self.pipeline = Some(pipeline);

        if generation != self.generation || self.state != ControllerState::Scanning {
            self.stats.discarded += 1;
            debug!("tick finished after stop, results discarded");
            return None;
        }
        self.processing = false;
        let interval = self.schedule.update(elapsed);
        self.session.set_interval(interval);

        let tick = match result {
            Ok(tick) => tick,
            Err(err) => {
                self.stats.aborted += 1;
                self.aggregator.skip_tick();
                debug!(error = %err, "tick aborted");
                return None;
            }
        };

        let outcome = self.aggregator.merge(
            &tick.candidates,
            tick.frame_size,
            tick.captured_at,
            &mut self.session,
        );
        self.stats.completed += 1;

        for code in &outcome.new_codes {
            self.emit(ScanEvent::Detected(code.clone()));
        }
        for payload in &outcome.duplicates {
            self.emit(ScanEvent::Duplicate {
                payload: payload.clone(),
                observed_at: tick.captured_at,
            });
        }
        if let Some(first) = outcome.new_codes.first() {
            if self.debouncer.try_fire(tokio::time::Instant::now()) {
                self.emit(ScanEvent::Feedback {
                    payload: first.payload.clone(),
                });
            }
        }

        if let Some(limit) = self.config.stop_after_detections {
            if self.session.len() >= limit {
                info!(limit, "detection limit reached");
                self.stop();
            }
        }
        Some(outcome)
    }

    /// Run one tick to completion on a blocking worker
    pub async fn tick(&mut self) -> Option<MergeOutcome> {
        let TickStart::Ready(job) = self.begin_tick() else {
            return None;
        };
        match tokio::task::spawn_blocking(move || job.run()).await {
            Ok(output) => self.finish_tick(output),
            Err(err) => {
                self.recover_lost_tick(err);
                None
            }
        }
    }

    fn recover_lost_tick(&mut self, err: JoinError) {
        warn!(error = %err, "tick worker lost, rebuilding pipeline");
        self.pipeline = Some(ScanPipeline::from_config(&self.config));
        self.processing = false;
    }

    /// Apply commands queued through [`ControllerHandle`]s
    ///
    /// [`ScanController::run`] does this on its own; callers driving
    /// [`ScanController::tick`] by hand call it between ticks. Returns the
    /// number of commands applied.
    pub async fn poll_commands(&mut self) -> Result<usize> {
        let mut applied = 0;
        while let Ok(command) = self.command_rx.try_recv() {
            self.apply_command(command).await?;
            applied += 1;
        }
        Ok(applied)
    }

    async fn apply_command(&mut self, command: Command) -> Result<()> {
        debug!(?command, "controller command");
        match command {
            Command::Stop => self.stop(),
            Command::Clear => self.clear(),
            Command::Remove(id) => {
                self.remove(id);
            }
            Command::SwitchDevice(device_id) => {
                self.switch_device(device_id).await?;
            }
        }
        Ok(())
    }

    /// Start if idle, then tick until stopped
    ///
    /// Ticks fire every [`ScanController::interval`]; one that fires while the
    /// previous tick is processing is dropped. Returns once the controller is
    /// back in `Idle` and no tick is in flight.
    pub async fn run(&mut self) -> Result<()> {
        if self.state == ControllerState::Idle {
            self.start().await?;
        }
        let mut in_flight: Option<JoinHandle<TickOutput>> = None;
        let mut next_tick = tokio::time::Instant::now();
        let mut exit = Ok(());

        loop {
            if self.state != ControllerState::Scanning && in_flight.is_none() {
                break;
            }
            let scanning = self.state == ControllerState::Scanning;
            tokio::select! {
                _ = tokio::time::sleep_until(next_tick), if scanning => {
                    next_tick = tokio::time::Instant::now() + self.schedule.current();
                    if let TickStart::Ready(job) = self.begin_tick() {
                        in_flight = Some(tokio::task::spawn_blocking(move || job.run()));
                    }
                }
                joined = join_in_flight(&mut in_flight), if in_flight.is_some() => {
                    in_flight = None;
                    match joined {
                        Ok(output) => {
                            self.finish_tick(output);
                        }
                        Err(err) => self.recover_lost_tick(err),
                    }
                }
                Some(command) = self.command_rx.recv() => {
                    let switching = matches!(command, Command::SwitchDevice(_));
                    if let Err(err) = self.apply_command(command).await {
                        exit = Err(err);
                    }
                    if switching {
                        next_tick = tokio::time::Instant::now();
                    }
                }
            }
        }
        exit
    }
}

async fn join_in_flight(
    slot: &mut Option<JoinHandle<TickOutput>>,
) -> std::result::Result<TickOutput, JoinError> {
    match slot {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

impl std::fmt::Debug for ScanController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanController")
            .field("state", &self.state)
            .field("processing", &self.processing)
            .field("codes", &self.session.len())
            .field("interval", &self.schedule.current())
            .finish()
    }
}
