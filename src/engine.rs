// src/engine.rs
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::signal::{
    Snapshot, SnapshotPublisher, StreamError, StreamScheduler, TickReport, WaveformSynthesizer,
};
use crate::types::{StopOutcome, StreamCommand};

/// Handle to a running scheduler thread.
struct StreamHandle {
    tx_cmd: Sender<StreamCommand>,
    done_rx: Receiver<()>,
    join: JoinHandle<StreamScheduler>,
}

enum SchedulerState {
    Idle(Box<StreamScheduler>),
    Running(StreamHandle),
    // A stop timed out. The thread already has its Stop command and is joined once it exits.
    Detaching(StreamHandle),
    // The thread panicked.
    Lost,
}

/// Explicitly owned ECG engine: one producer (the scheduler), any number of readers.
///
/// Readers get snapshots through [`EcgEngine::read`] or a shared [`SnapshotPublisher`]
/// from [`EcgEngine::publisher`]; neither can block the producer beyond a pointer swap.
pub struct EcgEngine {
    config: EngineConfig,
    publisher: Arc<SnapshotPublisher>,
    state: SchedulerState,
}

impl EcgEngine {
    pub fn new(config: EngineConfig) -> Result<Self, StreamError> {
        config.validate()?;
        let synth = WaveformSynthesizer::new(config.synth_settings(), config.seed)?;
        let scheduler =
            StreamScheduler::new(synth, config.samples_per_tick, config.tick_period())?;
        let publisher = scheduler.publisher();
        info!(
            "engine ready: {} leads x {} samples, {} per tick every {:?}",
            config.channel_count,
            config.buffer_len,
            config.samples_per_tick,
            config.tick_period()
        );
        Ok(Self {
            config,
            publisher,
            state: SchedulerState::Idle(Box::new(scheduler)),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn publisher(&self) -> Arc<SnapshotPublisher> {
        Arc::clone(&self.publisher)
    }

    pub fn read(&self) -> Arc<Snapshot> {
        self.publisher.read()
    }

    pub fn is_running(&self) -> bool {
        matches!(&self.state, SchedulerState::Running(handle) if !handle.join.is_finished())
    }

    /// Runs one tick on the caller's thread. Only allowed while the scheduler is stopped.
    pub fn step(&mut self) -> Result<TickReport, StreamError> {
        self.reclaim_finished();
        match &mut self.state {
            SchedulerState::Idle(scheduler) => scheduler.tick(),
            SchedulerState::Running(_) => Err(StreamError::AlreadyRunning),
            SchedulerState::Detaching(_) => Err(StreamError::Stopping),
            SchedulerState::Lost => Err(StreamError::SchedulerLost),
        }
    }

    pub fn start(&mut self) -> Result<(), StreamError> {
        self.reclaim_finished();
        let scheduler = match std::mem::replace(&mut self.state, SchedulerState::Lost) {
            SchedulerState::Idle(scheduler) => scheduler,
            running @ SchedulerState::Running(_) => {
                self.state = running;
                return Err(StreamError::AlreadyRunning);
            }
            detaching @ SchedulerState::Detaching(_) => {
                self.state = detaching;
                return Err(StreamError::Stopping);
            }
            SchedulerState::Lost => return Err(StreamError::SchedulerLost),
        };
        let (tx_cmd, rx_cmd) = channel();
        let (done_tx, done_rx) = channel();
        let join = spawn_thread(*scheduler, rx_cmd, done_tx);
        self.state = SchedulerState::Running(StreamHandle {
            tx_cmd,
            done_rx,
            join,
        });
        info!("stream started at version {}", self.publisher.version());
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), StreamError> {
        self.send(StreamCommand::Pause)
    }

    pub fn resume(&mut self) -> Result<(), StreamError> {
        self.send(StreamCommand::Resume)
    }

    pub fn set_period(&mut self, period: Duration) -> Result<(), StreamError> {
        if period.is_zero() {
            return Err(StreamError::Config("tick period must be positive".into()));
        }
        self.reclaim_finished();
        if let SchedulerState::Idle(scheduler) = &mut self.state {
            scheduler.set_period(period);
            return Ok(());
        }
        self.send(StreamCommand::SetPeriod(period))
    }

    /// Asks the scheduler to stop after its current tick and waits up to the configured
    /// timeout. On success the scheduler state is reclaimed and `start` may be called again.
    /// After a timeout the thread is reclaimed by a later `stop`, `start` or `step` once it exits.
    pub fn stop(&mut self) -> StopOutcome {
        match std::mem::replace(&mut self.state, SchedulerState::Lost) {
            SchedulerState::Running(handle) => {
                handle.tx_cmd.send(StreamCommand::Stop).ok();
                self.await_exit(handle)
            }
            SchedulerState::Detaching(handle) => self.await_exit(handle),
            other => {
                self.state = other;
                StopOutcome::NotRunning
            }
        }
    }

    fn await_exit(&mut self, handle: StreamHandle) -> StopOutcome {
        match handle.done_rx.recv_timeout(self.config.stop_timeout()) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => self.join(handle),
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "scheduler did not exit within {:?}; it will be reclaimed once it does",
                    self.config.stop_timeout()
                );
                self.state = SchedulerState::Detaching(handle);
                StopOutcome::TimedOut
            }
        }
    }

    fn join(&mut self, handle: StreamHandle) -> StopOutcome {
        match handle.join.join() {
            Ok(scheduler) => {
                info!("stream stopped at version {}", self.publisher.version());
                self.state = SchedulerState::Idle(Box::new(scheduler));
                StopOutcome::Joined
            }
            Err(_) => {
                error!("scheduler thread panicked");
                self.state = SchedulerState::Lost;
                StopOutcome::Crashed
            }
        }
    }

    // Takes back a scheduler whose thread has already exited, whether it was stopped
    // with a timeout or ended on its own after a failed tick.
    fn reclaim_finished(&mut self) {
        let finished = matches!(
            &self.state,
            SchedulerState::Running(handle) | SchedulerState::Detaching(handle)
                if handle.join.is_finished()
        );
        if !finished {
            return;
        }
        if let SchedulerState::Running(handle) | SchedulerState::Detaching(handle) =
            std::mem::replace(&mut self.state, SchedulerState::Lost)
        {
            debug!("reclaiming exited scheduler thread");
            self.join(handle);
        }
    }

    fn send(&mut self, cmd: StreamCommand) -> Result<(), StreamError> {
        self.reclaim_finished();
        match &self.state {
            SchedulerState::Running(handle) => {
                if handle.tx_cmd.send(cmd.clone()).is_err() {
                    warn!("scheduler thread is gone; dropped {cmd:?}");
                }
                Ok(())
            }
            SchedulerState::Idle(_) => {
                debug!("scheduler idle; ignoring {cmd:?}");
                Ok(())
            }
            SchedulerState::Detaching(_) => Err(StreamError::Stopping),
            SchedulerState::Lost => Err(StreamError::SchedulerLost),
        }
    }
}

impl Drop for EcgEngine {
    fn drop(&mut self) {
        if matches!(
            self.state,
            SchedulerState::Running(_) | SchedulerState::Detaching(_)
        ) {
            self.stop();
        }
    }
}

/// Producer loop. The only suspension point is the command wait, so a Stop wakes it at once;
/// commands are read between ticks, so a tick in progress always finishes its commit.
fn spawn_thread(
    mut scheduler: StreamScheduler,
    rx_cmd: Receiver<StreamCommand>,
    done_tx: Sender<()>,
) -> JoinHandle<StreamScheduler> {
    thread::spawn(move || {
        let mut paused = false;
        let mut next_tick = Instant::now() + scheduler.period();

        loop {
            // ============================================================
            // 1. Wait for the next tick or a command
            // ============================================================
            let received = if paused {
                rx_cmd.recv().map_err(|_| RecvTimeoutError::Disconnected)
            } else {
                rx_cmd.recv_timeout(next_tick.saturating_duration_since(Instant::now()))
            };

            match received {
                Ok(StreamCommand::Stop) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("engine handle dropped; scheduler exiting");
                    break;
                }
                Ok(StreamCommand::Pause) => {
                    if !paused {
                        paused = true;
                        info!("stream paused");
                    }
                }
                Ok(StreamCommand::Resume) => {
                    if paused {
                        paused = false;
                        next_tick = Instant::now() + scheduler.period();
                        info!("stream resumed");
                    }
                }
                Ok(StreamCommand::SetPeriod(period)) => {
                    scheduler.set_period(period);
                    next_tick = Instant::now() + period;
                    info!("tick period set to {period:?}");
                }
                // ============================================================
                // 2. Generate, commit and publish
                // ============================================================
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(e) = scheduler.tick() {
                        error!("tick failed, stopping stream: {e}");
                        break;
                    }
                    next_tick += scheduler.period();
                    let now = Instant::now();
                    if next_tick <= now {
                        // Fell behind; skip the missed ticks instead of bursting.
                        next_tick = now + scheduler.period();
                    }
                }
            }
        }

        done_tx.send(()).ok();
        scheduler
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config(seed: u64) -> EngineConfig {
        EngineConfig {
            seed: Some(seed),
            tick_period_ms: 5,
            stop_timeout_ms: 2_000,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn manual_steps_advance_version() {
        let mut engine = EcgEngine::new(fast_config(42)).unwrap();
        assert_eq!(engine.read().version(), 0);
        engine.step().unwrap();
        engine.step().unwrap();
        assert_eq!(engine.read().version(), 2);
    }

    #[test]
    fn running_engine_ticks_and_stops_cleanly() {
        let mut engine = EcgEngine::new(fast_config(1)).unwrap();
        let publisher = engine.publisher();
        engine.start().unwrap();
        assert!(engine.is_running());
        assert!(matches!(engine.start(), Err(StreamError::AlreadyRunning)));
        assert!(matches!(engine.step(), Err(StreamError::AlreadyRunning)));
        let fresh = publisher.wait_newer(2, Duration::from_secs(5)).unwrap();
        assert!(fresh.version() > 2);
        assert_eq!(engine.stop(), StopOutcome::Joined);
        assert!(!engine.is_running());
        assert_eq!(engine.stop(), StopOutcome::NotRunning);

        // Restart picks up from the reclaimed state.
        let stopped_at = engine.read().version();
        engine.step().unwrap();
        assert_eq!(engine.read().version(), stopped_at + 1);
    }

    #[test]
    fn pause_freezes_the_published_version() {
        let mut engine = EcgEngine::new(fast_config(2)).unwrap();
        let publisher = engine.publisher();
        engine.start().unwrap();
        publisher.wait_newer(0, Duration::from_secs(5)).unwrap();
        engine.pause().unwrap();
        // Let any tick that raced the pause land.
        thread::sleep(Duration::from_millis(30));
        let frozen = publisher.version();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(publisher.version(), frozen);
        engine.resume().unwrap();
        assert!(publisher
            .wait_newer(frozen, Duration::from_secs(5))
            .is_some());
        assert_eq!(engine.stop(), StopOutcome::Joined);
    }

    #[test]
    fn set_period_validates_and_applies_when_idle() {
        let mut engine = EcgEngine::new(fast_config(3)).unwrap();
        assert!(engine.set_period(Duration::ZERO).is_err());
        engine.set_period(Duration::from_millis(20)).unwrap();
        engine.pause().unwrap();
        engine.resume().unwrap();
        assert_eq!(engine.stop(), StopOutcome::NotRunning);
    }

    /// Swaps the idle scheduler into a hand-driven thread so exit timing is under test control.
    fn install_thread<F>(engine: &mut EcgEngine, body: F)
    where
        F: FnOnce(StreamScheduler, Sender<()>) -> StreamScheduler + Send + 'static,
    {
        let scheduler = match std::mem::replace(&mut engine.state, SchedulerState::Lost) {
            SchedulerState::Idle(scheduler) => *scheduler,
            _ => panic!("engine must be idle"),
        };
        let (tx_cmd, _rx_cmd) = channel();
        let (done_tx, done_rx) = channel();
        let join = thread::spawn(move || body(scheduler, done_tx));
        engine.state = SchedulerState::Running(StreamHandle {
            tx_cmd,
            done_rx,
            join,
        });
    }

    fn step_when_reclaimed(engine: &mut EcgEngine) -> TickReport {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match engine.step() {
                Ok(report) => return report,
                Err(StreamError::Stopping | StreamError::AlreadyRunning)
                    if Instant::now() < deadline =>
                {
                    thread::sleep(Duration::from_millis(1));
                }
                Err(e) => panic!("scheduler was not reclaimed: {e}"),
            }
        }
    }

    #[test]
    fn timed_out_stop_recovers_once_the_thread_exits() {
        let mut engine = EcgEngine::new(EngineConfig {
            stop_timeout_ms: 10,
            ..fast_config(4)
        })
        .unwrap();
        let (release_tx, release_rx) = channel::<()>();
        install_thread(&mut engine, move |scheduler, done_tx| {
            release_rx.recv().ok();
            done_tx.send(()).ok();
            scheduler
        });

        assert_eq!(engine.stop(), StopOutcome::TimedOut);
        assert!(matches!(engine.start(), Err(StreamError::Stopping)));
        assert!(matches!(engine.step(), Err(StreamError::Stopping)));
        assert!(matches!(engine.pause(), Err(StreamError::Stopping)));
        assert_eq!(engine.read().version(), 0);

        release_tx.send(()).unwrap();
        let report = step_when_reclaimed(&mut engine);
        assert_eq!(report.version, 1);
        assert_eq!(engine.stop(), StopOutcome::NotRunning);
    }

    #[test]
    fn second_stop_joins_a_detached_thread() {
        let mut engine = EcgEngine::new(EngineConfig {
            stop_timeout_ms: 10,
            ..fast_config(5)
        })
        .unwrap();
        let (release_tx, release_rx) = channel::<()>();
        install_thread(&mut engine, move |scheduler, done_tx| {
            release_rx.recv().ok();
            done_tx.send(()).ok();
            scheduler
        });
        assert_eq!(engine.stop(), StopOutcome::TimedOut);
        release_tx.send(()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut outcome = engine.stop();
        while outcome == StopOutcome::TimedOut && Instant::now() < deadline {
            outcome = engine.stop();
        }
        assert_eq!(outcome, StopOutcome::Joined);
        assert_eq!(engine.stop(), StopOutcome::NotRunning);
    }

    #[test]
    fn thread_that_exits_on_its_own_is_reclaimed() {
        let mut engine = EcgEngine::new(fast_config(6)).unwrap();
        // Ends without a Stop command, as the loop does after a failed tick.
        install_thread(&mut engine, |scheduler, done_tx| {
            done_tx.send(()).ok();
            scheduler
        });
        let report = step_when_reclaimed(&mut engine);
        assert_eq!(report.version, 1);
        assert!(!engine.is_running());
        engine.start().unwrap();
        assert!(engine.is_running());
        assert_eq!(engine.stop(), StopOutcome::Joined);
    }

    #[test]
    fn panicked_thread_is_reported_and_lost() {
        let mut engine = EcgEngine::new(fast_config(7)).unwrap();
        install_thread(&mut engine, |_scheduler, _done_tx| panic!("tick exploded"));
        assert_eq!(engine.stop(), StopOutcome::Crashed);
        assert!(matches!(engine.start(), Err(StreamError::SchedulerLost)));
        assert!(matches!(engine.step(), Err(StreamError::SchedulerLost)));
        assert_eq!(engine.read().version(), 0);
    }
}
