//! Sampling runtime.
//!
//! Owns the history stores, the recognition engine and the domain adapter.
//! The sampling loop is the only writer into the stores. Read-side
//! operations copy what they need under the store lock and release it before
//! doing any work.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::adapter::{CollectedChanges, DomainAdapter, TickContext};
use crate::bundle::{BundleExporter, EvidenceBundle};
use crate::config::RuntimeConfig;
use crate::episode::Episode;
use crate::error::{ObservationError, ObservationResult};
use crate::history::{HistorySnapshot, HistoryStores};
use crate::readiness::{ReadinessResult, ReadinessScorer};
use crate::recognition::{EpisodeRecognition, RecognitionEngine};
use crate::timeline::Timeline;
use crate::windowing::{WindowKind, WindowPolicy};

/// Where sample timestamps come from.
#[derive(Debug)]
enum SampleClock {
    Wall { ticks: u64 },
    /// Accelerated mode: each tick advances by one sampling interval.
    Simulated {
        next: DateTime<Utc>,
        step: chrono::Duration,
        ticks: u64,
    },
}

impl SampleClock {
    fn for_config(config: &RuntimeConfig, start: DateTime<Utc>) -> Self {
        if config.accelerate {
            Self::Simulated {
                next: start,
                step: chrono::Duration::milliseconds(config.sample_interval_ms as i64),
                ticks: 0,
            }
        } else {
            Self::Wall { ticks: 0 }
        }
    }

    fn advance(&mut self) -> (DateTime<Utc>, u64) {
        match self {
            Self::Wall { ticks } => {
                let tick = *ticks;
                *ticks += 1;
                (Utc::now(), tick)
            }
            Self::Simulated { next, step, ticks } => {
                let at = *next;
                let tick = *ticks;
                *next = at + *step;
                *ticks += 1;
                (at, tick)
            }
        }
    }
}

/// What one tick appended.
#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub at: DateTime<Utc>,
    pub events: usize,
    pub snapshots: usize,
}

/// Outcome of the on-demand freeze path.
#[derive(Clone, Debug)]
pub struct FreezeResult {
    pub recognition: EpisodeRecognition,
    pub bundle: EvidenceBundle,
    /// Location reported by the exporter.
    pub location: String,
}

/// The evidence pipeline for one device.
pub struct EvidenceRuntime {
    config: RuntimeConfig,
    windows: WindowPolicy,
    stores: Mutex<HistoryStores>,
    engine: Mutex<RecognitionEngine>,
    adapter: Mutex<Box<dyn DomainAdapter>>,
    clock: Mutex<SampleClock>,
    exporter: Arc<dyn BundleExporter>,
    readiness: ReadinessScorer,
}

impl EvidenceRuntime {
    pub fn new(
        config: RuntimeConfig,
        adapter: Box<dyn DomainAdapter>,
        exporter: Arc<dyn BundleExporter>,
    ) -> ObservationResult<Self> {
        Self::starting_at(config, adapter, exporter, Utc::now())
    }

    /// Like [`EvidenceRuntime::new`], with the simulated clock starting at
    /// `start`. Only accelerated runtimes use the start time.
    pub fn starting_at(
        config: RuntimeConfig,
        adapter: Box<dyn DomainAdapter>,
        exporter: Arc<dyn BundleExporter>,
        start: DateTime<Utc>,
    ) -> ObservationResult<Self> {
        config.validate()?;

        let windows = config.windows;
        let stores = HistoryStores::new(&config.history, config.sample_interval());
        let engine = RecognitionEngine::new(windows, &config.detector, config.episodes.clone());

        info!(
            adapter = adapter.name(),
            interval_ms = config.sample_interval_ms,
            accelerate = config.accelerate,
            metric_capacity = stores.metrics.capacity(),
            "Evidence runtime created"
        );

        Ok(Self {
            clock: Mutex::new(SampleClock::for_config(&config, start)),
            readiness: ReadinessScorer::new(config.readiness.clone()),
            config,
            windows,
            stores: Mutex::new(stores),
            engine: Mutex::new(engine),
            adapter: Mutex::new(adapter),
            exporter,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    // ── Write Path ──────────────────────────────────────────────────────

    /// Collect one sample plus any changes and append them.
    ///
    /// Collection happens before the store lock is taken. Only a failed
    /// sample fails the tick.
    pub fn tick_once(&self) -> ObservationResult<TickReport> {
        let (at, tick) = self
            .clock
            .lock()
            .map_err(|_| ObservationError::LockError)?
            .advance();
        let ctx = TickContext {
            at,
            window_ref: self.windows.window_ref(at, WindowKind::Short),
            tick,
        };

        let (sample, changes) = {
            let mut adapter = self.adapter.lock().map_err(|_| ObservationError::LockError)?;
            let sample = adapter.collect_metric_sample(&ctx)?;
            // A failed change collection still keeps the sample.
            let changes = match adapter.collect_change_events_and_snapshots(&ctx) {
                Ok(changes) => changes,
                Err(e) => {
                    warn!(
                        adapter = adapter.name(),
                        tick,
                        error = %e,
                        "Change collection failed, recording zero events"
                    );
                    CollectedChanges::default()
                }
            };
            (sample, changes)
        };

        let report = TickReport {
            tick,
            at,
            events: changes.events.len(),
            snapshots: changes.snapshots.len(),
        };

        let mut stores = self.stores.lock().map_err(|_| ObservationError::LockError)?;
        stores.metrics.append(sample);
        for event in changes.events {
            stores.events.append(event);
        }
        for snapshot in changes.snapshots {
            stores.snapshots.append(snapshot);
        }
        drop(stores);

        debug!(
            tick,
            window = %ctx.window_ref,
            events = report.events,
            snapshots = report.snapshots,
            "Sample collected"
        );
        Ok(report)
    }

    /// Run `n` ticks back to back. Stops at the first failing tick.
    pub fn run_ticks(&self, n: usize) -> ObservationResult<usize> {
        for _ in 0..n {
            self.tick_once()?;
        }
        Ok(n)
    }

    /// Start the periodic sampling loop on the current tokio runtime.
    ///
    /// A failing tick is logged and the loop carries on. Accelerated
    /// runtimes tick every millisecond.
    pub fn spawn_sampling(self: &Arc<Self>) -> SamplingHandle {
        let runtime = Arc::clone(self);
        let period = if self.config.accelerate {
            Duration::from_millis(1)
        } else {
            self.config.sample_interval()
        };
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period_ms = period.as_millis() as u64, "Sampling loop started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let rt = Arc::clone(&runtime);
                        match tokio::task::spawn_blocking(move || rt.tick_once()).await {
                            Ok(Ok(_)) => {}
                            Ok(Err(e)) => warn!(error = %e, "Sampling tick failed"),
                            Err(e) => warn!(error = %e, "Sampling tick aborted"),
                        }
                    }
                    _ = stop_rx.recv() => break,
                }
            }

            info!("Sampling loop stopped");
        });

        SamplingHandle {
            task,
            stop: stop_tx,
        }
    }

    // ── Read Path ───────────────────────────────────────────────────────

    /// Copy of all three history streams.
    pub fn history(&self) -> ObservationResult<HistorySnapshot> {
        let stores = self.stores.lock().map_err(|_| ObservationError::LockError)?;
        Ok(stores.snapshot())
    }

    /// One recognition cycle over the latest sample and change event.
    pub fn generate_recognition(&self) -> ObservationResult<EpisodeRecognition> {
        let (latest, latest_event) = {
            let stores = self.stores.lock().map_err(|_| ObservationError::LockError)?;
            (stores.metrics.last().cloned(), stores.events.last().cloned())
        };
        let mut engine = self.engine.lock().map_err(|_| ObservationError::LockError)?;
        engine.recognize(latest.as_ref(), latest_event.as_ref())
    }

    /// Recognize, pin an episode, freeze the full history and export it.
    pub fn freeze_export(&self) -> ObservationResult<FreezeResult> {
        let history = self.history()?;
        let recognition = {
            let mut engine = self.engine.lock().map_err(|_| ObservationError::LockError)?;
            engine.recognize_pinned(history.metrics.last(), history.events.last())?
        };

        let timeline = Timeline::build(&history);
        let bundle = EvidenceBundle::freeze(&recognition, timeline, Utc::now())?;
        let location = self.exporter.export(&bundle)?;

        Ok(FreezeResult {
            recognition,
            bundle,
            location,
        })
    }

    /// Install readiness over the buffered samples.
    pub fn readiness(&self) -> ObservationResult<ReadinessResult> {
        let samples = {
            let stores = self.stores.lock().map_err(|_| ObservationError::LockError)?;
            let window = self.readiness.thresholds().window_secs;
            // inclusive cutoff: one more sample than the window divides into
            let per_window = window * 1000 / self.config.sample_interval_ms.max(1) + 1;
            let keep = (per_window as usize).max(self.readiness.thresholds().min_samples);
            stores.metrics.tail(keep)
        };
        Ok(self.readiness.score(&samples))
    }

    pub fn current_episode(&self) -> ObservationResult<Option<Episode>> {
        let engine = self.engine.lock().map_err(|_| ObservationError::LockError)?;
        Ok(engine.current_episode().cloned())
    }

    /// Close the open episode, if any.
    pub fn clear_episode(&self) -> ObservationResult<Option<Episode>> {
        let mut engine = self.engine.lock().map_err(|_| ObservationError::LockError)?;
        Ok(engine.clear_episode())
    }
}

/// Handle for a running sampling loop.
pub struct SamplingHandle {
    task: tokio::task::JoinHandle<()>,
    stop: mpsc::Sender<()>,
}

impl SamplingHandle {
    /// Stop the loop and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.stop.send(()).await;
        let _ = self.task.await;
    }
}
