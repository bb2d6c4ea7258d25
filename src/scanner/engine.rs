//! Parallel host-discovery engine

use crate::config::ScanConfig;
use crate::discovery::{emit, DeviceRecord, EventSender, HostProbe, ScanEvent};
use crate::network::{address, AddressRange, NetworkBackend, SystemBackend};
use crate::scanner::{RateLimiter, ResultStore, ScanProgress};
use crate::{Result, ScanError};
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Shared by every worker of one scan and by snapshot readers.
struct ScanState {
    range: AddressRange,
    /// Offset of the next unclaimed address. 64 bits so that claiming past
    /// the end of a range ending at 255.255.255.255 cannot wrap.
    cursor: AtomicU64,
    completed: AtomicU64,
    live_workers: AtomicUsize,
    cancel: CancellationToken,
    finished: CancellationToken,
    limiter: RateLimiter,
    results: ResultStore,
    probe: HostProbe,
    events: Option<EventSender>,
}

impl ScanState {
    fn claim(&self) -> Option<u32> {
        let offset = self.cursor.fetch_add(1, Ordering::Relaxed);
        if offset >= self.range.len() {
            return None;
        }
        Some(self.range.start() + offset as u32)
    }

    fn is_alive(&self) -> bool {
        self.live_workers.load(Ordering::Acquire) > 0
    }
}

/// Decrements the live-worker count however the worker ends: normal exit,
/// cancellation, panic or abort.
struct LiveGuard(Arc<ScanState>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        let state = &self.0;
        if state.live_workers.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }

        if !state.cancel.is_cancelled() {
            let hosts = state.results.len();
            log::info!("Scan of {} complete: {} hosts", state.range, hosts);
            emit(state.events.as_ref(), ScanEvent::Completed { hosts });
        }
        state.finished.cancel();
    }
}

/// A started scan whose workers have not been joined yet.
struct Session {
    state: Arc<ScanState>,
    workers: Vec<JoinHandle<()>>,
    stop_timeout: Duration,
}

impl Session {
    /// Cancel, wait up to the stop timeout, abort whatever is left.
    async fn wind_down(self) {
        self.state.cancel.cancel();

        let settled =
            tokio::time::timeout(self.stop_timeout, self.state.finished.cancelled()).await;
        if settled.is_err() {
            let stuck = self.workers.iter().filter(|w| !w.is_finished()).count();
            log::warn!(
                "{} worker(s) still busy after {:?}, aborting",
                stuck,
                self.stop_timeout
            );
            emit(
                self.state.events.as_ref(),
                ScanEvent::StopTimedOut { aborted: stuck },
            );
            for worker in &self.workers {
                worker.abort();
            }
        }

        for result in join_all(self.workers).await {
            if let Err(e) = result {
                if e.is_panic() {
                    log::error!("Scan worker panicked: {}", e);
                }
            }
        }
    }
}

/// Runs one scan at a time over an address range.
///
/// Workers share a claim cursor, so every address in the range is probed by
/// exactly one worker. Results accumulate in completion order and stay
/// readable after the scan ends, until the next `start`.
pub struct ScanEngine {
    backend: Arc<dyn NetworkBackend>,
    session: Mutex<Option<Session>>,
    state: RwLock<Option<Arc<ScanState>>>,
}

impl Default for ScanEngine {
    fn default() -> Self {
        Self::new(Arc::new(SystemBackend::default()))
    }
}

impl ScanEngine {
    pub fn new(backend: Arc<dyn NetworkBackend>) -> Self {
        Self {
            backend,
            session: Mutex::new(None),
            state: RwLock::new(None),
        }
    }

    fn current(&self) -> Option<Arc<ScanState>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start scanning `range` in the background.
    ///
    /// Fails without touching the current results when a scan is still
    /// running, when `config` is invalid, or when the backend cannot be
    /// initialized.
    pub async fn start(
        &self,
        range: AddressRange,
        config: ScanConfig,
        events: Option<EventSender>,
    ) -> Result<()> {
        let mut session = self.session.lock().await;

        if session.as_ref().is_some_and(|s| s.state.is_alive()) {
            return Err(ScanError::AlreadyRunning);
        }
        config.validate()?;

        // previous scan ran to completion without a stop
        if let Some(finished) = session.take() {
            finished.wind_down().await;
            self.backend.shutdown().await;
        }

        if let Err(e) = self.backend.initialize().await {
            let reason = match e {
                ScanError::NetworkInit(reason) => reason,
                other => other.to_string(),
            };
            log::error!("Network init failed: {}", reason);
            emit(events.as_ref(), ScanEvent::NetworkInitFailed(reason.clone()));
            return Err(ScanError::NetworkInit(reason));
        }

        let worker_count = (config.worker_count() as u64).min(range.len()) as usize;
        let state = Arc::new(ScanState {
            range,
            cursor: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            live_workers: AtomicUsize::new(worker_count),
            cancel: CancellationToken::new(),
            finished: CancellationToken::new(),
            limiter: RateLimiter::new(config.rate_limit),
            results: ResultStore::new(),
            probe: HostProbe::new(Arc::clone(&self.backend), config.clone()),
            events,
        });

        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&state));

        log::info!(
            "Scanning {} ({} addresses) with {} workers",
            range,
            range.len(),
            worker_count
        );
        emit(state.events.as_ref(), ScanEvent::WorkersStarted(worker_count));

        let workers = (0..worker_count)
            .map(|id| tokio::spawn(run_worker(Arc::clone(&state), id)))
            .collect();

        *session = Some(Session {
            state,
            workers,
            stop_timeout: config.stop_timeout(),
        });
        Ok(())
    }

    /// Cancel the running scan and wait for its workers.
    ///
    /// A worker busy inside a probe only notices cancellation once the probe
    /// times out. Workers that outlast the stop timeout are aborted. Calling
    /// `stop` on an idle engine does nothing.
    pub async fn stop(&self) {
        let mut session = self.session.lock().await;
        let Some(current) = session.take() else {
            return;
        };

        current.wind_down().await;
        self.backend.shutdown().await;
        log::debug!("Scan stopped");
    }

    /// Resolve once every worker of the current scan has exited.
    pub async fn wait(&self) {
        if let Some(state) = self.current() {
            state.finished.cancelled().await;
        }
    }

    /// At least one worker is still alive.
    pub fn is_running(&self) -> bool {
        self.current().is_some_and(|s| s.is_alive())
    }

    pub fn snapshot(&self) -> Vec<DeviceRecord> {
        self.current()
            .map(|s| s.results.snapshot())
            .unwrap_or_default()
    }

    /// Replace the contents of `out` with the current results.
    pub fn snapshot_into(&self, out: &mut Vec<DeviceRecord>) -> usize {
        match self.current() {
            Some(state) => state.results.snapshot_into(out),
            None => {
                out.clear();
                0
            }
        }
    }

    pub fn progress(&self) -> ScanProgress {
        match self.current() {
            Some(state) => ScanProgress {
                total: state.range.len(),
                completed: state.completed.load(Ordering::Relaxed),
                alive: state.results.reachable_count(),
            },
            None => ScanProgress::default(),
        }
    }
}

impl Drop for ScanEngine {
    fn drop(&mut self) {
        if let Some(state) = self.current() {
            state.cancel.cancel();
        }
    }
}

async fn run_worker(state: Arc<ScanState>, id: usize) {
    let _guard = LiveGuard(Arc::clone(&state));
    log::trace!("worker {} started", id);

    while !state.cancel.is_cancelled() {
        let Some(addr) = state.claim() else {
            break;
        };

        if !state.limiter.acquire(&state.cancel).await {
            break;
        }

        let events = state.events.as_ref();
        emit(events, ScanEvent::Scanning(address::format(addr)));

        let record = state.probe.identify(addr, events).await;
        state.results.push(record);
        state.completed.fetch_add(1, Ordering::Relaxed);
    }

    log::trace!("worker {} exiting", id);
}
