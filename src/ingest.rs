use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::binance::ws::TradeStreamConsumer;
use crate::error::AppError;
use crate::event::{IngestPhase, IngestStatus};
use crate::tick_store::TickStore;

/// How long `stop` waits for the worker thread before giving up on it.
pub const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(20);

struct Worker {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

/// Owns the lifecycle of the single background ingest worker.
///
/// The worker is a dedicated OS thread driving a current-thread tokio runtime.
/// Rust never joins spawned threads at process exit, so a worker that ignores
/// cancellation cannot hold the process open.
pub struct IngestController {
    symbols: Vec<String>,
    ws_base_url: String,
    store: Arc<TickStore>,
    status_tx: Arc<watch::Sender<IngestStatus>>,
    worker: Mutex<Option<Worker>>,
    workers_spawned: AtomicU64,
}

impl IngestController {
    pub fn new(ws_base_url: &str, symbols: Vec<String>, store: Arc<TickStore>) -> Self {
        let (status_tx, _) = watch::channel(IngestStatus::default());
        Self {
            symbols,
            ws_base_url: ws_base_url.to_string(),
            store,
            status_tx: Arc::new(status_tx),
            worker: Mutex::new(None),
            workers_spawned: AtomicU64::new(0),
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Spawn the worker unless one is already running. Returns `true` when a
    /// new worker was spawned.
    pub fn start(&self) -> Result<bool, AppError> {
        let mut slot = self.worker.lock();
        if let Some(worker) = slot.as_ref() {
            if !worker.handle.is_finished() {
                tracing::debug!("Ingest worker already running");
                return Ok(false);
            }
        }
        if let Some(finished) = slot.take() {
            let _ = finished.handle.join();
        }

        let consumer = TradeStreamConsumer::new(
            &self.ws_base_url,
            &self.symbols,
            Arc::clone(&self.store),
            Arc::clone(&self.status_tx),
        )?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.status_tx.send_replace(IngestStatus {
            phase: IngestPhase::Connecting,
            ..IngestStatus::default()
        });

        let handle = std::thread::Builder::new()
            .name("tick-ingest".to_string())
            .spawn(move || run_worker(consumer, shutdown_rx))?;

        self.workers_spawned.fetch_add(1, Ordering::SeqCst);
        tracing::info!(symbols = ?self.symbols, "Ingest worker started");
        *slot = Some(Worker {
            handle,
            shutdown_tx,
        });
        Ok(true)
    }

    /// Signal cancellation and wait up to [`STOP_JOIN_TIMEOUT`] for the worker
    /// to exit. Returns `false` if the worker was still running at the
    /// deadline; it stays tracked, so `start` keeps treating it as active
    /// until it exits. Stopping an idle controller is a no-op that returns
    /// `true`.
    pub fn stop(&self) -> bool {
        let thread_id = {
            let slot = self.worker.lock();
            let Some(worker) = slot.as_ref() else {
                return true;
            };
            let _ = worker.shutdown_tx.send(true);
            worker.handle.thread().id()
        };

        let deadline = Instant::now() + STOP_JOIN_TIMEOUT;
        loop {
            {
                let mut slot = self.worker.lock();
                let (tracked, finished) = match slot.as_ref() {
                    Some(w) => (w.handle.thread().id() == thread_id, w.handle.is_finished()),
                    None => (false, true),
                };
                // Reaped by a concurrent stop/start.
                if !tracked {
                    return true;
                }
                if finished {
                    if let Some(worker) = slot.take() {
                        if worker.handle.join().is_err() {
                            tracing::error!("Ingest worker panicked");
                        }
                    }
                    tracing::info!("Ingest worker stopped");
                    return true;
                }
            }
            if Instant::now() >= deadline {
                tracing::warn!(
                    timeout_ms = STOP_JOIN_TIMEOUT.as_millis() as u64,
                    "Ingest worker did not exit before stop deadline"
                );
                return false;
            }
            std::thread::sleep(STOP_POLL_INTERVAL);
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    pub fn status(&self) -> IngestStatus {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<IngestStatus> {
        self.status_tx.subscribe()
    }

    /// Total workers spawned over the controller's lifetime.
    pub fn workers_spawned(&self) -> u64 {
        self.workers_spawned.load(Ordering::SeqCst)
    }
}

impl Drop for IngestController {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().as_ref() {
            let _ = worker.shutdown_tx.send(true);
        }
    }
}

fn run_worker(consumer: TradeStreamConsumer, shutdown_rx: watch::Receiver<bool>) {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build ingest runtime");
            consumer.mark_failed(format!("runtime: {}", e));
            return;
        }
    };

    if let Err(e) = runtime.block_on(consumer.run(shutdown_rx)) {
        tracing::error!(error = %e, "Ingest worker failed");
    }
}
