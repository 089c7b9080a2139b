//! Session registry implementation
//!
//! Worker-scoped ownership and lifecycle of browser sessions. Exactly one
//! session per worker, enforced with per-worker mutual exclusion: each
//! worker gets its own slot with its own creation lock, so workers never
//! serialize on each other. The registry map lock is only held for slot
//! lookup, never across session construction.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::{BrowserKind, Config};
use crate::session::session::Session;
use crate::session::traits::{SessionBackend, SessionState};
use crate::{Error, Result};

/// Per-worker slot. The creation lock serializes acquire/release for one
/// worker; the session cell is readable without it for `current` lookups.
#[derive(Debug, Default)]
struct WorkerSlot {
    session: RwLock<Option<Arc<Session>>>,
    create_lock: Mutex<()>,
}

/// Outcome of a `release_all` sweep. Individual close failures are
/// collected here instead of aborting the sweep.
#[derive(Debug, Default)]
pub struct ReleaseReport {
    /// Workers whose sessions closed cleanly
    pub released: Vec<String>,
    /// Workers whose native close failed, with the failure
    pub failures: Vec<(String, Error)>,
}

impl ReleaseReport {
    /// Whether every session went down cleanly
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Session registry
///
/// The only structure shared across workers. Slots persist for the life of
/// the registry; an empty slot and an absent slot are both "no session".
#[derive(Debug)]
pub struct SessionRegistry {
    backend: Arc<dyn SessionBackend>,
    config: Config,
    slots: RwLock<HashMap<String, Arc<WorkerSlot>>>,
}

impl SessionRegistry {
    /// Create a new registry over a backend
    pub fn new(backend: Arc<dyn SessionBackend>, config: Config) -> Self {
        Self {
            backend,
            config,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry backed by scripted mock transports
    pub fn mock(config: Config) -> Self {
        Self::new(
            Arc::new(crate::session::mock::MockSessionBackend::new()),
            config,
        )
    }

    /// Run configuration this registry was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn slot(&self, worker_id: &str) -> Arc<WorkerSlot> {
        {
            let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
            if let Some(slot) = slots.get(worker_id) {
                return Arc::clone(slot);
            }
        }

        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(slots.entry(worker_id.to_string()).or_default())
    }

    /// Acquire the calling worker's session, creating it on first use.
    ///
    /// Returns the existing session while it is `Ready`; a session found in
    /// any other state is discarded and replaced. Construction failures
    /// leave no partial registration behind.
    #[instrument(skip(self))]
    pub async fn acquire(&self, worker_id: &str, kind: BrowserKind) -> Result<Arc<Session>> {
        let slot = self.slot(worker_id);

        // Serializes same-worker callers only; other workers hold other locks.
        let _creating = slot.create_lock.lock().await;

        let existing = slot
            .session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(existing) = existing {
            if existing.is_ready() {
                debug!("Worker {} reuses session {}", worker_id, existing.id());
                return Ok(existing);
            }
            warn!(
                "Worker {} held a {} session, replacing it",
                worker_id,
                existing.state()
            );
            slot.session.write().unwrap_or_else(|e| e.into_inner()).take();
            let _ = existing.close().await;
        }

        info!("Creating {} session for worker {}", kind, worker_id);

        let transport = self.backend.open(worker_id, kind, &self.config).await?;
        Self::apply_capabilities(&transport, &self.config).await?;

        let session = Arc::new(Session::new(
            worker_id,
            kind,
            self.config.headless,
            transport,
        ));
        session.advance(SessionState::Ready)?;

        *slot.session.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&session));

        info!("Session {} ready for worker {}", session.id(), worker_id);
        Ok(session)
    }

    /// Acquire with the configured browser kind
    pub async fn acquire_default(&self, worker_id: &str) -> Result<Arc<Session>> {
        self.acquire(worker_id, self.config.browser).await
    }

    /// Apply the configured capability set before the session goes `Ready`.
    async fn apply_capabilities(
        transport: &crate::session::traits::SessionTransport,
        config: &Config,
    ) -> Result<()> {
        if let Some(dir) = &config.download_dir {
            transport
                .client
                .call_method(
                    "Browser.setDownloadBehavior",
                    serde_json::json!({ "behavior": "allow", "downloadPath": dir }),
                )
                .await
                .map_err(|e| {
                    Error::session_start(format!("Failed to set download behavior: {}", e))
                })?;
        }
        Ok(())
    }

    /// Look up the worker's session without creating one
    pub fn current(&self, worker_id: &str) -> Result<Arc<Session>> {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots
            .get(worker_id)
            .and_then(|slot| {
                slot.session
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone()
            })
            .ok_or_else(|| Error::session_unavailable(format!("no session for worker {}", worker_id)))
    }

    /// Release the worker's session.
    ///
    /// Idempotent: releasing an unknown worker or an already-released
    /// session is a no-op, never an error.
    #[instrument(skip(self))]
    pub async fn release(&self, worker_id: &str) -> Result<()> {
        let slot = {
            let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
            match slots.get(worker_id) {
                Some(slot) => Arc::clone(slot),
                None => {
                    debug!("Release for unknown worker {} ignored", worker_id);
                    return Ok(());
                }
            }
        };

        let _creating = slot.create_lock.lock().await;

        let session = slot
            .session
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        match session {
            Some(session) => {
                info!("Releasing session {} (worker {})", session.id(), worker_id);
                session.close().await
            }
            None => {
                debug!("Worker {} had no session to release", worker_id);
                Ok(())
            }
        }
    }

    /// Release every still-registered session.
    ///
    /// Used at suite teardown. One stuck session must not block cleanup of
    /// the rest, so failures are collected into the report.
    pub async fn release_all(&self) -> ReleaseReport {
        let workers: Vec<String> = {
            let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
            slots.keys().cloned().collect()
        };

        let mut report = ReleaseReport::default();
        for worker_id in workers {
            match self.release(&worker_id).await {
                Ok(()) => report.released.push(worker_id),
                Err(e) => {
                    warn!("Session for worker {} failed to close: {}", worker_id, e);
                    report.failures.push((worker_id, e));
                }
            }
        }

        info!(
            "Release sweep done: {} released, {} failed",
            report.released.len(),
            report.failures.len()
        );
        report
    }

    /// Number of live sessions currently registered
    pub fn session_count(&self) -> usize {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots
            .values()
            .filter(|slot| {
                slot.session
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .is_some()
            })
            .count()
    }

    /// Run `f` with the worker's session, releasing it on every exit path.
    ///
    /// The closure's error wins over a release error; a release failure
    /// after a successful run is surfaced.
    pub async fn scoped<T, F, Fut>(&self, worker_id: &str, kind: BrowserKind, f: F) -> Result<T>
    where
        F: FnOnce(Arc<Session>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let session = self.acquire(worker_id, kind).await?;
        let outcome = f(session).await;
        let released = self.release(worker_id).await;

        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(release_err)) => Err(release_err),
            (Err(run_err), _) => Err(run_err),
        }
    }

    /// Acquire wrapped in a guard that schedules a best-effort release if
    /// dropped without an explicit one.
    pub async fn acquire_guard(
        self: &Arc<Self>,
        worker_id: &str,
        kind: BrowserKind,
    ) -> Result<SessionGuard> {
        let session = self.acquire(worker_id, kind).await?;
        Ok(SessionGuard {
            registry: Arc::clone(self),
            worker_id: worker_id.to_string(),
            session,
            released: false,
        })
    }
}

/// Scoped session handle
///
/// Prefer [`SessionGuard::release`]; the drop path can only schedule the
/// release, not wait for it.
#[derive(Debug)]
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    worker_id: String,
    session: Arc<Session>,
    released: bool,
}

impl SessionGuard {
    /// The guarded session
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Release the session now
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        self.registry.release(&self.worker_id).await
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let registry = Arc::clone(&self.registry);
        let worker_id = self.worker_id.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = registry.release(&worker_id).await {
                    warn!("Deferred release for worker {} failed: {}", worker_id, e);
                }
            });
        } else {
            warn!(
                "Session for worker {} leaked: guard dropped outside a runtime",
                worker_id
            );
        }
    }
}
