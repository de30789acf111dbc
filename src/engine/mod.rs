mod availability;
mod clock;
mod error;
mod mutations;
mod queries;
mod validate;

pub use availability::{available_slots, generate_slots, resolve_day_window, SLOT_STRIDE};
pub use clock::{format_time, format_time_text, minutes_to_time, time_to_minutes};
pub use error::EngineError;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::info;
use ulid::Ulid;

use crate::config::SalonConfig;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

// ── Request log writer ───────────────────────────────────

struct LogAppend {
    event: Event,
    response: oneshot::Sender<Result<(), EngineError>>,
}

/// Owns the request log. Each wakeup takes every queued submission,
/// writes them, and syncs once; all callers in the batch share the outcome.
async fn log_writer(mut wal: Wal, mut rx: mpsc::Receiver<LogAppend>) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = rx.try_recv() {
            batch.push(next);
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let outcome = commit_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());

        let reply = match outcome {
            Ok(()) => {
                tracing::debug!("request log: {} entries this run", wal.appends());
                Ok(())
            }
            Err(e) => {
                tracing::error!("request log {} write failed: {e}", wal.path().display());
                Err(EngineError::WalError(e.to_string()))
            }
        };
        for append in batch {
            let _ = append.response.send(reply.clone());
        }
    }
}

/// Write and sync one batch. On failure the log is cut back to its last
/// synced length so a half-written batch never sits in front of later entries.
fn commit_batch(wal: &mut Wal, batch: &[LogAppend]) -> io::Result<()> {
    let written = batch
        .iter()
        .try_for_each(|append| wal.append_buffered(&append.event))
        .and_then(|()| wal.flush_sync());
    if let Err(e) = written {
        if let Err(rollback) = wal.rollback() {
            tracing::error!(
                "request log {}: rollback to {} bytes failed: {rollback}",
                wal.path().display(),
                wal.synced_len()
            );
        }
        return Err(e);
    }
    Ok(())
}

/// Availability queries plus the request book for one salon.
pub struct Engine {
    config: Arc<SalonConfig>,
    requests: DashMap<Ulid, AppointmentRequest>,
    wal_tx: mpsc::Sender<LogAppend>,
    pub notify: Arc<NotifyHub>,
}

impl Engine {
    /// Replay the request log at `wal_path` and start the writer task.
    /// Must be called inside a tokio runtime.
    pub fn new(
        wal_path: PathBuf,
        config: SalonConfig,
        notify: Arc<NotifyHub>,
    ) -> io::Result<Self> {
        let (wal, events) = Wal::recover(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(log_writer(wal, wal_rx));

        let engine = Self {
            config: Arc::new(config),
            requests: DashMap::new(),
            wal_tx,
            notify,
        };
        for event in &events {
            engine.apply(event);
        }
        info!(
            "request log {}: replayed {} requests",
            wal_path.display(),
            engine.requests.len()
        );
        Ok(engine)
    }

    pub fn config(&self) -> &SalonConfig {
        &self.config
    }

    /// Write event to the log via the background writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(LogAppend {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("request log writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("request log writer dropped response".into()))?
    }

    fn apply(&self, event: &Event) {
        match event {
            Event::RequestSubmitted { request } => {
                self.requests.insert(request.id, request.clone());
            }
        }
    }

    /// WAL-append + apply + notify in one call.
    pub(super) async fn persist_and_apply(&self, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.apply(event);
        self.notify.publish(event);
        Ok(())
    }
}
