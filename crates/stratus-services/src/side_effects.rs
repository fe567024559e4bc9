//! Best-effort side effects (audit events, counters) off the request path.
//!
//! Callers enqueue with [`SideEffectQueue::notify`], which never blocks and never fails the
//! caller: a full queue drops the event with a warning. One background worker drains the
//! queue; [`SideEffectQueue::shutdown`] stops intake and waits until queued events are handled.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use stratus_core::models::Actor;
use stratus_core::AppError;
use stratus_db::MediaStore;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub action: String,
    pub actor_id: Uuid,
    pub media_id: Option<Uuid>,
    pub storage_account_id: Option<Uuid>,
    pub details: JsonValue,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(action: impl Into<String>, actor: &Actor) -> Self {
        Self {
            action: action.into(),
            actor_id: actor.user_id,
            media_id: None,
            storage_account_id: None,
            details: JsonValue::Null,
            occurred_at: Utc::now(),
        }
    }

    pub fn media(mut self, media_id: Uuid) -> Self {
        self.media_id = Some(media_id);
        self
    }

    pub fn account(mut self, storage_account_id: Uuid) -> Self {
        self.storage_account_id = Some(storage_account_id);
        self
    }

    pub fn details(mut self, details: JsonValue) -> Self {
        self.details = details;
        self
    }
}

#[derive(Debug, Clone)]
pub enum SideEffect {
    Audit(AuditEvent),
    DownloadCounted { media_id: Uuid },
    AccessCounted { media_id: Uuid },
}

/// Destination for audit events (the audit log lives outside this crate).
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<(), AppError>;
}

/// Writes audit events to the `audit` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AppError> {
        tracing::info!(
            target: "audit",
            action = %event.action,
            actor_id = %event.actor_id,
            media_id = ?event.media_id,
            storage_account_id = ?event.storage_account_id,
            details = %event.details,
            "Audit event"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct SideEffectQueue {
    sender: mpsc::Sender<SideEffect>,
    cancel: CancellationToken,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SideEffectQueue {
    /// Spawn the worker. Must be called inside a tokio runtime.
    pub fn start(capacity: usize, media: Arc<dyn MediaStore>, audit: Arc<dyn AuditSink>) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_worker(receiver, cancel.clone(), media, audit));

        Self {
            sender,
            cancel,
            worker: Arc::new(Mutex::new(Some(worker))),
        }
    }

    /// Enqueue without waiting. Returns false when the event was dropped.
    pub fn notify(&self, effect: SideEffect) -> bool {
        match self.sender.try_send(effect) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(effect)) => {
                tracing::warn!(effect = ?effect, "Side-effect queue full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(effect)) => {
                tracing::debug!(effect = ?effect, "Side-effect queue closed, dropping event");
                false
            }
        }
    }

    pub fn audit(&self, event: AuditEvent) -> bool {
        self.notify(SideEffect::Audit(event))
    }

    /// Stop accepting events and wait for everything already queued to be handled.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Side-effect worker terminated abnormally");
            }
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<SideEffect>,
    cancel: CancellationToken,
    media: Arc<dyn MediaStore>,
    audit: Arc<dyn AuditSink>,
) {
    loop {
        tokio::select! {
            biased;
            effect = receiver.recv() => match effect {
                Some(effect) => handle(effect, media.as_ref(), audit.as_ref()).await,
                None => return,
            },
            _ = cancel.cancelled() => break,
        }
    }

    receiver.close();
    let mut drained = 0usize;
    while let Some(effect) = receiver.recv().await {
        handle(effect, media.as_ref(), audit.as_ref()).await;
        drained += 1;
    }
    tracing::info!(drained, "Side-effect queue drained");
}

async fn handle(effect: SideEffect, media: &dyn MediaStore, audit: &dyn AuditSink) {
    let result = match &effect {
        SideEffect::Audit(event) => audit.record(event).await,
        SideEffect::DownloadCounted { media_id } => media.increment_download_count(*media_id).await,
        SideEffect::AccessCounted { media_id } => media.increment_access_count(*media_id).await,
    };

    if let Err(e) = result {
        tracing::warn!(error = %e, effect = ?effect, "Side effect failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSink {
        recorded: AtomicUsize,
    }

    #[async_trait]
    impl AuditSink for CountingSink {
        async fn record(&self, _event: &AuditEvent) -> Result<(), AppError> {
            self.recorded.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn record(&self, _event: &AuditEvent) -> Result<(), AppError> {
            Err(AppError::Internal("audit log unavailable".into()))
        }
    }

    #[tokio::test]
    async fn shutdown_drains_queued_events() {
        let stores = InMemoryStores::new();
        let sink = Arc::new(CountingSink::default());
        let queue = SideEffectQueue::start(32, stores.media.clone(), sink.clone());
        let actor = Actor::admin(Uuid::new_v4());
        let media_id = Uuid::new_v4();

        for _ in 0..10 {
            assert!(queue.audit(AuditEvent::new("media.deleted", &actor).media(media_id)));
        }
        assert!(queue.notify(SideEffect::DownloadCounted { media_id }));
        assert!(queue.notify(SideEffect::DownloadCounted { media_id }));
        assert!(queue.notify(SideEffect::AccessCounted { media_id }));

        queue.shutdown().await;
        assert_eq!(sink.recorded.load(Ordering::SeqCst), 10);
        assert_eq!(stores.media.download_count(media_id), 2);
        assert_eq!(stores.media.access_count(media_id), 1);

        // Intake is closed after shutdown.
        assert!(!queue.notify(SideEffect::AccessCounted { media_id }));
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let stores = InMemoryStores::new();
        let sink = Arc::new(CountingSink::default());
        let queue = SideEffectQueue::start(1, stores.media.clone(), sink.clone());
        let actor = Actor::member(Uuid::new_v4());

        // Single-threaded test runtime: the worker cannot run between these sends.
        let accepted: Vec<bool> = (0..4)
            .map(|_| queue.audit(AuditEvent::new("media.upload_completed", &actor)))
            .collect();
        assert_eq!(accepted, vec![true, false, false, false]);

        queue.shutdown().await;
        assert_eq!(sink.recorded.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sink_failures_are_swallowed() {
        let stores = InMemoryStores::new();
        let queue = SideEffectQueue::start(8, stores.media.clone(), Arc::new(FailingSink));
        let actor = Actor::admin(Uuid::new_v4());
        assert!(queue.audit(AuditEvent::new("storage_account.created", &actor)));
        queue.shutdown().await;
    }
}
