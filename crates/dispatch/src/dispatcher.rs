use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use routey_core::audit::{AuditEvent, AuditSink};
use routey_core::config::DeliveryConfig;
use routey_core::domain::{RecordId, RecordStatus};
use routey_core::routing::{RouteDecision, RouteEngine, RouteMethod};
use routey_core::store::{RecordPatch, RecordStore, StoreError};
use routey_slack::channel::{ChannelHandle, DirectoryLookup, NotificationChannel};
use routey_slack::notice::DispatchNotice;

use crate::gate::DeliverySafetyGate;

/// Per-record dispatch outcome. Expected conditions are values here, never
/// errors; only store access failures surface as `Err` from
/// [`Dispatcher::dispatch`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchOutcome {
    Sent,
    AlreadySent,
    /// Route resolution is on hold; not retryable until the marker clears.
    Pending,
    /// Directory lookup failed; terminal until the directory data changes.
    RecipientUnknown,
    ChannelFailure(String),
    /// The record went `Removed` while dispatch was in flight; nothing was
    /// written and the send is not counted.
    Discarded,
}

/// Delay between send attempts. Pluggable so tests can run without sleeping
/// and so the policy stays an explicit bounded loop, never recursion.
pub trait BackoffStrategy: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedBackoff {
    pub interval: Duration,
}

impl BackoffStrategy for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.interval
    }
}

/// Store calls share the per-call timeout applied to lookups and sends; a
/// hung store surfaces as a backend error instead of pinning a worker.
pub(crate) async fn guarded_store_call<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Backend("store call timed out".to_owned())),
    }
}

pub struct Dispatcher {
    engine: RouteEngine,
    gate: DeliverySafetyGate,
    store: Arc<dyn RecordStore>,
    directory: Arc<dyn DirectoryLookup>,
    channel: Arc<dyn NotificationChannel>,
    audit: Arc<dyn AuditSink>,
    retry_attempts: u32,
    backoff: Arc<dyn BackoffStrategy>,
    call_timeout: Duration,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: RouteEngine,
        gate: DeliverySafetyGate,
        store: Arc<dyn RecordStore>,
        directory: Arc<dyn DirectoryLookup>,
        channel: Arc<dyn NotificationChannel>,
        audit: Arc<dyn AuditSink>,
        delivery: &DeliveryConfig,
    ) -> Self {
        Self {
            engine,
            gate,
            store,
            directory,
            channel,
            audit,
            retry_attempts: delivery.retry_attempts.max(1),
            backoff: Arc::new(FixedBackoff {
                interval: Duration::from_millis(delivery.retry_backoff_ms),
            }),
            call_timeout: Duration::from_secs(delivery.call_timeout_secs),
        }
    }

    pub fn with_backoff(mut self, backoff: Arc<dyn BackoffStrategy>) -> Self {
        self.backoff = backoff;
        self
    }

    /// Dispatch one record to its fulfillment branch, at most once.
    pub async fn dispatch(&self, id: &RecordId) -> Result<DispatchOutcome, StoreError> {
        // Fresh read immediately before any send decision.
        let record = guarded_store_call(self.call_timeout, self.store.get_by_id(id)).await?;
        if record.notified {
            return Ok(DispatchOutcome::AlreadySent);
        }
        if record.status == RecordStatus::Removed {
            return Ok(DispatchOutcome::Discarded);
        }

        let (branch, method) = match self.engine.resolve(&record) {
            RouteDecision::Routed { branch, method } => (branch, method),
            RouteDecision::Pending => return Ok(DispatchOutcome::Pending),
        };

        let Some(contact) = self.engine.tables().contact_for(&branch).map(str::to_owned) else {
            warn!(record_id = %id, branch, "resolved branch has no contact identifier");
            return Ok(DispatchOutcome::RecipientUnknown);
        };

        // The branch POC must be resolvable even when test mode will redirect
        // the message; a branch without a reachable contact is a routing
        // problem worth surfacing in either mode.
        let Some(branch_handle) = self.lookup(&contact).await else {
            return Ok(DispatchOutcome::RecipientUnknown);
        };

        let routing = self.gate.resolve_recipient(&contact);
        let recipient = if routing.contact == contact {
            branch_handle
        } else {
            let Some(handle) = self.lookup(&routing.contact).await else {
                return Ok(DispatchOutcome::RecipientUnknown);
            };
            handle
        };

        let notice = DispatchNotice::compose(&record, &branch, method, routing.mode, &contact);
        let Some(failure) = self.send_with_retry(id, &recipient, &notice).await else {
            return self.commit(id, &branch, method, &recipient, routing.mode).await;
        };
        Ok(DispatchOutcome::ChannelFailure(failure))
    }

    async fn lookup(&self, contact: &str) -> Option<ChannelHandle> {
        match tokio::time::timeout(self.call_timeout, self.directory.resolve_contact(contact)).await
        {
            Ok(Ok(handle)) => Some(handle),
            Ok(Err(error)) => {
                warn!(contact, error = %error, "directory lookup failed");
                None
            }
            Err(_) => {
                warn!(contact, "directory lookup timed out");
                None
            }
        }
    }

    /// Bounded attempt loop; returns the last error text when the attempt
    /// budget is exhausted, `None` on a confirmed send.
    async fn send_with_retry(
        &self,
        id: &RecordId,
        recipient: &ChannelHandle,
        notice: &DispatchNotice,
    ) -> Option<String> {
        let text = notice.render_text();
        let mut last_error = String::new();

        for attempt in 1..=self.retry_attempts {
            let send = self.channel.send(recipient, &text, notice.attachment_url.as_deref());
            match tokio::time::timeout(self.call_timeout, send).await {
                Ok(Ok(())) => {
                    info!(record_id = %id, recipient = %recipient, attempt, "notification delivered");
                    return None;
                }
                Ok(Err(error)) => {
                    warn!(record_id = %id, attempt, error = %error, "notification send failed");
                    last_error = error.to_string();
                }
                Err(_) => {
                    warn!(record_id = %id, attempt, "notification send timed out");
                    last_error = "channel call timed out".to_owned();
                }
            }

            if attempt < self.retry_attempts {
                let delay = self.backoff.delay(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Some(last_error)
    }

    /// Mark the record notified and append the audit entry. A record that
    /// went `Removed` mid-flight is discarded without writes; losing the
    /// `notified` race to another dispatch is equivalent to `AlreadySent`.
    async fn commit(
        &self,
        id: &RecordId,
        branch: &str,
        method: RouteMethod,
        recipient: &ChannelHandle,
        mode: routey_core::audit::DeliveryMode,
    ) -> Result<DispatchOutcome, StoreError> {
        let fresh = guarded_store_call(self.call_timeout, self.store.get_by_id(id)).await?;
        if fresh.status == RecordStatus::Removed {
            info!(record_id = %id, "record removed mid-dispatch, outcome discarded");
            return Ok(DispatchOutcome::Discarded);
        }
        if fresh.notified {
            return Ok(DispatchOutcome::AlreadySent);
        }

        let patch = RecordPatch {
            notified: Some(true),
            resolved_fulfillment_branch: Some(branch.to_owned()),
            ..RecordPatch::default()
        };
        match guarded_store_call(self.call_timeout, self.store.update_fields(id, patch, false))
            .await
        {
            Ok(_) => {}
            Err(StoreError::Conflict(_)) => return Ok(DispatchOutcome::AlreadySent),
            Err(error) => return Err(error),
        }

        self.audit.emit(
            AuditEvent::new(id.clone(), "dispatch.notification_sent", branch, recipient.0.as_str(), mode)
                .with_metadata("method", format!("{method:?}")),
        );
        info!(record_id = %id, branch, ?method, "record marked notified");
        Ok(DispatchOutcome::Sent)
    }
}
