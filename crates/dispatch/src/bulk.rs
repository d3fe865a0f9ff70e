use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use routey_core::config::DeliveryConfig;
use routey_core::domain::{RecordId, RecordStatus};
use routey_core::lifecycle::LifecycleMachine;
use routey_core::store::{RecordPatch, RecordStore, StoreError};

use crate::dispatcher::{guarded_store_call, DispatchOutcome, Dispatcher};

/// Full per-record breakdown of one bulk run. HR staff re-run exactly the
/// failed subset, so this never collapses to a single pass/fail flag.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub sent: Vec<RecordId>,
    pub already_sent: Vec<RecordId>,
    pub pending: Vec<RecordId>,
    pub discarded: Vec<RecordId>,
    /// Budget ran out before these were picked up.
    pub not_started: Vec<RecordId>,
    pub failed: BTreeMap<RecordId, String>,
}

impl DispatchReport {
    pub fn sent_count(&self) -> usize {
        self.sent.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn total(&self) -> usize {
        self.sent.len()
            + self.already_sent.len()
            + self.pending.len()
            + self.discarded.len()
            + self.not_started.len()
            + self.failed.len()
    }
}

/// Fans the dispatcher out over many records with a fixed-size worker pool
/// and a wall-clock budget.
///
/// Workers pull record ids from a shared queue, so concurrency is capped at
/// the pool size rather than the batch size. The budget is a soft cancel:
/// workers stop pulling once the deadline passes, in-flight dispatches run to
/// completion, and whatever is left in the queue is reported `not_started`.
pub struct BulkOrchestrator {
    dispatcher: Arc<Dispatcher>,
    store: Arc<dyn RecordStore>,
    machine: LifecycleMachine,
    concurrency: usize,
    budget: Duration,
    call_timeout: Duration,
}

impl BulkOrchestrator {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        store: Arc<dyn RecordStore>,
        delivery: &DeliveryConfig,
    ) -> Self {
        Self {
            dispatcher,
            store,
            machine: LifecycleMachine::new(),
            concurrency: delivery.bulk_concurrency.max(1),
            budget: Duration::from_secs(delivery.bulk_budget_secs),
            call_timeout: Duration::from_secs(delivery.call_timeout_secs),
        }
    }

    /// Override the wall-clock budget; tests use this for deadline behavior.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Dispatch every record currently in `Approved` status.
    pub async fn dispatch_approved(&self) -> Result<DispatchReport, StoreError> {
        let records = guarded_store_call(
            self.call_timeout,
            self.store.list_by_status(RecordStatus::Approved),
        )
        .await?;
        Ok(self.dispatch_all(records.into_iter().map(|record| record.id).collect()).await)
    }

    pub async fn dispatch_all(&self, ids: Vec<RecordId>) -> DispatchReport {
        let total = ids.len();
        let deadline = Instant::now() + self.budget;
        let queue = Arc::new(Mutex::new(ids.into_iter().collect::<VecDeque<_>>()));

        let workers = self.concurrency.min(total.max(1));
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let queue = Arc::clone(&queue);
            let dispatcher = Arc::clone(&self.dispatcher);
            let store = Arc::clone(&self.store);
            let machine = self.machine;
            handles.push(tokio::spawn(run_worker(
                worker,
                queue,
                dispatcher,
                store,
                machine,
                deadline,
                self.call_timeout,
            )));
        }

        let mut report = DispatchReport::default();
        for handle in handles {
            match handle.await {
                Ok(results) => {
                    for (id, result) in results {
                        record_result(&mut report, id, result);
                    }
                }
                Err(join_error) => {
                    // A panicked worker loses its in-flight record; the rest
                    // of the batch is unaffected.
                    warn!(error = %join_error, "bulk dispatch worker terminated abnormally");
                }
            }
        }

        let mut leftover = match queue.lock() {
            Ok(mut guard) => guard.drain(..).collect::<Vec<_>>(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        leftover.sort();
        report.not_started = leftover;

        info!(
            total,
            sent = report.sent.len(),
            already_sent = report.already_sent.len(),
            pending = report.pending.len(),
            discarded = report.discarded.len(),
            failed = report.failed.len(),
            not_started = report.not_started.len(),
            "bulk dispatch finished"
        );
        report
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_worker(
    worker: usize,
    queue: Arc<Mutex<VecDeque<RecordId>>>,
    dispatcher: Arc<Dispatcher>,
    store: Arc<dyn RecordStore>,
    machine: LifecycleMachine,
    deadline: Instant,
    call_timeout: Duration,
) -> Vec<(RecordId, Result<DispatchOutcome, StoreError>)> {
    let mut results = Vec::new();

    loop {
        // Deadline is checked before pulling, never mid-dispatch: an id is
        // either dispatched to completion or reported not started.
        if Instant::now() >= deadline {
            info!(worker, "bulk budget exhausted, worker stopping");
            break;
        }
        let next = {
            let mut guard = match queue.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.pop_front()
        };
        let Some(id) = next else { break };

        let mut result = dispatcher.dispatch(&id).await;
        if matches!(result, Ok(DispatchOutcome::Sent)) {
            if let Err(error) = advance_to_sent(&store, &machine, &id, call_timeout).await {
                warn!(record_id = %id, error = %error, "post-dispatch status transition failed");
                result = Err(error);
            }
        }
        results.push((id, result));
    }

    results
}

/// Advance a freshly notified record from `Approved` to `SentToPoc` through
/// the lifecycle machine and the store's optimistic guard.
async fn advance_to_sent(
    store: &Arc<dyn RecordStore>,
    machine: &LifecycleMachine,
    id: &RecordId,
    call_timeout: Duration,
) -> Result<(), StoreError> {
    let record = guarded_store_call(call_timeout, store.get_by_id(id)).await?;
    if let Err(rejection) = machine.validate(record.status, RecordStatus::SentToPoc) {
        // Sent is still sent; a record that drifted out of Approved (for
        // example soft-deleted between send and transition) keeps its status.
        warn!(record_id = %id, status = ?record.status, rejection = %rejection,
            "skipping status transition for non-approved record");
        return Ok(());
    }
    let patch = RecordPatch { status: Some(RecordStatus::SentToPoc), ..RecordPatch::default() };
    match guarded_store_call(call_timeout, store.update_fields(id, patch, true)).await {
        Ok(_) => Ok(()),
        // The notified flag cannot regress; a conflict here means another
        // actor rewrote the record and its status is their responsibility.
        Err(StoreError::Conflict(_)) => Ok(()),
        Err(error) => Err(error),
    }
}

fn record_result(
    report: &mut DispatchReport,
    id: RecordId,
    result: Result<DispatchOutcome, StoreError>,
) {
    match result {
        Ok(DispatchOutcome::Sent) => report.sent.push(id),
        Ok(DispatchOutcome::AlreadySent) => report.already_sent.push(id),
        Ok(DispatchOutcome::Pending) => report.pending.push(id),
        Ok(DispatchOutcome::Discarded) => report.discarded.push(id),
        Ok(DispatchOutcome::RecipientUnknown) => {
            report.failed.insert(id, "recipient unknown in directory".to_owned());
        }
        Ok(DispatchOutcome::ChannelFailure(reason)) => {
            report.failed.insert(id, format!("channel failure: {reason}"));
        }
        Err(error) => {
            report.failed.insert(id, format!("store failure: {error}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use routey_core::domain::RecordId;

    use crate::bulk::DispatchReport;
    use crate::dispatcher::DispatchOutcome;

    #[test]
    fn report_totals_cover_every_bucket() {
        let report = DispatchReport {
            sent: vec![RecordId("R-1".to_owned())],
            already_sent: vec![RecordId("R-2".to_owned())],
            pending: vec![RecordId("R-3".to_owned())],
            discarded: vec![],
            not_started: vec![RecordId("R-4".to_owned()), RecordId("R-5".to_owned())],
            failed: BTreeMap::from([(RecordId("R-6".to_owned()), "channel failure: x".to_owned())]),
        };

        assert_eq!(report.total(), 6);
        assert_eq!(report.sent_count(), 1);
        assert_eq!(report.failed_count(), 1);
    }

    #[test]
    fn record_result_buckets_outcomes() {
        let mut report = DispatchReport::default();
        super::record_result(&mut report, RecordId("R-1".to_owned()), Ok(DispatchOutcome::Sent));
        super::record_result(
            &mut report,
            RecordId("R-2".to_owned()),
            Ok(DispatchOutcome::RecipientUnknown),
        );
        super::record_result(
            &mut report,
            RecordId("R-3".to_owned()),
            Ok(DispatchOutcome::ChannelFailure("socket closed".to_owned())),
        );

        assert_eq!(report.sent, vec![RecordId("R-1".to_owned())]);
        assert_eq!(
            report.failed.get(&RecordId("R-2".to_owned())).map(String::as_str),
            Some("recipient unknown in directory")
        );
        assert!(report.failed[&RecordId("R-3".to_owned())].contains("socket closed"));
    }
}
