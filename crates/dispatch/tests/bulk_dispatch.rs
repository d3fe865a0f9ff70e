//! End-to-end bulk dispatch scenarios against in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use routey_core::audit::InMemoryAuditSink;
use routey_core::config::{AppConfig, DeliveryConfig};
use routey_core::domain::{Record, RecordId, RecordStatus};
use routey_core::routing::{RouteEngine, RoutingTables};
use routey_core::store::{InMemoryRecordStore, RecordPatch, RecordStore, StoreError};
use routey_dispatch::{BulkOrchestrator, DeliverySafetyGate, Dispatcher};
use routey_slack::channel::{InMemoryDirectory, ScriptedChannel};

fn delivery(test_mode: bool) -> DeliveryConfig {
    DeliveryConfig {
        test_mode,
        test_recipient: test_mode.then(|| "hr.sandbox@example.ph".to_owned()),
        retry_attempts: 3,
        retry_backoff_ms: 0,
        bulk_concurrency: 2,
        bulk_budget_secs: 30,
        ..AppConfig::default().delivery
    }
}

/// Directory covering every production fulfillment contact, with optional
/// holes to simulate contacts Slack cannot resolve.
fn directory_without(missing: &[&str]) -> InMemoryDirectory {
    let tables = RoutingTables::philippine_network();
    let mut entries: Vec<(String, String)> = tables
        .fulfillment_points()
        .map(|(branch, _)| {
            let contact = tables.contact_for(branch).expect("contact").to_owned();
            (contact, format!("U-{}", branch.to_uppercase().replace(' ', "-")))
        })
        .filter(|(contact, _)| !missing.contains(&contact.as_str()))
        .collect();
    entries.push(("hr.sandbox@example.ph".to_owned(), "U-SANDBOX".to_owned()));
    InMemoryDirectory::new(entries)
}

fn approved(id: &str, location: &str) -> Record {
    let mut record = Record::new(RecordId(id.to_owned()), format!("Employee {id}"), location);
    record.status = RecordStatus::Approved;
    record
}

struct Fixture {
    orchestrator: BulkOrchestrator,
    store: InMemoryRecordStore,
    channel: ScriptedChannel,
}

fn fixture(
    config: DeliveryConfig,
    channel: ScriptedChannel,
    directory: InMemoryDirectory,
    records: Vec<Record>,
) -> Fixture {
    let store = InMemoryRecordStore::seeded(records);
    let dispatcher = Dispatcher::new(
        RouteEngine::new(Arc::new(RoutingTables::philippine_network())),
        DeliverySafetyGate::from_config(&config).expect("gate"),
        Arc::new(store.clone()),
        Arc::new(directory),
        Arc::new(channel.clone()),
        Arc::new(InMemoryAuditSink::default()),
        &config,
    );
    let orchestrator =
        BulkOrchestrator::new(Arc::new(dispatcher), Arc::new(store.clone()), &config);
    Fixture { orchestrator, store, channel }
}

#[tokio::test]
async fn one_failing_lookup_does_not_abort_the_batch() {
    // Ten approved records; only record 7 routes to Zamboanga, whose contact
    // is missing from the directory.
    let locations = [
        "Quezon City",
        "Cebu",
        "Davao",
        "Baguio",
        "Iloilo",
        "Iloilo City",
        "Zamboanga City",
        "manila",
        "QC",
        "Cebu City",
    ];
    let records: Vec<Record> = locations
        .iter()
        .enumerate()
        .map(|(index, location)| approved(&format!("R-{:02}", index + 1), location))
        .collect();

    let fx = fixture(
        delivery(false),
        ScriptedChannel::reliable(),
        directory_without(&["poc.zamboanga@example.ph"]),
        records,
    );

    let ids: Vec<RecordId> = (1..=10).map(|index| RecordId(format!("R-{index:02}"))).collect();
    let report = fx.orchestrator.dispatch_all(ids).await;

    assert_eq!(report.sent_count(), 9);
    assert_eq!(report.failed_count(), 1);
    assert!(report.failed.contains_key(&RecordId("R-07".to_owned())));
    assert!(report.not_started.is_empty());

    // Sent records advanced to SentToPoc; failed ones stayed Approved.
    for id in &report.sent {
        let record = fx.store.get_by_id(id).await.expect("fetch");
        assert_eq!(record.status, RecordStatus::SentToPoc);
        assert!(record.notified);
    }
    let failed = fx.store.get_by_id(&RecordId("R-07".to_owned())).await.expect("fetch");
    assert_eq!(failed.status, RecordStatus::Approved);
    assert!(!failed.notified);
}

#[tokio::test]
async fn second_bulk_run_is_idempotent() {
    let records = vec![approved("R-1", "Cebu"), approved("R-2", "Davao"), approved("R-3", "QC")];
    let fx = fixture(delivery(false), ScriptedChannel::reliable(), directory_without(&[]), records);

    let ids = vec![
        RecordId("R-1".to_owned()),
        RecordId("R-2".to_owned()),
        RecordId("R-3".to_owned()),
    ];

    let first = fx.orchestrator.dispatch_all(ids.clone()).await;
    assert_eq!(first.sent_count(), 3);

    let second = fx.orchestrator.dispatch_all(ids).await;
    assert_eq!(second.sent_count(), 0);
    assert_eq!(second.already_sent.len(), 3);

    // Exactly one channel send per record across both runs.
    assert_eq!(fx.channel.sent().len(), 3);
}

#[tokio::test]
async fn test_mode_bulk_run_only_ever_reaches_the_sandbox() {
    let records = vec![
        approved("R-1", "Cebu"),
        approved("R-2", "manila"),
        approved("R-3", "Atlantis Outpost"),
        approved("R-4", "San Fernando"),
    ];
    let fx = fixture(delivery(true), ScriptedChannel::reliable(), directory_without(&[]), records);

    let report = fx
        .orchestrator
        .dispatch_all(
            (1..=4).map(|index| RecordId(format!("R-{index}"))).collect(),
        )
        .await;

    assert_eq!(report.sent_count(), 4);
    let sent = fx.channel.sent();
    assert_eq!(sent.len(), 4);
    for message in &sent {
        assert_eq!(message.recipient.0, "U-SANDBOX");
    }
}

#[tokio::test]
async fn exhausted_budget_reports_unstarted_records() {
    let records = vec![approved("R-1", "Cebu"), approved("R-2", "Davao")];
    let fx = fixture(delivery(false), ScriptedChannel::reliable(), directory_without(&[]), records);

    let report = fx
        .orchestrator
        .with_budget(Duration::ZERO)
        .dispatch_all(vec![RecordId("R-1".to_owned()), RecordId("R-2".to_owned())])
        .await;

    assert_eq!(report.sent_count(), 0);
    assert_eq!(report.not_started.len(), 2);
    assert_eq!(fx.channel.sent().len(), 0);
}

#[tokio::test]
async fn pending_records_are_held_not_failed() {
    let mut holding = approved("R-1", "manila");
    holding.routing_pending = true;
    let fx = fixture(
        delivery(false),
        ScriptedChannel::reliable(),
        directory_without(&[]),
        vec![holding, approved("R-2", "Cebu")],
    );

    let report = fx
        .orchestrator
        .dispatch_all(vec![RecordId("R-1".to_owned()), RecordId("R-2".to_owned())])
        .await;

    assert_eq!(report.pending, vec![RecordId("R-1".to_owned())]);
    assert_eq!(report.sent, vec![RecordId("R-2".to_owned())]);
    assert!(report.failed.is_empty());

    let held = fx.store.get_by_id(&RecordId("R-1".to_owned())).await.expect("fetch");
    assert_eq!(held.status, RecordStatus::Approved);
    assert!(!held.notified);
}

#[tokio::test]
async fn removed_records_are_discarded_by_the_batch() {
    let mut removed = approved("R-1", "Cebu");
    removed.status = RecordStatus::Removed;
    let fx = fixture(
        delivery(false),
        ScriptedChannel::reliable(),
        directory_without(&[]),
        vec![removed, approved("R-2", "Cebu")],
    );

    let report = fx
        .orchestrator
        .dispatch_all(vec![RecordId("R-1".to_owned()), RecordId("R-2".to_owned())])
        .await;

    assert_eq!(report.discarded, vec![RecordId("R-1".to_owned())]);
    assert_eq!(report.sent, vec![RecordId("R-2".to_owned())]);
    assert_eq!(fx.channel.sent().len(), 1);
}

struct HangingStore;

#[async_trait::async_trait]
impl RecordStore for HangingStore {
    async fn get_by_id(&self, _id: &RecordId) -> Result<Record, StoreError> {
        std::future::pending().await
    }

    async fn list_by_status(&self, _status: RecordStatus) -> Result<Vec<Record>, StoreError> {
        std::future::pending().await
    }

    async fn update_fields(
        &self,
        _id: &RecordId,
        _patch: RecordPatch,
        _expected_notified: bool,
    ) -> Result<Record, StoreError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn hung_store_fails_the_record_instead_of_stalling_the_run() {
    let config = delivery(false);
    let dispatcher = Dispatcher::new(
        RouteEngine::new(Arc::new(RoutingTables::philippine_network())),
        DeliverySafetyGate::from_config(&config).expect("gate"),
        Arc::new(HangingStore),
        Arc::new(directory_without(&[])),
        Arc::new(ScriptedChannel::reliable()),
        Arc::new(InMemoryAuditSink::default()),
        &config,
    );
    let orchestrator =
        BulkOrchestrator::new(Arc::new(dispatcher), Arc::new(HangingStore), &config);

    let report = orchestrator.dispatch_all(vec![RecordId("R-1".to_owned())]).await;

    assert_eq!(report.failed_count(), 1);
    assert!(report.failed[&RecordId("R-1".to_owned())].contains("timed out"));
    assert!(report.not_started.is_empty());
}

#[tokio::test]
async fn dispatch_approved_picks_up_only_approved_records() {
    let mut reviewing = approved("R-3", "Davao");
    reviewing.status = RecordStatus::Reviewing;
    let fx = fixture(
        delivery(false),
        ScriptedChannel::reliable(),
        directory_without(&[]),
        vec![approved("R-1", "Cebu"), approved("R-2", "QC"), reviewing],
    );

    let report = fx.orchestrator.dispatch_approved().await.expect("listing succeeds");

    assert_eq!(report.sent_count(), 2);
    assert_eq!(report.total(), 2);
    let untouched = fx.store.get_by_id(&RecordId("R-3".to_owned())).await.expect("fetch");
    assert_eq!(untouched.status, RecordStatus::Reviewing);
    assert!(!untouched.notified);
}
