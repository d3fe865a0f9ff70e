use std::sync::Arc;

use routey_core::domain::{Record, RecordId};
use routey_core::routing::{RouteDecision, RouteEngine, RoutingTables};
use serde::Serialize;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct RoutePreview {
    location: String,
    outcome: &'static str,
    branch: Option<String>,
    method: Option<String>,
    contact: Option<String>,
}

/// Dry-run the resolution engine for one location string. Nothing is stored
/// and nothing is sent; this is the triage tool for "why did record X go to
/// branch Y".
pub fn run(location: &str, pending: bool) -> CommandResult {
    let tables = RoutingTables::philippine_network();
    if let Err(error) = tables.validate() {
        return CommandResult::failure("route", "routing_tables", error.to_string(), 2);
    }

    let engine = RouteEngine::new(Arc::new(tables));
    let mut record = Record::new(RecordId("preview".to_owned()), "preview", location);
    record.routing_pending = pending;

    let preview = match engine.resolve(&record) {
        RouteDecision::Routed { branch, method } => RoutePreview {
            location: location.to_owned(),
            outcome: "routed",
            contact: engine.tables().contact_for(&branch).map(str::to_owned),
            method: Some(format!("{method:?}")),
            branch: Some(branch),
        },
        RouteDecision::Pending => RoutePreview {
            location: location.to_owned(),
            outcome: "pending",
            branch: None,
            method: None,
            contact: None,
        },
    };

    match serde_json::to_string_pretty(&preview) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("route", "serialization", error.to_string(), 1),
    }
}
