use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    Reviewing,
    Rendered,
    Approved,
    SentToPoc,
    Completed,
    Removed,
}

/// One employee record as the routing core sees it.
///
/// The surrounding application owns creation and most fields; this core reads
/// `location_branch`, `status`, and `routing_pending`, and writes
/// `resolved_fulfillment_branch`, `notified`, and (through the lifecycle
/// machine) `status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub employee_name: String,
    /// Free-text branch location as entered by the employee.
    pub location_branch: String,
    pub status: RecordStatus,
    /// External marker: branch is known but not yet assigned coordinates.
    pub routing_pending: bool,
    /// Last computed route, cached for audit only; re-derived on every dispatch.
    pub resolved_fulfillment_branch: Option<String>,
    /// At-most-once delivery marker for the current approval cycle.
    pub notified: bool,
    pub document_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    pub fn new(id: RecordId, employee_name: impl Into<String>, location_branch: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            employee_name: employee_name.into(),
            location_branch: location_branch.into(),
            status: RecordStatus::Reviewing,
            routing_pending: false,
            resolved_fulfillment_branch: None,
            notified: false,
            document_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}
