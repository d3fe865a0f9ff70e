pub mod audit;
pub mod config;
pub mod domain;
pub mod lifecycle;
pub mod routing;
pub mod store;

pub use audit::{AuditEvent, AuditSink, DeliveryMode, InMemoryAuditSink};
pub use config::{AppConfig, ConfigError, DeliveryConfig, LoadOptions};
pub use domain::{Record, RecordId, RecordStatus};
pub use lifecycle::{LifecycleMachine, TransitionError};
pub use routing::{
    distance_km, normalize, Coordinate, RouteConfigError, RouteDecision, RouteEngine, RouteMethod,
    RoutingTables,
};
pub use store::{InMemoryRecordStore, RecordPatch, RecordStore, StoreError};
