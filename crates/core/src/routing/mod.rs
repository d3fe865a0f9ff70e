pub mod engine;
pub mod geo;
pub mod tables;

pub use engine::{RouteDecision, RouteEngine, RouteMethod};
pub use geo::{distance_km, Coordinate};
pub use tables::{normalize, RouteConfigError, RoutingTables};
