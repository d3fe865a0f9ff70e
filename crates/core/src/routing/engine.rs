use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::Record;
use crate::routing::geo::distance_km;
use crate::routing::tables::{normalize, RoutingTables};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteMethod {
    /// The input is itself a fulfillment point.
    Direct,
    /// The input aliased to a fulfillment point.
    Alias,
    /// Nearest fulfillment point by great-circle distance.
    Nearest,
    /// Completely unknown location; configured default branch.
    Default,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteDecision {
    Routed { branch: String, method: RouteMethod },
    /// Branch is known but not yet onboarded with coordinates. A hold state,
    /// not an error: no retry, no default fallback.
    Pending,
}

/// The seven-step route resolution procedure.
///
/// Each step short-circuits on success. Guardrails and the routing-pending
/// marker pre-empt the geometric fallback: a wrong nearest-neighbor guess for
/// a known-ambiguous or not-yet-onboarded location is worse than an explicit
/// hold or default.
#[derive(Clone)]
pub struct RouteEngine {
    tables: Arc<RoutingTables>,
}

impl RouteEngine {
    pub fn new(tables: Arc<RoutingTables>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &RoutingTables {
        &self.tables
    }

    pub fn resolve(&self, record: &Record) -> RouteDecision {
        let tables = &self.tables;
        let normalized = normalize(&record.location_branch);

        // Direct: the input names a fulfillment point.
        if let Some(canonical) = tables.canonical_for(&normalized) {
            if tables.is_fulfillment_point(canonical) {
                return self.routed(record, canonical, RouteMethod::Direct);
            }
        }

        // Alias: the input aliases to a fulfillment point.
        let alias_target = tables.resolve_alias(&normalized);
        if let Some(canonical) = alias_target {
            if tables.is_fulfillment_point(canonical) {
                return self.routed(record, canonical, RouteMethod::Alias);
            }
        }

        // Guarded names never reach the nearest-neighbor fallback, whether
        // entered directly or reached through an alias.
        let guarded = tables.is_guarded(&normalized)
            || alias_target.is_some_and(|canonical| tables.is_guarded(canonical));
        if guarded {
            debug!(
                record_id = %record.id,
                input = %normalized,
                "guarded location, routing to default branch"
            );
            return self.routed(record, tables.default_branch(), RouteMethod::Default);
        }

        if record.routing_pending {
            debug!(record_id = %record.id, "routing pending, holding record");
            return RouteDecision::Pending;
        }

        // Nearest: any known coordinate for the input, resolved or raw.
        let input_coordinate = alias_target
            .or_else(|| tables.canonical_for(&normalized))
            .and_then(|canonical| tables.coordinate_of(canonical));
        if let Some(origin) = input_coordinate {
            let mut best: Option<(&str, f64)> = None;
            for (branch, coord) in tables.fulfillment_points() {
                let km = distance_km(origin, coord);
                // Strict comparison keeps the lexically-first branch on ties;
                // fulfillment_points iterates in lexical order.
                if best.map_or(true, |(_, best_km)| km < best_km) {
                    best = Some((branch, km));
                }
            }
            if let Some((branch, km)) = best {
                debug!(
                    record_id = %record.id,
                    input = %normalized,
                    branch,
                    distance_km = km,
                    "routed to nearest fulfillment point"
                );
                return self.routed(record, branch, RouteMethod::Nearest);
            }
        }

        // Unknown location: deterministic default.
        self.routed(record, tables.default_branch(), RouteMethod::Default)
    }

    fn routed(&self, record: &Record, branch: &str, method: RouteMethod) -> RouteDecision {
        debug!(record_id = %record.id, branch, ?method, "route resolved");
        RouteDecision::Routed { branch: branch.to_owned(), method }
    }
}
