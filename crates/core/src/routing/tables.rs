use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::routing::geo::Coordinate;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RouteConfigError {
    #[error("fulfillment point `{0}` has no coordinate")]
    FulfillmentPointWithoutCoordinate(String),
    #[error("fulfillment point `{0}` has an empty contact identifier")]
    FulfillmentPointWithoutContact(String),
    #[error("alias `{alias}` targets unknown branch `{target}`")]
    AliasTargetUnknown { alias: String, target: String },
    #[error("default branch `{0}` is not a fulfillment point")]
    DefaultBranchNotFulfillment(String),
}

/// Normalize free-text location input: trim, collapse internal whitespace,
/// case-fold.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Immutable routing lookup tables, injected into the route engine.
///
/// The tables are read-only at request time. A configuration reload swaps the
/// whole value; nothing in here is cached across calls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutingTables {
    /// Canonical branch name -> known coordinate.
    coordinates: BTreeMap<String, Coordinate>,
    /// Canonical branch name -> contact identifier, for branches that can
    /// receive routed records.
    fulfillment_contacts: BTreeMap<String, String>,
    /// Normalized raw input -> canonical branch name.
    aliases: BTreeMap<String, String>,
    /// Normalized names excluded from automatic nearest-neighbor fallback.
    guardrails: BTreeSet<String>,
    default_branch: String,
}

impl RoutingTables {
    pub fn new(
        coordinates: BTreeMap<String, Coordinate>,
        fulfillment_contacts: BTreeMap<String, String>,
        aliases: BTreeMap<String, String>,
        guardrails: BTreeSet<String>,
        default_branch: impl Into<String>,
    ) -> Self {
        let aliases = aliases
            .into_iter()
            .map(|(alias, target)| (normalize(&alias), target))
            .collect();
        let guardrails = guardrails.iter().map(|name| normalize(name)).collect();
        Self {
            coordinates,
            fulfillment_contacts,
            aliases,
            guardrails,
            default_branch: default_branch.into(),
        }
    }

    /// Startup validation: malformed tables abort before any dispatch runs.
    pub fn validate(&self) -> Result<(), RouteConfigError> {
        for (branch, contact) in &self.fulfillment_contacts {
            if !self.coordinates.contains_key(branch) {
                return Err(RouteConfigError::FulfillmentPointWithoutCoordinate(branch.clone()));
            }
            if contact.trim().is_empty() {
                return Err(RouteConfigError::FulfillmentPointWithoutContact(branch.clone()));
            }
        }
        for (alias, target) in &self.aliases {
            if !self.coordinates.contains_key(target) {
                return Err(RouteConfigError::AliasTargetUnknown {
                    alias: alias.clone(),
                    target: target.clone(),
                });
            }
        }
        if !self.fulfillment_contacts.contains_key(&self.default_branch) {
            return Err(RouteConfigError::DefaultBranchNotFulfillment(self.default_branch.clone()));
        }
        Ok(())
    }

    /// Exact match of a normalized input against canonical branch names.
    pub fn canonical_for(&self, normalized: &str) -> Option<&str> {
        self.coordinates
            .keys()
            .find(|canonical| normalize(canonical) == normalized)
            .map(String::as_str)
    }

    /// Exact alias-table match for a normalized input. No fuzzy matching:
    /// ambiguity must not be silently guessed.
    pub fn resolve_alias(&self, normalized: &str) -> Option<&str> {
        self.aliases.get(normalized).map(String::as_str)
    }

    pub fn is_fulfillment_point(&self, canonical: &str) -> bool {
        self.fulfillment_contacts.contains_key(canonical)
    }

    pub fn contact_for(&self, canonical: &str) -> Option<&str> {
        self.fulfillment_contacts.get(canonical).map(String::as_str)
    }

    pub fn coordinate_of(&self, canonical: &str) -> Option<Coordinate> {
        self.coordinates.get(canonical).copied()
    }

    pub fn is_guarded(&self, name: &str) -> bool {
        self.guardrails.contains(&normalize(name))
    }

    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    /// Fulfillment points in lexical order of canonical name; the order is
    /// the deterministic tie-break for nearest-neighbor selection.
    pub fn fulfillment_points(&self) -> impl Iterator<Item = (&str, Coordinate)> + '_ {
        self.fulfillment_contacts.keys().filter_map(|branch| {
            self.coordinates.get(branch).map(|coord| (branch.as_str(), *coord))
        })
    }

    /// The production branch network: regional fulfillment hubs plus the
    /// satellite branches they serve.
    pub fn philippine_network() -> Self {
        let coordinates = BTreeMap::from([
            ("Quezon City".to_owned(), Coordinate::new(14.6760, 121.0437)),
            ("Cebu".to_owned(), Coordinate::new(10.3157, 123.8854)),
            ("Davao".to_owned(), Coordinate::new(7.1907, 125.4553)),
            ("Baguio".to_owned(), Coordinate::new(16.4023, 120.5960)),
            ("Iloilo".to_owned(), Coordinate::new(10.7202, 122.5621)),
            ("Zamboanga".to_owned(), Coordinate::new(6.9214, 122.0790)),
            ("Manila".to_owned(), Coordinate::new(14.5995, 120.9842)),
            ("Makati".to_owned(), Coordinate::new(14.5547, 121.0244)),
            ("Taguig".to_owned(), Coordinate::new(14.5176, 121.0509)),
            ("Bacolod".to_owned(), Coordinate::new(10.6407, 122.9689)),
            ("Cagayan de Oro".to_owned(), Coordinate::new(8.4542, 124.6319)),
            ("Legazpi".to_owned(), Coordinate::new(13.1391, 123.7438)),
        ]);

        let fulfillment_contacts = BTreeMap::from([
            ("Quezon City".to_owned(), "poc.quezoncity@example.ph".to_owned()),
            ("Cebu".to_owned(), "poc.cebu@example.ph".to_owned()),
            ("Davao".to_owned(), "poc.davao@example.ph".to_owned()),
            ("Baguio".to_owned(), "poc.baguio@example.ph".to_owned()),
            ("Iloilo".to_owned(), "poc.iloilo@example.ph".to_owned()),
            ("Zamboanga".to_owned(), "poc.zamboanga@example.ph".to_owned()),
        ]);

        let aliases = BTreeMap::from([
            ("qc".to_owned(), "Quezon City".to_owned()),
            ("quezon".to_owned(), "Quezon City".to_owned()),
            ("cebu city".to_owned(), "Cebu".to_owned()),
            ("davao city".to_owned(), "Davao".to_owned()),
            ("baguio city".to_owned(), "Baguio".to_owned()),
            ("iloilo city".to_owned(), "Iloilo".to_owned()),
            ("zamboanga city".to_owned(), "Zamboanga".to_owned()),
            ("metro manila".to_owned(), "Manila".to_owned()),
            ("cdo".to_owned(), "Cagayan de Oro".to_owned()),
        ]);

        // Ambiguous city names that exist in more than one province; these
        // must surface as a deterministic default, never a geometric guess.
        let guardrails = BTreeSet::from([
            "san fernando".to_owned(),
            "santa rosa".to_owned(),
            "san jose".to_owned(),
        ]);

        Self::new(coordinates, fulfillment_contacts, aliases, guardrails, "Quezon City")
    }
}
