//! Route planning for map-scoped wayfinding.
//!
//! This module provides:
//! - [`RoutePreference`] - What the search optimizes for
//! - [`RoutingConfiguration`] - Eligibility filters and cost weighting for one request
//! - [`RouteQuery`] - Full request signature, also used as the cache key input
//! - [`RouteResult`] / [`ClosestSystemResult`] - Immutable search answers
//! - [`plan`] - Main entry point: assemble the map graph and search it
//!
//! # Strategy Pattern
//!
//! Path costs come from a [`CostModel`] chosen by the route preference. The
//! search engine only sees the trait, so new preferences only add a model.
//!
//! # Example
//!
//! ```ignore
//! use wayfinder_lib::{plan, RouteQuery, RoutingConfiguration};
//!
//! let query = RouteQuery::route(map_id, 30000142, 30002187, RoutingConfiguration::default());
//! let outcome = plan(&universe, &topology, &query)?;
//! ```

mod cost;

pub use cost::{
    edge_cost, node_penalty, select_cost_model, AvoidLowSecurity, CostModel, FewestJumps,
    PreferLowSecurity,
};

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::assemble;
use crate::path::{find_closest, find_route};
use crate::topology::{Connection, ConnectionKind, LifetimeStatus, MapId, MapTopology, MassStatus};
use crate::universe::{SystemId, Universe};

/// Optimization objective for route planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoutePreference {
    /// Fewest jumps; security is ignored.
    #[default]
    Shortest,
    /// Weight low and null security systems by the security penalty.
    Secure,
    /// Weight high security systems by the security penalty.
    Insecure,
}

impl fmt::Display for RoutePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            RoutePreference::Shortest => "shortest",
            RoutePreference::Secure => "secure",
            RoutePreference::Insecure => "insecure",
        };
        f.write_str(value)
    }
}

/// Pilot policy for one route request: what may be traversed and how the
/// remaining edges are weighed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfiguration {
    pub route_preference: RoutePreference,
    /// Weight of the security penalty; zero makes every preference behave like
    /// [`RoutePreference::Shortest`].
    pub security_penalty: f64,
    /// Connections whose mass status is worse than this are never used.
    pub max_mass_status: MassStatus,
    /// Connections whose lifetime status is worse than this are never used.
    pub max_lifetime_status: LifetimeStatus,
    pub use_stargates: bool,
    pub use_wormholes: bool,
    pub use_evescout: bool,
    /// Systems a route may not enter.
    pub avoid_systems: BTreeSet<SystemId>,
    /// Routes with more jumps than this are reported as not found.
    pub max_jumps: Option<usize>,
}

impl Default for RoutingConfiguration {
    fn default() -> Self {
        Self {
            route_preference: RoutePreference::Shortest,
            security_penalty: 1.0,
            max_mass_status: MassStatus::Critical,
            max_lifetime_status: LifetimeStatus::Critical,
            use_stargates: true,
            use_wormholes: true,
            use_evescout: true,
            avoid_systems: BTreeSet::new(),
            max_jumps: None,
        }
    }
}

impl RoutingConfiguration {
    pub fn with_preference(mut self, preference: RoutePreference) -> Self {
        self.route_preference = preference;
        self
    }

    pub fn with_security_penalty(mut self, penalty: f64) -> Self {
        self.security_penalty = penalty;
        self
    }

    pub fn with_max_mass(mut self, status: MassStatus) -> Self {
        self.max_mass_status = status;
        self
    }

    pub fn with_max_lifetime(mut self, status: LifetimeStatus) -> Self {
        self.max_lifetime_status = status;
        self
    }

    pub fn with_evescout(mut self, enabled: bool) -> Self {
        self.use_evescout = enabled;
        self
    }

    pub fn avoiding(mut self, systems: impl IntoIterator<Item = SystemId>) -> Self {
        self.avoid_systems.extend(systems);
        self
    }

    pub fn with_max_jumps(mut self, limit: usize) -> Self {
        self.max_jumps = Some(limit);
        self
    }

    /// Reject configurations that would produce negative or non-finite costs.
    pub fn validate(&self) -> Result<()> {
        if !self.security_penalty.is_finite() || self.security_penalty < 0.0 {
            return Err(Error::InvalidConfiguration {
                reason: format!(
                    "security penalty must be a finite, non-negative number (got {})",
                    self.security_penalty
                ),
            });
        }
        Ok(())
    }

    /// Whether a connection family may be traversed at all.
    pub fn allows_kind(&self, kind: ConnectionKind) -> bool {
        match kind {
            ConnectionKind::Stargate => self.use_stargates,
            ConnectionKind::Wormhole => self.use_wormholes,
            ConnectionKind::EveScout => self.use_evescout,
        }
    }

    /// Whether a map connection passes every eligibility filter.
    pub fn permits(&self, connection: &Connection) -> bool {
        self.allows_kind(connection.kind)
            && connection.mass_status <= self.max_mass_status
            && connection.lifetime_status <= self.max_lifetime_status
    }

    pub fn avoids(&self, system: SystemId) -> bool {
        self.avoid_systems.contains(&system)
    }
}

/// One system on a route and the connection used to enter it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStep {
    pub solarsystem_id: SystemId,
    /// `None` for the first step.
    pub via: Option<ConnectionKind>,
}

/// A complete route from source to target inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub steps: Vec<RouteStep>,
    pub jumps: usize,
    pub cost: f64,
}

impl RouteResult {
    pub fn source(&self) -> Option<SystemId> {
        self.steps.first().map(|step| step.solarsystem_id)
    }

    pub fn target(&self) -> Option<SystemId> {
        self.steps.last().map(|step| step.solarsystem_id)
    }

    /// System ids in travel order.
    pub fn system_ids(&self) -> Vec<SystemId> {
        self.steps.iter().map(|step| step.solarsystem_id).collect()
    }

    /// Number of hops made through connections of `kind`.
    pub fn count_via(&self, kind: ConnectionKind) -> usize {
        self.steps
            .iter()
            .filter(|step| step.via == Some(kind))
            .count()
    }
}

/// Route to the nearest system among a candidate set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosestSystemResult {
    pub target: SystemId,
    pub route: RouteResult,
}

/// Destination of a query: one system, or the closest of a set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTarget {
    System(SystemId),
    Closest(BTreeSet<SystemId>),
}

/// Full signature of a route request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteQuery {
    pub map_id: MapId,
    pub source: SystemId,
    pub target: RouteTarget,
    pub configuration: RoutingConfiguration,
}

impl RouteQuery {
    pub fn route(
        map_id: MapId,
        source: SystemId,
        target: SystemId,
        configuration: RoutingConfiguration,
    ) -> Self {
        Self {
            map_id,
            source,
            target: RouteTarget::System(target),
            configuration,
        }
    }

    pub fn closest(
        map_id: MapId,
        source: SystemId,
        candidates: impl IntoIterator<Item = SystemId>,
        configuration: RoutingConfiguration,
    ) -> Self {
        Self {
            map_id,
            source,
            target: RouteTarget::Closest(candidates.into_iter().collect()),
            configuration,
        }
    }
}

/// Answer to a [`RouteQuery`]. `None` inside a variant means unreachable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum RouteOutcome {
    Route(Option<RouteResult>),
    Closest(Option<ClosestSystemResult>),
}

// =============================================================================
// Main Entry Point
// =============================================================================

/// Answer a route query against one map snapshot.
///
/// 1. Validate the configuration and referenced ids
/// 2. Assemble the filtered graph for the map
/// 3. Run the search with the cost model for the route preference
pub fn plan(universe: &Universe, topology: &MapTopology, query: &RouteQuery) -> Result<RouteOutcome> {
    query.configuration.validate()?;

    if topology.map_id != query.map_id {
        return Err(Error::UnknownMap {
            map_id: query.map_id,
        });
    }

    if let RouteTarget::System(target) = query.target {
        if !universe.contains(target) {
            return Err(Error::UnknownSolarsystem { system_id: target });
        }
    }

    let graph = assemble(universe, topology, &query.configuration, query.source)?;

    let outcome = match &query.target {
        RouteTarget::System(target) => RouteOutcome::Route(find_route(
            &graph,
            universe,
            query.source,
            *target,
            &query.configuration,
        )?),
        RouteTarget::Closest(candidates) => RouteOutcome::Closest(find_closest(
            &graph,
            universe,
            query.source,
            candidates,
            &query.configuration,
        )?),
    };

    debug!(
        map_id = query.map_id,
        source = query.source,
        preference = %query.configuration.route_preference,
        found = outcome.is_found(),
        "route planned"
    );
    Ok(outcome)
}

impl RouteOutcome {
    pub fn is_found(&self) -> bool {
        match self {
            RouteOutcome::Route(route) => route.is_some(),
            RouteOutcome::Closest(closest) => closest.is_some(),
        }
    }
}
