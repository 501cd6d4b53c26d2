//! Path cost models implementing the Strategy pattern.
//!
//! Every eligible hop costs one jump plus a security penalty for the system it
//! enters. How that penalty is computed depends on the route preference; the
//! search engine only talks to [`CostModel`].

use crate::graph::Edge;
use crate::universe::{SecurityClass, SolarSystem, Universe, HIGH_SEC_THRESHOLD};

use super::{RoutePreference, RoutingConfiguration};

/// Cost of a single hop before any penalty.
pub const BASE_JUMP_COST: f64 = 1.0;

/// Span of security values below the high-sec threshold (down to -1.0).
const LOW_SECURITY_SPAN: f64 = HIGH_SEC_THRESHOLD + 1.0;

/// Trait for path cost strategies.
///
/// Implementations must return finite, non-negative penalties so every edge
/// costs at least [`BASE_JUMP_COST`].
pub trait CostModel: Send + Sync {
    /// Preference this model implements.
    fn preference(&self) -> RoutePreference;

    /// Penalty for entering `system`. `None` means the system is not in the
    /// static universe and is treated as unknown space.
    fn node_penalty(&self, system: Option<&SolarSystem>) -> f64;

    /// Cost of traversing `edge` into `destination`.
    fn edge_cost(&self, _edge: &Edge, destination: Option<&SolarSystem>) -> f64 {
        BASE_JUMP_COST + self.node_penalty(destination)
    }
}

/// Every hop costs exactly one; security is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct FewestJumps;

impl CostModel for FewestJumps {
    fn preference(&self) -> RoutePreference {
        RoutePreference::Shortest
    }

    fn node_penalty(&self, _system: Option<&SolarSystem>) -> f64 {
        0.0
    }

    fn edge_cost(&self, _edge: &Edge, _destination: Option<&SolarSystem>) -> f64 {
        BASE_JUMP_COST
    }
}

/// Penalize systems below high security, more the lower they go.
///
/// High-sec systems cost nothing extra. Below the threshold the penalty grows
/// linearly until it reaches the full weight at -1.0; wormhole space and
/// systems of unknown security always take the full weight.
#[derive(Debug, Clone, Copy)]
pub struct AvoidLowSecurity {
    weight: f64,
}

impl AvoidLowSecurity {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl CostModel for AvoidLowSecurity {
    fn preference(&self) -> RoutePreference {
        RoutePreference::Secure
    }

    fn node_penalty(&self, system: Option<&SolarSystem>) -> f64 {
        let Some(system) = system else {
            return self.weight;
        };
        match (system.security_class(), system.metadata.security_status) {
            (SecurityClass::HighSec, _) => 0.0,
            (SecurityClass::Wormhole, _) | (_, None) => self.weight,
            (_, Some(security)) => {
                let depth = (HIGH_SEC_THRESHOLD - security) / LOW_SECURITY_SPAN;
                self.weight * depth.clamp(0.0, 1.0)
            }
        }
    }
}

/// Penalize systems with positive security, more the higher they go.
///
/// Null-sec and wormhole space cost nothing extra.
#[derive(Debug, Clone, Copy)]
pub struct PreferLowSecurity {
    weight: f64,
}

impl PreferLowSecurity {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl CostModel for PreferLowSecurity {
    fn preference(&self) -> RoutePreference {
        RoutePreference::Insecure
    }

    fn node_penalty(&self, system: Option<&SolarSystem>) -> f64 {
        let Some(system) = system else {
            return 0.0;
        };
        match (system.security_class(), system.metadata.security_status) {
            (SecurityClass::NullSec | SecurityClass::Wormhole, _) | (_, None) => 0.0,
            (_, Some(security)) => self.weight * security.clamp(0.0, 1.0),
        }
    }
}

/// Select the cost model for a configuration.
pub fn select_cost_model(configuration: &RoutingConfiguration) -> Box<dyn CostModel> {
    let weight = configuration.security_penalty.max(0.0);
    match configuration.route_preference {
        RoutePreference::Shortest => Box::new(FewestJumps),
        RoutePreference::Secure => Box::new(AvoidLowSecurity::new(weight)),
        RoutePreference::Insecure => Box::new(PreferLowSecurity::new(weight)),
    }
}

/// Cost of traversing `edge` under `configuration`.
pub fn edge_cost(edge: &Edge, universe: &Universe, configuration: &RoutingConfiguration) -> f64 {
    select_cost_model(configuration).edge_cost(edge, universe.system(edge.target))
}

/// Penalty for entering `system` under `configuration`.
pub fn node_penalty(system: &SolarSystem, configuration: &RoutingConfiguration) -> f64 {
    select_cost_model(configuration).node_penalty(Some(system))
}
