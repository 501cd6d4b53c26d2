//! Route query facade tying the universe, a topology source and the route
//! cache together.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::{CacheKey, RouteCache};
use crate::error::{Error, Result};
use crate::events::TopologyListener;
use crate::routing::{
    plan, ClosestSystemResult, RouteOutcome, RouteQuery, RouteResult, RoutingConfiguration,
};
use crate::topology::{MapId, TopologySource};
use crate::universe::{SystemId, Universe};

/// Entry point for route and closest-system queries.
///
/// Cheap to clone; clones share the universe, topology source and cache.
#[derive(Clone)]
pub struct Wayfinder {
    universe: Arc<Universe>,
    topology: Arc<dyn TopologySource>,
    cache: Arc<RouteCache<RouteOutcome>>,
}

impl Wayfinder {
    /// Create a wayfinder with its own, empty route cache.
    pub fn new(universe: Arc<Universe>, topology: Arc<dyn TopologySource>) -> Self {
        Self::with_cache(universe, topology, Arc::new(RouteCache::new()))
    }

    /// Create a wayfinder backed by the process-wide route cache.
    pub fn with_global_cache(universe: Arc<Universe>, topology: Arc<dyn TopologySource>) -> Self {
        Self::with_cache(universe, topology, RouteCache::global())
    }

    pub fn with_cache(
        universe: Arc<Universe>,
        topology: Arc<dyn TopologySource>,
        cache: Arc<RouteCache<RouteOutcome>>,
    ) -> Self {
        Self {
            universe,
            topology,
            cache,
        }
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn cache(&self) -> &Arc<RouteCache<RouteOutcome>> {
        &self.cache
    }

    /// Listener to register with a topology store so mutations flush this
    /// wayfinder's cache.
    pub fn listener(&self) -> Arc<dyn TopologyListener> {
        self.cache.clone()
    }

    /// Cheapest route from `source` to `target` on `map_id`.
    ///
    /// `Ok(None)` means no eligible route exists.
    pub fn route(
        &self,
        map_id: MapId,
        source: SystemId,
        target: SystemId,
        configuration: &RoutingConfiguration,
    ) -> Result<Option<RouteResult>> {
        let query = RouteQuery::route(map_id, source, target, configuration.clone());
        match self.execute(&query)? {
            RouteOutcome::Route(route) => Ok(route),
            RouteOutcome::Closest(_) => Err(Error::MismatchedOutcome { map_id }),
        }
    }

    /// Nearest of `candidates` reachable from `source` on `map_id`.
    pub fn closest(
        &self,
        map_id: MapId,
        source: SystemId,
        candidates: impl IntoIterator<Item = SystemId>,
        configuration: &RoutingConfiguration,
    ) -> Result<Option<ClosestSystemResult>> {
        let query = RouteQuery::closest(map_id, source, candidates, configuration.clone());
        match self.execute(&query)? {
            RouteOutcome::Closest(closest) => Ok(closest),
            RouteOutcome::Route(_) => Err(Error::MismatchedOutcome { map_id }),
        }
    }

    /// Flush every cached route for `map_id`. Call after any committed
    /// placement or connection change on that map.
    pub fn notify_topology_changed(&self, map_id: MapId) {
        self.cache.invalidate(map_id);
    }

    fn execute(&self, query: &RouteQuery) -> Result<RouteOutcome> {
        query.configuration.validate()?;
        let key = CacheKey::for_query(query)?;
        debug!(map_id = query.map_id, %key, source = query.source, "route query");

        self.cache.get_or_compute(query.map_id, key, || {
            // Snapshot after the flight is registered so an invalidation racing
            // this computation always discards its result.
            let topology = self.topology.topology(query.map_id)?;
            plan(&self.universe, &topology, query)
        })
    }
}

impl TopologyListener for Wayfinder {
    fn on_topology_changed(&self, map_id: MapId) {
        info!(map_id, "topology changed");
        self.notify_topology_changed(map_id);
    }
}

impl std::fmt::Debug for Wayfinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wayfinder")
            .field("systems", &self.universe.len())
            .field("cache", &self.cache)
            .finish()
    }
}
