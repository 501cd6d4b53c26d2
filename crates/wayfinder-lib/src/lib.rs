//! Wayfinder library entry points.
//!
//! This crate loads the static universe of solar systems and stargates, keeps
//! per-map overlays of wormhole and EveScout connections, assembles routing
//! graphs under a pilot's routing configuration, searches them, and caches the
//! answers per map until that map's topology changes. Higher-level consumers
//! (the CLI, application servers) should only depend on the functions
//! exported here instead of reimplementing behavior.
//!

pub mod cache;
pub mod error;
pub mod events;
pub mod graph;
pub mod path;
pub mod routing;
pub mod service;
pub mod topology;
pub mod universe;

pub use cache::{CacheKey, CacheStats, RouteCache};
pub use error::{Error, Result};
pub use events::{TopologyEvent, TopologyListener, TopologyNotifier};
pub use graph::{assemble, Edge, Graph};
pub use path::{find_closest, find_route};
pub use routing::{
    plan, ClosestSystemResult, CostModel, RouteOutcome, RoutePreference, RouteQuery, RouteResult,
    RouteStep, RouteTarget, RoutingConfiguration,
};
pub use service::Wayfinder;
pub use topology::{
    Connection, ConnectionId, ConnectionKind, InMemoryTopologyStore, LifetimeStatus, MapId,
    MapTopology, MassStatus, TopologySource,
};
pub use universe::{load_universe, SecurityClass, SolarSystem, SystemId, SystemMetadata, Universe};
