//! Per-map dynamic overlay: placed systems and wormhole/EveScout connections.
//!
//! [`MapTopology`] is an immutable snapshot. Stores hand snapshots out as
//! `Arc<MapTopology>` so a route computation holds one consistent view for its
//! whole duration, no matter what mutations land meanwhile.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::events::{TopologyEvent, TopologyListener, TopologyNotifier};
use crate::universe::{SystemId, Universe};

/// Numeric identifier for a map.
pub type MapId = i64;

/// Numeric identifier for a connection drawn on a map.
pub type ConnectionId = i64;

/// Family of a connection between two systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    Stargate,
    Wormhole,
    #[serde(rename = "evescout")]
    EveScout,
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ConnectionKind::Stargate => "stargate",
            ConnectionKind::Wormhole => "wormhole",
            ConnectionKind::EveScout => "evescout",
        };
        f.write_str(value)
    }
}

/// Remaining mass of a wormhole, best to worst.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MassStatus {
    #[default]
    Fresh,
    Reduced,
    Critical,
}

/// Remaining lifetime of a wormhole, best to worst.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LifetimeStatus {
    #[default]
    Stable,
    Decaying,
    Critical,
}

/// A bidirectional connection drawn on a map.
///
/// Status fields are supplied by the caller; nothing in this crate degrades
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Assigned by the store on insert.
    #[serde(default)]
    pub id: ConnectionId,
    pub source: SystemId,
    pub target: SystemId,
    pub kind: ConnectionKind,
    #[serde(default)]
    pub mass_status: MassStatus,
    #[serde(default)]
    pub lifetime_status: LifetimeStatus,
}

impl Connection {
    /// A fresh, stable wormhole between two systems.
    pub fn wormhole(source: SystemId, target: SystemId) -> Self {
        Self::new(source, target, ConnectionKind::Wormhole)
    }

    /// A fresh, stable EveScout-reported connection between two systems.
    pub fn eve_scout(source: SystemId, target: SystemId) -> Self {
        Self::new(source, target, ConnectionKind::EveScout)
    }

    fn new(source: SystemId, target: SystemId, kind: ConnectionKind) -> Self {
        Self {
            id: 0,
            source,
            target,
            kind,
            mass_status: MassStatus::default(),
            lifetime_status: LifetimeStatus::default(),
        }
    }

    pub fn with_id(mut self, id: ConnectionId) -> Self {
        self.id = id;
        self
    }

    pub fn with_mass(mut self, mass_status: MassStatus) -> Self {
        self.mass_status = mass_status;
        self
    }

    pub fn with_lifetime(mut self, lifetime_status: LifetimeStatus) -> Self {
        self.lifetime_status = lifetime_status;
        self
    }

    /// Endpoints ordered so that `(a, b)` and `(b, a)` compare equal.
    pub fn endpoints(&self) -> (SystemId, SystemId) {
        if self.source <= self.target {
            (self.source, self.target)
        } else {
            (self.target, self.source)
        }
    }

    pub fn touches(&self, system: SystemId) -> bool {
        self.source == system || self.target == system
    }
}

/// Snapshot of the systems and connections placed on one map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapTopology {
    pub map_id: MapId,
    #[serde(default)]
    pub systems: BTreeSet<SystemId>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl MapTopology {
    pub fn new(map_id: MapId) -> Self {
        Self {
            map_id,
            ..Self::default()
        }
    }

    pub fn contains_system(&self, system: SystemId) -> bool {
        self.systems.contains(&system)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|connection| connection.id == id)
    }

    /// Check every structural invariant against the static universe.
    pub fn validate(&self, universe: &Universe) -> Result<()> {
        if let Some(&unknown) = self.systems.iter().find(|id| !universe.contains(**id)) {
            return Err(Error::UnknownSolarsystem { system_id: unknown });
        }

        let mut seen_ids = BTreeSet::new();
        for (index, connection) in self.connections.iter().enumerate() {
            if !seen_ids.insert(connection.id) {
                return Err(Error::InvalidConnection {
                    reason: format!("connection id {} is used twice", connection.id),
                });
            }
            self.check_connection(connection, &self.connections[..index])?;
        }
        Ok(())
    }

    fn check_connection(&self, candidate: &Connection, existing: &[Connection]) -> Result<()> {
        if candidate.kind == ConnectionKind::Stargate {
            return Err(Error::InvalidConnection {
                reason: "stargates belong to the static universe and cannot be drawn on a map"
                    .to_string(),
            });
        }
        if candidate.source == candidate.target {
            return Err(Error::InvalidConnection {
                reason: format!("connection loops back onto system {}", candidate.source),
            });
        }
        for endpoint in [candidate.source, candidate.target] {
            if !self.contains_system(endpoint) {
                return Err(Error::InvalidConnection {
                    reason: format!(
                        "system {endpoint} is not placed on map {}",
                        self.map_id
                    ),
                });
            }
        }
        let duplicate = existing.iter().any(|other| {
            other.kind == candidate.kind && other.endpoints() == candidate.endpoints()
        });
        if duplicate {
            return Err(Error::DuplicateConnection {
                map_id: self.map_id,
                source_id: candidate.source,
                target_id: candidate.target,
                kind: candidate.kind.to_string(),
            });
        }
        Ok(())
    }

    fn connection_mut(&mut self, id: ConnectionId) -> Result<&mut Connection> {
        let map_id = self.map_id;
        self.connections
            .iter_mut()
            .find(|connection| connection.id == id)
            .ok_or(Error::UnknownConnection {
                map_id,
                connection_id: id,
            })
    }

    /// Remove a system along with every connection touching it.
    fn remove_system(&mut self, system: SystemId) -> bool {
        if !self.systems.remove(&system) {
            return false;
        }
        self.connections.retain(|connection| !connection.touches(system));
        true
    }
}

/// Read-only access to map topology snapshots.
pub trait TopologySource: Send + Sync {
    /// Return the current snapshot of `map_id`, or [`Error::UnknownMap`].
    fn topology(&self, map_id: MapId) -> Result<Arc<MapTopology>>;
}

/// In-memory map topology store.
///
/// Every mutation clones the current snapshot, applies the change, validates
/// it and swaps the new snapshot in under the write lock, so readers only ever
/// see fully-applied changes. The matching [`TopologyEvent`] is published to
/// subscribers after the swap commits.
#[derive(Debug)]
pub struct InMemoryTopologyStore {
    universe: Arc<Universe>,
    maps: RwLock<HashMap<MapId, Arc<MapTopology>>>,
    next_connection_id: AtomicI64,
    notifier: TopologyNotifier,
}

impl InMemoryTopologyStore {
    pub fn new(universe: Arc<Universe>) -> Self {
        Self {
            universe,
            maps: RwLock::new(HashMap::new()),
            next_connection_id: AtomicI64::new(1),
            notifier: TopologyNotifier::new(),
        }
    }

    /// Register a listener for committed mutations.
    pub fn subscribe(&self, listener: Arc<dyn TopologyListener>) {
        self.notifier.subscribe(listener);
    }

    /// Create an empty map.
    pub fn create_map(&self, map_id: MapId) -> Result<()> {
        self.insert_map(MapTopology::new(map_id))
    }

    /// Install a complete topology for a new map, e.g. one read from disk.
    ///
    /// Connection ids of zero are assigned fresh ids.
    pub fn insert_map(&self, mut topology: MapTopology) -> Result<()> {
        if let Some(highest) = topology.connections.iter().map(|c| c.id).max() {
            self.next_connection_id
                .fetch_max(highest + 1, Ordering::Relaxed);
        }
        for connection in topology.connections.iter_mut() {
            if connection.id == 0 {
                connection.id = self.allocate_connection_id();
            }
        }
        topology.validate(&self.universe)?;

        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        if maps.contains_key(&topology.map_id) {
            return Err(Error::MapExists {
                map_id: topology.map_id,
            });
        }
        debug!(
            map_id = topology.map_id,
            systems = topology.systems.len(),
            connections = topology.connections.len(),
            "map created"
        );
        maps.insert(topology.map_id, Arc::new(topology));
        Ok(())
    }

    /// Delete a map and everything placed on it.
    pub fn delete_map(&self, map_id: MapId) -> Result<()> {
        let removed = self
            .maps
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&map_id);
        if removed.is_none() {
            return Err(Error::UnknownMap { map_id });
        }
        self.notifier.publish(&TopologyEvent::MapDeleted { map_id });
        Ok(())
    }

    /// Place a system on a map. Placing an already placed system is a no-op.
    pub fn place_system(&self, map_id: MapId, system_id: SystemId) -> Result<()> {
        if !self.universe.contains(system_id) {
            return Err(Error::UnknownSolarsystem { system_id });
        }
        self.mutate(map_id, |topology| {
            let event = topology
                .systems
                .insert(system_id)
                .then_some(TopologyEvent::SolarSystemPlaced { map_id, system_id });
            Ok(((), event))
        })
    }

    /// Remove a system and its connections from a map.
    pub fn remove_system(&self, map_id: MapId, system_id: SystemId) -> Result<()> {
        self.mutate(map_id, |topology| {
            let event = topology
                .remove_system(system_id)
                .then_some(TopologyEvent::SolarSystemRemoved { map_id, system_id });
            Ok(((), event))
        })
    }

    /// Remove several systems in one transaction. Returns how many were placed.
    pub fn remove_systems(&self, map_id: MapId, system_ids: &[SystemId]) -> Result<usize> {
        self.mutate(map_id, |topology| {
            let removed: Vec<SystemId> = system_ids
                .iter()
                .copied()
                .filter(|&system| topology.remove_system(system))
                .collect();
            let count = removed.len();
            let event = (!removed.is_empty()).then_some(TopologyEvent::SolarSystemsRemoved {
                map_id,
                system_ids: removed,
            });
            Ok((count, event))
        })
    }

    /// Add a connection between two placed systems and return its id.
    pub fn add_connection(&self, map_id: MapId, connection: Connection) -> Result<ConnectionId> {
        let connection_id = self.allocate_connection_id();
        self.mutate(map_id, |topology| {
            let connection = connection.with_id(connection_id);
            topology.check_connection(&connection, &topology.connections)?;
            topology.connections.push(connection);
            Ok((
                connection_id,
                Some(TopologyEvent::ConnectionCreated {
                    map_id,
                    connection_id,
                }),
            ))
        })
    }

    /// Record new mass and lifetime statuses for a connection.
    pub fn update_connection(
        &self,
        map_id: MapId,
        connection_id: ConnectionId,
        mass_status: MassStatus,
        lifetime_status: LifetimeStatus,
    ) -> Result<()> {
        self.mutate(map_id, |topology| {
            let connection = topology.connection_mut(connection_id)?;
            let changed = connection.mass_status != mass_status
                || connection.lifetime_status != lifetime_status;
            connection.mass_status = mass_status;
            connection.lifetime_status = lifetime_status;
            let event = changed.then_some(TopologyEvent::ConnectionUpdated {
                map_id,
                connection_id,
            });
            Ok(((), event))
        })
    }

    /// Delete one connection.
    pub fn remove_connection(&self, map_id: MapId, connection_id: ConnectionId) -> Result<()> {
        self.mutate(map_id, |topology| {
            topology.connection_mut(connection_id)?;
            topology
                .connections
                .retain(|connection| connection.id != connection_id);
            Ok((
                (),
                Some(TopologyEvent::ConnectionDeleted {
                    map_id,
                    connection_id,
                }),
            ))
        })
    }

    /// Delete several connections in one transaction. Unknown ids are ignored.
    pub fn remove_connections(
        &self,
        map_id: MapId,
        connection_ids: &[ConnectionId],
    ) -> Result<usize> {
        self.mutate(map_id, |topology| {
            let mut removed = Vec::new();
            topology.connections.retain(|connection| {
                let doomed = connection_ids.contains(&connection.id);
                if doomed {
                    removed.push(connection.id);
                }
                !doomed
            });
            let count = removed.len();
            let event = (!removed.is_empty()).then_some(TopologyEvent::ConnectionsDeleted {
                map_id,
                connection_ids: removed,
            });
            Ok((count, event))
        })
    }

    fn allocate_connection_id(&self) -> ConnectionId {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Apply `change` to a copy of the map and commit it when it reports an
    /// event. Errors leave the stored snapshot untouched.
    fn mutate<T>(
        &self,
        map_id: MapId,
        change: impl FnOnce(&mut MapTopology) -> Result<(T, Option<TopologyEvent>)>,
    ) -> Result<T> {
        let (value, event) = {
            let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
            let current = maps.get(&map_id).ok_or(Error::UnknownMap { map_id })?;
            let mut next = MapTopology::clone(current);
            let (value, event) = change(&mut next)?;
            if event.is_some() {
                maps.insert(map_id, Arc::new(next));
            }
            (value, event)
        };

        if let Some(event) = event {
            self.notifier.publish(&event);
        }
        Ok(value)
    }
}

impl TopologySource for InMemoryTopologyStore {
    fn topology(&self, map_id: MapId) -> Result<Arc<MapTopology>> {
        self.maps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&map_id)
            .cloned()
            .ok_or(Error::UnknownMap { map_id })
    }
}
