//! Topology-mutation events and the single invalidation hook they map to.
//!
//! Every way a map's shape can change (placing or removing systems, creating,
//! updating or deleting connections, deleting the map) is a variant of
//! [`TopologyEvent`]. Consumers never match on the variant to decide whether
//! to react: each event carries its map id and is delivered to
//! [`TopologyListener::on_topology_changed`].

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::debug;

use crate::topology::{ConnectionId, MapId};
use crate::universe::SystemId;

/// A committed change to a map's topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TopologyEvent {
    SolarSystemPlaced {
        map_id: MapId,
        system_id: SystemId,
    },
    SolarSystemRemoved {
        map_id: MapId,
        system_id: SystemId,
    },
    SolarSystemsRemoved {
        map_id: MapId,
        system_ids: Vec<SystemId>,
    },
    ConnectionCreated {
        map_id: MapId,
        connection_id: ConnectionId,
    },
    /// Mass or lifetime status changed, which can flip eligibility.
    ConnectionUpdated {
        map_id: MapId,
        connection_id: ConnectionId,
    },
    ConnectionDeleted {
        map_id: MapId,
        connection_id: ConnectionId,
    },
    ConnectionsDeleted {
        map_id: MapId,
        connection_ids: Vec<ConnectionId>,
    },
    MapDeleted {
        map_id: MapId,
    },
}

impl TopologyEvent {
    /// Map whose topology changed.
    pub fn map_id(&self) -> MapId {
        match self {
            TopologyEvent::SolarSystemPlaced { map_id, .. }
            | TopologyEvent::SolarSystemRemoved { map_id, .. }
            | TopologyEvent::SolarSystemsRemoved { map_id, .. }
            | TopologyEvent::ConnectionCreated { map_id, .. }
            | TopologyEvent::ConnectionUpdated { map_id, .. }
            | TopologyEvent::ConnectionDeleted { map_id, .. }
            | TopologyEvent::ConnectionsDeleted { map_id, .. }
            | TopologyEvent::MapDeleted { map_id } => *map_id,
        }
    }
}

/// Receiver of topology change notifications.
pub trait TopologyListener: Send + Sync {
    /// Called once per committed mutation of `map_id`.
    fn on_topology_changed(&self, map_id: MapId);
}

/// Fan-out of topology events to registered listeners.
#[derive(Default)]
pub struct TopologyNotifier {
    listeners: RwLock<Vec<Arc<dyn TopologyListener>>>,
}

impl TopologyNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Listeners live as long as the notifier.
    pub fn subscribe(&self, listener: Arc<dyn TopologyListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Deliver `event` to every listener.
    pub fn publish(&self, event: &TopologyEvent) {
        let map_id = event.map_id();
        debug!(map_id, ?event, "publishing topology event");

        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.on_topology_changed(map_id);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for TopologyNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
