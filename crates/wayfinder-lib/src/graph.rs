use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::error::{Error, Result};
use crate::routing::RoutingConfiguration;
use crate::topology::{ConnectionId, ConnectionKind, MapTopology};
use crate::universe::{SystemId, Universe};

/// Edge within the routing graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub target: SystemId,
    pub kind: ConnectionKind,
    /// Map connection backing this edge; `None` for static stargates.
    pub connection_id: Option<ConnectionId>,
}

/// Transient, read-only routing graph for one map and one configuration.
///
/// Only eligible edges are present: a connection filtered out during assembly
/// can never show up in a route, whatever its cost would have been.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: BTreeSet<SystemId>,
    adjacency: HashMap<SystemId, Vec<Edge>>,
}

impl Graph {
    /// Whether `system` is a node of this graph.
    pub fn contains(&self, system: SystemId) -> bool {
        self.nodes.contains(&system)
    }

    /// Return the neighbours for a given system identifier, ordered by target
    /// id and then connection kind.
    pub fn neighbours(&self, system: SystemId) -> &[Edge] {
        self.adjacency
            .get(&system)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn nodes(&self) -> impl Iterator<Item = SystemId> + '_ {
        self.nodes.iter().copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of directed edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    fn add_edge(&mut self, from: SystemId, edge: Edge) {
        self.adjacency.entry(from).or_default().push(edge);
    }
}

/// Merge the static universe and one map's overlay into a routing graph.
///
/// Nodes are the systems placed on the map, the source, and every system one
/// stargate away from the source, so a route may leave the mapped region
/// through the source's gates. Stargate edges come from the static universe
/// and join two placed systems or touch the source; wormhole and EveScout
/// edges come from the map. Edges failing the configuration's family toggles
/// or status thresholds are left out, as are edges entering avoided systems.
pub fn assemble(
    universe: &Universe,
    topology: &MapTopology,
    configuration: &RoutingConfiguration,
    source: SystemId,
) -> Result<Graph> {
    if !universe.contains(source) {
        return Err(Error::UnknownSolarsystem { system_id: source });
    }

    let mut graph = Graph::default();
    graph.nodes.extend(
        topology
            .systems
            .iter()
            .copied()
            .filter(|id| universe.contains(*id)),
    );
    graph.nodes.insert(source);
    graph.nodes.extend(universe.stargates(source).iter().copied());

    let enters = |target: SystemId| !configuration.avoids(target);

    if configuration.use_stargates {
        let nodes: Vec<SystemId> = graph.nodes.iter().copied().collect();
        for from in nodes {
            for &to in universe.stargates(from) {
                let mapped = topology.contains_system(from) && topology.contains_system(to);
                let border = from == source || to == source;
                if (mapped || border) && graph.contains(to) && enters(to) {
                    graph.add_edge(
                        from,
                        Edge {
                            target: to,
                            kind: ConnectionKind::Stargate,
                            connection_id: None,
                        },
                    );
                }
            }
        }
    }

    let mut filtered = 0usize;
    for connection in &topology.connections {
        if !configuration.permits(connection)
            || !graph.contains(connection.source)
            || !graph.contains(connection.target)
        {
            filtered += 1;
            continue;
        }
        for (from, to) in [
            (connection.source, connection.target),
            (connection.target, connection.source),
        ] {
            if enters(to) {
                graph.add_edge(
                    from,
                    Edge {
                        target: to,
                        kind: connection.kind,
                        connection_id: Some(connection.id),
                    },
                );
            }
        }
    }

    for edges in graph.adjacency.values_mut() {
        edges.sort_by(|a, b| {
            (a.target, a.kind, a.connection_id).cmp(&(b.target, b.kind, b.connection_id))
        });
    }

    debug!(
        map_id = topology.map_id,
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        filtered_connections = filtered,
        "assembled routing graph"
    );

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Connection, LifetimeStatus, MassStatus};
    use crate::universe::SolarSystem;

    // 1 - 2 - 3 - 4 by stargate; only 1..=3 placed.
    fn universe() -> Universe {
        Universe::from_parts(
            (1..=5).map(|id| SolarSystem::new(id, format!("S{id}"), Some(0.5))),
            [(1, 2), (2, 3), (3, 4), (1, 5)],
        )
    }

    fn topology() -> MapTopology {
        let mut topology = MapTopology::new(1);
        topology.systems.extend([1, 2, 3]);
        topology.connections.push(Connection::wormhole(1, 3).with_id(10));
        topology
            .connections
            .push(Connection::eve_scout(2, 3).with_id(11).with_mass(MassStatus::Reduced));
        topology
    }

    fn targets(graph: &Graph, from: SystemId) -> Vec<(SystemId, ConnectionKind)> {
        graph
            .neighbours(from)
            .iter()
            .map(|e| (e.target, e.kind))
            .collect()
    }

    #[test]
    fn includes_placed_systems_and_source_borders() {
        let graph = assemble(&universe(), &topology(), &RoutingConfiguration::default(), 1)
            .unwrap();
        assert_eq!(graph.nodes().collect::<Vec<_>>(), vec![1, 2, 3, 5]);
        // 4 borders 3, not the source, so it stays outside.
        assert!(!graph.contains(4));
        assert_eq!(targets(&graph, 5), vec![(1, ConnectionKind::Stargate)]);
        assert_eq!(
            targets(&graph, 1),
            vec![
                (2, ConnectionKind::Stargate),
                (3, ConnectionKind::Wormhole),
                (5, ConnectionKind::Stargate)
            ]
        );
    }

    #[test]
    fn map_connections_are_bidirectional() {
        let graph = assemble(&universe(), &topology(), &RoutingConfiguration::default(), 2)
            .unwrap();
        assert!(targets(&graph, 3).contains(&(1, ConnectionKind::Wormhole)));
        assert!(targets(&graph, 3).contains(&(2, ConnectionKind::EveScout)));
    }

    #[test]
    fn drops_ineligible_connections() {
        let config = RoutingConfiguration::default()
            .with_max_mass(MassStatus::Fresh)
            .with_max_lifetime(LifetimeStatus::Stable);
        let graph = assemble(&universe(), &topology(), &config, 1).unwrap();
        assert!(!targets(&graph, 2).contains(&(3, ConnectionKind::EveScout)));

        let config = RoutingConfiguration::default().with_evescout(false);
        let graph = assemble(&universe(), &topology(), &config, 1).unwrap();
        assert!(graph
            .neighbours(3)
            .iter()
            .all(|e| e.kind != ConnectionKind::EveScout));
    }

    #[test]
    fn stargate_toggle_leaves_only_map_connections() {
        let config = RoutingConfiguration {
            use_stargates: false,
            ..RoutingConfiguration::default()
        };
        let graph = assemble(&universe(), &topology(), &config, 1).unwrap();
        assert_eq!(targets(&graph, 1), vec![(3, ConnectionKind::Wormhole)]);
    }

    #[test]
    fn avoided_systems_cannot_be_entered() {
        let config = RoutingConfiguration::default().avoiding([3]);
        let graph = assemble(&universe(), &topology(), &config, 1).unwrap();
        for from in graph.nodes() {
            assert!(graph.neighbours(from).iter().all(|e| e.target != 3));
        }
        // Leaving an avoided system is still represented.
        assert!(!graph.neighbours(3).is_empty());
    }

    #[test]
    fn unknown_source_is_rejected() {
        let err = assemble(&universe(), &topology(), &RoutingConfiguration::default(), 99)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownSolarsystem { system_id: 99 }));
    }
}
