use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::routing::{
    select_cost_model, ClosestSystemResult, CostModel, RouteResult, RouteStep,
    RoutingConfiguration,
};
use crate::topology::ConnectionKind;
use crate::universe::{SystemId, Universe};

/// Costs closer than this are considered equal; the tie-break rules decide.
const COST_EPSILON: f64 = 1e-9;

/// Find the cheapest route from `source` to `target`.
///
/// Ties on cost are broken by fewer jumps, then by the lexicographically
/// smallest sequence of system ids, so identical inputs always produce the
/// identical route. With a jump limit the search never extends a route past
/// it, so the answer is the cheapest route within the limit. Returns
/// `Ok(None)` when the target is unreachable or either endpoint is avoided.
pub fn find_route(
    graph: &Graph,
    universe: &Universe,
    source: SystemId,
    target: SystemId,
    configuration: &RoutingConfiguration,
) -> Result<Option<RouteResult>> {
    ensure_node(graph, source)?;
    ensure_node(graph, target)?;

    if configuration.avoids(source) || configuration.avoids(target) {
        return Ok(None);
    }

    let model = select_cost_model(configuration);
    let mut search = Search::new(graph, universe, model.as_ref(), configuration, source);
    Ok(search
        .nearest(|node| node == target)
        .map(|state| search.route_to(state)))
}

/// Find the nearest system among `candidates` and the route to it.
///
/// Among candidates reached with the same cost and jump count the smallest
/// id wins. Candidates outside the graph, or beyond the jump limit, are
/// simply unreachable.
pub fn find_closest(
    graph: &Graph,
    universe: &Universe,
    source: SystemId,
    candidates: &BTreeSet<SystemId>,
    configuration: &RoutingConfiguration,
) -> Result<Option<ClosestSystemResult>> {
    ensure_node(graph, source)?;

    if configuration.avoids(source) || candidates.is_empty() {
        return Ok(None);
    }

    let model = select_cost_model(configuration);
    let mut search = Search::new(graph, universe, model.as_ref(), configuration, source);
    Ok(search
        .nearest(|node| candidates.contains(&node) && !configuration.avoids(node))
        .map(|state| ClosestSystemResult {
            target: state.node,
            route: search.route_to(state),
        }))
}

fn ensure_node(graph: &Graph, system: SystemId) -> Result<()> {
    if graph.contains(system) {
        Ok(())
    } else {
        Err(Error::UnknownSolarsystem { system_id: system })
    }
}

/// Search node: a system, plus the jump count used to reach it when a jump
/// limit is set. Without a limit `layer` is always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct State {
    node: SystemId,
    layer: usize,
}

#[derive(Debug, Clone, Copy)]
struct Label {
    cost: f64,
    jumps: usize,
    parent: Option<State>,
    via: Option<ConnectionKind>,
}

/// Dijkstra over (cost, jumps) labels.
///
/// Every edge costs at least one, so all predecessors of a state are finalized
/// before the state itself; equal-cost alternatives are therefore all known
/// when the tie-break runs.
///
/// Under a jump limit the same system may be reached in several layers. A
/// layer is only expanded while no cheaper layer with fewer or equal jumps has
/// been finalized for that system.
struct Search<'a> {
    graph: &'a Graph,
    universe: &'a Universe,
    model: &'a dyn CostModel,
    max_jumps: Option<usize>,
    labels: HashMap<State, Label>,
    finalized: HashSet<State>,
    /// Fewest jumps among the finalized layers of each system.
    settled: HashMap<SystemId, usize>,
    queue: BinaryHeap<QueueEntry>,
}

impl<'a> Search<'a> {
    fn new(
        graph: &'a Graph,
        universe: &'a Universe,
        model: &'a dyn CostModel,
        configuration: &RoutingConfiguration,
        source: SystemId,
    ) -> Self {
        let start = State {
            node: source,
            layer: 0,
        };
        let mut labels = HashMap::new();
        labels.insert(
            start,
            Label {
                cost: 0.0,
                jumps: 0,
                parent: None,
                via: None,
            },
        );
        let mut queue = BinaryHeap::new();
        queue.push(QueueEntry::new(start, 0.0, 0));

        Self {
            graph,
            universe,
            model,
            max_jumps: configuration.max_jumps,
            labels,
            finalized: HashSet::new(),
            settled: HashMap::new(),
            queue,
        }
    }

    /// Best finalized state whose system satisfies `accept`.
    ///
    /// Keeps draining states within epsilon of the first match so the
    /// tie-break sees every equal-cost contender.
    fn nearest(&mut self, accept: impl Fn(SystemId) -> bool) -> Option<State> {
        let mut best: Option<State> = None;
        while let Some(state) = self.next_finalized() {
            if let Some(current) = best {
                if self.labels[&state].cost > self.labels[&current].cost + COST_EPSILON {
                    break;
                }
            }
            if !accept(state.node) {
                continue;
            }
            best = match best {
                Some(current) if !self.closer(state, current) => Some(current),
                _ => Some(state),
            };
        }
        best
    }

    /// Finalize the next closest state and relax its edges.
    fn next_finalized(&mut self) -> Option<State> {
        while let Some(entry) = self.queue.pop() {
            let state = entry.state;
            if !self.finalized.insert(state) {
                continue;
            }
            let jumps = self.labels[&state].jumps;
            if self.dominated(state.node, jumps) {
                continue;
            }
            self.settled.insert(state.node, jumps);
            self.relax(state);
            return Some(state);
        }
        None
    }

    /// A finalized layer of `node` is at least as cheap and no longer.
    fn dominated(&self, node: SystemId, jumps: usize) -> bool {
        self.settled.get(&node).is_some_and(|&seen| seen <= jumps)
    }

    fn relax(&mut self, state: State) {
        let current = self.labels[&state];
        let jumps = current.jumps + 1;
        if self.max_jumps.is_some_and(|limit| jumps > limit) {
            return;
        }
        let layer = if self.max_jumps.is_some() { jumps } else { 0 };

        let graph = self.graph;
        for edge in graph.neighbours(state.node) {
            let next = State {
                node: edge.target,
                layer,
            };
            if self.finalized.contains(&next) || self.dominated(next.node, jumps) {
                continue;
            }

            let destination = self.universe.system(next.node);
            let candidate = Label {
                cost: current.cost + self.model.edge_cost(edge, destination),
                jumps,
                parent: Some(state),
                via: Some(edge.kind),
            };

            let improves = match self.labels.get(&next) {
                None => true,
                Some(existing) => self.prefer(&candidate, existing),
            };
            if improves {
                self.labels.insert(next, candidate);
                self.queue
                    .push(QueueEntry::new(next, candidate.cost, candidate.jumps));
            }
        }
    }

    fn prefer(&self, candidate: &Label, existing: &Label) -> bool {
        if candidate.cost < existing.cost - COST_EPSILON {
            return true;
        }
        if candidate.cost > existing.cost + COST_EPSILON {
            return false;
        }
        if candidate.jumps != existing.jumps {
            return candidate.jumps < existing.jumps;
        }
        match (candidate.parent, existing.parent) {
            (Some(a), Some(b)) if a != b => self.path_to(a) < self.path_to(b),
            _ => false,
        }
    }

    /// Whether finalized `state` is a better answer than finalized `other`.
    fn closer(&self, state: State, other: State) -> bool {
        let a = &self.labels[&state];
        let b = &self.labels[&other];
        if (a.cost - b.cost).abs() > COST_EPSILON {
            return a.cost < b.cost;
        }
        (a.jumps, state.node) < (b.jumps, other.node)
    }

    fn states_to(&self, state: State) -> Vec<State> {
        let mut states = Vec::new();
        let mut current = Some(state);
        while let Some(at) = current {
            states.push(at);
            current = self.labels.get(&at).and_then(|label| label.parent);
        }
        states.reverse();
        states
    }

    fn path_to(&self, state: State) -> Vec<SystemId> {
        self.states_to(state).into_iter().map(|at| at.node).collect()
    }

    fn route_to(&self, state: State) -> RouteResult {
        let steps = self
            .states_to(state)
            .into_iter()
            .map(|at| RouteStep {
                solarsystem_id: at.node,
                via: self.labels.get(&at).and_then(|label| label.via),
            })
            .collect();
        let label = self.labels[&state];

        RouteResult {
            steps,
            jumps: label.jumps,
            cost: label.cost,
        }
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct FloatOrd(f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct QueueEntry {
    state: State,
    cost: FloatOrd,
    jumps: usize,
}

impl QueueEntry {
    fn new(state: State, cost: f64, jumps: usize) -> Self {
        Self {
            state,
            cost: FloatOrd(cost),
            jumps,
        }
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering so BinaryHeap becomes a min-heap by cost.
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.jumps.cmp(&self.jumps))
            .then_with(|| other.state.cmp(&self.state))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::assemble;
    use crate::routing::RoutePreference;
    use crate::topology::{Connection, MapTopology};
    use crate::universe::SolarSystem;

    // Diamond: 1 -> {2, 3} -> 4, all stargates, all placed.
    fn diamond(security_of_2: f64) -> (Universe, MapTopology) {
        let universe = Universe::from_parts(
            [
                SolarSystem::new(1, "A", Some(0.9)),
                SolarSystem::new(2, "B", Some(security_of_2)),
                SolarSystem::new(3, "C", Some(0.9)),
                SolarSystem::new(4, "D", Some(0.9)),
            ],
            [(1, 2), (1, 3), (2, 4), (3, 4)],
        );
        let mut topology = MapTopology::new(1);
        topology.systems.extend([1, 2, 3, 4]);
        (universe, topology)
    }

    fn route(
        universe: &Universe,
        topology: &MapTopology,
        source: SystemId,
        target: SystemId,
        config: &RoutingConfiguration,
    ) -> Option<RouteResult> {
        let graph = assemble(universe, topology, config, source).unwrap();
        find_route(&graph, universe, source, target, config).unwrap()
    }

    #[test]
    fn equal_cost_routes_pick_smallest_ids() {
        let (universe, topology) = diamond(0.9);
        let route = route(&universe, &topology, 1, 4, &RoutingConfiguration::default()).unwrap();
        assert_eq!(route.system_ids(), vec![1, 2, 4]);
        assert_eq!(route.jumps, 2);
        assert_eq!(route.cost, 2.0);
    }

    #[test]
    fn secure_preference_detours_around_low_security() {
        let (universe, topology) = diamond(0.1);
        let config = RoutingConfiguration::default()
            .with_preference(RoutePreference::Secure)
            .with_security_penalty(5.0);
        let route = route(&universe, &topology, 1, 4, &config).unwrap();
        assert_eq!(route.system_ids(), vec![1, 3, 4]);
        assert!((route.cost - 2.0).abs() < 1e-9);
    }

    #[test]
    fn self_route_is_empty() {
        let (universe, topology) = diamond(0.9);
        let route = route(&universe, &topology, 3, 3, &RoutingConfiguration::default()).unwrap();
        assert_eq!(route.jumps, 0);
        assert_eq!(route.cost, 0.0);
        assert_eq!(
            route.steps,
            vec![RouteStep {
                solarsystem_id: 3,
                via: None
            }]
        );
    }

    #[test]
    fn prefers_fewer_jumps_on_equal_cost() {
        // 1 -> 6 -> 4 crosses a -1.0 system (penalty 1) for a cost of 3 in two
        // jumps; 1 -> 3 -> 5 -> 4 stays in high-sec for the same cost in three.
        let universe = Universe::from_parts(
            [
                SolarSystem::new(1, "A", Some(0.9)),
                SolarSystem::new(3, "C", Some(0.9)),
                SolarSystem::new(4, "D", Some(0.9)),
                SolarSystem::new(5, "E", Some(0.9)),
                SolarSystem::new(6, "F", Some(-1.0)),
            ],
            [(1, 6), (6, 4), (1, 3), (3, 5), (5, 4)],
        );
        let mut topology = MapTopology::new(1);
        topology.systems.extend([1, 3, 4, 5, 6]);
        let config = RoutingConfiguration::default()
            .with_preference(RoutePreference::Secure)
            .with_security_penalty(1.0);

        let route = route(&universe, &topology, 1, 4, &config).unwrap();
        assert_eq!(route.system_ids(), vec![1, 6, 4]);
        assert_eq!(route.jumps, 2);
        assert!((route.cost - 3.0).abs() < 1e-9);
    }

    #[test]
    fn unreachable_target_is_none() {
        let (universe, mut topology) = diamond(0.9);
        topology.systems.remove(&2);
        topology.systems.remove(&3);
        // 4 is placed but only connected through unplaced systems.
        assert!(route(&universe, &topology, 1, 4, &RoutingConfiguration::default()).is_none());
    }

    #[test]
    fn target_outside_graph_is_an_error() {
        let (universe, mut topology) = diamond(0.9);
        topology.systems.remove(&4);
        let config = RoutingConfiguration::default();
        let graph = assemble(&universe, &topology, &config, 1).unwrap();
        assert!(matches!(
            find_route(&graph, &universe, 1, 4, &config),
            Err(Error::UnknownSolarsystem { system_id: 4 })
        ));
    }

    #[test]
    fn max_jumps_turns_long_routes_into_none() {
        let (universe, topology) = diamond(0.9);
        let config = RoutingConfiguration::default().with_max_jumps(1);
        assert!(route(&universe, &topology, 1, 4, &config).is_none());
        assert!(route(&universe, &topology, 1, 2, &config).is_some());
    }

    // 1 -> 2 -> 3 crosses deep null-sec; 1 -> 4 -> 5 -> 3 stays in high-sec.
    fn short_but_dangerous() -> (Universe, MapTopology, RoutingConfiguration) {
        let universe = Universe::from_parts(
            [
                SolarSystem::new(1, "A", Some(0.9)),
                SolarSystem::new(2, "B", Some(-0.9)),
                SolarSystem::new(3, "C", Some(0.9)),
                SolarSystem::new(4, "D", Some(0.9)),
                SolarSystem::new(5, "E", Some(0.9)),
            ],
            [(1, 2), (2, 3), (1, 4), (4, 5), (5, 3)],
        );
        let mut topology = MapTopology::new(1);
        topology.systems.extend([1, 2, 3, 4, 5]);
        let config = RoutingConfiguration::default()
            .with_preference(RoutePreference::Secure)
            .with_security_penalty(10.0);
        (universe, topology, config)
    }

    #[test]
    fn max_jumps_bounds_the_search_not_the_answer() {
        let (universe, topology, config) = short_but_dangerous();

        let unbounded = route(&universe, &topology, 1, 3, &config).unwrap();
        assert_eq!(unbounded.system_ids(), vec![1, 4, 5, 3]);

        let bounded = config.clone().with_max_jumps(2);
        let route = route(&universe, &topology, 1, 3, &bounded).unwrap();
        assert_eq!(route.system_ids(), vec![1, 2, 3]);
        assert_eq!(route.jumps, 2);
        assert!(route.cost > unbounded.cost);
    }

    #[test]
    fn closest_skips_candidates_beyond_max_jumps() {
        let (universe, topology, config) = short_but_dangerous();
        let graph = assemble(&universe, &topology, &config, 1).unwrap();
        let candidates = BTreeSet::from([2, 3]);

        let closest = find_closest(&graph, &universe, 1, &candidates, &config)
            .unwrap()
            .unwrap();
        assert_eq!(closest.target, 3);

        let bounded = config.with_max_jumps(1);
        let closest = find_closest(&graph, &universe, 1, &candidates, &bounded)
            .unwrap()
            .unwrap();
        assert_eq!(closest.target, 2);
        assert_eq!(closest.route.system_ids(), vec![1, 2]);
    }

    #[test]
    fn avoided_endpoint_is_none() {
        let (universe, topology) = diamond(0.9);
        let config = RoutingConfiguration::default().avoiding([4]);
        assert!(route(&universe, &topology, 1, 4, &config).is_none());
    }

    #[test]
    fn wormhole_shortcut_is_used_and_labelled() {
        let (universe, mut topology) = diamond(0.9);
        topology.connections.push(Connection::wormhole(1, 4).with_id(1));
        let route = route(&universe, &topology, 1, 4, &RoutingConfiguration::default()).unwrap();
        assert_eq!(route.system_ids(), vec![1, 4]);
        assert_eq!(route.steps[1].via, Some(ConnectionKind::Wormhole));
    }

    #[test]
    fn closest_stops_at_nearest_candidate() {
        let (universe, topology) = diamond(0.9);
        let config = RoutingConfiguration::default();
        let graph = assemble(&universe, &topology, &config, 1).unwrap();

        let candidates = BTreeSet::from([4, 3]);
        let closest = find_closest(&graph, &universe, 1, &candidates, &config)
            .unwrap()
            .unwrap();
        assert_eq!(closest.target, 3);
        assert_eq!(closest.route.jumps, 1);

        let tied = BTreeSet::from([3, 2]);
        let closest = find_closest(&graph, &universe, 1, &tied, &config)
            .unwrap()
            .unwrap();
        assert_eq!(closest.target, 2);
    }

    #[test]
    fn closest_includes_source_and_ignores_unknown_candidates() {
        let (universe, topology) = diamond(0.9);
        let config = RoutingConfiguration::default();
        let graph = assemble(&universe, &topology, &config, 2).unwrap();

        let closest = find_closest(&graph, &universe, 2, &BTreeSet::from([2, 4]), &config)
            .unwrap()
            .unwrap();
        assert_eq!(closest.target, 2);
        assert_eq!(closest.route.jumps, 0);

        assert!(find_closest(&graph, &universe, 2, &BTreeSet::from([99]), &config)
            .unwrap()
            .is_none());
        assert!(find_closest(&graph, &universe, 2, &BTreeSet::new(), &config)
            .unwrap()
            .is_none());
    }
}
