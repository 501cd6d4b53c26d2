use criterion::{criterion_group, criterion_main, Criterion};
use once_cell::sync::Lazy;
use std::collections::BTreeSet;
use std::hint::black_box;
use std::sync::Arc;
use wayfinder_lib::{
    plan, Connection, InMemoryTopologyStore, MapTopology, RoutePreference, RouteQuery,
    RoutingConfiguration, SolarSystem, Universe, Wayfinder,
};

const SIDE: i64 = 40;
const MAP: i64 = 1;

fn grid_id(row: i64, col: i64) -> i64 {
    row * SIDE + col + 1
}

/// Square grid of systems joined by stargates, security falling toward the
/// far corner.
static UNIVERSE: Lazy<Universe> = Lazy::new(|| {
    let mut systems = Vec::new();
    let mut gates = Vec::new();
    for row in 0..SIDE {
        for col in 0..SIDE {
            let id = grid_id(row, col);
            let security = 1.0 - (row + col) as f64 / SIDE as f64;
            systems.push(SolarSystem::new(id, format!("G{row}-{col}"), Some(security)));
            if col + 1 < SIDE {
                gates.push((id, grid_id(row, col + 1)));
            }
            if row + 1 < SIDE {
                gates.push((id, grid_id(row + 1, col)));
            }
        }
    }
    Universe::from_parts(systems, gates)
});

static TOPOLOGY: Lazy<MapTopology> = Lazy::new(|| {
    let mut topology = MapTopology::new(MAP);
    topology.systems = UNIVERSE.systems().map(|system| system.id).collect();
    for (index, step) in (0..SIDE).step_by(7).enumerate() {
        topology.connections.push(
            Connection::wormhole(grid_id(step, 0), grid_id(SIDE - 1 - step, SIDE - 1))
                .with_id(index as i64 + 1),
        );
    }
    topology
});

fn benchmark_pathfinding(c: &mut Criterion) {
    let universe = &*UNIVERSE;
    let topology = &*TOPOLOGY;
    let far_corner = grid_id(SIDE - 1, SIDE - 1);

    c.bench_function("shortest_corner_to_corner", |b| {
        let query = RouteQuery::route(MAP, 1, far_corner, RoutingConfiguration::default());
        b.iter(|| black_box(plan(universe, topology, &query).expect("route exists")));
    });

    c.bench_function("secure_corner_to_corner", |b| {
        let configuration = RoutingConfiguration::default()
            .with_preference(RoutePreference::Secure)
            .with_security_penalty(5.0);
        let query = RouteQuery::route(MAP, 1, far_corner, configuration);
        b.iter(|| black_box(plan(universe, topology, &query).expect("route exists")));
    });

    c.bench_function("closest_of_edge_systems", |b| {
        let candidates: BTreeSet<i64> = (0..SIDE).map(|row| grid_id(row, SIDE - 1)).collect();
        let query = RouteQuery::closest(
            MAP,
            grid_id(SIDE / 2, 0),
            candidates,
            RoutingConfiguration::default(),
        );
        b.iter(|| black_box(plan(universe, topology, &query).expect("candidate reachable")));
    });

    c.bench_function("cached_route_hit", |b| {
        let universe = Arc::new(universe.clone());
        let store = Arc::new(InMemoryTopologyStore::new(Arc::clone(&universe)));
        store.insert_map(topology.clone()).expect("map is valid");
        let wayfinder = Wayfinder::new(universe, store);
        let configuration = RoutingConfiguration::default();
        wayfinder
            .route(MAP, 1, far_corner, &configuration)
            .expect("route exists");
        b.iter(|| {
            black_box(
                wayfinder
                    .route(MAP, 1, far_corner, &configuration)
                    .expect("route exists"),
            )
        });
    });
}

criterion_group!(benches, benchmark_pathfinding);
criterion_main!(benches);
