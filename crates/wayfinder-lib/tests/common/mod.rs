//! Common test utilities and fixture helpers.
//!
//! Provides a small hand-built universe, a topology store wired to a
//! wayfinder, and temporary SQLite databases in both supported schemas.

use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::Connection as SqliteConnection;
use tempfile::TempDir;
use wayfinder_lib::{InMemoryTopologyStore, SolarSystem, Universe, Wayfinder};

pub const MAP: i64 = 1;

/// Universe used by most routing tests.
///
/// ```text
///   1 (1.0) --- 2 (0.9) --- 4 (0.2) --- 5 (0.8)
///                 \                     /
///                  3 (0.7) --- 6 (0.9) -
///   7 (-0.3) --- 8 (0.5)        31000001 (J-space, no gates)
/// ```
#[allow(dead_code)]
pub fn universe() -> Universe {
    Universe::from_parts(
        [
            SolarSystem::new(1, "Amarr", Some(1.0)),
            SolarSystem::new(2, "Sarum Prime", Some(0.9)),
            SolarSystem::new(3, "Mahrokht", Some(0.7)),
            SolarSystem::new(4, "Kehour", Some(0.2)),
            SolarSystem::new(5, "Hama", Some(0.8)),
            SolarSystem::new(6, "Bhizheba", Some(0.9)),
            SolarSystem::new(7, "Amamake", Some(-0.3)),
            SolarSystem::new(8, "Osoggur", Some(0.5)),
            SolarSystem::new(31_000_001, "J100001", Some(-1.0)),
        ],
        [(1, 2), (2, 4), (4, 5), (2, 3), (3, 6), (6, 5), (7, 8)],
    )
}

/// Store and wayfinder sharing one universe, with map [`MAP`] created and the
/// wayfinder subscribed to its mutations.
#[allow(dead_code)]
pub fn wired(systems: &[i64]) -> (Arc<InMemoryTopologyStore>, Wayfinder) {
    let universe = Arc::new(universe());
    let store = Arc::new(InMemoryTopologyStore::new(Arc::clone(&universe)));
    let wayfinder = Wayfinder::new(universe, store.clone());
    store.subscribe(wayfinder.listener());

    store.create_map(MAP).expect("create map");
    for &system in systems {
        store.place_system(MAP, system).expect("place system");
    }
    (store, wayfinder)
}

/// Temporary SQLite universe using the `SolarSystems`/`Jumps` layout.
#[allow(dead_code)]
pub fn static_data_db() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("static_data.db");
    let conn = SqliteConnection::open(&path).expect("open temp db");
    conn.execute_batch(
        r#"
        CREATE TABLE Regions (regionID INTEGER PRIMARY KEY, regionName TEXT NOT NULL);
        CREATE TABLE Constellations (
            constellationID INTEGER PRIMARY KEY,
            constellationName TEXT NOT NULL
        );
        CREATE TABLE SolarSystems (
            solarSystemId INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            constellationID INTEGER,
            regionID INTEGER,
            security REAL
        );
        CREATE TABLE Jumps (
            fromSystemId INTEGER NOT NULL,
            toSystemId INTEGER NOT NULL
        );
        INSERT INTO Regions VALUES (10000002, 'The Forge');
        INSERT INTO Constellations VALUES (20000020, 'Kimotoro');
        INSERT INTO SolarSystems VALUES
            (30000142, 'Jita', 20000020, 10000002, 0.95),
            (30000144, 'Perimeter', 20000020, 10000002, 0.95),
            (30000145, 'New Caldari', 20000020, 10000002, 0.96),
            (30002813, 'Tama', NULL, NULL, 0.31);
        INSERT INTO Jumps VALUES
            (30000142, 30000144),
            (30000144, 30000142),
            (30000142, 30000145),
            (30000144, 30002813),
            (30000144, 99999999);
        "#,
    )
    .expect("seed static data");
    (dir, path)
}

/// Temporary SQLite universe using the legacy `mapSolarSystems` layout.
#[allow(dead_code)]
pub fn legacy_db() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("legacy.db");
    let conn = SqliteConnection::open(&path).expect("open temp db");
    conn.execute_batch(
        r#"
        CREATE TABLE mapSolarSystems (
            solarSystemID INTEGER PRIMARY KEY,
            solarSystemName TEXT NOT NULL
        );
        CREATE TABLE mapSolarSystemJumps (
            fromSolarSystemID INTEGER NOT NULL,
            toSolarSystemID INTEGER NOT NULL
        );
        INSERT INTO mapSolarSystems VALUES (1, 'Alpha'), (2, 'Beta'), (3, 'Gamma');
        INSERT INTO mapSolarSystemJumps VALUES (1, 2), (2, 3);
        "#,
    )
    .expect("seed legacy data");
    (dir, path)
}
