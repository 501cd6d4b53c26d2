use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fmt::Write as _;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use rusqlite::{Connection, OpenFlags, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Numeric identifier for a solar system.
pub type SystemId = i64;

/// Systems at or above this security value count as high security space.
pub const HIGH_SEC_THRESHOLD: f64 = 0.45;

/// Identifier range reserved for wormhole-space (J-space) systems.
pub const WORMHOLE_SYSTEM_IDS: Range<SystemId> = 31_000_000..32_000_000;

/// Minimum similarity for a name to be offered as a suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.7;

/// Security classification derived from a system's security value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityClass {
    HighSec,
    LowSec,
    NullSec,
    Wormhole,
}

impl fmt::Display for SecurityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            SecurityClass::HighSec => "H",
            SecurityClass::LowSec => "L",
            SecurityClass::NullSec => "0.0",
            SecurityClass::Wormhole => "W",
        };
        f.write_str(value)
    }
}

/// Region, constellation and security data for a system, where known.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemMetadata {
    pub constellation_id: Option<i64>,
    pub constellation_name: Option<String>,
    pub region_id: Option<i64>,
    pub region_name: Option<String>,
    pub security_status: Option<f64>,
}

/// A solar system of the static universe.
#[derive(Debug, Clone, PartialEq)]
pub struct SolarSystem {
    pub id: SystemId,
    pub name: String,
    pub metadata: SystemMetadata,
}

impl SolarSystem {
    /// Create a system with only a name and security value.
    pub fn new(id: SystemId, name: impl Into<String>, security_status: Option<f64>) -> Self {
        Self {
            id,
            name: name.into(),
            metadata: SystemMetadata {
                security_status,
                ..SystemMetadata::default()
            },
        }
    }

    /// Classify the system by its security value.
    ///
    /// Wormhole-space ids and systems without a recorded security value are
    /// reported as [`SecurityClass::Wormhole`].
    pub fn security_class(&self) -> SecurityClass {
        if WORMHOLE_SYSTEM_IDS.contains(&self.id) {
            return SecurityClass::Wormhole;
        }
        match self.metadata.security_status {
            None => SecurityClass::Wormhole,
            Some(sec) if sec >= HIGH_SEC_THRESHOLD => SecurityClass::HighSec,
            Some(sec) if sec > 0.0 => SecurityClass::LowSec,
            Some(_) => SecurityClass::NullSec,
        }
    }
}

/// Immutable static universe: every known solar system and the permanent
/// stargates between them.
///
/// Load once per process and share through an [`Arc`]; nothing mutates it
/// after construction.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    systems: HashMap<SystemId, SolarSystem>,
    name_to_id: HashMap<String, SystemId>,
    stargates: Arc<HashMap<SystemId, Vec<SystemId>>>,
}

impl Universe {
    /// Build a universe from in-memory systems and stargate pairs.
    ///
    /// Gates are treated as bidirectional. Pairs referencing unknown systems
    /// or looping back onto the same system are skipped.
    pub fn from_parts(
        systems: impl IntoIterator<Item = SolarSystem>,
        stargates: impl IntoIterator<Item = (SystemId, SystemId)>,
    ) -> Self {
        let systems: HashMap<SystemId, SolarSystem> = systems
            .into_iter()
            .map(|system| (system.id, system))
            .collect();

        let mut adjacency: HashMap<SystemId, Vec<SystemId>> = HashMap::new();
        let mut skipped_edges = 0usize;
        for (from, to) in stargates {
            if from == to || !systems.contains_key(&from) || !systems.contains_key(&to) {
                skipped_edges += 1;
                continue;
            }
            adjacency.entry(from).or_default().push(to);
            adjacency.entry(to).or_default().push(from);
        }

        for neighbours in adjacency.values_mut() {
            neighbours.sort_unstable();
            neighbours.dedup();
        }

        if skipped_edges > 0 {
            warn!(skipped_edges, "ignored stargate edges referencing unknown systems");
        }

        let name_to_id = systems
            .values()
            .map(|system| (system.name.clone(), system.id))
            .collect();

        Self {
            systems,
            name_to_id,
            stargates: Arc::new(adjacency),
        }
    }

    /// Number of systems in the universe.
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn system(&self, id: SystemId) -> Option<&SolarSystem> {
        self.systems.get(&id)
    }

    pub fn contains(&self, id: SystemId) -> bool {
        self.systems.contains_key(&id)
    }

    /// Iterate over every system in the universe.
    pub fn systems(&self) -> impl Iterator<Item = &SolarSystem> {
        self.systems.values()
    }

    /// Systems reachable from `id` through a single stargate, sorted by id.
    pub fn stargates(&self, id: SystemId) -> &[SystemId] {
        self.stargates
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Exact, case-sensitive name lookup.
    pub fn system_id_by_name(&self, name: &str) -> Option<SystemId> {
        self.name_to_id.get(name).copied()
    }

    pub fn system_name(&self, id: SystemId) -> Option<&str> {
        self.systems.get(&id).map(|system| system.name.as_str())
    }

    /// Return up to `limit` system names resembling `query`, best match first.
    pub fn fuzzy_system_matches(&self, query: &str, limit: usize) -> Vec<String> {
        let needle = query.to_lowercase();
        let mut scored: Vec<(f64, &str)> = self
            .name_to_id
            .keys()
            .map(|name| (strsim::jaro_winkler(&needle, &name.to_lowercase()), name.as_str()))
            .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, name)| name.to_string())
            .collect()
    }

    /// Resolve a user-supplied reference that is either a numeric id or a
    /// system name.
    pub fn resolve(&self, reference: &str) -> Result<SystemId> {
        if let Ok(id) = reference.trim().parse::<SystemId>() {
            return if self.contains(id) {
                Ok(id)
            } else {
                Err(Error::UnknownSolarsystem { system_id: id })
            };
        }

        self.system_id_by_name(reference)
            .ok_or_else(|| Error::UnknownSystemName {
                name: reference.to_string(),
                suggestions: self.fuzzy_system_matches(reference, 3),
            })
    }
}

/// Table and column names of one supported universe database layout.
struct Layout {
    name: &'static str,
    systems: &'static str,
    system_id: &'static str,
    system_name: &'static str,
    security: &'static str,
    jumps: &'static str,
    jump_from: &'static str,
    jump_to: &'static str,
    lookups: &'static [Lookup],
}

/// Optional name table joined onto the systems table.
struct Lookup {
    alias: &'static str,
    foreign_key: &'static str,
    table: &'static str,
    key: &'static str,
    label: &'static str,
}

/// Known layouts, most specific first.
static LAYOUTS: [Layout; 2] = [
    Layout {
        name: "static_data",
        systems: "SolarSystems",
        system_id: "solarSystemId",
        system_name: "name",
        security: "security",
        jumps: "Jumps",
        jump_from: "fromSystemId",
        jump_to: "toSystemId",
        lookups: &[
            Lookup {
                alias: "constellation",
                foreign_key: "constellationID",
                table: "Constellations",
                key: "constellationID",
                label: "constellationName",
            },
            Lookup {
                alias: "region",
                foreign_key: "regionID",
                table: "Regions",
                key: "regionID",
                label: "regionName",
            },
        ],
    },
    Layout {
        name: "legacy_map",
        systems: "mapSolarSystems",
        system_id: "solarSystemID",
        system_name: "solarSystemName",
        security: "security",
        jumps: "mapSolarSystemJumps",
        jump_from: "fromSolarSystemID",
        jump_to: "toSolarSystemID",
        lookups: &[
            Lookup {
                alias: "constellation",
                foreign_key: "constellationID",
                table: "mapConstellations",
                key: "constellationID",
                label: "constellationName",
            },
            Lookup {
                alias: "region",
                foreign_key: "regionID",
                table: "mapRegions",
                key: "regionID",
                label: "regionName",
            },
        ],
    },
];

/// A layout matched against an open database, with the optional columns
/// that are actually present.
struct Detected {
    layout: &'static Layout,
    lookups: Vec<&'static Lookup>,
    has_security: bool,
}

impl Layout {
    fn detect(&'static self, connection: &Connection) -> Result<Option<Detected>> {
        let Some(system_columns) = columns_of(connection, self.systems)? else {
            return Ok(None);
        };
        let Some(jump_columns) = columns_of(connection, self.jumps)? else {
            return Ok(None);
        };
        if !has_all(&system_columns, &[self.system_id, self.system_name])
            || !has_all(&jump_columns, &[self.jump_from, self.jump_to])
        {
            return Ok(None);
        }

        let mut lookups = Vec::new();
        for lookup in self.lookups {
            if !has_all(&system_columns, &[lookup.foreign_key]) {
                continue;
            }
            if let Some(lookup_columns) = columns_of(connection, lookup.table)? {
                if has_all(&lookup_columns, &[lookup.key, lookup.label]) {
                    lookups.push(lookup);
                }
            }
        }

        Ok(Some(Detected {
            layout: self,
            lookups,
            has_security: has_all(&system_columns, &[self.security]),
        }))
    }
}

impl Detected {
    /// Select id, name, constellation id/name, region id/name and security,
    /// in that order, with NULL standing in for absent columns.
    fn systems_query(&self) -> String {
        let layout = self.layout;
        let mut select = vec![
            format!("s.{}", layout.system_id),
            format!("s.{}", layout.system_name),
        ];
        let mut joins = String::new();

        for alias in ["constellation", "region"] {
            match self.lookups.iter().find(|lookup| lookup.alias == alias) {
                Some(lookup) => {
                    select.push(format!("s.{}", lookup.foreign_key));
                    select.push(format!("{alias}.{}", lookup.label));
                    let _ = write!(
                        joins,
                        " LEFT JOIN {table} {alias} ON {alias}.{key} = s.{fk}",
                        table = lookup.table,
                        key = lookup.key,
                        fk = lookup.foreign_key
                    );
                }
                None => select.extend(["NULL".to_string(), "NULL".to_string()]),
            }
        }

        select.push(if self.has_security {
            format!("s.{}", layout.security)
        } else {
            "NULL".to_string()
        });

        format!(
            "SELECT {} FROM {} s{joins}",
            select.join(", "),
            layout.systems
        )
    }

    fn jumps_query(&self) -> String {
        let layout = self.layout;
        format!(
            "SELECT {}, {} FROM {}",
            layout.jump_from, layout.jump_to, layout.jumps
        )
    }
}

/// Load the static universe (systems and stargates) from a SQLite database.
///
/// The database is opened read-only and its layout detected at runtime, so
/// both the `SolarSystems`/`Jumps` tables and the legacy
/// `mapSolarSystems`/`mapSolarSystemJumps` tables are accepted. Region,
/// constellation and security columns are used when present. Jump rows
/// referencing unknown systems are dropped with a warning. A missing file is
/// reported as [`Error::Io`].
pub fn load_universe(db_path: &Path) -> Result<Universe> {
    // Read-only opens of a missing file fail with an opaque SQLite code.
    std::fs::metadata(db_path)?;
    let connection = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let detected = detect_layout(&connection)?;
    debug!(
        layout = detected.layout.name,
        lookups = detected.lookups.len(),
        security = detected.has_security,
        path = %db_path.display(),
        "universe layout detected"
    );

    let systems = connection
        .prepare(&detected.systems_query())?
        .query_map([], system_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let gates = connection
        .prepare(&detected.jumps_query())?
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<(SystemId, SystemId)>>>()?;

    let universe = Universe::from_parts(systems, gates);
    info!(
        systems = universe.len(),
        path = %db_path.display(),
        "static universe loaded"
    );
    Ok(universe)
}

fn detect_layout(connection: &Connection) -> Result<Detected> {
    for layout in &LAYOUTS {
        if let Some(detected) = layout.detect(connection)? {
            return Ok(detected);
        }
    }
    Err(Error::UnsupportedSchema)
}

fn system_from_row(row: &Row<'_>) -> rusqlite::Result<SolarSystem> {
    let metadata = SystemMetadata {
        constellation_id: row.get(2)?,
        constellation_name: row.get(3)?,
        region_id: row.get(4)?,
        region_name: row.get(5)?,
        security_status: row.get(6)?,
    };
    Ok(SolarSystem {
        id: row.get(0)?,
        name: row.get(1)?,
        metadata,
    })
}

/// Lower-cased column names of `table`, or `None` when it does not exist.
fn columns_of(connection: &Connection, table: &str) -> Result<Option<HashSet<String>>> {
    let mut stmt = connection.prepare(&format!("PRAGMA table_info('{table}')"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .map(|name| name.map(|name| name.to_ascii_lowercase()))
        .collect::<rusqlite::Result<HashSet<String>>>()?;
    Ok((!names.is_empty()).then_some(names))
}

fn has_all(columns: &HashSet<String>, wanted: &[&str]) -> bool {
    wanted
        .iter()
        .all(|column| columns.contains(&column.to_ascii_lowercase()))
}
