//! Subcommand handlers.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use tracing::{debug, info};
use wayfinder_lib::{
    load_universe, InMemoryTopologyStore, LifetimeStatus, MapId, MapTopology, MassStatus,
    RoutePreference, RoutingConfiguration, SystemId, Universe, Wayfinder,
};

use crate::output::{render_closest, render_route, OutputFormat};

/// Map id used when no map file is given.
pub const WHOLE_UNIVERSE_MAP: MapId = 0;

/// Where the universe and the map come from.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Path to the SQLite universe database.
    #[arg(long, env = "WAYFINDER_DATABASE")]
    pub database: PathBuf,

    /// JSON map file with placed systems and connections. Without it every
    /// system is placed and only stargates exist.
    #[arg(long)]
    pub map: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PreferenceArg {
    #[default]
    Shortest,
    Secure,
    Insecure,
}

impl From<PreferenceArg> for RoutePreference {
    fn from(value: PreferenceArg) -> Self {
        match value {
            PreferenceArg::Shortest => RoutePreference::Shortest,
            PreferenceArg::Secure => RoutePreference::Secure,
            PreferenceArg::Insecure => RoutePreference::Insecure,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MassArg {
    Fresh,
    Reduced,
    Critical,
}

impl From<MassArg> for MassStatus {
    fn from(value: MassArg) -> Self {
        match value {
            MassArg::Fresh => MassStatus::Fresh,
            MassArg::Reduced => MassStatus::Reduced,
            MassArg::Critical => MassStatus::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LifetimeArg {
    Stable,
    Decaying,
    Critical,
}

impl From<LifetimeArg> for LifetimeStatus {
    fn from(value: LifetimeArg) -> Self {
        match value {
            LifetimeArg::Stable => LifetimeStatus::Stable,
            LifetimeArg::Decaying => LifetimeStatus::Decaying,
            LifetimeArg::Critical => LifetimeStatus::Critical,
        }
    }
}

/// Routing options shared by `route` and `closest`.
#[derive(Debug, Clone, Args)]
pub struct RoutingArgs {
    /// What the search optimizes for.
    #[arg(long, value_enum, default_value_t)]
    pub preference: PreferenceArg,

    /// Weight of the security penalty for secure/insecure routing.
    #[arg(long, default_value_t = 1.0)]
    pub security_penalty: f64,

    /// Worst wormhole mass status still traversed.
    #[arg(long, value_enum)]
    pub max_mass: Option<MassArg>,

    /// Worst wormhole lifetime status still traversed.
    #[arg(long, value_enum)]
    pub max_lifetime: Option<LifetimeArg>,

    #[arg(long)]
    pub no_stargates: bool,

    #[arg(long)]
    pub no_wormholes: bool,

    /// Ignore connections reported by EveScout.
    #[arg(long)]
    pub no_evescout: bool,

    /// Systems (names or ids) the route must not pass through.
    #[arg(long, value_delimiter = ',')]
    pub avoid: Vec<String>,

    /// Discard routes longer than this many jumps.
    #[arg(long)]
    pub max_jumps: Option<usize>,
}

impl RoutingArgs {
    /// Build the library configuration, resolving avoided system names.
    pub fn to_configuration(&self, universe: &Universe) -> Result<RoutingConfiguration> {
        let avoided = self
            .avoid
            .iter()
            .map(|reference| universe.resolve(reference))
            .collect::<wayfinder_lib::Result<Vec<SystemId>>>()?;

        let mut configuration = RoutingConfiguration::default()
            .with_preference(self.preference.into())
            .with_security_penalty(self.security_penalty)
            .with_evescout(!self.no_evescout)
            .avoiding(avoided);
        if let Some(mass) = self.max_mass {
            configuration = configuration.with_max_mass(mass.into());
        }
        if let Some(lifetime) = self.max_lifetime {
            configuration = configuration.with_max_lifetime(lifetime.into());
        }
        if let Some(limit) = self.max_jumps {
            configuration = configuration.with_max_jumps(limit);
        }
        configuration.use_stargates = !self.no_stargates;
        configuration.use_wormholes = !self.no_wormholes;
        configuration.validate()?;
        Ok(configuration)
    }
}

/// Loaded universe plus a wayfinder over the requested map.
pub struct Session {
    pub universe: Arc<Universe>,
    pub wayfinder: Wayfinder,
    pub map_id: MapId,
}

impl Session {
    pub fn open(source: &SourceArgs) -> Result<Self> {
        let universe = load_universe(&source.database).with_context(|| {
            format!(
                "failed to load universe from {}",
                source.database.display()
            )
        })?;
        let universe = Arc::new(universe);

        let topology = match &source.map {
            Some(path) => read_map(path)?,
            None => {
                let mut topology = MapTopology::new(WHOLE_UNIVERSE_MAP);
                topology.systems = universe.systems().map(|system| system.id).collect();
                topology
            }
        };
        let map_id = topology.map_id;
        debug!(
            map_id,
            systems = topology.systems.len(),
            connections = topology.connections.len(),
            "map loaded"
        );

        let store = Arc::new(InMemoryTopologyStore::new(Arc::clone(&universe)));
        store
            .insert_map(topology)
            .with_context(|| format!("map {map_id} is not consistent with the universe"))?;
        let wayfinder = Wayfinder::new(Arc::clone(&universe), store);

        Ok(Self {
            universe,
            wayfinder,
            map_id,
        })
    }
}

fn read_map(path: &Path) -> Result<MapTopology> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read map file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse map file {}", path.display()))
}

/// Handle the `route` subcommand.
pub fn handle_route(
    source: &SourceArgs,
    routing: &RoutingArgs,
    from: &str,
    to: &str,
    format: OutputFormat,
) -> Result<()> {
    let session = Session::open(source)?;
    let universe = &session.universe;
    let start = universe.resolve(from)?;
    let goal = universe.resolve(to)?;
    let configuration = routing.to_configuration(universe)?;

    info!(map_id = session.map_id, start, goal, "planning route");
    let Some(route) = session
        .wayfinder
        .route(session.map_id, start, goal, &configuration)?
    else {
        bail!("No route found between {from} and {to}.");
    };

    println!("{}", render_route(universe, &route, format)?.trim_end());
    Ok(())
}

/// Handle the `closest` subcommand.
pub fn handle_closest(
    source: &SourceArgs,
    routing: &RoutingArgs,
    from: &str,
    candidates: &[String],
    format: OutputFormat,
) -> Result<()> {
    let session = Session::open(source)?;
    let universe = &session.universe;
    let start = universe.resolve(from)?;
    let candidate_ids = candidates
        .iter()
        .map(|reference| universe.resolve(reference))
        .collect::<wayfinder_lib::Result<Vec<SystemId>>>()?;
    let configuration = routing.to_configuration(universe)?;

    info!(
        map_id = session.map_id,
        start,
        candidates = candidate_ids.len(),
        "searching closest system"
    );
    let Some(closest) =
        session
            .wayfinder
            .closest(session.map_id, start, candidate_ids, &configuration)?
    else {
        bail!("None of the candidate systems is reachable from {from}.");
    };

    println!("{}", render_closest(universe, &closest, format)?.trim_end());
    Ok(())
}
