use thiserror::Error;

use crate::topology::{ConnectionId, MapId};
use crate::universe::SystemId;

/// Convenient result alias for the wayfinder library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
///
/// "No route" is not an error: searches return `Ok(None)` when the source and
/// target are disconnected after eligibility filtering.
#[derive(Debug, Error)]
pub enum Error {
    /// Raised when a map id does not reference an existing map topology.
    #[error("unknown map {map_id}")]
    UnknownMap { map_id: MapId },

    /// Raised when a solar system id is not part of the static universe or the
    /// assembled routing graph.
    #[error("unknown solar system {system_id}")]
    UnknownSolarsystem { system_id: SystemId },

    /// Raised when a system name could not be resolved.
    #[error("unknown system name: {name}{}", format_suggestions(.suggestions))]
    UnknownSystemName {
        name: String,
        suggestions: Vec<String>,
    },

    /// Raised when a map with the given id already exists.
    #[error("map {map_id} already exists")]
    MapExists { map_id: MapId },

    /// Raised when a connection id is not present on the map.
    #[error("unknown connection {connection_id} on map {map_id}")]
    UnknownConnection {
        map_id: MapId,
        connection_id: ConnectionId,
    },

    /// Raised when a connection between the same pair and kind already exists.
    #[error("duplicate {kind} connection between {source_id} and {target_id} on map {map_id}")]
    DuplicateConnection {
        map_id: MapId,
        source_id: SystemId,
        target_id: SystemId,
        kind: String,
    },

    /// Raised when a connection violates a topology invariant.
    #[error("invalid connection: {reason}")]
    InvalidConnection { reason: String },

    /// Raised when a routing configuration cannot produce finite costs.
    #[error("invalid routing configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// Raised when a cache shared with other writers holds an answer of the
    /// wrong kind for a query. Keys cover the query kind, so only a cache
    /// populated outside [`crate::Wayfinder`] can produce this.
    #[error("route cache for map {map_id} returned an answer of the wrong kind")]
    MismatchedOutcome { map_id: MapId },

    /// Raised when a single-flight leader panicked before publishing a result.
    /// The cache recovers from this internally by computing directly.
    #[error("route cache coordination failed for map {map_id}")]
    CacheCoordinationFailure { map_id: MapId },

    /// Raised when attempting to load a schema that is not supported.
    #[error("unsupported universe schema; expected SolarSystems/Jumps or mapSolarSystems tables")]
    UnsupportedSchema,

    /// Wrapper for SQLite errors.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapper for JSON (de)serialization errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else if suggestions.len() == 1 {
        format!(". Did you mean '{}'?", suggestions[0])
    } else {
        format!(
            ". Did you mean one of: {}?",
            suggestions
                .iter()
                .map(|s| format!("'{}'", s))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}
