use thiserror::Error;

use crate::zone::GridPos;

pub type ZoneResult<T> = Result<T, ZoneError>;

/// Failures surfaced by the generator and the instance manager.
///
/// Not-found and invalid-transition variants are ordinary player-facing
/// outcomes; their `Display` text is meant to be shown as-is.
#[derive(Error, Debug)]
pub enum ZoneError {
    #[error("Zone template '{0}' not found")]
    TemplateNotFound(String),

    #[error("Zone instance '{0}' not found")]
    InstanceNotFound(String),

    #[error("No cell at position {0}")]
    CellNotFound(GridPos),

    #[error("Cell at {0} is blocked")]
    CellBlocked(GridPos),

    #[error("No monster pack at position {0}")]
    NoMonsterPack(GridPos),

    #[error("Waypoint in '{0}' has not been unlocked")]
    WaypointLocked(String),

    #[error("Invalid zone template: {0}")]
    InvalidTemplate(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
