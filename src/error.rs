//! Error types for the catalogue engine and its snapshot store.
//!
//! Data-quality problems (stale option references, empty parameter chains,
//! malformed value maps) are not errors here: the resolver and renderer degrade
//! instead. What remains are lookups the caller asked for explicitly, the
//! currency guard in front of cost aggregation, and store I/O.

use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::{CategoryId, OptionId};

/// A catalogue lookup that found nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("option '{0}' not found")]
    OptionNotFound(OptionId),
    #[error("category '{0}' not found")]
    CategoryNotFound(CategoryId),
    #[error("parameter '{slug}' is not defined for category '{category}'")]
    UnknownParameter { slug: String, category: CategoryId },
    #[error("option '{option}' does not belong to parameter '{slug}'")]
    ForeignOption { slug: String, option: OptionId },
    #[error("{0}")]
    TaskNotFound(String),
    #[error("invalid parameter assignment '{0}', expected slug=option")]
    InvalidAssignment(String),
    #[error("--scope organization requires --org <id>")]
    MissingOrganization,
}

/// Cost aggregation refused to run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CostError {
    #[error("mixed currencies in cost lines: {}", .0.join(", "))]
    MixedCurrencies(Vec<String>),
    #[error("cost of '{0}' is out of range")]
    Overflow(String),
}

/// Snapshot file could not be read or written.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialise snapshot: {0}")]
    Serialise(#[from] serde_json::Error),
}

/// Top-level error surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Cost(#[from] CostError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
