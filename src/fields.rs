//! Enumerations used to filter and order the generated task catalogue.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which generated tasks a listing should include.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    /// System tasks plus every organisation's tasks.
    #[default]
    All,
    /// Only system-owned tasks.
    System,
    /// Tasks owned by `--org`, plus public tasks of other organisations.
    Organization,
}

/// Available sorting options for task listings (applied before grouping).
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum SortKey {
    Code,
    Name,
    Created,
}
