//! # parametric_tasks
//!
//! Parametric task naming engine for a construction task catalogue.
//!
//! A generated task is a category (e.g. "Mampostería") plus a sparse map of
//! parameter slug to chosen option. The engine is a fixed three-stage pipeline:
//!
//! 1. **resolve** ([`resolver::resolve`]) the value map against the parameter
//!    catalogue into a chain ordered by parameter position, dropping stale
//!    option references;
//! 2. **expand** each link through its parameter's expression template
//!    ([`render::expand_template`]);
//! 3. **join** the fragments behind the category name into the canonical
//!    description ([`render::render`]).
//!
//! The same resolved chain drives branch grouping for browsing
//! ([`branch::group_by_branch`]), and a task's identity drives its unit cost
//! rollup ([`cost::unit_cost`]). Everything here is pure and synchronous over
//! an in-memory snapshot; the [`db::Database`] snapshot store stands in for
//! the relational store the catalogue lives in.
//!
//! ```
//! use parametric_tasks::catalog::{index_options, Parameter, ParameterOption};
//! use parametric_tasks::render::render;
//! use parametric_tasks::resolver::resolve;
//! use parametric_tasks::task::ParamValues;
//!
//! let parameters = vec![Parameter {
//!     id: "p1".into(),
//!     slug: "tipo_elemento".into(),
//!     label: "Tipo de elemento".into(),
//!     position: 0,
//!     expression_template: "Elemento de {value}".into(),
//!     category_id: None,
//! }];
//! let options = index_options(&[ParameterOption {
//!     id: "o1".into(),
//!     parameter_id: "p1".into(),
//!     label: "pared".into(),
//!     category_id: None,
//!     unit_id: None,
//! }]);
//! let values = ParamValues::new().with("tipo_elemento", "o1");
//! let chain = resolve(&values, &parameters, &options);
//! assert_eq!(render("Mampostería", &chain), "Mampostería Elemento de pared.");
//! ```

pub mod branch;
pub mod catalog;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod cost;
pub mod db;
pub mod error;
pub mod fields;
pub mod render;
pub mod resolver;
pub mod task;
pub mod tui {
    pub mod app;
    pub mod colors;
    pub mod run;
    pub mod utils;
}

pub use error::{Error, Result};
