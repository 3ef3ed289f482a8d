//! Parameter catalogue definitions.
//!
//! The catalogue is owned by the external store; the engine only ever reads it.
//! Parameters carry an ordinal position and an expression template, options
//! carry the human label that ends up in a rendered task description.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Placeholder substituted with the chosen option's label.
pub const VALUE_PLACEHOLDER: &str = "{value}";

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Stable key of a parameter, used as the key of a task's value map.
    ParameterSlug
);
id_type!(ParameterId);
id_type!(OptionId);
id_type!(CategoryId);
id_type!(UnitId);

/// A task template / category. Its name is the base of every description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// Short prefix for generated task codes, e.g. `MAM`.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub unit_id: Option<UnitId>,
}

/// A unit of measure (m2, m3, kg, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    #[serde(default)]
    pub symbol: Option<String>,
}

impl Unit {
    /// Symbol if set, otherwise the name.
    pub fn short(&self) -> &str {
        self.symbol.as_deref().unwrap_or(&self.name)
    }
}

/// A parameter definition, e.g. "tipo de ladrillo".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub id: ParameterId,
    pub slug: ParameterSlug,
    pub label: String,
    /// Resolution and render order within a category.
    pub position: i32,
    #[serde(default = "default_template")]
    pub expression_template: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

fn default_template() -> String {
    VALUE_PLACEHOLDER.to_string()
}

/// One allowed value of a parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterOption {
    pub id: OptionId,
    pub parameter_id: ParameterId,
    pub label: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub unit_id: Option<UnitId>,
}

/// Option lookup by id. A miss is a `CatalogError::OptionNotFound`, which the
/// resolver filters out rather than propagating.
pub trait OptionLookup {
    fn option(&self, id: &OptionId) -> Result<&ParameterOption, CatalogError>;
}

impl OptionLookup for HashMap<OptionId, ParameterOption> {
    fn option(&self, id: &OptionId) -> Result<&ParameterOption, CatalogError> {
        self.get(id).ok_or_else(|| CatalogError::OptionNotFound(id.clone()))
    }
}

impl OptionLookup for BTreeMap<OptionId, ParameterOption> {
    fn option(&self, id: &OptionId) -> Result<&ParameterOption, CatalogError> {
        self.get(id).ok_or_else(|| CatalogError::OptionNotFound(id.clone()))
    }
}

impl OptionLookup for [ParameterOption] {
    fn option(&self, id: &OptionId) -> Result<&ParameterOption, CatalogError> {
        self.iter()
            .find(|o| &o.id == id)
            .ok_or_else(|| CatalogError::OptionNotFound(id.clone()))
    }
}

/// Category and unit lookups for the foreign keys hanging off options and tasks.
pub trait CatalogLookup {
    fn category(&self, id: &CategoryId) -> Option<&Category>;
    fn unit(&self, id: &UnitId) -> Option<&Unit>;
}

/// Index options by id.
pub fn index_options(options: &[ParameterOption]) -> HashMap<OptionId, ParameterOption> {
    options.iter().map(|o| (o.id.clone(), o.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: &str, label: &str) -> ParameterOption {
        ParameterOption {
            id: id.into(),
            parameter_id: "p1".into(),
            label: label.to_string(),
            category_id: None,
            unit_id: None,
        }
    }

    #[test]
    fn test_option_lookup_miss_is_not_found() {
        let options = index_options(&[option("o1", "pared")]);
        assert_eq!(options.option(&"o1".into()).map(|o| o.label.as_str()), Ok("pared"));
        assert_eq!(
            options.option(&"nope".into()).map(|o| o.label.clone()),
            Err(CatalogError::OptionNotFound("nope".into()))
        );
    }

    #[test]
    fn test_slice_lookup_matches_map_lookup() {
        let list = vec![option("o1", "pared"), option("o2", "hueco")];
        assert_eq!(list.as_slice().option(&"o2".into()).map(|o| o.label.as_str()), Ok("hueco"));
        assert!(list.as_slice().option(&"o3".into()).is_err());
    }

    #[test]
    fn test_parameter_template_defaults_to_placeholder() {
        let p: Parameter = serde_json::from_str(
            r#"{"id":"p1","slug":"tipo","label":"Tipo","position":0}"#,
        )
        .unwrap();
        assert_eq!(p.expression_template, VALUE_PLACEHOLDER);
        assert!(p.category_id.is_none());
    }

    #[test]
    fn test_ids_convert_from_owned_and_borrowed() {
        let owned: ParameterId = format!("p_{}", "tipo").into();
        let borrowed: ParameterId = "p_tipo".into();
        assert_eq!(owned, borrowed);
        assert_eq!(format!("[{:<8}]", owned), "[p_tipo  ]");
    }

    #[test]
    fn test_unit_short_prefers_symbol() {
        let unit = Unit { id: "u1".into(), name: "metro cuadrado".into(), symbol: Some("m2".into()) };
        assert_eq!(unit.short(), "m2");
        let bare = Unit { id: "u2".into(), name: "unidad".into(), symbol: None };
        assert_eq!(bare.short(), "unidad");
    }
}
