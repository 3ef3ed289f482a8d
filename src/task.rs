//! Generated task data structures.
//!
//! A generated task is a category plus a sparse map from parameter slug to the
//! chosen option. The map is stored as raw JSON because it comes from a loosely
//! typed column; `ParamValues` is the typed view the engine works with.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::catalog::{CategoryId, OptionId, ParameterSlug};
use crate::resolver::ResolvedParam;

/// Typed parameter value map. A missing key and an explicit `None` both mean
/// "not chosen"; empty option ids are normalised to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamValues(BTreeMap<ParameterSlug, Option<OptionId>>);

impl ParamValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or clear, with `None`) the option chosen for `slug`.
    pub fn set(&mut self, slug: ParameterSlug, option: Option<OptionId>) {
        let option = option.filter(|o| !o.as_str().trim().is_empty());
        self.0.insert(slug, option);
    }

    /// Builder form of [`ParamValues::set`].
    pub fn with(mut self, slug: &str, option: &str) -> Self {
        self.set(slug.into(), Some(option.into()));
        self
    }

    /// Chosen option for `slug`, if any.
    pub fn get(&self, slug: &ParameterSlug) -> Option<&OptionId> {
        self.0.get(slug).and_then(|o| o.as_ref())
    }

    /// Drop a slug entirely.
    pub fn remove(&mut self, slug: &ParameterSlug) {
        self.0.remove(slug);
    }

    /// Iterate over slugs that have a chosen option.
    pub fn chosen(&self) -> impl Iterator<Item = (&ParameterSlug, &OptionId)> {
        self.0.iter().filter_map(|(s, o)| o.as_ref().map(|o| (s, o)))
    }

    /// True when no slug has a chosen option.
    pub fn is_empty(&self) -> bool {
        self.chosen().next().is_none()
    }

    /// Parse the stored JSON shape: an object of slug -> option id.
    ///
    /// Option ids may be strings or numbers; `null` and `""` mean unset. A JSON
    /// string holding an encoded object is unwrapped once. Any other shape is
    /// rejected as a whole.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::String(s) if s.trim().is_empty() => Ok(Self::new()),
            Value::String(s) => {
                let inner: Value = serde_json::from_str(s).map_err(|e| format!("invalid JSON: {e}"))?;
                if inner.is_string() {
                    return Err("doubly encoded string".to_string());
                }
                Self::from_json(&inner)
            }
            Value::Object(map) => {
                let mut values = Self::new();
                for (slug, raw) in map {
                    let option = match raw {
                        Value::Null => None,
                        Value::String(s) => Some(OptionId::new(s.trim())),
                        Value::Number(n) => Some(OptionId::new(n.to_string())),
                        other => return Err(format!("unexpected value for '{slug}': {other}")),
                    };
                    values.set(ParameterSlug::new(slug.as_str()), option);
                }
                Ok(values)
            }
            other => Err(format!("expected an object, got {other}")),
        }
    }

    /// Stored JSON form; unset slugs are omitted.
    pub fn to_json(&self) -> Value {
        let map = self
            .chosen()
            .map(|(s, o)| (s.to_string(), Value::String(o.to_string())))
            .collect::<serde_json::Map<_, _>>();
        Value::Object(map)
    }
}

impl FromIterator<(ParameterSlug, OptionId)> for ParamValues {
    fn from_iter<I: IntoIterator<Item = (ParameterSlug, OptionId)>>(iter: I) -> Self {
        let mut values = Self::new();
        for (slug, option) in iter {
            values.set(slug, Some(option));
        }
        values
    }
}

/// A task generated from a category and a set of parameter values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedTask {
    pub id: Uuid,
    pub category_id: CategoryId,
    #[serde(default)]
    pub param_values: Value,
    #[serde(default)]
    pub code: Option<String>,
    /// Cached render output; recomputed whenever `param_values` changes.
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at_utc: i64,
    pub updated_at_utc: i64,
}

impl GeneratedTask {
    /// Typed parameter values. A malformed stored map yields an empty one so a
    /// single bad row never breaks a listing.
    pub fn values(&self) -> ParamValues {
        match ParamValues::from_json(&self.param_values) {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(task = %self.id, error = %e, "malformed param_values, treating as empty");
                ParamValues::new()
            }
        }
    }

    /// First eight hex digits of the id.
    pub fn short_id(&self) -> String {
        short_id(&self.id)
    }
}

/// First eight hex digits of a task id.
pub fn short_id(id: &Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

/// Everything a browsing view needs about one task.
#[derive(Debug, Clone)]
pub struct GeneratedTaskView {
    pub id: Uuid,
    pub code: Option<String>,
    pub display_name: String,
    pub unit: Option<String>,
    pub category_name: Option<String>,
    pub resolved: Vec<ResolvedParam>,
}

impl GeneratedTaskView {
    /// Option label of the lowest-position resolved parameter.
    pub fn branch_label(&self) -> Option<&str> {
        self.resolved.first().map(|r| r.option_label.as_str())
    }
}
