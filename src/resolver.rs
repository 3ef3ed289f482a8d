//! Value resolution: turn a task's slug -> option map into an ordered chain of
//! labelled parameters.
//!
//! Order is governed solely by each parameter's `position`. A chosen option
//! that no longer exists is dropped from the chain; the rest still resolve.

use serde::Serialize;

use crate::catalog::{CategoryId, OptionId, OptionLookup, Parameter, ParameterOption, ParameterSlug, UnitId};
use crate::error::CatalogError;
use crate::task::ParamValues;

/// One resolved link of a parameter chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedParam {
    pub slug: ParameterSlug,
    /// Parameter label, e.g. "Tipo de ladrillo".
    pub label: String,
    /// Chosen option label, e.g. "hueco".
    pub option_label: String,
    pub position: i32,
    pub expression_template: String,
    pub option_id: OptionId,
    pub category_id: Option<CategoryId>,
    pub unit_id: Option<UnitId>,
}

impl ResolvedParam {
    fn new(parameter: &Parameter, option: &ParameterOption) -> Self {
        ResolvedParam {
            slug: parameter.slug.clone(),
            label: parameter.label.clone(),
            option_label: option.label.clone(),
            position: parameter.position,
            expression_template: parameter.expression_template.clone(),
            option_id: option.id.clone(),
            category_id: option.category_id.clone(),
            unit_id: option.unit_id.clone(),
        }
    }
}

/// Resolve `values` against the catalogue, ordered by parameter position.
pub fn resolve<L>(values: &ParamValues, parameters: &[Parameter], options: &L) -> Vec<ResolvedParam>
where
    L: OptionLookup + ?Sized,
{
    let mut chosen: Vec<(&Parameter, &OptionId)> = parameters
        .iter()
        .filter_map(|p| values.get(&p.slug).map(|o| (p, o)))
        .collect();
    chosen.sort_by(|(a, _), (b, _)| a.position.cmp(&b.position).then_with(|| a.slug.cmp(&b.slug)));

    chosen
        .into_iter()
        .map(|(parameter, option_id)| lookup(parameter, option_id, options))
        .filter_map(|found| match found {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unresolved parameter");
                None
            }
        })
        .collect()
}

fn lookup<L>(parameter: &Parameter, option_id: &OptionId, options: &L) -> Result<ResolvedParam, CatalogError>
where
    L: OptionLookup + ?Sized,
{
    options.option(option_id).map(|option| ResolvedParam::new(parameter, option))
}

/// Slugs set in `values` that no parameter in `parameters` declares.
pub fn unknown_slugs<'a>(values: &'a ParamValues, parameters: &[Parameter]) -> Vec<&'a ParameterSlug> {
    values
        .chosen()
        .map(|(slug, _)| slug)
        .filter(|slug| !parameters.iter().any(|p| &p.slug == *slug))
        .collect()
}
