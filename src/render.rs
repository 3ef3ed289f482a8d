//! Description rendering.
//!
//! A description is the category name followed by one fragment per resolved
//! parameter, each fragment being the parameter's expression template with the
//! option label substituted for `{value}`. Output always ends in a single
//! period and is never empty.

use crate::catalog::{CatalogLookup, OptionLookup, Parameter, VALUE_PLACEHOLDER};
use crate::resolver::{resolve, ResolvedParam};
use crate::task::GeneratedTask;

/// Label used when there is neither a base name nor any resolved parameter.
pub const DEFAULT_TASK_LABEL: &str = "Tarea";

/// Substitute `value` into `template`. A blank template renders the bare value.
pub fn expand_template(template: &str, value: &str) -> String {
    if template.trim().is_empty() {
        return value.trim().to_string();
    }
    template.replace(VALUE_PLACEHOLDER, value).trim().to_string()
}

/// Render the canonical description for `base_name` and a resolved chain.
pub fn render(base_name: &str, resolved: &[ResolvedParam]) -> String {
    let fragments: Vec<String> = resolved
        .iter()
        .map(|r| expand_template(&r.expression_template, &r.option_label))
        .filter(|f| !f.is_empty())
        .collect();

    let mut out = format!("{} {}", base_name.trim(), fragments.join(" "))
        .trim()
        .to_string();
    if out.is_empty() {
        out.push_str(DEFAULT_TASK_LABEL);
    }
    if !out.ends_with('.') {
        out.push('.');
    }
    out
}

/// Render a stored task: resolve its values against the parameters of its
/// category and use the category name as the base.
///
/// Without a category name and without any resolved parameter the description
/// is `"{fallback_label} {short_id}."`.
pub fn describe_task<L, C>(
    task: &GeneratedTask,
    parameters: &[Parameter],
    options: &L,
    catalog: &C,
    fallback_label: &str,
) -> String
where
    L: OptionLookup + ?Sized,
    C: CatalogLookup + ?Sized,
{
    let resolved = resolve(&task.values(), parameters, options);
    let base = catalog
        .category(&task.category_id)
        .map(|c| c.name.trim().to_string())
        .filter(|name| !name.is_empty());

    match base {
        Some(name) => render(&name, &resolved),
        None if resolved.is_empty() => render(&format!("{} {}", fallback_label, task.short_id()), &[]),
        None => render("", &resolved),
    }
}

/// Next free `PREFIX-NNN` code given the codes already in use.
///
/// Sequence numbers that cannot be incremented are ignored.
pub fn next_task_code<'a, I>(prefix: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = prefix.trim().to_uppercase();
    let lead = format!("{prefix}-");
    let next = existing
        .into_iter()
        .filter_map(|code| code.strip_prefix(&lead))
        .filter_map(|n| n.parse::<u64>().ok()?.checked_add(1))
        .max()
        .unwrap_or(1);
    format!("{lead}{next:03}")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::catalog::{index_options, Category, CategoryId, Unit, UnitId};
    use crate::resolver::tests::{masonry_options, masonry_parameters};
    use crate::task::ParamValues;
    use uuid::Uuid;

    struct Categories(HashMap<CategoryId, Category>);

    impl CatalogLookup for Categories {
        fn category(&self, id: &CategoryId) -> Option<&Category> {
            self.0.get(id)
        }
        fn unit(&self, _id: &UnitId) -> Option<&Unit> {
            None
        }
    }

    fn masonry_render(values: ParamValues) -> String {
        let options = index_options(&masonry_options());
        let resolved = resolve(&values, &masonry_parameters(), &options);
        render("Mampostería", &resolved)
    }

    fn task(category: &str, values: ParamValues) -> GeneratedTask {
        GeneratedTask {
            id: Uuid::parse_str("3f2a9c1e-0000-4000-8000-000000000000").unwrap(),
            category_id: category.into(),
            param_values: values.to_json(),
            code: None,
            display_name: None,
            is_system: true,
            is_public: true,
            organization_id: None,
            created_by: None,
            created_at_utc: 0,
            updated_at_utc: 0,
        }
    }

    #[test]
    fn test_render_full_chain() {
        let values = ParamValues::new().with("tipo_elemento", "o1").with("tipo_ladrillo", "o2");
        assert_eq!(masonry_render(values), "Mampostería Elemento de pared tipo hueco.");
    }

    #[test]
    fn test_render_child_only() {
        let values = ParamValues::new().with("tipo_ladrillo", "o2");
        assert_eq!(masonry_render(values), "Mampostería tipo hueco.");
    }

    #[test]
    fn test_render_missing_option_falls_back_to_base() {
        let values = ParamValues::new().with("tipo_elemento", "o_missing");
        assert_eq!(masonry_render(values), "Mampostería.");
    }

    #[test]
    fn test_render_is_deterministic() {
        let values = ParamValues::new().with("tipo_elemento", "o1").with("tipo_ladrillo", "o2");
        assert_eq!(masonry_render(values.clone()), masonry_render(values));
    }

    #[test]
    fn test_render_empty_is_never_empty() {
        assert_eq!(render("", &[]), "Tarea.");
        assert_eq!(render("   ", &[]), "Tarea.");
        assert_eq!(render("Revoque", &[]), "Revoque.");
    }

    #[test]
    fn test_render_does_not_double_period() {
        let options = index_options(&masonry_options());
        let mut parameters = masonry_parameters();
        parameters[1].expression_template = "tipo {value}.".to_string();
        let values = ParamValues::new().with("tipo_elemento", "o1").with("tipo_ladrillo", "o2");
        let resolved = resolve(&values, &parameters, &options);
        assert_eq!(render("Mampostería", &resolved), "Mampostería Elemento de pared tipo hueco.");
    }

    #[test]
    fn test_expand_template_variants() {
        assert_eq!(expand_template("de {value}", "pared"), "de pared");
        assert_eq!(expand_template("", "pared"), "pared");
        assert_eq!(expand_template("{value} y {value}", "x"), "x y x");
        assert_eq!(expand_template("  con junta  ", "ignored"), "con junta");
    }

    #[test]
    fn test_describe_task_uses_category_name() {
        let options = index_options(&masonry_options());
        let mut categories = HashMap::new();
        categories.insert(
            CategoryId::new("mamposteria"),
            Category { id: "mamposteria".into(), name: "Mampostería".into(), code: None, unit_id: None },
        );
        let t = task("mamposteria", ParamValues::new().with("tipo_elemento", "o1"));
        let out = describe_task(&t, &masonry_parameters(), &options, &Categories(categories), DEFAULT_TASK_LABEL);
        assert_eq!(out, "Mampostería Elemento de pared.");
    }

    #[test]
    fn test_describe_task_short_id_fallback() {
        let options = index_options(&masonry_options());
        let t = task("unknown", ParamValues::new());
        let out = describe_task(&t, &masonry_parameters(), &options, &Categories(HashMap::new()), DEFAULT_TASK_LABEL);
        assert_eq!(out, "Tarea 3f2a9c1e.");

        let t = task("unknown", ParamValues::new().with("tipo_ladrillo", "o2"));
        let out = describe_task(&t, &masonry_parameters(), &options, &Categories(HashMap::new()), DEFAULT_TASK_LABEL);
        assert_eq!(out, "tipo hueco.");
    }

    #[test]
    fn test_next_task_code() {
        assert_eq!(next_task_code("mam", Vec::<&str>::new()), "MAM-001");
        assert_eq!(next_task_code("MAM", vec!["MAM-001", "MAM-007", "REV-020", "MAM-x"]), "MAM-008");
    }

    #[test]
    fn test_next_task_code_past_u32_range() {
        assert_eq!(next_task_code("MAM", vec!["MAM-4294967295"]), "MAM-4294967296");
        // A sequence that cannot grow further is skipped, not wrapped.
        assert_eq!(next_task_code("MAM", vec!["MAM-18446744073709551615", "MAM-002"]), "MAM-003");
    }
}
