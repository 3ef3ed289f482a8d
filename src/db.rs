//! Snapshot store for the parameter catalogue and generated tasks.
//!
//! This module provides the `Database` struct, an in-memory snapshot of
//! everything the engine reads: categories, units, parameters, options,
//! generated tasks and the priced line items behind cost rollups. It also
//! hosts the task-level operations that join those tables.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{
    CatalogLookup, Category, CategoryId, OptionId, OptionLookup, Parameter, ParameterOption, ParameterSlug, Unit,
    UnitId,
};
use crate::config::Settings;
use crate::cost::{priced_cost, LaborLine, LaborRate, Material, MaterialLine, PricedLine, TaskCost};
use crate::error::{CatalogError, CostError, StoreError};
use crate::fields::Scope;
use crate::render::{describe_task, next_task_code};
use crate::resolver::resolve;
use crate::task::{GeneratedTask, GeneratedTaskView, ParamValues};

/// In-memory snapshot of the catalogue store.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub units: Vec<Unit>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub options: Vec<ParameterOption>,
    #[serde(default)]
    pub tasks: Vec<GeneratedTask>,
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default)]
    pub labor_rates: Vec<LaborRate>,
    #[serde(default)]
    pub material_lines: Vec<MaterialLine>,
    #[serde(default)]
    pub labor_lines: Vec<LaborLine>,
}

impl Database {
    /// Load the snapshot, or an empty database if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no snapshot yet, starting empty");
            return Ok(Database::default());
        }
        let buf = fs::read_to_string(path).map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;
        let db: Database =
            serde_json::from_str(&buf).map_err(|source| StoreError::Parse { path: path.to_path_buf(), source })?;
        tracing::debug!(
            path = %path.display(),
            parameters = db.parameters.len(),
            options = db.options.len(),
            tasks = db.tasks.len(),
            "snapshot loaded"
        );
        Ok(db)
    }

    /// Save the snapshot using atomic write (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(self)?;
        let io = |source| StoreError::Io { path: tmp.clone(), source };
        let mut f = File::create(&tmp).map_err(io)?;
        f.write_all(data.as_bytes()).map_err(io)?;
        f.flush().map_err(io)?;
        fs::rename(&tmp, path).map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;
        tracing::debug!(path = %path.display(), tasks = self.tasks.len(), "snapshot saved");
        Ok(())
    }

    /// Parameters applying to `category`: those scoped to it plus unscoped ones.
    pub fn parameters_for(&self, category: &CategoryId) -> Vec<Parameter> {
        self.parameters
            .iter()
            .filter(|p| p.category_id.as_ref().map_or(true, |c| c == category))
            .cloned()
            .collect()
    }

    /// Options of one parameter, in catalogue order.
    pub fn options_of(&self, parameter: &Parameter) -> Vec<&ParameterOption> {
        self.options.iter().filter(|o| o.parameter_id == parameter.id).collect()
    }

    /// Index options by id.
    pub fn options_index(&self) -> HashMap<OptionId, ParameterOption> {
        crate::catalog::index_options(&self.options)
    }

    /// Get a task by id.
    pub fn get(&self, id: Uuid) -> Option<&GeneratedTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Get a mutable reference to a task by id.
    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut GeneratedTask> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Hard-delete a task together with its material and labor lines.
    pub fn remove_task(&mut self, id: Uuid) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.material_lines.retain(|l| l.task_id != id);
        self.labor_lines.retain(|l| l.task_id != id);
        before != self.tasks.len()
    }

    /// Canonical description of `task` from the current catalogue.
    pub fn describe(&self, task: &GeneratedTask, settings: &Settings) -> String {
        let parameters = self.parameters_for(&task.category_id);
        describe_task(task, &parameters, self.options.as_slice(), self, &settings.fallback_task_label)
    }

    /// Browsing view of a task. The display name is always freshly rendered.
    pub fn task_view(&self, task: &GeneratedTask, settings: &Settings) -> GeneratedTaskView {
        let parameters = self.parameters_for(&task.category_id);
        let resolved = resolve(&task.values(), &parameters, self.options.as_slice());
        let category = self.category(&task.category_id);

        let unit_id = resolved
            .iter()
            .find_map(|r| r.unit_id.clone())
            .or_else(|| category.and_then(|c| c.unit_id.clone()));
        let unit = unit_id.and_then(|u| self.unit(&u)).map(|u| u.short().to_string());

        GeneratedTaskView {
            id: task.id,
            code: task.code.clone(),
            display_name: self.describe(task, settings),
            unit,
            category_name: category.map(|c| c.name.clone()),
            resolved,
        }
    }

    /// Recompute and store `display_name` for the given tasks, or all tasks when
    /// `ids` is `None`. Returns how many names changed.
    pub fn materialize(&mut self, ids: Option<&[Uuid]>, settings: &Settings) -> usize {
        let targets: Vec<(usize, String)> = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| ids.map_or(true, |ids| ids.contains(&t.id)))
            .map(|(i, t)| (i, self.describe(t, settings)))
            .collect();

        let mut changed = 0;
        for (i, name) in targets {
            let task = &mut self.tasks[i];
            if task.display_name.as_deref() != Some(name.as_str()) {
                tracing::debug!(task = %task.id, name = %name, "display name updated");
                task.display_name = Some(name);
                changed += 1;
            }
        }
        changed
    }

    /// Tasks visible under `scope`. `org` is the caller's organisation.
    pub fn visible_tasks(&self, scope: Scope, org: Option<&str>) -> Vec<&GeneratedTask> {
        self.tasks
            .iter()
            .filter(|t| match scope {
                Scope::All => true,
                Scope::System => t.is_system,
                Scope::Organization => {
                    let owned = org.is_some() && t.organization_id.as_deref() == org;
                    !t.is_system && (owned || t.is_public)
                }
            })
            .collect()
    }

    /// Join a task's lines with the materials and labor catalogues.
    pub fn priced_lines(&self, task_id: Uuid) -> (Vec<PricedLine>, Vec<PricedLine>) {
        let materials = self
            .material_lines
            .iter()
            .filter(|l| l.task_id == task_id)
            .map(|l| match self.materials.iter().find(|m| m.id == l.material_id) {
                Some(m) => PricedLine {
                    name: m.name.clone(),
                    quantity: l.quantity,
                    unit_price: m.avg_unit_price,
                    currency: m.currency.clone(),
                },
                None => PricedLine::new(&l.material_id, l.quantity, None),
            })
            .collect();
        let labor = self
            .labor_lines
            .iter()
            .filter(|l| l.task_id == task_id)
            .map(|l| match self.labor_rates.iter().find(|r| r.id == l.labor_id) {
                Some(r) => PricedLine {
                    name: r.name.clone(),
                    quantity: l.quantity,
                    unit_price: r.avg_unit_price,
                    currency: r.currency.clone(),
                },
                None => PricedLine::new(&l.labor_id, l.quantity, None),
            })
            .collect();
        (materials, labor)
    }

    /// Per-unit cost of a task; refuses to sum mixed currencies.
    pub fn task_cost(&self, task_id: Uuid) -> Result<TaskCost, CostError> {
        let (materials, labor) = self.priced_lines(task_id);
        priced_cost(materials, labor)
    }

    /// Check that `slug` is a parameter of `category` and `option` one of its options.
    pub fn validate_assignment(
        &self,
        category: &CategoryId,
        slug: &ParameterSlug,
        option: &OptionId,
    ) -> Result<(), CatalogError> {
        let parameter = self
            .parameters_for(category)
            .into_iter()
            .find(|p| &p.slug == slug)
            .ok_or_else(|| CatalogError::UnknownParameter { slug: slug.to_string(), category: category.clone() })?;
        let found = self.options.as_slice().option(option)?;
        if found.parameter_id != parameter.id {
            return Err(CatalogError::ForeignOption { slug: slug.to_string(), option: option.clone() });
        }
        Ok(())
    }

    /// Create a task in `category`, assign it the next code and render its name.
    pub fn create_task(
        &mut self,
        category_id: &CategoryId,
        values: &ParamValues,
        organization_id: Option<String>,
        is_system: bool,
        is_public: bool,
        settings: &Settings,
    ) -> Result<Uuid, CatalogError> {
        let category = self
            .category(category_id)
            .ok_or_else(|| CatalogError::CategoryNotFound(category_id.clone()))?;
        for (slug, option) in values.chosen() {
            self.validate_assignment(category_id, slug, option)?;
        }
        let code = category.code.as_deref().map(|prefix| {
            next_task_code(prefix, self.tasks.iter().filter_map(|t| t.code.as_deref()))
        });

        let now = chrono::Utc::now().timestamp();
        let mut task = GeneratedTask {
            id: Uuid::new_v4(),
            category_id: category_id.clone(),
            param_values: values.to_json(),
            code,
            display_name: None,
            is_system,
            is_public,
            organization_id,
            created_by: None,
            created_at_utc: now,
            updated_at_utc: now,
        };
        task.display_name = Some(self.describe(&task, settings));
        let id = task.id;
        tracing::info!(task = %id, name = ?task.display_name, "generated task created");
        self.tasks.push(task);
        Ok(id)
    }

    /// Replace a task's parameter values and re-render its name.
    pub fn replace_values(&mut self, id: Uuid, values: &ParamValues, settings: &Settings) -> Result<(), CatalogError> {
        let category = self
            .get(id)
            .map(|t| t.category_id.clone())
            .ok_or_else(|| CatalogError::TaskNotFound(format!("Task {id} not found")))?;
        for (slug, option) in values.chosen() {
            self.validate_assignment(&category, slug, option)?;
        }
        if let Some(task) = self.get_mut(id) {
            task.param_values = values.to_json();
            task.updated_at_utc = chrono::Utc::now().timestamp();
        }
        self.materialize(Some(std::slice::from_ref(&id)), settings);
        Ok(())
    }
}

impl OptionLookup for Database {
    fn option(&self, id: &OptionId) -> Result<&ParameterOption, CatalogError> {
        self.options.as_slice().option(id)
    }
}

impl CatalogLookup for Database {
    fn category(&self, id: &CategoryId) -> Option<&Category> {
        self.categories.iter().find(|c| &c.id == id)
    }

    fn unit(&self, id: &UnitId) -> Option<&Unit> {
        self.units.iter().find(|u| &u.id == id)
    }
}

/// Resolve a task identifier (full id, id prefix or code) to a task id.
/// An ambiguous prefix is an error listing the candidates.
pub fn resolve_task_identifier(identifier: &str, db: &Database) -> Result<Uuid, CatalogError> {
    let needle = identifier.trim();
    if let Ok(id) = Uuid::parse_str(needle) {
        return db
            .get(id)
            .map(|t| t.id)
            .ok_or_else(|| CatalogError::TaskNotFound(format!("Task with id {id} not found")));
    }

    if let Some(task) = db.tasks.iter().find(|t| t.code.as_deref().map_or(false, |c| c.eq_ignore_ascii_case(needle))) {
        return Ok(task.id);
    }

    let prefix = needle.to_lowercase().replace('-', "");
    let matches: Vec<&GeneratedTask> = if prefix.is_empty() {
        Vec::new()
    } else {
        db.tasks.iter().filter(|t| t.id.simple().to_string().starts_with(&prefix)).collect()
    };

    match matches.len() {
        0 => Err(CatalogError::TaskNotFound(format!("No task found matching '{needle}'"))),
        1 => Ok(matches[0].id),
        _ => {
            let mut msg = format!("Multiple tasks match '{needle}':\n");
            for t in matches {
                msg.push_str(&format!(
                    "  {} {}\n",
                    t.id,
                    t.display_name.as_deref().unwrap_or("-")
                ));
            }
            msg.push_str("Please use a longer id or the task code instead.");
            Err(CatalogError::TaskNotFound(msg))
        }
    }
}

/// Parse `slug=option` assignments given on the command line.
pub fn parse_assignments(inputs: &[String]) -> Result<Vec<(ParameterSlug, OptionId)>, CatalogError> {
    let mut out = Vec::new();
    for raw in inputs {
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (slug, option) = part
                .split_once('=')
                .map(|(s, o)| (s.trim(), o.trim()))
                .filter(|(s, o)| !s.is_empty() && !o.is_empty())
                .ok_or_else(|| CatalogError::InvalidAssignment(part.to_string()))?;
            out.push((ParameterSlug::new(slug), OptionId::new(option)));
        }
    }
    Ok(out)
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;

    /// A small masonry catalogue with one system task and one org task.
    pub(crate) fn sample_db() -> Database {
        let mut db: Database = serde_json::from_value(json!({
            "categories": [
                {"id": "mam", "name": "Mampostería", "code": "MAM", "unit_id": "m2"}
            ],
            "units": [
                {"id": "m2", "name": "metro cuadrado", "symbol": "m2"},
                {"id": "m3", "name": "metro cúbico", "symbol": "m3"}
            ],
            "parameters": [
                {"id": "p2", "slug": "tipo_ladrillo", "label": "Tipo de ladrillo", "position": 1,
                 "expression_template": "tipo {value}", "category_id": "mam"},
                {"id": "p1", "slug": "tipo_elemento", "label": "Tipo de elemento", "position": 0,
                 "expression_template": "Elemento de {value}", "category_id": "mam"}
            ],
            "options": [
                {"id": "o1", "parameter_id": "p1", "label": "pared"},
                {"id": "o3", "parameter_id": "p1", "label": "bloque", "unit_id": "m3"},
                {"id": "o2", "parameter_id": "p2", "label": "hueco"}
            ],
            "materials": [
                {"id": "lad", "name": "Ladrillo hueco", "avg_unit_price": "12.50", "currency": "ARS"}
            ],
            "labor_rates": [
                {"id": "of", "name": "Oficial", "avg_unit_price": "9000", "currency": "ARS"}
            ]
        }))
        .unwrap();

        db.tasks.push(GeneratedTask {
            id: Uuid::from_u128(1),
            category_id: "mam".into(),
            param_values: json!({"tipo_elemento": "o1", "tipo_ladrillo": "o2"}),
            code: Some("MAM-001".into()),
            display_name: None,
            is_system: true,
            is_public: true,
            organization_id: None,
            created_by: None,
            created_at_utc: 0,
            updated_at_utc: 0,
        });
        db.tasks.push(GeneratedTask {
            id: Uuid::from_u128(2),
            category_id: "mam".into(),
            param_values: json!({"tipo_elemento": "o_missing"}),
            code: Some("MAM-002".into()),
            display_name: Some("stale".into()),
            is_system: false,
            is_public: false,
            organization_id: Some("org-a".into()),
            created_by: None,
            created_at_utc: 0,
            updated_at_utc: 0,
        });
        db.material_lines.push(MaterialLine {
            id: "ml1".into(),
            task_id: Uuid::from_u128(1),
            material_id: "lad".into(),
            quantity: Decimal::new(36, 0),
        });
        db.labor_lines.push(LaborLine {
            id: "ll1".into(),
            task_id: Uuid::from_u128(1),
            labor_id: "of".into(),
            quantity: Decimal::new(75, 2),
        });
        db
    }

    #[test]
    fn test_describe_from_snapshot() {
        let db = sample_db();
        let settings = Settings::default();
        assert_eq!(db.describe(&db.tasks[0], &settings), "Mampostería Elemento de pared tipo hueco.");
        assert_eq!(db.describe(&db.tasks[1], &settings), "Mampostería.");
    }

    #[test]
    fn test_materialize_counts_changes() {
        let mut db = sample_db();
        let settings = Settings::default();
        assert_eq!(db.materialize(None, &settings), 2);
        assert_eq!(db.materialize(None, &settings), 0);
        assert_eq!(db.tasks[1].display_name.as_deref(), Some("Mampostería."));
    }

    #[test]
    fn test_task_view_unit_from_option_then_category() {
        let mut db = sample_db();
        let settings = Settings::default();
        let view = db.task_view(&db.tasks[0], &settings);
        assert_eq!(view.unit.as_deref(), Some("m2"));
        assert_eq!(view.branch_label(), Some("pared"));

        db.tasks[0].param_values = json!({"tipo_elemento": "o3"});
        let view = db.task_view(&db.tasks[0], &settings);
        assert_eq!(view.unit.as_deref(), Some("m3"));
        assert_eq!(view.display_name, "Mampostería Elemento de bloque.");
    }

    #[test]
    fn test_visible_tasks_by_scope() {
        let db = sample_db();
        assert_eq!(db.visible_tasks(Scope::All, None).len(), 2);
        assert_eq!(db.visible_tasks(Scope::System, None).len(), 1);
        assert_eq!(db.visible_tasks(Scope::Organization, Some("org-a")).len(), 1);
        assert_eq!(db.visible_tasks(Scope::Organization, Some("org-b")).len(), 0);
        // Without an organisation nothing is owned, so ownerless tasks stay hidden.
        let mut db = db;
        db.tasks[1].organization_id = None;
        assert_eq!(db.visible_tasks(Scope::Organization, None).len(), 0);
    }

    #[test]
    fn test_task_cost_from_lines() {
        let db = sample_db();
        let cost = db.task_cost(Uuid::from_u128(1)).unwrap();
        assert_eq!(cost.breakdown.material_total, Decimal::new(450, 0));
        assert_eq!(cost.breakdown.labor_total, Decimal::new(6750, 0));
        assert_eq!(cost.currency.as_deref(), Some("ARS"));

        let empty = db.task_cost(Uuid::from_u128(2)).unwrap();
        assert_eq!(empty.breakdown.grand_total, Decimal::ZERO);
    }

    #[test]
    fn test_task_cost_refuses_mixed_currency() {
        let mut db = sample_db();
        db.labor_rates[0].currency = Some("USD".into());
        assert!(matches!(db.task_cost(Uuid::from_u128(1)), Err(CostError::MixedCurrencies(_))));
    }

    #[test]
    fn test_create_task_assigns_code_and_name() {
        let mut db = sample_db();
        let settings = Settings::default();
        let values = ParamValues::new().with("tipo_elemento", "o3");
        let id = db
            .create_task(&"mam".into(), &values, Some("org-a".into()), false, false, &settings)
            .unwrap();
        let task = db.get(id).unwrap();
        assert_eq!(task.code.as_deref(), Some("MAM-003"));
        assert_eq!(task.display_name.as_deref(), Some("Mampostería Elemento de bloque."));
    }

    #[test]
    fn test_create_task_rejects_foreign_option() {
        let mut db = sample_db();
        let values = ParamValues::new().with("tipo_elemento", "o2");
        let err = db
            .create_task(&"mam".into(), &values, None, true, true, &Settings::default())
            .unwrap_err();
        assert_eq!(err, CatalogError::ForeignOption { slug: "tipo_elemento".into(), option: "o2".into() });
    }

    #[test]
    fn test_replace_values_rerenders() {
        let mut db = sample_db();
        let settings = Settings::default();
        let id = Uuid::from_u128(2);
        db.replace_values(id, &ParamValues::new().with("tipo_ladrillo", "o2"), &settings).unwrap();
        assert_eq!(db.get(id).and_then(|t| t.display_name.clone()).as_deref(), Some("Mampostería tipo hueco."));
    }

    #[test]
    fn test_remove_task_drops_lines() {
        let mut db = sample_db();
        assert!(db.remove_task(Uuid::from_u128(1)));
        assert!(db.material_lines.is_empty() && db.labor_lines.is_empty());
        assert!(!db.remove_task(Uuid::from_u128(1)));
    }

    #[test]
    fn test_resolve_task_identifier() {
        let db = sample_db();
        assert_eq!(resolve_task_identifier("mam-002", &db), Ok(Uuid::from_u128(2)));
        assert_eq!(
            resolve_task_identifier("00000000-0000-0000-0000-000000000001", &db),
            Ok(Uuid::from_u128(1))
        );
        // Both ids share the leading zeros.
        assert!(resolve_task_identifier("0000", &db).is_err());
        assert!(resolve_task_identifier("ffff", &db).is_err());
    }

    #[test]
    fn test_parse_assignments() {
        let parsed = parse_assignments(&["tipo_elemento=o1,tipo_ladrillo = o2".to_string()]).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1], (ParameterSlug::new("tipo_ladrillo"), OptionId::new("o2")));
        assert!(parse_assignments(&["tipo_elemento".to_string()]).is_err());
        assert!(parse_assignments(&["=o1".to_string()]).is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let db = sample_db();
        db.save(&path).unwrap();
        let loaded = Database::load(&path).unwrap();
        assert_eq!(loaded.tasks.len(), 2);
        assert_eq!(loaded.describe(&loaded.tasks[0], &Settings::default()), "Mampostería Elemento de pared tipo hueco.");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_load_missing_is_empty_and_garbage_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Database::load(&dir.path().join("nope.json")).unwrap();
        assert!(missing.tasks.is_empty());

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{").unwrap();
        assert!(matches!(Database::load(&bad), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Mampostería", 20), "Mampostería");
        assert_eq!(truncate("Mampostería", 5), "Mamp…");
    }
}
