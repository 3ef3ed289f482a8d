//! Command implementations for the CLI interface.
//!
//! Each subcommand has a `cmd_*` handler working on a loaded snapshot. Handlers
//! return errors instead of exiting so `main` reports them in one place.

use std::collections::BTreeMap;
use std::fs;
use std::io;

use chrono::{TimeZone, Utc};
use clap::{CommandFactory, Subcommand};
use clap_complete::{generate, Shell};

use crate::branch::{filter_tasks_with, group_by_branch_with};
use crate::catalog::{CatalogLookup, CategoryId, ParameterSlug};
use crate::cli::Cli;
use crate::config::Config;
use crate::cost::{format_amount, TaskCost};
use crate::db::{parse_assignments, resolve_task_identifier, truncate, Database};
use crate::error::{CatalogError, Result};
use crate::fields::{Scope, SortKey};
use crate::resolver::unknown_slugs;
use crate::task::{GeneratedTask, GeneratedTaskView, ParamValues};
use crate::tui::run::run_tui;

#[derive(Subcommand)]
pub enum Commands {
    /// Launch the interactive catalogue browser.
    Ui {
        /// Initial search filter.
        #[arg(long)]
        search: Option<String>,
        /// Visibility scope.
        #[arg(long, value_enum, default_value_t = Scope::All)]
        scope: Scope,
        /// Organisation id used by `--scope organization`.
        #[arg(long)]
        org: Option<String>,
    },

    /// Show categories, their parameters in position order and the options.
    Params {
        /// Only this category.
        #[arg(long)]
        category: Option<String>,
    },

    /// Generate a new task from a category and parameter values.
    Add {
        /// Category (task template) id.
        #[arg(long)]
        category: String,
        /// Parameter value as slug=option. May be repeated or comma-separated.
        #[arg(long = "param")]
        params: Vec<String>,
        /// Owning organisation.
        #[arg(long)]
        org: Option<String>,
        /// Make an organisation task visible to other organisations.
        #[arg(long)]
        public: bool,
        /// Create a system task.
        #[arg(long)]
        system: bool,
    },

    /// Replace parameter values of a task and re-render its name.
    Update {
        /// Task id, id prefix or code.
        id: String,
        /// Parameter value as slug=option. May be repeated or comma-separated.
        #[arg(long = "param")]
        params: Vec<String>,
        /// Unset a parameter by slug. May be repeated.
        #[arg(long = "clear-param")]
        clear_params: Vec<String>,
    },

    /// View a single task with its resolved parameter chain and cost.
    View {
        /// Task id, id prefix or code.
        id: String,
    },

    /// List generated tasks grouped by branch.
    List {
        /// Case-insensitive search over branch, name and parameter labels.
        #[arg(long)]
        search: Option<String>,
        /// Visibility scope.
        #[arg(long, value_enum, default_value_t = Scope::All)]
        scope: Scope,
        /// Organisation id used by `--scope organization`.
        #[arg(long)]
        org: Option<String>,
        /// Print a flat table instead of branch groups.
        #[arg(long)]
        flat: bool,
        /// Sort key applied before grouping.
        #[arg(long, value_enum, default_value_t = SortKey::Code)]
        sort: SortKey,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show the unit cost breakdown of a task.
    Cost {
        /// Task id, id prefix or code.
        id: String,
    },

    /// Recompute and store display names from the current catalogue.
    Materialize {
        /// Only this task (id, id prefix or code). All tasks when omitted.
        id: Option<String>,
    },

    /// Delete a task and its material and labor lines.
    Delete {
        /// Task id, id prefix or code.
        id: String,
    },

    /// Export tasks with their unit costs to CSV.
    Export {
        /// Output file path (default: tasks.csv)
        #[arg(long, short)]
        output: Option<String>,
        /// Visibility scope.
        #[arg(long, value_enum, default_value_t = Scope::All)]
        scope: Scope,
        /// Organisation id used by `--scope organization`.
        #[arg(long)]
        org: Option<String>,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Launch the terminal catalogue browser.
pub fn cmd_ui(config: &Config, db: Database, search: Option<String>, scope: Scope, org: Option<String>) -> Result<()> {
    require_org(scope, org.as_deref())?;
    run_tui(db, config.settings.clone(), search, scope, org)?;
    Ok(())
}

/// Print categories and their parameter catalogue.
pub fn cmd_params(db: &Database, category: Option<String>) -> Result<()> {
    let categories: Vec<_> = match category {
        Some(id) => {
            let id = CategoryId::new(id);
            vec![db.category(&id).ok_or(CatalogError::CategoryNotFound(id.clone()))?]
        }
        None => db.categories.iter().collect(),
    };

    for category in categories {
        let unit = category
            .unit_id
            .as_ref()
            .and_then(|u| db.unit(u))
            .map(|u| u.short().to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{} [{}] code={} unit={}",
            category.name,
            category.id,
            category.code.as_deref().unwrap_or("-"),
            unit
        );
        let mut parameters = db.parameters_for(&category.id);
        parameters.sort_by_key(|p| p.position);
        for p in &parameters {
            println!("  {:>3}  {:<20} {:<24} \"{}\"", p.position, p.slug, p.label, p.expression_template);
            for o in db.options_of(p) {
                println!("         - {:<12} {}", o.id, o.label);
            }
        }
    }
    Ok(())
}

/// Generate a new task and save it.
pub fn cmd_add(
    config: &Config,
    db: &mut Database,
    category: String,
    params: Vec<String>,
    org: Option<String>,
    public: bool,
    system: bool,
) -> Result<()> {
    let values: ParamValues = parse_assignments(&params)?.into_iter().collect();
    let id = db.create_task(&CategoryId::new(category), &values, org, system, public, &config.settings)?;
    db.save(&config.db_path)?;

    let task = db.get(id).ok_or_else(|| CatalogError::TaskNotFound(format!("Task {id} not found")))?;
    println!(
        "Added task {} {}",
        task.code.as_deref().unwrap_or(&task.short_id()),
        task.display_name.as_deref().unwrap_or("-")
    );
    Ok(())
}

/// Replace parameter values on an existing task.
pub fn cmd_update(
    config: &Config,
    db: &mut Database,
    id: String,
    params: Vec<String>,
    clear_params: Vec<String>,
) -> Result<()> {
    let task_id = resolve_task_identifier(&id, db)?;
    let mut values = db
        .get(task_id)
        .map(GeneratedTask::values)
        .ok_or_else(|| CatalogError::TaskNotFound(format!("Task {task_id} not found")))?;

    for (slug, option) in parse_assignments(&params)? {
        values.set(slug, Some(option));
    }
    for slug in clear_params {
        values.remove(&ParameterSlug::new(slug.trim()));
    }

    db.replace_values(task_id, &values, &config.settings)?;
    db.save(&config.db_path)?;
    if let Some(task) = db.get(task_id) {
        println!("Updated task {}: {}", task_id, task.display_name.as_deref().unwrap_or("-"));
    }
    Ok(())
}

/// View detailed information about a single task.
pub fn cmd_view(config: &Config, db: &Database, id: String) -> Result<()> {
    let task_id = resolve_task_identifier(&id, db)?;
    let task = db
        .get(task_id)
        .ok_or_else(|| CatalogError::TaskNotFound(format!("Task {task_id} not found")))?;
    let view = db.task_view(task, &config.settings);

    println!("ID:           {}", task.id);
    println!("Code:         {}", task.code.as_deref().unwrap_or("-"));
    println!("Description:  {}", view.display_name);
    if task.display_name.as_deref() != Some(view.display_name.as_str()) {
        println!("Stored name:  {} (stale, run `ptask materialize`)", task.display_name.as_deref().unwrap_or("-"));
    }
    println!("Category:     {}", view.category_name.as_deref().unwrap_or("-"));
    println!("Unit:         {}", view.unit.as_deref().unwrap_or("-"));
    println!("Branch:       {}", view.branch_label().unwrap_or(&config.settings.uncategorized_label));
    println!("Owner:        {}", owner_label(task));
    println!("Created UTC:  {}", format_timestamp(task.created_at_utc));
    println!("Updated UTC:  {}", format_timestamp(task.updated_at_utc));

    println!("Parameters:");
    if view.resolved.is_empty() {
        println!("  -");
    }
    for r in &view.resolved {
        println!("  {:>3}  {:<24} {}", r.position, r.label, r.option_label);
    }
    let values = task.values();
    let parameters = db.parameters_for(&task.category_id);
    for slug in unknown_slugs(&values, &parameters) {
        println!("  ???  {slug:<24} (not a parameter of this category)");
    }

    match db.task_cost(task_id) {
        Ok(cost) => print_cost(&cost, config.settings.default_currency.as_deref()),
        Err(e) => println!("Cost:         unavailable ({e})"),
    }
    Ok(())
}

/// List tasks grouped by branch, or as a flat table.
pub fn cmd_list(
    config: &Config,
    db: &Database,
    search: Option<String>,
    scope: Scope,
    org: Option<String>,
    flat: bool,
    sort: SortKey,
    limit: Option<usize>,
) -> Result<()> {
    require_org(scope, org.as_deref())?;
    let query = search.unwrap_or_default();
    let groups = list_groups(config, db, &query, scope, org.as_deref(), sort, limit);
    let shown: usize = groups.values().map(Vec::len).sum();

    if flat {
        println!("{:<10} {:<6} {:<18} {}", "Code", "Unit", "Branch", "Description");
        for (branch, rows) in &groups {
            for v in rows {
                println!(
                    "{:<10} {:<6} {:<18} {}",
                    v.code.as_deref().unwrap_or("-"),
                    v.unit.as_deref().unwrap_or("-"),
                    truncate(branch, 18),
                    v.display_name
                );
            }
        }
    } else {
        for (branch, rows) in &groups {
            println!("{} ({})", branch, rows.len());
            for v in rows {
                println!(
                    "  {:<10} {:<6} {}",
                    v.code.as_deref().unwrap_or("-"),
                    v.unit.as_deref().unwrap_or("-"),
                    v.display_name
                );
            }
        }
    }
    if !query.trim().is_empty() {
        println!("{} task(s) in {} branch(es) match '{}'", shown, groups.len(), query.trim());
    }
    Ok(())
}

/// Sorted, filtered and limited views grouped by branch. The limit applies to
/// matches, so searching never loses tasks past the first `limit` rows.
pub fn list_groups(
    config: &Config,
    db: &Database,
    query: &str,
    scope: Scope,
    org: Option<&str>,
    sort: SortKey,
    limit: Option<usize>,
) -> BTreeMap<String, Vec<GeneratedTaskView>> {
    let mut tasks = db.visible_tasks(scope, org);
    match sort {
        SortKey::Code => tasks.sort_by(|a, b| a.code.cmp(&b.code).then(a.id.cmp(&b.id))),
        SortKey::Created => tasks.sort_by_key(|t| (t.created_at_utc, t.id)),
        SortKey::Name => {}
    }

    let mut views: Vec<GeneratedTaskView> = tasks.into_iter().map(|t| db.task_view(t, &config.settings)).collect();
    if sort == SortKey::Name {
        views.sort_by(|a, b| a.display_name.cmp(&b.display_name).then(a.id.cmp(&b.id)));
    }

    let sentinel = &config.settings.uncategorized_label;
    let mut matching = filter_tasks_with(views, query, sentinel);
    if let Some(n) = limit {
        matching.truncate(n);
    }
    group_by_branch_with(matching, sentinel)
}

/// The organisation scope is meaningless without an organisation.
fn require_org(scope: Scope, org: Option<&str>) -> Result<(), CatalogError> {
    if scope == Scope::Organization && org.map_or(true, |o| o.trim().is_empty()) {
        return Err(CatalogError::MissingOrganization);
    }
    Ok(())
}

/// Show the cost breakdown of one task.
pub fn cmd_cost(config: &Config, db: &Database, id: String) -> Result<()> {
    let task_id = resolve_task_identifier(&id, db)?;
    let cost = db.task_cost(task_id)?;
    if let Some(task) = db.get(task_id) {
        println!("{}", db.describe(task, &config.settings));
    }
    print_cost(&cost, config.settings.default_currency.as_deref());
    Ok(())
}

/// Recompute display names.
pub fn cmd_materialize(config: &Config, db: &mut Database, id: Option<String>) -> Result<()> {
    let changed = match id {
        Some(id) => {
            let task_id = resolve_task_identifier(&id, db)?;
            db.materialize(Some(&[task_id][..]), &config.settings)
        }
        None => db.materialize(None, &config.settings),
    };
    if changed > 0 {
        db.save(&config.db_path)?;
    }
    println!("Materialized display names: {} changed.", changed);
    Ok(())
}

/// Delete a task.
pub fn cmd_delete(config: &Config, db: &mut Database, id: String) -> Result<()> {
    let task_id = resolve_task_identifier(&id, db)?;
    db.remove_task(task_id);
    db.save(&config.db_path)?;
    tracing::info!(task = %task_id, "generated task deleted");
    println!("Deleted task {}", task_id);
    Ok(())
}

/// Export tasks with unit costs to CSV.
pub fn cmd_export(config: &Config, db: &Database, output: Option<String>, scope: Scope, org: Option<String>) -> Result<()> {
    require_org(scope, org.as_deref())?;
    let output_path = output.unwrap_or_else(|| "tasks.csv".to_string());
    let csv = export_csv(config, db, scope, org.as_deref());
    let rows = csv.lines().count().saturating_sub(1);
    fs::write(&output_path, csv)?;
    println!("Exported {} task(s) to {}", rows, output_path);
    Ok(())
}

/// Build the CSV export text.
pub fn export_csv(config: &Config, db: &Database, scope: Scope, org: Option<&str>) -> String {
    let mut csv = String::from("Code,Description,Branch,Unit,Category,Material,Labor,Total,Currency\n");
    for task in db.visible_tasks(scope, org) {
        let view = db.task_view(task, &config.settings);
        let (material, labor, total, currency) = match db.task_cost(task.id) {
            Ok(cost) => (
                format_amount(cost.breakdown.material_total, None),
                format_amount(cost.breakdown.labor_total, None),
                format_amount(cost.breakdown.grand_total, None),
                cost.currency.or_else(|| config.settings.default_currency.clone()).unwrap_or_else(|| "-".into()),
            ),
            Err(e) => {
                tracing::warn!(task = %task.id, error = %e, "cost not exported");
                ("-".into(), "-".into(), "-".into(), "mixed".into())
            }
        };
        let fields = [
            view.code.clone().unwrap_or_else(|| "-".into()),
            view.display_name.clone(),
            view.branch_label().unwrap_or(&config.settings.uncategorized_label).to_string(),
            view.unit.clone().unwrap_or_else(|| "-".into()),
            view.category_name.clone().unwrap_or_else(|| "-".into()),
            material,
            labor,
            total,
            currency,
        ];
        csv.push_str(&fields.iter().map(|f| escape_csv(f)).collect::<Vec<_>>().join(","));
        csv.push('\n');
    }
    csv
}

/// Quote a CSV field when it contains a separator, quote or newline.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "ptask", &mut io::stdout());
}

fn print_cost(cost: &TaskCost, default_currency: Option<&str>) {
    let currency = cost.currency.as_deref().or(default_currency);
    println!("Materials:");
    if cost.materials.is_empty() {
        println!("  -");
    }
    for line in &cost.materials {
        print_line(&line.name, line.quantity, line.unit_price, line.subtotal().ok(), currency);
    }
    println!("Labor:");
    if cost.labor.is_empty() {
        println!("  -");
    }
    for line in &cost.labor {
        print_line(&line.name, line.quantity, line.unit_price, line.subtotal().ok(), currency);
    }
    println!("Material total: {}", format_amount(cost.breakdown.material_total, currency));
    println!("Labor total:    {}", format_amount(cost.breakdown.labor_total, currency));
    println!("Unit cost:      {}", format_amount(cost.breakdown.grand_total, currency));
}

fn print_line(
    name: &str,
    quantity: rust_decimal::Decimal,
    price: Option<rust_decimal::Decimal>,
    subtotal: Option<rust_decimal::Decimal>,
    currency: Option<&str>,
) {
    let price = price.map(|p| format_amount(p, None)).unwrap_or_else(|| "no price".into());
    let subtotal = subtotal.map(|s| format_amount(s, currency)).unwrap_or_else(|| "-".into());
    println!("  {:<24} {:>10} x {:>12} = {}", truncate(name, 24), quantity.to_string(), price, subtotal);
}

fn owner_label(task: &GeneratedTask) -> String {
    let visibility = if task.is_public { "public" } else { "private" };
    if task.is_system {
        format!("system ({visibility})")
    } else {
        format!("{} ({visibility})", task.organization_id.as_deref().unwrap_or("-"))
    }
}

fn format_timestamp(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::db::tests::sample_db;
    use std::path::PathBuf;

    fn config() -> Config {
        Config { data_dir: PathBuf::from("."), db_path: PathBuf::from("catalog.json"), settings: Settings::default() }
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_export_csv_rows() {
        let db = sample_db();
        let csv = export_csv(&config(), &db, Scope::All, None);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[1],
            "MAM-001,Mampostería Elemento de pared tipo hueco.,pared,m2,Mampostería,450.00,6750.00,7200.00,ARS"
        );
        assert_eq!(lines[2], "MAM-002,Mampostería.,Sin categoría,m2,Mampostería,0.00,0.00,0.00,-");
    }

    #[test]
    fn test_list_limit_applies_after_search() {
        let db = sample_db();
        let groups = list_groups(&config(), &db, "Sin categor", Scope::All, None, SortKey::Code, Some(1));
        let codes: Vec<_> = groups.values().flatten().map(|v| v.code.as_deref()).collect();
        assert_eq!(codes, vec![Some("MAM-002")]);

        let by_code = list_groups(&config(), &db, "mam-002", Scope::All, None, SortKey::Code, Some(1));
        assert_eq!(by_code.values().map(Vec::len).sum::<usize>(), 1);

        let all = list_groups(&config(), &db, "", Scope::All, None, SortKey::Code, Some(1));
        assert_eq!(all.values().map(Vec::len).sum::<usize>(), 1);
        assert!(all.contains_key("pared"));
    }

    #[test]
    fn test_organization_scope_requires_org() {
        assert_eq!(require_org(Scope::Organization, None), Err(CatalogError::MissingOrganization));
        assert_eq!(require_org(Scope::Organization, Some(" ")), Err(CatalogError::MissingOrganization));
        assert_eq!(require_org(Scope::Organization, Some("org-a")), Ok(()));
        assert_eq!(require_org(Scope::All, None), Ok(()));
    }

    #[test]
    fn test_owner_label() {
        let db = sample_db();
        assert_eq!(owner_label(&db.tasks[0]), "system (public)");
        assert_eq!(owner_label(&db.tasks[1]), "org-a (private)");
    }
}
