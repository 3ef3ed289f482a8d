//! Unit cost rollup over a task's material and labor lines.
//!
//! Prices are looked up, never computed: each line carries a quantity and the
//! average unit price already resolved for its material or labor rate. A line
//! without a price counts as zero. Aggregation only runs over lines that share
//! one currency.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::UnitId;
use crate::error::CostError;

/// A priced resource from the materials catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub unit_id: Option<UnitId>,
    #[serde(default)]
    pub avg_unit_price: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// A priced labor rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaborRate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub unit_id: Option<UnitId>,
    #[serde(default)]
    pub avg_unit_price: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Quantity of a material consumed per unit of a generated task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialLine {
    pub id: String,
    pub task_id: Uuid,
    pub material_id: String,
    pub quantity: Decimal,
}

/// Quantity of a labor rate consumed per unit of a generated task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaborLine {
    pub id: String,
    pub task_id: Uuid,
    pub labor_id: String,
    pub quantity: Decimal,
}

/// A line joined with its resolved price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
    pub currency: Option<String>,
}

impl PricedLine {
    pub fn new(name: &str, quantity: Decimal, unit_price: Option<Decimal>) -> Self {
        PricedLine { name: name.to_string(), quantity, unit_price, currency: None }
    }

    pub fn in_currency(mut self, currency: &str) -> Self {
        self.currency = Some(currency.to_string());
        self
    }

    /// `quantity × unit_price`, zero while no price is set.
    pub fn subtotal(&self) -> Result<Decimal, CostError> {
        self.quantity
            .checked_mul(self.unit_price.unwrap_or(Decimal::ZERO))
            .ok_or_else(|| CostError::Overflow(self.name.clone()))
    }
}

/// Per-unit cost of one generated task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CostBreakdown {
    pub material_total: Decimal,
    pub labor_total: Decimal,
    pub grand_total: Decimal,
}

fn sum_lines(lines: &[PricedLine]) -> Result<Decimal, CostError> {
    lines.iter().try_fold(Decimal::ZERO, |acc, line| {
        acc.checked_add(line.subtotal()?)
            .ok_or_else(|| CostError::Overflow(line.name.clone()))
    })
}

/// Sum material and labor lines. Fails instead of overflowing.
pub fn unit_cost(material_lines: &[PricedLine], labor_lines: &[PricedLine]) -> Result<CostBreakdown, CostError> {
    let material_total = sum_lines(material_lines)?;
    let labor_total = sum_lines(labor_lines)?;
    let grand_total = material_total
        .checked_add(labor_total)
        .ok_or_else(|| CostError::Overflow("total".to_string()))?;
    Ok(CostBreakdown { material_total, labor_total, grand_total })
}

/// Reported in place of a missing currency when priced lines disagree.
pub const UNSPECIFIED_CURRENCY: &str = "unspecified";

/// The one currency shared by all priced lines, `None` when no line names one.
///
/// Unpriced lines do not take part. A priced line without a currency counts
/// as a currency of its own, so it never mixes silently with a named one.
pub fn ensure_single_currency<'a, I>(lines: I) -> Result<Option<String>, CostError>
where
    I: IntoIterator<Item = &'a PricedLine>,
{
    let currencies: BTreeSet<Option<&str>> = lines
        .into_iter()
        .filter(|l| l.unit_price.is_some())
        .map(|l| l.currency.as_deref())
        .collect();
    if currencies.len() <= 1 {
        return Ok(currencies.into_iter().flatten().next().map(str::to_string));
    }
    Err(CostError::MixedCurrencies(
        currencies.into_iter().map(|c| c.unwrap_or(UNSPECIFIED_CURRENCY).to_string()).collect(),
    ))
}

/// Cost of a task along with the lines it was computed from.
#[derive(Debug, Clone)]
pub struct TaskCost {
    pub materials: Vec<PricedLine>,
    pub labor: Vec<PricedLine>,
    pub currency: Option<String>,
    pub breakdown: CostBreakdown,
}

/// Guard the currency, then roll up.
pub fn priced_cost(materials: Vec<PricedLine>, labor: Vec<PricedLine>) -> Result<TaskCost, CostError> {
    let currency = ensure_single_currency(materials.iter().chain(labor.iter()))?;
    let breakdown = unit_cost(&materials, &labor)?;
    Ok(TaskCost { materials, labor, currency, breakdown })
}

/// Two-decimal display with an optional currency suffix.
pub fn format_amount(amount: Decimal, currency: Option<&str>) -> String {
    let rounded = amount.round_dp(2);
    match currency {
        Some(c) => format!("{rounded:.2} {c}"),
        None => format!("{rounded:.2}"),
    }
}
