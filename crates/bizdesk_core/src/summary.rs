//! crates/bizdesk_core/src/summary.rs
//!
//! Derived views over a business's records: the dashboard figures, the asset
//! register, the tax summary and the optimization tips. Nothing here is
//! cached; every view is recomputed from the full expense and asset lists.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::depreciation::{depreciate, straight_line, Depreciation};
use crate::domain::{Asset, BusinessProfile, Expense, ExpenseCategory, ValidationError};
use crate::tax::{assess, small_business_bracket_gap, STANDARD_CORPORATE_RATE};

/// Revenue above which a non-small business gets the restructuring hint.
pub const RESTRUCTURE_HINT_REVENUE: f64 = 1_000_000.0;

//=========================================================================================
// Tax Summary
//=========================================================================================

#[derive(Debug, Clone, Serialize)]
pub struct TaxSummary {
    pub gross_revenue: f64,
    pub other_income: f64,
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub total_depreciation: f64,
    pub total_deductions: f64,
    pub taxable_income: f64,
    pub tax_rate: f64,
    pub estimated_tax: f64,
    pub small_business_rates: bool,
    pub deductions: BTreeMap<ExpenseCategory, f64>,
}

/// Sum of one year's depreciation across every asset.
pub fn total_annual_depreciation(assets: &[Asset]) -> Result<f64, ValidationError> {
    assets.iter().try_fold(0.0, |total, asset| {
        Ok(total + straight_line(asset.purchase_cost, asset.expected_life, 0.0)?.annual_depreciation)
    })
}

pub fn deductions_by_category(expenses: &[Expense]) -> BTreeMap<ExpenseCategory, f64> {
    let mut deductions = BTreeMap::new();
    for expense in expenses {
        *deductions.entry(expense.main_category).or_insert(0.0) += expense.amount;
    }
    deductions
}

pub fn tax_summary(
    profile: &BusinessProfile,
    expenses: &[Expense],
    assets: &[Asset],
) -> Result<TaxSummary, ValidationError> {
    let total_revenue = profile.total_revenue();
    let total_expenses: f64 = expenses.iter().map(|e| e.amount).sum();
    let total_depreciation = total_annual_depreciation(assets)?;
    let total_deductions = total_expenses + total_depreciation;
    let taxable_income = (total_revenue - total_deductions).max(0.0);
    let assessment = assess(taxable_income, profile.business_type);

    Ok(TaxSummary {
        gross_revenue: profile.gross_revenue,
        other_income: profile.other_income,
        total_revenue,
        total_expenses,
        total_depreciation,
        total_deductions,
        taxable_income,
        tax_rate: assessment.rate,
        estimated_tax: assessment.tax_amount,
        small_business_rates: profile.is_small_business(),
        deductions: deductions_by_category(expenses),
    })
}

/// Small business income that falls between two brackets is assessed at
/// zero. Returns a notice naming the gap so the figure is not taken at face value.
pub fn bracket_gap_notice(summary: &TaxSummary) -> Option<String> {
    if !summary.small_business_rates {
        return None;
    }
    small_business_bracket_gap(summary.taxable_income).map(|(below, above)| {
        format!(
            "Taxable income of R{:.2} falls between the R{:.0} and R{:.0} brackets and is assessed at zero. Round it to whole rand for an estimate.",
            summary.taxable_income, below, above
        )
    })
}

//=========================================================================================
// Optimization Tips
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TipLevel {
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxTip {
    pub level: TipLevel,
    pub message: &'static str,
}

pub fn optimization_tips(
    profile: &BusinessProfile,
    expenses: &[Expense],
    summary: &TaxSummary,
) -> Vec<TaxTip> {
    let mut tips = Vec::new();
    if summary.total_depreciation == 0.0 {
        tips.push(TaxTip {
            level: TipLevel::Warning,
            message: "No depreciation recorded. Consider recording your business assets to claim depreciation.",
        });
    }
    if !expenses
        .iter()
        .any(|e| e.main_category == ExpenseCategory::ResearchAndDevelopment)
    {
        tips.push(TaxTip {
            level: TipLevel::Info,
            message: "Consider R&D investments - they may qualify for special tax incentives.",
        });
    }
    if summary.total_revenue > RESTRUCTURE_HINT_REVENUE && !profile.is_small_business() {
        tips.push(TaxTip {
            level: TipLevel::Info,
            message: "Consider restructuring as a Small Business Corporation if you qualify - it may reduce your tax burden.",
        });
    }
    tips
}

//=========================================================================================
// Dashboard
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotal {
    /// `YYYY-MM`
    pub month: String,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub business_name: String,
    pub business_type: Option<&'static str>,
    pub total_expenses: f64,
    pub monthly_average: f64,
    pub potential_tax_savings: f64,
    pub monthly_expenses: Vec<MonthlyTotal>,
    pub expenses_by_category: BTreeMap<ExpenseCategory, f64>,
}

pub fn dashboard(profile: &BusinessProfile, expenses: &[Expense]) -> Dashboard {
    // (year, month) -> (sum, count)
    let mut months: BTreeMap<(i32, u32), (f64, usize)> = BTreeMap::new();
    for expense in expenses {
        let entry = months
            .entry((expense.date.year(), expense.date.month()))
            .or_insert((0.0, 0));
        entry.0 += expense.amount;
        entry.1 += 1;
    }

    // Mean over months of each month's mean expense.
    let monthly_average = if months.is_empty() {
        0.0
    } else {
        months
            .values()
            .map(|(sum, count)| sum / *count as f64)
            .sum::<f64>()
            / months.len() as f64
    };

    let total_expenses: f64 = expenses.iter().map(|e| e.amount).sum();

    Dashboard {
        business_name: profile.business_name.clone(),
        business_type: profile.business_type.map(|t| t.label()),
        total_expenses,
        monthly_average,
        potential_tax_savings: total_expenses * STANDARD_CORPORATE_RATE,
        monthly_expenses: months
            .into_iter()
            .map(|((year, month), (total, _))| MonthlyTotal {
                month: format!("{year:04}-{month:02}"),
                total,
            })
            .collect(),
        expenses_by_category: deductions_by_category(expenses),
    }
}

//=========================================================================================
// Asset Register
//=========================================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DepreciatedAsset {
    #[serde(flatten)]
    pub asset: Asset,
    #[serde(flatten)]
    pub depreciation: Depreciation,
}

pub fn asset_register(
    assets: &[Asset],
    today: NaiveDate,
) -> Result<Vec<DepreciatedAsset>, ValidationError> {
    assets
        .iter()
        .map(|asset| {
            Ok(DepreciatedAsset {
                depreciation: depreciate(
                    asset.purchase_cost,
                    asset.expected_life,
                    asset.purchase_date,
                    today,
                )?,
                asset: asset.clone(),
            })
        })
        .collect()
}
