//! crates/bizdesk_core/src/depreciation.rs
//!
//! Straight-line depreciation of recorded assets.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Depreciation {
    pub years_owned: f64,
    pub annual_depreciation: f64,
    pub accumulated_depreciation: f64,
    pub current_value: f64,
}

/// Years between purchase and `today`, counted as whole days over 365.
/// A purchase dated in the future counts as zero years.
pub fn years_owned(purchase_date: NaiveDate, today: NaiveDate) -> f64 {
    ((today - purchase_date).num_days() as f64 / 365.0).max(0.0)
}

/// Accumulated depreciation is capped at the cost, so book value never drops below zero.
pub fn straight_line(
    cost: f64,
    expected_life: u32,
    years_owned: f64,
) -> Result<Depreciation, ValidationError> {
    if expected_life == 0 {
        return Err(ValidationError::ZeroExpectedLife);
    }
    let annual_depreciation = cost / f64::from(expected_life);
    let accumulated_depreciation = (years_owned.max(0.0) * annual_depreciation).min(cost);
    Ok(Depreciation {
        years_owned,
        annual_depreciation,
        accumulated_depreciation,
        current_value: (cost - accumulated_depreciation).max(0.0),
    })
}

pub fn depreciate(
    cost: f64,
    expected_life: u32,
    purchase_date: NaiveDate,
    today: NaiveDate,
) -> Result<Depreciation, ValidationError> {
    straight_line(cost, expected_life, years_owned(purchase_date, today))
}
