//! crates/bizdesk_core/src/tax.rs
//!
//! Fixed-bracket company tax arithmetic.

use serde::Serialize;

use crate::domain::BusinessType;

/// Flat rate applied to every business that is not a small business corporation.
pub const STANDARD_CORPORATE_RATE: f64 = 0.27;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxBracket {
    pub min_income: f64,
    pub max_income: f64,
    pub rate: f64,
    pub base_tax: f64,
}

/// Small business corporation brackets. Bounds are inclusive on both ends.
pub const SMALL_BUSINESS_BRACKETS: [TaxBracket; 4] = [
    TaxBracket {
        min_income: 0.0,
        max_income: 91_250.0,
        rate: 0.0,
        base_tax: 0.0,
    },
    TaxBracket {
        min_income: 91_251.0,
        max_income: 365_000.0,
        rate: 0.07,
        base_tax: 0.0,
    },
    TaxBracket {
        min_income: 365_001.0,
        max_income: 550_000.0,
        rate: 0.21,
        base_tax: 19_162.50,
    },
    TaxBracket {
        min_income: 550_001.0,
        max_income: f64::INFINITY,
        rate: 0.28,
        base_tax: 58_037.50,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TaxAssessment {
    pub tax_amount: f64,
    pub rate: f64,
}

pub fn calculate_business_tax(taxable_income: f64) -> TaxAssessment {
    TaxAssessment {
        tax_amount: taxable_income * STANDARD_CORPORATE_RATE,
        rate: STANDARD_CORPORATE_RATE,
    }
}

/// Applies the small business brackets.
///
/// The `+ 1` in `(income - min + 1)` is kept exactly as the published tables
/// were transcribed; see DESIGN.md. Income that lands between two brackets
/// (for example 91 250.50) matches none and is assessed at zero.
pub fn calculate_small_business_tax(taxable_income: f64) -> TaxAssessment {
    SMALL_BUSINESS_BRACKETS
        .iter()
        .find(|b| b.min_income <= taxable_income && taxable_income <= b.max_income)
        .map(|b| TaxAssessment {
            tax_amount: b.base_tax + (taxable_income - b.min_income + 1.0) * b.rate,
            rate: b.rate,
        })
        .unwrap_or(TaxAssessment {
            tax_amount: 0.0,
            rate: 0.0,
        })
}

/// The `(max, min)` bounds of the two neighbouring small business brackets
/// when `taxable_income` sits strictly between them, e.g. 365 000.50.
pub fn small_business_bracket_gap(taxable_income: f64) -> Option<(f64, f64)> {
    SMALL_BUSINESS_BRACKETS
        .windows(2)
        .map(|pair| (pair[0].max_income, pair[1].min_income))
        .find(|&(below, above)| below < taxable_income && taxable_income < above)
}

/// Picks the rate table for a business. Only a registered small business
/// corporation gets the bracketed rates; an unset type pays the flat rate.
pub fn assess(taxable_income: f64, business_type: Option<BusinessType>) -> TaxAssessment {
    match business_type {
        Some(BusinessType::SmallBusinessCorporation) => calculate_small_business_tax(taxable_income),
        _ => calculate_business_tax(taxable_income),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_small_business_zero_band() {
        for income in [0.0, 1.0, 50_000.0, 91_250.0] {
            let assessed = calculate_small_business_tax(income);
            assert_eq!(assessed.tax_amount, 0.0);
            assert_eq!(assessed.rate, 0.0);
        }
    }

    #[test]
    fn test_small_business_first_taxed_rand() {
        let assessed = calculate_small_business_tax(91_251.0);
        assert_close(assessed.tax_amount, 0.07);
        assert_eq!(assessed.rate, 0.07);
    }

    #[test]
    fn test_small_business_top_bracket() {
        let assessed = calculate_small_business_tax(600_000.0);
        assert_close(assessed.tax_amount, 72_037.50);
        assert_eq!(assessed.rate, 0.28);
    }

    #[test]
    fn test_small_business_middle_bracket() {
        // 19 162.50 + (400 000 - 365 001 + 1) * 0.21
        let assessed = calculate_small_business_tax(400_000.0);
        assert_close(assessed.tax_amount, 19_162.50 + 35_000.0 * 0.21);
    }

    #[test]
    fn test_bracket_gap_bounds() {
        assert_eq!(small_business_bracket_gap(365_000.5), Some((365_000.0, 365_001.0)));
        assert_eq!(small_business_bracket_gap(91_250.01), Some((91_250.0, 91_251.0)));
        assert_eq!(small_business_bracket_gap(365_000.0), None);
        assert_eq!(small_business_bracket_gap(365_001.0), None);
        assert_eq!(small_business_bracket_gap(2_000_000.0), None);
    }

    #[test]
    fn test_small_business_gap_between_brackets() {
        assert_eq!(
            calculate_small_business_tax(91_250.5),
            TaxAssessment {
                tax_amount: 0.0,
                rate: 0.0
            }
        );
    }

    #[test]
    fn test_standard_rate_is_flat() {
        for income in [0.0, 1.0, 91_251.0, 1_234_567.89] {
            let assessed = calculate_business_tax(income);
            assert_eq!(assessed.tax_amount, income * 0.27);
            assert_eq!(assessed.rate, 0.27);
        }
    }

    #[test]
    fn test_assess_selects_table_by_business_type() {
        assert_eq!(
            assess(100_000.0, Some(BusinessType::SmallBusinessCorporation)).rate,
            0.07
        );
        assert_eq!(assess(100_000.0, Some(BusinessType::Partnership)).rate, 0.27);
        assert_eq!(assess(100_000.0, None).rate, 0.27);
    }
}
