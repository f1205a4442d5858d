//! # Stock Math
//!
//! Pure calculations behind stock entries, residues and sales. The API's
//! transaction scripts load rows, call into this module, and write the
//! results back inside one database transaction.
//!
//! ## Residue Ledger
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ProductResidue(type, shop).count                                       │
//! │                                                                         │
//! │      = Σ ProductEntry.count        (stock-in at the shop)              │
//! │      − Σ SaleItem.total_count      (sold from the shop)                │
//! │                                                                         │
//! │  Entry recorded  ──► residue += entry.count                             │
//! │  Entry deleted   ──► residue -= entry.count   (must stay >= 0)          │
//! │  Sale recorded   ──► residue -= item.total_count (must stay >= 0)       │
//! │  Bundle resized  ──► residue recomputed from history                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::{validate_bundle_item_count, validate_count, validate_unit_price};

fn overflow(field: &str) -> CoreError {
    ValidationError::Overflow {
        field: field.to_string(),
    }
    .into()
}

// =============================================================================
// Bundle Recompute
// =============================================================================

/// Re-expresses an item count recorded under one bundle size in another.
///
/// The count is first converted to whole bundles of the old size, then
/// multiplied out with the new size. An old size of zero means the count
/// was already recorded in bundles.
///
/// ## Example
/// ```rust
/// use forex_core::stock::rebundle;
///
/// // 3 bundles of 12 become 3 bundles of 10
/// assert_eq!(rebundle(36, 12, 10).unwrap(), 30);
/// ```
pub fn rebundle(
    count: i64,
    old_bundle_item_count: i64,
    new_bundle_item_count: i64,
) -> CoreResult<i64> {
    let bundles = if old_bundle_item_count > 0 {
        count / old_bundle_item_count
    } else {
        count
    };
    bundles
        .checked_mul(new_bundle_item_count)
        .ok_or_else(|| overflow("count"))
}

/// A historical entry after its type's bundle size changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebundledEntry {
    pub count: i64,
    pub total_amount: Money,
}

/// Recomputes an entry's count and total for a new bundle size.
pub fn rebundle_entry(
    count: i64,
    old_bundle_item_count: i64,
    new_bundle_item_count: i64,
    unit_price: Money,
) -> CoreResult<RebundledEntry> {
    let count = rebundle(count, old_bundle_item_count, new_bundle_item_count)?;
    Ok(RebundledEntry {
        count,
        total_amount: line_total(unit_price, count)?,
    })
}

/// `unit_price × count`; overflow is a validation error.
#[inline]
pub fn line_total(unit_price: Money, count: i64) -> CoreResult<Money> {
    unit_price
        .checked_mul(count)
        .ok_or_else(|| overflow("total_amount"))
}

/// Sums amounts, failing instead of wrapping.
fn checked_sum(amounts: impl IntoIterator<Item = Money>, field: &str) -> CoreResult<Money> {
    amounts.into_iter().try_fold(Money::zero(), |acc, m| {
        acc.checked_add(m).ok_or_else(|| overflow(field))
    })
}

// =============================================================================
// Residues
// =============================================================================

/// Residue implied by the full history of a (type, shop) pair.
#[inline]
pub fn residue_from_history(entered: i64, sold: i64) -> i64 {
    entered - sold
}

/// Fails with [`CoreError::InsufficientStock`] when `requested` exceeds `available`.
pub fn ensure_stock(product_type: &str, available: i64, requested: i64) -> CoreResult<()> {
    if requested > available {
        return Err(CoreError::InsufficientStock {
            product_type: product_type.to_string(),
            available,
            requested,
        });
    }
    Ok(())
}

/// New production-queue count after `count` finished items leave it.
///
/// Returns `None` when the queue holds fewer than `count` items; the queue
/// is then left untouched.
pub fn take_from_process(in_process: i64, count: i64) -> Option<i64> {
    (in_process >= count).then(|| in_process - count)
}

// =============================================================================
// Cost Price
// =============================================================================

/// One line of a bill of materials with its latest known unit cost.
#[derive(Debug, Clone, Copy)]
pub struct ComponentCost {
    pub quantity: i64,
    /// Cost per unit from the latest semi-product entry, if any was recorded.
    pub latest_unit_cost: Option<Money>,
}

/// Cost of one manufactured item: Σ latest unit cost × quantity.
///
/// Components never purchased contribute nothing; a type without a bill of
/// materials costs zero.
pub fn components_cost(components: &[ComponentCost]) -> CoreResult<Money> {
    let mut costs = Vec::with_capacity(components.len());
    for c in components {
        if let Some(cost) = c.latest_unit_cost {
            costs.push(cost.checked_mul(c.quantity).ok_or_else(|| overflow("cost_price"))?);
        }
    }
    checked_sum(costs, "cost_price")
}

// =============================================================================
// Sales
// =============================================================================

/// A computed sale line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleLine {
    pub bundle_count: i64,
    pub bundle_item_count: i64,
    pub total_count: i64,
    pub unit_price: Money,
    pub cost_price: Money,
    pub amount: Money,
    pub benefit: Money,
}

impl SaleLine {
    /// Computes a line from what the client sent and the type's unit cost.
    ///
    /// ## Flow
    /// ```text
    /// 5 bundles × 12 items = 60 items
    ///      │
    ///      ├── amount     = 60 × unit_price
    ///      ├── cost_price = 60 × unit_cost
    ///      └── benefit    = amount − cost_price
    /// ```
    pub fn compute(
        bundle_count: i64,
        bundle_item_count: i64,
        unit_price: Money,
        unit_cost: Money,
    ) -> CoreResult<Self> {
        validate_count("bundle_count", bundle_count)?;
        validate_bundle_item_count(bundle_item_count)?;
        validate_unit_price(unit_price)?;

        let total_count = bundle_count
            .checked_mul(bundle_item_count)
            .ok_or_else(|| overflow("bundle_count"))?;
        let amount = line_total(unit_price, total_count)?;
        let cost_price = line_total(unit_cost, total_count)?;

        Ok(SaleLine {
            bundle_count,
            bundle_item_count,
            total_count,
            unit_price,
            cost_price,
            amount,
            benefit: amount - cost_price,
        })
    }
}

/// Header totals of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleTotals {
    pub total_count: i64,
    pub cost_price: Money,
    pub total_amount: Money,
    pub benefit: Money,
}

impl SaleTotals {
    /// Sums the lines. A client-supplied total replaces the line sum
    /// (negotiated discount); benefit follows the final total.
    pub fn from_lines(lines: &[SaleLine], total_override: Option<Money>) -> CoreResult<Self> {
        if lines.is_empty() {
            return Err(CoreError::Rule("a sale needs at least one item".to_string()));
        }

        let total_count = lines
            .iter()
            .try_fold(0i64, |acc, l| acc.checked_add(l.total_count))
            .ok_or_else(|| overflow("total_count"))?;
        let cost_price = checked_sum(lines.iter().map(|l| l.cost_price), "cost_price")?;
        let lines_amount = checked_sum(lines.iter().map(|l| l.amount), "total_amount")?;

        let total_amount = match total_override {
            Some(total) => {
                validate_unit_price(total).map_err(|_| {
                    CoreError::Rule("total amount must not be negative".to_string())
                })?;
                total
            }
            None => lines_amount,
        };

        Ok(SaleTotals {
            total_count,
            cost_price,
            total_amount,
            benefit: total_amount - cost_price,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebundle() {
        assert_eq!(rebundle(36, 12, 10).unwrap(), 30);
        // Partial bundles are dropped
        assert_eq!(rebundle(40, 12, 10).unwrap(), 30);
        // Old size zero: count was bundles
        assert_eq!(rebundle(4, 0, 6).unwrap(), 24);
        assert_eq!(rebundle(0, 12, 6).unwrap(), 0);
        assert!(rebundle(i64::MAX / 2, 0, 4).is_err());
    }

    #[test]
    fn test_rebundle_entry_recomputes_total() {
        let e = rebundle_entry(24, 6, 8, Money::from_minor(250)).unwrap();
        assert_eq!(e.count, 32);
        assert_eq!(e.total_amount, Money::from_minor(8000));
    }

    #[test]
    fn test_residue_and_stock_check() {
        assert_eq!(residue_from_history(120, 45), 75);
        assert!(ensure_stock("24-29", 10, 10).is_ok());
        let err = ensure_stock("24-29", 10, 11).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock {
                available: 10,
                requested: 11,
                ..
            }
        ));
    }

    #[test]
    fn test_take_from_process() {
        assert_eq!(take_from_process(50, 20), Some(30));
        assert_eq!(take_from_process(20, 20), Some(0));
        assert_eq!(take_from_process(10, 20), None);
    }

    #[test]
    fn test_components_cost() {
        let bom = [
            ComponentCost {
                quantity: 2,
                latest_unit_cost: Some(Money::from_minor(150)),
            },
            ComponentCost {
                quantity: 1,
                latest_unit_cost: Some(Money::from_minor(400)),
            },
            ComponentCost {
                quantity: 5,
                latest_unit_cost: None,
            },
        ];
        assert_eq!(components_cost(&bom).unwrap(), Money::from_minor(700));
        assert_eq!(components_cost(&[]).unwrap(), Money::zero());

        let huge = [ComponentCost {
            quantity: i64::MAX,
            latest_unit_cost: Some(Money::from_minor(2)),
        }];
        assert!(components_cost(&huge).is_err());
    }

    #[test]
    fn test_sale_line_compute() {
        let line = SaleLine::compute(5, 12, Money::from_minor(1000), Money::from_minor(600)).unwrap();
        assert_eq!(line.total_count, 60);
        assert_eq!(line.amount, Money::from_minor(60_000));
        assert_eq!(line.cost_price, Money::from_minor(36_000));
        assert_eq!(line.benefit, Money::from_minor(24_000));
    }

    #[test]
    fn test_sale_line_rejects_bad_input() {
        assert!(SaleLine::compute(0, 12, Money::zero(), Money::zero()).is_err());
        assert!(SaleLine::compute(1, 0, Money::zero(), Money::zero()).is_err());
        assert!(SaleLine::compute(1, 1, Money::from_minor(-1), Money::zero()).is_err());
    }

    #[test]
    fn test_sale_line_overflow_is_a_validation_error() {
        let err = SaleLine::compute(i64::MAX / 2, 4, Money::from_minor(1), Money::zero()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::Overflow { .. })
        ));

        // Count fits, amount does not
        let err = SaleLine::compute(1_000_000, 1_000, Money::from_minor(i64::MAX / 1_000), Money::zero())
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        assert!(line_total(Money::from_minor(i64::MAX), 2).is_err());
    }

    #[test]
    fn test_sale_totals_overflow() {
        let big = SaleLine::compute(1, 1, Money::from_minor(i64::MAX - 10), Money::zero()).unwrap();
        assert!(SaleTotals::from_lines(&[big, big], None).is_err());
    }

    #[test]
    fn test_sale_totals() {
        let a = SaleLine::compute(1, 10, Money::from_minor(100), Money::from_minor(60)).unwrap();
        let b = SaleLine::compute(2, 5, Money::from_minor(200), Money::from_minor(150)).unwrap();

        let totals = SaleTotals::from_lines(&[a, b], None).unwrap();
        assert_eq!(totals.total_count, 20);
        assert_eq!(totals.total_amount, Money::from_minor(3000));
        assert_eq!(totals.cost_price, Money::from_minor(2100));
        assert_eq!(totals.benefit, Money::from_minor(900));

        let discounted = SaleTotals::from_lines(&[a, b], Some(Money::from_minor(2800))).unwrap();
        assert_eq!(discounted.total_amount, Money::from_minor(2800));
        assert_eq!(discounted.benefit, Money::from_minor(700));
    }

    #[test]
    fn test_sale_totals_requires_lines() {
        assert!(SaleTotals::from_lines(&[], None).is_err());
    }
}
