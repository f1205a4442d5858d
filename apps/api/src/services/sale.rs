//! Sales to customers.
//!
//! ## Effects of a Sale
//! ```text
//! Sale (shop S, currency C, customer U)
//!      │
//!      ├── every line: residue(type, S) −= bundles × bundle size
//!      │               (InsufficientStock when the residue is short)
//!      │
//!      └── account(U, C).balance −= total amount
//! ```
//! Update reverts these effects and applies the new request; delete only
//! reverts them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use forex_core::stock::{ensure_stock, SaleLine, SaleTotals};
use forex_core::validation::{validate_id, validate_name};
use forex_core::{CoreError, Money, Sale, SaleItem};
use forex_db::repository::{currency, product_entry, product_type, residue, sale, shop, user};
use forex_db::FilteringRequest;

use super::lookup::{default_currency, default_shop};
use super::{check_filter, commit};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaleRequest {
    /// Sale being replaced; only read by update.
    pub id: i64,
    pub date: Option<DateTime<Utc>>,
    pub customer_id: i64,
    /// Selling shop; the default shop when absent.
    pub shop_id: Option<i64>,
    /// Sale currency; the default currency when absent.
    pub currency_id: Option<i64>,
    /// Negotiated total; replaces the sum of the lines.
    pub total_amount: Option<Money>,
    pub note: Option<String>,
    pub items: Vec<SaleItemRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaleItemRequest {
    pub product_type_id: i64,
    pub bundle_count: i64,
    pub bundle_item_count: i64,
    pub unit_price: Money,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDto {
    #[serde(flatten)]
    pub sale: Sale,
    pub customer_name: Option<String>,
    pub items: Vec<SaleItem>,
}

/// Cost of one item of a type: latest entry cost plus preparation.
async fn unit_cost(conn: &mut SqliteConnection, product_type_id: i64) -> ApiResult<Money> {
    let Some(entry) = product_entry::latest_for_type(&mut *conn, product_type_id).await? else {
        return Ok(Money::zero());
    };
    entry
        .cost_price
        .checked_add(entry.preparation_cost_per_unit)
        .ok_or_else(|| ApiError::validation("cost_price is too large"))
}

/// Validates the request, takes the stock out of the shop and debits the
/// customer. Returns the header (id 0) and the computed lines.
async fn apply(
    conn: &mut SqliteConnection,
    request: &SaleRequest,
) -> ApiResult<(Sale, Vec<(i64, SaleLine)>)> {
    validate_id("customer_id", request.customer_id)?;
    if request.items.is_empty() {
        return Err(CoreError::Rule("a sale needs at least one item".to_string()).into());
    }

    let customer = user::get(&mut *conn, request.customer_id).await?;
    let currency_id = match request.currency_id {
        Some(id) => currency::get(&mut *conn, id).await?.id,
        None => default_currency(&mut *conn).await?.id,
    };
    let shop_id = match request.shop_id {
        Some(id) => shop::get(&mut *conn, id).await?.id,
        None => default_shop(&mut *conn).await?.id,
    };

    let mut lines = Vec::with_capacity(request.items.len());
    for item in &request.items {
        validate_id("product_type_id", item.product_type_id)?;
        let pt = product_type::get(&mut *conn, item.product_type_id).await?;
        let cost = unit_cost(&mut *conn, pt.id).await?;
        let line = SaleLine::compute(item.bundle_count, item.bundle_item_count, item.unit_price, cost)?;

        let stock = residue::find(&mut *conn, pt.id, shop_id).await?;
        let available = stock.as_ref().map_or(0, |r| r.count);
        ensure_stock(&pt.type_name, available, line.total_count)?;
        if let Some(stock) = stock {
            residue::add_count(&mut *conn, stock.id, -line.total_count).await?;
        }

        lines.push((pt.id, line));
    }

    let only_lines: Vec<SaleLine> = lines.iter().map(|(_, l)| *l).collect();
    let totals = SaleTotals::from_lines(&only_lines, request.total_amount)?;

    user::adjust_balance(&mut *conn, customer.id, currency_id, -totals.total_amount).await?;

    let note = request
        .note
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    if let Some(note) = &note {
        validate_name("note", note)?;
    }

    let now = Utc::now();
    let header = Sale {
        id: 0,
        date: request.date.unwrap_or(now),
        customer_id: customer.id,
        shop_id,
        currency_id,
        total_count: totals.total_count,
        cost_price: totals.cost_price,
        benefit: totals.benefit,
        total_amount: totals.total_amount,
        note,
        created_at: now,
    };
    Ok((header, lines))
}

async fn write_items(
    conn: &mut SqliteConnection,
    sale_id: i64,
    lines: &[(i64, SaleLine)],
) -> ApiResult<()> {
    for (product_type_id, line) in lines {
        sale::insert_item(
            &mut *conn,
            &SaleItem {
                id: 0,
                sale_id,
                product_type_id: *product_type_id,
                bundle_count: line.bundle_count,
                bundle_item_count: line.bundle_item_count,
                total_count: line.total_count,
                unit_price: line.unit_price,
                cost_price: line.cost_price,
                benefit: line.benefit,
                amount: line.amount,
            },
        )
        .await?;
    }
    Ok(())
}

/// Puts the stock back, credits the customer and drops the items.
async fn revert(conn: &mut SqliteConnection, existing: &Sale) -> ApiResult<()> {
    for item in sale::items_by_sale(&mut *conn, existing.id).await? {
        match residue::find(&mut *conn, item.product_type_id, existing.shop_id).await? {
            Some(stock) => {
                residue::add_count(&mut *conn, stock.id, item.total_count).await?;
            }
            None => {
                residue::insert(&mut *conn, item.product_type_id, existing.shop_id, item.total_count)
                    .await?;
            }
        }
    }
    user::adjust_balance(
        &mut *conn,
        existing.customer_id,
        existing.currency_id,
        existing.total_amount,
    )
    .await?;
    sale::delete_items(&mut *conn, existing.id).await?;
    Ok(())
}

async fn to_dto(conn: &mut SqliteConnection, found: Sale) -> ApiResult<SaleDto> {
    let customer_name = user::find_by_id(&mut *conn, found.customer_id)
        .await?
        .map(|u| u.name);
    let items = sale::items_by_sale(&mut *conn, found.id).await?;
    Ok(SaleDto {
        sale: found,
        customer_name,
        items,
    })
}

// =============================================================================
// Operations
// =============================================================================

pub async fn create_sale(state: &AppState, request: SaleRequest) -> ApiResult<i64> {
    debug!(customer_id = %request.customer_id, items = request.items.len(), "Creating sale");

    let mut tx = state.db.begin().await?;
    let (header, lines) = apply(&mut tx, &request).await?;
    let id = sale::insert(&mut tx, &header).await?;
    write_items(&mut tx, id, &lines).await?;
    commit(tx).await?;

    info!(
        sale_id = %id,
        customer_id = %header.customer_id,
        total = %header.total_amount,
        "Sale created"
    );
    Ok(id)
}

pub async fn update_sale(state: &AppState, request: SaleRequest) -> ApiResult<()> {
    debug!(sale_id = %request.id, "Updating sale");
    validate_id("id", request.id)?;

    let mut tx = state.db.begin().await?;
    let existing = sale::get(&mut tx, request.id).await?;
    revert(&mut tx, &existing).await?;

    let (header, lines) = apply(&mut tx, &request).await?;
    sale::update(
        &mut tx,
        &Sale {
            id: existing.id,
            created_at: existing.created_at,
            ..header
        },
    )
    .await?;
    write_items(&mut tx, existing.id, &lines).await?;
    commit(tx).await?;

    info!(sale_id = %existing.id, "Sale updated");
    Ok(())
}

pub async fn delete_sale(state: &AppState, id: i64) -> ApiResult<()> {
    debug!(sale_id = %id, "Deleting sale");
    validate_id("id", id)?;

    let mut tx = state.db.begin().await?;
    let existing = sale::get(&mut tx, id).await?;
    revert(&mut tx, &existing).await?;
    sale::delete(&mut tx, id).await?;
    commit(tx).await?;

    info!(sale_id = %id, "Sale deleted");
    Ok(())
}

pub async fn get_sale(state: &AppState, id: i64) -> ApiResult<SaleDto> {
    validate_id("id", id)?;
    let mut conn = state.db.acquire().await?;
    let found = sale::get(&mut conn, id).await?;
    to_dto(&mut conn, found).await
}

pub async fn list_sales(state: &AppState) -> ApiResult<Vec<SaleDto>> {
    let mut conn = state.db.acquire().await?;
    let mut out = Vec::new();
    for s in sale::list(&mut conn).await? {
        out.push(to_dto(&mut conn, s).await?);
    }
    Ok(out)
}

pub async fn filter_sales(state: &AppState, request: FilteringRequest) -> ApiResult<Vec<SaleDto>> {
    check_filter(&request)?;
    let mut conn = state.db.acquire().await?;
    let mut out = Vec::new();
    for s in sale::filter(&mut conn, &request).await? {
        out.push(to_dto(&mut conn, s).await?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::product_entry::{self, ProductEntryRequest};
    use crate::services::test_support;

    struct Fixture {
        state: AppState,
        type_id: i64,
        customer: i64,
        currency_id: i64,
    }

    /// 36 items of type 24-29 in the default shop, cost 300 + 20 per item.
    async fn fixture() -> Fixture {
        let (state, _) = test_support::state().await;
        let mut req =
            ProductEntryRequest::for_new_type("101", "Shim", "24-29", 36, 12, Money::from_minor(500));
        req.preparation_cost_per_unit = Money::from_minor(20);
        let entry_id = product_entry::create_product_entry(&state, req).await.unwrap();

        let mut conn = state.db.acquire().await.unwrap();
        let entry = forex_db::repository::product_entry::get(&mut conn, entry_id)
            .await
            .unwrap();
        sqlx::query("UPDATE product_entries SET cost_price = 300 WHERE id = ?")
            .bind(entry_id)
            .execute(&mut *conn)
            .await
            .unwrap();
        drop(conn);

        let customer = test_support::customer(&state, "Mijoz").await;
        Fixture {
            state,
            type_id: entry.product_type_id,
            customer,
            currency_id: entry.currency_id,
        }
    }

    fn one_line(customer: i64, type_id: i64, bundles: i64) -> SaleRequest {
        SaleRequest {
            customer_id: customer,
            items: vec![SaleItemRequest {
                product_type_id: type_id,
                bundle_count: bundles,
                bundle_item_count: 12,
                unit_price: Money::from_minor(600),
            }],
            ..Default::default()
        }
    }

    async fn stock(state: &AppState, type_id: i64) -> i64 {
        let mut conn = state.db.acquire().await.unwrap();
        residue::list_by_type(&mut conn, type_id).await.unwrap()[0].count
    }

    #[tokio::test]
    async fn test_oversized_quantities_are_rejected_not_wrapped() {
        let f = fixture().await;

        let mut req = one_line(f.customer, f.type_id, i64::MAX / 2);
        req.items[0].bundle_item_count = 4;
        let err = create_sale(&f.state, req).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(stock(&f.state, f.type_id).await, 36);

        let req = ProductEntryRequest::for_new_type(
            "102",
            "Etik",
            "40",
            i64::MAX / 2,
            1,
            Money::from_minor(3),
        );
        let err = product_entry::create_product_entry(&f.state, req).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_create_sale_takes_stock_and_debits_customer() {
        let f = fixture().await;

        let id = create_sale(&f.state, one_line(f.customer, f.type_id, 2)).await.unwrap();

        let dto = get_sale(&f.state, id).await.unwrap();
        assert_eq!(dto.sale.total_count, 24);
        assert_eq!(dto.sale.total_amount, Money::from_minor(14_400));
        assert_eq!(dto.sale.cost_price, Money::from_minor(7_680));
        assert_eq!(dto.sale.benefit, Money::from_minor(6_720));
        assert_eq!(dto.items.len(), 1);
        assert_eq!(dto.customer_name.as_deref(), Some("Mijoz"));

        assert_eq!(stock(&f.state, f.type_id).await, 12);
        assert_eq!(
            test_support::balance(&f.state, f.customer, f.currency_id).await,
            Money::from_minor(-14_400)
        );
    }

    #[tokio::test]
    async fn test_total_override_acts_as_discount() {
        let f = fixture().await;
        let mut req = one_line(f.customer, f.type_id, 1);
        req.total_amount = Some(Money::from_minor(7_000));

        let id = create_sale(&f.state, req).await.unwrap();
        let dto = get_sale(&f.state, id).await.unwrap();
        assert_eq!(dto.sale.total_amount, Money::from_minor(7_000));
        assert_eq!(dto.sale.benefit, Money::from_minor(7_000 - 3_840));
    }

    #[tokio::test]
    async fn test_oversell_is_rejected_and_rolled_back() {
        let f = fixture().await;

        let err = create_sale(&f.state, one_line(f.customer, f.type_id, 4)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);

        assert_eq!(stock(&f.state, f.type_id).await, 36);
        assert_eq!(
            test_support::balance(&f.state, f.customer, f.currency_id).await,
            Money::zero()
        );
    }

    #[tokio::test]
    async fn test_invalid_sales_are_rejected() {
        let f = fixture().await;

        let err = create_sale(&f.state, one_line(999, f.type_id, 1)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        let mut req = one_line(f.customer, f.type_id, 1);
        req.items.clear();
        let err = create_sale(&f.state, req).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);

        let err = create_sale(&f.state, one_line(f.customer, f.type_id, 0)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_update_sale_reverts_then_applies() {
        let f = fixture().await;
        let id = create_sale(&f.state, one_line(f.customer, f.type_id, 2)).await.unwrap();

        // 3 bundles would fail on top of the old 2, but the old ones are returned first
        let mut req = one_line(f.customer, f.type_id, 3);
        req.id = id;
        update_sale(&f.state, req).await.unwrap();

        assert_eq!(stock(&f.state, f.type_id).await, 0);
        assert_eq!(
            test_support::balance(&f.state, f.customer, f.currency_id).await,
            Money::from_minor(-21_600)
        );
        let dto = get_sale(&f.state, id).await.unwrap();
        assert_eq!(dto.items.len(), 1);
        assert_eq!(dto.items[0].bundle_count, 3);
    }

    #[tokio::test]
    async fn test_delete_sale_restores_stock_and_balance() {
        let f = fixture().await;
        let id = create_sale(&f.state, one_line(f.customer, f.type_id, 2)).await.unwrap();

        delete_sale(&f.state, id).await.unwrap();

        assert_eq!(stock(&f.state, f.type_id).await, 36);
        assert_eq!(
            test_support::balance(&f.state, f.customer, f.currency_id).await,
            Money::zero()
        );
        let err = get_sale(&f.state, id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_filter_sales_by_customer() {
        let f = fixture().await;
        let other = test_support::customer(&f.state, "Boshqa").await;
        create_sale(&f.state, one_line(f.customer, f.type_id, 1)).await.unwrap();
        create_sale(&f.state, one_line(other, f.type_id, 1)).await.unwrap();

        let found = filter_sales(
            &f.state,
            FilteringRequest::default().with_filter("customerId", other.to_string()),
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].sale.customer_id, other);
        assert_eq!(list_sales(&f.state).await.unwrap().len(), 2);
    }
}
