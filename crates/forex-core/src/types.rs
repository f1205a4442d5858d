//! # Domain Types
//!
//! Core domain types used throughout Forex.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────┐ 1   N ┌──────────────┐ 1   N ┌────────────────┐      │
//! │  │   Product    │──────►│ ProductType  │──────►│ ProductEntry   │      │
//! │  │  code, name  │       │ bundle size  │       │ stock-in       │      │
//! │  │  image       │       │ unit price   │       └────────────────┘      │
//! │  └──────────────┘       └──────┬───────┘                               │
//! │                                │ 1 per shop  ┌────────────────┐        │
//! │                                ├────────────►│ ProductResidue │        │
//! │                                │             └────────────────┘        │
//! │                                │ N           ┌────────────────┐        │
//! │                                └────────────►│   SaleItem     │◄──┐    │
//! │                                              └────────────────┘   │    │
//! │  ┌──────────────┐ 1   N ┌──────────────┐     ┌────────────────┐   │    │
//! │  │     User     │──────►│ UserAccount  │     │     Sale       │───┘    │
//! │  │  (customer)  │◄──────│ per currency │     │ customer, shop │        │
//! │  └──────────────┘       └──────────────┘     └────────────────┘        │
//! │                                                                         │
//! │  Lookups: Shop (+ ShopCashAccount), Currency, UnitMeasure               │
//! │  Manufacturing: SemiProduct, SemiProductEntry, ProductTypeItem,         │
//! │                 EntryToProcess, InProcess                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity has an `i64` id assigned by SQLite. Business keys
//! (product code, currency code, normalized names) are unique but mutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Enums
// =============================================================================

/// Where the goods of a product come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProductionOrigin {
    /// Produced in-house from semi-products.
    #[default]
    Manufactured,
    /// Bought ready-made.
    Purchased,
}

/// Role of a user in the system.
///
/// Customers and suppliers are users too: they own currency accounts
/// and appear on sales and cash transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Employee,
    #[default]
    Customer,
    Supplier,
}

impl UserRole {
    /// Returns the role as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Employee => "employee",
            UserRole::Customer => "customer",
            UserRole::Supplier => "supplier",
        }
    }

    /// Parses a stored role string.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(UserRole::Admin),
            "employee" => Some(UserRole::Employee),
            "customer" => Some(UserRole::Customer),
            "supplier" => Some(UserRole::Supplier),
            _ => None,
        }
    }
}

/// Direction of a cash transaction, seen from the shop's cash box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Money received from the user (customer pays a debt).
    Income,
    /// Money paid out to the user (supplier is paid).
    Expense,
}

impl TransactionKind {
    /// Sign applied to balances when this transaction is applied.
    pub fn sign(&self) -> i64 {
        match self {
            TransactionKind::Income => 1,
            TransactionKind::Expense => -1,
        }
    }
}

// =============================================================================
// Lookups
// =============================================================================

/// Unit of measure for products and semi-products.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UnitMeasure {
    pub id: i64,
    pub name: String,
    pub normalized_name: String,
    pub symbol: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub is_active: bool,
    pub position: i64,
}

/// A currency that prices, balances and cash accounts are kept in.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    pub id: i64,
    /// ISO-like code, e.g. `UZS`.
    pub code: String,
    pub name: String,
    pub normalized_name: String,
    pub symbol: Option<String>,
    /// Value of one unit of this currency in the default currency.
    pub exchange_rate: Money,
    pub is_default: bool,
    pub is_active: bool,
}

/// A shop (selling point / warehouse). Stock is tracked per shop.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Shop {
    pub id: i64,
    pub name: String,
    pub normalized_name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Cash box of a shop in one currency.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ShopCashAccount {
    pub id: i64,
    pub shop_id: i64,
    pub currency_id: i64,
    pub opening_balance: Money,
    pub balance: Money,
    pub discount: Money,
}

// =============================================================================
// Users
// =============================================================================

/// A person known to the system: staff, customer or supplier.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub normalized_name: String,
    /// Login name; only staff have one.
    pub username: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub role: UserRole,
    pub address: Option<String>,
    pub description: Option<String>,
    /// Argon2 PHC string. Never leaves the server.
    #[serde(skip)]
    #[ts(skip)]
    pub password_hash: Option<String>,
    /// Object storage key of the profile image.
    pub profile_image: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Balance of a user in one currency.
///
/// Negative balance means the user owes the business.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: i64,
    pub user_id: i64,
    pub currency_id: i64,
    pub opening_balance: Money,
    pub balance: Money,
    pub discount: Money,
}

// =============================================================================
// Products
// =============================================================================

/// A product (article) identified by its code, e.g. `101`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub normalized_name: String,
    pub image_path: Option<String>,
    pub unit_measure_id: i64,
    pub production_origin: ProductionOrigin,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A sellable variant of a product, e.g. size `24-29`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductType {
    pub id: i64,
    pub product_id: i64,
    #[serde(rename = "type")]
    #[ts(rename = "type")]
    pub type_name: String,
    /// Items per bundle; always > 0.
    pub bundle_item_count: i64,
    pub unit_price: Money,
    pub currency_id: i64,
}

/// Current on-hand stock of a product type at a shop.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductResidue {
    pub id: i64,
    pub product_type_id: i64,
    pub shop_id: i64,
    pub count: i64,
}

/// A historical stock-in record.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductEntry {
    pub id: i64,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    /// Items received (not bundles).
    pub count: i64,
    pub bundle_item_count: i64,
    /// Cost per item computed from the bill of materials.
    pub cost_price: Money,
    pub preparation_cost_per_unit: Money,
    pub unit_price: Money,
    /// `count × unit_price`.
    pub total_amount: Money,
    pub production_origin: ProductionOrigin,
    pub product_type_id: i64,
    pub shop_id: i64,
    pub product_residue_id: i64,
    pub currency_id: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Manufacturing
// =============================================================================

/// Raw material or component used to manufacture product types.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SemiProduct {
    pub id: i64,
    pub name: String,
    pub normalized_name: String,
    pub unit_measure_id: i64,
    pub image_path: Option<String>,
}

/// A purchase of a semi-product; the latest one sets its current cost.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SemiProductEntry {
    pub id: i64,
    pub semi_product_id: i64,
    pub quantity: i64,
    /// Cost per unit of the semi-product.
    pub cost_price: Money,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
}

/// One line of a product type's bill of materials.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductTypeItem {
    pub id: i64,
    pub product_type_id: i64,
    pub semi_product_id: i64,
    /// Units of the semi-product per item of the product type.
    pub quantity: i64,
}

/// Goods of a product type sent into production.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct EntryToProcess {
    pub id: i64,
    pub product_type_id: i64,
    pub count: i64,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
}

/// Items of a product type currently in production.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InProcess {
    pub id: i64,
    pub product_type_id: i64,
    pub count: i64,
}

// =============================================================================
// Sales
// =============================================================================

/// A sale to a customer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: i64,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub customer_id: i64,
    pub shop_id: i64,
    pub currency_id: i64,
    pub total_count: i64,
    pub cost_price: Money,
    pub benefit: Money,
    pub total_amount: Money,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// One line of a sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub id: i64,
    pub sale_id: i64,
    pub product_type_id: i64,
    pub bundle_count: i64,
    pub bundle_item_count: i64,
    /// `bundle_count × bundle_item_count`.
    pub total_count: i64,
    pub unit_price: Money,
    pub cost_price: Money,
    pub benefit: Money,
    pub amount: Money,
}

// =============================================================================
// Cash
// =============================================================================

/// A cash movement between a user and a shop's cash box.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub kind: TransactionKind,
    pub user_id: i64,
    pub shop_id: i64,
    pub currency_id: i64,
    pub amount: Money,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
