//! # Seed Data Generator
//!
//! Populates the database with a working data set for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./forex_dev.db
//! cargo run -p forex-db --bin seed
//!
//! # Specify database path
//! cargo run -p forex-db --bin seed -- --db ./data/forex.db
//! ```
//!
//! ## Generated Data
//! - Default unit measure (`Dona`), currency (`UZS`) and shop
//! - A handful of customers and one supplier, each with a UZS account
//! - Footwear products with size types (bundles of 6 to 12 pairs)
//! - One stock entry per type, with the matching residue
//!
//! The admin user is not seeded; the API creates it from
//! `ADMIN_USERNAME` / `ADMIN_PASSWORD` on first start.

use std::env;

use anyhow::Context;
use chrono::Utc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use forex_core::validation::normalize_name;
use forex_core::{
    stock, Currency, Money, Product, ProductEntry, ProductType, ProductionOrigin, Shop,
    UnitMeasure, User, UserRole, DEFAULT_CURRENCY_CODE, DEFAULT_CURRENCY_NAME,
    DEFAULT_SHOP_NAME, DEFAULT_UNIT_MEASURE_NAME, DEFAULT_UNIT_MEASURE_SYMBOL,
};
use forex_db::repository::{
    currency, product, product_entry, product_type, residue, shop, unit_measure, user,
};
use forex_db::{Database, DbConfig};

/// `(code, name, [(type, bundle size, unit price in minor units)])`
const PRODUCTS: &[(&str, &str, &[(&str, i64, i64)])] = &[
    ("101", "Krossovka", &[("24-29", 12, 150_000), ("30-35", 10, 180_000)]),
    ("102", "Tufli", &[("36-40", 8, 320_000), ("41-45", 8, 350_000)]),
    ("103", "Shippak", &[("36-41", 12, 60_000)]),
    ("104", "Etik", &[("36-40", 6, 540_000), ("41-45", 6, 580_000)]),
    ("105", "Sandal", &[("25-30", 12, 90_000), ("31-36", 12, 110_000)]),
];

const CUSTOMERS: &[(&str, &str)] = &[
    ("Ali Valiyev", "+998901234567"),
    ("Dilshod Karimov", "+998935551122"),
    ("Nodira Usmonova", "+998977003344"),
];

const SUPPLIER: &str = "Charm Zavodi";

/// Bundles received per type on the first stock entry.
const OPENING_BUNDLES: i64 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("forex_db=info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./forex_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Forex Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./forex_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Forex Seed Data Generator");
    println!("=========================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .with_context(|| format!("opening {db_path}"))?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let mut conn = db.acquire().await?;
    if !product::list(&mut conn).await?.is_empty() {
        println!("⚠ Database already has products");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }
    drop(conn);

    let start = std::time::Instant::now();
    let mut tx = db.begin().await?;
    let now = Utc::now();

    // Defaults
    let unit_id = unit_measure::insert(
        &mut tx,
        &UnitMeasure {
            id: 0,
            name: DEFAULT_UNIT_MEASURE_NAME.to_string(),
            normalized_name: normalize_name(DEFAULT_UNIT_MEASURE_NAME),
            symbol: DEFAULT_UNIT_MEASURE_SYMBOL.to_string(),
            description: None,
            is_default: true,
            is_active: true,
            position: 0,
        },
    )
    .await?;

    let currency_id = currency::insert(
        &mut tx,
        &Currency {
            id: 0,
            code: DEFAULT_CURRENCY_CODE.to_string(),
            name: DEFAULT_CURRENCY_NAME.to_string(),
            normalized_name: normalize_name(DEFAULT_CURRENCY_NAME),
            symbol: Some("so'm".to_string()),
            exchange_rate: Money::from_minor(100),
            is_default: true,
            is_active: true,
        },
    )
    .await?;

    let shop_id = shop::insert(
        &mut tx,
        &Shop {
            id: 0,
            name: DEFAULT_SHOP_NAME.to_string(),
            normalized_name: normalize_name(DEFAULT_SHOP_NAME),
            created_at: now,
        },
    )
    .await?;
    shop::open_cash_account(&mut tx, shop_id, currency_id).await?;
    println!("✓ Defaults: unit, currency {}, shop", DEFAULT_CURRENCY_CODE);

    // Users
    let people = CUSTOMERS
        .iter()
        .map(|(name, phone)| (*name, Some(*phone), UserRole::Customer))
        .chain(std::iter::once((SUPPLIER, None, UserRole::Supplier)));
    let mut user_count = 0;
    for (name, phone, role) in people {
        let user_id = user::insert(
            &mut tx,
            &User {
                id: 0,
                name: name.to_string(),
                normalized_name: normalize_name(name),
                username: None,
                phone: phone.map(str::to_string),
                email: None,
                role,
                address: None,
                description: None,
                password_hash: None,
                profile_image: None,
                created_at: now,
                updated_at: now,
            },
        )
        .await?;
        user::upsert_account(&mut tx, user_id, currency_id, Money::zero(), Money::zero()).await?;
        user_count += 1;
    }
    println!("✓ Generated {} users", user_count);

    // Products, types and opening stock
    let mut type_count = 0;
    for (code, name, types) in PRODUCTS {
        let product_id = product::insert(
            &mut tx,
            &Product {
                id: 0,
                code: code.to_string(),
                name: name.to_string(),
                normalized_name: normalize_name(name),
                image_path: None,
                unit_measure_id: unit_id,
                production_origin: ProductionOrigin::Purchased,
                created_at: now,
                updated_at: now,
            },
        )
        .await?;

        for (type_name, bundle_item_count, price) in types.iter() {
            let unit_price = Money::from_minor(*price);
            let type_id = product_type::insert(
                &mut tx,
                &ProductType {
                    id: 0,
                    product_id,
                    type_name: type_name.to_string(),
                    bundle_item_count: *bundle_item_count,
                    unit_price,
                    currency_id,
                },
            )
            .await?;

            let count = OPENING_BUNDLES * bundle_item_count;
            let residue_id = residue::insert(&mut tx, type_id, shop_id, count).await?;

            // Purchase cost sits at 70% of the selling price
            let cost_price = Money::from_minor(price * 70 / 100);
            product_entry::insert(
                &mut tx,
                &ProductEntry {
                    id: 0,
                    date: now,
                    count,
                    bundle_item_count: *bundle_item_count,
                    cost_price,
                    preparation_cost_per_unit: Money::zero(),
                    unit_price,
                    total_amount: stock::line_total(unit_price, count)?,
                    production_origin: ProductionOrigin::Purchased,
                    product_type_id: type_id,
                    shop_id,
                    product_residue_id: residue_id,
                    currency_id,
                    created_at: now,
                },
            )
            .await?;
            type_count += 1;
        }
    }

    tx.commit().await?;

    let elapsed = start.elapsed();
    info!(products = PRODUCTS.len(), types = type_count, "Seed committed");
    println!(
        "✓ Generated {} products with {} types in {:?}",
        PRODUCTS.len(),
        type_count,
        elapsed
    );
    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
