//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use uuid::Uuid;

use crate::types::*;

/// Storage abstraction for the stock ledger
///
/// The stock core works with any storage backend (PostgreSQL, SQLite,
/// a remote API, in-memory, etc.) through these methods. Purchases, sales
/// and consumption are append-only; balance stock rows are derived and
/// owned by the reconciler.
#[async_trait]
pub trait StockStorage: Send + Sync {
    /// Save a new product
    async fn save_product(&mut self, product: &Product) -> StockResult<()>;

    /// Get a product by ID
    async fn get_product(&self, product_id: Uuid) -> StockResult<Option<Product>>;

    /// Find a product by its exact name and HSN code
    async fn find_product(&self, name: &str, hsn_code: &str) -> StockResult<Option<Product>>;

    /// List all products
    async fn list_products(&self) -> StockResult<Vec<Product>>;

    /// Update product metadata
    async fn update_product(&mut self, product: &Product) -> StockResult<()>;

    /// Delete a product
    async fn delete_product(&mut self, product_id: Uuid) -> StockResult<()>;

    async fn insert_purchase(&mut self, purchase: &Purchase) -> StockResult<()>;

    /// List purchases, for one product or for all of them
    async fn list_purchases(&self, product_id: Option<Uuid>) -> StockResult<Vec<Purchase>>;

    async fn insert_sale(&mut self, sale: &Sale) -> StockResult<()>;

    async fn get_sale(&self, sale_id: Uuid) -> StockResult<Option<Sale>>;

    /// List sales, for one product or for all of them
    async fn list_sales(&self, product_id: Option<Uuid>) -> StockResult<Vec<Sale>>;

    async fn insert_consumption(&mut self, consumption: &Consumption) -> StockResult<()>;

    /// List consumption entries, for one product or for all of them
    async fn list_consumption(&self, product_id: Option<Uuid>) -> StockResult<Vec<Consumption>>;

    /// Get the balance stock row of a product
    async fn get_balance(&self, product_id: Uuid) -> StockResult<Option<BalanceStock>>;

    /// Insert or replace the balance stock row of a product
    async fn upsert_balance(&mut self, balance: &BalanceStock) -> StockResult<()>;

    async fn delete_balance(&mut self, product_id: Uuid) -> StockResult<()>;

    async fn list_balances(&self) -> StockResult<Vec<BalanceStock>>;
}

/// Trait for implementing custom product rules
pub trait ProductValidator: Send + Sync {
    /// Validate a product before saving
    fn validate_product(&self, product: &Product) -> StockResult<()>;
}

/// Field-level rules shared by the transaction forms
pub trait FormValidator: Send + Sync {
    /// Collect every problem with a quantity field
    fn check_quantity(&self, errors: &mut ValidationErrors, field: &str, value: &BigDecimal);

    fn check_price(&self, errors: &mut ValidationErrors, field: &str, value: &BigDecimal);

    fn check_percentage(&self, errors: &mut ValidationErrors, field: &str, value: &BigDecimal);

    fn check_gst(&self, errors: &mut ValidationErrors, field: &str, value: &BigDecimal);

    fn check_document_number(&self, errors: &mut ValidationErrors, field: &str, value: &str);
}

/// Default product validator: name, HSN code and units must be present
pub struct DefaultProductValidator;

impl ProductValidator for DefaultProductValidator {
    fn validate_product(&self, product: &Product) -> StockResult<()> {
        let mut errors = ValidationErrors::new();

        if product.name.trim().is_empty() {
            errors.add("name", "Product name cannot be empty");
        }
        if product.hsn_code.trim().is_empty() {
            errors.add("hsn_code", "HSN code cannot be empty");
        }
        if product.units.trim().is_empty() {
            errors.add("units", "Units cannot be empty");
        }

        errors.into_result()
    }
}

/// Default form rules
pub struct DefaultFormValidator;

impl FormValidator for DefaultFormValidator {
    fn check_quantity(&self, errors: &mut ValidationErrors, field: &str, value: &BigDecimal) {
        if *value <= BigDecimal::from(0) {
            errors.add(field, "Quantity must be greater than zero");
        }
    }

    fn check_price(&self, errors: &mut ValidationErrors, field: &str, value: &BigDecimal) {
        if *value <= BigDecimal::from(0) {
            errors.add(field, "Price must be greater than zero");
        }
    }

    fn check_percentage(&self, errors: &mut ValidationErrors, field: &str, value: &BigDecimal) {
        if *value < BigDecimal::from(0) || *value > BigDecimal::from(100) {
            errors.add(field, "Percentage must be between 0 and 100");
        }
    }

    fn check_gst(&self, errors: &mut ValidationErrors, field: &str, value: &BigDecimal) {
        if *value < BigDecimal::from(0) {
            errors.add(field, "GST percentage cannot be negative");
        }
    }

    fn check_document_number(&self, errors: &mut ValidationErrors, field: &str, value: &str) {
        if value.trim().is_empty() {
            errors.add(field, "Document number cannot be empty");
        }
    }
}
