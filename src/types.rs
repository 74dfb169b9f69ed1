//! Core types and data structures for the stock ledger

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::tax::gst::{round_money, GstError};

/// A stocked product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier for the product
    pub id: Uuid,
    /// Product name as printed on invoices
    pub name: String,
    /// HSN tax classification code
    pub hsn_code: String,
    /// Unit of measure (BTL, PCS, JAR, ...)
    pub units: String,
    /// When the product was created
    pub created_at: NaiveDateTime,
    /// When the product metadata was last corrected
    pub updated_at: NaiveDateTime,
}

impl Product {
    /// Create a new product with a fresh id
    pub fn new(name: String, hsn_code: String, units: String) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4(),
            name,
            hsn_code,
            units,
            created_at: now,
            updated_at: now,
        }
    }
}

/// How a customer paid for a sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Online,
    Other,
}

impl PaymentMethod {
    /// Parse a payment method as written in a stock sheet. Blank means cash.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "cash" => PaymentMethod::Cash,
            "card" | "credit card" | "debit card" => PaymentMethod::Card,
            "online" | "upi" | "netbanking" => PaymentMethod::Online,
            _ => PaymentMethod::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Online => "online",
            PaymentMethod::Other => "other",
        }
    }
}

/// Taxable value and its GST split for one line
///
/// Every monetary field carries two decimal places and
/// `invoice_value == taxable_value + cgst + sgst + igst`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GstAmounts {
    pub taxable_value: BigDecimal,
    pub cgst: BigDecimal,
    pub sgst: BigDecimal,
    pub igst: BigDecimal,
    pub invoice_value: BigDecimal,
}

impl GstAmounts {
    /// All-zero amounts
    pub fn zero() -> Self {
        let zero = round_money(&BigDecimal::from(0));
        Self {
            taxable_value: zero.clone(),
            cgst: zero.clone(),
            sgst: zero.clone(),
            igst: zero.clone(),
            invoice_value: zero,
        }
    }

    /// CGST + SGST + IGST
    pub fn total_gst(&self) -> BigDecimal {
        &self.cgst + &self.sgst + &self.igst
    }

    /// Check the invoice value equals taxable value plus all tax components
    pub fn is_consistent(&self) -> bool {
        self.invoice_value == &self.taxable_value + self.total_gst()
    }

    /// True when the tax was split as CGST + SGST
    pub fn is_intra_state(&self) -> bool {
        self.igst == BigDecimal::from(0)
    }
}

/// Where a cost basis was taken from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "purchase_id", rename_all = "snake_case")]
pub enum CostSource {
    /// The most recent purchase of the product
    Purchase(Uuid),
    /// No purchase on record; a fraction of the MRP excl. GST was assumed
    MrpFallback,
    /// Carried over from a sale that was converted to consumption
    Sale(Uuid),
}

/// Per-unit purchase cost attributed to stock leaving the shelf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBasis {
    pub source: CostSource,
    /// Cost per unit excluding GST
    pub cost_per_unit_excl_gst: BigDecimal,
    /// GST percentage paid on the purchase
    pub gst_percentage: BigDecimal,
}

impl CostBasis {
    pub fn is_fallback(&self) -> bool {
        self.source == CostSource::MrpFallback
    }
}

/// Cost of goods for a sale or consumption line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub basis: CostBasis,
    /// Cost-side amounts; `invoice_value` is the total purchase cost
    pub amounts: GstAmounts,
}

impl CostBreakdown {
    pub fn total_purchase_cost(&self) -> &BigDecimal {
        &self.amounts.invoice_value
    }
}

/// Stock received from a supplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub product_id: Uuid,
    pub date: NaiveDate,
    pub invoice_number: String,
    pub supplier: Option<String>,
    pub quantity: BigDecimal,
    pub mrp_incl_gst: BigDecimal,
    pub mrp_excl_gst: BigDecimal,
    pub discount_percentage: BigDecimal,
    pub gst_percentage: BigDecimal,
    /// MRP excl. GST after the purchase discount
    pub discounted_rate: BigDecimal,
    pub amounts: GstAmounts,
    pub created_at: NaiveDateTime,
}

/// Stock sold to a customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub product_id: Uuid,
    pub date: NaiveDate,
    pub invoice_number: String,
    pub customer: Option<String>,
    pub payment_method: PaymentMethod,
    pub quantity: BigDecimal,
    /// Cost of the goods sold, for margin tracking
    pub cost: CostBreakdown,
    pub mrp_incl_gst: BigDecimal,
    pub mrp_excl_gst: BigDecimal,
    pub discount_percentage: BigDecimal,
    pub gst_percentage: BigDecimal,
    pub discounted_rate: BigDecimal,
    pub amounts: GstAmounts,
    pub created_at: NaiveDateTime,
}

impl Sale {
    /// Sale taxable value minus cost taxable value
    pub fn margin(&self) -> BigDecimal {
        &self.amounts.taxable_value - &self.cost.amounts.taxable_value
    }
}

/// Stock used up by the salon itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumption {
    pub id: Uuid,
    pub product_id: Uuid,
    pub date: NaiveDate,
    pub requisition_voucher_number: String,
    pub purpose: String,
    pub quantity: BigDecimal,
    /// Cost basis and the resulting taxable value and tax split
    pub cost: CostBreakdown,
    /// Set when the entry was converted from a cash sale
    pub original_sale_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

/// Derived on-hand stock for one product
///
/// This is a materialized view over the three ledgers and is recomputed
/// from scratch on every reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceStock {
    pub product_id: Uuid,
    /// Purchased minus sold minus consumed, where a cash sale converted to
    /// consumption counts only as consumption. May be zero or negative.
    pub quantity: BigDecimal,
    pub total_purchased: BigDecimal,
    pub total_sold: BigDecimal,
    pub total_consumed: BigDecimal,
    pub avg_cost_per_unit: BigDecimal,
    /// GST percentage of the latest purchase
    pub gst_percentage: BigDecimal,
    pub amounts: GstAmounts,
}

impl BalanceStock {
    /// Quantity for display, never below zero
    pub fn display_quantity(&self) -> BigDecimal {
        if self.quantity < BigDecimal::from(0) {
            BigDecimal::from(0)
        } else {
            self.quantity.clone()
        }
    }

    pub fn is_in_stock(&self) -> bool {
        self.quantity > BigDecimal::from(0)
    }
}

/// Cached views that go stale after a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerView {
    Products,
    Purchases,
    Sales,
    Consumption,
    BalanceStock,
}

/// A single invalid form field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every invalid field of a submitted form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error against a field
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// First error recorded for a field
    pub fn for_field(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field == field)
    }

    /// Fold another set of errors into this one
    pub fn merge(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    /// `Ok(())` when no field failed
    pub fn into_result(self) -> StockResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(StockError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", messages.join("; "))
    }
}

/// Errors that can occur in the stock ledger
#[derive(Debug, thiserror::Error)]
pub enum StockError {
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),
    #[error("Storage error: {0}")]
    Persistence(String),
    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),
    #[error("Sale not found: {0}")]
    SaleNotFound(Uuid),
    #[error("Balance stock reconciliation failed for product {product_id}: {reason}")]
    Reconciliation { product_id: Uuid, reason: String },
    #[error("Import row {line}: {message}")]
    ImportRow { line: usize, message: String },
    #[error("Sheet error: {0}")]
    Sheet(String),
    #[error(transparent)]
    Tax(#[from] GstError),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StockError {
    /// Validation error for a single field
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        StockError::Validation(errors)
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, StockError::Validation(_))
    }
}

impl From<csv::Error> for StockError {
    fn from(err: csv::Error) -> Self {
        StockError::Sheet(err.to_string())
    }
}

impl From<config::ConfigError> for StockError {
    fn from(err: config::ConfigError) -> Self {
        StockError::Config(err.to_string())
    }
}

/// Result type for stock ledger operations
pub type StockResult<T> = Result<T, StockError>;
