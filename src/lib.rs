//! # Salon Stock Core
//!
//! A GST-aware stock ledger for salons: purchases, sales to customers,
//! salon consumption and the balance stock derived from them.
//!
//! ## Features
//!
//! - **GST calculations**: Indian GST line pricing with CGST/SGST/IGST splits
//! - **Transaction builders**: Validated purchase, sale and consumption records with cost of goods
//! - **Balance stock**: Idempotent per-product reconciliation with pluggable costing
//! - **Stock sheets**: Sectioned CSV import with per-row failure reporting, flat CSV export
//! - **Storage abstraction**: Database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use salon_stock_core::{utils::MemoryStorage, PurchaseForm, StockLedger};
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//!
//! # async fn run() -> salon_stock_core::StockResult<()> {
//! let mut ledger = StockLedger::new(MemoryStorage::new());
//! let product = ledger
//!     .create_product("Keratin Shampoo".into(), "3305".into(), "BTL".into())
//!     .await?;
//!
//! let recorded = ledger
//!     .record_purchase(&PurchaseForm {
//!         product_id: product.id,
//!         date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
//!         invoice_number: "INV-001".into(),
//!         supplier: None,
//!         quantity: BigDecimal::from(10),
//!         mrp_incl_gst: BigDecimal::from(118),
//!         discount_percentage: BigDecimal::from(0),
//!         gst_percentage: Some(BigDecimal::from(18)),
//!     })
//!     .await?;
//! assert!(recorded.is_reconciled());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod ledger;
pub mod reconciliation;
pub mod sheet;
pub mod tax;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use crate::config::Settings;
pub use ledger::*;
pub use reconciliation::costing::{CostingMethod, CostingStrategy, Fifo, LifetimeAverage, Lifo};
pub use reconciliation::{
    BalancePolicy, BalanceReconciler, ProductLedger, ReconcileOutcome, ReconcileSummary,
};
pub use sheet::{ImportReport, ProcessingStats, SheetColumn, SheetRow, SheetSection};
pub use tax::gst::*;
pub use traits::*;
pub use types::*;
