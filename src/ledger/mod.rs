//! Ledger module containing product management and transaction processing

pub mod core;
pub mod product;
pub mod transaction;

pub use self::core::*;
pub use product::*;
pub use transaction::*;
