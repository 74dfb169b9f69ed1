//! Storage backend for tests and demos, plus product field checks

pub mod memory_storage;
pub mod validation;

pub use memory_storage::MemoryStorage;
pub use validation::{
    standardize_unit, validate_hsn_code, validate_product_name, StrictProductValidator,
};
